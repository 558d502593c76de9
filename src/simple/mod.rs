//! PEP 503 "simple" repository pages
//!
//! `/simple/` lists every mirrored project; `/simple/<name>/` lists the
//! project's release files that are actually present in the mirror, followed
//! by the project's serial.

pub mod render;

pub use render::{FileListing, ProjectPage, render_index, render_project, serial_sentinel};

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::models::Package;
use crate::name::canonicalize;
use crate::storage::{FileStore, PackageStore};
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

/// Serial header PyPI sends alongside simple pages
pub const LAST_SERIAL_HEADER: HeaderName = HeaderName::from_static("x-pypi-last-serial");

/// Which page a `/simple/...` path asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleRequest {
    Index,
    /// Canonicalized project name
    Project(String),
}

impl SimpleRequest {
    /// Classify a request path. The project is the third `/`-separated
    /// element (`/simple/<name>/...`); an empty one selects the index.
    pub fn from_path(path: &str) -> Self {
        let segment = path.split('/').nth(2).unwrap_or("");
        let segment = percent_decode_str(segment).decode_utf8_lossy();

        if segment.is_empty() {
            SimpleRequest::Index
        } else {
            SimpleRequest::Project(canonicalize(&segment))
        }
    }
}

/// Index page together with the highest serial it covers
pub struct IndexPage {
    pub html: String,
    pub last_serial: Option<i64>,
}

/// Build the project list page
pub fn index_page(store: &dyn PackageStore) -> Result<IndexPage> {
    let rows = store.list_packages()?;
    if rows.skipped > 0 {
        metrics::counter!("pypi_mirror_rows_skipped_total").increment(rows.skipped as u64);
    }

    Ok(IndexPage {
        html: render_index(&rows.items),
        last_serial: rows.items.iter().map(|p| p.last_serial).max(),
    })
}

/// Look up a project, or `ProjectNotFound` when no stored package
/// canonicalizes to `canonical_name`
pub fn find_project(store: &dyn PackageStore, canonical_name: &str) -> Result<Package> {
    store.find_package(canonical_name)?.ok_or_else(|| {
        tracing::info!(project = canonical_name, "Project not found");
        metrics::counter!("pypi_mirror_project_not_found_total").increment(1);
        Error::ProjectNotFound {
            name: canonical_name.to_string(),
        }
    })
}

/// Build a project's page
pub fn project_page(
    store: &dyn PackageStore,
    mirror: &dyn FileStore,
    canonical_name: &str,
) -> Result<(Package, ProjectPage)> {
    let package = find_project(store, canonical_name)?;

    let rows = store.list_files(&package.name)?;
    let page = render_project(&package, &rows.items, mirror);
    let skipped = page.skipped + rows.skipped;

    tracing::info!(
        project = %package.name,
        last_serial = package.last_serial,
        files = page.rendered,
        missing = page.missing,
        skipped,
        "Served project page"
    );
    metrics::counter!("pypi_mirror_files_rendered_total").increment(page.rendered as u64);
    metrics::counter!("pypi_mirror_files_missing_total").increment(page.missing as u64);
    if skipped > 0 {
        metrics::counter!("pypi_mirror_rows_skipped_total").increment(skipped as u64);
    }

    Ok((package, page))
}

fn html_response(html: String, last_serial: Option<i64>) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response();

    if let Some(serial) = last_serial {
        response
            .headers_mut()
            .insert(LAST_SERIAL_HEADER, HeaderValue::from(serial));
    }

    response
}

/// Serve `/simple/` and `/simple/<name>/...`
pub async fn simple(State(state): State<Arc<AppState>>, uri: Uri) -> Result<Response> {
    match SimpleRequest::from_path(uri.path()) {
        SimpleRequest::Index => {
            metrics::counter!("pypi_mirror_simple_requests_total", "mode" => "index").increment(1);

            let store = Arc::clone(&state.packages);
            let page = tokio::task::spawn_blocking(move || index_page(store.as_ref())).await??;

            Ok(html_response(page.html, page.last_serial))
        }
        SimpleRequest::Project(name) => {
            metrics::counter!("pypi_mirror_simple_requests_total", "mode" => "project")
                .increment(1);

            let store = Arc::clone(&state.packages);
            let mirror = Arc::clone(&state.files);
            let (package, page) = tokio::task::spawn_blocking(move || {
                project_page(store.as_ref(), mirror.as_ref(), &name)
            })
            .await??;

            Ok(html_response(page.html, Some(package.last_serial)))
        }
    }
}
