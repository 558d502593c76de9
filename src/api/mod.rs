use crate::config::Config;
use crate::error::Result;
use crate::models::StoreSummary;
use crate::name::canonicalize;
use crate::simple::{FileListing, find_project};
use crate::storage::{FileStore, PackageStore};
use axum::{
    Json,
    extract::{Path as AxumPath, State},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Shared, read-only state handed to every request
pub struct AppState {
    pub packages: Arc<dyn PackageStore>,
    pub files: Arc<dyn FileStore>,
    pub config: Config,
}

/// Mirror-wide status
#[derive(Debug, Serialize, ToSchema)]
pub struct MirrorStatus {
    /// Number of mirrored projects
    pub packages: u64,
    /// Highest project serial in the mirror
    pub last_serial: Option<i64>,
    /// Server version
    #[schema(example = "0.4.0")]
    pub version: String,
}

/// A release file and whether the mirror holds it
#[derive(Debug, Serialize, ToSchema)]
pub struct FileStatus {
    pub filename: String,
    pub release: String,
    /// Path of the file beneath the mirror root, absent when the stored URL is unusable
    pub url_path: Option<String>,
    /// Size in bytes
    pub size: i64,
    pub requires_python: Option<String>,
    pub sha256: String,
    /// Whether the file exists in the mirror
    pub present: bool,
}

/// A project's files as the simple page sees them
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectFiles {
    /// Stored project name
    pub name: String,
    pub last_serial: i64,
    pub files: Vec<FileStatus>,
    /// Files linked from the simple page
    pub rendered: usize,
    /// Files absent from the mirror
    pub missing: usize,
}

/// Mirror status
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Mirror status", body = MirrorStatus),
        (status = 500, description = "Internal server error")
    ),
    tag = "mirror"
)]
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<MirrorStatus>> {
    let store = Arc::clone(&state.packages);
    let StoreSummary {
        packages,
        last_serial,
    } = tokio::task::spawn_blocking(move || store.summary()).await??;

    Ok(Json(MirrorStatus {
        packages,
        last_serial,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Files of a project with their presence in the mirror
#[utoipa::path(
    get,
    path = "/projects/{name}",
    params(
        ("name" = String, Path, description = "Project name, canonicalized before lookup")
    ),
    responses(
        (status = 200, description = "Project files", body = ProjectFiles),
        (status = 403, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "mirror"
)]
pub async fn project_files(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
) -> Result<Json<ProjectFiles>> {
    let store = Arc::clone(&state.packages);
    let mirror = Arc::clone(&state.files);
    let canonical = canonicalize(&name);

    let project = tokio::task::spawn_blocking(move || -> Result<ProjectFiles> {
        let package = find_project(store.as_ref(), &canonical)?;
        let rows = store.list_files(&package.name)?;

        let files: Vec<FileStatus> = rows
            .items
            .into_iter()
            .map(|file| {
                let listing = FileListing::classify(&file, mirror.as_ref());
                FileStatus {
                    url_path: listing.path().map(str::to_string),
                    present: matches!(listing, FileListing::Present(_)),
                    filename: file.filename,
                    release: file.release,
                    size: file.size,
                    requires_python: file.requires_python,
                    sha256: file.sha256_digest,
                }
            })
            .collect();

        let rendered = files.iter().filter(|f| f.present).count();
        let missing = files
            .iter()
            .filter(|f| !f.present && f.url_path.is_some())
            .count();

        Ok(ProjectFiles {
            name: package.name,
            last_serial: package.last_serial,
            files,
            rendered,
            missing,
        })
    })
    .await??;

    Ok(Json(project))
}

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(MirrorStatus, FileStatus, ProjectFiles)
    ),
    tags(
        (name = "mirror", description = "Mirror inspection endpoints")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes, mounted under `/api`
pub fn create_api_router(state: Arc<AppState>) -> OpenApiRouter {
    let routes = OpenApiRouter::new()
        .routes(routes!(status))
        .routes(routes!(project_files))
        .with_state(state);

    OpenApiRouter::with_openapi(ApiDoc::openapi()).nest("/api", routes)
}
