use crate::models::{FileRecord, Package};
use crate::name::canonicalize;
use crate::storage::FileStore;
use std::sync::LazyLock;
use url::Url;

/// Base for stored URLs that carry only a path
static URL_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://mirror.invalid/").expect("base URL is valid"));

/// Machine-readable serial marker that sync clients look for at the end of a
/// project page
pub fn serial_sentinel(last_serial: i64) -> String {
    format!("<!--SERIAL {{{}}}-->", last_serial)
}

/// Path component of a stored download URL, without the leading slash.
/// Relative URLs are accepted; URLs without a usable path give `None`.
pub fn url_path(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let url = Url::options().base_url(Some(&*URL_BASE)).parse(raw).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }

    let path = url.path().trim_start_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

/// How a file row relates to the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileListing {
    /// The file is on disk at this URL path
    Present(String),
    /// The URL path is valid but nothing is on disk there
    Missing(String),
    /// The stored URL has no usable path
    Malformed,
}

impl FileListing {
    pub fn classify(file: &FileRecord, mirror: &dyn FileStore) -> Self {
        match url_path(&file.url) {
            Some(path) if mirror.exists(&path) => FileListing::Present(path),
            Some(path) => FileListing::Missing(path),
            None => FileListing::Malformed,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            FileListing::Present(path) | FileListing::Missing(path) => Some(path),
            FileListing::Malformed => None,
        }
    }
}

/// Generate the project list page
pub fn render_index(packages: &[Package]) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Simple index</title>\n  </head>\n  <body>\n",
    );

    for package in packages {
        page.push_str(&format!(
            "    <a href=\"./{}\">{}</a><br/>\n",
            canonicalize(&package.name),
            package.name
        ));
    }

    page.push_str("  </body>\n</html>\n");
    page
}

/// A rendered project page with its filtering tallies
#[derive(Debug, Clone)]
pub struct ProjectPage {
    pub html: String,
    /// Anchors emitted
    pub rendered: usize,
    /// Rows whose file is not in the mirror
    pub missing: usize,
    /// Rows with an unusable URL
    pub skipped: usize,
}

fn render_anchor(page: &mut String, file: &FileRecord, path: &str) {
    let requires_python = file
        .requires_python
        .as_deref()
        .map(|spec| {
            format!(
                " data-requires-python=\"{}\"",
                html_escape::encode_double_quoted_attribute(spec)
            )
        })
        .unwrap_or_default();

    page.push_str(&format!(
        "    <a href=\"../../{}#sha256={}\"{}>{}</a><br/>\n",
        path, file.sha256_digest, requires_python, file.filename
    ));
}

/// Generate a project's file list page, linking only files present in the
/// mirror. The serial sentinel is always written, however many files were
/// left out.
pub fn render_project(
    package: &Package,
    files: &[FileRecord],
    mirror: &dyn FileStore,
) -> ProjectPage {
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Links for {name}</title>\n  </head>\n  <body>\n    <h1>Links for {name}</h1>\n",
        name = package.name
    );
    let mut rendered = 0;
    let mut missing = 0;
    let mut skipped = 0;

    for file in files {
        match FileListing::classify(file, mirror) {
            FileListing::Present(path) => {
                render_anchor(&mut page, file, &path);
                rendered += 1;
            }
            FileListing::Missing(_) => missing += 1,
            FileListing::Malformed => {
                tracing::warn!(
                    project = %package.name,
                    filename = %file.filename,
                    url = %file.url,
                    "Skipping file with malformed URL"
                );
                skipped += 1;
            }
        }
    }

    page.push_str("  </body>\n</html>\n");
    page.push_str(&serial_sentinel(package.last_serial));

    ProjectPage {
        html: page,
        rendered,
        missing,
        skipped,
    }
}
