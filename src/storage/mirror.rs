use super::FileStore;
use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reject empty, ".", ".." and separator or NUL carrying components
fn is_safe_component(component: &str) -> bool {
    !(component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('\\')
        || component.contains('\0'))
}

/// Release files stored under a local directory, laid out by URL path
/// (e.g. `<root>/packages/ab/cd/.../name-1.0.tar.gz`)
#[derive(Debug, Clone)]
pub struct MirrorRoot {
    root: PathBuf,
}

impl MirrorRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL path (percent-encoded, leading slash optional) to a path
    /// beneath the root. Returns `None` for paths that could escape the root
    /// or name nothing.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(url_path).decode_utf8().ok()?;

        let mut path = self.root.clone();
        let mut depth = 0;
        for segment in decoded.split('/').filter(|s| !s.is_empty()) {
            if !is_safe_component(segment) {
                tracing::warn!(url_path, "Rejected unsafe release file path");
                return None;
            }
            path.push(segment);
            depth += 1;
        }

        (depth > 0).then_some(path)
    }
}

impl FileStore for MirrorRoot {
    fn exists(&self, url_path: &str) -> bool {
        let Some(path) = self.resolve(url_path) else {
            return false;
        };

        match std::fs::metadata(&path) {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Treating unreadable file as missing");
                false
            }
        }
    }
}
