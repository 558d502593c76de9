//! Read-only access to the mirror: package metadata in SQLite and release
//! files on disk.
//!
//! Both collaborators are traits so handlers receive them injected through
//! application state and tests can substitute their own.

mod mirror;
mod sqlite;

pub use mirror::MirrorRoot;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{FileRecord, Package, Rows, StoreSummary};

/// Query surface over package and file metadata
pub trait PackageStore: Send + Sync {
    /// All packages, ordered ascending by stored name
    fn list_packages(&self) -> Result<Rows<Package>>;

    /// The package whose name canonicalizes to `canonical_name`
    fn find_package(&self, canonical_name: &str) -> Result<Option<Package>>;

    /// File rows of the package stored as `project_name`
    fn list_files(&self, project_name: &str) -> Result<Rows<FileRecord>>;

    /// Package count and highest serial
    fn summary(&self) -> Result<StoreSummary>;
}

/// Existence check over the mirror's on-disk layout
pub trait FileStore: Send + Sync {
    /// Whether a release file exists at `url_path` beneath the mirror root.
    /// Errors other than "not found" count as absent.
    fn exists(&self, url_path: &str) -> bool;
}
