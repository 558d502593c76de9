use serde::{Deserialize, Serialize};

/// A mirrored project as recorded by the population tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Project name as stored (not necessarily canonical)
    pub name: String,
    /// Upstream serial of the most recent change to this project
    pub last_serial: i64,
}

/// A release file belonging to a mirrored project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stored name of the owning project
    pub project_name: String,
    pub release: String,
    pub filename: String,
    /// Upstream download URL; its path locates the file under the mirror root
    pub url: String,
    /// File size in bytes
    pub size: i64,
    pub requires_python: Option<String>,
    pub sha256_digest: String,
}

/// Mirror-wide totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Number of mirrored projects
    pub packages: u64,
    /// Highest serial across all projects, absent for an empty store
    pub last_serial: Option<i64>,
}

/// Rows read from the store, with the number of rows that failed to decode
#[derive(Debug, Clone, Default)]
pub struct Rows<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}
