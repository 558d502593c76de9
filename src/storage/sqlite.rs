use super::PackageStore;
use crate::error::Result;
use crate::models::{FileRecord, Package, Rows, StoreSummary};
use crate::name::canonicalize;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a query waits on a database locked by the population tool
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Package metadata in the SQLite database written by the mirror crawler.
///
/// Every query opens its own read-only connection, so concurrent requests
/// never contend for a shared handle.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the store, checking once that the database is readable
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.create_scalar_function(
            "canonical_name",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let name: Option<String> = ctx.get(0)?;
                Ok(name.map(|n| canonicalize(&n)))
            },
        )?;
        Ok(conn)
    }
}

/// `LIKE` pattern matching every stored name that could canonicalize to
/// `canonical`: each `-` stands for a separator run, wildcards are escaped.
/// SQLite's `LIKE` folds ASCII case only, which covers valid project names.
fn canonical_like_pattern(canonical: &str) -> String {
    let mut pattern = String::with_capacity(canonical.len());
    for c in canonical.chars() {
        match c {
            '-' => pattern.push('%'),
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            _ => pattern.push(c),
        }
    }
    pattern
}

/// Keep decodable rows; log and count the rest
fn collect_rows<T>(rows: impl Iterator<Item = rusqlite::Result<T>>, table: &str) -> Rows<T> {
    let mut collected = Rows {
        items: Vec::new(),
        skipped: 0,
    };

    for row in rows {
        match row {
            Ok(item) => collected.items.push(item),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping malformed row");
                collected.skipped += 1;
            }
        }
    }

    collected
}

fn package_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        name: row.get(0)?,
        last_serial: row.get(1)?,
    })
}

impl PackageStore for SqliteStore {
    fn list_packages(&self) -> Result<Rows<Package>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name, last_serial FROM package ORDER BY name")?;
        let rows = stmt.query_map([], package_from_row)?;

        Ok(collect_rows(rows, "package"))
    }

    fn find_package(&self, canonical_name: &str) -> Result<Option<Package>> {
        let conn = self.connect()?;

        // Crawled names are usually stored canonical already, so try the
        // indexed exact match first. The fallback still scans the table, but
        // the LIKE prefilter runs in SQLite and keeps canonical_name() calls
        // to near-matches.
        let pattern = canonical_like_pattern(canonical_name);
        for sql in [
            "SELECT name, last_serial FROM package WHERE name = ?1",
            "SELECT name, last_serial FROM package
             WHERE name LIKE ?2 ESCAPE '\\' AND canonical_name(name) = ?1
             ORDER BY name",
        ] {
            let mut stmt = conn.prepare(sql)?;
            let rows = if stmt.parameter_count() == 1 {
                stmt.query_map(params![canonical_name], package_from_row)?
            } else {
                stmt.query_map(params![canonical_name, pattern], package_from_row)?
            };
            if let Some(package) = collect_rows(rows, "package").items.into_iter().next() {
                return Ok(Some(package));
            }
        }

        Ok(None)
    }

    fn list_files(&self, project_name: &str) -> Result<Rows<FileRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT name, release, filename, url, size, requires_python, sha256_digest
             FROM file
             WHERE name = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![project_name], |row| {
            Ok(FileRecord {
                project_name: row.get(0)?,
                release: row.get(1)?,
                filename: row.get(2)?,
                url: row.get(3)?,
                size: row.get(4)?,
                requires_python: row.get(5)?,
                sha256_digest: row.get(6)?,
            })
        })?;

        Ok(collect_rows(rows, "file"))
    }

    fn summary(&self) -> Result<StoreSummary> {
        let conn = self.connect()?;
        let (packages, last_serial): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(last_serial) FROM package",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreSummary {
            packages: packages.max(0) as u64,
            last_serial,
        })
    }
}
