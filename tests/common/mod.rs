#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use pypi_mirror::api::AppState;
use pypi_mirror::build_router;
use pypi_mirror::config::Config;
use pypi_mirror::storage::{MirrorRoot, SqliteStore};
use rusqlite::{Connection, params};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const SCHEMA: &str = "
    CREATE TABLE package (
        name            TEXT NOT NULL PRIMARY KEY,
        last_serial     INTEGER NOT NULL
    );
    CREATE TABLE file (
        name            TEXT NOT NULL,
        release         TEXT NOT NULL,
        filename        TEXT,
        url             TEXT,
        size            INTEGER NOT NULL,
        requires_python TEXT,
        sha256_digest   TEXT
    );
";

/// Upstream host used in seeded file URLs
pub const FILES_HOST: &str = "https://files.pythonhosted.org";

/// A temporary mirror root holding a seeded `pypi.db`
pub struct TestMirror {
    dir: TempDir,
}

impl TestMirror {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("pypi.db")).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn db(&self) -> Connection {
        Connection::open(self.dir.path().join("pypi.db")).unwrap()
    }

    pub fn add_package(&self, name: &str, last_serial: i64) {
        self.db()
            .execute(
                "INSERT INTO package (name, last_serial) VALUES (?1, ?2)",
                params![name, last_serial],
            )
            .unwrap();
    }

    /// Record a file row for `project` at `/packages/<subdir>/<filename>`
    /// and return its URL path
    pub fn add_file(
        &self,
        project: &str,
        release: &str,
        filename: &str,
        requires_python: Option<&str>,
    ) -> String {
        let path = format!("/packages/{}/{}", &project[..1], filename);
        self.db()
            .execute(
                "INSERT INTO file (name, release, filename, url, size, requires_python, sha256_digest)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project,
                    release,
                    filename,
                    format!("{}{}", FILES_HOST, path),
                    1024,
                    requires_python,
                    format!("sha-{}", filename)
                ],
            )
            .unwrap();
        path
    }

    /// Put a release file on disk at `url_path`
    pub fn place(&self, url_path: &str, contents: &[u8]) {
        let path = self.dir.path().join(url_path.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Record a file row and put the file on disk
    pub fn add_present_file(&self, project: &str, release: &str, filename: &str) -> String {
        let path = self.add_file(project, release, filename, None);
        self.place(&path, b"release file");
        path
    }

    pub fn app(&self) -> Router {
        self.app_with(|_| {})
    }

    pub fn app_with(&self, configure: impl FnOnce(&mut Config)) -> Router {
        let mut config = Config::default();
        config.mirror.root = self.root();
        configure(&mut config);

        let packages = SqliteStore::open(config.mirror.database_path()).unwrap();
        let state = Arc::new(AppState {
            packages: Arc::new(packages),
            files: Arc::new(MirrorRoot::new(config.mirror.root_path())),
            config,
        });

        build_router(state, None)
    }
}

/// Issue a GET and collect status, headers and body text
pub async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}
