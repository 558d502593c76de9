use axum::http::StatusCode;

mod common;
use common::{TestMirror, get};

#[tokio::test]
async fn test_server_starts_and_routes_registered() {
    let mirror = TestMirror::new();
    let app = mirror.app();

    // Test that API docs endpoint exists
    let (status, _, _) = get(&app, "/api-docs").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_package_files_are_served_from_mirror() {
    let mirror = TestMirror::new();
    mirror.place("/packages/ab/cd/foo-1.0.tar.gz", b"sdist bytes");
    let app = mirror.app();

    let (status, _, body) = get(&app, "/packages/ab/cd/foo-1.0.tar.gz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "sdist bytes");
}

#[tokio::test]
async fn test_link_from_project_page_resolves_to_served_file() {
    let mirror = TestMirror::new();
    mirror.add_package("foo", 1);
    let path = mirror.add_present_file("foo", "1.0", "foo-1.0.tar.gz");
    let app = mirror.app();

    let (_, _, page) = get(&app, "/simple/foo/").await;
    assert!(page.contains(&format!("href=\"../..{}#sha256=", path)));

    // ../../ from /simple/foo/ is the server root
    let (status, _, body) = get(&app, &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "release file");
}

#[tokio::test]
async fn test_serve_file_not_found() {
    let mirror = TestMirror::new();
    let app = mirror.app();

    let (status, _, _) = get(&app, "/packages/ab/cd/nonexistent.whl").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unrouted_path_is_not_found_by_default() {
    let mirror = TestMirror::new();
    let app = mirror.app();

    let (status, _, body) = get(&app, "/hello").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_echo_fallback_describes_request() {
    let mirror = TestMirror::new();
    let app = mirror.app_with(|config| config.server.echo_fallback = true);

    let (status, _, body) = get(&app, "/hello?x=1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("Hello from pypi-mirror"));
    assert!(body.contains("URL: /hello?x=1"));
    assert!(body.contains("Method: GET"));
}
