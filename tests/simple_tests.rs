use axum::http::StatusCode;

mod common;
use common::{TestMirror, get};

fn anchor_count(html: &str) -> usize {
    html.matches("<a ").count()
}

#[tokio::test]
async fn test_index_lists_canonical_links() {
    let mirror = TestMirror::new();
    mirror.add_package("Foo", 1);
    mirror.add_package("bar-baz", 2);
    let app = mirror.app();

    let (status, headers, body) = get(&app, "/simple/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(headers.get("x-pypi-last-serial").unwrap(), "2");
    assert_eq!(anchor_count(&body), 2);
    assert!(body.contains("<a href=\"./foo\">Foo</a>"));
    assert!(body.contains("<a href=\"./bar-baz\">bar-baz</a>"));
}

#[tokio::test]
async fn test_index_empty_store() {
    let mirror = TestMirror::new();
    let app = mirror.app();

    let (status, headers, body) = get(&app, "/simple/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("x-pypi-last-serial").is_none());
    assert_eq!(anchor_count(&body), 0);
    assert!(body.contains("<title>Simple index</title>"));
}

#[tokio::test]
async fn test_simple_without_slash_redirects() {
    let mirror = TestMirror::new();
    let app = mirror.app();

    let (status, headers, _) = get(&app, "/simple").await;

    assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(headers.get("location").unwrap(), "/simple/");
}

#[tokio::test]
async fn test_unknown_project_is_forbidden() {
    let mirror = TestMirror::new();
    mirror.add_package("requests", 10);
    let app = mirror.app();

    let (status, _, body) = get(&app, "/simple/not-mirrored/").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_project_page_filters_missing_files_and_keeps_serial() {
    let mirror = TestMirror::new();
    mirror.add_package("foo", 42);
    mirror.add_present_file("foo", "1.0", "foo-1.0.tar.gz");
    mirror.add_file("foo", "1.0", "foo-1.0-py3-none-any.whl", None);
    mirror.add_present_file("foo", "1.1", "foo-1.1.tar.gz");
    let app = mirror.app();

    let (status, headers, body) = get(&app, "/simple/foo/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-pypi-last-serial").unwrap(), "42");
    assert_eq!(anchor_count(&body), 2);
    assert!(!body.contains("foo-1.0-py3-none-any.whl"));
    assert!(body.contains(
        "<a href=\"../../packages/f/foo-1.0.tar.gz#sha256=sha-foo-1.0.tar.gz\">foo-1.0.tar.gz</a>"
    ));
    assert!(body.ends_with("<!--SERIAL {42}-->"));
}

#[tokio::test]
async fn test_project_with_every_file_missing_still_reports_serial() {
    let mirror = TestMirror::new();
    mirror.add_package("pruned", 7);
    mirror.add_file("pruned", "0.1", "pruned-0.1.tar.gz", None);
    let app = mirror.app();

    let (status, _, body) = get(&app, "/simple/pruned/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchor_count(&body), 0);
    assert!(body.contains("<!--SERIAL {7}-->"));
}

#[tokio::test]
async fn test_requires_python_is_escaped() {
    let mirror = TestMirror::new();
    mirror.add_package("modern", 3);
    let path = mirror.add_file("modern", "2.0", "modern-2.0.tar.gz", Some(">=3.8"));
    mirror.place(&path, b"sdist");
    let app = mirror.app();

    let (_, _, body) = get(&app, "/simple/modern/").await;

    assert!(body.contains("data-requires-python=\"&gt;=3.8\""));
}

#[tokio::test]
async fn test_project_name_is_canonicalized() {
    let mirror = TestMirror::new();
    mirror.add_package("django-rest-framework", 99);
    mirror.add_present_file("django-rest-framework", "3.0", "djangorestframework-3.0.tar.gz");
    let app = mirror.app();

    for uri in [
        "/simple/Django_REST-Framework/",
        "/simple/django.rest.framework",
        "/simple/DJANGO-REST-FRAMEWORK/",
    ] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(anchor_count(&body), 1, "{}", uri);
        assert!(body.contains("<!--SERIAL {99}-->"), "{}", uri);
    }
}

#[tokio::test]
async fn test_non_canonical_stored_name_is_found() {
    let mirror = TestMirror::new();
    mirror.add_package("Flask_SQLAlchemy", 12);
    mirror.add_present_file("Flask_SQLAlchemy", "3.1", "flask_sqlalchemy-3.1.tar.gz");
    let app = mirror.app();

    let (_, _, index) = get(&app, "/simple/").await;
    assert!(index.contains("<a href=\"./flask-sqlalchemy\">Flask_SQLAlchemy</a>"));

    let (status, _, body) = get(&app, "/simple/flask-sqlalchemy/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchor_count(&body), 1);
    assert!(body.contains("<h1>Links for Flask_SQLAlchemy</h1>"));
}

#[tokio::test]
async fn test_malformed_rows_do_not_break_pages() {
    let mirror = TestMirror::new();
    mirror.add_package("foo", 5);
    mirror.add_present_file("foo", "1.0", "foo-1.0.tar.gz");
    {
        let db = mirror.db();
        // NULL digest and an unusable URL
        db.execute_batch(
            "INSERT INTO file VALUES ('foo', '1.1', 'foo-1.1.tar.gz', 'https://x/packages/f/foo-1.1.tar.gz', 1, NULL, NULL);
             INSERT INTO file VALUES ('foo', '1.2', 'foo-1.2.tar.gz', '', 1, NULL, 'abc');",
        )
        .unwrap();
    }
    mirror.place("/packages/f/foo-1.1.tar.gz", b"x");
    let app = mirror.app();

    let (status, _, body) = get(&app, "/simple/foo/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchor_count(&body), 1);
    assert!(body.contains("foo-1.0.tar.gz"));
    assert!(body.ends_with("<!--SERIAL {5}-->"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_projects_do_not_cross_talk() {
    let mirror = TestMirror::new();
    mirror.add_package("alpha", 100);
    mirror.add_package("beta", 200);
    mirror.add_present_file("alpha", "1.0", "alpha-1.0.tar.gz");
    mirror.add_present_file("beta", "2.0", "beta-2.0.tar.gz");
    mirror.add_present_file("beta", "2.1", "beta-2.1.tar.gz");
    let app = mirror.app();

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let project = if i % 2 == 0 { "alpha" } else { "beta" };
            let (status, _, body) = get(&app, &format!("/simple/{}/", project)).await;
            (project, status, body)
        }));
    }

    for handle in handles {
        let (project, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        match project {
            "alpha" => {
                assert_eq!(anchor_count(&body), 1);
                assert!(body.contains("alpha-1.0.tar.gz"));
                assert!(!body.contains("beta-"));
                assert!(body.ends_with("<!--SERIAL {100}-->"));
            }
            _ => {
                assert_eq!(anchor_count(&body), 2);
                assert!(!body.contains("alpha-"));
                assert!(body.ends_with("<!--SERIAL {200}-->"));
            }
        }
    }
}
