//! HTTP server for file sharing
//!
//! LAN HTTP server guarded by the shared password.

use super::ShareState;
use super::handlers::{download_handler, list_handler, upload_handler};
use crate::auth::require_password;
use anyhow::Result;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Default HTTP port for file sharing
pub const HTTP_PORT: u16 = 6969;

/// Handler for invalid routes
async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Middleware to add security headers
async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:;"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

/// Build the axum router.
///
/// API routes sit behind the password middleware. When `static_dir` is given
/// its files are served, unauthenticated, for any other path.
pub fn create_router(state: ShareState, static_dir: Option<&Path>, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);

    let router = Router::new()
        .route("/upload", post(upload_handler))
        .route("/files", get(list_handler))
        .route("/download/{filename}", get(download_handler))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_password,
        ))
        .layer(DefaultBodyLimit::max(body_limit));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(not_found_handler),
    };

    router
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_http_server(
    addr: SocketAddr,
    router: Router,
    cancel_token: Option<CancellationToken>,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("HTTP server starting on http://{}", listener.local_addr()?);

    if let Some(ct) = cancel_token {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                ct.cancelled().await;
                tracing::info!("HTTP server shutting down gracefully");
            })
            .await?;
    } else {
        axum::serve(listener, router).await?;
    }

    Ok(())
}

/// Start the HTTP server on all interfaces at `port`
pub async fn start_default_http_server(
    port: u16,
    router: Router,
    cancel_token: Option<CancellationToken>,
) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    start_http_server(addr, router, cancel_token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShareEvent;
    use crate::auth::{AUTH_HEADER, AuthGate};
    use crate::storage::FileStore;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::path::PathBuf;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const PASSWORD: &str = "Test#Pass123";
    const BOUNDARY: &str = "lanshare-test-boundary";

    fn test_setup() -> (Router, PathBuf, mpsc::Receiver<ShareEvent>) {
        let dir = std::env::temp_dir().join(format!("lanshare_http_{}", uuid::Uuid::new_v4()));
        let (tx, rx) = mpsc::channel(100);
        let state = ShareState {
            auth: AuthGate::new(PASSWORD),
            store: FileStore::new(dir.clone()),
            event_tx: tx,
        };
        (create_router(state, None, 1024 * 1024), dir, rx)
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, file_name, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        field, name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
                ),
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(password: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(password) = password {
            builder = builder.header(AUTH_HEADER, password);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get_request(uri: &str, password: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(password) = password {
            builder = builder.header(AUTH_HEADER, password);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_list_download_scenario() {
        let (router, dir, mut rx) = test_setup();

        let body = multipart_body(&[("files", Some("a.txt"), "0123456789")]);
        let response = router
            .clone()
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Uploaded: a.txt");

        match rx.recv().await.unwrap() {
            ShareEvent::UploadReceived { file_name, bytes, .. } => {
                assert_eq!(file_name, "a.txt");
                assert_eq!(bytes, 10);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let response = router
            .clone()
            .oneshot(get_request("/files", Some(PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"["a.txt"]"#);

        let response = router
            .clone()
            .oneshot(get_request("/download/a.txt", Some(PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-length").unwrap(), "10");
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(body_string(response).await, "0123456789");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_truncated_upload_discards_partial_file() {
        let (router, dir, mut rx) = test_setup();

        // Part headers and some data, but the body ends before the closing boundary
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"cut.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n0123456789",
            BOUNDARY
        )
        .into_bytes();

        let response = router
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.starts_with("Transfer interrupted"));

        match rx.recv().await.unwrap() {
            ShareEvent::UploadFailed {
                file_name, reason, ..
            } => {
                assert_eq!(file_name, "cut.bin");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!dir.join("cut.bin").exists());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_wrong_password_rejected_everywhere() {
        let (router, dir, _rx) = test_setup();

        for password in [None, Some(""), Some("wrong"), Some("Test#Pass123x")] {
            let body = multipart_body(&[("files", Some("evil.txt"), "x")]);
            let requests = vec![
                upload_request(password, body),
                get_request("/files", password),
                get_request("/download/a.txt", password),
                get_request("/download/..%2Fetc%2Fpasswd", password),
            ];
            for request in requests {
                let response = router.clone().oneshot(request).await.unwrap();
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
                assert_eq!(
                    body_string(response).await,
                    "Unauthorized: Incorrect or missing password"
                );
            }
        }

        assert!(!dir.join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_download_traversal_rejected() {
        let (router, dir, _rx) = test_setup();

        let response = router
            .oneshot(get_request("/download/..%2Fetc%2Fpasswd", Some(PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Invalid filename");

        // Rejected before the store touched the filesystem
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (router, dir, _rx) = test_setup();
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let response = router
            .oneshot(get_request("/download/ghost.bin", Some(PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "File not found");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_upload_without_files() {
        let (router, dir, _rx) = test_setup();

        let body = multipart_body(&[("note", None, "hello"), ("files", Some(""), "")]);
        let response = router
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "No files uploaded.");
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_upload_unsafe_name_and_unexpected_field() {
        let (router, dir, _rx) = test_setup();

        let body = multipart_body(&[("files", Some("../escape.txt"), "x")]);
        let response = router
            .clone()
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = multipart_body(&[("avatar", Some("me.png"), "x")]);
        let response = router
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Unexpected field");

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_upload_multiple_files_and_overwrite() {
        let (router, dir, _rx) = test_setup();

        let body = multipart_body(&[
            ("files", Some("one.bin"), "first"),
            ("files", Some("two.bin"), "second"),
        ]);
        let response = router
            .clone()
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "Uploaded: one.bin, two.bin");

        let body = multipart_body(&[("files", Some("one.bin"), "1")]);
        router
            .clone()
            .oneshot(upload_request(Some(PASSWORD), body))
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(dir.join("one.bin")).await.unwrap(), b"1");
        assert_eq!(tokio::fs::read(dir.join("two.bin")).await.unwrap(), b"second");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_list_storage_error() {
        let (router, _dir, _rx) = test_setup();

        // Upload directory was never created
        let response = router
            .oneshot(get_request("/files", Some(PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_security_headers() {
        let (router, _dir, _rx) = test_setup();

        let response = router
            .oneshot(get_request("/nowhere", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let headers = response.headers();
        assert!(headers.get("content-security-policy").is_some());
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    }

    #[tokio::test]
    async fn test_static_dir_served_without_password() {
        let dir = std::env::temp_dir().join(format!("lanshare_static_{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("index.html"), "<h1>lanshare</h1>").await.unwrap();

        let (tx, _rx) = mpsc::channel(100);
        let state = ShareState {
            auth: AuthGate::new(PASSWORD),
            store: FileStore::new(dir.join("uploads")),
            event_tx: tx,
        };
        let router = create_router(state, Some(&dir), 1024);

        let response = router
            .clone()
            .oneshot(get_request("/index.html", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>lanshare</h1>");

        let response = router
            .oneshot(get_request("/files", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
