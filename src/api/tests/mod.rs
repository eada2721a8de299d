use super::*;
use crate::manager::test_helpers::{
    create_select_files_button, create_test_manager, create_test_manager_with, session,
};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;


/// Cookie header carrying the fixed test session
const SESSION_COOKIE: &str = "download_btn_session=test-session";

/// GET request with the test session cookie
fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, SESSION_COOKIE)
        .body(Body::empty())
        .unwrap()
}

/// POST request with the test session cookie and a urlencoded body
fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, SESSION_COOKIE)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_string(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_shuts_down() {
    let (manager, _temp_dir) = create_test_manager_with(|config| {
        config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn(start_api_server(manager, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (manager, _temp_dir) = create_test_manager_with(|config| {
        config.server.cors_enabled = true;
        config.server.cors_origins = vec!["https://shop.example".to_string()];
    })
    .await;
    let app = create_router(manager);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/health")
        .header(header::ORIGIN, "https://shop.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://shop.example"
    );
}

#[tokio::test]
async fn test_cors_disabled_by_default() {
    let (manager, _temp_dir) = create_test_manager().await;
    let app = create_router(manager);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://shop.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_url_prefix_mounts_button_routes() {
    let (manager, _temp_dir) = create_test_manager_with(|config| {
        config.server.url_prefix = "/shop".to_string();
    })
    .await;
    let button = create_select_files_button(&manager).await;
    let token = manager.gateway().issue_token(&session(), &button);
    let app = create_router(manager);

    let prefixed = format!(
        "/shop/download-btn/downloaded/{}/DownloadBtn?csrf_token={token}",
        button.id()
    );
    let response = app
        .clone()
        .oneshot(post_form(&prefixed, ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let bare = format!(
        "/download-btn/downloaded/{}/DownloadBtn?csrf_token={token}",
        button.id()
    );
    let response = app.clone().oneshot(post_form(&bare, "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // System routes stay at the root
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
