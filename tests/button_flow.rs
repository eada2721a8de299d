//! End-to-end flow through the public API
//!
//! Renders a button for a session, then drives the endpoints the way the
//! driver script does: form post, file-creation event stream, completion.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use download_btn::{
    ButtonClass, ButtonOptions, ButtonRegistry, Config, DownloadBtnManager, DownloadEntry,
    ProgressMarker, SessionId, StepArgs, emitter,
};
use tower::ServiceExt;

fn registry() -> ButtonRegistry {
    ButtonRegistry::new().with(
        ButtonClass::new("InvoiceBtn")
            .form_handler("pick_invoices", |button, form, _args| {
                button.downloads = form
                    .get_all("invoice")
                    .into_iter()
                    .map(|n| DownloadEntry::named(format!("/invoices/{n}.pdf"), format!("{n}.pdf")))
                    .collect();
                Ok(())
            })
            .file_creator("render_summary", |btn, _args| {
                emitter(move |tx| async move {
                    tx.emit(btn.reset(&ProgressMarker::stage("Summarising")).await?)
                        .await?;
                    btn.add_transient_download("/invoices/summary.txt").await;
                    tx.emit(btn.report(&ProgressMarker::at("Summarising", 100.0)))
                        .await
                })
            }),
    )
}

fn token_from_script(script: &str) -> String {
    let marker = r#""csrf_token":""#;
    let start = script.find(marker).unwrap() + marker.len();
    script[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, "download_btn_session=browser-1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_render_submit_stream_and_complete() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("buttons.db");
    config.artifacts.temp_dir = temp_dir.path().join("artifacts");

    let manager = DownloadBtnManager::new(config, registry()).await.unwrap();
    let mut button = manager
        .get_or_create("InvoiceBtn", "invoices", ButtonOptions::with_text("Get invoices"))
        .await
        .unwrap();
    button.add_form_handling_step("pick_invoices", StepArgs::new());
    button.add_file_creation_step("render_summary", StepArgs::new());
    manager.save(&button).await.unwrap();

    let rendered = manager
        .render(&SessionId::new("browser-1"), &button)
        .unwrap();
    assert!(rendered.button.contains("Get invoices"));
    let token = token_from_script(&rendered.script);

    let app = download_btn::api::create_router(manager.clone());
    let id = button.id();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/download-btn/form/{id}/InvoiceBtn?csrf_token={token}"),
            "invoice=2024-01&invoice=2024-02",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/download-btn/create_files/{id}/InvoiceBtn?csrf_token={token}"),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    let ready = body
        .split("\n\n")
        .find(|frame| frame.starts_with("event: download_ready"))
        .and_then(|frame| frame.lines().find_map(|l| l.strip_prefix("data: ")))
        .unwrap();
    let ready: serde_json::Value = serde_json::from_str(ready).unwrap();
    let filenames: Vec<&str> = ready["downloads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["filename"].as_str().unwrap())
        .collect();
    assert_eq!(filenames, vec!["2024-01.pdf", "2024-02.pdf", "download"]);

    let response = app
        .oneshot(request(
            "POST",
            &format!("/download-btn/downloaded/{id}/InvoiceBtn?csrf_token={token}"),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let stored = manager.get(id).await.unwrap().unwrap();
    assert!(stored.downloaded);
    // Transient downloads are not persisted
    assert_eq!(stored.downloads.len(), 2);
}
