//! Download server example
//!
//! Serves a page with a file picker and a download button, next to the
//! button endpoints.
//!
//! After starting, open http://127.0.0.1:5000/ in a browser:
//! - Tick some reports and click the button
//! - The form is posted to the `select_reports` step
//! - The `bundle_reports` step streams progress while it builds a zip
//! - The browser saves the selected reports plus the zip
//!
//! Set `RUST_LOG=download_btn=debug` for per-request logging.

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use download_btn::{
    ButtonClass, ButtonOptions, ButtonRegistry, Config, DownloadBtnManager, DownloadButton,
    DownloadEntry, FormResponse, ProgressMarker, SessionId, StepArgs, emitter,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const REPORTS: [&str; 3] = ["sales.csv", "inventory.csv", "returns.csv"];

/// Form step: keep the ticked reports that exist
fn select_reports(
    button: &mut DownloadButton,
    form: &FormResponse,
    _args: &StepArgs,
) -> download_btn::Result<()> {
    button.downloads = form
        .get_all("reports")
        .into_iter()
        .filter(|name| REPORTS.contains(name))
        .map(|name| DownloadEntry::named(format!("/files/{name}"), name))
        .collect();
    Ok(())
}

fn registry() -> ButtonRegistry {
    let reports = ButtonClass::new("ReportBtn")
        .form_handler("select_reports", select_reports)
        .file_creator("bundle_reports", |btn, args| {
            emitter(move |tx| async move {
                let title = args.get_str(0).unwrap_or("Bundling").to_string();
                tx.emit(btn.reset(&ProgressMarker::at(&title, 0.0)).await?)
                    .await?;

                let mut files = Vec::new();
                for (i, name) in REPORTS.iter().enumerate() {
                    if btn.cancellation().is_cancelled() {
                        return Ok(());
                    }
                    tokio::time::sleep(Duration::from_millis(600)).await;
                    files.push((name.to_string(), report_body(name).into_bytes()));

                    let percent = (i + 1) as f64 * 100.0 / (REPORTS.len() + 1) as f64;
                    tx.emit(btn.report(&ProgressMarker::at(&format!("Adding {name}"), percent)))
                        .await?;
                }

                btn.write_zip("all-reports.zip", files).await?;
                tx.emit(btn.report(&ProgressMarker::at("Done", 100.0))).await
            })
        });

    ButtonRegistry::new().with(reports)
}

fn report_body(name: &str) -> String {
    format!("report,generated\n{name},{}\n", chrono::Utc::now().to_rfc3339())
}

#[derive(Clone)]
struct Page {
    manager: DownloadBtnManager,
    button: DownloadButton,
}

async fn index(State(page): State<Page>, headers: HeaderMap) -> Response {
    let cookie_name = page.manager.config().session.cookie_name.clone();
    let (session, new_cookie) = match SessionId::from_headers(&headers, &cookie_name) {
        Some(session) => (session, None),
        None => {
            let session = SessionId::generate();
            let cookie = session.cookie(&cookie_name);
            (session, Some(cookie))
        }
    };

    let rendered = match page.manager.render(&session, &page.button) {
        Ok(rendered) => rendered,
        Err(e) => return e.into_response(),
    };

    let checkboxes: String = REPORTS
        .iter()
        .map(|name| {
            format!(
                r#"<label><input type="checkbox" name="reports" value="{name}" checked> {name}</label><br>"#
            )
        })
        .collect();

    let html = format!(
        r#"<!doctype html>
<html>
<head><title>download-btn demo</title></head>
<body>
<form>{checkboxes}</form>
{button}
<div class="progress">{progress}</div>
{script}
</body>
</html>"#,
        button = rendered.button,
        progress = rendered.progress,
        script = rendered.script,
    );

    let mut response = Html(html).into_response();
    if let Some(cookie) = new_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

async fn report_file(Path(name): Path<String>) -> Response {
    if !REPORTS.contains(&name.as_str()) {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "text/csv")], report_body(&name)).into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::default();
    config.persistence.database_path = std::env::temp_dir().join("download-btn-demo.db");
    config.artifacts.temp_dir = std::env::temp_dir().join("download-btn-demo");
    config.server.swagger_ui = true;

    let manager = DownloadBtnManager::new(config, registry()).await?;

    let mut button = manager
        .get_or_create(
            "ReportBtn",
            "demo-reports",
            ButtonOptions {
                download_message: Some("Reports saved".to_string()),
                ..ButtonOptions::with_text("Download reports")
            },
        )
        .await?;
    if button.file_creation_steps().is_empty() {
        button.add_form_handling_step("select_reports", StepArgs::new());
        button.add_file_creation_step("bundle_reports", StepArgs::new().arg("Bundling reports"));
        manager.save(&button).await?;
    }

    let bind_address = manager.config().server.bind_address;
    let page = Router::new()
        .route("/", get(index))
        .route("/files/:name", get(report_file))
        .with_state(Page {
            manager: manager.clone(),
            button,
        });
    let app = download_btn::api::create_router(manager).merge(page);

    println!("Demo page:  http://{bind_address}/");
    println!("Swagger UI: http://{bind_address}/swagger-ui");

    let listener = TcpListener::bind(bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(download_btn::wait_for_signal())
        .await?;

    Ok(())
}
