//! Shared test helpers for creating DownloadBtnManager instances in tests.

use crate::button::{DownloadButton, StepArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manager::{ButtonOptions, DownloadBtnManager};
use crate::pipeline::{ButtonClass, ButtonRegistry, FormResponse, emitter};
use crate::progress::ProgressMarker;
use crate::types::{DownloadEntry, SessionId};
use tempfile::tempdir;

/// Form step: keep the submitted `filenames` that appear in the `allowed` kwarg
pub(crate) fn select_files(
    button: &mut DownloadButton,
    form: &FormResponse,
    args: &StepArgs,
) -> Result<()> {
    let allowed: Vec<&str> = args
        .get_kw("allowed")
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    button.downloads = form
        .get_all("filenames")
        .into_iter()
        .filter(|name| allowed.contains(name))
        .map(|name| DownloadEntry::named(format!("https://files.example/{name}"), name))
        .collect();
    Ok(())
}

/// Classes used by the manager and API tests
///
/// - `DownloadBtn`: `select_files` form step; `create_file` and `fail` file steps
/// - `ZipDownloadBtn`: `zip_files` file step writing a two-file archive
pub(crate) fn test_registry() -> ButtonRegistry {
    let download_btn = ButtonClass::new("DownloadBtn")
        .form_handler("select_files", select_files)
        .file_creator("create_file", |btn, args| {
            emitter(move |tx| async move {
                let name = args.get_str(0).unwrap_or("file.txt").to_string();
                tx.emit(btn.reset(&ProgressMarker::at(&format!("Creating {name}"), 0.0)).await?)
                    .await?;
                tx.emit(btn.report(&ProgressMarker::at("Writing", 50.0))).await?;
                btn.add_transient_download(DownloadEntry::named(
                    format!("https://files.example/generated/{name}"),
                    name,
                ))
                .await;
                tx.emit(btn.report(&ProgressMarker::at("Writing", 100.0))).await
            })
        })
        .file_creator("fail", |_, _| {
            emitter(|_| async { Err::<(), _>(Error::Other("generator crashed".into())) })
        });

    let zip_btn = ButtonClass::new("ZipDownloadBtn").file_creator("zip_files", |btn, _| {
        emitter(move |tx| async move {
            tx.emit(btn.reset(&ProgressMarker::at("Zipping", 0.0)).await?)
                .await?;
            btn.write_zip(
                "files.zip",
                vec![
                    ("a.txt".to_string(), b"alpha".to_vec()),
                    ("b.txt".to_string(), b"beta".to_vec()),
                ],
            )
            .await?;
            tx.emit(btn.report(&ProgressMarker::at("Zipping", 100.0))).await
        })
    });

    ButtonRegistry::new().with(download_btn).with(zip_btn)
}

/// Helper to create a test manager with a SQLite database in a temp dir.
/// Returns the manager and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager() -> (DownloadBtnManager, tempfile::TempDir) {
    create_test_manager_with(|_| {}).await
}

/// Like [`create_test_manager`], with a chance to adjust the config first
pub(crate) async fn create_test_manager_with(
    configure: impl FnOnce(&mut Config),
) -> (DownloadBtnManager, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.artifacts.temp_dir = temp_dir.path().join("artifacts");
    configure(&mut config);

    let manager = DownloadBtnManager::new(config, test_registry())
        .await
        .unwrap();
    (manager, temp_dir)
}

/// A button of class `DownloadBtn` with a `select_files` step allowing a.txt and b.txt
/// and one `create_file` step
pub(crate) async fn create_select_files_button(manager: &DownloadBtnManager) -> DownloadButton {
    let mut button = manager
        .create(
            "DownloadBtn",
            ButtonOptions {
                download_message: Some("Download Complete".to_string()),
                ..ButtonOptions::with_text("Download files")
            },
        )
        .await
        .unwrap();
    button.add_form_handling_step(
        "select_files",
        StepArgs::new().kwarg("allowed", serde_json::json!(["a.txt", "b.txt"])),
    );
    button.add_file_creation_step("create_file", StepArgs::new().arg("report.txt"));
    manager.save(&button).await.unwrap();
    button
}

/// A fixed session id
pub(crate) fn session() -> SessionId {
    SessionId::new("test-session")
}

/// Pull the CSRF token out of a rendered driver script
pub(crate) fn script_token(script: &str) -> String {
    let start = script.find(r#""csrf_token":""#).unwrap() + r#""csrf_token":""#.len();
    script[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}
