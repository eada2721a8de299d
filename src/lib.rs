//! # download-btn
//!
//! Server-side download buttons for axum applications.
//!
//! A page renders a button, a progress bar and a small driver script. When the
//! user clicks, the script posts the surrounding form to the button's
//! form-handling steps, then opens an event stream that runs its file-creation
//! steps and reports progress. The final `download_ready` event carries the
//! manifest the browser fetches and saves.
//!
//! ## Design
//!
//! - **Steps by name** - buttons persist step names and arguments; code lives
//!   in a [`ButtonClass`] registered at startup
//! - **Session-scoped CSRF** - every endpoint checks a token issued when the
//!   button's script was rendered
//! - **One run per button** - a second concurrent run is rejected
//! - **Commit on success** - a failed run leaves the stored button untouched
//!
//! ## Quick Start
//!
//! ```no_run
//! use download_btn::{
//!     ButtonClass, ButtonOptions, ButtonRegistry, Config, DownloadBtnManager, ProgressMarker,
//!     SessionId, emitter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ButtonRegistry::new().with(
//!         ButtonClass::new("ReportBtn").file_creator("build_report", |btn, _args| {
//!             emitter(move |tx| async move {
//!                 tx.emit(btn.report(&ProgressMarker::at("Building report", 50.0)))
//!                     .await?;
//!                 btn.add_transient_download("/reports/latest.csv").await;
//!                 Ok(())
//!             })
//!         }),
//!     );
//!
//!     let manager = DownloadBtnManager::new(Config::default(), registry).await?;
//!     let button = manager
//!         .get_or_create(
//!             "ReportBtn",
//!             "report",
//!             ButtonOptions::with_text("Download report"),
//!         )
//!         .await?;
//!
//!     // Markup to embed in the page
//!     let rendered = manager.render(&SessionId::new("session-from-cookie"), &button)?;
//!     println!("{}{}{}", rendered.button, rendered.progress, rendered.script);
//!
//!     download_btn::run_with_shutdown(manager).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP endpoints
pub mod api;
/// Button model and rendering settings
pub mod button;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// CSRF tokens, button resolution and zip artifacts
pub mod gateway;
/// Main entry point (decomposed into focused submodules)
pub mod manager;
/// Step pipelines and the class registry
pub mod pipeline;
/// Progress markers and wire events
pub mod progress;
/// Template rendering
pub mod render;
/// File-creation runs and their event streams
pub mod stream;
/// Core identifier and manifest types
pub mod types;

// Re-export commonly used types
pub use button::{DownloadButton, RenderConfig, RenderOverrides, Step, StepArgs};
pub use config::Config;
pub use db::{Database, MemoryRecordStore, RecordStore};
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Pipeline, Result, ToHttpStatus};
pub use gateway::{ArtifactStore, Gateway, MemorySessionStore, SessionStore};
pub use manager::{ArtifactDownload, ButtonOptions, DownloadBtnManager, RenderedButton};
pub use pipeline::{
    ButtonClass, ButtonHandle, ButtonRegistry, Emitter, EventStream, FormResponse, emitter,
    events,
};
pub use progress::{DownloadReady, ProgressMarker, WireEvent};
pub use render::{TemplateRenderer, TeraRenderer};
pub use stream::{RunState, RunStream};
pub use types::{ButtonId, CachePolicy, DownloadEntry, ManifestItem, SessionId};

/// Serve the button endpoints until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// In-flight event streams are dropped on shutdown, which cancels their runs.
///
/// # Example
///
/// ```no_run
/// use download_btn::{ButtonRegistry, Config, DownloadBtnManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadBtnManager::new(Config::default(), ButtonRegistry::new()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadBtnManager) -> Result<()> {
    api::start_api_server(manager, wait_for_signal()).await
}

/// Resolve once the process receives a termination signal
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once the process receives a termination signal
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
