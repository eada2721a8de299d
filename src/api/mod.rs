//! HTTP surface for download buttons
//!
//! Serves the endpoints the rendered driver script calls, plus health and
//! OpenAPI documentation. Host applications either run it standalone with
//! [`start_api_server`] or merge [`create_router`] into their own axum app,
//! next to the pages that render the buttons.

use crate::{DownloadBtnManager, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the router with all route definitions
///
/// # Routes
///
/// ## Buttons (mounted under `server.url_prefix`)
/// - `POST /download-btn/form/:id/:cls` - Run the form-handling steps
/// - `GET /download-btn/create_files/:id/:cls` - Run the file-creation steps (SSE)
/// - `POST /download-btn/downloaded/:id/:cls` - Client saved the downloads
/// - `GET /download-btn/artifact/:id/:cls` - Zip archive produced by the last run
///
/// Every button route takes the `csrf_token` query parameter and reads the
/// session from the configured cookie.
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(manager: DownloadBtnManager) -> Router {
    let state = AppState::new(manager);
    let config = state.config.clone();

    let buttons = Router::new()
        .route("/download-btn/form/:id/:cls", post(routes::submit_form))
        .route("/download-btn/create_files/:id/:cls", get(routes::create_files))
        .route("/download-btn/downloaded/:id/:cls", post(routes::mark_downloaded))
        .route("/download-btn/artifact/:id/:cls", get(routes::download_artifact));

    let prefix = config.server.url_prefix.as_str();
    let router = if prefix.is_empty() {
        buttons
    } else {
        Router::new().nest(prefix, buttons)
    };

    let router = router
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.cors_enabled {
        let cors = build_cors_layer(&config.server.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails or `shutdown` resolves; in-flight event
/// streams are dropped on shutdown, which cancels their runs.
///
/// # Example
///
/// ```no_run
/// use download_btn::{ButtonRegistry, Config, DownloadBtnManager};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = DownloadBtnManager::new(Config::default(), ButtonRegistry::new()).await?;
///
/// download_btn::api::start_api_server(manager, std::future::pending()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    manager: DownloadBtnManager,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind_address = manager.config().server.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(manager);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
