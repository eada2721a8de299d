//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`buttons`]: the endpoints the rendered driver script calls
//! - [`system`]: health and OpenAPI

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::SessionId;

mod buttons;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use buttons::*;
pub use system::*;

/// Query parameters shared by every button endpoint
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CsrfQuery {
    /// Token issued when the button's script was rendered
    pub csrf_token: Option<String>,
}

/// Read the caller's session from the configured cookie
pub(crate) fn session_from_headers(state: &AppState, headers: &HeaderMap) -> Result<SessionId> {
    SessionId::from_headers(headers, &state.config.session.cookie_name)
        .ok_or_else(|| Error::Authentication("missing session cookie".to_string()))
}
