//! Application state for the API server

use crate::{Config, DownloadBtnManager};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// The button manager
    pub manager: DownloadBtnManager,

    /// Configuration the manager was built with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(manager: DownloadBtnManager) -> Self {
        let config = manager.config.clone();
        Self { manager, config }
    }
}
