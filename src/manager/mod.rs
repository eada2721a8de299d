//! Download button manager split into focused submodules.
//!
//! The `DownloadBtnManager` struct and its methods are organized by concern:
//! - [`buttons`] - Creating, fetching and saving buttons
//! - [`render`] - Button, progress and script markup for pages
//! - [`workflow`] - The form, create-files, downloaded and artifact operations

mod buttons;
mod render;
mod workflow;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use buttons::ButtonOptions;
pub use render::RenderedButton;
pub use workflow::ArtifactDownload;

use std::sync::Arc;

use crate::config::Config;
use crate::db::{Database, RecordStore};
use crate::error::Result;
use crate::gateway::{ArtifactStore, Gateway, MemorySessionStore, SessionStore};
use crate::pipeline::ButtonRegistry;
use crate::render::{TemplateRenderer, TeraRenderer};
use crate::stream::{EventStreamController, RunRegistry};

/// Entry point of the crate (cloneable - all fields are Arc-wrapped)
///
/// Pages use it to create and render buttons; the HTTP surface uses it to run
/// the three button workflows.
#[derive(Clone)]
pub struct DownloadBtnManager {
    /// Record store for buttons
    pub(crate) store: Arc<dyn RecordStore>,
    /// Registered button classes
    pub(crate) registry: Arc<ButtonRegistry>,
    /// Markup renderer
    pub(crate) renderer: Arc<dyn TemplateRenderer>,
    /// CSRF tokens and `{id, cls}` resolution
    pub(crate) gateway: Gateway,
    /// Zip archives produced by runs
    pub(crate) artifacts: Arc<ArtifactStore>,
    /// One run per button at a time
    pub(crate) runs: RunRegistry,
    /// Spawns file-creation runs
    pub(crate) controller: EventStreamController,
    /// Configuration
    pub(crate) config: Arc<Config>,
}

impl DownloadBtnManager {
    /// Create a manager backed by SQLite and in-memory sessions
    ///
    /// Opens (and migrates) the database at `persistence.database_path` and
    /// loads user templates from `render.template_dir` when set.
    pub async fn new(config: Config, registry: ButtonRegistry) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let renderer = match &config.render.template_dir {
            Some(dir) => TeraRenderer::with_template_dir(dir)?,
            None => TeraRenderer::new()?,
        };

        tracing::info!(
            database = %config.persistence.database_path.display(),
            artifacts = %config.artifacts.temp_dir.display(),
            "download button manager initialized"
        );

        Self::with_parts(
            config,
            Arc::new(db),
            registry,
            Arc::new(renderer),
            Arc::new(MemorySessionStore::new()),
        )
    }

    /// Assemble a manager from caller-provided collaborators
    pub fn with_parts(
        config: Config,
        store: Arc<dyn RecordStore>,
        registry: ButtonRegistry,
        renderer: Arc<dyn TemplateRenderer>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(registry);
        let gateway = Gateway::new(sessions, registry.clone(), config.session.token_length);
        let artifacts = Arc::new(ArtifactStore::new(config.artifacts.temp_dir.clone()));
        let controller = EventStreamController::new(config.stream.clone(), store.clone());

        Ok(Self {
            store,
            registry,
            renderer,
            gateway,
            artifacts,
            runs: RunRegistry::new(),
            controller,
            config: Arc::new(config),
        })
    }

    /// Configuration the manager was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered button classes
    pub fn registry(&self) -> &ButtonRegistry {
        &self.registry
    }

    /// Token gateway
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Zip artifact store
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Per-button run guards
    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }
}

impl std::fmt::Debug for DownloadBtnManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadBtnManager")
            .field("registry", &self.registry)
            .field("artifacts", &self.artifacts.dir())
            .finish()
    }
}
