//! Record store for download buttons
//!
//! The manager only depends on the [`RecordStore`] capability. Two
//! implementations ship with the crate:
//! - [`Database`]: SQLite via sqlx, used by servers
//! - [`MemoryRecordStore`]: process-local, used by tests and throwaway demos
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by concern:
//! - `migrations`: database lifecycle, schema migrations
//! - `buttons`: button and step persistence

use async_trait::async_trait;
use sqlx::{FromRow, sqlite::SqlitePool};

use crate::button::{DownloadButton, NewButton};
use crate::error::Result;
use crate::types::ButtonId;

mod buttons;
mod memory;
mod migrations;

pub use memory::MemoryRecordStore;

/// Persistence capability consumed by the manager
///
/// `add` persists a new row and returns its identity straight away, so steps
/// can be attached and DOM ids derived before anything else happens.
/// Transient downloads are never written.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new button and return its durable identity
    async fn add(&self, new: &NewButton) -> Result<ButtonId>;

    /// Write the button's current state, replacing its steps
    async fn commit(&self, button: &DownloadButton) -> Result<()>;

    /// Fetch a button by identity
    async fn query_by_id(&self, id: ButtonId) -> Result<Option<DownloadButton>>;

    /// Fetch a button by its class and stable lookup key
    async fn query_by_key(&self, class_name: &str, lookup_key: &str)
    -> Result<Option<DownloadButton>>;

    /// Delete a button and its steps; returns whether it existed
    async fn delete(&self, id: ButtonId) -> Result<bool>;
}

/// Button record from database
#[derive(Debug, Clone, FromRow)]
pub struct ButtonRow {
    /// Unique database ID
    pub id: i64,
    /// Registered class name
    pub class_name: String,
    /// Stable lookup key
    pub lookup_key: Option<String>,
    /// Button `RenderConfig` as JSON
    pub button_config: String,
    /// Progress `RenderConfig` as JSON
    pub progress_config: String,
    /// Download entries as a JSON array
    pub downloads: String,
    /// Completion message
    pub download_message: Option<String>,
    /// Cache policy name ("no-store" or "default")
    pub cache: String,
    /// Whether the client reported the download (0 = no, 1 = yes)
    pub downloaded: i32,
    /// Redirect target after the download
    pub callback: Option<String>,
    /// Id of the submitted form
    pub form_id: Option<String>,
    /// Unix timestamp when the button was created
    pub created_at: i64,
    /// Unix timestamp of the last commit
    pub updated_at: i64,
}

/// Step record from database
#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    /// Owning button
    pub button_id: i64,
    /// Pipeline name ("form_handling" or "file_creation")
    pub pipeline: String,
    /// Ordering index
    pub step_index: i64,
    /// Handler name
    pub name: String,
    /// Captured `StepArgs` as JSON
    pub args: String,
}

/// Database handle for download-btn
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
