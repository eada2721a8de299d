//! Creating, fetching and saving buttons.

use tracing::debug;

use super::DownloadBtnManager;
use crate::button::{DownloadButton, NewButton, RenderOverrides};
use crate::error::Result;
use crate::types::{ButtonId, CachePolicy, DownloadEntry};

/// Per-button settings for [`DownloadBtnManager::create`]
///
/// Rendering overrides are merged over the manager's configured defaults.
#[derive(Clone, Debug, Default)]
pub struct ButtonOptions {
    /// Stable key for [`DownloadBtnManager::get_or_create`]
    pub lookup_key: Option<String>,
    /// Button rendering overrides
    pub button: RenderOverrides,
    /// Progress bar rendering overrides
    pub progress: RenderOverrides,
    /// Initial downloads
    pub downloads: Vec<DownloadEntry>,
    /// Message shown when the downloads are ready
    pub download_message: Option<String>,
    /// Cache policy for the downloads (default: no-store)
    pub cache: CachePolicy,
    /// Redirect target once the downloads are saved
    pub callback: Option<String>,
    /// Id of the form posted on click; the page's only form when unset
    pub form_id: Option<String>,
}

impl ButtonOptions {
    /// Options with only the button text set
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            button: RenderOverrides::text(text),
            ..Default::default()
        }
    }
}

impl DownloadBtnManager {
    /// Create and persist a button of a registered class
    ///
    /// The returned button already has its durable identity, so steps can be
    /// attached (followed by [`save`](Self::save)) and markup rendered.
    pub async fn create(&self, class_name: &str, options: ButtonOptions) -> Result<DownloadButton> {
        self.registry.get(class_name)?;

        let defaults = &self.config.render;
        let new = NewButton {
            class_name: class_name.to_string(),
            lookup_key: options.lookup_key,
            button: defaults.button.merged(&options.button),
            progress: defaults.progress.merged(&options.progress),
            downloads: options.downloads,
            download_message: options.download_message,
            cache: options.cache,
            callback: options.callback,
            form_id: options.form_id,
        };

        let id = self.store.add(&new).await?;
        debug!(button_id = %id, class = class_name, "download button created");
        Ok(DownloadButton::from_new(id, new))
    }

    /// Fetch the button stored under `(class_name, lookup_key)`, creating it on first use
    ///
    /// The options only apply when the button is created.
    pub async fn get_or_create(
        &self,
        class_name: &str,
        lookup_key: &str,
        options: ButtonOptions,
    ) -> Result<DownloadButton> {
        if let Some(button) = self.store.query_by_key(class_name, lookup_key).await? {
            return Ok(button);
        }

        let options = ButtonOptions {
            lookup_key: Some(lookup_key.to_string()),
            ..options
        };
        match self.create(class_name, options).await {
            Ok(button) => Ok(button),
            // Lost a race against a concurrent request for the same key
            Err(e) => match self.store.query_by_key(class_name, lookup_key).await? {
                Some(button) => Ok(button),
                None => Err(e),
            },
        }
    }

    /// Fetch a button by identity
    pub async fn get(&self, id: ButtonId) -> Result<Option<DownloadButton>> {
        self.store.query_by_id(id).await
    }

    /// Persist the button's current state, including its steps
    pub async fn save(&self, button: &DownloadButton) -> Result<()> {
        self.store.commit(button).await
    }

    /// Delete a button; returns whether it existed
    pub async fn delete(&self, id: ButtonId) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            debug!(button_id = %id, "download button deleted");
        }
        Ok(deleted)
    }
}
