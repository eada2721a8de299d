//! The download button aggregate
//!
//! A [`DownloadButton`] owns its rendering state, its download list and the two
//! ordered step pipelines. Markup is always derived from this data through a
//! [`TemplateRenderer`](crate::render::TemplateRenderer) (see [`render`]).
//!
//! ## Submodules
//!
//! - [`render`]: button, progress and script markup; `reset` events
//! - [`steps`]: step registration and ordering

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::progress::{DownloadReady, ProgressMarker, WireEvent};
use crate::types::{ButtonId, CachePolicy, DownloadEntry, ManifestItem, assemble_manifest};

pub mod render;
mod steps;

pub use render::ScriptContext;
pub use steps::{Step, StepArgs};

/// Rendering state for one piece of markup (the button, or the progress bar)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// CSS classes, in order
    #[serde(default)]
    pub classes: Vec<String>,
    /// Inline style, property to value
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    /// Template used to render this markup
    pub template: String,
    /// Text content
    #[serde(default)]
    pub text: String,
}

impl RenderConfig {
    /// Apply overrides; set fields win, style maps merge key-wise
    pub fn merged(&self, overrides: &RenderOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(classes) = &overrides.classes {
            merged.classes = classes.clone();
        }
        if let Some(style) = &overrides.style {
            merged
                .style
                .extend(style.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(template) = &overrides.template {
            merged.template = template.clone();
        }
        if let Some(text) = &overrides.text {
            merged.text = text.clone();
        }
        merged
    }

    /// Value of the `class` attribute
    pub fn class_attr(&self) -> String {
        self.classes.join(" ")
    }

    /// Value of the `style` attribute, e.g. `"width: 40%;"`
    pub fn style_attr(&self) -> String {
        self.style
            .iter()
            .map(|(property, value)| format!("{}: {};", property, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Caller overrides for a [`RenderConfig`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOverrides {
    /// Replace the class list
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    /// Add or replace individual style properties
    #[serde(default)]
    pub style: Option<BTreeMap<String, String>>,
    /// Use another template
    #[serde(default)]
    pub template: Option<String>,
    /// Replace the text
    #[serde(default)]
    pub text: Option<String>,
}

impl RenderOverrides {
    /// Override only the text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Field values for a button that has not been persisted yet
#[derive(Clone, Debug)]
pub struct NewButton {
    /// Registered class name
    pub class_name: String,
    /// Optional stable key for `get_or_create`
    pub lookup_key: Option<String>,
    /// Button rendering, defaults already merged
    pub button: RenderConfig,
    /// Progress bar rendering, defaults already merged
    pub progress: RenderConfig,
    /// Initial downloads
    pub downloads: Vec<DownloadEntry>,
    /// Message shown on completion
    pub download_message: Option<String>,
    /// Cache policy for the downloads
    pub cache: CachePolicy,
    /// Redirect target after the download
    pub callback: Option<String>,
    /// Id of the form submitted with the click
    pub form_id: Option<String>,
}

/// A persisted download button
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadButton {
    id: ButtonId,
    class_name: String,
    lookup_key: Option<String>,
    /// Button rendering
    pub button: RenderConfig,
    /// Progress bar rendering
    pub progress: RenderConfig,
    /// Persisted downloads, in order
    pub downloads: Vec<DownloadEntry>,
    transient_downloads: Vec<DownloadEntry>,
    /// Message shown on completion
    pub download_message: Option<String>,
    /// Cache policy for the downloads
    pub cache: CachePolicy,
    /// Set once the client reports it saved the files
    pub downloaded: bool,
    /// Redirect target after the download
    pub callback: Option<String>,
    /// Id of the form submitted with the click; `None` means the page's only form
    pub form_id: Option<String>,
    form_steps: Vec<Step>,
    file_steps: Vec<Step>,
}

impl DownloadButton {
    /// Build the in-memory button for a freshly allocated identity
    pub fn from_new(id: ButtonId, new: NewButton) -> Self {
        Self {
            id,
            class_name: new.class_name,
            lookup_key: new.lookup_key,
            button: new.button,
            progress: new.progress,
            downloads: new.downloads,
            transient_downloads: Vec::new(),
            download_message: new.download_message,
            cache: new.cache,
            downloaded: false,
            callback: new.callback,
            form_id: new.form_id,
            form_steps: Vec::new(),
            file_steps: Vec::new(),
        }
    }

    /// Rebuild a button from storage
    pub(crate) fn restore(
        id: ButtonId,
        new: NewButton,
        downloaded: bool,
        form_steps: Vec<Step>,
        file_steps: Vec<Step>,
    ) -> Self {
        let mut button = Self::from_new(id, new);
        button.downloaded = downloaded;
        button.form_steps = form_steps;
        button.file_steps = file_steps;
        button.form_steps.sort_by_key(|s| s.index);
        button.file_steps.sort_by_key(|s| s.index);
        button
    }

    /// Persisted identity
    pub fn id(&self) -> ButtonId {
        self.id
    }

    /// Registered class name, used for dispatch from the request path
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Stable lookup key, if the button was created through `get_or_create`
    pub fn lookup_key(&self) -> Option<&str> {
        self.lookup_key.as_deref()
    }

    /// DOM id (or session key) for one of this button's parts
    ///
    /// Suffixes in use: `btn`, `csrf`, `progress`, `progress-bar`, `progress-txt`.
    pub fn dom_id(&self, suffix: &str) -> String {
        dom_id(&self.class_name, self.id, suffix)
    }

    /// Selector for the form whose fields are posted on click
    pub fn form_selector(&self) -> String {
        match self.form_id.as_deref() {
            Some(id) if !id.is_empty() => format!("#{}", id),
            _ => "form".to_string(),
        }
    }

    /// Incremental progress update
    pub fn report(&self, marker: &ProgressMarker) -> WireEvent {
        WireEvent::progress_report(marker)
    }

    /// Transition-speed hint
    pub fn transition_speed(&self, duration: std::time::Duration) -> WireEvent {
        WireEvent::transition_speed(duration)
    }

    /// Write a marker into the progress bar state (text and width)
    pub fn set_progress(&mut self, marker: &ProgressMarker) {
        self.progress.text = marker.text();
        let width = marker.percent_complete().unwrap_or(0.0);
        self.progress
            .style
            .insert("width".to_string(), format!("{}%", width));
    }

    /// Add a request-scoped download that is never persisted
    pub fn add_transient_download(&mut self, entry: impl Into<DownloadEntry>) {
        self.transient_downloads.push(entry.into());
    }

    /// Request-scoped downloads added during the current run
    pub fn transient_downloads(&self) -> &[DownloadEntry] {
        &self.transient_downloads
    }

    /// Drop request-scoped downloads
    pub fn clear_transient_downloads(&mut self) {
        self.transient_downloads.clear();
    }

    /// Resolve persisted then transient downloads
    pub fn manifest(&self) -> Result<Vec<ManifestItem>> {
        assemble_manifest(self.downloads.iter().chain(self.transient_downloads.iter()))
    }

    /// Terminal event for a finished run
    pub fn download_ready(&self) -> Result<WireEvent> {
        let manifest = self.manifest()?;
        Ok(WireEvent::DownloadReady(DownloadReady::new(
            self.download_message.as_deref(),
            manifest,
            self.cache,
            self.callback.clone(),
        )))
    }
}

/// DOM id / session key for a `{class, id}` pair
///
/// The class name is kebab-cased: `ZipDownloadBtn` → `zip-download-btn-7-csrf`.
pub fn dom_id(class_name: &str, id: ButtonId, suffix: &str) -> String {
    format!("{}-{}-{}", dom_class(class_name), id, suffix)
}

/// Kebab-cased class name used as the prefix of DOM ids and artifact files
pub fn dom_class(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
            prev_lower = false;
        }
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
