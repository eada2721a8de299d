//! Shared state for one file-creation run

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::button::DownloadButton;
use crate::error::Result;
use crate::gateway::ArtifactStore;
use crate::progress::{ProgressMarker, WireEvent};
use crate::render::TemplateRenderer;
use crate::types::{ButtonId, DownloadEntry, ManifestItem, SessionId};

/// Everything a run needs besides the button itself
#[derive(Clone)]
pub struct RunContext {
    /// Markup renderer for `reset` events
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Zip archive store
    pub artifacts: Arc<ArtifactStore>,
    /// Session the run belongs to
    pub session: SessionId,
    /// Token the run was authenticated with, appended to artifact URLs
    pub csrf_token: String,
    /// Prefix the endpoints are mounted under
    pub url_prefix: String,
}

struct HandleInner {
    id: ButtonId,
    class_name: String,
    button: Mutex<DownloadButton>,
    context: RunContext,
    cancel: CancellationToken,
}

/// Handle to the button of an in-flight run, given to file-creation steps
///
/// Cloning is cheap; every clone refers to the same button.
#[derive(Clone)]
pub struct ButtonHandle {
    inner: Arc<HandleInner>,
}

impl ButtonHandle {
    /// Wrap a button for a run
    pub fn new(button: DownloadButton, context: RunContext) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: button.id(),
                class_name: button.class_name().to_string(),
                button: Mutex::new(button),
                context,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Identity of the button
    pub fn id(&self) -> ButtonId {
        self.inner.id
    }

    /// Class name of the button
    pub fn class_name(&self) -> &str {
        &self.inner.class_name
    }

    /// Session the run belongs to
    pub fn session(&self) -> &SessionId {
        &self.inner.context.session
    }

    /// Run the closure with exclusive access to the button
    pub async fn with_button<R>(&self, f: impl FnOnce(&mut DownloadButton) -> R) -> R {
        let mut button = self.inner.button.lock().await;
        f(&mut button)
    }

    /// Copy of the button's current state
    pub async fn snapshot(&self) -> DownloadButton {
        self.inner.button.lock().await.clone()
    }

    /// Whether the client already reported a download of this button's files
    pub async fn downloaded(&self) -> bool {
        self.inner.button.lock().await.downloaded
    }

    /// Replace the progress markup (`reset` event)
    pub async fn reset(&self, marker: &ProgressMarker) -> Result<WireEvent> {
        let mut button = self.inner.button.lock().await;
        button.reset(self.inner.context.renderer.as_ref(), marker)
    }

    /// Incremental progress update (`progress_report` event)
    pub fn report(&self, marker: &ProgressMarker) -> WireEvent {
        WireEvent::progress_report(marker)
    }

    /// Add a download for this run only
    pub async fn add_transient_download(&self, entry: impl Into<DownloadEntry>) {
        let entry = entry.into();
        self.inner.button.lock().await.add_transient_download(entry);
    }

    /// Zip `files` into an artifact and add it to this run's downloads
    ///
    /// The returned item points at the artifact endpoint.
    pub async fn write_zip(
        &self,
        filename: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<ManifestItem> {
        let (cache, url) = {
            let button = self.inner.button.lock().await;
            let url = format!(
                "{}?csrf_token={}",
                button.endpoint(&self.inner.context.url_prefix, "artifact"),
                urlencoding::encode(&self.inner.context.csrf_token)
            );
            (button.cache, url)
        };

        self.inner
            .context
            .artifacts
            .create_zip(
                &self.inner.context.session,
                self.inner.id,
                &self.inner.class_name,
                filename,
                cache,
                files,
            )
            .await?;

        let item = ManifestItem::new(url, filename);
        self.add_transient_download(item.clone()).await;
        Ok(item)
    }

    /// Token cancelled when the client goes away
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Drop any archive this run wrote; returns whether there was one
    pub(crate) async fn release_artifact(&self) -> Result<bool> {
        self.inner
            .context
            .artifacts
            .release(&self.inner.context.session, self.inner.id)
            .await
    }
}

impl std::fmt::Debug for ButtonHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonHandle")
            .field("id", &self.inner.id)
            .field("class_name", &self.inner.class_name)
            .field("session", &self.inner.context.session)
            .finish()
    }
}
