//! The operations behind the button endpoints.
//!
//! Each one authenticates through the gateway before it reads or mutates the
//! button, so a rejected request leaves no trace.

use tracing::{debug, info};

use super::DownloadBtnManager;
use crate::error::{Error, Result};
use crate::pipeline::{ButtonHandle, FormResponse, RunContext, run_form_handlers};
use crate::stream::RunStream;
use crate::types::{ButtonId, CachePolicy, SessionId};

/// A zip artifact read back for the artifact endpoint
#[derive(Clone, Debug)]
pub struct ArtifactDownload {
    /// Filename to offer the browser
    pub filename: String,
    /// Cache policy of the button that produced it
    pub cache: CachePolicy,
    /// Archive contents
    pub bytes: Vec<u8>,
}

impl DownloadBtnManager {
    /// Run the button's form-handling steps against a submitted form and commit
    ///
    /// Nothing is committed when a step fails. Holds the button's run slot
    /// until the commit lands, so it is rejected while a file-creation run is
    /// in flight and a run cannot start while the form is being handled.
    pub async fn handle_form(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        csrf_token: Option<&str>,
        form: &FormResponse,
    ) -> Result<()> {
        let (class, mut button) = self
            .gateway
            .resolve(self.store.as_ref(), session, id, cls, csrf_token)
            .await?;

        let _guard = self.runs.acquire(id)?;

        run_form_handlers(&class, &mut button, form)?;
        self.store.commit(&button).await?;

        debug!(
            button_id = %id,
            class = cls,
            fields = form.fields().len(),
            downloads = button.downloads.len(),
            "form handled"
        );
        Ok(())
    }

    /// Start a file-creation run and return its event stream
    ///
    /// Malformed persisted downloads are reported here, before any event is
    /// sent. Any zip artifact left over from the session's previous run is
    /// released first.
    pub async fn create_files(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        csrf_token: Option<&str>,
    ) -> Result<RunStream> {
        let (class, button) = self
            .gateway
            .resolve(self.store.as_ref(), session, id, cls, csrf_token)
            .await?;

        button.manifest()?;
        let guard = self.runs.acquire(id)?;
        self.artifacts.release(session, id).await?;

        let steps = button.file_creation_steps().to_vec();
        let handle = ButtonHandle::new(
            button,
            RunContext {
                renderer: self.renderer.clone(),
                artifacts: self.artifacts.clone(),
                session: session.clone(),
                csrf_token: csrf_token.unwrap_or_default().to_string(),
                url_prefix: self.config.server.url_prefix.clone(),
            },
        );

        Ok(self.controller.start(handle, class, steps, guard))
    }

    /// Record that the client saved the downloads
    ///
    /// Revokes the session's token afterwards when
    /// `session.revoke_after_download` is set.
    pub async fn mark_downloaded(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        csrf_token: Option<&str>,
    ) -> Result<()> {
        let (_, mut button) = self
            .gateway
            .resolve(self.store.as_ref(), session, id, cls, csrf_token)
            .await?;

        button.downloaded = true;
        self.store.commit(&button).await?;

        if self.config.session.revoke_after_download {
            self.gateway.revoke_token(session, id, cls);
        }
        info!(button_id = %id, class = cls, "downloads saved by client");
        Ok(())
    }

    /// Read the session's zip artifact for a button
    ///
    /// Under the `no-store` cache policy the artifact is released as soon as it
    /// has been read.
    pub async fn artifact(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        csrf_token: Option<&str>,
    ) -> Result<ArtifactDownload> {
        self.gateway
            .resolve(self.store.as_ref(), session, id, cls, csrf_token)
            .await?;

        let artifact = self
            .artifacts
            .lookup(session, id)
            .ok_or_else(|| Error::UnknownEntity {
                id,
                cls: cls.to_string(),
            })?;
        let bytes = tokio::fs::read(&artifact.path).await?;

        if artifact.cache == CachePolicy::NoStore {
            self.artifacts.release(session, id).await?;
        }

        Ok(ArtifactDownload {
            filename: artifact.filename,
            cache: artifact.cache,
            bytes,
        })
    }
}
