//! Markup for pages.

use serde::Serialize;

use super::DownloadBtnManager;
use crate::button::{DownloadButton, ScriptContext};
use crate::error::Result;
use crate::types::SessionId;

/// The three pieces of markup a page embeds for one button
#[derive(Clone, Debug, Serialize)]
pub struct RenderedButton {
    /// The button element
    pub button: String,
    /// The hidden progress container
    pub progress: String,
    /// The driver script, carrying a fresh CSRF token
    pub script: String,
}

impl DownloadBtnManager {
    /// Button markup
    pub fn render_button(&self, button: &DownloadButton) -> Result<String> {
        button.render_button(self.renderer.as_ref())
    }

    /// Progress bar inside its hidden container
    pub fn render_progress(&self, button: &DownloadButton) -> Result<String> {
        button.render_progress_container(self.renderer.as_ref())
    }

    /// Driver script; issues a new CSRF token for `session`
    ///
    /// Tokens from earlier renders of the same button stop validating.
    pub fn render_script(&self, session: &SessionId, button: &DownloadButton) -> Result<String> {
        let token = self.gateway.issue_token(session, button);
        button.render_script(
            self.renderer.as_ref(),
            &ScriptContext {
                csrf_token: &token,
                url_prefix: &self.config.server.url_prefix,
                template: &self.config.render.script_template,
            },
        )
    }

    /// Button, progress container and script in one go
    pub fn render(&self, session: &SessionId, button: &DownloadButton) -> Result<RenderedButton> {
        Ok(RenderedButton {
            button: self.render_button(button)?,
            progress: self.render_progress(button)?,
            script: self.render_script(session, button)?,
        })
    }

    /// Drop the session's token for a button
    pub fn revoke_token(&self, session: &SessionId, button: &DownloadButton) -> bool {
        self.gateway
            .revoke_token(session, button.id(), button.class_name())
            .is_some()
    }
}
