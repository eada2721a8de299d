//! Markup for a download button: the button itself, the hidden progress
//! container and the driver script

use serde_json::json;

use super::DownloadButton;
use crate::error::Result;
use crate::progress::{ProgressMarker, WireEvent};
use crate::render::TemplateRenderer;

/// Everything the driver script needs besides the button itself
#[derive(Clone, Copy, Debug)]
pub struct ScriptContext<'a> {
    /// Freshly issued CSRF token
    pub csrf_token: &'a str,
    /// Prefix the endpoints are mounted under
    pub url_prefix: &'a str,
    /// Script template name
    pub template: &'a str,
}

impl DownloadButton {
    /// URL of one of the button's endpoints (`form`, `create_files`, `downloaded`, `artifact`)
    pub fn endpoint(&self, url_prefix: &str, action: &str) -> String {
        format!(
            "{}/download-btn/{}/{}/{}",
            url_prefix.trim_end_matches('/'),
            action,
            self.id(),
            urlencoding::encode(self.class_name())
        )
    }

    /// Render the button markup
    pub fn render_button(&self, renderer: &dyn TemplateRenderer) -> Result<String> {
        let bindings = json!({
            "id": self.dom_id("btn"),
            "classes": self.button.class_attr(),
            "class_list": self.button.classes,
            "style": self.button.style_attr(),
            "text": self.button.text,
            "button_id": self.id(),
            "cls": self.class_name(),
        });
        renderer.render(&self.button.template, &bindings)
    }

    /// Render the progress bar markup (without its container)
    pub fn render_progress(&self, renderer: &dyn TemplateRenderer) -> Result<String> {
        let bindings = json!({
            "id": self.dom_id("progress-bar"),
            "text_id": self.dom_id("progress-txt"),
            "classes": self.progress.class_attr(),
            "class_list": self.progress.classes,
            "style": self.progress.style_attr(),
            "text": self.progress.text,
            "button_id": self.id(),
            "cls": self.class_name(),
        });
        renderer.render(&self.progress.template, &bindings)
    }

    /// Render the progress bar inside a hidden container
    ///
    /// The script reveals the container when a run starts and replaces its
    /// contents on every `reset` event.
    pub fn render_progress_container(&self, renderer: &dyn TemplateRenderer) -> Result<String> {
        Ok(format!(
            r#"<div id="{}" style="display: none;">{}</div>"#,
            self.dom_id("progress"),
            self.render_progress(renderer)?
        ))
    }

    /// Render the driver script with an already issued CSRF token
    pub fn render_script(
        &self,
        renderer: &dyn TemplateRenderer,
        context: &ScriptContext<'_>,
    ) -> Result<String> {
        let config = json!({
            "id": self.id(),
            "cls": self.class_name(),
            "csrf_token": context.csrf_token,
            "button_id": self.dom_id("btn"),
            "progress_container_id": self.dom_id("progress"),
            "progress_bar_id": self.dom_id("progress-bar"),
            "progress_text_id": self.dom_id("progress-txt"),
            "form_selector": self.form_selector(),
            "form_url": self.endpoint(context.url_prefix, "form"),
            "create_files_url": self.endpoint(context.url_prefix, "create_files"),
            "downloaded_url": self.endpoint(context.url_prefix, "downloaded"),
        });

        let bindings = json!({
            "config": script_json(&config)?,
            "id": self.id(),
            "cls": self.class_name(),
            "csrf_token": context.csrf_token,
        });
        renderer.render(context.template, &bindings)
    }

    /// Move the progress bar to `marker` and emit a `reset` event with the full markup
    pub fn reset(
        &mut self,
        renderer: &dyn TemplateRenderer,
        marker: &ProgressMarker,
    ) -> Result<WireEvent> {
        self.set_progress(marker);
        Ok(WireEvent::Reset {
            html: self.render_progress(renderer)?,
        })
    }
}

// JSON embedded in a <script> element must not be able to close it.
fn script_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(value)?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}
