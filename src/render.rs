//! Template rendering capability
//!
//! Button markup, progress bar markup and the client-side driver script are
//! derived from structured data on every change. The manager only needs a
//! [`TemplateRenderer`]; [`TeraRenderer`] is the default implementation and
//! ships the three built-in templates.

use std::path::Path;
use tera::{Context, Tera};

use crate::config::{BUTTON_TEMPLATE, PROGRESS_TEMPLATE, SCRIPT_TEMPLATE};
use crate::error::{Error, Result};

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    (BUTTON_TEMPLATE, include_str!("../templates/button.html")),
    (PROGRESS_TEMPLATE, include_str!("../templates/progress.html")),
    (SCRIPT_TEMPLATE, include_str!("../templates/script.html")),
];

/// Render a named template with JSON bindings
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` with `bindings`, which must be a JSON object
    fn render(&self, template: &str, bindings: &serde_json::Value) -> Result<String>;
}

/// Tera-backed renderer with the built-in download button templates
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    /// Renderer with only the built-in templates
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(BUILTIN_TEMPLATES)?;
        Ok(Self { tera })
    }

    /// Renderer loading every template under `dir`
    ///
    /// Templates in `dir` take precedence over built-ins of the same name.
    pub fn with_template_dir(dir: &Path) -> Result<Self> {
        let glob = format!("{}/**/*", dir.display());
        let mut tera = Tera::new(&glob)?;

        for (name, source) in BUILTIN_TEMPLATES {
            let overridden = tera.get_template_names().any(|existing| existing == name);
            if !overridden {
                tera.add_raw_template(name, source)?;
            }
        }

        tracing::debug!(dir = %dir.display(), "loaded download button templates");
        Ok(Self { tera })
    }

    /// Register (or replace) a template from source
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.tera.add_raw_template(name, source)?;
        Ok(())
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, template: &str, bindings: &serde_json::Value) -> Result<String> {
        if !bindings.is_object() {
            return Err(Error::Other(format!(
                "template bindings for {} must be an object",
                template
            )));
        }
        let context = Context::from_value(bindings.clone())?;
        Ok(self.tera.render(template, &context)?)
    }
}
