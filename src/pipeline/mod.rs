//! Step pipelines
//!
//! A button records *which* steps to run (names plus captured arguments); its
//! [`ButtonClass`] supplies the code behind each name. Classes are looked up by
//! name through a [`ButtonRegistry`] handed to the manager at startup.
//!
//! Form-handling steps run synchronously against the button and a
//! [`FormResponse`]. File-creation steps each return a lazy [`EventStream`];
//! the executor concatenates them in index order and stops at the first error.

use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;

use crate::button::{DownloadButton, StepArgs};
use crate::error::{Error, Result};
use crate::progress::WireEvent;

mod context;
mod emitter;
mod executor;
mod form;

pub use context::{ButtonHandle, RunContext};
pub use emitter::{Emitter, emitter, events};
pub use executor::{file_creation_stream, run_form_handlers};
pub use form::FormResponse;

/// Lazy, finite stream of wire events produced by one file-creation step
pub type EventStream = BoxStream<'static, Result<WireEvent>>;

/// A form-handling step implementation
pub trait FormHandler: Send + Sync {
    /// Apply the submitted form to the button
    fn handle(&self, button: &mut DownloadButton, form: &FormResponse, args: &StepArgs)
    -> Result<()>;
}

impl<F> FormHandler for F
where
    F: Fn(&mut DownloadButton, &FormResponse, &StepArgs) -> Result<()> + Send + Sync,
{
    fn handle(
        &self,
        button: &mut DownloadButton,
        form: &FormResponse,
        args: &StepArgs,
    ) -> Result<()> {
        self(button, form, args)
    }
}

/// A file-creation step implementation
pub trait FileCreator: Send + Sync {
    /// Start the step; nothing should happen until the stream is polled
    fn create(&self, button: ButtonHandle, args: StepArgs) -> EventStream;
}

impl<F> FileCreator for F
where
    F: Fn(ButtonHandle, StepArgs) -> EventStream + Send + Sync,
{
    fn create(&self, button: ButtonHandle, args: StepArgs) -> EventStream {
        self(button, args)
    }
}

/// The code behind one button class: named step implementations
#[derive(Clone)]
pub struct ButtonClass {
    name: String,
    form_handlers: HashMap<String, Arc<dyn FormHandler>>,
    file_creators: HashMap<String, Arc<dyn FileCreator>>,
}

impl ButtonClass {
    /// Class with no steps
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            form_handlers: HashMap::new(),
            file_creators: HashMap::new(),
        }
    }

    /// Register a form-handling step from a closure
    pub fn form_handler<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut DownloadButton, &FormResponse, &StepArgs) -> Result<()> + Send + Sync + 'static,
    {
        self.with_form_handler(name, Arc::new(handler))
    }

    /// Register a file-creation step from a closure
    pub fn file_creator<F>(self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(ButtonHandle, StepArgs) -> EventStream + Send + Sync + 'static,
    {
        self.with_file_creator(name, Arc::new(creator))
    }

    /// Register a form-handling step implementation
    pub fn with_form_handler(mut self, name: impl Into<String>, handler: Arc<dyn FormHandler>) -> Self {
        self.form_handlers.insert(name.into(), handler);
        self
    }

    /// Register a file-creation step implementation
    pub fn with_file_creator(mut self, name: impl Into<String>, creator: Arc<dyn FileCreator>) -> Self {
        self.file_creators.insert(name.into(), creator);
        self
    }

    /// Class name, as used in request paths
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Form-handling implementation registered under `name`
    pub fn get_form_handler(&self, name: &str) -> Option<Arc<dyn FormHandler>> {
        self.form_handlers.get(name).cloned()
    }

    /// File-creation implementation registered under `name`
    pub fn get_file_creator(&self, name: &str) -> Option<Arc<dyn FileCreator>> {
        self.file_creators.get(name).cloned()
    }
}

impl std::fmt::Debug for ButtonClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut form: Vec<_> = self.form_handlers.keys().collect();
        let mut files: Vec<_> = self.file_creators.keys().collect();
        form.sort();
        files.sort();
        f.debug_struct("ButtonClass")
            .field("name", &self.name)
            .field("form_handlers", &form)
            .field("file_creators", &files)
            .finish()
    }
}

/// Button classes by name
#[derive(Clone, Debug, Default)]
pub struct ButtonRegistry {
    classes: HashMap<String, Arc<ButtonClass>>,
}

impl ButtonRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class, replacing any class of the same name
    pub fn register(&mut self, class: ButtonClass) -> &mut Self {
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, class: ButtonClass) -> Self {
        self.register(class);
        self
    }

    /// Look up a class
    pub fn get(&self, name: &str) -> Result<Arc<ButtonClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownClass(name.to_string()))
    }

    /// Whether a class is registered
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}
