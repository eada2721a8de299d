//! Step registration and ordering

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DownloadButton;
use crate::error::Pipeline;

/// Arguments captured when a step is registered
///
/// Stored with the step so a reloaded button runs its steps exactly as they
/// were configured.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepArgs {
    /// Positional arguments
    #[serde(default)]
    pub positional: Vec<Value>,
    /// Keyword arguments
    #[serde(default)]
    pub keyword: Map<String, Value>,
}

impl StepArgs {
    /// No arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }

    /// Positional argument by position
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.positional.get(position)
    }

    /// Keyword argument by name
    pub fn get_kw(&self, key: &str) -> Option<&Value> {
        self.keyword.get(key)
    }

    /// Positional string argument
    pub fn get_str(&self, position: usize) -> Option<&str> {
        self.get(position).and_then(Value::as_str)
    }

    /// Keyword string argument
    pub fn get_kw_str(&self, key: &str) -> Option<&str> {
        self.get_kw(key).and_then(Value::as_str)
    }
}

/// One registered unit of work on a button
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Execution order within the pipeline; gaps are allowed
    pub index: u32,
    /// Name of the handler in the button's class
    pub name: String,
    /// Captured arguments
    pub args: StepArgs,
}

impl DownloadButton {
    /// Append a form-handling step; returns its ordering index
    pub fn add_form_handling_step(&mut self, name: impl Into<String>, args: StepArgs) -> u32 {
        push_step(&mut self.form_steps, name.into(), args)
    }

    /// Append a file-creation step; returns its ordering index
    pub fn add_file_creation_step(&mut self, name: impl Into<String>, args: StepArgs) -> u32 {
        push_step(&mut self.file_steps, name.into(), args)
    }

    /// Remove the form-handling step at `index`; returns it if it existed
    pub fn remove_form_handling_step(&mut self, index: u32) -> Option<Step> {
        remove_step(&mut self.form_steps, index)
    }

    /// Remove the file-creation step at `index`; returns it if it existed
    pub fn remove_file_creation_step(&mut self, index: u32) -> Option<Step> {
        remove_step(&mut self.file_steps, index)
    }

    /// Form-handling steps in execution order
    pub fn form_handling_steps(&self) -> &[Step] {
        &self.form_steps
    }

    /// File-creation steps in execution order
    pub fn file_creation_steps(&self) -> &[Step] {
        &self.file_steps
    }

    /// Steps of one pipeline in execution order
    pub fn steps(&self, pipeline: Pipeline) -> &[Step] {
        match pipeline {
            Pipeline::FormHandling => &self.form_steps,
            Pipeline::FileCreation => &self.file_steps,
        }
    }
}

// Steps are kept sorted by index, so the next free index is last + 1.
fn push_step(steps: &mut Vec<Step>, name: String, args: StepArgs) -> u32 {
    let index = steps.last().map_or(0, |s| s.index + 1);
    steps.push(Step { index, name, args });
    index
}

fn remove_step(steps: &mut Vec<Step>, index: u32) -> Option<Step> {
    let position = steps.iter().position(|s| s.index == index)?;
    Some(steps.remove(position))
}
