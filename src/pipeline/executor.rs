//! Running a button's pipelines

use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

use super::{ButtonClass, ButtonHandle, EventStream, FormResponse};
use crate::button::{DownloadButton, Step};
use crate::error::{Error, Pipeline, Result};

/// Run the button's form-handling steps in index order
///
/// Stops at the first failing step. Changes made by earlier steps stay on the
/// button; committing them is up to the caller.
pub fn run_form_handlers(
    class: &ButtonClass,
    button: &mut DownloadButton,
    form: &FormResponse,
) -> Result<()> {
    let steps = button.form_handling_steps().to_vec();

    for step in steps {
        let handler = class.get_form_handler(&step.name).ok_or_else(|| {
            Error::step_failed(
                Pipeline::FormHandling,
                step.index,
                &step.name,
                format!("no form handler named {:?} in class {}", step.name, class.name()),
            )
        })?;

        debug!(
            button_id = %button.id(),
            step = %step.name,
            index = step.index,
            "running form-handling step"
        );
        handler
            .handle(button, form, &step.args)
            .map_err(|e| wrap(Pipeline::FormHandling, &step, e))?;
    }

    Ok(())
}

/// Concatenate the file-creation steps into one stream
///
/// Each step's stream is created only once the previous one is exhausted. The
/// combined stream ends right after the first error.
pub fn file_creation_stream(
    class: Arc<ButtonClass>,
    steps: Vec<Step>,
    handle: ButtonHandle,
) -> EventStream {
    stream::iter(steps)
        .map(move |step| -> EventStream {
            let Some(creator) = class.get_file_creator(&step.name) else {
                let reason = format!(
                    "no file creator named {:?} in class {}",
                    step.name,
                    class.name()
                );
                return stream::once(future::ready(Err(Error::step_failed(
                    Pipeline::FileCreation,
                    step.index,
                    &step.name,
                    reason,
                ))))
                .boxed();
            };

            debug!(
                button_id = %handle.id(),
                step = %step.name,
                index = step.index,
                "starting file-creation step"
            );
            let events = creator.create(handle.clone(), step.args.clone());
            events
                .map(move |item| item.map_err(|e| wrap(Pipeline::FileCreation, &step, e)))
                .boxed()
        })
        .flatten()
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}

fn wrap(pipeline: Pipeline, step: &Step, error: Error) -> Error {
    match error {
        Error::StepExecution { .. } => error,
        other => Error::step_failed(pipeline, step.index, &step.name, other),
    }
}
