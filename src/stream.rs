//! Event stream controller
//!
//! Drives one file-creation run on its own task and hands the response a
//! stream of wire events. Every payload event is preceded by a
//! `transition_speed` event carrying the time since the previous payload
//! (clamped, see [`transition_delay`]). A run that exhausts its steps commits
//! the button and ends with `download_ready`; a run that fails or loses its
//! client just stops, so a stream closing without `download_ready` always means
//! failure.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::button::Step;
use crate::config::StreamConfig;
use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::pipeline::{ButtonClass, ButtonHandle, file_creation_stream};
use crate::progress::WireEvent;
use crate::types::ButtonId;

/// Lifecycle of one file-creation run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Created, nothing sent yet
    Idle,
    /// Emitting speed/payload pairs
    Streaming,
    /// `download_ready` was sent
    Ready,
    /// A step failed, the manifest was malformed, or the client went away
    Failed,
}

impl RunState {
    /// Whether the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Ready | RunState::Failed)
    }
}

/// Transition hint for the gap between two payload events
///
/// Gaps are capped at `max_transition`; gaps shorter than
/// `min_visible_transition` would not render as a visible animation and are
/// sent as zero.
pub fn transition_delay(elapsed: Duration, config: &StreamConfig) -> Duration {
    let delay = elapsed.min(config.max_transition);
    if delay < config.min_visible_transition {
        Duration::ZERO
    } else {
        delay
    }
}

/// Admits at most one in-flight run per button
#[derive(Clone, Debug, Default)]
pub struct RunRegistry {
    active: Arc<DashMap<ButtonId, u64>>,
    next_run: Arc<AtomicU64>,
}

impl RunRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the button for a new run
    ///
    /// Fails with [`Error::RunInProgress`] while another run holds it.
    pub fn acquire(&self, id: ButtonId) -> Result<RunGuard> {
        match self.active.entry(id) {
            Entry::Occupied(_) => Err(Error::RunInProgress { id }),
            Entry::Vacant(slot) => {
                let run = self.next_run.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(run);
                Ok(RunGuard {
                    active: self.active.clone(),
                    id,
                    run,
                })
            }
        }
    }

    /// Whether a run currently holds the button
    pub fn is_running(&self, id: ButtonId) -> bool {
        self.active.contains_key(&id)
    }
}

/// Claim on a button for the duration of one run; released on drop
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<DashMap<ButtonId, u64>>,
    id: ButtonId,
    run: u64,
}

impl RunGuard {
    /// Button the run belongs to
    pub fn button_id(&self) -> ButtonId {
        self.id
    }

    /// Monotonic run number
    pub fn run_id(&self) -> u64 {
        self.run
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let run = self.run;
        self.active.remove_if(&self.id, |_, current| *current == run);
    }
}

/// Starts file-creation runs
#[derive(Clone)]
pub struct EventStreamController {
    config: StreamConfig,
    store: Arc<dyn RecordStore>,
}

enum Halt {
    Disconnected,
    Failed(Error),
}

impl EventStreamController {
    /// Controller committing finished runs to `store`
    pub fn new(config: StreamConfig, store: Arc<dyn RecordStore>) -> Self {
        Self { config, store }
    }

    /// Spawn the run and return its event stream
    ///
    /// The run owns `guard` and releases it when it ends. Dropping the returned
    /// stream cancels the run; nothing is committed in that case.
    pub fn start(
        &self,
        handle: ButtonHandle,
        class: Arc<ButtonClass>,
        steps: Vec<Step>,
        guard: RunGuard,
    ) -> RunStream {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let config = self.config.clone();
        let store = self.store.clone();
        let run = guard.run_id();

        tokio::spawn(async move {
            state_tx.send_replace(RunState::Streaming);
            info!(
                button_id = %handle.id(),
                class = handle.class_name(),
                run,
                steps = steps.len(),
                "file-creation run started"
            );

            let outcome = tokio::select! {
                outcome = run_steps(&config, &handle, class, steps, &tx) => outcome,
                _ = tx.closed() => Err(Halt::Disconnected),
            };
            let outcome = match outcome {
                Ok(()) => finish(store.as_ref(), &handle, &tx).await,
                Err(halt) => Err(halt),
            };

            let state = match outcome {
                Ok(()) => {
                    info!(button_id = %handle.id(), run, "download ready");
                    RunState::Ready
                }
                Err(Halt::Disconnected) => {
                    handle.cancel();
                    info!(button_id = %handle.id(), run, "client disconnected, run cancelled");
                    RunState::Failed
                }
                Err(Halt::Failed(e)) => {
                    warn!(button_id = %handle.id(), run, error = %e, "file-creation run failed");
                    RunState::Failed
                }
            };
            if state == RunState::Failed {
                if let Err(e) = handle.release_artifact().await {
                    warn!(button_id = %handle.id(), run, error = %e, "failed to release zip artifact");
                }
            }
            drop(guard);
            state_tx.send_replace(state);
        });

        RunStream {
            events: ReceiverStream::new(rx),
            state: state_rx,
            run,
        }
    }
}

impl std::fmt::Debug for EventStreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamController")
            .field("config", &self.config)
            .finish()
    }
}

async fn run_steps(
    config: &StreamConfig,
    handle: &ButtonHandle,
    class: Arc<ButtonClass>,
    steps: Vec<Step>,
    tx: &mpsc::Sender<WireEvent>,
) -> std::result::Result<(), Halt> {
    let mut events = file_creation_stream(class, steps, handle.clone());
    let mut previous = Instant::now();

    while let Some(event) = events.next().await {
        let event = event.map_err(Halt::Failed)?;
        let now = Instant::now();
        let delay = transition_delay(now.saturating_duration_since(previous), config);
        previous = now;

        send(tx, WireEvent::transition_speed(delay)).await?;
        send(tx, event).await?;
    }
    Ok(())
}

// Runs outside the disconnect race so a commit is never abandoned halfway.
async fn finish(
    store: &dyn RecordStore,
    handle: &ButtonHandle,
    tx: &mpsc::Sender<WireEvent>,
) -> std::result::Result<(), Halt> {
    let button = handle.snapshot().await;
    let ready = button.download_ready().map_err(Halt::Failed)?;
    store.commit(&button).await.map_err(Halt::Failed)?;
    send(tx, ready).await
}

async fn send(tx: &mpsc::Sender<WireEvent>, event: WireEvent) -> std::result::Result<(), Halt> {
    tx.send(event).await.map_err(|_| Halt::Disconnected)
}

/// Events of one run, as handed to the SSE response
#[derive(Debug)]
pub struct RunStream {
    events: ReceiverStream<WireEvent>,
    state: watch::Receiver<RunState>,
    run: u64,
}

impl RunStream {
    /// Current state of the run
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Receiver that outlives the stream, for observing how the run ended
    pub fn state_watch(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Monotonic run number
    pub fn run_id(&self) -> u64 {
        self.run
    }
}

impl Stream for RunStream {
    type Item = WireEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

/// Wait until a run reaches a terminal state
pub async fn run_finished(state: &mut watch::Receiver<RunState>) -> RunState {
    match state.wait_for(RunState::is_terminal).await {
        Ok(state) => *state,
        Err(_) => RunState::Failed,
    }
}
