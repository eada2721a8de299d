//! Building step streams

use futures::future;
use futures::stream::{self, PollNext, StreamExt};
use std::future::Future;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::EventStream;
use crate::error::{Error, Result};
use crate::progress::WireEvent;

/// Sending half given to step bodies written with [`emitter`]
#[derive(Clone, Debug)]
pub struct Emitter {
    tx: mpsc::Sender<Result<WireEvent>>,
}

impl Emitter {
    /// Emit one event; waits until the previous one has been taken
    ///
    /// Fails once the consumer has gone away, which ends the step.
    pub async fn emit(&self, event: WireEvent) -> Result<()> {
        self.tx
            .send(Ok(event))
            .await
            .map_err(|_| Error::Other("event stream closed".to_string()))
    }
}

/// Turn an async step body into an [`EventStream`]
///
/// The body runs only while the stream is polled, so it is paused between
/// events and dropped with the stream. Events come out in the order they were
/// emitted; an error returned by the body is yielded after them and ends the
/// stream.
pub fn emitter<F, Fut>(body: F) -> EventStream
where
    F: FnOnce(Emitter) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let failure_tx = tx.clone();
    let work = body(Emitter { tx });

    // The body's error goes through the same channel so it stays behind its events
    let driver = stream::once(async move {
        if let Err(e) = work.await {
            let _ = failure_tx.send(Err(e)).await;
        }
    })
    .filter_map(|()| future::ready(None::<Result<WireEvent>>));

    stream::select_with_strategy(ReceiverStream::new(rx), driver, |_: &mut ()| PollNext::Left)
        .boxed()
}

/// A step that yields a fixed sequence of events
pub fn events(events: impl IntoIterator<Item = WireEvent>) -> EventStream {
    let events: Vec<_> = events.into_iter().map(Ok).collect();
    stream::iter(events).boxed()
}
