use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ChunkStream, StreamMachine, VendorEventStream};
use crate::error::LlmError;
use crate::types::ChatChunk;

type Item = Result<ChatChunk, LlmError>;

/// Drive `events` through `machine` on a background task
///
/// Chunks travel through a channel holding at most `capacity` items. The
/// returned stream owns a drop guard on `cancel`: dropping it, or cancelling
/// the token elsewhere, stops the producer and releases the vendor
/// connection. Once cancellation is observed no further item is yielded.
pub fn spawn_chunk_stream(
    events: VendorEventStream,
    machine: StreamMachine,
    cancel: CancellationToken,
    capacity: usize,
) -> ChunkStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(produce(events, machine, tx, cancel.clone()));

    let guard = cancel.clone().drop_guard();
    Box::pin(futures_util::stream::unfold(
        (rx, cancel, guard),
        |(mut rx, cancel, guard)| async move {
            if cancel.is_cancelled() {
                return None;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                item = rx.recv() => item.map(|item| (item, (rx, cancel, guard))),
            }
        },
    ))
}

/// A stream that ends immediately
pub fn empty() -> ChunkStream {
    Box::pin(futures_util::stream::empty())
}

async fn produce(
    mut events: VendorEventStream,
    mut machine: StreamMachine,
    tx: mpsc::Sender<Item>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(state = ?machine.state(), "stream cancelled");
                return;
            }
            next = events.next() => next,
        };

        let (result, closed) = match next {
            Some(Ok(event)) => (machine.on_event(event), false),
            Some(Err(e)) => (Err(e), true),
            None => (machine.on_close(), true),
        };

        match result {
            Ok(chunks) => {
                for chunk in chunks {
                    if !send(&tx, &cancel, Ok(chunk)).await {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "stream terminated with error");
                send(&tx, &cancel, Err(e)).await;
                return;
            }
        }

        if closed || machine.is_terminal() {
            return;
        }
    }
}

/// Returns `false` when the consumer is gone or the stream was cancelled
async fn send(tx: &mpsc::Sender<Item>, cancel: &CancellationToken, item: Item) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
