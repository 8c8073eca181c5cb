//! Cross-task message relay between the web form and the chat.
//!
//! Web submissions arrive on axum handler tasks; the chat side runs in
//! its own long-lived consumer task. The only bridge between the two is
//! this relay: any number of producers enqueue through a cloneable
//! handle, exactly one consumer drains the queue and forwards each
//! message to the configured destination through a [`RelaySink`].
//!
//! Delivery is at-most-once: a message whose delivery fails is dropped
//! with a logged error and the loop moves on, so one bad message never
//! starves the ones behind it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on relayed text length, enforced at the producer
/// boundary (the web form), not by the relay itself.
pub const MAX_RELAY_TEXT: usize = 1900;

/// How long one consumer poll waits before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a failed delivery before handling the next message.
const FAILURE_PAUSE: Duration = Duration::from_millis(500);

/// Errors surfaced to producers.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The consumer is gone; nothing will ever drain the queue.
    #[error("relay consumer is shut down")]
    Closed,
}

/// Errors surfaced by a delivery sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// No destination chat is configured or it cannot be resolved.
    #[error("no destination chat configured")]
    Resolution,
    /// The chat transport rejected the send.
    #[error("transport error: {0}")]
    Transport(String),
}

/// One queued web submission.
#[derive(Debug)]
pub struct RelayMessage {
    pub text: String,
    /// When the producer enqueued the message; logged as queue latency
    /// at delivery time, nothing else depends on it.
    pub enqueued_at: Instant,
}

/// Destination seam for the consumer loop. The production
/// implementation resolves the configured chat and sends through the
/// chat transport; tests substitute a recording sink.
#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), SinkError>;
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct MessageRelay {
    tx: mpsc::UnboundedSender<RelayMessage>,
}

/// Receiving half, owned by exactly one consumer task.
pub struct RelayConsumer {
    rx: mpsc::UnboundedReceiver<RelayMessage>,
}

impl MessageRelay {
    /// Creates the relay pair: a producer handle and its consumer.
    #[must_use]
    pub fn channel() -> (Self, RelayConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, RelayConsumer { rx })
    }

    /// Enqueues one message. Never blocks; fails only when the consumer
    /// has shut down. Text length validation is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] when the consumer is gone.
    pub fn enqueue(&self, text: String) -> Result<(), RelayError> {
        self.tx
            .send(RelayMessage {
                text,
                enqueued_at: Instant::now(),
            })
            .map_err(|_| RelayError::Closed)
    }
}

impl RelayConsumer {
    /// Drains the queue until cancelled or until every producer handle
    /// is dropped. Each poll is bounded by a timeout so cancellation is
    /// observed promptly and one iteration never monopolizes the
    /// scheduler. Messages are delivered in FIFO enqueue order.
    pub async fn run(mut self, sink: Arc<dyn RelaySink>, cancel: CancellationToken) {
        info!("relay consumer started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match timeout(POLL_INTERVAL, self.rx.recv()).await {
                // Poll timed out; loop around and re-check cancellation.
                Err(_) => {}
                // Every producer handle dropped.
                Ok(None) => break,
                Ok(Some(message)) => {
                    let queued_for = message.enqueued_at.elapsed();
                    match sink.deliver(&message.text).await {
                        Ok(()) => {
                            debug!(queued_for = ?queued_for, "relay message delivered");
                        }
                        Err(err) => {
                            error!(error = %err, "dropping undeliverable relay message");
                            sleep(FAILURE_PAUSE).await;
                        }
                    }
                }
            }
        }
        info!("relay consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelaySink for RecordingSink {
        async fn deliver(&self, text: &str) -> Result<(), SinkError> {
            self.delivered.lock().await.push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_fails_after_consumer_drops() {
        let (relay, consumer) = MessageRelay::channel();
        drop(consumer);
        assert!(matches!(
            relay.enqueue("pozdrav".to_string()),
            Err(RelayError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_idle_consumer() {
        let (_relay, consumer) = MessageRelay::channel();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(consumer.run(sink, cancel.clone()));

        cancel.cancel();
        task.await.expect("consumer exits");
    }

    #[tokio::test(start_paused = true)]
    async fn queued_messages_drain_before_shutdown() {
        let (relay, consumer) = MessageRelay::channel();
        let sink = Arc::new(RecordingSink::default());

        relay.enqueue("prva".to_string()).expect("enqueue");
        relay.enqueue("druga".to_string()).expect("enqueue");
        drop(relay);

        consumer.run(sink.clone(), CancellationToken::new()).await;
        assert_eq!(*sink.delivered.lock().await, vec!["prva", "druga"]);
    }
}
