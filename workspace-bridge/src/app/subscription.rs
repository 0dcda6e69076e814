use crate::telemetry::BridgeMetrics;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(1_000);

/// Consumes the messages of one subscription, strictly in arrival order.
#[async_trait]
pub trait MessageHandler<M: Send + 'static>: Send {
    async fn handle(&mut self, message: M);
}

enum StreamEnd<E> {
    Completed,
    Failed(E),
}

/// Drives a long-lived server stream forever: subscribe, hand every message
/// to the handler, and after the stream ends or fails wait a fixed delay and
/// subscribe again. Only cancellation ends the loop; the open stream is
/// dropped at that point, which cancels the call on the server.
pub struct SubscriptionLoop {
    name: &'static str,
    resubscribe_delay: Duration,
    metrics: Option<Arc<BridgeMetrics>>,
}

impl SubscriptionLoop {
    pub fn new(name: &'static str, resubscribe_delay: Duration) -> Self {
        Self {
            name,
            resubscribe_delay,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<BridgeMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn run<M, E, S, Fut, St, H>(
        &self,
        mut subscribe: S,
        handler: &mut H,
        cancel: &CancellationToken,
    ) where
        M: Send + 'static,
        E: Display + Send,
        S: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<St, E>> + Send,
        St: Stream<Item = Result<M, E>> + Unpin + Send,
        H: MessageHandler<M> + ?Sized,
    {
        info!(subscription = self.name, "subscription started");
        loop {
            let end = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                end = self.consume(&mut subscribe, handler) => end,
            };

            match end {
                StreamEnd::Completed => {
                    warn!(
                        subscription = self.name,
                        delay_ms = self.resubscribe_delay.as_millis() as u64,
                        "stream completed, resubscribing"
                    );
                }
                StreamEnd::Failed(err) => {
                    warn!(
                        subscription = self.name,
                        delay_ms = self.resubscribe_delay.as_millis() as u64,
                        %err,
                        "stream failed, resubscribing"
                    );
                }
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_subscription_restart(self.name);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }
        debug!(subscription = self.name, "subscription cancelled");
    }

    async fn consume<M, E, S, Fut, St, H>(&self, subscribe: &mut S, handler: &mut H) -> StreamEnd<E>
    where
        M: Send + 'static,
        S: FnMut() -> Fut,
        Fut: Future<Output = Result<St, E>>,
        St: Stream<Item = Result<M, E>> + Unpin,
        H: MessageHandler<M> + ?Sized,
    {
        let mut stream = match subscribe().await {
            Ok(stream) => stream,
            Err(err) => return StreamEnd::Failed(err),
        };
        while let Some(item) = stream.next().await {
            match item {
                Ok(message) => handler.handle(message).await,
                Err(err) => return StreamEnd::Failed(err),
            }
        }
        StreamEnd::Completed
    }
}
