use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use floorsync_api::TransportConfig;
use floorsync_api::feed::{self, FeedSink, FeedSource};

use super::machine::{ConnectionState, FeedMachine, ReconnectConfig};
use crate::registry::SubscriptionRegistry;

/// Background task owning the feed connection.
///
/// Loops connect → serve → back off until cancelled. Every open sends the
/// registry's full subscription set; every attempt starts from an empty
/// mirror.
pub(crate) struct FeedDriver {
    url: Url,
    transport: TransportConfig,
    registry: Arc<SubscriptionRegistry>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    machine: FeedMachine,
}

impl FeedDriver {
    pub(crate) fn new(
        url: Url,
        transport: TransportConfig,
        registry: Arc<SubscriptionRegistry>,
        state_tx: Arc<watch::Sender<ConnectionState>>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            transport,
            registry,
            state_tx,
            cancel,
            machine: FeedMachine::new(reconnect),
        }
    }

    fn publish(&self) {
        self.state_tx.send_if_modified(|current| {
            let next = self.machine.state();
            let changed = *current != next;
            *current = next;
            changed
        });
    }

    pub(crate) async fn run(mut self) {
        debug!(url = %self.url, "feed driver started");

        loop {
            if !self.machine.connecting() {
                break;
            }
            self.registry.reset_mirror();
            self.publish();

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = feed::connect(&self.url, &self.transport) => result,
            };

            match connected {
                Ok((sink, source)) => {
                    self.machine.opened();
                    self.publish();
                    self.serve(sink, source).await;
                    self.registry.detach();
                }
                Err(e) => warn!(error = %e, "feed connection failed"),
            }

            if self.cancel.is_cancelled() {
                break;
            }
            let Some(delay) = self.machine.closed() else {
                break;
            };
            self.publish();
            debug!(delay_ms = delay.as_millis(), "feed reconnect scheduled");

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.registry.detach();
        self.machine.shutdown();
        self.publish();
        info!("feed driver stopped");
    }

    /// Drive one open connection until it ends or the driver is cancelled.
    async fn serve(&self, mut sink: FeedSink, mut source: FeedSource) {
        let (tx, mut outbound) = mpsc::unbounded_channel();
        let batch = self.registry.attach(tx);
        info!(subscriptions = batch.len(), "feed open, resubscribing");

        if let Err(e) = sink.send_batch(&batch).await {
            warn!(error = %e, "failed to send subscription batch");
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "feed close handshake failed");
                    }
                    return;
                }
                Some(op) = outbound.recv() => {
                    if let Err(e) = sink.send_batch(std::slice::from_ref(&op)).await {
                        warn!(error = %e, path = op.path(), "failed to send subscription change");
                        return;
                    }
                }
                frame = source.next_text() => match frame {
                    Some(Ok(text)) => {
                        if let Err(e) = self.registry.apply_message(&text) {
                            warn!(error = %e, "dropping feed message");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "feed read failed");
                        return;
                    }
                    None => {
                        info!("feed closed by server");
                        return;
                    }
                },
            }
        }
    }
}
