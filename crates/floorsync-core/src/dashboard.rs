// ── Dashboard context ──
//
// Owns the registry, the feed driver, the clock estimate and the HTTP
// client for one module server. Created by the application and cloned
// into whatever needs it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use floorsync_api::ModuleClient;

use crate::address::ModuleAddress;
use crate::clock::ClockOffset;
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::feed::{ConnectionState, FeedDriver};
use crate::registry::{Listener, SubscriptionRegistry};
use crate::stream::ModuleStream;

/// Live view of one module server.
///
/// Cheaply cloneable via `Arc<DashboardInner>`. `new()` does not touch the
/// network; call [`start()`](Self::start) to calibrate the clock and open
/// the feed, and [`shutdown()`](Self::shutdown) to stop it for good.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    registry: Arc<SubscriptionRegistry>,
    client: Arc<ModuleClient>,
    clock: ClockOffset,
    connection_state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        let client = ModuleClient::new(config.base_url.clone(), &config.transport)?;
        let (connection_state, _) = watch::channel(ConnectionState::Closed);

        Ok(Self {
            inner: Arc::new(DashboardInner {
                config,
                registry: Arc::new(SubscriptionRegistry::new()),
                client: Arc::new(client),
                clock: ClockOffset::new(),
                connection_state: Arc::new(connection_state),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.inner.registry
    }

    pub fn client(&self) -> &Arc<ModuleClient> {
        &self.inner.client
    }

    pub fn clock(&self) -> &ClockOffset {
        &self.inner.clock
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background tasks: one clock calibration (if enabled) and
    /// the feed driver. Calling it again while running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("dashboard already started");
            return Ok(());
        }
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::TransportClosed {
                reason: "dashboard was shut down".into(),
            });
        }

        let url = self.inner.config.feed_url()?;

        if self.inner.config.calibrate_clock {
            let clock = self.inner.clock.clone();
            let client = Arc::clone(&self.inner.client);
            let cancel = self.inner.cancel.child_token();
            handles.push(tokio::spawn(async move {
                // Failure is logged inside; the offset simply stays at zero.
                tokio::select! {
                    () = cancel.cancelled() => {}
                    _ = clock.calibrate(&client) => {}
                }
            }));
        }

        // Visible before the driver task gets scheduled.
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);
        let driver = FeedDriver::new(
            url,
            self.inner.config.transport.clone(),
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.connection_state),
            self.inner.config.reconnect,
            self.inner.cancel.child_token(),
        );
        handles.push(tokio::spawn(driver.run()));

        info!(server = %self.inner.config.base_url, "dashboard started");
        Ok(())
    }

    /// Stop reconnecting, close the feed and wait for background tasks.
    /// Terminal: the dashboard cannot be started again.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task failed");
            }
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Closed);
        debug!("dashboard shut down");
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self, address: impl Into<ModuleAddress>, listener: Arc<dyn Listener>) {
        self.inner.registry.subscribe(address, listener);
    }

    pub fn unsubscribe(&self, address: impl Into<ModuleAddress>, listener: &Arc<dyn Listener>) {
        self.inner.registry.unsubscribe(address, listener);
    }

    /// Subscribe with a watch-backed stream that unsubscribes when dropped.
    pub fn watch_module(&self, address: impl Into<ModuleAddress>) -> ModuleStream {
        ModuleStream::subscribe(Arc::clone(&self.inner.registry), address.into())
    }

    // ── Connection state ─────────────────────────────────────────────

    /// Subscribe to feed state changes (the "offline" indicator).
    ///
    /// Reads `Closed` until [`start()`](Self::start) and after
    /// [`shutdown()`](Self::shutdown); `start` moves it to `Connecting`.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Open
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run one clock calibration now.
    pub async fn calibrate_clock(&self) -> Result<i64, CoreError> {
        self.inner.clock.calibrate(&self.inner.client).await
    }

    /// `PUT` a value to a sub-unit field and report the outcome.
    pub async fn put(
        &self,
        address: impl Into<ModuleAddress>,
        subindex: u32,
        field: &str,
        value: &Value,
    ) -> Result<(), CoreError> {
        let hex = address.into().encode();
        self.inner
            .client
            .put_state(&hex, subindex, field, value)
            .await?;
        Ok(())
    }

    /// `GET` a sub-unit field. The server also pushes the answer over the
    /// feed.
    pub async fn get(
        &self,
        address: impl Into<ModuleAddress>,
        subindex: u32,
        field: &str,
    ) -> Result<Value, CoreError> {
        let hex = address.into().encode();
        Ok(self.inner.client.get_state(&hex, subindex, field).await?)
    }

    /// Fire-and-forget `PUT`. Failures are logged, never retried; the new
    /// state arrives through the feed.
    pub fn send_command(
        &self,
        address: impl Into<ModuleAddress>,
        subindex: u32,
        field: &str,
        value: Value,
    ) -> JoinHandle<()> {
        let dashboard = self.clone();
        let address = address.into();
        let field = field.to_owned();
        tokio::spawn(async move {
            if let Err(e) = dashboard.put(address, subindex, &field, &value).await {
                warn!(address = %address, subindex, field = %field, error = %e, "command failed");
            }
        })
    }

    /// Fire-and-forget refresh request for a sub-unit whose state is
    /// missing. The response body is ignored; the feed carries the value.
    pub fn request_state(
        &self,
        address: impl Into<ModuleAddress>,
        subindex: u32,
        field: &str,
    ) -> JoinHandle<()> {
        let dashboard = self.clone();
        let address = address.into();
        let field = field.to_owned();
        tokio::spawn(async move {
            if let Err(e) = dashboard.get(address, subindex, &field).await {
                warn!(address = %address, subindex, field = %field, error = %e, "state request failed");
            }
        })
    }
}
