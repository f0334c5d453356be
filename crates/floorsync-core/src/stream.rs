// ── Reactive module streams ──
//
// Watch-channel view of one module's mirrored state, for consumers that
// prefer awaiting changes over implementing `Listener`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::address::ModuleAddress;
use crate::registry::{Listener, SubscriptionRegistry};

/// Per-module state snapshot; `None` until the server sends one.
pub type ModuleSnapshot = Option<Arc<Value>>;

struct WatchListener {
    tx: watch::Sender<ModuleSnapshot>,
}

impl Listener for WatchListener {
    fn notify(&self, _address: ModuleAddress, state: Option<&Value>) {
        self.tx.send_replace(state.cloned().map(Arc::new));
    }
}

/// Registry membership that ends when dropped.
struct Registration {
    registry: Arc<SubscriptionRegistry>,
    address: ModuleAddress,
    listener: Arc<dyn Listener>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.address, &self.listener);
    }
}

/// A subscription to one module.
///
/// Holds a registry listener for as long as it (or the `Stream` made from
/// it) is alive.
pub struct ModuleStream {
    current: ModuleSnapshot,
    receiver: watch::Receiver<ModuleSnapshot>,
    registration: Registration,
}

impl ModuleStream {
    pub(crate) fn subscribe(registry: Arc<SubscriptionRegistry>, address: ModuleAddress) -> Self {
        let (tx, mut receiver) = watch::channel(None);
        let listener: Arc<dyn Listener> = Arc::new(WatchListener { tx });
        // Cached state is replayed into the channel before this returns.
        registry.subscribe(address, Arc::clone(&listener));
        let current = receiver.borrow_and_update().clone();

        Self {
            current,
            receiver,
            registration: Registration {
                registry,
                address,
                listener,
            },
        }
    }

    pub fn address(&self) -> ModuleAddress {
        self.registration.address
    }

    /// Snapshot as of creation or the last `changed()`.
    pub fn current(&self) -> &ModuleSnapshot {
        &self.current
    }

    /// Wait for the next update. Every notification counts, even when the
    /// state is equal to the previous one.
    pub async fn changed(&mut self) -> Option<ModuleSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` that yields the current snapshot first, then
    /// every update.
    pub fn into_stream(self) -> ModuleWatchStream {
        ModuleWatchStream {
            inner: WatchStream::new(self.receiver),
            _registration: self.registration,
        }
    }
}

/// `Stream` adapter for [`ModuleStream`].
pub struct ModuleWatchStream {
    inner: WatchStream<ModuleSnapshot>,
    _registration: Registration,
}

impl Stream for ModuleWatchStream {
    type Item = ModuleSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
