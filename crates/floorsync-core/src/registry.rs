// ── Subscription registry ──
//
// Per-address listener sets plus the mirrored state they observe. All
// mutation goes through one mutex: subscribe, unsubscribe and patch
// application never interleave, and listeners are notified while it is
// held so they always see batches in feed order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use floorsync_api::{PatchOp, feed};

use crate::address::ModuleAddress;
use crate::error::CoreError;
use crate::patch::StateMirror;

/// Receiver of per-module state updates.
///
/// `state` is `None` when the module has no mirrored state (never received,
/// or removed by the server). Implementations run with the registry locked:
/// they must return quickly and must not call back into the registry.
pub trait Listener: Send + Sync {
    fn notify(&self, address: ModuleAddress, state: Option<&Value>);
}

impl<F> Listener for F
where
    F: Fn(ModuleAddress, Option<&Value>) + Send + Sync,
{
    fn notify(&self, address: ModuleAddress, state: Option<&Value>) {
        self(address, state);
    }
}

struct Entry {
    address: ModuleAddress,
    /// Insertion-ordered, no duplicates (compared by pointer).
    listeners: Vec<Arc<dyn Listener>>,
}

struct RegistryInner {
    /// Canonical address key -> entry. Present iff it has listeners.
    entries: IndexMap<String, Entry>,
    mirror: StateMirror,
    /// Outbound subscription channel; `Some` exactly while the feed is open.
    link: Option<mpsc::UnboundedSender<PatchOp>>,
}

impl RegistryInner {
    fn send(&self, op: PatchOp) {
        let Some(ref link) = self.link else {
            trace!(path = op.path(), "feed not open, subscription change deferred");
            return;
        };
        if link.send(op).is_err() {
            debug!("feed session ended before subscription change was sent");
        }
    }
}

/// Address-keyed listener sets and the state mirror they share.
pub struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: IndexMap::new(),
                mirror: StateMirror::new(),
                link: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A listener that panicked leaves the data itself consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `listener` for `address`.
    ///
    /// The first listener for an address creates its entry and, if the feed
    /// is open, sends an `add` subscription. If state is already mirrored
    /// the listener is notified before this returns.
    pub fn subscribe(&self, address: impl Into<ModuleAddress>, listener: Arc<dyn Listener>) {
        let address = address.into();
        let key = address.encode();
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) {
            debug!(address = %key, "new module subscription");
            inner.entries.insert(
                key.clone(),
                Entry {
                    address,
                    listeners: Vec::new(),
                },
            );
            inner.send(subscribe_op(address));
        }

        let inner = &mut *inner;
        if let Some(entry) = inner.entries.get_mut(&key) {
            if !entry.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                entry.listeners.push(Arc::clone(&listener));
            }
        }

        if let Some(state) = inner.mirror.module(&key) {
            listener.notify(address, Some(state));
        }
    }

    /// Remove `listener` from `address`.
    ///
    /// Dropping the last listener removes the entry and its mirrored state
    /// and, if the feed is open, sends a `remove` subscription. Unknown
    /// addresses or listeners are ignored.
    pub fn unsubscribe(&self, address: impl Into<ModuleAddress>, listener: &Arc<dyn Listener>) {
        let address = address.into();
        let key = address.encode();
        let mut inner = self.lock();

        let Some(entry) = inner.entries.get_mut(&key) else {
            trace!(address = %key, "unsubscribe for unknown address ignored");
            return;
        };
        entry.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        if !entry.listeners.is_empty() {
            return;
        }

        debug!(address = %key, "last listener gone, dropping subscription");
        inner.entries.shift_remove(&key);
        inner.mirror.forget(&key);
        inner.send(unsubscribe_op(address));
    }

    // ── Patch application ────────────────────────────────────────────

    /// Apply one batch and fan out to listeners.
    ///
    /// Either every operation applies or none does. On success each listener
    /// of every touched, subscribed address is notified exactly once;
    /// returns the number of addresses notified.
    pub fn apply_patch(&self, ops: &[PatchOp]) -> Result<usize, CoreError> {
        let mut inner = self.lock();
        let touched = inner.mirror.apply(ops)?;

        let keys: Vec<String> = if touched.root {
            inner.entries.keys().cloned().collect()
        } else {
            touched.keys.into_iter().collect()
        };

        let inner = &*inner;
        let mut notified = 0;
        for key in &keys {
            let Some(entry) = inner.entries.get(key) else {
                trace!(address = %key, "update for unsubscribed module");
                continue;
            };
            let state = inner.mirror.module(key);
            for listener in &entry.listeners {
                listener.notify(entry.address, state);
            }
            notified += 1;
        }
        Ok(notified)
    }

    /// Decode a raw feed frame and apply it as one batch.
    pub fn apply_message(&self, text: &str) -> Result<usize, CoreError> {
        let ops = feed::parse_batch(text).map_err(CoreError::from)?;
        self.apply_patch(&ops)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Every address with at least one listener, in subscription order.
    pub fn addresses(&self) -> Vec<ModuleAddress> {
        self.lock().entries.values().map(|e| e.address).collect()
    }

    /// One `add` per tracked address, sent on every feed open.
    pub fn subscription_batch(&self) -> Vec<PatchOp> {
        self.lock()
            .entries
            .values()
            .map(|e| subscribe_op(e.address))
            .collect()
    }

    /// Mirrored state of one module (cloned).
    pub fn state(&self, address: impl Into<ModuleAddress>) -> Option<Value> {
        self.lock().mirror.module(&address.into().encode()).cloned()
    }

    /// Whole mirrored document (cloned).
    pub fn snapshot(&self) -> Value {
        self.lock().mirror.document().clone()
    }

    pub fn listener_count(&self, address: impl Into<ModuleAddress>) -> usize {
        self.lock()
            .entries
            .get(&address.into().encode())
            .map_or(0, |e| e.listeners.len())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // ── Feed hooks ───────────────────────────────────────────────────

    /// Feed opened: route future subscription changes to `link` and return
    /// the full resubscription batch. Both happen under one lock, so no
    /// change can slip between the batch and the first individual message.
    pub(crate) fn attach(&self, link: mpsc::UnboundedSender<PatchOp>) -> Vec<PatchOp> {
        let mut inner = self.lock();
        inner.link = Some(link);
        inner
            .entries
            .values()
            .map(|e| subscribe_op(e.address))
            .collect()
    }

    /// Feed closed: subscription changes are deferred until the next open.
    pub(crate) fn detach(&self) {
        self.lock().link = None;
    }

    /// New connection attempt: the server resends state for every
    /// resubscribed module, so the old mirror is dropped.
    pub(crate) fn reset_mirror(&self) {
        self.lock().mirror.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.lock().link.is_some()
    }
}

fn subscribe_op(address: ModuleAddress) -> PatchOp {
    PatchOp::add(address.pointer(), Value::Bool(true))
}

fn unsubscribe_op(address: ModuleAddress) -> PatchOp {
    PatchOp::remove(address.pointer())
}
