//! Per-user live-update notifications.
//!
//! A mutation handler calls [`ChangeNotifier::emit`] after a successful
//! backend write; every open subscription for that user receives a unit
//! "refresh" signal telling the page to refetch. Delivery is best-effort and
//! at-most-once: no queue survives past the small per-subscriber buffer,
//! emitting with no open subscriber is a no-op, and a slow subscriber never
//! stalls the emitting request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

/// Signals an emitter may get ahead of a subscriber by before further ones
/// are dropped. The page refetches on every signal, so dropped extras are
/// harmless.
const SIGNAL_BUFFER: usize = 8;

type Registry = HashMap<String, HashMap<u64, mpsc::Sender<()>>>;

/// A per-user publish/subscribe relay for refresh signals.
///
/// Cheap to clone; all clones share one subscriber registry.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<Registry>,
}

impl ChangeNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in refresh signals for a user.
    ///
    /// The subscription deregisters itself when dropped, which is what
    /// happens when the browser disconnects from the live-update endpoint.
    #[must_use]
    pub fn subscribe(&self, user_id: &str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SIGNAL_BUFFER);
        self.lock_registry()
            .entry(user_id.to_owned())
            .or_default()
            .insert(id, sender);
        tracing::debug!(user_id, id, "live-update subscriber registered");

        Subscription {
            notifier: self.clone(),
            user_id: user_id.to_owned(),
            id,
            receiver,
        }
    }

    /// Emits a refresh signal to every open subscription for a user.
    ///
    /// Fire-and-forget: never blocks, never errors, and silently drops the
    /// signal when no subscriber is open or a subscriber's buffer is full.
    pub fn emit(&self, user_id: &str) {
        let mut registry = self.lock_registry();
        let Some(subscribers) = registry.get_mut(user_id) else {
            return;
        };
        subscribers.retain(|id, sender| match sender.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::trace!(user_id, id, "subscriber buffer full, signal dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        });
        if subscribers.is_empty() {
            registry.remove(user_id);
        }
    }

    /// The number of open subscriptions for a user.
    #[must_use]
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.lock_registry()
            .get(user_id)
            .map_or(0, HashMap::len)
    }

    fn remove(&self, user_id: &str, id: u64) {
        let mut registry = self.lock_registry();
        if let Some(subscribers) = registry.get_mut(user_id) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                registry.remove(user_id);
            }
        }
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        // No invariant spans the lock, so a poisoned registry is still usable.
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open interest in one user's refresh signals.
#[derive(Debug)]
pub struct Subscription {
    notifier: ChangeNotifier,
    user_id: String,
    id: u64,
    receiver: mpsc::Receiver<()>,
}

impl Subscription {
    /// Waits for the next refresh signal. Returns `None` once the
    /// subscription has been deregistered.
    pub async fn recv(&mut self) -> Option<()> {
        self.receiver.recv().await
    }

    /// Deregisters this subscription. Idempotent; dropping the subscription
    /// has the same effect.
    pub fn unsubscribe(&mut self) {
        self.notifier.remove(&self.user_id, self.id);
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
