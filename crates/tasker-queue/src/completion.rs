//! One-shot listeners keyed by a payload's completion key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::oneshot;

use crate::error::{QueueError, Result};

type Outcome<O> = Result<O>;

pub(crate) struct Listeners<O> {
    next_id: AtomicU64,
    by_key: Mutex<HashMap<String, Vec<(u64, oneshot::Sender<Outcome<O>>)>>>,
}

impl<O: Clone> Listeners<O> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            by_key: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(self: &Arc<Self>, key: &str) -> Completion<O> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push((id, tx));
        Completion {
            rx,
            key: key.to_string(),
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Deliver `outcome` to every listener on `key` and forget them.
    pub(crate) fn resolve(&self, key: &str, outcome: &Outcome<O>) -> usize {
        let waiting = self
            .by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .unwrap_or_default();
        let count = waiting.len();
        for (_, tx) in waiting {
            let _ = tx.send(outcome.clone());
        }
        count
    }

    /// Drop every listener; their receivers observe `Closed`.
    pub(crate) fn clear(&self) {
        self.by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    fn unregister(&self, key: &str, id: u64) {
        let mut by_key = self.by_key.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = by_key.get_mut(key) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                by_key.remove(key);
            }
        }
    }
}

/// Resolves with the outcome of the next job carrying the registered key.
///
/// Dropping it before delivery (e.g. when a surrounding timeout fires)
/// unregisters the listener.
pub struct Completion<O: Clone> {
    rx: oneshot::Receiver<Outcome<O>>,
    key: String,
    id: u64,
    registry: Weak<Listeners<O>>,
}

impl<O: Clone> Completion<O> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn wait(mut self) -> Result<O> {
        (&mut self.rx).await.unwrap_or(Err(QueueError::Closed))
    }
}

impl<O: Clone> Drop for Completion<O> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.key, self.id);
        }
    }
}
