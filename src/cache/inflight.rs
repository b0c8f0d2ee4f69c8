//! In-Flight Request De-duplication
//!
//! At most one pending computation per key. The first caller starts it and
//! later callers join the same shared future. The computation is driven on
//! its own task and leaves the map only once it settles, so callers that
//! give up early never open the door to a second computation.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A pending computation that every joiner can await
pub type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

type PendingMap<T, E> = Arc<Mutex<HashMap<String, SharedFetch<T, E>>>>;

/// Map of key to pending shared computation
pub struct InFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pending: PendingMap<T, E>,
}

/// Outcome of joining the in-flight map
pub enum Flight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// This caller started the computation
    Owner(SharedFetch<T, E>),
    /// Another caller's computation is pending
    Joined(SharedFetch<T, E>),
}

impl<T, E> Flight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn is_owner(&self) -> bool {
        matches!(self, Flight::Owner(_))
    }

    /// Wait for the shared result
    pub async fn wait(self) -> Result<T, E> {
        match self {
            Flight::Owner(shared) | Flight::Joined(shared) => shared.await,
        }
    }
}

impl<T, E> InFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the pending computation for `key`, or start one with `start`.
    ///
    /// `start` is only invoked when no computation is pending. Everything the
    /// started future does, including storing its result, completes before
    /// the key is released. Must be called within a Tokio runtime.
    pub fn join_or_start<F, Fut>(&self, key: &str, start: F) -> Flight<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock();
            if let Some(existing) = pending.get(key) {
                return Flight::Joined(existing.clone());
            }

            let computation = start();
            let map = Arc::clone(&self.pending);
            let owned_key = key.to_string();
            let shared = async move {
                let result = computation.await;
                map.lock().remove(&owned_key);
                result
            }
            .boxed()
            .shared();
            pending.insert(key.to_string(), shared.clone());
            shared
        };

        // Settles even if every caller stops waiting
        tokio::spawn(shared.clone());
        Flight::Owner(shared)
    }

    /// Check if a computation is pending for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of pending computations
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl<T, E> Default for InFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
