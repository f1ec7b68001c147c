//! In-flight request de-duplication
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! arriving while it runs wait for its value. If the leader is dropped
//! before finishing, the first released waiter takes over as leader and the
//! rest wait on it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::watch;
use tracing::debug;

type Slot<T> = watch::Sender<Option<T>>;

/// Collapses concurrent calls with the same key into one
pub struct SingleFlight<T> {
    inflight: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("inflight", &self.inflight.lock().len())
            .finish()
    }
}

enum Role<T> {
    Leader,
    Follower(watch::Receiver<Option<T>>),
}

/// Removes the leader's slot, publishing the value if there is one
struct LeaderGuard<'a, T> {
    inflight: &'a Mutex<HashMap<String, Slot<T>>>,
    key: String,
    published: bool,
}

impl<T> LeaderGuard<'_, T> {
    fn publish(mut self, value: T) {
        if let Some(slot) = self.inflight.lock().remove(&self.key) {
            slot.send_replace(Some(value));
        }
        self.published = true;
    }
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if !self.published {
            // Dropping the sender wakes waiters with an error
            self.inflight.lock().remove(&self.key);
        }
    }
}

impl<T: Clone + Send + Sync> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a running leader
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Run `work` for `key`, or wait for the call already running
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            let role = {
                let mut inflight = self.inflight.lock();
                match inflight.get(key) {
                    Some(slot) => Role::Follower(slot.subscribe()),
                    None => {
                        let (slot, _) = watch::channel(None);
                        inflight.insert(key.to_string(), slot);
                        Role::Leader
                    }
                }
            };

            match role {
                Role::Leader => {
                    let guard = LeaderGuard {
                        inflight: &self.inflight,
                        key: key.to_string(),
                        published: false,
                    };
                    let value = work().await;
                    guard.publish(value.clone());
                    return value;
                }
                Role::Follower(mut rx) => {
                    debug!(key, "Joining in-flight request");
                    let shared = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|value| value.clone());

                    if let Some(value) = shared {
                        return value;
                    }
                    debug!(key, "In-flight leader went away, electing a new one");
                }
            }
        }
    }
}
