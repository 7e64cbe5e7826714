//! Registry of one [`ThreadState`] per conversation.
//!
//! The store is an ordinary value: construct one per process (or per test)
//! and share it behind an `Arc`. States are created lazily on first
//! reference and live as long as the store unless an explicit
//! [`ThreadStateStore::sweep`] with a non-default policy removes them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::message::ThreadId;
use crate::thread::ThreadState;

/// Shared handle to a thread's state. Holding the lock for the length of
/// a loop run serializes runs on the same thread.
pub type SharedThreadState = Arc<Mutex<ThreadState>>;

/// Decides which threads [`ThreadStateStore::sweep`] drops.
pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, thread_id: &ThreadId, last_access: DateTime<Utc>) -> bool;
}

/// Keeps everything. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetainAll;

impl EvictionPolicy for RetainAll {
    fn should_evict(&self, _thread_id: &ThreadId, _last_access: DateTime<Utc>) -> bool {
        false
    }
}

struct Slot {
    state: SharedThreadState,
    last_access: DateTime<Utc>,
}

pub struct ThreadStateStore {
    threads: RwLock<HashMap<ThreadId, Slot>>,
    policy: Box<dyn EvictionPolicy>,
}

impl ThreadStateStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            policy: Box::new(RetainAll),
        }
    }

    pub fn with_eviction_policy(mut self, policy: Box<dyn EvictionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Return the state for `thread_id`, creating it on first reference.
    pub async fn get_or_create(&self, thread_id: impl Into<ThreadId>) -> SharedThreadState {
        let thread_id = thread_id.into();
        let mut threads = self.threads.write().await;
        let slot = threads.entry(thread_id.clone()).or_insert_with(|| {
            debug!(thread_id = %thread_id, "Creating thread state");
            Slot {
                state: Arc::new(Mutex::new(ThreadState::new(thread_id.clone()))),
                last_access: Utc::now(),
            }
        });
        slot.last_access = Utc::now();
        Arc::clone(&slot.state)
    }

    /// Look up an existing state without creating one.
    pub async fn get(&self, thread_id: &ThreadId) -> Option<SharedThreadState> {
        let mut threads = self.threads.write().await;
        let slot = threads.get_mut(thread_id)?;
        slot.last_access = Utc::now();
        Some(Arc::clone(&slot.state))
    }

    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }

    pub async fn thread_ids(&self) -> Vec<ThreadId> {
        let mut ids: Vec<ThreadId> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Apply the eviction policy once. Returns how many threads were dropped.
    ///
    /// A state that is locked or still referenced outside the store is kept
    /// whatever the policy says, so a thread never has two live states.
    pub async fn sweep(&self) -> usize {
        let mut threads = self.threads.write().await;
        let before = threads.len();
        threads.retain(|id, slot| {
            if Arc::strong_count(&slot.state) > 1 || slot.state.try_lock().is_err() {
                return true;
            }
            !self.policy.should_evict(id, slot.last_access)
        });
        let evicted = before - threads.len();
        if evicted > 0 {
            info!(evicted, remaining = threads.len(), "Evicted thread states");
        }
        evicted
    }
}

impl Default for ThreadStateStore {
    fn default() -> Self {
        Self::new()
    }
}
