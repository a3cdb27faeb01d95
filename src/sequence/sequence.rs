//! One conversational session and its saved hidden state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};

use crate::tensor::TensorData;

use super::SequenceId;

/// Saved value of every state slot, keyed by slot name.
pub type MemoryStateMap = HashMap<String, TensorData>;

/// One sequence: the hidden state saved between requests plus the idle flag
/// consulted by the reaper.
///
/// The memory-state mutex must be held for the entire window in which any
/// component reads or writes the map; the returned guard is that window. The
/// idle flag deliberately lives outside the mutex so the reaper can inspect
/// and set it while only holding the manager's lock.
pub struct Sequence {
    id: SequenceId,
    idle: AtomicBool,
    memory: Mutex<MemoryStateMap>,
}

impl Sequence {
    pub fn new(id: SequenceId) -> Self {
        Self {
            id,
            idle: AtomicBool::new(false),
            memory: Mutex::new(MemoryStateMap::new()),
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// Lock the saved memory state for exclusive access.
    pub async fn memory(&self) -> MutexGuard<'_, MemoryStateMap> {
        self.memory.lock().await
    }

    pub fn mark_active(&self) {
        self.idle.store(false, Ordering::Release);
    }

    pub fn mark_idle(&self) {
        self.idle.store(true, Ordering::Release);
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }
}
