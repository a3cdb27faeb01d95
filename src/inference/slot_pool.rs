//! Fixed-capacity pool of execution slots for one compiled model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::error;

use crate::error::{Error, Result};
use crate::runtime::{CompiledModel, InferSlot};

struct PooledSlot {
    id: usize,
    slot: Box<dyn InferSlot>,
}

/// Pool of pre-created execution slots, handed out one per in-flight request.
///
/// Acquisition is FIFO; waiters queue on the semaphore in arrival order. The
/// free list lives behind a std mutex that is only ever held for a push or
/// pop, never across an await.
pub struct SlotPool {
    free: Arc<Mutex<VecDeque<PooledSlot>>>,
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl SlotPool {
    /// Pre-create `nireq` slots against the model; 0 selects the runtime's
    /// recommended count.
    pub fn new(model: &dyn CompiledModel, nireq: usize) -> Result<Self> {
        let capacity = if nireq == 0 {
            model.recommended_slot_count()
        } else {
            nireq
        };
        let mut free = VecDeque::with_capacity(capacity);
        for id in 0..capacity {
            free.push_back(PooledSlot {
                id,
                slot: model.create_slot()?,
            });
        }
        Ok(Self {
            free: Arc::new(Mutex::new(free)),
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a slot is free and take exclusive ownership of it.
    pub async fn acquire(&self) -> Result<SlotGuard> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("slot pool semaphore closed".to_string()))?;
        let pooled = self
            .free
            .lock()
            .map_err(|_| Error::Internal("slot pool lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| Error::Internal("slot pool free list empty with permit held".to_string()))?;
        Ok(SlotGuard {
            inner: Some(pooled),
            free: Arc::clone(&self.free),
            _permit: permit,
        })
    }
}

/// Scoped ownership of one pool slot; returns the slot on any exit path.
pub struct SlotGuard {
    inner: Option<PooledSlot>,
    free: Arc<Mutex<VecDeque<PooledSlot>>>,
    _permit: OwnedSemaphorePermit,
}

impl SlotGuard {
    /// Stable identifier of the held slot, for logs and metric labels.
    pub fn id(&self) -> usize {
        self.inner.as_ref().map(|p| p.id).unwrap_or_default()
    }

    pub fn slot(&mut self) -> &mut dyn InferSlot {
        self.inner
            .as_mut()
            .map(|p| p.slot.as_mut())
            .expect("slot guard accessed after release")
    }

    pub fn slot_ref(&self) -> &dyn InferSlot {
        self.inner
            .as_ref()
            .map(|p| p.slot.as_ref())
            .expect("slot guard accessed after release")
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(pooled) = self.inner.take() {
            match self.free.lock() {
                Ok(mut free) => free.push_back(pooled),
                Err(_) => error!("Slot {} lost: pool lock poisoned", pooled.id),
            }
        }
        // The permit is released after the slot is back on the free list
    }
}
