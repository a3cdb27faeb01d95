//! Ownership and control-input validation for the sequences of one model version.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

use super::{ControlSignal, ProcessingSpec, Sequence, SequenceId};

/// Owns the sequence map of one (model, version) pair.
///
/// The manager carries no lock of its own; its owner wraps it in a mutex and
/// every method here expects to be called with that mutex held.
pub struct SequenceManager {
    sequences: HashMap<SequenceId, Arc<Sequence>>,
    model_name: String,
    model_version: u64,
    max_sequence_number: u32,
    next_id: SequenceId,
}

impl SequenceManager {
    pub fn new(
        max_sequence_number: u32,
        model_name: impl Into<String>,
        model_version: u64,
    ) -> Self {
        Self {
            sequences: HashMap::new(),
            model_name: model_name.into(),
            model_version,
            max_sequence_number,
            next_id: 0,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_version(&self) -> u64 {
        self.model_version
    }

    /// Number of currently live sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Resolve the control inputs of one request against the sequence map.
    ///
    /// On START with id 0 a fresh id is generated and written back into the
    /// spec. On success the target sequence is guaranteed to exist.
    pub fn process_spec(&mut self, spec: &mut ProcessingSpec) -> Result<()> {
        match (spec.control, spec.sequence_id) {
            (ControlSignal::Start, 0) => {
                if self.sequences.len() as u32 >= self.max_sequence_number {
                    return Err(Error::MaxSequencesReached {
                        limit: self.max_sequence_number,
                    });
                }
                let id = self.next_free_id();
                self.insert_sequence(id)?;
                spec.sequence_id = id;
                Ok(())
            }
            (ControlSignal::Start, id) => {
                if self.sequences.contains_key(&id) {
                    return Err(Error::SequenceAlreadyExists { sequence_id: id });
                }
                if self.sequences.len() as u32 >= self.max_sequence_number {
                    return Err(Error::MaxSequencesReached {
                        limit: self.max_sequence_number,
                    });
                }
                self.insert_sequence(id)
            }
            (ControlSignal::Continue | ControlSignal::End, 0) => Err(Error::SequenceIdNotProvided),
            (ControlSignal::Continue | ControlSignal::End, id) => {
                if !self.sequences.contains_key(&id) {
                    return Err(Error::SequenceMissing { sequence_id: id });
                }
                // END removal happens only after inference completes
                Ok(())
            }
        }
    }

    pub fn sequence_exists(&self, id: SequenceId) -> bool {
        self.sequences.contains_key(&id)
    }

    pub fn get_sequence(&self, id: SequenceId) -> Result<Arc<Sequence>> {
        self.sequences
            .get(&id)
            .cloned()
            .ok_or(Error::SequenceMissing { sequence_id: id })
    }

    /// Delete one sequence. The caller must not hold the sequence's memory
    /// mutex anymore; see the lock ordering rules.
    pub fn remove_sequence(&mut self, id: SequenceId) -> Result<()> {
        match self.sequences.remove(&id) {
            Some(_) => {
                debug!(
                    "Removed sequence {} from model {} version {}",
                    id, self.model_name, self.model_version
                );
                Ok(())
            }
            None => Err(Error::SequenceMissing { sequence_id: id }),
        }
    }

    /// Remove every sequence whose idle flag is still set. Reaper only.
    pub fn remove_idle_sequences(&mut self) -> usize {
        let before = self.sequences.len();
        self.sequences.retain(|_, sequence| !sequence.is_idle());
        let removed = before - self.sequences.len();
        if removed > 0 {
            debug!(
                "Removed {} idle sequences from model {} version {}",
                removed, self.model_name, self.model_version
            );
        }
        removed
    }

    /// Flag every remaining sequence as idle. Reaper only.
    pub fn mark_all_idle(&self) {
        for sequence in self.sequences.values() {
            sequence.mark_idle();
        }
    }

    fn insert_sequence(&mut self, id: SequenceId) -> Result<()> {
        self.sequences.insert(id, Arc::new(Sequence::new(id)));
        debug!(
            "Added sequence {} to model {} version {}",
            id, self.model_name, self.model_version
        );
        Ok(())
    }

    /// Monotonic counter with wrap-and-probe; never yields 0 or a live id.
    fn next_free_id(&mut self) -> SequenceId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id != 0 && !self.sequences.contains_key(&self.next_id) {
                return self.next_id;
            }
        }
    }
}
