//! End-to-end orchestration of one stateful predict request.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::{EmitOutput, ExtractInput};
use crate::config::StatefulModelConfig;
use crate::error::{Error, Result};
use crate::metrics::{ActiveRequestGuard, ModelMetricReporter, Phase};
use crate::runtime::{CompiledModel, InferSlot};
use crate::sequence::{
    ControlSignal, MemoryStateMap, ProcessingSpec, SequenceManager, SequenceReaper,
};

use super::extractor;
use super::serialization;
use super::slot_pool::SlotPool;

/// One loaded stateful model version: compiled model, slot pool, sequence
/// manager, and metric reporter.
pub struct StatefulModelInstance {
    config: StatefulModelConfig,
    model: Arc<dyn CompiledModel>,
    pool: SlotPool,
    manager: Arc<Mutex<SequenceManager>>,
    reporter: Arc<ModelMetricReporter>,
    reaper: Arc<SequenceReaper>,
}

impl StatefulModelInstance {
    /// Build the slot pool and sequence manager for a compiled model and,
    /// when configured, register the manager for idle cleanup.
    pub async fn load(
        config: StatefulModelConfig,
        model: Arc<dyn CompiledModel>,
        reaper: Arc<SequenceReaper>,
    ) -> Result<Arc<Self>> {
        let pool = SlotPool::new(model.as_ref(), config.nireq)?;
        let manager = Arc::new(Mutex::new(SequenceManager::new(
            config.max_sequence_number,
            config.name.clone(),
            config.version,
        )));
        let reporter = Arc::new(ModelMetricReporter::new(config.name.clone(), config.version));

        let instance = Arc::new(Self {
            pool,
            manager,
            reporter,
            reaper,
            model,
            config,
        });

        if instance.config.idle_sequence_cleanup {
            instance
                .reaper
                .register_for_cleanup(
                    &instance.config.name,
                    instance.config.version,
                    Arc::downgrade(&instance.manager),
                )
                .await;
        }
        info!(
            "Loaded stateful model {} version {} with {} execution slots",
            instance.config.name,
            instance.config.version,
            instance.pool.capacity()
        );
        Ok(instance)
    }

    /// Permanently retire this model version: unregister from cleanup first,
    /// then drop all sequences.
    pub async fn retire(&self) {
        if self.config.idle_sequence_cleanup {
            self.reaper
                .unregister_from_cleanup(&self.config.name, self.config.version)
                .await;
        }
        let mut manager = self.manager.lock().await;
        let dropped = manager.len();
        *manager = SequenceManager::new(
            self.config.max_sequence_number,
            self.config.name.clone(),
            self.config.version,
        );
        info!(
            "Retired stateful model {} version {}, dropped {} sequences",
            self.config.name, self.config.version, dropped
        );
    }

    pub fn config(&self) -> &StatefulModelConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.config.name
    }

    pub fn model_version(&self) -> u64 {
        self.config.version
    }

    pub fn reporter(&self) -> &Arc<ModelMetricReporter> {
        &self.reporter
    }

    /// Handle to the sequence manager shared with the reaper.
    pub fn sequence_manager(&self) -> &Arc<Mutex<SequenceManager>> {
        &self.manager
    }

    /// Number of currently live sequences.
    pub async fn live_sequences(&self) -> usize {
        self.manager.lock().await.len()
    }

    /// Run one stateful predict request end to end.
    pub async fn infer<Req, Resp>(&self, request: &Req, response: &mut Resp) -> Result<()>
    where
        Req: ExtractInput + ?Sized,
        Resp: EmitOutput + ?Sized,
    {
        let result = self.infer_inner(request, response).await;
        match &result {
            Ok(()) => self.reporter.record_success(),
            Err(e) => {
                self.reporter.record_failure();
                debug!(
                    "Request failed for model {} version {}: {} ({})",
                    self.config.name,
                    self.config.version,
                    e,
                    e.code()
                );
            }
        }
        result
    }

    async fn infer_inner<Req, Resp>(&self, request: &Req, response: &mut Resp) -> Result<()>
    where
        Req: ExtractInput + ?Sized,
        Resp: EmitOutput + ?Sized,
    {
        // Validation mutates nothing
        let mut spec = extractor::extract_processing_spec(request)?;
        extractor::validate_inputs(request, self.model.inputs())?;

        let _active = ActiveRequestGuard::new(&self.reporter);

        // Resolve the spec against the sequence map under the manager lock
        let mut manager_guard = self.manager.lock().await;
        manager_guard.process_spec(&mut spec)?;
        let sequence_id = spec.sequence_id;

        // Hand-off: take the sequence's memory lock and clear its idle flag
        // while still under the manager lock, then let the manager go so
        // unrelated sequences can proceed
        let sequence = manager_guard.get_sequence(sequence_id).map_err(|_| {
            Error::Internal(format!(
                "sequence {sequence_id} vanished between spec processing and lookup"
            ))
        })?;
        let mut memory = sequence.memory().await;
        sequence.mark_active();
        drop(manager_guard);

        let started = Instant::now();
        let mut slot_guard = self.pool.acquire().await?;
        self.reporter
            .observe(Phase::WaitForSlot, started.elapsed(), slot_guard.id());
        let slot_id = slot_guard.id();

        let started = Instant::now();
        self.pre_inference(slot_guard.slot(), &memory, &spec, sequence_id)?;
        self.reporter
            .observe(Phase::Preprocess, started.elapsed(), slot_id);

        let started = Instant::now();
        serialization::deserialize_inputs(request, self.model.inputs(), slot_guard.slot())?;
        self.reporter
            .observe(Phase::Deserialize, started.elapsed(), slot_id);

        let started = Instant::now();
        slot_guard.slot().run()?;
        self.reporter
            .observe(Phase::Inference, started.elapsed(), slot_id);

        let started = Instant::now();
        serialization::serialize_outputs(slot_guard.slot_ref(), self.model.outputs(), response)?;
        self.reporter
            .observe(Phase::Serialize, started.elapsed(), slot_id);

        let started = Instant::now();
        self.post_inference(slot_guard.slot(), &mut memory, &spec)?;
        serialization::write_sequence_id(response, sequence_id);
        self.reporter
            .observe(Phase::Postprocess, started.elapsed(), slot_id);

        // Release the sequence before touching the manager again; the lock
        // ordering is manager before sequence, never the reverse
        drop(memory);
        if spec.control == ControlSignal::End {
            let mut manager = self.manager.lock().await;
            manager.remove_sequence(sequence_id)?;
        }

        Ok(())
    }

    /// Prime the slot's state: reset on START, otherwise restore the saved
    /// value of every state slot the handle exposes.
    fn pre_inference(
        &self,
        slot: &mut dyn InferSlot,
        memory: &MemoryStateMap,
        spec: &ProcessingSpec,
        sequence_id: u64,
    ) -> Result<()> {
        if spec.control == ControlSignal::Start {
            for name in slot.state_names() {
                slot.reset_state(&name)?;
            }
            return Ok(());
        }
        for name in slot.state_names() {
            let saved = memory.get(&name).ok_or_else(|| {
                Error::Internal(format!(
                    "state slot {name} has no saved value for sequence {sequence_id}; \
                     the model's state layout changed under a live sequence"
                ))
            })?;
            slot.write_state(&name, saved.clone())?;
        }
        Ok(())
    }

    /// Capture the slot's state back into the sequence, or scrub the slot on
    /// END so the next request starts from a clean handle.
    fn post_inference(
        &self,
        slot: &mut dyn InferSlot,
        memory: &mut MemoryStateMap,
        spec: &ProcessingSpec,
    ) -> Result<()> {
        if spec.control == ControlSignal::End {
            debug!(
                "Received END signal for model {} version {}, resetting slot state",
                self.config.name, self.config.version
            );
            for name in slot.state_names() {
                slot.reset_state(&name)?;
            }
            return Ok(());
        }
        let names = slot.state_names();
        let mut fresh = MemoryStateMap::with_capacity(names.len());
        for name in names {
            let value = slot.read_state(&name)?;
            fresh.insert(name, value);
        }
        *memory = fresh;
        Ok(())
    }
}
