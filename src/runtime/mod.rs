//! Abstraction over the native inference runtime.
//!
//! The pipeline treats the runtime as an external collaborator: a compiled
//! model hands out execution slots, and each slot exposes queryable state,
//! per-slot inputs and outputs, and a synchronous inference step.

pub mod loopback;

pub use loopback::LoopbackModel;

use crate::error::Result;
use crate::tensor::{TensorData, TensorSpec};

/// One compiled model version loaded into the runtime.
pub trait CompiledModel: Send + Sync {
    /// Declared (non-special) inputs.
    fn inputs(&self) -> &[TensorSpec];

    /// Declared outputs.
    fn outputs(&self) -> &[TensorSpec];

    /// Names of the state slots the runtime exposes for this model.
    ///
    /// Empty unless the model was loaded with the low-latency transform.
    fn state_names(&self) -> Vec<String>;

    /// Execution slot count the runtime recommends for this model.
    fn recommended_slot_count(&self) -> usize;

    /// Create one execution slot against this compiled model.
    fn create_slot(&self) -> Result<Box<dyn InferSlot>>;
}

/// One execution slot on a compiled model.
///
/// A slot owns live memory-state buffers while a request runs. Slots are
/// never shared; exclusivity is enforced by the pool.
pub trait InferSlot: Send {
    /// State slot names exposed by this slot, in a stable order.
    fn state_names(&self) -> Vec<String>;

    /// Read the current value of one state slot.
    fn read_state(&self, name: &str) -> Result<TensorData>;

    /// Overwrite one state slot with a previously saved value.
    fn write_state(&mut self, name: &str, value: TensorData) -> Result<()>;

    /// Reset one state slot to the model's default.
    fn reset_state(&mut self, name: &str) -> Result<()>;

    /// Stage one input tensor for the next inference step.
    fn set_input(&mut self, name: &str, value: TensorData) -> Result<()>;

    /// Run one inference step synchronously.
    fn run(&mut self) -> Result<()>;

    /// Read one output tensor produced by the last step.
    fn output(&self, name: &str) -> Result<TensorData>;
}
