//! Stateful inference serving: sequence-scoped hidden state over a pooled
//! inference runtime.
//!
//! The pipeline receives a predict request for a stateful model, resolves the
//! conversational sequence it belongs to, swaps the sequence's saved hidden
//! state into a pooled execution slot, runs one inference step, captures the
//! updated state back, and answers with the resolved sequence id.

pub mod api;
pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod runtime;
pub mod sequence;
pub mod server;
pub mod tensor;

// Re-export commonly used types
pub use api::{EmitOutput, ExtractInput, PredictRequest, PredictResponse};
pub use config::{ServerConfig, StatefulModelConfig};
pub use error::{Error, Result};
pub use inference::{StatefulModelInstance, SEQUENCE_CONTROL_INPUT, SEQUENCE_ID_INPUT};
pub use sequence::{ControlSignal, ProcessingSpec, SequenceId, SequenceManager, SequenceReaper};
pub use tensor::{Precision, TensorData, TensorSpec};
