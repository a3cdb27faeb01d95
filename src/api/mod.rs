//! Request and response envelopes for the two supported surfaces.
//!
//! The pipeline never depends on a concrete envelope shape. It only needs the
//! ability to look up an input tensor by name and to append an output tensor
//! by name, so both capabilities are traits and each surface provides its own
//! implementation.

pub mod predict;
pub mod rest;

use crate::tensor::TensorData;

pub use predict::{ModelSpec, PredictRequest, PredictResponse};
pub use rest::{RestPredictRequest, RestPredictResponse};

/// Capability to extract a named input tensor from a request envelope.
pub trait ExtractInput {
    /// Look up one input tensor by name.
    fn input_tensor(&self, name: &str) -> Option<&TensorData>;

    /// Names of all inputs present in the envelope.
    fn input_names(&self) -> Vec<&str>;
}

/// Capability to append a named output tensor to a response envelope.
pub trait EmitOutput {
    fn add_output(&mut self, name: &str, tensor: TensorData);
}
