//! Map-keyed predict envelope used by the in-process RPC surface.

use std::collections::HashMap;

use crate::tensor::TensorData;

use super::{EmitOutput, ExtractInput};

/// Which model and version a request addresses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// None selects the single loaded version
    pub version: Option<u64>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// Predict request keyed by input name.
#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    pub model_spec: ModelSpec,
    pub inputs: HashMap<String, TensorData>,
}

impl PredictRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_spec: ModelSpec::new(model_name),
            inputs: HashMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, tensor: TensorData) -> Self {
        self.inputs.insert(name.into(), tensor);
        self
    }
}

impl ExtractInput for PredictRequest {
    fn input_tensor(&self, name: &str) -> Option<&TensorData> {
        self.inputs.get(name)
    }

    fn input_names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }
}

/// Predict response keyed by output name.
#[derive(Debug, Clone, Default)]
pub struct PredictResponse {
    pub model_spec: ModelSpec,
    pub outputs: HashMap<String, TensorData>,
}

impl PredictResponse {
    pub fn new(model_name: impl Into<String>, version: u64) -> Self {
        Self {
            model_spec: ModelSpec {
                name: model_name.into(),
                version: Some(version),
            },
            outputs: HashMap::new(),
        }
    }

    pub fn output(&self, name: &str) -> Option<&TensorData> {
        self.outputs.get(name)
    }
}

impl EmitOutput for PredictResponse {
    fn add_output(&mut self, name: &str, tensor: TensorData) {
        self.outputs.insert(name.to_string(), tensor);
    }
}
