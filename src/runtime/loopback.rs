//! Deterministic reference runtime used by the server binary and tests.
//!
//! A loopback model declares one `data` input and one `sum` output, both
//! FP32 of shape `(1, width)`. Every inference step adds the staged input
//! elementwise into each state slot and emits the updated first slot as the
//! output, so the effect of a sequence of requests is observable and exactly
//! reproducible.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tensor::{Precision, TensorData, TensorSpec};

use super::{CompiledModel, InferSlot};

pub const DATA_INPUT: &str = "data";
pub const SUM_OUTPUT: &str = "sum";

/// A compiled loopback model.
pub struct LoopbackModel {
    width: usize,
    state_slots: Vec<String>,
    transformed: bool,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl LoopbackModel {
    pub fn new(width: usize, state_slots: &[&str], low_latency_transformation: bool) -> Self {
        Self {
            width,
            state_slots: state_slots.iter().map(|s| s.to_string()).collect(),
            transformed: low_latency_transformation,
            inputs: vec![TensorSpec::new(
                DATA_INPUT,
                Precision::F32,
                vec![1, width as i64],
            )],
            outputs: vec![TensorSpec::new(
                SUM_OUTPUT,
                Precision::F32,
                vec![1, width as i64],
            )],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl CompiledModel for LoopbackModel {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn state_names(&self) -> Vec<String> {
        if self.transformed {
            self.state_slots.clone()
        } else {
            Vec::new()
        }
    }

    fn recommended_slot_count(&self) -> usize {
        4
    }

    fn create_slot(&self) -> Result<Box<dyn InferSlot>> {
        Ok(Box::new(LoopbackSlot {
            width: self.width,
            states: self
                .state_names()
                .into_iter()
                .map(|name| (name, vec![0.0; self.width]))
                .collect(),
            state_order: self.state_names(),
            staged: HashMap::new(),
            output: None,
        }))
    }
}

struct LoopbackSlot {
    width: usize,
    states: HashMap<String, Vec<f32>>,
    state_order: Vec<String>,
    staged: HashMap<String, TensorData>,
    output: Option<Vec<f32>>,
}

impl LoopbackSlot {
    fn state_mut(&mut self, name: &str) -> Result<&mut Vec<f32>> {
        self.states
            .get_mut(name)
            .ok_or_else(|| Error::Internal(format!("unknown state slot {name}")))
    }
}

impl InferSlot for LoopbackSlot {
    fn state_names(&self) -> Vec<String> {
        self.state_order.clone()
    }

    fn read_state(&self, name: &str) -> Result<TensorData> {
        let values = self
            .states
            .get(name)
            .ok_or_else(|| Error::Internal(format!("unknown state slot {name}")))?;
        Ok(TensorData::from_f32s(values).with_shape(vec![1, self.width as i64]))
    }

    fn write_state(&mut self, name: &str, value: TensorData) -> Result<()> {
        let incoming = value.to_f32_vec()?;
        let width = self.width;
        if incoming.len() != width {
            return Err(Error::Internal(format!(
                "state slot {name} expects {width} elements, got {}",
                incoming.len()
            )));
        }
        *self.state_mut(name)? = incoming;
        Ok(())
    }

    fn reset_state(&mut self, name: &str) -> Result<()> {
        self.state_mut(name)?.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }

    fn set_input(&mut self, name: &str, value: TensorData) -> Result<()> {
        if name != DATA_INPUT {
            return Err(Error::UnexpectedInput {
                name: name.to_string(),
            });
        }
        self.staged.insert(name.to_string(), value);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let data = self
            .staged
            .remove(DATA_INPUT)
            .ok_or_else(|| Error::Internal("data input was not staged".to_string()))?
            .to_f32_vec()?;
        if data.len() != self.width {
            return Err(Error::Internal(format!(
                "data input expects {} elements, got {}",
                self.width,
                data.len()
            )));
        }

        for name in &self.state_order {
            let state = self
                .states
                .get_mut(name)
                .ok_or_else(|| Error::Internal(format!("unknown state slot {name}")))?;
            for (s, d) in state.iter_mut().zip(&data) {
                *s += d;
            }
        }

        // Stateless models simply echo the input
        self.output = Some(match self.state_order.first() {
            Some(first) => self.states[first].clone(),
            None => data,
        });
        Ok(())
    }

    fn output(&self, name: &str) -> Result<TensorData> {
        if name != SUM_OUTPUT {
            return Err(Error::Internal(format!("unknown output {name}")));
        }
        let values = self
            .output
            .as_ref()
            .ok_or_else(|| Error::Internal("no inference step has run".to_string()))?;
        Ok(TensorData::from_f32s(values).with_shape(vec![1, self.width as i64]))
    }
}
