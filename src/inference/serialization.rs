//! Moving tensors between request envelopes, execution slots, and responses.

use crate::api::{EmitOutput, ExtractInput};
use crate::error::{Error, Result};
use crate::runtime::InferSlot;
use crate::tensor::{TensorData, TensorSpec};

use super::extractor::{SEQUENCE_ID_INPUT, SPECIAL_INPUT_NAMES};

/// Stage every declared (non-reserved) input from the request into the slot.
pub fn deserialize_inputs<R: ExtractInput + ?Sized>(
    request: &R,
    declared: &[TensorSpec],
    slot: &mut dyn InferSlot,
) -> Result<()> {
    for spec in declared {
        if SPECIAL_INPUT_NAMES.contains(&spec.name.as_str()) {
            continue;
        }
        let tensor = request
            .input_tensor(&spec.name)
            .ok_or_else(|| Error::MissingInput {
                name: spec.name.clone(),
            })?;
        slot.set_input(&spec.name, tensor.clone())?;
    }
    Ok(())
}

/// Copy every declared output from the slot into the response.
pub fn serialize_outputs<R: EmitOutput + ?Sized>(
    slot: &dyn InferSlot,
    declared: &[TensorSpec],
    response: &mut R,
) -> Result<()> {
    for spec in declared {
        let tensor = slot.output(&spec.name)?;
        response.add_output(&spec.name, tensor);
    }
    Ok(())
}

/// Append the resolved sequence id as a (1) UINT64 output.
pub fn write_sequence_id<R: EmitOutput + ?Sized>(response: &mut R, sequence_id: u64) {
    response.add_output(SEQUENCE_ID_INPUT, TensorData::from_u64s(&[sequence_id]));
}
