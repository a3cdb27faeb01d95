//! Extraction and validation of the reserved control inputs.

use crate::api::ExtractInput;
use crate::error::{Error, Result};
use crate::sequence::{ControlSignal, ProcessingSpec, CONTROL_CONTINUE};
use crate::tensor::{TensorData, TensorSpec};

/// Reserved input carrying the sequence id.
pub const SEQUENCE_ID_INPUT: &str = "sequence_id";
/// Reserved input carrying the control signal.
pub const SEQUENCE_CONTROL_INPUT: &str = "sequence_control_input";

/// Input names excluded from generic validation.
pub const SPECIAL_INPUT_NAMES: [&str; 2] = [SEQUENCE_ID_INPUT, SEQUENCE_CONTROL_INPUT];

fn is_special(name: &str) -> bool {
    SPECIAL_INPUT_NAMES.contains(&name)
}

/// Required shape for both reserved inputs is (1).
fn check_special_shape(tensor: &TensorData, input: &'static str) -> Result<()> {
    let shape = tensor
        .shape()
        .ok_or(Error::SpecialInputNoTensorShape { input })?;
    if shape.len() != 1 {
        return Err(Error::InvalidShapeDimensionCount {
            input,
            dims: shape.len(),
        });
    }
    if shape[0] != 1 {
        return Err(Error::InvalidShape {
            input: input.to_string(),
        });
    }
    Ok(())
}

fn extract_sequence_id(tensor: &TensorData) -> Result<u64> {
    check_special_shape(tensor, SEQUENCE_ID_INPUT)?;
    tensor.scalar_u64().ok_or(Error::SequenceIdBadType)
}

fn extract_control_input(tensor: &TensorData) -> Result<u32> {
    check_special_shape(tensor, SEQUENCE_CONTROL_INPUT)?;
    tensor
        .scalar_u32()
        .ok_or(Error::SequenceControlInputBadType)
}

/// Parse the two reserved inputs into a validated [`ProcessingSpec`].
///
/// A missing `sequence_id` means 0; a missing `sequence_control_input` means
/// CONTINUE. After extraction the cross-field rule applies: CONTINUE and END
/// require a non-zero id.
pub fn extract_processing_spec<R: ExtractInput + ?Sized>(request: &R) -> Result<ProcessingSpec> {
    let mut sequence_id = 0u64;
    let mut control_raw = CONTROL_CONTINUE;

    if let Some(tensor) = request.input_tensor(SEQUENCE_ID_INPUT) {
        sequence_id = extract_sequence_id(tensor)?;
    }
    if let Some(tensor) = request.input_tensor(SEQUENCE_CONTROL_INPUT) {
        control_raw = extract_control_input(tensor)?;
    }

    let control = ControlSignal::from_wire(control_raw)?;
    if matches!(control, ControlSignal::Continue | ControlSignal::End) && sequence_id == 0 {
        return Err(Error::SequenceIdNotProvided);
    }

    Ok(ProcessingSpec::new(control, sequence_id))
}

/// Validate the non-reserved inputs against the model's declared input set.
pub fn validate_inputs<R: ExtractInput + ?Sized>(
    request: &R,
    declared: &[TensorSpec],
) -> Result<()> {
    for spec in declared {
        if is_special(&spec.name) {
            continue;
        }
        let tensor = request
            .input_tensor(&spec.name)
            .ok_or_else(|| Error::MissingInput {
                name: spec.name.clone(),
            })?;
        if tensor.precision() != spec.precision {
            return Err(Error::InvalidPrecision {
                name: spec.name.clone(),
                expected: spec.precision.as_str(),
            });
        }
        let shape = tensor.shape().ok_or_else(|| Error::InvalidShape {
            input: spec.name.clone(),
        })?;
        if !spec.matches_shape(shape) {
            return Err(Error::InvalidShape {
                input: spec.name.clone(),
            });
        }
    }

    for name in request.input_names() {
        if is_special(name) {
            continue;
        }
        if !declared.iter().any(|spec| spec.name == name) {
            return Err(Error::UnexpectedInput {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
