//! Error types for the stateful inference pipeline.
//!
//! Every variant maps to a stable wire code via [`Error::code`] so that both
//! request surfaces report identical codes for the same failure.

use thiserror::Error;

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for pipeline operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A reserved control input arrived without tensor shape information
    #[error("special input {input} does not contain tensor shape information")]
    SpecialInputNoTensorShape { input: &'static str },

    /// A reserved control input has the wrong rank
    #[error("special input {input} requires shape (1), got {dims} dimensions")]
    InvalidShapeDimensionCount { input: &'static str, dims: usize },

    /// An input shape does not match what the model expects
    #[error("input {input} has invalid shape")]
    InvalidShape { input: String },

    /// The sequence_id tensor does not hold a single unsigned 64-bit value
    #[error("sequence_id does not hold a single unsigned 64-bit value")]
    SequenceIdBadType,

    /// The sequence_control_input tensor does not hold a single unsigned 32-bit value
    #[error("sequence_control_input does not hold a single unsigned 32-bit value")]
    SequenceControlInputBadType,

    /// The control scalar is not one of the recognized values
    #[error("unrecognized sequence control input value {value}")]
    InvalidSequenceControlInput { value: u32 },

    /// The request requires a sequence id but carried none
    #[error("sequence id has not been provided")]
    SequenceIdNotProvided,

    /// The referenced sequence does not exist
    #[error("sequence with id {sequence_id} does not exist")]
    SequenceMissing { sequence_id: u64 },

    /// A START request referenced an id that is already live
    #[error("sequence with id {sequence_id} already exists")]
    SequenceAlreadyExists { sequence_id: u64 },

    /// Creating another sequence would exceed the configured bound
    #[error("max sequence number {limit} has been reached")]
    MaxSequencesReached { limit: u32 },

    /// A declared model input is absent from the request
    #[error("required input {name} is missing")]
    MissingInput { name: String },

    /// The request carries an input the model does not declare
    #[error("unexpected input {name}")]
    UnexpectedInput { name: String },

    /// An input payload has the wrong element type
    #[error("input {name} has invalid precision, expected {expected}")]
    InvalidPrecision { name: String, expected: &'static str },

    /// The requested model is not loaded
    #[error("model {name} is not available")]
    ModelMissing { name: String },

    /// Unrecoverable server-side failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire code, identical across both request surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Error::SpecialInputNoTensorShape { .. } => "SPECIAL_INPUT_NO_TENSOR_SHAPE",
            Error::InvalidShapeDimensionCount { .. } => "INVALID_NO_OF_SHAPE_DIMENSIONS",
            Error::InvalidShape { .. } => "INVALID_SHAPE",
            Error::SequenceIdBadType => "SEQUENCE_ID_BAD_TYPE",
            Error::SequenceControlInputBadType => "SEQUENCE_CONTROL_INPUT_BAD_TYPE",
            Error::InvalidSequenceControlInput { .. } => "INVALID_SEQUENCE_CONTROL_INPUT",
            Error::SequenceIdNotProvided => "SEQUENCE_ID_NOT_PROVIDED",
            Error::SequenceMissing { .. } => "SEQUENCE_MISSING",
            Error::SequenceAlreadyExists { .. } => "SEQUENCE_ALREADY_EXISTS",
            Error::MaxSequencesReached { .. } => "MAX_SEQUENCES_REACHED",
            Error::MissingInput { .. } => "INVALID_MISSING_INPUT",
            Error::UnexpectedInput { .. } => "INVALID_UNEXPECTED_INPUT",
            Error::InvalidPrecision { .. } => "INVALID_PRECISION",
            Error::ModelMissing { .. } => "MODEL_MISSING",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            Error::SequenceMissing { sequence_id: 7 }.code(),
            "SEQUENCE_MISSING"
        );
        assert_eq!(
            Error::MaxSequencesReached { limit: 2 }.code(),
            "MAX_SEQUENCES_REACHED"
        );
        assert_eq!(Error::Internal("x".into()).code(), "INTERNAL_ERROR");
    }
}
