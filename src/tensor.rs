//! Opaque tensor payloads exchanged with the inference runtime.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a tensor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    U8,
    U32,
    U64,
    I64,
    F32,
}

impl Precision {
    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Precision::U8 => 1,
            Precision::U32 | Precision::F32 => 4,
            Precision::U64 | Precision::I64 => 8,
        }
    }

    /// Wire name used by the REST surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::U8 => "UINT8",
            Precision::U32 => "UINT32",
            Precision::U64 => "UINT64",
            Precision::I64 => "INT64",
            Precision::F32 => "FP32",
        }
    }

    /// Parse a wire name from the REST surface.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UINT8" => Some(Precision::U8),
            "UINT32" => Some(Precision::U32),
            "UINT64" => Some(Precision::U64),
            "INT64" => Some(Precision::I64),
            "FP32" => Some(Precision::F32),
            _ => None,
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tensor payload: element type, optional shape, and raw little-endian data.
///
/// `shape == None` models an envelope that carried no shape information at
/// all, which is distinct from an empty or mismatched shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    precision: Precision,
    shape: Option<Vec<i64>>,
    data: Bytes,
}

impl TensorData {
    pub fn new(precision: Precision, shape: Option<Vec<i64>>, data: Bytes) -> Self {
        Self {
            precision,
            shape,
            data,
        }
    }

    pub fn from_u32s(values: &[u32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(
            Precision::U32,
            Some(vec![values.len() as i64]),
            Bytes::from(data),
        )
    }

    pub fn from_u64s(values: &[u64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(
            Precision::U64,
            Some(vec![values.len() as i64]),
            Bytes::from(data),
        )
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(
            Precision::F32,
            Some(vec![values.len() as i64]),
            Bytes::from(data),
        )
    }

    /// Replace the shape, keeping precision and payload.
    pub fn with_shape(mut self, shape: Vec<i64>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Drop the shape information entirely.
    pub fn without_shape(mut self) -> Self {
        self.shape = None;
        self
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn shape(&self) -> Option<&[i64]> {
        self.shape.as_deref()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of elements held in the payload.
    pub fn element_count(&self) -> usize {
        self.data.len() / self.precision.element_size()
    }

    /// Read the payload as a single u64 scalar, if it is exactly that.
    pub fn scalar_u64(&self) -> Option<u64> {
        if self.precision != Precision::U64 || self.data.len() != 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data);
        Some(u64::from_le_bytes(buf))
    }

    /// Read the payload as a single u32 scalar, if it is exactly that.
    pub fn scalar_u32(&self) -> Option<u32> {
        if self.precision != Precision::U32 || self.data.len() != 4 {
            return None;
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data);
        Some(u32::from_le_bytes(buf))
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        if self.precision != Precision::F32 {
            return Err(Error::Internal(format!(
                "expected FP32 payload, got {}",
                self.precision
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn to_u64_vec(&self) -> Result<Vec<u64>> {
        if self.precision != Precision::U64 {
            return Err(Error::Internal(format!(
                "expected UINT64 payload, got {}",
                self.precision
            )));
        }
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(c);
                u64::from_le_bytes(buf)
            })
            .collect())
    }
}

/// Declared name, element type, and shape of one model input or output.
///
/// A negative dimension is dynamic and matches any size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub precision: Precision,
    pub shape: Vec<i64>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, precision: Precision, shape: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            precision,
            shape,
        }
    }

    /// Whether a concrete tensor shape satisfies this declaration.
    pub fn matches_shape(&self, shape: &[i64]) -> bool {
        if shape.len() != self.shape.len() {
            return false;
        }
        self.shape
            .iter()
            .zip(shape)
            .all(|(declared, got)| *declared < 0 || declared == got)
    }
}
