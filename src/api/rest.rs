//! List-keyed JSON predict envelope used by the REST surface.

use bytes::Bytes;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tensor::{Precision, TensorData};

use super::{EmitOutput, ExtractInput};

/// One named tensor as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RestTensorJson {
    pub name: String,
    #[serde(default)]
    pub shape: Option<Vec<i64>>,
    pub datatype: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// Raw JSON request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RestRequestJson {
    #[serde(default)]
    pub inputs: Vec<RestTensorJson>,
}

/// Parsed REST request holding decoded tensor payloads in wire order.
#[derive(Debug, Clone, Default)]
pub struct RestPredictRequest {
    inputs: Vec<(String, TensorData)>,
}

impl RestPredictRequest {
    pub fn parse(body: RestRequestJson) -> Result<Self> {
        let mut inputs = Vec::with_capacity(body.inputs.len());
        for tensor in body.inputs {
            let decoded = decode_tensor(&tensor)?;
            inputs.push((tensor.name, decoded));
        }
        Ok(Self { inputs })
    }

    pub fn push_input(&mut self, name: impl Into<String>, tensor: TensorData) {
        self.inputs.push((name.into(), tensor));
    }
}

impl ExtractInput for RestPredictRequest {
    fn input_tensor(&self, name: &str) -> Option<&TensorData> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|(n, _)| n.as_str()).collect()
    }
}

fn decode_tensor(tensor: &RestTensorJson) -> Result<TensorData> {
    let precision =
        Precision::parse(&tensor.datatype).ok_or_else(|| Error::InvalidPrecision {
            name: tensor.name.clone(),
            expected: "one of UINT8, UINT32, UINT64, INT64, FP32",
        })?;

    let mut data = Vec::with_capacity(tensor.data.len() * precision.element_size());
    for value in &tensor.data {
        append_element(&mut data, precision, value).ok_or_else(|| Error::InvalidPrecision {
            name: tensor.name.clone(),
            expected: precision.as_str(),
        })?;
    }

    Ok(TensorData::new(
        precision,
        tensor.shape.clone(),
        Bytes::from(data),
    ))
}

fn append_element(out: &mut Vec<u8>, precision: Precision, value: &serde_json::Value) -> Option<()> {
    match precision {
        Precision::U8 => out.push(u8::try_from(value.as_u64()?).ok()?),
        Precision::U32 => out.extend_from_slice(&u32::try_from(value.as_u64()?).ok()?.to_le_bytes()),
        Precision::U64 => out.extend_from_slice(&value.as_u64()?.to_le_bytes()),
        Precision::I64 => out.extend_from_slice(&value.as_i64()?.to_le_bytes()),
        Precision::F32 => out.extend_from_slice(&(value.as_f64()? as f32).to_le_bytes()),
    }
    Some(())
}

/// REST response accumulating named outputs in emission order.
#[derive(Debug, Clone)]
pub struct RestPredictResponse {
    model_name: String,
    model_version: u64,
    outputs: Vec<(String, TensorData)>,
}

impl RestPredictResponse {
    pub fn new(model_name: impl Into<String>, model_version: u64) -> Self {
        Self {
            model_name: model_name.into(),
            model_version,
            outputs: Vec::new(),
        }
    }

    pub fn output(&self, name: &str) -> Option<&TensorData> {
        self.outputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Render the response body as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        let outputs: Vec<serde_json::Value> = self
            .outputs
            .iter()
            .map(|(name, tensor)| {
                serde_json::json!({
                    "name": name,
                    "shape": tensor.shape(),
                    "datatype": tensor.precision().as_str(),
                    "data": render_elements(tensor),
                })
            })
            .collect();
        serde_json::json!({
            "model_name": self.model_name,
            "model_version": self.model_version,
            "outputs": outputs,
        })
    }
}

impl EmitOutput for RestPredictResponse {
    fn add_output(&mut self, name: &str, tensor: TensorData) {
        self.outputs.push((name.to_string(), tensor));
    }
}

fn render_elements(tensor: &TensorData) -> Vec<serde_json::Value> {
    let data = tensor.data();
    match tensor.precision() {
        Precision::U8 => data.iter().map(|b| serde_json::json!(b)).collect(),
        Precision::U32 => data
            .chunks_exact(4)
            .map(|c| serde_json::json!(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
        Precision::U64 => data
            .chunks_exact(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(c);
                serde_json::json!(u64::from_le_bytes(buf))
            })
            .collect(),
        Precision::I64 => data
            .chunks_exact(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(c);
                serde_json::json!(i64::from_le_bytes(buf))
            })
            .collect(),
        Precision::F32 => data
            .chunks_exact(4)
            .map(|c| serde_json::json!(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_tensors() {
        let body: RestRequestJson = serde_json::from_value(serde_json::json!({
            "inputs": [
                {"name": "sequence_id", "shape": [1], "datatype": "UINT64", "data": [42]},
                {"name": "data", "shape": [1, 3], "datatype": "FP32", "data": [1.0, 2.0, 3.0]}
            ]
        }))
        .unwrap();
        let request = RestPredictRequest::parse(body).unwrap();

        let id = request.input_tensor("sequence_id").unwrap();
        assert_eq!(id.scalar_u64(), Some(42));

        let data = request.input_tensor("data").unwrap();
        assert_eq!(data.shape(), Some(&[1i64, 3][..]));
        assert_eq!(data.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn missing_shape_is_preserved_as_absent() {
        let body: RestRequestJson = serde_json::from_value(serde_json::json!({
            "inputs": [{"name": "sequence_id", "datatype": "UINT64", "data": [1]}]
        }))
        .unwrap();
        let request = RestPredictRequest::parse(body).unwrap();
        assert!(request.input_tensor("sequence_id").unwrap().shape().is_none());
    }

    #[test]
    fn rejects_unknown_datatype() {
        let body: RestRequestJson = serde_json::from_value(serde_json::json!({
            "inputs": [{"name": "data", "datatype": "FP64", "data": [1.0]}]
        }))
        .unwrap();
        assert!(matches!(
            RestPredictRequest::parse(body),
            Err(Error::InvalidPrecision { .. })
        ));
    }

    #[test]
    fn response_renders_outputs() {
        let mut response = RestPredictResponse::new("m", 1);
        response.add_output("sequence_id", TensorData::from_u64s(&[9]));
        let json = response.to_json();
        assert_eq!(json["outputs"][0]["name"], "sequence_id");
        assert_eq!(json["outputs"][0]["data"][0], 9);
    }
}
