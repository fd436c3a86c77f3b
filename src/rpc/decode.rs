//! Typed request/response shapes for provider-specific JSON-RPC methods
//!
//! Each method gets an explicit response type; numeric fields are decoded
//! here rather than by post-processing a generic response.

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{SmartTxError, SmartTxResult};

pub const GET_PRIORITY_FEE_ESTIMATE: &str = "getPriorityFeeEstimate";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl<T> JsonRpcResponse<T> {
    /// Collapse the envelope into the method result
    ///
    /// `on_error` picks the variant for an error envelope, so each method
    /// reports failures in its own part of the taxonomy.
    pub fn into_result(
        self,
        method: &str,
        on_error: impl FnOnce(String) -> SmartTxError,
    ) -> SmartTxResult<T> {
        if let Some(err) = self.error {
            return Err(on_error(format!(
                "{} failed (code {}): {}",
                method, err.code, err.message
            )));
        }
        self.result
            .ok_or_else(|| SmartTxError::decode(method, "response has neither result nor error"))
    }
}

/// Params for `getPriorityFeeEstimate` with `recommended: true`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFeeEstimateParams {
    pub account_keys: Vec<String>,
    pub options: PriorityFeeOptions,
}

#[derive(Debug, Serialize)]
pub struct PriorityFeeOptions {
    pub recommended: bool,
}

impl PriorityFeeEstimateParams {
    pub fn recommended(account_keys: Vec<String>) -> Self {
        Self {
            account_keys,
            options: PriorityFeeOptions { recommended: true },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFeeEstimateResponse {
    #[serde(deserialize_with = "deserialize_micro_lamports")]
    pub priority_fee_estimate: u64,
}

/// Accepts integer or fractional JSON numbers; fractions round up so the
/// estimate never underpays.
fn deserialize_micro_lamports<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(v) = value.as_u64() {
        return Ok(v);
    }
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 && v <= u64::MAX as f64 => Ok(v.ceil() as u64),
        _ => Err(serde::de::Error::custom(format!(
            "priority fee estimate out of range: {}",
            value
        ))),
    }
}

/// Decode a raw `getPriorityFeeEstimate` response body
pub fn decode_priority_fee_estimate(body: &[u8]) -> SmartTxResult<u64> {
    let response: JsonRpcResponse<PriorityFeeEstimateResponse> = serde_json::from_slice(body)
        .map_err(|e| SmartTxError::decode(GET_PRIORITY_FEE_ESTIMATE, e.to_string()))?;
    Ok(response
        .into_result(GET_PRIORITY_FEE_ESTIMATE, SmartTxError::FeeEstimation)?
        .priority_fee_estimate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let req = JsonRpcRequest::new(
            GET_PRIORITY_FEE_ESTIMATE,
            [PriorityFeeEstimateParams::recommended(vec!["abc".into()])],
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["method"], "getPriorityFeeEstimate");
        assert_eq!(json["params"][0]["accountKeys"][0], "abc");
        assert_eq!(json["params"][0]["options"]["recommended"], true);
    }

    #[test]
    fn test_decode_integer_and_float() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"priorityFeeEstimate":12000}}"#;
        assert_eq!(decode_priority_fee_estimate(body).unwrap(), 12_000);

        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"priorityFeeEstimate":12000.2}}"#;
        assert_eq!(decode_priority_fee_estimate(body).unwrap(), 12_001);
    }

    #[test]
    fn test_decode_rejects_negative() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"priorityFeeEstimate":-5}}"#;
        assert!(matches!(
            decode_priority_fee_estimate(body),
            Err(SmartTxError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_rpc_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"invalid api key"}}"#;
        let err = decode_priority_fee_estimate(body).unwrap_err();
        match &err {
            SmartTxError::FeeEstimation(msg) => assert!(msg.contains("invalid api key")),
            other => panic!("Expected FeeEstimation error, got {:?}", other),
        }
        assert!(err.is_build_failure());
        assert_eq!(err.category(), "fee");
    }
}
