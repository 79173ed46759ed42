//! 中继 JSON-RPC 信封

use ethers::types::H256;
use serde::{Deserialize, Serialize};

use crate::types::RelayError;

/// JSON-RPC 请求，参数按引用序列化
#[derive(Debug, Serialize)]
pub struct RelayRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: &'a [P],
}

impl<'a, P: Serialize> RelayRequest<'a, P> {
    pub fn new(id: u64, method: &'static str, params: &'a [P]) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 响应，`result` 与 `error` 二选一
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RelayResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RelayRpcError>,
}

#[derive(Debug, Deserialize)]
struct RelayRpcError {
    code: i64,
    message: String,
}

impl<T> RelayResponse<T> {
    pub fn into_result(self) -> Result<T, RelayError> {
        if let Some(error) = self.error {
            return Err(RelayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result.ok_or(RelayError::EmptyResult)
    }
}

/// `eth_sendBundle` 的返回值
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleResult {
    pub bundle_hash: H256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_result() {
        let text = r#"{"jsonrpc":"2.0","id":1,"result":{"bundleHash":"0x1111111111111111111111111111111111111111111111111111111111111111"}}"#;
        let response: RelayResponse<SendBundleResult> = serde_json::from_str(text).unwrap();
        assert_eq!(response.into_result().unwrap().bundle_hash, H256::repeat_byte(0x11));
    }

    #[test]
    fn test_response_with_error() {
        let text = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid bundle"}}"#;
        let response: RelayResponse<SendBundleResult> = serde_json::from_str(text).unwrap();
        assert!(matches!(
            response.into_result(),
            Err(RelayError::Rpc { code: -32602, .. })
        ));
    }

    #[test]
    fn test_response_without_result() {
        let response: RelayResponse<SendBundleResult> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(matches!(response.into_result(), Err(RelayError::EmptyResult)));
    }
}
