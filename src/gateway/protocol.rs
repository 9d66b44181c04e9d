// Obscura — JSON-RPC 2.0 Protocol Types
//
// Request/response envelopes for the socket gateway, plus the mapping from
// vault error kinds to JSON-RPC error codes. Application errors carry the
// kind name in `error.data.code` so clients never parse messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::vault::VaultError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes
pub const UNAUTHORIZED: i32 = -32001;
pub const NOT_FOUND: i32 = -32002;
pub const CONFLICT: i32 = -32003;

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Create a parse error response (id is null because we couldn't parse it).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// Encode a vault failure. Storage details stay in the server log.
    pub fn from_vault_error(id: Value, err: &VaultError) -> Self {
        let (code, message) = match err {
            VaultError::Unauthorized => (UNAUTHORIZED, "Unauthorized".to_string()),
            VaultError::NotFound(what) => (NOT_FOUND, format!("Not found: {}", what)),
            VaultError::Conflict(what) => (CONFLICT, format!("Conflict: {}", what)),
            VaultError::InvalidInput(what) => (INVALID_PARAMS, format!("Invalid params: {}", what)),
            VaultError::StorageFailure(_) => (INTERNAL_ERROR, "Storage failure".to_string()),
        };

        let mut response = Self::error(id, code, message);
        if let Some(error) = response.error.as_mut() {
            error.data = Some(json!({ "code": err.code() }));
        }
        response
    }
}

impl JsonRpcRequest {
    /// Validate that this is a proper JSON-RPC 2.0 request.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let json = r#"{"jsonrpc":"2.0","method":"keys.list","params":{"credentials":"a:b"},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "keys.list");
        assert_eq!(req.params["credentials"], "a:b");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_parse_request_without_params() {
        let json = r#"{"jsonrpc":"2.0","method":"users.check","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_invalid_jsonrpc_version() {
        let json = r#"{"jsonrpc":"1.0","method":"keys.list","params":{},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_success_response_serialization() {
        let resp = JsonRpcResponse::success(
            Value::Number(1.into()),
            json!({"deleted": true}),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = JsonRpcResponse::error(
            Value::Number(1.into()),
            METHOD_NOT_FOUND,
            "Method not found",
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"error\""));
        assert!(json.contains("-32601"));
    }

    #[test]
    fn test_empty_method_is_invalid() {
        let json = r#"{"jsonrpc":"2.0","method":"","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_vault_errors_map_to_codes() {
        let cases = [
            (VaultError::Unauthorized, UNAUTHORIZED, "UNAUTHORIZED"),
            (VaultError::NotFound("r1".into()), NOT_FOUND, "NOT_FOUND"),
            (VaultError::Conflict("addr".into()), CONFLICT, "CONFLICT"),
            (VaultError::InvalidInput("id".into()), INVALID_PARAMS, "INVALID_INPUT"),
            (VaultError::StorageFailure("disk".into()), INTERNAL_ERROR, "STORAGE_FAILURE"),
        ];

        for (err, code, kind) in cases {
            let resp = JsonRpcResponse::from_vault_error(json!(7), &err);
            let error = resp.error.unwrap();
            assert_eq!(error.code, code);
            assert_eq!(error.data.unwrap()["code"], kind);
            assert_eq!(resp.id, json!(7));
        }
    }

    #[test]
    fn test_storage_failure_hides_detail() {
        let err = VaultError::StorageFailure("database is locked at /secret/path".into());
        let resp = JsonRpcResponse::from_vault_error(json!(1), &err);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("/secret/path"));
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
    }
}
