//! Response envelope for the web API.

use serde::{Deserialize, Serialize};

/// API response wrapper for consistent JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (present when success=true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present when success=false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::TickPayload;

    #[test]
    fn ok_wraps_payload() {
        let response = ApiResponse::ok(TickPayload::new(12, false));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["time"], 12);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn err_omits_data() {
        let response = ApiResponse::<TickPayload>::err("simulation task stopped");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"simulation task stopped"}"#);

        let back: ApiResponse<TickPayload> = serde_json::from_str(&json).unwrap();
        assert!(!back.success);
        assert!(back.data.is_none());
    }
}
