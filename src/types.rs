//! Common types used throughout pagestream

use std::collections::HashMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Sentinels
// ============================================================================

/// Generic error payload surfaced when a request cannot produce a usable
/// response body: retries exhausted, or an error body that is itself
/// undecodable. Callers should treat it as "give up", not parse it.
pub fn internal_error_payload() -> JsonValue {
    serde_json::json!(["Internal Error"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_payload_shape() {
        let payload = internal_error_payload();
        assert_eq!(payload, serde_json::json!(["Internal Error"]));
    }
}
