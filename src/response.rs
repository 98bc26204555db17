//! Unwrapping of the server's `exc` / `message` / `data` envelope
//!
//! Every endpoint answers with a JSON object. A non-empty `exc` means the
//! call failed on the server; otherwise the payload is taken from `message`,
//! then `data`. A body with none of the three is a successful empty answer.

use hyper::StatusCode;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Document;

/// Normalize a response body into its payload.
///
/// Returns `Ok(None)` when the envelope carries no payload field. The status
/// code is only used for diagnostics.
pub fn normalize(status: StatusCode, body: &[u8]) -> Result<Option<Value>> {
    let parsed: Value = serde_json::from_slice(body).map_err(|e| Error::MalformedResponse {
        status: status.as_u16(),
        reason: format!("body is not valid JSON ({})", e),
        body: String::from_utf8_lossy(body).to_string(),
    })?;

    let mut envelope = match parsed {
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedResponse {
                status: status.as_u16(),
                reason: "envelope is not a JSON object".to_string(),
                body: other.to_string(),
            })
        }
    };

    if let Some(exc) = envelope.get("exc") {
        if !is_empty(exc) {
            let message = match exc {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(Error::RemoteExecution(message));
        }
    }

    if let Some(message) = envelope.remove("message") {
        return Ok(Some(message));
    }

    Ok(envelope.remove("data"))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Coerce a payload into a record count
pub(crate) fn into_count(status: StatusCode, payload: Option<Value>) -> Result<u64> {
    let count = match &payload {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                // `u64::MAX as f64` rounds up to 2^64, the first value out of range
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    count.ok_or_else(|| Error::MalformedResponse {
        status: status.as_u16(),
        reason: "expected a non-negative integer count".to_string(),
        body: payload.map(|v| v.to_string()).unwrap_or_default(),
    })
}

/// Coerce a payload into a list of documents; an empty payload is an empty list
pub(crate) fn into_documents(status: StatusCode, payload: Option<Value>) -> Result<Vec<Document>> {
    let malformed = |reason: &str, body: String| Error::MalformedResponse {
        status: status.as_u16(),
        reason: reason.to_string(),
        body,
    };

    match payload {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                Document::try_from(item)
                    .map_err(|other| malformed("expected a list of documents", other.to_string()))
            })
            .collect(),
        Some(other) => Err(malformed("expected a list of documents", other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> Result<Option<Value>> {
        normalize(StatusCode::OK, body.as_bytes())
    }

    #[test]
    fn test_message_wins_over_data() {
        let result = ok(r#"{"message": {"a": 1}, "data": [1, 2]}"#).unwrap();
        assert_eq!(result, Some(json!({"a": 1})));
    }

    #[test]
    fn test_data_when_no_message() {
        let result = ok(r#"{"data": [{"name": "T-1"}]}"#).unwrap();
        assert_eq!(result, Some(json!([{"name": "T-1"}])));
    }

    #[test]
    fn test_null_message_is_still_the_result() {
        let result = ok(r#"{"message": null, "data": 5}"#).unwrap();
        assert_eq!(result, Some(Value::Null));
    }

    #[test]
    fn test_empty_envelope_is_empty_result() {
        assert_eq!(ok("{}").unwrap(), None);
        assert_eq!(ok(r#"{"_server_messages": "[]"}"#).unwrap(), None);
    }

    #[test]
    fn test_exc_raises_remote_execution() {
        let err = ok(r#"{"exc": "Traceback: ValidationError", "message": 1, "data": 2}"#).unwrap_err();
        match err {
            Error::RemoteExecution(msg) => assert_eq!(msg, "Traceback: ValidationError"),
            e => panic!("Expected RemoteExecution, got: {:?}", e),
        }
    }

    #[test]
    fn test_non_string_exc_is_serialized() {
        let err = ok(r#"{"exc": ["line 1", "line 2"]}"#).unwrap_err();
        match err {
            Error::RemoteExecution(msg) => assert_eq!(msg, r#"["line 1","line 2"]"#),
            e => panic!("Expected RemoteExecution, got: {:?}", e),
        }
    }

    #[test]
    fn test_empty_exc_is_ignored() {
        assert_eq!(ok(r#"{"exc": "", "message": "ok"}"#).unwrap(), Some(json!("ok")));
        assert_eq!(ok(r#"{"exc": null, "data": 3}"#).unwrap(), Some(json!(3)));
        assert_eq!(ok(r#"{"exc": []}"#).unwrap(), None);
    }

    #[test]
    fn test_invalid_json_keeps_raw_body() {
        let err = normalize(StatusCode::BAD_GATEWAY, b"<html>Bad Gateway</html>").unwrap_err();
        match err {
            Error::MalformedResponse { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "<html>Bad Gateway</html>");
            }
            e => panic!("Expected MalformedResponse, got: {:?}", e),
        }
    }

    #[test]
    fn test_non_object_envelope_is_malformed() {
        assert!(matches!(ok("[1, 2, 3]"), Err(Error::MalformedResponse { .. })));
    }

    #[test]
    fn test_status_does_not_change_precedence() {
        let result = normalize(StatusCode::INTERNAL_SERVER_ERROR, br#"{"message": "done"}"#).unwrap();
        assert_eq!(result, Some(json!("done")));
    }

    #[test]
    fn test_into_count() {
        assert_eq!(into_count(StatusCode::OK, Some(json!(120))).unwrap(), 120);
        assert_eq!(into_count(StatusCode::OK, Some(json!(7.0))).unwrap(), 7);
        assert_eq!(into_count(StatusCode::OK, Some(json!("15"))).unwrap(), 15);
        assert!(into_count(StatusCode::OK, None).is_err());
        assert!(into_count(StatusCode::OK, Some(json!(-1))).is_err());
        assert!(into_count(StatusCode::OK, Some(json!(2.5))).is_err());
        assert!(into_count(StatusCode::OK, Some(json!(u64::MAX))).is_ok());
    }

    #[test]
    fn test_into_count_rejects_out_of_range_floats() {
        for value in [json!(1e20), json!(18446744073709551616.0), json!(-0.5)] {
            match into_count(StatusCode::OK, Some(value.clone())) {
                Err(Error::MalformedResponse { status, .. }) => assert_eq!(status, 200),
                other => panic!("Expected MalformedResponse for {}, got: {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_into_documents() {
        let docs = into_documents(StatusCode::OK, Some(json!([{"name": "A"}, {"name": "B"}]))).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].name(), Some("B"));

        assert!(into_documents(StatusCode::OK, None).unwrap().is_empty());
        assert!(into_documents(StatusCode::OK, Some(json!({"name": "A"}))).is_err());
        assert!(into_documents(StatusCode::OK, Some(json!([1]))).is_err());
    }
}
