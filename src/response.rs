//! Standard response envelope helpers.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// `{ "result": "success" | "error", "data": ... }`
#[derive(Serialize)]
pub struct Envelope<T> {
    pub result: Outcome,
    pub data: T,
}

#[derive(Serialize)]
pub struct ErrorData {
    pub error: String,
}

pub fn success<T: Serialize>(data: T) -> Envelope<T> {
    Envelope {
        result: Outcome::Success,
        data,
    }
}

pub fn failure(message: impl Into<String>) -> Envelope<ErrorData> {
    Envelope {
        result: Outcome::Error,
        data: ErrorData {
            error: message.into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_serialize_with_lowercase_result() {
        let ok = serde_json::to_value(success(json!({ "a": 1 }))).unwrap();
        assert_eq!(ok, json!({ "result": "success", "data": { "a": 1 } }));
        let err = serde_json::to_value(failure("boom")).unwrap();
        assert_eq!(err, json!({ "result": "error", "data": { "error": "boom" } }));
    }
}
