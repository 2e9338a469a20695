//! Response envelope decoding.
//!
//! Every registrar response is wrapped as
//! `{"messageCode": <int>, "messageText": "<string>", "result": <any>}`.
//! `messageCode == 1` means success and `3` means the session must log in
//! again. Decoding is a pure function: no retries happen here.

use crate::error::MetunicError;
use serde_json::{Map, Value};

/// `messageCode` signalling application-level success.
pub const SUCCESS_CODE: i64 = 1;

/// `messageCode` meaning "authentication required / session invalid".
pub const SESSION_EXPIRED_CODE: i64 = 3;

/// `messageCode` as the registrar sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageCode {
    /// No `messageCode` key at all
    Absent,
    /// An integer, a numeric string or an integral float
    Known(i64),
    /// Present but not readable as an integer (`null`, `"ERR"`, `true`, `2.5`)
    Unrecognised(Value),
}

impl MessageCode {
    fn from_field(field: Option<&Value>) -> Self {
        match field {
            None => MessageCode::Absent,
            Some(value) => match as_code(value) {
                Some(code) => MessageCode::Known(code),
                None => MessageCode::Unrecognised(value.clone()),
            },
        }
    }
}

/// Code carried by the [`MetunicError::ApiError`] of an unrecognised `messageCode`.
pub const UNRECOGNISED_CODE: i64 = 0;

/// Decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: MessageCode,
    /// `messageText`, when present
    pub text: Option<String>,
    /// `result` payload, when present
    pub result: Option<Value>,
    root: Map<String, Value>,
}

impl Envelope {
    /// Only an absent `messageCode` or a literal 1 counts as success.
    pub fn is_success(&self) -> bool {
        match self.code {
            MessageCode::Absent => true,
            MessageCode::Known(code) => code == SUCCESS_CODE,
            MessageCode::Unrecognised(_) => false,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == MessageCode::Known(SESSION_EXPIRED_CODE)
    }

    /// The registrar's message, or a generic fallback.
    pub fn message(&self) -> String {
        self.text
            .clone()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "API error".to_string())
    }

    /// The whole decoded body.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Turn a non-success envelope into the matching error.
    pub fn into_error(self) -> MetunicError {
        let message = self.message();
        match self.code {
            MessageCode::Known(SESSION_EXPIRED_CODE) => MetunicError::SessionExpired { message },
            MessageCode::Known(code) => MetunicError::api(code, message),
            MessageCode::Absent => MetunicError::api(SUCCESS_CODE, message),
            MessageCode::Unrecognised(_) => MetunicError::api(UNRECOGNISED_CODE, message),
        }
    }

    /// Payload on success, the matching error otherwise.
    pub fn into_result(self) -> Result<Value, MetunicError> {
        if self.is_success() {
            Ok(self.into_payload())
        } else {
            Err(self.into_error())
        }
    }

    /// The `result` field, or the whole body when `result` is absent.
    pub fn into_payload(self) -> Value {
        match self.result {
            Some(result) => result,
            None => Value::Object(self.root),
        }
    }
}

/// Decode a raw response body into an [`Envelope`].
///
/// Fails with [`MetunicError::MalformedResponse`] when the body is not JSON
/// or its root is not an object. Maintenance pages are HTML and must never
/// be mistaken for an empty success.
pub fn decode(status: u16, raw: &str) -> Result<Envelope, MetunicError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        MetunicError::malformed(
            status,
            format!("raw response could not be decoded ({})", e),
            raw,
        )
    })?;

    let root = match value {
        Value::Object(map) => map,
        other => {
            return Err(MetunicError::malformed(
                status,
                format!("expected a JSON object, got {}", json_kind(&other)),
                raw,
            ))
        }
    };

    let code = MessageCode::from_field(root.get("messageCode"));
    let text = root.get("messageText").and_then(|t| match t {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    });
    let result = root.get("result").filter(|r| !r.is_null()).cloned();

    Ok(Envelope {
        code,
        text,
        result,
        root,
    })
}

/// Accept integers, integral floats (`3.0`) and numeric strings (`"1"`).
fn as_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value <= i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then(|| value as i64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
