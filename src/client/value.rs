//! Value encoding for the remote store.
//!
//! Text is stored verbatim, scalars by their display form, objects and lists as
//! JSON text. Decoding only turns JSON objects/lists back into structured values.

use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Text(String),
    Json(Value),
}

impl CacheValue {
    /// Text form written to the store.
    pub fn encode(&self) -> Result<String> {
        match self {
            CacheValue::Text(s) => Ok(s.clone()),
            CacheValue::Json(Value::String(s)) => Ok(s.clone()),
            CacheValue::Json(v @ (Value::Object(_) | Value::Array(_))) => Ok(serde_json::to_string(v)?),
            CacheValue::Json(scalar) => Ok(scalar.to_string()),
        }
    }

    /// Reverse of [`encode`](Self::encode) for a raw stored string.
    pub fn decode(raw: String) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(v) = serde_json::from_str::<Value>(&raw) {
                if v.is_object() || v.is_array() {
                    return CacheValue::Json(v);
                }
            }
        }
        CacheValue::Text(raw)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Text(s) => Some(s),
            CacheValue::Json(Value::String(s)) => Some(s),
            CacheValue::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CacheValue::Json(v) => Some(v),
            CacheValue::Text(_) => None,
        }
    }
}

impl From<String> for CacheValue {
    fn from(s: String) -> Self {
        CacheValue::Text(s)
    }
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        CacheValue::Text(s.to_string())
    }
}

impl From<Value> for CacheValue {
    fn from(v: Value) -> Self {
        CacheValue::Json(v)
    }
}

impl From<i64> for CacheValue {
    fn from(n: i64) -> Self {
        CacheValue::Json(Value::from(n))
    }
}

impl From<f64> for CacheValue {
    fn from(n: f64) -> Self {
        CacheValue::Json(Value::from(n))
    }
}

impl From<bool> for CacheValue {
    fn from(b: bool) -> Self {
        CacheValue::Json(Value::Bool(b))
    }
}
