//! Mixed-argument value model: the tagged union of JSON scalars, raw
//! buffers, and buffer-bearing structured values that an RPC call or
//! reply can carry, plus the URI-transform hook folded into the same
//! tree walk that extracts/restores out-of-band buffers.
//!
//! [`BufferValue`] is this codec's analogue of `serde_json::Value` with
//! one extra leaf: a raw byte buffer. Encoding walks the tree once,
//! replacing each [`BufferValue::Buffer`] with a `{"$$ref$$": index}`
//! placeholder and appending the bytes to a side list; decoding reverses
//! it. URI-named string keys are rewritten by the caller-supplied
//! [`UriTransform`] during the same walk.

use bytes::Bytes;
use serde_json::{Map, Value, json};

use crate::error::RpcError;

/// A structured value that may embed raw byte buffers at arbitrary
/// positions, referenced out-of-band from the JSON body that carries it.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferValue {
    Null,
    /// The sender's explicit "no value" (JS `undefined`), distinct from
    /// JSON `null`. Round-trips through the reserved `$$ref$$: -1`.
    Undefined,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Buffer(Bytes),
    Array(Vec<BufferValue>),
    Object(Vec<(String, BufferValue)>),
}

/// Pure function pair applied to designated URI-bearing keys during
/// (de)serialization: `uri`, `documentUri`, `targetUri`, `sourceUri`, and
/// any key ending in `Uri`. Non-URI keys pass through untouched.
pub trait UriTransform: Send + Sync {
    fn outgoing(&self, key: &str, value: &Value) -> Value;
    fn incoming(&self, key: &str, value: &Value) -> Value;
}

#[must_use]
pub fn is_uri_key(key: &str) -> bool {
    matches!(key, "uri" | "documentUri" | "targetUri" | "sourceUri") || key.ends_with("Uri")
}

/// One argument atom as the caller constructs it. Selection between the
/// JSON-only and mixed wire encodings (§4.5) scans a `&[RpcArg]` for any
/// [`RpcArg::Undefined`], [`RpcArg::Buffer`], [`RpcArg::WithBuffers`], or
/// an explicit JSON `null`.
#[derive(Debug, Clone)]
pub enum RpcArg {
    Value(Value),
    Buffer(Bytes),
    WithBuffers(BufferValue),
    Undefined,
}

#[must_use]
pub fn requires_mixed_encoding(args: &[RpcArg]) -> bool {
    args.iter().any(|a| match a {
        RpcArg::Undefined | RpcArg::Buffer(_) | RpcArg::WithBuffers(_) => true,
        RpcArg::Value(v) => v.is_null(),
    })
}

/// The result an incoming call replies with, or an outgoing call
/// receives back.
#[derive(Debug, Clone)]
pub enum ReplyValue {
    Empty,
    Buffer(Bytes),
    Json(Value),
    WithBuffers(BufferValue),
}

/// The decoded shape of a peer error reply (§4.5/§7): `$isError` object
/// carrying the remote class name, message, and stack text.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl RemoteError {
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "$isError": true,
            "name": self.name,
            "message": self.message,
            "stack": self.stack,
        })
    }

    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("$isError").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        Some(Self {
            name: obj.get("name").and_then(Value::as_str).unwrap_or("Error").to_owned(),
            message: obj.get("message").and_then(Value::as_str).unwrap_or_default().to_owned(),
            stack: obj.get("stack").and_then(Value::as_str).unwrap_or_default().to_owned(),
        })
    }
}

/// Walk a plain JSON value (no buffers possible), applying the outgoing
/// URI transform to string leaves under URI-named keys. Used by the
/// `RequestJSONArgs`/`ReplyOKJSON` paths, which never carry buffers.
pub fn transform_json_outgoing(key: Option<&str>, value: &Value, transform: Option<&dyn UriTransform>) -> Value {
    match value {
        Value::String(_) => match (key, transform) {
            (Some(k), Some(t)) if is_uri_key(k) => t.outgoing(k, value),
            _ => value.clone(),
        },
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| transform_json_outgoing(None, v, transform)).collect())
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), transform_json_outgoing(Some(k), v, transform));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

pub fn transform_json_incoming(key: Option<&str>, value: &Value, transform: Option<&dyn UriTransform>) -> Value {
    match value {
        Value::String(_) => match (key, transform) {
            (Some(k), Some(t)) if is_uri_key(k) => t.incoming(k, value),
            _ => value.clone(),
        },
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| transform_json_incoming(None, v, transform)).collect())
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), transform_json_incoming(Some(k), v, transform));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Encode a [`BufferValue`] tree into a plain JSON value plus the buffer
/// list it referenced, applying the outgoing URI transform in the same
/// pass.
pub fn encode_buffer_value(value: &BufferValue, buffers: &mut Vec<Bytes>, transform: Option<&dyn UriTransform>) -> Value {
    encode_walk(None, value, buffers, transform)
}

fn encode_walk(key: Option<&str>, value: &BufferValue, buffers: &mut Vec<Bytes>, transform: Option<&dyn UriTransform>) -> Value {
    match value {
        BufferValue::Null => Value::Null,
        BufferValue::Undefined => json!({"$$ref$$": -1}),
        BufferValue::Bool(b) => Value::Bool(*b),
        BufferValue::Number(n) => Value::Number(n.clone()),
        BufferValue::String(s) => {
            let v = Value::String(s.clone());
            match (key, transform) {
                (Some(k), Some(t)) if is_uri_key(k) => t.outgoing(k, &v),
                _ => v,
            }
        }
        BufferValue::Buffer(b) => {
            buffers.push(b.clone());
            json!({"$$ref$$": buffers.len() - 1})
        }
        BufferValue::Array(items) => Value::Array(
            items.iter().map(|v| encode_walk(None, v, buffers, transform)).collect(),
        ),
        BufferValue::Object(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), encode_walk(Some(k), v, buffers, transform));
            }
            Value::Object(out)
        }
    }
}

/// Decode a plain JSON value plus its accompanying buffer list back into
/// a [`BufferValue`] tree, applying the incoming URI transform and
/// restoring `$$ref$$` placeholders to their buffer (or, for `-1`, to
/// [`BufferValue::Undefined`]).
pub fn decode_buffer_value(value: &Value, buffers: &[Bytes], transform: Option<&dyn UriTransform>) -> Result<BufferValue, RpcError> {
    decode_walk(None, value, buffers, transform)
}

fn decode_walk(key: Option<&str>, value: &Value, buffers: &[Bytes], transform: Option<&dyn UriTransform>) -> Result<BufferValue, RpcError> {
    if let Some(obj) = value.as_object() {
        if obj.len() == 1 {
            if let Some(idx) = obj.get("$$ref$$").and_then(Value::as_i64) {
                if idx < 0 {
                    return Ok(BufferValue::Undefined);
                }
                let buf = buffers
                    .get(idx as usize)
                    .ok_or(RpcError::MalformedFrame("buffer ref out of range"))?;
                return Ok(BufferValue::Buffer(buf.clone()));
            }
        }
    }
    match value {
        Value::Null => Ok(BufferValue::Null),
        Value::Bool(b) => Ok(BufferValue::Bool(*b)),
        Value::Number(n) => Ok(BufferValue::Number(n.clone())),
        Value::String(s) => {
            let transformed = match (key, transform) {
                (Some(k), Some(t)) if is_uri_key(k) => t.incoming(k, value),
                _ => value.clone(),
            };
            match transformed {
                Value::String(s2) => Ok(BufferValue::String(s2)),
                _ => Ok(BufferValue::String(s.clone())),
            }
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode_walk(None, item, buffers, transform)?);
            }
            Ok(BufferValue::Array(out))
        }
        Value::Object(map) => {
            let mut out = Vec::with_capacity(map.len());
            for (k, v) in map {
                out.push((k.clone(), decode_walk(Some(k), v, buffers, transform)?));
            }
            Ok(BufferValue::Object(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseUris;
    impl UriTransform for UppercaseUris {
        fn outgoing(&self, _key: &str, value: &Value) -> Value {
            match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other.clone(),
            }
        }
        fn incoming(&self, _key: &str, value: &Value) -> Value {
            match value {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other.clone(),
            }
        }
    }

    #[test]
    fn buffer_round_trips_through_ref_placeholder() {
        let tree = BufferValue::Object(vec![
            ("name".to_owned(), BufferValue::String("blob".to_owned())),
            ("data".to_owned(), BufferValue::Buffer(Bytes::from_static(b"\x00\xff\x42"))),
        ]);
        let mut buffers = Vec::new();
        let json = encode_buffer_value(&tree, &mut buffers, None);
        assert_eq!(buffers.len(), 1);
        assert_eq!(json["data"]["$$ref$$"], 0);

        let decoded = decode_buffer_value(&json, &buffers, None).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn undefined_round_trips_via_negative_ref() {
        let tree = BufferValue::Array(vec![BufferValue::Undefined, BufferValue::Null]);
        let mut buffers = Vec::new();
        let json = encode_buffer_value(&tree, &mut buffers, None);
        assert!(buffers.is_empty());
        let decoded = decode_buffer_value(&json, &buffers, None).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn uri_transform_applies_only_to_uri_named_keys() {
        let tree = BufferValue::Object(vec![
            ("documentUri".to_owned(), BufferValue::String("file:///a".to_owned())),
            ("label".to_owned(), BufferValue::String("file:///a".to_owned())),
        ]);
        let mut buffers = Vec::new();
        let json = encode_buffer_value(&tree, &mut buffers, Some(&UppercaseUris));
        assert_eq!(json["documentUri"], "FILE:///A");
        assert_eq!(json["label"], "file:///a");
    }

    #[test]
    fn requires_mixed_encoding_detects_buffers_and_nulls() {
        assert!(!requires_mixed_encoding(&[RpcArg::Value(json!("hello"))]));
        assert!(requires_mixed_encoding(&[RpcArg::Value(Value::Null)]));
        assert!(requires_mixed_encoding(&[RpcArg::Buffer(Bytes::from_static(b"x"))]));
        assert!(requires_mixed_encoding(&[RpcArg::Undefined]));
    }

    #[test]
    fn remote_error_round_trips() {
        let err = RemoteError {
            name: "Canceled".to_owned(),
            message: "operation canceled".to_owned(),
            stack: "at foo\nat bar".to_owned(),
        };
        let json = err.to_json();
        let parsed = RemoteError::from_json(&json).unwrap();
        assert_eq!(parsed.name, err.name);
        assert_eq!(parsed.message, err.message);
    }

    #[test]
    fn non_error_object_is_not_mistaken_for_an_error() {
        assert!(RemoteError::from_json(&json!({"name": "not an error"})).is_none());
    }
}
