//! Reply extraction for agent webhooks of unknown shape.
//!
//! Webhooks return "something JSON-ish". The value is first classified into a
//! [`ReplyShape`], then rules are applied in a fixed order. The key priority
//! in [`REPLY_KEYS`] is observable behavior and must not be reordered.

use serde_json::Value;

/// Keys probed on object payloads, highest priority first.
pub const REPLY_KEYS: [&str; 7] = [
    "output", "response", "message", "text", "answer", "result", "reply",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyShape<'a> {
    Text(&'a str),
    /// Non-empty array; carries its first element.
    Head(&'a Value),
    /// Object with a recognized key; carries the value under that key.
    Keyed(&'static str, &'a Value),
    Opaque(&'a Value),
}

impl<'a> ReplyShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => ReplyShape::Text(s),
            Value::Array(items) => match items.first() {
                Some(head) => ReplyShape::Head(head),
                None => ReplyShape::Opaque(value),
            },
            Value::Object(map) => REPLY_KEYS
                .iter()
                .find_map(|k| map.get(*k).filter(|v| is_truthy(v)).map(|v| (*k, v)))
                .map(|(k, v)| ReplyShape::Keyed(k, v))
                .unwrap_or(ReplyShape::Opaque(value)),
            _ => ReplyShape::Opaque(value),
        }
    }
}

/// Turn an arbitrary webhook payload into displayable text.
pub fn extract_reply(value: &Value) -> String {
    match ReplyShape::classify(value) {
        ReplyShape::Text(s) => s.to_string(),
        ReplyShape::Head(head) => extract_reply(head),
        ReplyShape::Keyed(_, inner) => extract_reply(inner),
        ReplyShape::Opaque(v) => pretty(v),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// JavaScript truthiness, which is what webhook authors tend to assume.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
