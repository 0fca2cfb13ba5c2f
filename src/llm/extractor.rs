//! Picking the assistant's answer out of a thread's message list.

use super::traits::MessageRecord;
use serde_json::Value;

/// The chronologically latest assistant message
///
/// When two assistant messages cannot be ordered (a timestamp is missing or
/// they are equal) the earlier one in the list wins.
pub fn latest_assistant<M: MessageRecord>(messages: &[M]) -> Option<&M> {
    let mut best: Option<&M> = None;
    for message in messages.iter().filter(|m| m.is_assistant()) {
        best = match best {
            None => Some(message),
            Some(current) => match (current.created_at(), message.created_at()) {
                (Some(a), Some(b)) if b > a => Some(message),
                _ => Some(current),
            },
        };
    }
    best
}

/// Text of the first assistant message that has non-empty text
pub fn first_assistant_text<M: MessageRecord>(messages: &[M]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.is_assistant())
        .filter_map(|m| m.text())
        .find(|text| !text.is_empty())
}

/// A raw JSON message as returned by the agent thread REST API
///
/// Only the first content part is considered, read as `content[0].text.value`.
#[derive(Debug, Clone)]
pub struct JsonMessage(pub Value);

impl MessageRecord for JsonMessage {
    fn role(&self) -> &str {
        self.0.get("role").and_then(Value::as_str).unwrap_or_default()
    }

    fn text(&self) -> Option<String> {
        self.0
            .pointer("/content/0/text/value")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn created_at(&self) -> Option<i64> {
        self.0.get("created_at").and_then(Value::as_i64)
    }
}

/// Wrap the `data` array of a message list response
pub fn json_messages(body: &Value) -> Vec<JsonMessage> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|items| items.iter().cloned().map(JsonMessage).collect())
        .unwrap_or_default()
}
