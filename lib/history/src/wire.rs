//! Wire format of the history service.

use chat_relay_ai::Turn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields the storage layer adds to every document.
const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt"];

/// A stored chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// Body of a chat update.
#[derive(Debug, Serialize)]
pub struct ChatUpdate<'a> {
    pub history: &'a [Turn],
}

/// The stored bot personality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRecord {
    pub personality: String,
}

/// Removes storage metadata from a document, at every depth.
///
/// Keys beginning with `_` and the storage timestamps are dropped so the
/// remainder decodes into the domain types.
pub fn strip_metadata(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.starts_with('_') && !TIMESTAMP_FIELDS.contains(&key.as_str()));
            map.values_mut().for_each(strip_metadata);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_metadata),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_relay_ai::{Part, Role};
    use serde_json::json;

    #[test]
    fn strips_nested_metadata() {
        let mut doc = json!({
            "_id": "65f0",
            "__v": 0,
            "id": "123",
            "createdAt": "2024-03-01T00:00:00Z",
            "updatedAt": "2024-03-01T00:00:00Z",
            "history": [
                { "_id": "a", "role": "user", "parts": [{ "_id": "b", "text": "hi" }] },
                { "_id": "c", "role": "model", "parts": [{ "text": "hello" }] }
            ]
        });

        strip_metadata(&mut doc);

        assert_eq!(
            doc,
            json!({
                "id": "123",
                "history": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] }
                ]
            })
        );
    }

    #[test]
    fn stripped_document_decodes() {
        let mut doc = json!({
            "_id": "65f0",
            "id": "123",
            "history": [
                { "_id": "a", "role": "user", "parts": [
                    { "_id": "b", "text": "look" },
                    { "_id": "c", "fileData": { "_id": "d", "mimeType": "application/pdf", "fileUri": "https://files.example/1" } }
                ] }
            ]
        });
        strip_metadata(&mut doc);

        let record: ChatRecord = serde_json::from_value(doc).expect("decode");
        assert_eq!(record.id, "123");
        assert_eq!(record.history[0].role, Role::User);
        assert_eq!(
            record.history[0].parts[1],
            Part::file("application/pdf", "https://files.example/1")
        );
    }

    #[test]
    fn missing_history_is_empty() {
        let record: ChatRecord = serde_json::from_value(json!({ "id": "9" })).expect("decode");
        assert!(record.history.is_empty());
    }
}
