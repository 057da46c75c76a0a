//! Telegram Bot API wire types (the subset the relay reads).

use serde::Deserialize;

use conch_types::error::TransportError;
use conch_types::transport::{ChatKind, InboundUpdate, UpdateBatch};

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Decode(
                "response marked ok without a result".to_string(),
            )),
            (false, _) => Err(TransportError::Api {
                code: self.error_code.unwrap_or(0),
                description: self.description.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

impl Update {
    /// `None` for updates that carry no message (edits, callbacks, ...).
    pub fn into_inbound(self) -> Option<InboundUpdate> {
        let message = self.message?;
        Some(InboundUpdate {
            update_id: self.update_id,
            chat_id: message.chat.id,
            chat_kind: message.chat.kind,
            text: message.text,
        })
    }
}

/// Surface message updates and remember the highest id of the whole batch.
pub fn into_batch(updates: Vec<Update>) -> UpdateBatch {
    let last_update_id = updates.iter().map(|u| u.update_id).max();
    UpdateBatch {
        updates: updates.into_iter().filter_map(Update::into_inbound).collect(),
        last_update_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_get_updates_response() {
        let body = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 815,
                    "message": {
                        "message_id": 7,
                        "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
                        "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                        "date": 1700000000,
                        "text": "hello"
                    }
                },
                {
                    "update_id": 816,
                    "message": {
                        "message_id": 8,
                        "chat": { "id": -1001, "type": "supergroup", "title": "Crew" },
                        "date": 1700000001,
                        "sticker": { "file_id": "x" }
                    }
                }
            ]
        }"#;
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let updates: Vec<InboundUpdate> = resp
            .into_result()
            .unwrap()
            .into_iter()
            .filter_map(Update::into_inbound)
            .collect();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].update_id, 815);
        assert_eq!(updates[0].chat_kind, ChatKind::Private);
        assert_eq!(updates[0].text.as_deref(), Some("hello"));
        assert_eq!(updates[1].chat_id, -1001);
        assert!(updates[1].chat_kind.is_group());
        assert_eq!(updates[1].text, None);
    }

    #[test]
    fn error_envelope_becomes_api_error() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: message text is empty"}"#;
        let resp: ApiResponse<TgMessage> = serde_json::from_str(body).unwrap();
        match resp.into_result() {
            Err(TransportError::Api { code, description }) => {
                assert_eq!(code, 400);
                assert!(description.contains("message text is empty"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn update_without_message_is_skipped() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 3, "edited_message": {"message_id": 1}}"#,
        )
        .unwrap();
        assert!(update.into_inbound().is_none());
    }

    #[test]
    fn batch_of_edits_still_moves_the_offset() {
        let body = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 500,
                    "edited_message": {
                        "message_id": 9,
                        "chat": { "id": 42, "type": "private" },
                        "date": 1700000000,
                        "edit_date": 1700000005,
                        "text": "typo fixed"
                    }
                }
            ]
        }"#;
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let batch = into_batch(resp.into_result().unwrap());

        assert!(batch.updates.is_empty());
        assert_eq!(batch.last_update_id, Some(500));
        assert_eq!(batch.next_offset(), Some(501));
    }
}
