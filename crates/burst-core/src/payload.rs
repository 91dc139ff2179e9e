use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTION_TAG: &str = "sendMessage";
pub const CHAT_INPUT: &str = "Hi";

/// One chat message as the target webhook expects it. The request body is
/// always a single-element array of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    pub session_id: String,
    pub action: String,
    pub chat_input: String,
}

impl WebhookMessage {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            session_id: correlation_id.into(),
            action: ACTION_TAG.to_string(),
            chat_input: CHAT_INPUT.to_string(),
        }
    }
}

/// Fresh 32-character lowercase hex token.
pub fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn build_payload(correlation_id: &str) -> Vec<WebhookMessage> {
    vec![WebhookMessage::new(correlation_id)]
}
