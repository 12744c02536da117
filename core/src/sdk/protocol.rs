/// Wire shapes exchanged with the external customer client
///
/// Field names follow the client's camelCase JSON. Inbound events are
/// internally tagged by `type`; kinds this crate cannot render decode to
/// [`RawEvent::Unsupported`] instead of failing.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System message subtype sent when an agent archives the conversation
pub const MANUAL_ARCHIVED_AGENT: &str = "manual_archived_agent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    Message(RawMessage),
    SystemMessage(RawSystemMessage),
    File(RawFile),
    RichMessage(RawRichMessage),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSystemMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub system_message_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRichMessage {
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub elements: Vec<RawRichElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRichElement {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub buttons: Vec<RawButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawButton {
    pub text: String,
    pub postback_id: String,
    #[serde(default)]
    pub value: String,
}

impl RawEvent {
    /// Origin id, `None` for unsupported kinds
    pub fn id(&self) -> Option<&str> {
        match self {
            RawEvent::Message(m) => Some(&m.id),
            RawEvent::SystemMessage(m) => Some(&m.id),
            RawEvent::File(f) => Some(&f.id),
            RawEvent::RichMessage(m) => Some(&m.id),
            RawEvent::Unsupported => None,
        }
    }

    pub fn custom_id(&self) -> Option<&str> {
        match self {
            RawEvent::Message(m) => m.custom_id.as_deref(),
            RawEvent::File(f) => f.custom_id.as_deref(),
            _ => None,
        }
    }

    /// Agent archived the conversation; the session must restart
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            RawEvent::SystemMessage(m) if m.system_message_type == MANUAL_ARCHIVED_AGENT
        )
    }
}

/// User profile as delivered by `user_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub active: bool,
}

/// Result of listing the customer's conversations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatList {
    pub chats_summary: Vec<ChatSummary>,
    pub total_chats: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// First page of a conversation's history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub threads: Vec<Thread>,
}

/// Reference back to the rich message a quick reply answers
///
/// Unlike the surrounding event, the client expects snake_case keys here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBack {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Event the customer sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_back: Option<PostBack>,
}

impl OutgoingEvent {
    pub fn message(text: String, custom_id: String, post_back: Option<PostBack>) -> Self {
        Self {
            kind: "message".to_string(),
            text,
            custom_id,
            post_back,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    pub events: Vec<OutgoingEvent>,
    pub continuous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateChatRequest {
    pub chat_id: String,
    pub events: Vec<OutgoingEvent>,
    pub continuous: bool,
}

/// Reply to a successful start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedChat {
    pub chat_id: String,
}

/// Parameters of the client's initialization handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub license_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Left out entirely when no group is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_back_wire_keys() {
        let event = OutgoingEvent::message(
            "Yes".to_string(),
            "local-1".to_string(),
            Some(PostBack {
                id: "pb".to_string(),
                kind: "message".to_string(),
                value: "yes".to_string(),
                event_id: "rich-1".to_string(),
                thread_id: Some("t7".to_string()),
            }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "message",
                "text": "Yes",
                "customId": "local-1",
                "postBack": {
                    "id": "pb",
                    "type": "message",
                    "value": "yes",
                    "event_id": "rich-1",
                    "thread_id": "t7"
                }
            })
        );
    }

    #[test]
    fn test_init_config_omits_missing_group() {
        let config = InitConfig {
            license_id: 12345,
            client_id: Some("abc".to_string()),
            redirect_uri: None,
            group_id: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({ "licenseId": 12345, "clientId": "abc" }));

        let grouped = InitConfig {
            group_id: Some(0),
            ..config
        };
        assert_eq!(serde_json::to_value(&grouped).unwrap()["groupId"], json!(0));
    }
}
