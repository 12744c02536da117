/// Shared types for the conversation timeline and the rendering layer
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Author id reserved for synthetic notices
pub const SYSTEM_AUTHOR_ID: &str = "system";

/// One entry of the conversation timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Client correlation id, set on optimistic sends and on their confirmations
    pub custom_id: Option<String>,
    pub thread_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub pending: bool,
    pub sent: bool,
    pub system: bool,
    pub attachment: Option<Attachment>,
    pub quick_replies: Vec<QuickReplyOption>,
}

impl Event {
    /// Synthetic informational event
    pub fn system(id: String, text: String) -> Self {
        Self {
            id,
            custom_id: None,
            thread_id: None,
            text,
            created_at: Utc::now(),
            author_id: SYSTEM_AUTHOR_ID.to_string(),
            pending: false,
            sent: false,
            system: true,
            attachment: None,
            quick_replies: Vec::new(),
        }
    }

    /// True if `key` is this event's id or correlation id
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.custom_id.as_deref() == Some(key)
    }
}

/// File attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    pub content_type: Option<String>,
}

/// Button offered by a rich message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReplyOption {
    pub title: String,
    pub postback_id: String,
    pub value: String,
}

/// A quick reply picked by the customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    /// Event that offered the reply
    pub message_id: String,
    pub title: String,
    pub postback_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Customer,
    Agent,
}

/// Conversation participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub user_type: UserType,
    pub name: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
}

impl User {
    /// Roster entry inferred from the `customer_id` push
    pub fn local_customer(id: String) -> Self {
        Self {
            id,
            user_type: UserType::Customer,
            name: "Customer".to_string(),
            avatar: None,
            email: None,
        }
    }

    pub fn is_agent(&self) -> bool {
        self.user_type == UserType::Agent
    }
}

/// Connection state reported by the external client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Connected,
    ConnectionLost,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn is_online(self) -> bool {
        self == Availability::Online
    }
}

/// Which dispatch call a local send must use
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ChatPhase {
    /// No conversation exists yet
    #[default]
    NoChat,
    /// Conversation exists but is not the live one
    Started { chat_id: String },
    /// Conversation is live
    Active { chat_id: String },
}

impl ChatPhase {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            ChatPhase::NoChat => None,
            ChatPhase::Started { chat_id } | ChatPhase::Active { chat_id } => Some(chat_id),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ChatPhase::Active { .. })
    }

    /// Thread closed: the conversation stays known but is no longer live
    pub fn deactivate(&mut self) {
        if let ChatPhase::Active { chat_id } = self {
            *self = ChatPhase::Started {
                chat_id: std::mem::take(chat_id),
            };
        }
    }
}

/// Scalar flags the derived UI predicates are computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub connection_state: ConnectionState,
    pub online: bool,
    pub chat_active: bool,
    pub queued: bool,
}

impl StatusFlags {
    pub fn composer_disabled(&self, allow_offline_messages: bool) -> bool {
        if !self.online && !self.chat_active && !allow_offline_messages {
            return true;
        }
        if self.queued {
            return true;
        }
        self.connection_state != ConnectionState::Connected
    }

    /// Header prompt, hidden once a live conversation has content
    pub fn header_text<'a>(
        &self,
        has_events: bool,
        greeting: &'a str,
        no_agents: &'a str,
    ) -> Option<&'a str> {
        if has_events && self.chat_active {
            return None;
        }
        Some(if self.online { greeting } else { no_agents })
    }
}

/// Read-only view handed to the rendering layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatSnapshot {
    pub events: Vec<Event>,
    pub users: HashMap<String, User>,
    pub customer: Option<User>,
    pub is_typing: bool,
    pub connection_state: ConnectionState,
    pub online: bool,
    pub chat_active: bool,
    pub queued: bool,
    pub queue_position: Option<u32>,
    pub chat_open: bool,
    pub composer_disabled: bool,
    pub header_text: Option<String>,
    pub chat_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composer_disabled_when_connection_lost() {
        for (online, active) in [(true, true), (true, false), (false, true), (false, false)] {
            let flags = StatusFlags {
                connection_state: ConnectionState::ConnectionLost,
                online,
                chat_active: active,
                queued: false,
            };
            assert!(flags.composer_disabled(true));
            assert!(flags.composer_disabled(false));
        }
    }

    #[test]
    fn test_composer_enabled_when_connected_and_live() {
        let flags = StatusFlags {
            connection_state: ConnectionState::Connected,
            online: true,
            chat_active: true,
            queued: false,
        };
        assert!(!flags.composer_disabled(false));

        let queued = StatusFlags { queued: true, ..flags };
        assert!(queued.composer_disabled(false));
    }

    #[test]
    fn test_composer_offline_messages() {
        let flags = StatusFlags {
            connection_state: ConnectionState::Connected,
            online: false,
            chat_active: false,
            queued: false,
        };
        assert!(flags.composer_disabled(false));
        assert!(!flags.composer_disabled(true));
    }

    #[test]
    fn test_header_text() {
        let mut flags = StatusFlags {
            online: true,
            ..Default::default()
        };
        assert_eq!(flags.header_text(false, "hi", "away"), Some("hi"));
        flags.online = false;
        assert_eq!(flags.header_text(true, "hi", "away"), Some("away"));
        flags.chat_active = true;
        assert_eq!(flags.header_text(true, "hi", "away"), None);
        assert_eq!(flags.header_text(false, "hi", "away"), Some("away"));
    }

    #[test]
    fn test_phase_deactivate() {
        let mut phase = ChatPhase::Active {
            chat_id: "c1".to_string(),
        };
        phase.deactivate();
        assert_eq!(
            phase,
            ChatPhase::Started {
                chat_id: "c1".to_string()
            }
        );
        let mut none = ChatPhase::NoChat;
        none.deactivate();
        assert_eq!(none, ChatPhase::NoChat);
    }
}
