/// Normalization of raw client payloads into timeline types
use crate::chat_types::{Attachment, Event, QuickReplyOption, User, UserType, SYSTEM_AUTHOR_ID};
use crate::sdk::protocol::{RawEvent, RawUser};
use tracing::debug;

/// Decode a raw JSON event, `None` if it is malformed
pub fn decode_event(value: &serde_json::Value) -> Option<RawEvent> {
    match serde_json::from_value::<RawEvent>(value.clone()) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Dropping undecodable event: {}", e);
            None
        }
    }
}

/// Turn a raw event into a timeline event
///
/// Returns `None` for kinds that have nothing to render.
pub fn normalize_event(raw: &RawEvent) -> Option<Event> {
    match raw {
        RawEvent::Message(m) => Some(Event {
            id: m.id.clone(),
            custom_id: m.custom_id.clone(),
            thread_id: m.thread_id.clone(),
            text: m.text.clone(),
            created_at: m.created_at,
            author_id: m.author_id.clone(),
            pending: false,
            sent: true,
            system: false,
            attachment: None,
            quick_replies: Vec::new(),
        }),
        RawEvent::SystemMessage(m) => Some(Event {
            id: m.id.clone(),
            custom_id: None,
            thread_id: m.thread_id.clone(),
            text: m.text.clone(),
            created_at: m.created_at,
            author_id: SYSTEM_AUTHOR_ID.to_string(),
            pending: false,
            sent: false,
            system: true,
            attachment: None,
            quick_replies: Vec::new(),
        }),
        RawEvent::File(f) => Some(Event {
            id: f.id.clone(),
            custom_id: f.custom_id.clone(),
            thread_id: f.thread_id.clone(),
            text: f.name.clone().unwrap_or_else(|| f.url.clone()),
            created_at: f.created_at,
            author_id: f.author_id.clone(),
            pending: false,
            sent: true,
            system: false,
            attachment: Some(Attachment {
                url: f.url.clone(),
                name: f.name.clone(),
                content_type: f.content_type.clone(),
            }),
            quick_replies: Vec::new(),
        }),
        RawEvent::RichMessage(m) => {
            let element = m.elements.first()?;
            let quick_replies: Vec<QuickReplyOption> = element
                .buttons
                .iter()
                .map(|b| QuickReplyOption {
                    title: b.text.clone(),
                    postback_id: b.postback_id.clone(),
                    value: b.value.clone(),
                })
                .collect();
            let text = element.title.clone().unwrap_or_default();
            if text.is_empty() && quick_replies.is_empty() {
                return None;
            }
            Some(Event {
                id: m.id.clone(),
                custom_id: None,
                thread_id: m.thread_id.clone(),
                text,
                created_at: m.created_at,
                author_id: m.author_id.clone(),
                pending: false,
                sent: true,
                system: false,
                attachment: None,
                quick_replies,
            })
        }
        RawEvent::Unsupported => None,
    }
}

/// Turn a `user_data` payload into a roster entry
pub fn parse_user(raw: &RawUser) -> Option<User> {
    let user_type = match raw.user_type.as_str() {
        "customer" => UserType::Customer,
        "agent" => UserType::Agent,
        other => {
            debug!("Ignoring user {} of unknown type {}", raw.id, other);
            return None;
        }
    };
    let name = raw.name.clone().unwrap_or_else(|| match user_type {
        UserType::Customer => "Customer".to_string(),
        UserType::Agent => "Agent".to_string(),
    });
    Some(User {
        id: raw.id.clone(),
        user_type,
        name,
        avatar: raw.avatar.clone(),
        email: raw.email.clone(),
    })
}
