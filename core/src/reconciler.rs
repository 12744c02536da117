/// Conversation state reconciliation
///
/// Keeps one deduplicated timeline and the user roster consistent across
/// three inputs: optimistic local sends, live pushes and history backfill.
/// Events are only appended, prepended (backfill) or updated in place.
use crate::chat_types::{Event, User, UserType};
use crate::sdk::parser::normalize_event;
use crate::sdk::protocol::{RawEvent, Thread};
use crate::utils::ids;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of screening an inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Id or correlation id already present
    Duplicate,
    /// Nothing renderable
    Unsupported,
    /// New event, not yet appended
    Accepted(Event),
}

#[derive(Debug, Default)]
pub struct Reconciler {
    events: Vec<Event>,
    users: HashMap<String, User>,
    is_typing: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn users(&self) -> &HashMap<String, User> {
        &self.users
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// The local customer, once known
    pub fn customer(&self) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.user_type == UserType::Customer)
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True if any event carries `key` as id or correlation id
    pub fn contains(&self, key: &str) -> bool {
        self.events.iter().any(|e| e.matches(key))
    }

    pub fn find(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Append an optimistic, pending event and return its correlation id
    pub fn append_local_send(&mut self, text: String, author_id: String) -> String {
        let local_id = ids::local_event_id();
        self.events.push(Event {
            id: local_id.clone(),
            custom_id: Some(local_id.clone()),
            thread_id: None,
            text,
            created_at: Utc::now(),
            author_id,
            pending: true,
            sent: false,
            system: false,
            attachment: None,
            quick_replies: Vec::new(),
        });
        local_id
    }

    /// Acknowledge a local send; returns false if no such event exists
    pub fn mark_sent(&mut self, local_id: &str) -> bool {
        match self.events.iter_mut().find(|e| e.matches(local_id)) {
            Some(event) => {
                event.pending = false;
                event.sent = true;
                true
            }
            None => false,
        }
    }

    pub fn add_system_message(&mut self, text: impl Into<String>) -> String {
        let id = ids::system_event_id();
        self.events.push(Event::system(id.clone(), text.into()));
        id
    }

    /// Screen an inbound event without appending it
    ///
    /// A duplicate that confirms a still-pending local send acknowledges it.
    pub fn admit(&mut self, raw: &RawEvent) -> Admission {
        let keys = [raw.id(), raw.custom_id()];
        let existing = self
            .events
            .iter_mut()
            .find(|e| keys.iter().flatten().any(|k| e.matches(k)));
        if let Some(event) = existing {
            if event.pending {
                debug!("Inbound event confirms local send {}", event.id);
                event.pending = false;
                event.sent = true;
            }
            return Admission::Duplicate;
        }

        match normalize_event(raw) {
            Some(event) => Admission::Accepted(event),
            None => Admission::Unsupported,
        }
    }

    /// Append an admitted event; an incoming event supersedes the typing hint
    pub fn append_inbound(&mut self, event: Event) {
        if self.contains(&event.id) {
            return;
        }
        self.events.push(event);
        self.is_typing = false;
    }

    /// Screen and append in one step; returns true if the timeline grew
    pub fn apply_inbound(&mut self, raw: &RawEvent) -> bool {
        match self.admit(raw) {
            Admission::Accepted(event) => {
                self.append_inbound(event);
                true
            }
            Admission::Duplicate | Admission::Unsupported => false,
        }
    }

    pub fn apply_typing_indicator(&mut self, is_typing: bool) {
        self.is_typing = is_typing;
    }

    /// Prepend backfilled history ahead of the live timeline
    ///
    /// Keeps thread order and the order within each thread. Returns the
    /// number of events added; zero leaves the timeline untouched.
    pub fn merge_history(&mut self, threads: &[Thread]) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        let history: Vec<Event> = threads
            .iter()
            .flat_map(|t| t.events.iter())
            .filter(|raw| {
                let Some(id) = raw.id() else {
                    return false;
                };
                let keys = [Some(id), raw.custom_id()];
                if keys.iter().flatten().any(|k| self.contains(k) || seen.contains(k)) {
                    return false;
                }
                seen.extend(keys.into_iter().flatten());
                true
            })
            .filter_map(|raw| {
                let mut event = normalize_event(raw)?;
                if event.thread_id.is_none() {
                    event.thread_id = threads
                        .iter()
                        .find(|t| t.events.iter().any(|r| r.id() == Some(event.id.as_str())))
                        .map(|t| t.id.clone());
                }
                Some(event)
            })
            .collect();

        if history.is_empty() {
            return 0;
        }

        let added = history.len();
        self.events.splice(0..0, history);
        added
    }

    /// Insert or overwrite a roster entry
    pub fn upsert_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Drop timeline, roster and typing state
    pub fn clear(&mut self) {
        self.events.clear();
        self.users.clear();
        self.is_typing = false;
    }
}
