#![allow(dead_code)]
/// Shared test fixtures: a recording client and session stepping helpers
use chrono::{TimeZone, Utc};
use livechat_core::chat_types::Availability;
use livechat_core::config::CustomerData;
use livechat_core::sdk::protocol::{
    ActivateChatRequest, ChatList, ChatSummary, HistoryPage, InitConfig, OutgoingEvent, RawEvent,
    RawMessage, RawSystemMessage, RawUser, StartChatRequest, StartedChat, MANUAL_ARCHIVED_AGENT,
};
use livechat_core::sdk::{ClientEvent, CustomerClient, EventSink};
use livechat_core::{ChatError, ChatSession, Result, WidgetConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

pub const CUSTOMER_ID: &str = "cust-1";
pub const AGENT_ID: &str = "agent-1";
pub const CHAT_ID: &str = "chat-1";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Init(u64, InitConfig),
    StartChat(StartChatRequest),
    ActivateChat(ActivateChatRequest),
    SendEvent(String, OutgoingEvent),
    ListChats,
    ChatHistory(String),
    UpdateCustomer(CustomerData),
    SneakPeek(String, String),
}

/// Client that records every call and answers from canned data
#[derive(Default)]
pub struct ScriptedClient {
    calls: Mutex<Vec<Call>>,
    sink: Mutex<Option<EventSink>>,
    fail_dispatch: AtomicBool,
    chat_list: Mutex<ChatList>,
    history: Mutex<HistoryPage>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Existing conversation reported by `list_chats`
    pub fn with_existing_chat(active: bool, history: HistoryPage) -> Arc<Self> {
        let client = Self::default();
        *client.chat_list.lock().unwrap() = ChatList {
            chats_summary: vec![ChatSummary {
                id: CHAT_ID.to_string(),
                active,
            }],
            total_chats: 1,
        };
        *client.history.lock().unwrap() = history;
        Arc::new(client)
    }

    /// Replace the page returned by later `chat_history` calls
    pub fn set_history(&self, history: HistoryPage) {
        *self.history.lock().unwrap() = history;
    }

    pub fn has_existing_chat(&self) -> bool {
        self.chat_list.lock().unwrap().total_chats > 0
    }

    pub fn set_fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn sink(&self) -> EventSink {
        self.sink.lock().unwrap().clone().expect("client not initialized")
    }

    pub fn push(&self, event: ClientEvent) {
        assert!(self.sink().emit(event), "session inbox closed");
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn dispatch_result(&self) -> Result<()> {
        if self.fail_dispatch.load(Ordering::SeqCst) {
            Err(ChatError::Dispatch("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CustomerClient for ScriptedClient {
    async fn init(&self, config: InitConfig, sink: EventSink) -> Result<()> {
        self.record(Call::Init(sink.epoch(), config));
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn start_chat(&self, request: StartChatRequest) -> Result<StartedChat> {
        self.record(Call::StartChat(request));
        self.dispatch_result()?;
        Ok(StartedChat {
            chat_id: CHAT_ID.to_string(),
        })
    }

    async fn activate_chat(&self, request: ActivateChatRequest) -> Result<()> {
        self.record(Call::ActivateChat(request));
        self.dispatch_result()
    }

    async fn send_event(&self, chat_id: &str, event: OutgoingEvent) -> Result<()> {
        self.record(Call::SendEvent(chat_id.to_string(), event));
        self.dispatch_result()
    }

    async fn list_chats(&self) -> Result<ChatList> {
        self.record(Call::ListChats);
        Ok(self.chat_list.lock().unwrap().clone())
    }

    async fn chat_history(&self, chat_id: &str) -> Result<HistoryPage> {
        self.record(Call::ChatHistory(chat_id.to_string()));
        Ok(self.history.lock().unwrap().clone())
    }

    async fn update_customer(&self, data: CustomerData) -> Result<()> {
        self.record(Call::UpdateCustomer(data));
        Ok(())
    }

    async fn set_sneak_peek(&self, chat_id: &str, text: &str) -> Result<()> {
        self.record(Call::SneakPeek(chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn message(id: &str, author_id: &str, custom_id: Option<&str>, text: &str) -> RawEvent {
    RawEvent::Message(RawMessage {
        id: id.to_string(),
        custom_id: custom_id.map(String::from),
        author_id: author_id.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        thread_id: Some("thread-1".to_string()),
        text: text.to_string(),
    })
}

pub fn archival() -> RawEvent {
    RawEvent::SystemMessage(RawSystemMessage {
        id: "archived-1".to_string(),
        created_at: Utc::now(),
        thread_id: Some("thread-1".to_string()),
        text: "Chat archived".to_string(),
        system_message_type: MANUAL_ARCHIVED_AGENT.to_string(),
    })
}

pub fn agent_user() -> RawUser {
    RawUser {
        id: AGENT_ID.to_string(),
        user_type: "agent".to_string(),
        name: Some("Anna".to_string()),
        avatar: None,
        email: None,
    }
}

/// Process exactly one push or completion
pub async fn step(session: &mut ChatSession<ScriptedClient>) {
    let processed = timeout(Duration::from_secs(2), session.step())
        .await
        .expect("timed out waiting for session input");
    assert!(processed, "session inbox closed");
}

pub async fn steps(session: &mut ChatSession<ScriptedClient>, n: usize) {
    for _ in 0..n {
        step(session).await;
    }
}

/// Poll until `cond` holds, letting spawned tasks run
pub async fn eventually(cond: impl Fn() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Session that is initialized, knows its customer and completed one
/// connection cycle (chat listing and, if a chat exists, history)
pub async fn connected_session(
    client: Arc<ScriptedClient>,
    config: WidgetConfig,
) -> ChatSession<ScriptedClient> {
    let mut session = ChatSession::new(client.clone(), config);
    session.initialize();
    step(&mut session).await;

    client.push(ClientEvent::CustomerId(CUSTOMER_ID.to_string()));
    client.push(ClientEvent::Connected {
        availability: Availability::Online,
    });
    steps(&mut session, 2).await;

    // chat listing
    step(&mut session).await;
    if client.has_existing_chat() {
        step(&mut session).await;
    }
    session
}
