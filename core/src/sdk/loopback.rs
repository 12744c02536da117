/// In-process client that plays the agent side of a conversation
///
/// Confirms every customer event with a server id (keeping the correlation
/// id), shows a typing indicator and answers. Sending `/archive` closes the
/// thread and archives the chat the way an agent would.
use crate::chat_types::Availability;
use crate::config::CustomerData;
use crate::error::{ChatError, Result};
use crate::sdk::client::{ClientEvent, CustomerClient, EventSink};
use crate::sdk::protocol::{
    ActivateChatRequest, ChatList, ChatSummary, HistoryPage, InitConfig, OutgoingEvent, RawEvent,
    RawMessage, RawSystemMessage, RawUser, StartChatRequest, StartedChat, Thread,
    MANUAL_ARCHIVED_AGENT,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const ARCHIVE_COMMAND: &str = "/archive";

struct LoopbackChat {
    id: String,
    active: bool,
    threads: Vec<Thread>,
}

impl LoopbackChat {
    fn open_thread(&mut self) -> String {
        let thread_id = Uuid::new_v4().to_string();
        self.threads.push(Thread {
            id: thread_id.clone(),
            events: Vec::new(),
        });
        self.active = true;
        thread_id
    }
}

#[derive(Default)]
struct LoopbackState {
    sink: Option<EventSink>,
    chats: Vec<LoopbackChat>,
}

pub struct LoopbackClient {
    agent: RawUser,
    customer_id: String,
    availability: Availability,
    state: Mutex<LoopbackState>,
}

impl LoopbackClient {
    pub fn new(agent_name: &str, availability: Availability) -> Self {
        Self {
            agent: RawUser {
                id: format!("agent-{}", Uuid::new_v4()),
                user_type: "agent".to_string(),
                name: Some(agent_name.to_string()),
                avatar: None,
                email: None,
            },
            customer_id: format!("customer-{}", Uuid::new_v4()),
            availability,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    fn ensure_connected(state: &LoopbackState) -> Result<()> {
        match state.sink {
            Some(_) => Ok(()),
            None => Err(ChatError::Connection("client not initialized".to_string())),
        }
    }

    fn emit(state: &LoopbackState, event: ClientEvent) {
        if let Some(sink) = &state.sink {
            sink.emit(event);
        }
    }

    fn new_message(&self, author_id: &str, custom_id: Option<String>, thread_id: &str, text: String) -> RawEvent {
        RawEvent::Message(RawMessage {
            id: Uuid::new_v4().to_string(),
            custom_id,
            author_id: author_id.to_string(),
            created_at: Utc::now(),
            thread_id: Some(thread_id.to_string()),
            text,
        })
    }

    /// Push back the server copy of `event`, then answer it
    fn confirm_and_reply(&self, state: &mut LoopbackState, chat_index: usize, event: OutgoingEvent) {
        let mut pushes = Vec::new();
        let Some(chat) = state.chats.get_mut(chat_index) else {
            return;
        };
        let Some(thread) = chat.threads.last_mut() else {
            return;
        };
        let thread_id = thread.id.clone();

        let confirmation = self.new_message(
            &self.customer_id,
            Some(event.custom_id.clone()),
            &thread_id,
            event.text.clone(),
        );
        thread.events.push(confirmation.clone());
        pushes.push(ClientEvent::IncomingEvent { event: confirmation });

        if event.text.trim() == ARCHIVE_COMMAND {
            let archived = RawEvent::SystemMessage(RawSystemMessage {
                id: Uuid::new_v4().to_string(),
                created_at: Utc::now(),
                thread_id: Some(thread_id),
                text: "The agent archived this chat.".to_string(),
                system_message_type: MANUAL_ARCHIVED_AGENT.to_string(),
            });
            thread.events.push(archived.clone());
            chat.active = false;
            pushes.push(ClientEvent::ThreadClosed);
            pushes.push(ClientEvent::IncomingEvent { event: archived });
        } else {
            let answer = match &event.post_back {
                Some(post_back) => format!("You picked: {}", post_back.value),
                None => format!("You said: {}", event.text),
            };
            let reply = self.new_message(&self.agent.id, None, &thread_id, answer);
            thread.events.push(reply.clone());
            pushes.push(ClientEvent::TypingIndicator { is_typing: true });
            pushes.push(ClientEvent::IncomingEvent { event: reply });
        }

        for push in pushes {
            Self::emit(state, push);
        }
    }
}

impl CustomerClient for LoopbackClient {
    async fn init(&self, config: InitConfig, sink: EventSink) -> Result<()> {
        debug!(
            "Loopback client initialized for license {} (group {:?}, epoch {})",
            config.license_id,
            config.group_id,
            sink.epoch()
        );
        let mut state = self.state.lock().await;
        state.sink = Some(sink);
        Self::emit(&state, ClientEvent::UserData(self.agent.clone()));
        Self::emit(&state, ClientEvent::CustomerId(self.customer_id.clone()));
        Self::emit(
            &state,
            ClientEvent::Connected {
                availability: self.availability,
            },
        );
        Ok(())
    }

    async fn start_chat(&self, request: StartChatRequest) -> Result<StartedChat> {
        let mut state = self.state.lock().await;
        Self::ensure_connected(&state)?;
        let mut chat = LoopbackChat {
            id: Uuid::new_v4().to_string(),
            active: false,
            threads: Vec::new(),
        };
        chat.open_thread();
        let chat_id = chat.id.clone();
        state.chats.push(chat);
        let index = state.chats.len() - 1;

        Self::emit(
            &state,
            ClientEvent::IncomingChatThread {
                chat_id: chat_id.clone(),
            },
        );
        for event in request.events {
            self.confirm_and_reply(&mut state, index, event);
        }
        Ok(StartedChat { chat_id })
    }

    async fn activate_chat(&self, request: ActivateChatRequest) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_connected(&state)?;
        let index = state
            .chats
            .iter()
            .position(|c| c.id == request.chat_id)
            .ok_or_else(|| ChatError::Protocol(format!("unknown chat {}", request.chat_id)))?;
        if state.chats[index].active {
            return Err(ChatError::Protocol(format!(
                "chat {} is already active",
                request.chat_id
            )));
        }
        state.chats[index].open_thread();

        Self::emit(
            &state,
            ClientEvent::IncomingChatThread {
                chat_id: request.chat_id.clone(),
            },
        );
        for event in request.events {
            self.confirm_and_reply(&mut state, index, event);
        }
        Ok(())
    }

    async fn send_event(&self, chat_id: &str, event: OutgoingEvent) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_connected(&state)?;
        let index = state
            .chats
            .iter()
            .position(|c| c.id == chat_id && c.active)
            .ok_or_else(|| ChatError::Protocol(format!("chat {} is not active", chat_id)))?;
        self.confirm_and_reply(&mut state, index, event);
        Ok(())
    }

    async fn list_chats(&self) -> Result<ChatList> {
        let state = self.state.lock().await;
        Self::ensure_connected(&state)?;
        let chats_summary: Vec<ChatSummary> = state
            .chats
            .iter()
            .rev()
            .map(|c| ChatSummary {
                id: c.id.clone(),
                active: c.active,
            })
            .collect();
        Ok(ChatList {
            total_chats: chats_summary.len() as u32,
            chats_summary,
        })
    }

    async fn chat_history(&self, chat_id: &str) -> Result<HistoryPage> {
        let state = self.state.lock().await;
        let chat = state
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| ChatError::Protocol(format!("unknown chat {}", chat_id)))?;
        Ok(HistoryPage {
            threads: chat.threads.clone(),
        })
    }

    async fn update_customer(&self, data: CustomerData) -> Result<()> {
        debug!("Customer profile updated: {} <{}>", data.name, data.email);
        Ok(())
    }

    async fn set_sneak_peek(&self, chat_id: &str, text: &str) -> Result<()> {
        debug!("Sneak peek for {}: {}", chat_id, text);
        Ok(())
    }
}
