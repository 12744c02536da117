/// Chat session: lifecycle, dispatch state machine and the event loop
///
/// One session owns one [`Reconciler`]. Every mutation happens on the
/// session's own loop, one input at a time: user commands, client pushes and
/// the completions of dispatches that ran on spawned tasks. Pushes and
/// completions carry the epoch they were issued under; anything from an
/// older epoch is dropped, so a restarted session never sees callbacks from
/// its predecessor.
use crate::chat_types::{
    ChatPhase, ChatSnapshot, ConnectionState, Event, QuickReply, StatusFlags, User,
};
use crate::config::WidgetConfig;
use crate::error::{ChatError, Result};
use crate::reconciler::{Admission, Reconciler};
use crate::sdk::client::{ClientEvent, CustomerClient, EventSink};
use crate::sdk::parser::parse_user;
use crate::sdk::protocol::{
    ActivateChatRequest, ChatList, HistoryPage, OutgoingEvent, PostBack, RawEvent,
    StartChatRequest, StartedChat,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shown when a start, activate or send fails
pub const SEND_FAILED_TEXT: &str = "Sending message failed";

pub(crate) struct Envelope {
    pub(crate) epoch: u64,
    pub(crate) inbound: Inbound,
}

pub(crate) enum Inbound {
    Client(ClientEvent),
    Completion(Completion),
}

/// Result of a dispatch, re-entering the loop exactly once
pub(crate) enum Completion {
    Initialized(Result<()>),
    ChatStarted {
        local_id: String,
        result: Result<StartedChat>,
    },
    ChatActivated {
        chat_id: String,
        local_id: String,
        result: Result<()>,
    },
    EventSent {
        local_id: String,
        result: Result<()>,
    },
    ChatsListed {
        cycle: u64,
        result: Result<ChatList>,
    },
    HistoryFetched {
        cycle: u64,
        result: Result<HistoryPage>,
    },
}

/// User actions forwarded from the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SendMessage {
        text: String,
        quick_reply: Option<QuickReply>,
    },
    InputChanged(String),
    OpenChat,
    CloseChat,
    Shutdown,
}

/// Called with agent events that arrive while the widget is closed
pub type BackgroundHook = Box<dyn Fn(&Event, &User) + Send + Sync>;

struct QueuedSend {
    local_id: String,
    event: OutgoingEvent,
}

pub struct ChatSession<C: CustomerClient> {
    client: Arc<C>,
    config: WidgetConfig,
    reconciler: Reconciler,
    phase: ChatPhase,
    connection_state: ConnectionState,
    online: bool,
    queued: bool,
    queue_position: Option<u32>,
    chat_open: bool,

    /// Session generation, bumped on every teardown
    epoch: u64,
    /// Bumped on every `connected` push
    connection_cycle: u64,
    history_cycle: Option<u64>,

    /// A start or activate is outstanding; later sends wait in `outbox`
    handshake_in_flight: bool,
    outbox: VecDeque<QueuedSend>,

    background_hook: Option<BackgroundHook>,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: mpsc::UnboundedReceiver<Envelope>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
}

impl<C: CustomerClient> ChatSession<C> {
    pub fn new(client: Arc<C>, config: WidgetConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ChatSnapshot::default());
        let session = Self {
            client,
            config,
            reconciler: Reconciler::new(),
            phase: ChatPhase::NoChat,
            connection_state: ConnectionState::NotConnected,
            online: false,
            queued: false,
            queue_position: None,
            chat_open: false,
            epoch: 0,
            connection_cycle: 0,
            history_cycle: None,
            handshake_in_flight: false,
            outbox: VecDeque::new(),
            background_hook: None,
            inbox_tx,
            inbox_rx,
            snapshot_tx,
        };
        session.publish();
        session
    }

    pub fn with_background_hook(mut self, hook: BackgroundHook) -> Self {
        self.background_hook = Some(hook);
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Sends waiting for a start/activate to finish
    pub fn queued_sends(&self) -> usize {
        self.outbox.len()
    }

    fn status_flags(&self) -> StatusFlags {
        StatusFlags {
            connection_state: self.connection_state,
            online: self.online,
            chat_active: self.phase.is_active(),
            queued: self.queued,
        }
    }

    pub fn composer_disabled(&self) -> bool {
        self.status_flags()
            .composer_disabled(self.config.allow_offline_messages)
    }

    pub fn header_text(&self) -> Option<&str> {
        self.status_flags().header_text(
            !self.reconciler.is_empty(),
            &self.config.greeting,
            &self.config.no_agents,
        )
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            events: self.reconciler.events().to_vec(),
            users: self.reconciler.users().clone(),
            customer: self.reconciler.customer().cloned(),
            is_typing: self.reconciler.is_typing(),
            connection_state: self.connection_state,
            online: self.online,
            chat_active: self.phase.is_active(),
            queued: self.queued,
            queue_position: self.queue_position,
            chat_open: self.chat_open,
            composer_disabled: self.composer_disabled(),
            header_text: self.header_text().map(String::from),
            chat_title: self.config.chat_title.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Run the initialization handshake with the client for this epoch
    pub fn initialize(&mut self) {
        info!("Initializing chat session (epoch {})", self.epoch);
        let sink = EventSink::new(self.epoch, self.inbox_tx.clone());
        let config = self.config.init_config();
        let client = self.client.clone();
        self.dispatch(async move { Completion::Initialized(client.init(config, sink).await) });
    }

    /// Discard all session state and invalidate outstanding callbacks
    pub fn teardown(&mut self) {
        self.epoch += 1;
        self.reconciler.clear();
        self.phase = ChatPhase::NoChat;
        self.connection_state = ConnectionState::NotConnected;
        self.online = false;
        self.queued = false;
        self.queue_position = None;
        self.history_cycle = None;
        self.handshake_in_flight = false;
        self.outbox.clear();
        self.publish();
    }

    fn restart(&mut self) {
        info!("Conversation archived by agent, restarting session");
        self.teardown();
        self.initialize();
    }

    fn dispatch<F>(&self, fut: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let completion = fut.await;
            let _ = tx.send(Envelope {
                epoch,
                inbound: Inbound::Completion(completion),
            });
        });
    }

    fn spawn_detached<F>(what: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                debug!("{} failed: {}", what, e);
            }
        });
    }

    // ─── User actions ────────────────────────────────────────────────────────

    /// Optimistically append a customer message and dispatch it
    ///
    /// Returns the correlation id of the pending event.
    pub fn send_message(&mut self, text: String, quick_reply: Option<QuickReply>) -> Result<String> {
        let customer_id = self
            .reconciler
            .customer()
            .map(|c| c.id.clone())
            .ok_or_else(|| ChatError::NotReady("customer identity not received yet".to_string()))?;

        let post_back = quick_reply.and_then(|reply| self.post_back_for(&reply));
        let local_id = self.reconciler.append_local_send(text.clone(), customer_id);
        self.outbox.push_back(QueuedSend {
            local_id: local_id.clone(),
            event: OutgoingEvent::message(text, local_id.clone(), post_back),
        });
        self.pump_outbox();
        self.publish();
        Ok(local_id)
    }

    pub fn send_quick_reply(&mut self, reply: QuickReply) -> Result<String> {
        let text = reply.title.clone();
        self.send_message(text, Some(reply))
    }

    fn post_back_for(&self, reply: &QuickReply) -> Option<PostBack> {
        let Some(source) = self.reconciler.find(&reply.message_id) else {
            warn!("Quick reply references unknown event {}", reply.message_id);
            return None;
        };
        Some(PostBack {
            id: reply.postback_id.clone(),
            kind: "message".to_string(),
            value: reply.value.clone(),
            event_id: source.id.clone(),
            thread_id: source.thread_id.clone(),
        })
    }

    /// Forward composer text as a sneak peek; no-op before a chat exists
    pub fn input_changed(&mut self, text: String) {
        let Some(chat_id) = self.phase.chat_id().map(String::from) else {
            return;
        };
        let client = self.client.clone();
        Self::spawn_detached("Sneak peek", async move {
            client.set_sneak_peek(&chat_id, &text).await
        });
    }

    pub fn open_chat(&mut self) {
        self.chat_open = true;
        self.publish();
    }

    pub fn close_chat(&mut self) {
        self.chat_open = false;
        self.publish();
    }

    /// Dispatch queued sends until a handshake has to complete first
    fn pump_outbox(&mut self) {
        while !self.handshake_in_flight {
            let Some(QueuedSend { local_id, event }) = self.outbox.pop_front() else {
                break;
            };
            let client = self.client.clone();
            match self.phase.clone() {
                ChatPhase::NoChat => {
                    debug!("Starting chat with event {}", local_id);
                    self.handshake_in_flight = true;
                    let request = StartChatRequest {
                        events: vec![event],
                        continuous: true,
                    };
                    self.dispatch(async move {
                        let result = client.start_chat(request).await;
                        Completion::ChatStarted { local_id, result }
                    });
                }
                ChatPhase::Started { chat_id } => {
                    debug!("Activating chat {} with event {}", chat_id, local_id);
                    self.handshake_in_flight = true;
                    let request = ActivateChatRequest {
                        chat_id: chat_id.clone(),
                        events: vec![event],
                        continuous: true,
                    };
                    self.dispatch(async move {
                        let result = client.activate_chat(request).await;
                        Completion::ChatActivated {
                            chat_id,
                            local_id,
                            result,
                        }
                    });
                }
                ChatPhase::Active { chat_id } => {
                    debug!("Sending event {} into chat {}", local_id, chat_id);
                    self.dispatch(async move {
                        let result = client.send_event(&chat_id, event).await;
                        Completion::EventSent { local_id, result }
                    });
                }
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendMessage { text, quick_reply } => {
                let result = match quick_reply {
                    Some(reply) => self.send_quick_reply(reply),
                    None => self.send_message(text, None),
                };
                if let Err(e) = result {
                    warn!("Message not sent: {}", e);
                }
            }
            Command::InputChanged(text) => self.input_changed(text),
            Command::OpenChat => self.open_chat(),
            Command::CloseChat => self.close_chat(),
            Command::Shutdown => {}
        }
    }

    // ─── Inbound ─────────────────────────────────────────────────────────────

    /// Process the next push or completion; false if the inbox closed
    pub async fn step(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(envelope) => {
                self.handle_envelope(envelope);
                true
            }
            None => false,
        }
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        if envelope.epoch != self.epoch {
            debug!(
                "Dropping stale callback from epoch {} (current {})",
                envelope.epoch, self.epoch
            );
            return;
        }
        match envelope.inbound {
            Inbound::Client(event) => self.handle_client_event(event),
            Inbound::Completion(completion) => self.handle_completion(completion),
        }
        self.publish();
    }

    fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected { availability } => self.on_connected(availability.is_online()),
            ClientEvent::ConnectionLost => {
                warn!("Connection lost");
                self.connection_state = ConnectionState::ConnectionLost;
            }
            ClientEvent::Disconnected => {
                info!("Disconnected");
                self.connection_state = ConnectionState::Disconnected;
            }
            ClientEvent::IncomingChatThread { chat_id } => {
                self.phase = ChatPhase::Active { chat_id };
            }
            ClientEvent::ThreadClosed => self.phase.deactivate(),
            ClientEvent::IncomingEvent { event } => self.apply_inbound(event),
            ClientEvent::TypingIndicator { is_typing } => {
                self.reconciler.apply_typing_indicator(is_typing)
            }
            ClientEvent::UserData(raw) => {
                if let Some(user) = parse_user(&raw) {
                    self.reconciler.upsert_user(user);
                }
            }
            ClientEvent::CustomerId(id) => {
                if self.reconciler.user(&id).is_none() {
                    self.reconciler.upsert_user(User::local_customer(id));
                }
            }
            ClientEvent::AvailabilityUpdated { availability } => {
                self.online = availability.is_online();
            }
            ClientEvent::QueuePositionUpdated { position } => {
                self.queued = position.is_some();
                self.queue_position = position;
            }
        }
    }

    fn on_connected(&mut self, online: bool) {
        self.connection_cycle += 1;
        self.connection_state = ConnectionState::Connected;
        self.online = online;
        info!("Connected (online: {})", online);

        let client = self.client.clone();
        let customer = self.config.customer.clone();
        Self::spawn_detached("Customer update", async move {
            client.update_customer(customer).await
        });

        let client = self.client.clone();
        let cycle = self.connection_cycle;
        self.dispatch(async move {
            Completion::ChatsListed {
                cycle,
                result: client.list_chats().await,
            }
        });
    }

    /// Dedup, normalize and append one pushed event
    fn apply_inbound(&mut self, raw: RawEvent) {
        let event = match self.reconciler.admit(&raw) {
            Admission::Accepted(event) => event,
            Admission::Duplicate => {
                debug!("Ignoring duplicate event {:?}", raw.id());
                return;
            }
            Admission::Unsupported => {
                debug!("Ignoring unsupported event {:?}", raw.id());
                return;
            }
        };

        if !self.chat_open {
            if let Some(hook) = &self.background_hook {
                if let Some(author) = self.reconciler.user(&event.author_id).filter(|u| u.is_agent()) {
                    hook(&event, author);
                }
            }
        }

        if raw.requires_restart() {
            self.restart();
            return;
        }

        self.reconciler.append_inbound(event);
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Initialized(Ok(())) => debug!("Client initialized"),
            Completion::Initialized(Err(e)) => {
                error!("Client initialization failed: {}", e);
                self.connection_state = ConnectionState::NotConnected;
            }
            Completion::ChatStarted { local_id, result } => {
                self.handshake_in_flight = false;
                match result {
                    Ok(started) => {
                        info!("Chat {} started", started.chat_id);
                        self.phase = ChatPhase::Active {
                            chat_id: started.chat_id,
                        };
                        self.reconciler.mark_sent(&local_id);
                    }
                    Err(e) => self.send_failed(&local_id, e),
                }
                self.pump_outbox();
            }
            Completion::ChatActivated {
                chat_id,
                local_id,
                result,
            } => {
                self.handshake_in_flight = false;
                match result {
                    Ok(()) => {
                        info!("Chat {} activated", chat_id);
                        self.phase = ChatPhase::Active { chat_id };
                        self.reconciler.mark_sent(&local_id);
                    }
                    Err(e) => self.send_failed(&local_id, e),
                }
                self.pump_outbox();
            }
            Completion::EventSent { local_id, result } => match result {
                Ok(()) => {
                    self.reconciler.mark_sent(&local_id);
                }
                Err(e) => self.send_failed(&local_id, e),
            },
            Completion::ChatsListed { cycle, result } => self.on_chats_listed(cycle, result),
            Completion::HistoryFetched { cycle, result } => self.on_history(cycle, result),
        }
    }

    fn send_failed(&mut self, local_id: &str, e: ChatError) {
        warn!("Dispatch of {} failed: {}", local_id, e);
        self.reconciler.add_system_message(SEND_FAILED_TEXT);
    }

    fn on_chats_listed(&mut self, cycle: u64, result: Result<ChatList>) {
        if cycle != self.connection_cycle {
            return;
        }
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                warn!("Listing chats failed: {}", e);
                return;
            }
        };
        if list.total_chats == 0 {
            return;
        }
        let Some(summary) = list.chats_summary.into_iter().next() else {
            return;
        };

        if !self.handshake_in_flight {
            self.phase = if summary.active {
                ChatPhase::Active {
                    chat_id: summary.id.clone(),
                }
            } else {
                ChatPhase::Started {
                    chat_id: summary.id.clone(),
                }
            };
        }

        if self.history_cycle == Some(cycle) {
            return;
        }
        self.history_cycle = Some(cycle);
        let client = self.client.clone();
        let chat_id = summary.id;
        self.dispatch(async move {
            Completion::HistoryFetched {
                cycle,
                result: client.chat_history(&chat_id).await,
            }
        });
    }

    fn on_history(&mut self, cycle: u64, result: Result<HistoryPage>) {
        if cycle != self.connection_cycle {
            return;
        }
        match result {
            Ok(page) => {
                let added = self.reconciler.merge_history(&page.threads);
                debug!("Merged {} history events", added);
            }
            Err(e) => warn!("Fetching history failed: {}", e),
        }
    }

    // ─── Driver ──────────────────────────────────────────────────────────────

    /// Initialize and process inputs until shutdown
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.initialize();
        loop {
            tokio::select! {
                Some(envelope) = self.inbox_rx.recv() => self.handle_envelope(envelope),
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }
        info!("Chat session stopped");
    }

    /// Run the session on its own task
    pub fn spawn(self) -> SessionHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let snapshot = self.subscribe();
        let task = tokio::spawn(self.run(rx));
        SessionHandle {
            commands,
            snapshot,
            task,
        }
    }
}

/// What the rendering layer holds on to
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<ChatSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ChatError::Closed("session task has stopped".to_string()))
    }

    pub fn send_message(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::SendMessage {
            text: text.into(),
            quick_reply: None,
        })
    }

    pub fn send_quick_reply(&self, reply: QuickReply) -> Result<()> {
        self.command(Command::SendMessage {
            text: reply.title.clone(),
            quick_reply: Some(reply),
        })
    }

    pub fn input_changed(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::InputChanged(text.into()))
    }

    pub fn open_chat(&self) -> Result<()> {
        self.command(Command::OpenChat)
    }

    pub fn close_chat(&self) -> Result<()> {
        self.command(Command::CloseChat)
    }

    /// Latest published state
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next published state
    pub async fn changed(&mut self) -> Result<ChatSnapshot> {
        self.snapshot
            .changed()
            .await
            .map_err(|_| ChatError::Closed("session task has stopped".to_string()))?;
        Ok(self.snapshot.borrow_and_update().clone())
    }

    pub async fn shutdown(self) -> Result<()> {
        self.command(Command::Shutdown)?;
        self.task
            .await
            .map_err(|e| ChatError::Closed(format!("session task failed: {}", e)))
    }
}
