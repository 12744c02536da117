/// The external real-time customer client, seen from the session
use crate::chat_types::Availability;
use crate::config::CustomerData;
use crate::error::Result;
use crate::sdk::protocol::{
    ActivateChatRequest, ChatList, HistoryPage, InitConfig, OutgoingEvent, RawEvent, RawUser,
    StartChatRequest, StartedChat,
};
use crate::session::{Envelope, Inbound};
use std::future::Future;
use tokio::sync::mpsc;

/// Push callbacks delivered by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { availability: Availability },
    ConnectionLost,
    Disconnected,
    IncomingChatThread { chat_id: String },
    ThreadClosed,
    IncomingEvent { event: RawEvent },
    TypingIndicator { is_typing: bool },
    UserData(RawUser),
    CustomerId(String),
    AvailabilityUpdated { availability: Availability },
    /// `None` once the customer leaves the queue
    QueuePositionUpdated { position: Option<u32> },
}

/// Where a client delivers its pushes
///
/// Each sink is bound to the session generation that created it. Pushes
/// through a sink from a torn-down generation are discarded by the session.
#[derive(Clone)]
pub struct EventSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Deliver a push; returns false once the session is gone
    pub fn emit(&self, event: ClientEvent) -> bool {
        self.tx
            .send(Envelope {
                epoch: self.epoch,
                inbound: Inbound::Client(event),
            })
            .is_ok()
    }
}

/// Request/response calls the session makes on the client
///
/// Every call is asynchronous; the session awaits them on spawned tasks and
/// re-enters its event loop with the result.
pub trait CustomerClient: Send + Sync + 'static {
    /// Authenticate and connect; pushes go to `sink` from now on
    fn init(&self, config: InitConfig, sink: EventSink) -> impl Future<Output = Result<()>> + Send;

    fn start_chat(&self, request: StartChatRequest) -> impl Future<Output = Result<StartedChat>> + Send;

    fn activate_chat(&self, request: ActivateChatRequest) -> impl Future<Output = Result<()>> + Send;

    fn send_event(&self, chat_id: &str, event: OutgoingEvent) -> impl Future<Output = Result<()>> + Send;

    fn list_chats(&self) -> impl Future<Output = Result<ChatList>> + Send;

    /// First history page of a conversation
    fn chat_history(&self, chat_id: &str) -> impl Future<Output = Result<HistoryPage>> + Send;

    fn update_customer(&self, data: CustomerData) -> impl Future<Output = Result<()>> + Send;

    /// Live preview of what the customer is typing
    fn set_sneak_peek(&self, chat_id: &str, text: &str) -> impl Future<Output = Result<()>> + Send;
}
