//! LiveChat widget core
//!
//! Conversation state for a customer-support chat widget: a deduplicated
//! timeline and roster reconciled from optimistic sends, live pushes and
//! history backfill, driven by a session that talks to an external
//! real-time customer client.

pub mod error;
pub mod config;
pub mod chat_types;
pub mod reconciler;
pub mod session;
pub mod sdk;
pub mod utils;

pub use error::{ChatError, Result};
pub use config::WidgetConfig;
pub use reconciler::Reconciler;
pub use session::{ChatSession, SessionHandle};
