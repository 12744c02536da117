/// Seam to the external real-time customer client
pub mod client;
pub mod loopback;
pub mod parser;
pub mod protocol;

pub use client::{ClientEvent, CustomerClient, EventSink};
