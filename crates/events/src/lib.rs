//! Event system for Roundtable
//!
//! This crate provides the event bus and event types used to observe debate
//! lifecycle transitions and streamed turn output in real time.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
