//! WebSocket fan-out of wrangling events to channel subscribers.

pub mod connection;
pub mod dispatcher;
