//! Thread wrangling engine: resolves threads and moves, copies, merges or
//! attaches them through a [`store::PostStore`].

pub mod audit;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod format;
pub mod locks;
pub mod request;
pub mod resolver;
pub mod retry;
pub mod store;

mod attach;
mod merge;
mod policy;
mod relocate;

#[cfg(test)]
mod testing;

pub use config::Configuration;
pub use dispatcher::{CommandDispatcher, Dispatched};
pub use engine::Wrangler;
pub use error::{Result, WranglerError};
pub use store::{PostStore, PostWrite, StoreError, StoreResult};

/// Generate a new opaque identifier for posts and channels.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current time in unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
