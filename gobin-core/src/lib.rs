//! gobin core library — domain types, the change channel, the terminate
//! broadcast and run configuration.
//!
//! - [`types`] — change events as the watch daemon reports them
//! - [`channel`] — ordered watcher → dispatcher queue
//! - [`shutdown`] — one-shot terminate broadcast
//! - [`config`] — layered configuration, see [`config::resolve`]
//! - [`error`] — [`ConfigError`]

pub mod channel;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod types;

pub use channel::{change_channel, ChangeReceiver, ChangeSender, CHANGE_CHANNEL_CAPACITY};
pub use config::{Config, ConfigLayer};
pub use error::ConfigError;
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use types::{ChangeEvent, FileChange, FileType, SubscriptionId, WatchHandshake};
