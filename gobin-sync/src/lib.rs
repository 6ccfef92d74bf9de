//! # gobin-sync
//!
//! Remote side of the pipeline.
//!
//! [`SyncDispatcher`] drains change events into a [`RemoteSync`] session;
//! [`SshRemote`] is the OpenSSH implementation used in production.

pub mod dispatcher;
pub mod error;
pub mod plan;
pub mod remote;
pub mod ssh;

pub use dispatcher::{DispatchReport, DispatchStop, SyncDispatcher};
pub use error::SyncError;
pub use remote::{ApplySummary, RemoteSync};
pub use ssh::{SshRemote, SshTarget};
