//! Watchman client: socket discovery, the subscribe handshake and the
//! change-push decode loop.

mod error;
pub mod locator;
pub mod protocol;
pub mod session;

pub use error::WatchError;
pub use locator::{parse_sockname, DaemonLocator};
pub use protocol::DaemonMessage;
pub use session::{DrainReport, SessionState, StopReason, WatchSession};
