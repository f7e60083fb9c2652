//! Fortune Link - wire protocols spoken by the device
//!
//! - Control channel: line-oriented plaintext over TCP, with an optional
//!   secret prompt and no end-of-response marker
//! - Update channel: a single UDP invitation used only to test readiness

pub mod error;
pub mod session;
pub mod transport;
pub mod update;

pub use error::LinkError;
pub use session::{is_auth_cue, ControlSession, Handshake};
pub use transport::{quick_probe, Connector, TcpConnector};
pub use update::{invitation, probe_update_channel, UpdateReply};
