//! Fortune Dispatch - deliver commands to the device
//!
//! - `CommandDispatcher`: one command, per-host retries, rediscovery on exhaustion
//! - `LogStreamer`: a persistent log connection that reconnects forever or up to a budget
//!
//! Both talk to the network only through `fortune_link::Connector` and
//! `fortune_discovery::Discover`, so they run against in-memory fakes in tests.

pub mod dispatcher;
pub mod error;
pub mod escalate;
pub mod queue;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{build_payload, CommandDispatcher, DispatchOutcome};
pub use error::DispatchError;
pub use escalate::Escalation;
pub use queue::CandidateQueue;
pub use stream::LogStreamer;
