//! # sredis Client
//!
//! Purpose: Provide one blocking, thread-safe Redis handle that survives node
//! failures by rotating through a table of candidate hosts.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Redis` hides failover, reconnects and pipeline
//!    bookkeeping behind a small command API.
//! 2. **Strategy Pattern**: The wire implementation is a `Connector`;
//!    `TcpConnector` is the default.
//! 3. **Errors As Replies**: Command-style calls always return a `Reply`;
//!    structural calls return `ClientResult`.
//! 4. **Explicit Locking**: Every call locks the handle, and `lock()` exposes
//!    the same calls for atomic multi-step sequences.

mod client;
mod config;
mod executor;
mod hosts;
mod session;
mod transaction;
mod transport;

#[cfg(test)]
mod fake;

pub use client::{Redis, SessionGuard};
pub use config::{ClientConfig, HostConfig};
pub use hosts::{HostEntry, HostTable, HOSTS_MAX};
pub use session::{ServerVersion, Session};
pub use transaction::MULTI_MAX;
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};

pub use sredis_common::{
    cmd, is_error, ClientError, ClientResult, Command, IntegerError, Reply, ReplyKind, ToArg,
};
