// sredis-common - Shared reply, command and codec types for sredis
//
// This crate holds everything that does not touch a socket: the reply tree,
// the command builder, the RESP2 codec and the error types.

pub mod command;
pub mod error;
pub mod reply;
pub mod resp;

// Re-export for convenience
pub use command::{Command, ToArg};
pub use error::{ClientError, ClientResult, IntegerError};
pub use reply::{is_error, Reply, ReplyKind};
