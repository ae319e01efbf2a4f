//! # Error Types
//!
//! Errors shared by the codec and the client façade.
//!
//! Structural operations (host table, reopen, queueing) return
//! `ClientResult<T>`. Command-style operations fold a `ClientError` into an
//! error-tagged `Reply` instead, so callers only inspect one value.

use thiserror::Error;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client and its transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Host and port did not resolve to any socket address.
    #[error("invalid address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },

    /// Server rejected the AUTH command.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No transport is open, or the last operation on it failed.
    #[error("not connected")]
    NotConnected,

    /// The host table has no occupied slot.
    #[error("no hosts registered")]
    NoHosts,

    /// Every registered host was tried and none accepted a connection.
    #[error("all {tried} registered hosts are unreachable")]
    HostsExhausted { tried: usize },

    /// Every slot of the host table is occupied.
    #[error("host table is full ({capacity} slots)")]
    HostTableFull { capacity: usize },

    /// Slot index is out of range or the slot is empty.
    #[error("host slot {0} is out of range or empty")]
    InvalidSlot(usize),

    /// The transaction-boundary array is full for the current pipeline.
    #[error("too many transactions in one pipeline (limit {limit})")]
    TransactionLimit { limit: usize },

    /// MULTI issued while another MULTI is still open.
    #[error("MULTI calls can not be nested")]
    NestedTransaction,

    /// EXEC issued without an open MULTI.
    #[error("EXEC without MULTI")]
    NoTransaction,

    /// A blocking command was issued while pipelined replies are unread.
    #[error("{pending} pipelined replies are still unread")]
    PipelinePending { pending: usize },

    /// The pipeline was drained while a MULTI block was still open.
    #[error("transaction opened by MULTI is not closed")]
    TransactionOpen,
}

impl ClientError {
    /// Returns true when the error leaves the transport unusable.
    ///
    /// Misuse errors (`PipelinePending`, `NestedTransaction`, ...) are
    /// detected before anything touches the wire and keep the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::InvalidAddress { .. }
                | ClientError::Auth(_)
                | ClientError::NotConnected
                | ClientError::NoHosts
                | ClientError::HostsExhausted { .. }
        )
    }
}

/// Failure kinds of best-effort integer coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegerError {
    /// Reply is not numeric, or has a tag that cannot hold a number.
    #[error("invalid argument")]
    InvalidArgument,
    /// Reply is numeric but does not fit in an `i64`.
    #[error("numerical result out of range")]
    OutOfRange,
}
