//! # Command Execution
//!
//! Single commands and pipelined batches on top of the session's transport.
//!
//! Reconnect policy: `command` and `append` reopen at most once per call when
//! the transport is missing or broken; `command_fast` never reopens. A failure
//! after that point marks the transport broken and is returned to the caller;
//! the command is not re-sent, since it may already have reached the server.

use tracing::{debug, warn};

use sredis_common::{ClientError, ClientResult, Command, Reply};

use crate::session::{Pending, Session};
use crate::transport::{Connector, Transport};

impl<C: Connector> Session<C> {
    /// Sends `command` and waits for its reply, reconnecting first if needed.
    ///
    /// Failures come back as an error-tagged reply; check with `is_error`.
    pub fn command(&mut self, command: &Command) -> Reply {
        if let Err(err) = self.check_no_pipeline() {
            return Reply::from(err);
        }
        if !self.is_connected() {
            if let Err(err) = self.reopen() {
                return Reply::from(err);
            }
        }
        self.dispatch(command)
    }

    /// Like `command` but fails immediately when the transport is unusable.
    pub fn command_fast(&mut self, command: &Command) -> Reply {
        if let Err(err) = self.check_no_pipeline() {
            return Reply::from(err);
        }
        if !self.is_connected() {
            return Reply::from(ClientError::NotConnected);
        }
        self.dispatch(command)
    }

    /// Queues `command` for the next `exec` without reading its reply.
    ///
    /// Inside a MULTI block the command is queued as part of the transaction.
    pub fn append(&mut self, command: &Command) -> ClientResult<()> {
        self.begin_pipeline();
        let kind = if self.in_multi {
            Pending::Queued
        } else {
            Pending::Command
        };
        self.queue(command, kind)
    }

    /// Reads every queued reply and returns them as one array.
    ///
    /// The array holds one element per plain appended command and one per
    /// transaction, in queue order; see `multi_reply`. The pipeline depth is
    /// zero afterwards, and an empty pipeline yields an empty array.
    pub fn exec(&mut self) -> Reply {
        if self.in_multi {
            return Reply::from(ClientError::TransactionOpen);
        }
        if self.pending.is_empty() {
            return Reply::Array(Vec::new());
        }

        let pending = std::mem::take(&mut self.pending);
        let result = match self.conn.as_mut() {
            Some(transport) if !self.broken => drain(transport, &pending),
            _ => Err(ClientError::NotConnected),
        };

        match result {
            Ok(replies) => {
                debug!(
                    queued = pending.len(),
                    returned = replies.len(),
                    "pipeline drained"
                );
                Reply::Array(replies)
            }
            Err(err) => {
                self.transactions.clear();
                self.mark_broken(&err);
                warn!(queued = pending.len(), error = %err, "pipeline drain failed");
                Reply::from(err)
            }
        }
    }

    /// Number of replies queued and not yet read.
    pub fn pipeline_depth(&self) -> usize {
        self.pending.len()
    }

    /// Queues one command, reopening the transport first if needed.
    ///
    /// Only an idle pipeline may reopen: replies already queued on a lost
    /// transport can never be read, so in that case the pipeline is dropped
    /// and the call fails.
    pub(crate) fn queue(&mut self, command: &Command, kind: Pending) -> ClientResult<()> {
        if !self.is_connected() {
            if !self.pending.is_empty() || self.in_multi {
                self.abandon_pipeline();
                return Err(ClientError::NotConnected);
            }
            self.reopen()?;
        }

        let result = match self.conn.as_mut() {
            Some(transport) => transport.append_command(command),
            None => Err(ClientError::NotConnected),
        };
        match result {
            Ok(()) => {
                self.pending.push(kind);
                debug!(%command, depth = self.pending.len(), "command queued");
                Ok(())
            }
            Err(err) => {
                self.mark_broken(&err);
                self.abandon_pipeline();
                Err(err)
            }
        }
    }

    /// Resets transaction boundaries when a new pipeline starts.
    pub(crate) fn begin_pipeline(&mut self) {
        if self.pending.is_empty() && !self.in_multi {
            self.transactions.clear();
        }
    }

    fn check_no_pipeline(&self) -> ClientResult<()> {
        if self.in_multi {
            return Err(ClientError::TransactionOpen);
        }
        if !self.pending.is_empty() {
            return Err(ClientError::PipelinePending {
                pending: self.pending.len(),
            });
        }
        Ok(())
    }

    fn dispatch(&mut self, command: &Command) -> Reply {
        let result = match self.conn.as_mut() {
            Some(transport) => transport.send_command(command),
            None => Err(ClientError::NotConnected),
        };
        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%command, error = %err, "command failed");
                self.mark_broken(&err);
                Reply::from(err)
            }
        }
    }
}

/// Reads one reply per pending entry and keeps the ones callers asked for.
fn drain<T: Transport>(transport: &mut T, pending: &[Pending]) -> ClientResult<Vec<Reply>> {
    let kept = pending.iter().filter(|kind| kind.is_kept()).count();
    let mut replies = Vec::with_capacity(kept);
    for &kind in pending {
        let reply = transport.get_reply()?;
        if kind.is_kept() {
            replies.push(reply);
        } else if reply.is_error() {
            // The matching EXEC reply carries the outcome (EXECABORT).
            debug!(?kind, "transaction command rejected while queueing");
        }
    }
    Ok(replies)
}
