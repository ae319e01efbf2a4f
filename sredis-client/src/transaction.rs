//! # Transactions
//!
//! MULTI/EXEC framing inside a pipeline.
//!
//! A transaction queued with `multi` .. `multi_exec` occupies exactly one
//! element of the combined reply returned by `exec`: the EXEC result. The
//! MULTI acknowledgement and the per-command QUEUED acknowledgements are read
//! and dropped while draining. `multi` records where that element will land so
//! `multi_reply` can find the n-th transaction among plain pipelined replies.
//!
//! ```text
//! append(GET a)  multi()  append(SET k v)  append(GET k)  multi_exec()  append(PING)
//!      │                                                       │             │
//!      ▼                                                       ▼             ▼
//! exec() ──► [ "a-value",                         [OK, "v"],               PONG ]
//!               0                                  1 = transactions[0]      2
//! ```

use tracing::warn;

use sredis_common::{cmd, ClientError, ClientResult, Reply};

use crate::session::{Pending, Session};
use crate::transport::Connector;

/// Default number of transactions per pipeline.
pub const MULTI_MAX: usize = 16;

impl<C: Connector> Session<C> {
    /// Queues `MULTI` and records the start of a transaction.
    ///
    /// # Errors
    /// - `ClientError::NestedTransaction` if a MULTI is already open.
    /// - `ClientError::TransactionLimit` when the pipeline already holds the
    ///   maximum number of transactions; nothing is queued and earlier
    ///   commands stay queued.
    /// - Connection errors from queueing.
    pub fn multi(&mut self) -> ClientResult<()> {
        if self.in_multi {
            return Err(ClientError::NestedTransaction);
        }
        self.begin_pipeline();
        if self.transactions.len() >= self.multi_capacity {
            warn!(limit = self.multi_capacity, "transaction boundary array is full");
            return Err(ClientError::TransactionLimit {
                limit: self.multi_capacity,
            });
        }

        self.queue(&cmd!("MULTI"), Pending::Multi)?;
        let position = self.pending.iter().filter(|kind| kind.is_kept()).count();
        self.transactions.push(position);
        self.in_multi = true;
        Ok(())
    }

    /// Queues `EXEC`, closing the open transaction.
    ///
    /// The transaction runs when the pipeline is drained with `exec`.
    pub fn multi_exec(&mut self) -> ClientResult<()> {
        if !self.in_multi {
            return Err(ClientError::NoTransaction);
        }
        self.queue(&cmd!("EXEC"), Pending::Exec)?;
        self.in_multi = false;
        Ok(())
    }

    /// Returns the `index`-th transaction's result inside `reply`.
    ///
    /// `reply` is the combined reply of the last `exec`. The result is an
    /// array on commit and nil when the server aborted the transaction (e.g.
    /// a watched key changed). Returns `None` for a missing reply or an index
    /// outside the recorded transactions.
    pub fn multi_reply<'r>(&self, reply: Option<&'r Reply>, index: usize) -> Option<&'r Reply> {
        let position = *self.transactions.get(index)?;
        reply?.get(position)
    }

    /// Number of transactions recorded for the current or last pipeline.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}
