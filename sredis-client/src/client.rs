//! # Client Handle
//!
//! Purpose: Expose one thread-safe handle over the session state, with a
//! locking entry point for every operation.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Redis` hides host rotation, reconnects and
//!    pipeline bookkeeping behind plain method calls.
//! 2. **One Lock, Two Conventions**: Each `Redis` method holds the lock for
//!    the whole operation, reconnects included. `lock()` / `try_lock()` hand
//!    out the guarded `Session`, whose methods are the "already locked"
//!    variants for composing several steps atomically.
//! 3. **Non-Reentrant**: Calling a `Redis` method while holding a guard on the
//!    same handle deadlocks; use the guard's methods instead.
//!
//! ```no_run
//! use sredis_client::{cmd, Redis};
//!
//! let redis = Redis::new();
//! redis.add_host("127.0.0.1", 6379, None, None).unwrap();
//!
//! let mut session = redis.lock();
//! session.multi().unwrap();
//! session.append(&cmd!("INCR", "visits")).unwrap();
//! session.append(&cmd!("GET", "visits")).unwrap();
//! session.multi_exec().unwrap();
//! let reply = session.exec();
//! let visits = session.multi_reply(Some(&reply), 0);
//! # let _ = visits;
//! ```

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use sredis_common::{ClientResult, Command, Reply};

use crate::config::ClientConfig;
use crate::hosts::HostEntry;
use crate::session::{ServerVersion, Session};
use crate::transport::{Connector, TcpConnector};

/// Exclusive access to a handle's session, released on drop.
pub type SessionGuard<'a, C> = MutexGuard<'a, Session<C>>;

/// Resilient client handle over one logical connection.
pub struct Redis<C: Connector = TcpConnector> {
    session: Mutex<Session<C>>,
}

impl Redis<TcpConnector> {
    /// Creates a handle with an empty host table.
    pub fn new() -> Self {
        Redis::with_connector(TcpConnector)
    }

    /// Creates a handle for one host and connects to it.
    ///
    /// # Errors
    /// Fails when the host cannot be reached or rejects authentication.
    pub fn open(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Option<Duration>,
        op_timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let redis = Redis::new();
        {
            let mut session = redis.lock();
            session.add_host(host, port, connect_timeout, op_timeout)?;
            session.reopen()?;
        }
        Ok(redis)
    }

    /// Creates a handle from a configuration, without connecting.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        Redis::with_connector_and_config(TcpConnector, config)
    }
}

impl Default for Redis<TcpConnector> {
    fn default() -> Self {
        Redis::new()
    }
}

impl<C: Connector> Redis<C> {
    /// Creates a handle that opens transports through `connector`.
    pub fn with_connector(connector: C) -> Self {
        Redis {
            session: Mutex::new(Session::new(connector)),
        }
    }

    /// Creates a handle from a configuration using `connector`.
    ///
    /// Hosts are registered in order; nothing is connected yet.
    ///
    /// # Errors
    /// Returns `ClientError::HostTableFull` when the config lists more hosts
    /// than `host_capacity`.
    pub fn with_connector_and_config(connector: C, config: ClientConfig) -> ClientResult<Self> {
        let mut session =
            Session::with_capacity(connector, config.host_capacity, config.multi_capacity);
        session.set_password(config.password.as_deref());
        for host in &config.hosts {
            session.add_host(
                host.host.clone(),
                host.port,
                host.connect_timeout(),
                host.op_timeout(),
            )?;
        }
        debug!(hosts = config.hosts.len(), "client configured");
        Ok(Redis {
            session: Mutex::new(session),
        })
    }

    /// Blocks until the handle is free and returns the guarded session.
    pub fn lock(&self) -> SessionGuard<'_, C> {
        self.session.lock()
    }

    /// Returns the guarded session, or `None` if another caller holds it.
    pub fn try_lock(&self) -> Option<SessionGuard<'_, C>> {
        self.session.try_lock()
    }

    pub fn set_password(&self, password: Option<&str>) {
        self.lock().set_password(password);
    }

    pub fn add_host(
        &self,
        host: impl Into<String>,
        port: u16,
        connect_timeout: Option<Duration>,
        op_timeout: Option<Duration>,
    ) -> ClientResult<usize> {
        self.lock().add_host(host, port, connect_timeout, op_timeout)
    }

    pub fn delete_host(&self, slot: usize) -> ClientResult<()> {
        self.lock().delete_host(slot)
    }

    /// Snapshot of the occupied host slots and their counters.
    pub fn host_stats(&self) -> Vec<(usize, HostEntry)> {
        self.lock()
            .hosts()
            .iter()
            .map(|(slot, entry)| (slot, entry.clone()))
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn close(&self) {
        self.lock().close();
    }

    pub fn shutdown(&self) {
        self.lock().shutdown();
    }

    pub fn reopen(&self) -> ClientResult<()> {
        self.lock().reopen()
    }

    pub fn command(&self, command: &Command) -> Reply {
        self.lock().command(command)
    }

    pub fn command_fast(&self, command: &Command) -> Reply {
        self.lock().command_fast(command)
    }

    pub fn append(&self, command: &Command) -> ClientResult<()> {
        self.lock().append(command)
    }

    pub fn exec(&self) -> Reply {
        self.lock().exec()
    }

    pub fn pipeline_depth(&self) -> usize {
        self.lock().pipeline_depth()
    }

    pub fn multi(&self) -> ClientResult<()> {
        self.lock().multi()
    }

    pub fn multi_exec(&self) -> ClientResult<()> {
        self.lock().multi_exec()
    }

    /// See [`Session::multi_reply`].
    ///
    /// Another thread starting a new pipeline between `exec` and this call
    /// resets the recorded boundaries; hold one guard across both to avoid it.
    pub fn multi_reply<'r>(&self, reply: Option<&'r Reply>, index: usize) -> Option<&'r Reply> {
        self.lock().multi_reply(reply, index)
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transaction_count()
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.lock().server_version()
    }
}
