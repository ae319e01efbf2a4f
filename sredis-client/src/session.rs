//! # Session State and Connection Management
//!
//! Purpose: Own the single transport of a handle and (re)open it against the
//! host table, rotating to the next host on failure.
//!
//! `Session` is the state behind the handle's mutex. Every method here, and
//! in the `executor` and `transaction` modules, assumes the caller already
//! holds that lock; the `Redis` wrapper in `client` provides the locking
//! entry points.
//!
//! ## Design Principles
//! 1. **Lazy Reconnect**: A failed operation only marks the transport broken;
//!    the next operation that needs the wire reopens it.
//! 2. **Bounded Failover**: One `reopen` tries every occupied slot at most
//!    once, starting from the current one.
//! 3. **Counters Per Host**: Each attempt bumps the host's success or failure
//!    counter so callers can inspect host health.

use std::time::Duration;

use tracing::{debug, info, warn};

use sredis_common::{cmd, ClientError, ClientResult, Reply};

use crate::hosts::{HostEntry, HostTable, HOSTS_MAX};
use crate::transaction::MULTI_MAX;
use crate::transport::{Connector, Transport};

/// Server version reported by `INFO server`, major and minor only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
}

impl ServerVersion {
    /// Extracts `redis_version:MAJOR.MINOR[.PATCH]` from an INFO payload.
    pub fn from_info(info: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(info).ok()?;
        let version = text
            .lines()
            .find_map(|line| line.trim().strip_prefix("redis_version:"))?;
        let mut parts = version.split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts.next()?.trim().parse().ok()?;
        Some(ServerVersion { major, minor })
    }
}

/// Reply kinds expected back from the wire, in queue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    /// Plain pipelined command; its reply is kept.
    Command,
    /// MULTI acknowledgement; consumed.
    Multi,
    /// QUEUED acknowledgement of a command inside MULTI; consumed.
    Queued,
    /// EXEC result; kept as the transaction's single element.
    Exec,
}

impl Pending {
    /// Returns true when the reply lands in the combined exec reply.
    pub(crate) fn is_kept(self) -> bool {
        matches!(self, Pending::Command | Pending::Exec)
    }
}

/// Connection, host table and pipeline state of one handle.
pub struct Session<C: Connector> {
    pub(crate) connector: C,
    pub(crate) conn: Option<C::Transport>,
    /// Set when the last operation on `conn` failed.
    pub(crate) broken: bool,
    pub(crate) hosts: HostTable,
    pub(crate) password: Option<String>,
    pub(crate) version: Option<ServerVersion>,
    /// Replies still to be read by `exec`; its length is the pipeline depth.
    pub(crate) pending: Vec<Pending>,
    /// Position of each transaction's result in the combined exec reply.
    pub(crate) transactions: Vec<usize>,
    pub(crate) multi_capacity: usize,
    pub(crate) in_multi: bool,
}

impl<C: Connector> Session<C> {
    /// Creates a disconnected session with default capacities.
    pub fn new(connector: C) -> Self {
        Session::with_capacity(connector, HOSTS_MAX, MULTI_MAX)
    }

    /// Creates a disconnected session with explicit table sizes.
    pub fn with_capacity(connector: C, host_capacity: usize, multi_capacity: usize) -> Self {
        Session {
            connector,
            conn: None,
            broken: false,
            hosts: HostTable::with_capacity(host_capacity),
            password: None,
            version: None,
            pending: Vec::new(),
            transactions: Vec::new(),
            multi_capacity: multi_capacity.max(1),
            in_multi: false,
        }
    }

    /// Registers a host and returns its slot index.
    pub fn add_host(
        &mut self,
        host: impl Into<String>,
        port: u16,
        connect_timeout: Option<Duration>,
        op_timeout: Option<Duration>,
    ) -> ClientResult<usize> {
        let entry = HostEntry::new(host, port, connect_timeout, op_timeout);
        let slot = self.hosts.add(entry)?;
        debug!(slot, port, "host added");
        Ok(slot)
    }

    /// Removes the host in `slot`.
    ///
    /// An open connection made from that entry stays open.
    pub fn delete_host(&mut self, slot: usize) -> ClientResult<()> {
        let entry = self.hosts.delete(slot)?;
        debug!(slot, host = entry.host(), port = entry.port(), "host deleted");
        Ok(())
    }

    pub fn hosts(&self) -> &HostTable {
        &self.hosts
    }

    /// Stores the password used on the next (re)open; `None` disables AUTH.
    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = password.map(str::to_owned);
    }

    /// Returns true when a transport is open and its last operation succeeded.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some() && !self.broken
    }

    /// Releases the transport. Safe to call on a closed session.
    pub fn close(&mut self) {
        self.abandon_pipeline();
        if self.conn.take().is_some() {
            debug!("connection closed");
        }
        self.broken = false;
        self.version = None;
    }

    /// Closes the transport and forgets every host.
    pub fn shutdown(&mut self) {
        self.close();
        self.hosts.clear();
        info!("session shut down; host table cleared");
    }

    /// Closes the current transport and connects to the first reachable host.
    ///
    /// Starts at the current slot (or the next occupied one) and tries each
    /// occupied slot once.
    ///
    /// # Errors
    /// - `ClientError::NoHosts` when the table is empty.
    /// - `ClientError::HostsExhausted` when every host failed.
    pub fn reopen(&mut self) -> ClientResult<()> {
        self.close();

        let occupied = self.hosts.len();
        let mut slot = match self.hosts.current_or_next() {
            Some(slot) => slot,
            None => {
                warn!("reopen requested with an empty host table");
                return Err(ClientError::NoHosts);
            }
        };

        for attempt in 0..occupied {
            if attempt > 0 {
                slot = match self.hosts.advance(slot) {
                    Some(next) => next,
                    None => break,
                };
            }

            match self.connect_slot(slot) {
                Ok(transport) => {
                    self.hosts.set_current(slot);
                    if let Some(entry) = self.hosts.get_mut(slot) {
                        entry.record_success();
                        info!(slot, host = entry.host(), port = entry.port(), "connected");
                    }
                    self.conn = Some(transport);
                    return Ok(());
                }
                Err(err) => {
                    if let Some(entry) = self.hosts.get_mut(slot) {
                        entry.record_failure();
                        warn!(
                            slot,
                            host = entry.host(),
                            port = entry.port(),
                            error = %err,
                            "connection attempt failed"
                        );
                    }
                }
            }
        }

        // Leave the cursor on the next candidate so the following reopen
        // does not start from the host that failed last.
        if let Some(next) = self.hosts.advance(slot) {
            self.hosts.set_current(next);
        }
        warn!(tried = occupied, "every registered host is unreachable");
        Err(ClientError::HostsExhausted { tried: occupied })
    }

    fn connect_slot(&self, slot: usize) -> ClientResult<C::Transport> {
        let entry = self.hosts.get(slot).ok_or(ClientError::InvalidSlot(slot))?;
        let mut transport =
            self.connector
                .connect(entry.host(), entry.port(), entry.connect_timeout())?;
        transport.set_timeout(entry.op_timeout())?;
        if let Some(password) = &self.password {
            transport.auth(password)?;
        }
        Ok(transport)
    }

    /// Returns the server version, querying `INFO server` on first use.
    ///
    /// The value is cached until the connection is closed or reopened.
    pub fn server_version(&mut self) -> Option<ServerVersion> {
        if self.version.is_none() {
            match self.command(&cmd!("INFO", "server")) {
                Reply::String(info) | Reply::Status(info) => {
                    self.version = ServerVersion::from_info(&info);
                }
                other => debug!(kind = %other.kind(), "INFO did not return a payload"),
            }
        }
        self.version
    }

    /// Marks the transport unusable after a failed operation.
    pub(crate) fn mark_broken(&mut self, err: &ClientError) {
        if err.is_connection_error() {
            self.broken = true;
            warn!(error = %err, "connection marked unusable");
        }
    }

    /// Drops pipeline bookkeeping whose replies can no longer be read.
    pub(crate) fn abandon_pipeline(&mut self) {
        if !self.pending.is_empty() || self.in_multi {
            warn!(
                pending = self.pending.len(),
                in_multi = self.in_multi,
                "discarding queued commands"
            );
            self.pending.clear();
            self.transactions.clear();
            self.in_multi = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCluster;

    fn session_with(cluster: &FakeCluster, ports: &[u16]) -> Session<FakeCluster> {
        let mut session = Session::new(cluster.clone());
        for &port in ports {
            session.add_host("node", port, None, None).unwrap();
        }
        session
    }

    #[test]
    fn reopen_fails_over_to_next_host() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        cluster.add_node("node", 2);
        cluster.set_up("node", 1, false);

        let mut session = session_with(&cluster, &[1, 2]);
        session.reopen().unwrap();

        assert!(session.is_connected());
        assert_eq!(session.hosts().current(), 1);
        assert_eq!(session.hosts().get(0).unwrap().failure(), 1);
        assert_eq!(session.hosts().get(1).unwrap().success(), 1);
    }

    #[test]
    fn reopen_tries_each_host_once_then_fails() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        cluster.add_node("node", 2);
        cluster.set_up("node", 1, false);
        cluster.set_up("node", 2, false);

        let mut session = session_with(&cluster, &[1, 2]);
        let err = session.reopen().unwrap_err();

        assert!(matches!(err, ClientError::HostsExhausted { tried: 2 }));
        assert!(!session.is_connected());
        assert_eq!(cluster.connect_attempts(), 2);
        assert!(session.hosts().iter().all(|(_, host)| host.failure() == 1));
    }

    #[test]
    fn reopen_with_empty_table_fails() {
        let mut session = Session::new(FakeCluster::new());
        assert!(matches!(session.reopen(), Err(ClientError::NoHosts)));
    }

    #[test]
    fn reopen_skips_deleted_current_slot() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        cluster.add_node("node", 2);

        let mut session = session_with(&cluster, &[1, 2]);
        session.delete_host(0).unwrap();
        session.reopen().unwrap();
        assert_eq!(session.hosts().current(), 1);
    }

    #[test]
    fn deleting_connected_host_keeps_live_connection() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        cluster.add_node("node", 2);

        let mut session = session_with(&cluster, &[1, 2]);
        session.reopen().unwrap();
        assert_eq!(session.hosts().current(), 0);
        let attempts = cluster.connect_attempts();

        session.delete_host(0).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.command(&cmd!("PING")), Reply::Status(b"PONG".to_vec()));
        assert_eq!(cluster.connect_attempts(), attempts);

        // Once the old node goes away, the next reconnect uses slot 1.
        cluster.set_up("node", 1, false);
        assert!(session.command(&cmd!("PING")).is_error());
        assert_eq!(session.command(&cmd!("PING")), Reply::Status(b"PONG".to_vec()));
        assert_eq!(session.hosts().current(), 1);
        assert_eq!(cluster.connect_attempts(), attempts + 1);
    }

    #[test]
    fn reopen_authenticates_when_password_set() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        cluster.add_node("node", 2);
        cluster.require_password("node", 1, "other");
        cluster.require_password("node", 2, "secret");

        let mut session = session_with(&cluster, &[1, 2]);
        session.set_password(Some("secret"));
        session.reopen().unwrap();

        // Wrong password on the first node counts as a failed attempt.
        assert_eq!(session.hosts().get(0).unwrap().failure(), 1);
        assert_eq!(session.hosts().current(), 1);
        assert_eq!(session.command(&cmd!("PING")), Reply::Status(b"PONG".to_vec()));
    }

    #[test]
    fn shutdown_clears_hosts() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);

        let mut session = session_with(&cluster, &[1]);
        session.reopen().unwrap();
        session.shutdown();

        assert!(!session.is_connected());
        assert!(session.hosts().is_empty());
        assert!(session.command(&cmd!("PING")).is_error());
    }

    #[test]
    fn close_is_idempotent() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        let mut session = session_with(&cluster, &[1]);
        session.close();
        session.reopen().unwrap();
        session.close();
        session.close();
        assert!(!session.is_connected());
        assert_eq!(session.hosts().len(), 1);
    }

    #[test]
    fn server_version_is_parsed_and_cached() {
        let cluster = FakeCluster::new();
        cluster.add_node("node", 1);
        let mut session = session_with(&cluster, &[1]);

        let version = session.server_version().unwrap();
        assert_eq!(version, ServerVersion { major: 7, minor: 2 });
        let sent = cluster.commands_seen();
        assert_eq!(session.server_version(), Some(version));
        assert_eq!(cluster.commands_seen(), sent);
    }

    #[test]
    fn parses_version_from_info_payload() {
        let info = b"# Server\r\nredis_mode:standalone\r\nredis_version:6.0.16\r\n";
        assert_eq!(
            ServerVersion::from_info(info),
            Some(ServerVersion { major: 6, minor: 0 })
        );
        assert_eq!(ServerVersion::from_info(b"# Server\r\n"), None);
    }
}
