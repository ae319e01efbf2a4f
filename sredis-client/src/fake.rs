//! In-memory stand-in for a set of Redis nodes, used by the unit tests.
//!
//! Nodes can be taken down and brought back; a node going down kills every
//! transport opened against it, like a real socket would. Each transport
//! keeps its own AUTH and MULTI state. Only the handful of commands the tests
//! need are understood.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sredis_common::{ClientError, ClientResult, Command, Reply};

use crate::transport::{Connector, Transport};

const KNOWN_COMMANDS: [&str; 6] = ["PING", "SET", "GET", "INCR", "DEL", "INFO"];

#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

#[derive(Default)]
struct ClusterState {
    nodes: HashMap<(String, u16), Node>,
    connect_attempts: usize,
    commands_seen: usize,
}

#[derive(Default)]
struct Node {
    up: bool,
    // Bumped whenever the node goes down; older transports are dead.
    epoch: u64,
    password: Option<String>,
    store: HashMap<Vec<u8>, Vec<u8>>,
    abort_next_exec: bool,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        FakeCluster::default()
    }

    pub(crate) fn add_node(&self, host: &str, port: u16) {
        let node = Node {
            up: true,
            ..Node::default()
        };
        self.state.lock().nodes.insert((host.to_string(), port), node);
    }

    pub(crate) fn set_up(&self, host: &str, port: u16, up: bool) {
        self.with_node(host, port, |node| {
            if node.up && !up {
                node.epoch += 1;
            }
            node.up = up;
        });
    }

    pub(crate) fn require_password(&self, host: &str, port: u16, password: &str) {
        self.with_node(host, port, |node| node.password = Some(password.to_string()));
    }

    /// Makes the next EXEC on the node report an aborted transaction.
    pub(crate) fn abort_next_exec(&self, host: &str, port: u16) {
        self.with_node(host, port, |node| node.abort_next_exec = true);
    }

    pub(crate) fn value(&self, host: &str, port: u16, key: &str) -> Option<Vec<u8>> {
        self.with_node(host, port, |node| node.store.get(key.as_bytes()).cloned())
            .flatten()
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub(crate) fn commands_seen(&self) -> usize {
        self.state.lock().commands_seen
    }

    fn with_node<R>(&self, host: &str, port: u16, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let mut state = self.state.lock();
        state.nodes.get_mut(&(host.to_string(), port)).map(f)
    }
}

impl Connector for FakeCluster {
    type Transport = FakeTransport;

    fn connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Option<Duration>,
    ) -> ClientResult<FakeTransport> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        let addr = (host.to_string(), port);
        match state.nodes.get(&addr) {
            Some(node) if node.up => Ok(FakeTransport {
                cluster: self.clone(),
                epoch: node.epoch,
                addr,
                outbox: VecDeque::new(),
                conn: ConnState::default(),
            }),
            _ => Err(io_error(std::io::ErrorKind::ConnectionRefused)),
        }
    }
}

pub(crate) struct FakeTransport {
    cluster: FakeCluster,
    addr: (String, u16),
    epoch: u64,
    outbox: VecDeque<Command>,
    conn: ConnState,
}

impl FakeTransport {
    fn check_alive(&self) -> ClientResult<()> {
        let state = self.cluster.state.lock();
        match state.nodes.get(&self.addr) {
            Some(node) if node.up && node.epoch == self.epoch => Ok(()),
            _ => Err(io_error(std::io::ErrorKind::ConnectionReset)),
        }
    }
}

impl Transport for FakeTransport {
    fn set_timeout(&mut self, _timeout: Option<Duration>) -> ClientResult<()> {
        Ok(())
    }

    fn append_command(&mut self, command: &Command) -> ClientResult<()> {
        self.check_alive()?;
        self.outbox.push_back(command.clone());
        Ok(())
    }

    fn get_reply(&mut self) -> ClientResult<Reply> {
        let cluster = self.cluster.clone();
        let mut state = cluster.state.lock();
        let node = match state.nodes.get_mut(&self.addr) {
            Some(node) if node.up && node.epoch == self.epoch => node,
            _ => return Err(io_error(std::io::ErrorKind::ConnectionReset)),
        };
        let command = self
            .outbox
            .pop_front()
            .ok_or(ClientError::Protocol("no reply pending"))?;
        let reply = self.conn.execute(node, &command);
        state.commands_seen += 1;
        Ok(reply)
    }
}

#[derive(Default)]
struct ConnState {
    authed: bool,
    multi: Option<MultiState>,
}

#[derive(Default)]
struct MultiState {
    queued: Vec<Command>,
    dirty: bool,
}

impl ConnState {
    fn execute(&mut self, node: &mut Node, command: &Command) -> Reply {
        let name = upper_name(command);
        if name == "AUTH" {
            let given = command.as_args().get(1);
            return match (&node.password, given) {
                (Some(expected), Some(given)) if expected.as_bytes() == &given[..] => {
                    self.authed = true;
                    ok()
                }
                (None, _) => Reply::error("ERR AUTH called without any password configured"),
                _ => Reply::error("WRONGPASS invalid username-password pair"),
            };
        }
        if node.password.is_some() && !self.authed {
            return Reply::error("NOAUTH Authentication required.");
        }

        match name.as_str() {
            "MULTI" => {
                if self.multi.is_some() {
                    return Reply::error("ERR MULTI calls can not be nested");
                }
                self.multi = Some(MultiState::default());
                ok()
            }
            "EXEC" => match self.multi.take() {
                None => Reply::error("ERR EXEC without MULTI"),
                Some(multi) => {
                    if multi.dirty {
                        Reply::error("EXECABORT Transaction discarded because of previous errors.")
                    } else if std::mem::take(&mut node.abort_next_exec) {
                        Reply::Nil
                    } else {
                        Reply::Array(multi.queued.iter().map(|queued| apply(node, queued)).collect())
                    }
                }
            },
            _ => match self.multi.as_mut() {
                Some(multi) => {
                    if !KNOWN_COMMANDS.contains(&name.as_str()) {
                        multi.dirty = true;
                        return unknown(&name);
                    }
                    multi.queued.push(command.clone());
                    Reply::Status(b"QUEUED".to_vec())
                }
                None => apply(node, command),
            },
        }
    }
}

fn apply(node: &mut Node, command: &Command) -> Reply {
    let args = command.as_args();
    let name = upper_name(command);
    match (name.as_str(), args.len()) {
        ("PING", 1) => Reply::Status(b"PONG".to_vec()),
        ("SET", 3) => {
            node.store.insert(args[1].to_vec(), args[2].to_vec());
            ok()
        }
        ("GET", 2) => node
            .store
            .get(&args[1][..])
            .map_or(Reply::Nil, |value| Reply::String(value.clone())),
        ("INCR", 2) => {
            let current = match node.store.get(&args[1][..]) {
                None => 0,
                Some(raw) => match String::from_utf8_lossy(raw).parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => return Reply::error("ERR value is not an integer or out of range"),
                },
            };
            let next = current + 1;
            node.store.insert(args[1].to_vec(), next.to_string().into_bytes());
            Reply::Integer(next)
        }
        ("DEL", len) if len >= 2 => {
            let removed = args[1..]
                .iter()
                .filter(|key| node.store.remove(&key[..]).is_some())
                .count();
            Reply::Integer(removed as i64)
        }
        ("INFO", _) => Reply::String(b"# Server\r\nredis_version:7.2.4\r\n".to_vec()),
        _ => unknown(&name),
    }
}

fn upper_name(command: &Command) -> String {
    String::from_utf8_lossy(command.name()).to_ascii_uppercase()
}

fn ok() -> Reply {
    Reply::Status(b"OK".to_vec())
}

fn unknown(name: &str) -> Reply {
    Reply::error(format!("ERR unknown command '{}'", name))
}

fn io_error(kind: std::io::ErrorKind) -> ClientError {
    ClientError::Io(std::io::Error::new(kind, "fake node unavailable"))
}
