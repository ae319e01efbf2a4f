//! # Transport Layer
//!
//! Purpose: Define the primitive request/response interface the handle drives,
//! and provide the default blocking TCP implementation.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: `Session` is generic over a `Connector`, so tests
//!    and embedders can swap the wire implementation.
//! 2. **Buffered Appends**: `append_command` only encodes into a write buffer;
//!    the buffer is flushed by the next `get_reply`, so a pipeline costs one
//!    write syscall.
//! 3. **Buffer Reuse**: Each connection keeps its own line and write buffers.
//! 4. **Fail Fast**: Any IO or framing error is returned immediately; the
//!    caller decides whether the connection is still usable.

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;
use sredis_common::resp::read_reply;
use sredis_common::{ClientError, ClientResult, Command, Reply};

/// An open connection to one server.
pub trait Transport: Send {
    /// Applies a read/write timeout to every following operation.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> ClientResult<()>;

    /// Queues a command without waiting for its reply.
    fn append_command(&mut self, command: &Command) -> ClientResult<()>;

    /// Flushes queued commands and reads the next reply, in queue order.
    fn get_reply(&mut self) -> ClientResult<Reply>;

    /// Sends one command and blocks for its reply.
    fn send_command(&mut self, command: &Command) -> ClientResult<Reply> {
        self.append_command(command)?;
        self.get_reply()
    }

    /// Authenticates the connection with `AUTH password`.
    ///
    /// # Errors
    /// Returns `ClientError::Auth` when the server answers with an error.
    fn auth(&mut self, password: &str) -> ClientResult<()> {
        match self.send_command(&Command::new("AUTH").arg(password))? {
            Reply::Error(message) => Err(ClientError::Auth(
                String::from_utf8_lossy(&message).into_owned(),
            )),
            _ => Ok(()),
        }
    }
}

/// Opens transports to a host.
pub trait Connector: Send {
    type Transport: Transport;

    /// Connects to `host:port`, giving up after `timeout` when one is set.
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> ClientResult<Self::Transport>;
}

/// Connector producing blocking TCP transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> ClientResult<TcpTransport> {
        TcpTransport::connect(host, port, timeout)
    }
}

/// Single TCP connection with reusable buffers.
pub struct TcpTransport {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
}

impl TcpTransport {
    /// Connects to the first resolved address of `host:port` that accepts.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> ClientResult<Self> {
        let stream = connect_stream(host, port, timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        Ok(TcpTransport {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
        })
    }

    fn flush_pending(&mut self) -> ClientResult<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let stream = self.reader.get_mut();
        let result = stream.write_all(&self.write_buf).and_then(|()| stream.flush());
        // A partial write leaves the stream desynchronised either way.
        self.write_buf.clear();
        result.map_err(ClientError::from)
    }
}

impl Transport for TcpTransport {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> ClientResult<()> {
        let stream = self.reader.get_ref();
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        Ok(())
    }

    fn append_command(&mut self, command: &Command) -> ClientResult<()> {
        command.write_to(&mut self.write_buf);
        Ok(())
    }

    fn get_reply(&mut self) -> ClientResult<Reply> {
        self.flush_pending()?;
        read_reply(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(host: &str, port: u16, timeout: Option<Duration>) -> ClientResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| invalid_address(host, port))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.map_or_else(|| invalid_address(host, port), ClientError::Io))
}

fn invalid_address(host: &str, port: u16) -> ClientError {
    ClientError::InvalidAddress {
        host: host.to_string(),
        port,
    }
}
