use std::{
    io,
    net::Shutdown,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use vici_common::{connect_socket, Message, Packet, PacketStream, PacketType};

use crate::error::{Error, Result};

/// A request/response channel to the daemon
pub trait Session {
    /// Send `command` with `request` as payload and wait for its response
    fn command_request(&mut self, command: &str, request: Message) -> Result<Message>;

    /// Release the channel
    fn close(&mut self) -> Result<()>;
}

/// Opens a fresh [`Session`] for every operation
pub trait Connector {
    type Session: Session;

    fn connect(&self) -> Result<Self::Session>;
}

/// Session over the daemon's Unix control socket
pub struct ControlSession {
    stream:   PacketStream<UnixStream>,
    deadline: Option<Instant>,
    closed:   bool,
}

impl ControlSession {
    /// Connect to `socket_path`. With a `timeout`, the connect and every
    /// later read and write must finish before `now + timeout`.
    pub fn connect(socket_path: &Path, timeout: Option<Duration>) -> Result<Self> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let stream = connect_socket(socket_path, timeout)?;
        Ok(Self::with_deadline(stream, deadline))
    }

    fn with_deadline(stream: UnixStream, deadline: Option<Instant>) -> Self {
        Self {
            stream: PacketStream::new(stream),
            deadline,
            closed: false,
        }
    }

    /// Shrink socket timeouts to whatever is left of the session deadline
    fn arm_deadline(&mut self) -> Result<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::TimedOut,
                "session deadline exceeded",
            )));
        }

        let socket = self.stream.get_ref();
        socket.set_read_timeout(Some(remaining))?;
        socket.set_write_timeout(Some(remaining))?;
        Ok(())
    }
}

impl Session for ControlSession {
    fn command_request(&mut self, command: &str, request: Message) -> Result<Message> {
        if self.closed {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "session already closed",
            )));
        }

        self.arm_deadline()?;
        self.stream.send_packet(&Packet::request(command, request))?;

        self.arm_deadline()?;
        let response = self.stream.recv_packet()?;

        check_response(command, response)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.stream.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // peer already hung up
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::Transport(e)),
        }
    }
}

/// Turn a response packet into the response message, mapping daemon-side
/// failures to protocol errors
pub fn check_response(command: &str, response: Packet) -> Result<Message> {
    match response.kind {
        PacketType::CmdResponse => {}
        PacketType::CmdUnknown => {
            return Err(Error::Protocol(format!("unknown command '{command}'")));
        }
        other => {
            return Err(Error::Protocol(format!(
                "unexpected {other:?} packet in response to '{command}'"
            )));
        }
    }

    let message = response.message;
    if message.value_str("success") == Some("no") {
        let errmsg = message.value_str("errmsg").unwrap_or("no error message");
        return Err(Error::Protocol(format!(
            "command '{command}' failed: {errmsg}"
        )));
    }

    Ok(message)
}

/// Connects to the daemon's control socket
#[derive(Debug, Clone)]
pub struct SocketConnector {
    socket_path: PathBuf,
    timeout:     Option<Duration>,
}

impl SocketConnector {
    pub fn new<P: Into<PathBuf>>(socket_path: P, timeout: Option<Duration>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }
}

impl Connector for SocketConnector {
    type Session = ControlSession;

    fn connect(&self) -> Result<ControlSession> {
        ControlSession::connect(&self.socket_path, self.timeout)
    }
}
