//! In-memory control-socket responder
//!
//! Speaks the daemon's control protocol on a Unix socket and keeps loaded
//! connection definitions in memory. It answers `get-conns`, `load-conn` and
//! `unload-conn` the way the IKE daemon does, without negotiating anything,
//! which makes it a drop-in peer for tests and local development.

use std::{
    collections::BTreeMap,
    io,
    net::Shutdown,
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use vici_common::{
    bind_socket, stream::is_disconnect, Element, Message, Packet, PacketStream, PacketType,
};

/// Connection definitions loaded into the responder, keyed by name
#[derive(Debug, Default)]
pub struct ConnStore {
    conns: BTreeMap<String, Message>,
}

impl ConnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded connection names, sorted
    pub fn names(&self) -> Vec<String> {
        self.conns.keys().cloned().collect()
    }

    /// Definition stored for `name`
    pub fn get(&self, name: &str) -> Option<&Message> {
        self.conns.get(name)
    }

    /// Answer one request packet
    pub fn handle(&mut self, packet: Packet) -> Packet {
        match packet.kind {
            PacketType::CmdRequest => {
                let command = packet.name.unwrap_or_default();
                tracing::info!("Processing command '{}'", command);
                match command.as_str() {
                    "get-conns" => self.get_conns(),
                    "load-conn" => self.load_conn(packet.message),
                    "unload-conn" => self.unload_conn(&packet.message),
                    other => {
                        tracing::warn!("Unknown command '{}'", other);
                        Packet::bare(PacketType::CmdUnknown)
                    }
                }
            }
            PacketType::EventRegister | PacketType::EventUnregister => {
                tracing::warn!("Event {:?} is not supported", packet.name);
                Packet::bare(PacketType::EventUnknown)
            }
            other => {
                tracing::warn!("Unexpected {:?} packet from client", other);
                Packet::bare(PacketType::CmdUnknown)
            }
        }
    }

    fn get_conns(&self) -> Packet {
        let mut msg = Message::new();
        msg.set_list("conns", self.names());
        Packet::response(msg)
    }

    fn load_conn(&mut self, request: Message) -> Packet {
        let mut loaded = Vec::new();
        for (name, element) in request.iter() {
            match element {
                Element::Section(conn) => loaded.push((name.to_string(), conn.clone())),
                _ => return failure(format!("invalid connection '{name}': expected a section")),
            }
        }

        for (name, conn) in loaded {
            if self.conns.insert(name.clone(), conn).is_some() {
                tracing::info!("Replaced connection '{}'", name);
            } else {
                tracing::info!("Added connection '{}'", name);
            }
        }
        success()
    }

    fn unload_conn(&mut self, request: &Message) -> Packet {
        let Some(name) = request.value_str("name") else {
            return failure("missing connection name to unload".to_string());
        };

        match self.conns.remove(name) {
            Some(_) => {
                tracing::info!("Removed connection '{}'", name);
                success()
            }
            None => failure(format!("connection '{name}' not found for unloading")),
        }
    }
}

fn success() -> Packet {
    Packet::response(Message::new().with_value("success", "yes"))
}

fn failure(errmsg: String) -> Packet {
    tracing::warn!("Request failed: {}", errmsg);
    Packet::response(
        Message::new()
            .with_value("success", "no")
            .with_value("errmsg", errmsg),
    )
}

/// A responder bound to a socket path
pub struct Responder {
    listener:    UnixListener,
    socket_path: PathBuf,
    store:       Arc<Mutex<ConnStore>>,
}

impl Responder {
    /// Bind to `socket_path`, replacing a stale socket file
    pub fn bind<P: Into<PathBuf>>(socket_path: P) -> Result<Self> {
        let socket_path = socket_path.into();
        let listener = bind_socket(&socket_path)
            .with_context(|| format!("Failed to bind to socket: {}", socket_path.display()))?;

        Ok(Self {
            listener,
            socket_path,
            store: Arc::new(Mutex::new(ConnStore::new())),
        })
    }

    /// Accept and serve clients until `running` is cleared. Each client is
    /// served on its own thread; on shutdown every client connection is shut
    /// down and its thread joined.
    pub fn run_with_shutdown(&self, running: Arc<AtomicBool>) -> Result<()> {
        tracing::info!("Responder listening on {}", self.socket_path.display());

        // non-blocking accept so the shutdown flag is polled
        self.listener
            .set_nonblocking(true)
            .context("Failed to set listener to non-blocking mode")?;

        let mut clients: Vec<ClientThread> = Vec::new();
        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _)) => match self.spawn_client(stream) {
                    Ok(client) => clients.push(client),
                    Err(e) => tracing::error!("Failed to start client thread: {:#}", e),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    clients.retain(|client| !client.thread.is_finished());
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => tracing::error!("Connection error: {}", e),
            }
        }

        tracing::info!("Shutdown signal received, stopping responder");
        for client in clients {
            client.disconnect();
        }
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            tracing::debug!("Socket file not removed: {}", e);
        }
        Ok(())
    }

    fn spawn_client(&self, stream: UnixStream) -> Result<ClientThread> {
        let control = stream
            .try_clone()
            .context("Failed to clone client socket")?;
        let store = self.store.clone();
        let thread = thread::spawn(move || {
            if let Err(e) = serve_client(stream, store) {
                tracing::error!("Client error: {:#}", e);
            }
        });
        Ok(ClientThread { control, thread })
    }

    /// Run on a background thread until the returned handle is stopped or
    /// dropped
    pub fn spawn(self) -> ResponderHandle {
        let running = Arc::new(AtomicBool::new(true));
        let socket_path = self.socket_path.clone();
        let store = self.store.clone();

        let flag = running.clone();
        let thread = thread::spawn(move || self.run_with_shutdown(flag));

        ResponderHandle {
            running,
            thread: Some(thread),
            socket_path,
            store,
        }
    }
}

/// A served client and the socket handle used to end it
struct ClientThread {
    control: UnixStream,
    thread:  JoinHandle<()>,
}

impl ClientThread {
    /// Shut the connection down so the serving thread sees EOF, then join it
    fn disconnect(self) {
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!("Client socket shutdown failed: {}", e);
            }
        }
        if self.thread.join().is_err() {
            tracing::error!("Client thread panicked");
        }
    }
}

/// Serve one client connection until it disconnects
fn serve_client(stream: UnixStream, store: Arc<Mutex<ConnStore>>) -> Result<()> {
    stream
        .set_nonblocking(false)
        .context("Failed to set socket to blocking mode")?;

    tracing::info!("Client connected");

    let mut stream = PacketStream::new(stream);
    loop {
        let request = match stream.recv_packet() {
            Ok(packet) => packet,
            Err(e) if is_disconnect(&e) => {
                tracing::info!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(anyhow!(e).context("Failed to receive packet")),
        };

        let response = store
            .lock()
            .map_err(|_| anyhow!("Connection store lock poisoned"))?
            .handle(request);

        if let Err(e) = stream.send_packet(&response) {
            if is_disconnect(&e) {
                tracing::info!("Client disconnected before the response was sent");
                return Ok(());
            }
            return Err(anyhow!(e).context("Failed to send response"));
        }
    }
}

/// Background responder; stops and joins its thread when dropped
pub struct ResponderHandle {
    running:     Arc<AtomicBool>,
    thread:      Option<JoinHandle<Result<()>>>,
    socket_path: PathBuf,
    store:       Arc<Mutex<ConnStore>>,
}

impl ResponderHandle {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Names currently loaded in the responder
    pub fn conn_names(&self) -> Vec<String> {
        self.store
            .lock()
            .map(|store| store.names())
            .unwrap_or_default()
    }

    /// Stored definition of `name`
    pub fn conn(&self, name: &str) -> Option<Message> {
        self.store.lock().ok()?.get(name).cloned()
    }

    /// Stop accepting clients, disconnect the connected ones and wait for
    /// every thread to finish
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("Responder thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for ResponderHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Responder shutdown failed: {:#}", e);
        }
    }
}
