use std::{path::PathBuf, time::Duration};

use vici_common::{
    config::{default_certs_dir, default_socket_path},
    Message,
};

use crate::{
    certs::CertificateLoader,
    connection::{Connection, StartAction},
    error::{Error, Result},
    session::{Connector, Session, SocketConnector},
    tunnel::{TunnelConnectionConfig, TunnelManager},
};

const CMD_GET_CONNS: &str = "get-conns";
const CMD_LOAD_CONN: &str = "load-conn";
const CMD_UNLOAD_CONN: &str = "unload-conn";

/// Immutable manager settings
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Daemon control socket
    pub socket_path:  PathBuf,
    /// Base directory for relative certificate filenames
    pub certs_path:   PathBuf,
    /// Start action given to every child SA
    pub start_action: StartAction,
    /// Upper bound on one whole session, from connect to close
    pub timeout:      Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            socket_path:  default_socket_path(),
            certs_path:   default_certs_dir(),
            start_action: StartAction::default(),
            timeout:      None,
        }
    }
}

impl ManagerConfig {
    /// Creates a manager configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the control socket path
    pub fn with_socket_path<P: Into<PathBuf>>(mut self, socket_path: P) -> Self {
        self.socket_path = socket_path.into();
        self
    }

    /// Set the certificate base directory
    pub fn with_certs_path<P: Into<PathBuf>>(mut self, certs_path: P) -> Self {
        self.certs_path = certs_path.into();
        self
    }

    /// Set the child SA start action
    pub fn with_start_action(mut self, start_action: StartAction) -> Self {
        self.start_action = start_action;
        self
    }

    /// Set the per-session timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Loads, lists and unloads tunnel connections in the IKE daemon.
///
/// Every operation opens its own session, so one manager can be shared
/// between threads.
pub struct Manager<C = SocketConnector> {
    config:    ManagerConfig,
    certs:     CertificateLoader,
    connector: C,
}

impl Manager<SocketConnector> {
    /// Creates a manager talking to the socket named in `config`
    pub fn new(config: ManagerConfig) -> Self {
        let connector = SocketConnector::new(config.socket_path.clone(), config.timeout);
        Self::with_connector(config, connector)
    }

    /// Creates a manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl<C: Connector> Manager<C> {
    /// Creates a manager that opens sessions through `connector`
    pub fn with_connector(config: ManagerConfig, connector: C) -> Self {
        let certs = CertificateLoader::new(config.certs_path.clone());
        Self {
            config,
            certs,
            connector,
        }
    }

    /// Names of the connections currently loaded in the daemon
    pub fn list_conn_names(&self) -> Result<Vec<String>> {
        let response =
            self.with_session(|session| session.command_request(CMD_GET_CONNS, Message::new()))?;

        response.list_strs("conns").ok_or_else(|| {
            Error::Protocol(format!(
                "'{CMD_GET_CONNS}' response has no list of connection names"
            ))
        })
    }

    /// Install `config`, replacing any connection with the same name.
    /// Certificates are resolved before the daemon is contacted.
    pub fn load_conn(&self, config: &TunnelConnectionConfig) -> Result<()> {
        let certs = self.certs.get_certs(&config.local_certs)?;
        let request = self.load_conn_request(config, certs);

        tracing::info!("Loading connection {}", config.name);
        self.with_session(|session| session.command_request(CMD_LOAD_CONN, request))?;
        Ok(())
    }

    /// Remove the connection called `name`. Unknown names are reported by
    /// the daemon.
    pub fn unload_conn(&self, name: &str) -> Result<()> {
        let request = Message::new().with_value("name", name);

        tracing::info!("Unloading connection {}", name);
        self.with_session(|session| session.command_request(CMD_UNLOAD_CONN, request))?;
        Ok(())
    }

    /// `load-conn` payload: the connection body keyed by its name
    fn load_conn_request(&self, config: &TunnelConnectionConfig, certs: Vec<String>) -> Message {
        let conn = Connection::build(config, certs, self.config.start_action);
        let mut request = Message::new();
        request.set_section(config.name.as_str(), conn.to_message());
        request
    }

    /// Run `op` on a fresh session. The session is closed exactly once when
    /// this returns or unwinds; `op`'s result is passed through untouched.
    fn with_session<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut C::Session) -> Result<T>,
    {
        let mut guard = SessionGuard(self.connector.connect()?);
        op(&mut guard.0)
    }
}

impl<C: Connector> TunnelManager for Manager<C> {
    fn list_conn_names(&self) -> Result<Vec<String>> {
        Manager::list_conn_names(self)
    }

    fn load_conn(&self, config: &TunnelConnectionConfig) -> Result<()> {
        Manager::load_conn(self, config)
    }

    fn unload_conn(&self, name: &str) -> Result<()> {
        Manager::unload_conn(self, name)
    }
}

/// Closes the wrapped session on drop
struct SessionGuard<S: Session>(S);

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            tracing::warn!("Failed to close control session: {}", e);
        }
    }
}
