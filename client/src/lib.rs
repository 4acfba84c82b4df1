//! IPsec Tunnel Manager
//!
//! This crate installs, lists and removes named site-to-site tunnel
//! definitions in an IKE daemon by driving the daemon's local control
//! socket. A generic [`TunnelConnectionConfig`] is translated into the
//! daemon's connection schema, local certificates are loaded from disk and
//! each operation runs on its own short-lived control session.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vici_tunnel::{Manager, ManagerConfig, StartAction, TunnelConnectionConfig};
//!
//! # fn main() -> vici_tunnel::Result<()> {
//! let manager = Manager::new(
//!     ManagerConfig::new()
//!         .with_start_action(StartAction::Start)
//!         .with_timeout(Duration::from_secs(10)),
//! );
//!
//! manager.load_conn(&TunnelConnectionConfig {
//!     name: "edge1".to_string(),
//!     local_addresses: vec!["192.0.2.1".to_string()],
//!     remote_addresses: vec!["198.51.100.7".to_string()],
//!     local_id: "CN=edge1".to_string(),
//!     remote_id: "CN=cloud".to_string(),
//!     local_subnets: vec!["10.1.0.0/24".to_string()],
//!     remote_subnets: vec!["10.2.0.0/24".to_string()],
//!     local_certs: vec!["edge1.pem".to_string()],
//!     ..Default::default()
//! })?;
//!
//! println!("Loaded: {:?}", manager.list_conn_names()?);
//! manager.unload_conn("edge1")?;
//! # Ok(())
//! # }
//! ```

pub mod certs;
pub mod connection;
pub mod error;
mod manager;
pub mod session;
pub mod tunnel;

pub use certs::CertificateLoader;
pub use connection::{
    child_sa_name, AuthConfig, AuthMethod, ChildSaConfig, CloseAction, Connection, StartAction,
    DEFAULT_PROPOSAL,
};
pub use error::{Error, Result};
pub use manager::{Manager, ManagerConfig};
pub use session::{Connector, ControlSession, Session, SocketConnector};
pub use tunnel::{TunnelConnectionConfig, TunnelManager};
// Re-export the wire message type so custom sessions can be written
pub use vici_common::Message;
