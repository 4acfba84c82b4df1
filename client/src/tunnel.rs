use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Generic description of one site-to-site tunnel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConnectionConfig {
    /// Unique key the daemon stores the definition under
    pub name: String,

    #[serde(default)]
    pub local_addresses: Vec<String>,
    #[serde(default)]
    pub remote_addresses: Vec<String>,

    #[serde(default)]
    pub local_id: String,
    #[serde(default)]
    pub remote_id: String,

    /// Traffic selectors on the local side
    #[serde(default)]
    pub local_subnets: Vec<String>,
    /// Traffic selectors on the remote side
    #[serde(default)]
    pub remote_subnets: Vec<String>,

    /// Certificate filenames, absolute or relative to the certificate
    /// directory
    #[serde(default)]
    pub local_certs: Vec<String>,

    /// XFRM interface id for inbound traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_id_in: Option<u32>,
    /// XFRM interface id for outbound traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_id_out: Option<u32>,
}

/// Lifecycle operations an orchestrator needs from a tunnel backend
pub trait TunnelManager {
    /// Names of all connections currently loaded
    fn list_conn_names(&self) -> Result<Vec<String>>;

    /// Install or replace the connection named `config.name`
    fn load_conn(&self, config: &TunnelConnectionConfig) -> Result<()>;

    /// Remove the connection called `name`
    fn unload_conn(&self, name: &str) -> Result<()>;
}
