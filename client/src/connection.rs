//! Daemon-side connection schema and the translation from
//! [`TunnelConnectionConfig`].
//!
//! Field names are written out by hand in [`Connection::to_message`];
//! whether a field is always present, omitted when empty or omitted when
//! unset is part of the daemon contract and is spelled out per field.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use vici_common::Message;

use crate::{error::Error, tunnel::TunnelConnectionConfig};

/// The single IKE proposal every connection is loaded with
pub const DEFAULT_PROPOSAL: &str = "aes128-sha256-x25519";

/// Wire field names understood by the daemon
pub mod fields {
    pub const LOCAL_ADDRS: &str = "local_addrs";
    pub const REMOTE_ADDRS: &str = "remote_addrs";
    pub const PROPOSALS: &str = "proposals";
    pub const ENCAP: &str = "encap";
    pub const LOCAL: &str = "local";
    pub const REMOTE: &str = "remote";
    pub const CHILDREN: &str = "children";
    pub const IF_ID_IN: &str = "if_id_in";
    pub const IF_ID_OUT: &str = "if_id_out";

    pub const ID: &str = "id";
    pub const AUTH: &str = "auth";
    pub const CERTS: &str = "certs";

    pub const LOCAL_TS: &str = "local_ts";
    pub const REMOTE_TS: &str = "remote_ts";
    pub const START_ACTION: &str = "start_action";
    pub const CLOSE_ACTION: &str = "close_action";
}

/// When a child SA gets negotiated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartAction {
    /// Only when the peer initiates
    None,
    /// On the first packet matching the traffic selectors
    #[default]
    Trap,
    /// Immediately after loading
    Start,
}

impl StartAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StartAction::None => "none",
            StartAction::Trap => "trap",
            StartAction::Start => "start",
        }
    }
}

impl fmt::Display for StartAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(StartAction::None),
            "trap" => Ok(StartAction::Trap),
            "start" => Ok(StartAction::Start),
            other => Err(Error::Config(format!(
                "invalid start action '{other}' (expected none, trap or start)"
            ))),
        }
    }
}

/// What happens when the peer closes a child SA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseAction {
    None,
    Clear,
    Hold,
    Restart,
}

impl CloseAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseAction::None => "none",
            CloseAction::Clear => "clear",
            CloseAction::Hold => "hold",
            CloseAction::Restart => "restart",
        }
    }
}

/// How the daemon authenticates one side of the IKE SA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    PublicKey,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::PublicKey => "pubkey",
        }
    }
}

/// One side's authentication round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub id:     String,
    pub method: AuthMethod,
    /// PEM certificates, in chain order
    pub certs:  Vec<String>,
}

impl AuthConfig {
    fn to_message(&self) -> Message {
        let mut msg = Message::new();
        msg.set_value(fields::ID, &self.id);
        msg.set_value(fields::AUTH, self.method.as_str());
        if !self.certs.is_empty() {
            msg.set_list(fields::CERTS, &self.certs);
        }
        msg
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSaConfig {
    pub local_ts:     Vec<String>,
    pub remote_ts:    Vec<String>,
    pub start_action: StartAction,
    /// `None` leaves the daemon default in place
    pub close_action: Option<CloseAction>,
}

impl ChildSaConfig {
    fn to_message(&self) -> Message {
        let mut msg = Message::new();
        msg.set_list(fields::LOCAL_TS, &self.local_ts);
        msg.set_list(fields::REMOTE_TS, &self.remote_ts);
        msg.set_value(fields::START_ACTION, self.start_action.as_str());
        if let Some(close_action) = self.close_action {
            msg.set_value(fields::CLOSE_ACTION, close_action.as_str());
        }
        msg
    }
}

/// A connection definition in the daemon's schema. Built fresh for every
/// load and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub local_addrs:  Vec<String>,
    pub remote_addrs: Vec<String>,
    pub proposals:    Vec<String>,
    /// UDP encapsulation of ESP
    pub encap:        bool,
    pub local_auth:   AuthConfig,
    pub remote_auth:  AuthConfig,
    pub children:     BTreeMap<String, ChildSaConfig>,
    pub if_id_in:     Option<u32>,
    pub if_id_out:    Option<u32>,
}

impl Connection {
    /// Translate a tunnel description plus its already loaded local
    /// certificates into the daemon schema
    pub fn build(
        config: &TunnelConnectionConfig,
        local_certs: Vec<String>,
        start_action: StartAction,
    ) -> Self {
        let mut children = BTreeMap::new();
        children.insert(
            child_sa_name(&config.name),
            ChildSaConfig {
                local_ts: config.local_subnets.clone(),
                remote_ts: config.remote_subnets.clone(),
                start_action,
                close_action: None,
            },
        );

        Self {
            local_addrs: config.local_addresses.clone(),
            remote_addrs: config.remote_addresses.clone(),
            proposals: vec![DEFAULT_PROPOSAL.to_string()],
            encap: false,
            local_auth: AuthConfig {
                id:     config.local_id.clone(),
                method: AuthMethod::PublicKey,
                certs:  local_certs,
            },
            // the peer's chain is checked during negotiation
            remote_auth: AuthConfig {
                id:     config.remote_id.clone(),
                method: AuthMethod::PublicKey,
                certs:  Vec::new(),
            },
            children,
            if_id_in: config.if_id_in,
            if_id_out: config.if_id_out,
        }
    }

    /// Wire representation of the connection body
    pub fn to_message(&self) -> Message {
        let mut msg = Message::new();

        msg.set_list(fields::LOCAL_ADDRS, &self.local_addrs);
        if !self.remote_addrs.is_empty() {
            msg.set_list(fields::REMOTE_ADDRS, &self.remote_addrs);
        }
        if !self.proposals.is_empty() {
            msg.set_list(fields::PROPOSALS, &self.proposals);
        }
        msg.set_value(fields::ENCAP, if self.encap { "yes" } else { "no" });
        msg.set_section(fields::LOCAL, self.local_auth.to_message());
        msg.set_section(fields::REMOTE, self.remote_auth.to_message());

        let mut children = Message::new();
        for (name, child) in &self.children {
            children.set_section(name.as_str(), child.to_message());
        }
        msg.set_section(fields::CHILDREN, children);

        // zero is a real interface id, so unset ids must stay off the wire
        if let Some(id) = self.if_id_in {
            msg.set_value(fields::IF_ID_IN, id.to_string());
        }
        if let Some(id) = self.if_id_out {
            msg.set_value(fields::IF_ID_OUT, id.to_string());
        }

        msg
    }
}

/// Name of the single child SA of connection `name`
pub fn child_sa_name(name: &str) -> String {
    format!("{name}-1")
}

#[cfg(test)]
mod tests {
    use vici_common::Element;

    use super::*;

    fn sample_config() -> TunnelConnectionConfig {
        TunnelConnectionConfig {
            name: "edge1".to_string(),
            local_addresses: vec!["192.0.2.1".to_string()],
            remote_addresses: vec!["198.51.100.7".to_string()],
            local_id: "C=CN, O=edge, CN=edge1".to_string(),
            remote_id: "C=CN, O=edge, CN=cloud".to_string(),
            local_subnets: vec!["10.1.0.0/24".to_string(), "10.1.1.0/24".to_string()],
            remote_subnets: vec![
                "10.2.0.0/24".to_string(),
                "10.2.1.0/24".to_string(),
                "10.2.2.0/24".to_string(),
            ],
            local_certs: vec!["edge1.pem".to_string()],
            if_id_in: None,
            if_id_out: None,
        }
    }

    #[test]
    fn test_single_child_carries_all_selectors_in_order() {
        let config = sample_config();
        let conn = Connection::build(&config, vec![], StartAction::Trap);

        assert_eq!(conn.children.len(), 1);
        let child = &conn.children["edge1-1"];
        assert_eq!(child.local_ts, config.local_subnets);
        assert_eq!(child.remote_ts, config.remote_subnets);

        let msg = conn.to_message();
        let children = msg.section(fields::CHILDREN).unwrap();
        assert_eq!(children.len(), 1);
        let child_msg = children.section("edge1-1").unwrap();
        assert_eq!(
            child_msg.list_strs(fields::LOCAL_TS).unwrap(),
            config.local_subnets
        );
        assert_eq!(
            child_msg.list_strs(fields::REMOTE_TS).unwrap(),
            config.remote_subnets
        );
        assert_eq!(child_msg.value_str(fields::START_ACTION), Some("trap"));
        assert!(!child_msg.contains_key(fields::CLOSE_ACTION));
    }

    #[test]
    fn test_fixed_fields() {
        let conn = Connection::build(&sample_config(), vec![], StartAction::Start);
        let msg = conn.to_message();

        assert_eq!(
            msg.list_strs(fields::PROPOSALS).unwrap(),
            vec![DEFAULT_PROPOSAL]
        );
        assert_eq!(msg.value_str(fields::ENCAP), Some("no"));
        assert_eq!(
            msg.list_strs(fields::LOCAL_ADDRS).unwrap(),
            vec!["192.0.2.1"]
        );
        assert_eq!(
            msg.list_strs(fields::REMOTE_ADDRS).unwrap(),
            vec!["198.51.100.7"]
        );
    }

    #[test]
    fn test_auth_blocks() {
        let certs = vec!["PEM-A".to_string(), "PEM-B".to_string()];
        let msg = Connection::build(&sample_config(), certs.clone(), StartAction::Trap).to_message();

        let local = msg.section(fields::LOCAL).unwrap();
        assert_eq!(local.value_str(fields::ID), Some("C=CN, O=edge, CN=edge1"));
        assert_eq!(local.value_str(fields::AUTH), Some("pubkey"));
        assert_eq!(local.list_strs(fields::CERTS).unwrap(), certs);

        let remote = msg.section(fields::REMOTE).unwrap();
        assert_eq!(remote.value_str(fields::ID), Some("C=CN, O=edge, CN=cloud"));
        assert_eq!(remote.value_str(fields::AUTH), Some("pubkey"));
        assert!(!remote.contains_key(fields::CERTS));
    }

    #[test]
    fn test_interface_ids_omitted_unless_set() {
        let mut config = sample_config();
        config.if_id_in = Some(0);
        let msg = Connection::build(&config, vec![], StartAction::Trap).to_message();

        assert_eq!(msg.get(fields::IF_ID_IN), Some(&Element::Value(b"0".to_vec())));
        assert!(!msg.contains_key(fields::IF_ID_OUT));

        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert!(decoded.contains_key(fields::IF_ID_IN));
        assert!(!decoded.contains_key(fields::IF_ID_OUT));
    }

    #[test]
    fn test_empty_optional_lists_are_omitted() {
        let mut config = sample_config();
        config.remote_addresses.clear();
        config.local_addresses.clear();
        let msg = Connection::build(&config, vec![], StartAction::Trap).to_message();

        assert!(!msg.contains_key(fields::REMOTE_ADDRS));
        assert_eq!(msg.list_strs(fields::LOCAL_ADDRS), Some(vec![]));
        assert!(!msg.section(fields::LOCAL).unwrap().contains_key(fields::CERTS));
    }

    #[test]
    fn test_start_action_parsing() {
        assert_eq!("start".parse::<StartAction>().unwrap(), StartAction::Start);
        assert_eq!(StartAction::default(), StartAction::Trap);
        assert!("later".parse::<StartAction>().is_err());
    }
}
