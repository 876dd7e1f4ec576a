//! In-memory object model for the five authoritative tables (component C2).
//!
//! Entities are value-semantic: mutation always replaces a row rather than
//! aliasing it. Row-level operations live on [`crate::store::Store`], which
//! owns the five tables together with the dirty marker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A firewall-relevant protocol, or the empty protocol meaning "unspecified".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Ip,
    Tcp,
    Udp,
    Ospf,
    IsIs,
    Sctp,
    Ah,
    Esp,
    /// No protocol restriction — the `∅` value from `spec.md` §4.5.
    Any,
}

impl Protocol {
    pub fn lowercase(&self) -> Option<&'static str> {
        match self {
            Protocol::Ip => Some("ip"),
            Protocol::Tcp => Some("tcp"),
            Protocol::Udp => Some("udp"),
            Protocol::Ospf => Some("ospf"),
            Protocol::IsIs => Some("is-is"),
            Protocol::Sctp => Some("sctp"),
            Protocol::Ah => Some("ah"),
            Protocol::Esp => Some("esp"),
            Protocol::Any => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Ip => "IP",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Ospf => "OSPF",
            Protocol::IsIs => "IS-IS",
            Protocol::Sctp => "SCTP",
            Protocol::Ah => "AH",
            Protocol::Esp => "ESP",
            Protocol::Any => "",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IP" => Ok(Protocol::Ip),
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "OSPF" => Ok(Protocol::Ospf),
            "IS-IS" => Ok(Protocol::IsIs),
            "SCTP" => Ok(Protocol::Sctp),
            "AH" => Ok(Protocol::Ah),
            "ESP" => Ok(Protocol::Esp),
            "" | "*" => Ok(Protocol::Any),
            _ => Err(()),
        }
    }
}

/// The two concrete actions a rule can resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Accept,
    Drop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accept => f.write_str("ACCEPT"),
            Action::Drop => f.write_str("DROP"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Action::Accept),
            "DROP" => Ok(Action::Drop),
            _ => Err(()),
        }
    }
}

/// `{name, iface, address}`. Uniqueness key is `(name, iface)`; a host may
/// appear once per interface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub iface: String,
    pub address: u32,
}

impl Host {
    /// The resolution key used in rules and host-group members: `name:iface`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.iface)
    }
}

/// `{name, address, masklen}` — a CIDR block identified by a symbolic name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub address: u32,
    pub masklen: u8,
}

/// `{name, members[]}`. Members are names resolvable to a Host, Network, or
/// another HostGroup; cycles are rejected by the compiler (component C5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// `{name, protocol, ports}`. `ports` is a raw comma-separated range spec,
/// e.g. `"80,443"` or `"1000:2000"`; empty means "any port".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub protocol: Protocol,
    pub ports: String,
}

impl Service {
    /// The sentinel service `"*"`: protocol `Any`, no ports.
    pub fn any() -> Service {
        Service {
            name: "*".to_string(),
            protocol: Protocol::Any,
            ports: String::new(),
        }
    }

    pub fn is_multiport(&self) -> bool {
        self.ports.contains(',')
    }
}

/// One row in the authoritative rule table. Order within the containing
/// `Vec<Rule>` is significant: first match wins on the target node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub enabled: bool,
    pub name: String,
    pub src: String,
    pub src_service: String,
    pub dst: String,
    pub dst_service: String,
    pub action: Action,
    pub log_level: u8,
    pub description: String,
}

/// Identifies one of the five authoritative tables for row-level operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableId {
    Rules,
    Hosts,
    HostGroups,
    Services,
    Networks,
}
