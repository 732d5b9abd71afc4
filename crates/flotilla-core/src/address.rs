//! Node addressing — bind hosts, connect addresses, and the wildcard rule.
//!
//! A service bound to `0.0.0.0` cannot be dialed back using that same
//! wildcard string, so every `NodeAddress` carries two views: the bind
//! address it listens on and the connect address other processes (or the
//! node itself, via loopback) use to reach it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host string meaning "listen on all interfaces".
pub const WILDCARD_HOST: &str = "0.0.0.0";

/// Base port used when an address string carries no explicit port.
pub const DEFAULT_BASE_PORT: u16 = 2020;

/// Error parsing a `host[:port]` address string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("empty address")]
    Empty,

    #[error("invalid port in {0:?}")]
    InvalidPort(String),
}

/// Identity of a node within the cluster: a bind host and the first
/// port of its allocation block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    host: String,
    base_port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, base_port: u16) -> Self {
        Self { host: host.into(), base_port }
    }

    /// Address listening on all interfaces at the given base port.
    pub fn wildcard(base_port: u16) -> Self {
        Self::new(WILDCARD_HOST, base_port)
    }

    /// First port of this node's allocation block.
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// The listening address used for services on this node, exactly as
    /// configured. May be the wildcard.
    pub fn bind_address(&self) -> &str {
        &self.host
    }

    /// The address used to connect to services running on this node.
    ///
    /// A wildcard bind resolves to loopback; anything else is its own
    /// connect address.
    pub fn connect_address(&self) -> &str {
        if self.host == WILDCARD_HOST {
            "127.0.0.1"
        } else {
            &self.host
        }
    }

    /// Value for config fields where the empty string means "bind to all
    /// interfaces" and any other value is a literal address.
    pub fn listen_field(&self) -> &str {
        if self.host == WILDCARD_HOST {
            ""
        } else {
            &self.host
        }
    }

    /// Whether this node binds the wildcard host.
    pub fn is_wildcard(&self) -> bool {
        self.host == WILDCARD_HOST
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.base_port)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    /// Parses `host` or `host:port`; a bare host gets the default base
    /// port, matching how operators list nodes on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressParseError::Empty);
        }
        match s.split_once(':') {
            None => Ok(Self::new(s, DEFAULT_BASE_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(AddressParseError::Empty);
                }
                let port: u16 = port
                    .parse()
                    .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;
                Ok(Self::new(host, port))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_connects_via_loopback() {
        let addr = NodeAddress::wildcard(2020);
        assert_eq!(addr.bind_address(), "0.0.0.0");
        assert_eq!(addr.connect_address(), "127.0.0.1");
        assert_eq!(addr.listen_field(), "");
    }

    #[test]
    fn concrete_host_is_its_own_connect_address() {
        let addr = NodeAddress::new("10.0.0.5", 2020);
        assert_eq!(addr.connect_address(), "10.0.0.5");
        assert_eq!(addr.bind_address(), "10.0.0.5");
        assert_eq!(addr.listen_field(), "10.0.0.5");
    }

    #[test]
    fn parse_host_and_port() {
        let addr: NodeAddress = "10.1.2.3:3000".parse().unwrap();
        assert_eq!(addr.bind_address(), "10.1.2.3");
        assert_eq!(addr.base_port(), 3000);
    }

    #[test]
    fn parse_bare_host_uses_default_port() {
        let addr: NodeAddress = "node-7.internal".parse().unwrap();
        assert_eq!(addr.base_port(), DEFAULT_BASE_PORT);
    }

    #[test]
    fn parse_rejects_garbage_port() {
        let err = "10.0.0.1:notaport".parse::<NodeAddress>().unwrap_err();
        assert!(matches!(err, AddressParseError::InvalidPort(_)));
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!("".parse::<NodeAddress>(), Err(AddressParseError::Empty));
        assert_eq!(
            ":2020".parse::<NodeAddress>(),
            Err(AddressParseError::Empty)
        );
    }

    #[test]
    fn display_round_trips() {
        let addr = NodeAddress::new("127.0.1.1", 3010);
        let back: NodeAddress = addr.to_string().parse().unwrap();
        assert_eq!(addr, back);
    }
}
