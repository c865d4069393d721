//! Route definitions.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Transport protocol of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Stream relay.
    Tcp,
    /// Datagram relay.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(ConfigError::InvalidValue {
                field: "protocol".to_string(),
                message: format!("unknown protocol '{other}' (expected tcp or udp)"),
            }),
        }
    }
}

/// One forwarding rule: a local port relayed to a fixed remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Transport protocol.
    pub protocol: Protocol,

    /// Local address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Local port to listen on.
    pub local_port: u16,

    /// Remote host name or IP address.
    pub remote_host: String,

    /// Remote port.
    pub remote_port: u16,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

impl Route {
    /// Create a route listening on all interfaces.
    #[must_use]
    pub fn new(
        protocol: Protocol,
        local_port: u16,
        remote_host: impl Into<String>,
        remote_port: u16,
    ) -> Self {
        Self {
            protocol,
            bind_address: default_bind_address(),
            local_port,
            remote_host: remote_host.into(),
            remote_port,
        }
    }

    /// Set the local bind address.
    #[must_use]
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Address string the relay listens on.
    #[must_use]
    pub fn listen_address(&self) -> String {
        SocketAddr::new(self.bind_address, self.local_port).to_string()
    }

    /// Address string of the remote target.
    ///
    /// Bare IPv6 literals are bracketed so the result resolves as `host:port`.
    #[must_use]
    pub fn target_address(&self) -> String {
        let host = self.remote_host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.remote_port)
        } else {
            format!("{host}:{}", self.remote_port)
        }
    }

    /// Parse a single `LOCALPORT:REMOTEHOST:REMOTEPORT` rule.
    ///
    /// IPv6 hosts may be written bracketed, e.g. `53:[2001:db8::1]:53`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRoute` when the rule is malformed.
    pub fn parse(protocol: Protocol, rule: &str) -> ConfigResult<Self> {
        let rule = rule.trim();
        let invalid = |message: &str| ConfigError::InvalidRoute {
            rule: rule.to_string(),
            message: message.to_string(),
        };

        let (local, rest) = rule
            .split_once(':')
            .ok_or_else(|| invalid("expected LOCALPORT:REMOTEIP:REMOTEPORT"))?;
        let (host, remote) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected LOCALPORT:REMOTEIP:REMOTEPORT"))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("remote host is empty"));
        }
        // An unbracketed IPv6 literal would be ambiguous with extra segments.
        if host.contains(':') && !rest.starts_with('[') {
            return Err(invalid("expected LOCALPORT:REMOTEIP:REMOTEPORT"));
        }

        let local_port = local
            .parse::<u16>()
            .map_err(|_| invalid("local port is not a valid port number"))?;
        let remote_port = remote
            .parse::<u16>()
            .map_err(|_| invalid("remote port is not a valid port number"))?;

        Ok(Self::new(protocol, local_port, host, remote_port))
    }

    /// Parse a comma-separated list of rules. An empty list yields no routes.
    ///
    /// # Errors
    ///
    /// Returns the first malformed rule.
    pub fn parse_list(protocol: Protocol, list: &str) -> ConfigResult<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Self::parse(protocol, part))
            .collect()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.protocol,
            self.listen_address(),
            self.target_address()
        )
    }
}
