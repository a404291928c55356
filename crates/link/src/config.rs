use std::fmt;

use foundation::LinkId;
use serde::{Deserialize, Serialize};

use crate::backend::LinkError;

pub const DEFAULT_UDP_PORT: u16 = 14550;
pub const DEFAULT_TCP_PORT: u16 = 5760;
pub const DEFAULT_BAUD: u32 = 57600;

/// One vehicle link, in the shape the backend's connect endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "UPPERCASE")]
pub enum LinkConfig {
    Udp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_udp_port")]
        port: u16,
    },
    Tcp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    Serial {
        #[serde(rename = "port")]
        port_name: String,
        #[serde(rename = "baud", default = "default_baud")]
        baud_rate: u32,
    },
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

impl LinkConfig {
    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        LinkConfig::Udp {
            host: host.into(),
            port,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        LinkConfig::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn serial(port_name: impl Into<String>, baud_rate: u32) -> Self {
        LinkConfig::Serial {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    /// Rejects configs that cannot name a reachable endpoint.
    pub fn validate(&self) -> Result<(), LinkError> {
        match self {
            LinkConfig::Udp { host, port } | LinkConfig::Tcp { host, port } => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(LinkError::MalformedAddress("host is empty".to_string()));
                }
                if host.contains(char::is_whitespace) || host.contains(':') || host.contains('/') {
                    return Err(LinkError::MalformedAddress(format!(
                        "invalid host '{host}'"
                    )));
                }
                if *port == 0 {
                    return Err(LinkError::MalformedAddress("port must be non-zero".to_string()));
                }
                Ok(())
            }
            LinkConfig::Serial {
                port_name,
                baud_rate,
            } => {
                if port_name.trim().is_empty() {
                    return Err(LinkError::MalformedAddress(
                        "serial port is required".to_string(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(LinkError::MalformedAddress(
                        "baud rate must be non-zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Connection string in the `udp:host:port` style the backend reports.
    pub fn connection_string(&self) -> String {
        match self {
            LinkConfig::Udp { host, port } => format!("udp:{host}:{port}"),
            LinkConfig::Tcp { host, port } => format!("tcp:{host}:{port}"),
            LinkConfig::Serial { port_name, .. } => port_name.clone(),
        }
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkConfig::Serial {
                port_name,
                baud_rate,
            } => write!(f, "serial:{port_name}@{baud_rate}"),
            other => f.write_str(&other.connection_string()),
        }
    }
}

/// A configured link plus its local correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub id: LinkId,
    pub config: LinkConfig,
}

/// Payload of a connect call: one link, or an ordered list of links (fleet mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRequest {
    Single(LinkConfig),
    Multi(Vec<LinkEntry>),
}

impl LinkRequest {
    pub fn multi(configs: impl IntoIterator<Item = LinkConfig>) -> Self {
        LinkRequest::Multi(
            configs
                .into_iter()
                .enumerate()
                .map(|(i, config)| LinkEntry {
                    id: LinkId(i as u32),
                    config,
                })
                .collect(),
        )
    }

    pub fn is_fleet(&self) -> bool {
        matches!(self, LinkRequest::Multi(_))
    }

    pub fn configs(&self) -> Vec<&LinkConfig> {
        match self {
            LinkRequest::Single(c) => vec![c],
            LinkRequest::Multi(entries) => entries.iter().map(|e| &e.config).collect(),
        }
    }

    pub fn entries(&self) -> Vec<LinkEntry> {
        match self {
            LinkRequest::Single(c) => vec![LinkEntry {
                id: LinkId(0),
                config: c.clone(),
            }],
            LinkRequest::Multi(entries) => entries.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if let LinkRequest::Multi(entries) = self {
            if entries.is_empty() {
                return Err(LinkError::MalformedAddress(
                    "connection list is empty".to_string(),
                ));
            }
            for entry in entries {
                entry.config.validate().map_err(|e| match e {
                    LinkError::MalformedAddress(m) => {
                        LinkError::MalformedAddress(format!("connection {}: {m}", entry.id.0))
                    }
                    other => other,
                })?;
            }
            return Ok(());
        }
        self.configs().into_iter().try_for_each(LinkConfig::validate)
    }
}

impl From<LinkConfig> for LinkRequest {
    fn from(config: LinkConfig) -> Self {
        LinkRequest::Single(config)
    }
}

impl From<Vec<LinkConfig>> for LinkRequest {
    fn from(configs: Vec<LinkConfig>) -> Self {
        LinkRequest::multi(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkConfig, LinkRequest};
    use crate::backend::LinkError;
    use foundation::LinkId;
    use serde_json::json;

    #[test]
    fn serializes_in_backend_shape() {
        let udp = serde_json::to_value(LinkConfig::udp("127.0.0.1", 14550)).unwrap();
        assert_eq!(udp, json!({"protocol": "UDP", "host": "127.0.0.1", "port": 14550}));

        let serial = serde_json::to_value(LinkConfig::serial("/dev/ttyUSB0", 57600)).unwrap();
        assert_eq!(
            serial,
            json!({"protocol": "SERIAL", "port": "/dev/ttyUSB0", "baud": 57600})
        );
    }

    #[test]
    fn fills_protocol_defaults() {
        let tcp: LinkConfig = serde_json::from_value(json!({"protocol": "TCP"})).unwrap();
        assert_eq!(tcp, LinkConfig::tcp("127.0.0.1", 5760));
        let serial: LinkConfig =
            serde_json::from_value(json!({"protocol": "SERIAL", "port": "COM3"})).unwrap();
        assert_eq!(serial, LinkConfig::serial("COM3", 57600));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            LinkConfig::udp("", 14550).validate(),
            Err(LinkError::MalformedAddress(_))
        ));
        assert!(LinkConfig::udp("10.0.0.1:99", 14550).validate().is_err());
        assert!(LinkConfig::tcp("host", 0).validate().is_err());
        assert!(LinkConfig::serial(" ", 57600).validate().is_err());
        assert!(LinkConfig::serial("/dev/ttyS0", 0).validate().is_err());
        assert!(LinkConfig::udp("localhost", 14550).validate().is_ok());
    }

    #[test]
    fn multi_link_entries_get_local_ids() {
        let req = LinkRequest::from(vec![
            LinkConfig::udp("127.0.0.1", 14550),
            LinkConfig::udp("127.0.0.1", 14551),
        ]);
        let ids: Vec<_> = req.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![LinkId(0), LinkId(1)]);
        assert!(req.is_fleet());
        assert!(LinkRequest::multi(Vec::new()).validate().is_err());
    }

    #[test]
    fn connection_strings() {
        assert_eq!(LinkConfig::udp("h", 1).connection_string(), "udp:h:1");
        assert_eq!(LinkConfig::tcp("h", 2).connection_string(), "tcp:h:2");
        assert_eq!(LinkConfig::serial("COM4", 9600).to_string(), "serial:COM4@9600");
    }
}
