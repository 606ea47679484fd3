use serde::Deserialize;

/// Top-level configuration for the broker and tools.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
}

/// Where the broker listens.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Operational parameters of the broker.
///
/// `request_ttl_secs` bounds how long an unanswered request's reply route is
/// remembered. Addresses starting with `multicast_prefix` get topic
/// (fan-out) semantics instead of competing consumers; an empty prefix
/// disables the variant.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub request_ttl_secs: u64,
    pub shutdown_grace_secs: u64,
    pub multicast_prefix: String,
}

/// Partial configuration loaded from files or the environment; missing
/// values fall back to defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub request_ttl_secs: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,
    pub multicast_prefix: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 5672,
            },
            broker: BrokerSettings {
                max_connections: 1000,
                request_ttl_secs: 30,
                shutdown_grace_secs: 5,
                multicast_prefix: "topic/".to_string(),
            },
        }
    }
}
