mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, ServerSettings, Settings};

#[cfg(test)]
mod tests;

/// Loads configuration from `config/default` (any supported format, if
/// present) and environment variables, merged over built-in defaults.
/// A `.env` file in the working directory is honored.
pub fn load_config() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().try_parsing(true).separator("_"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            max_connections: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_connections)
                .unwrap_or(default.broker.max_connections),
            request_ttl_secs: partial
                .broker
                .as_ref()
                .and_then(|b| b.request_ttl_secs)
                .unwrap_or(default.broker.request_ttl_secs),
            shutdown_grace_secs: partial
                .broker
                .as_ref()
                .and_then(|b| b.shutdown_grace_secs)
                .unwrap_or(default.broker.shutdown_grace_secs),
            multicast_prefix: partial
                .broker
                .as_ref()
                .and_then(|b| b.multicast_prefix.clone())
                .unwrap_or(default.broker.multicast_prefix),
        },
    })
}
