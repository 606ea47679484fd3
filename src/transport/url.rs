use url::Url;

use crate::utils::error::{Error, Result};

/// Host used when an address URL does not name one.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Standard AMQP port, used when an address URL does not name one.
pub const DEFAULT_PORT: u16 = 5672;

/// A parsed address URL: where the broker lives and which address (queue
/// name) to use there.
///
/// Accepted forms are `address`, `//host/address`, `//host:port/address`,
/// and `amqp://host:port/address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUrl {
    pub host: String,
    pub port: u16,
    pub address: String,
}

impl AddressUrl {
    /// The `host:port` pair to connect to.
    pub fn domain(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses an address URL, filling in the default host and port where the
/// input leaves them out.
pub fn parse_address_url(input: &str) -> Result<AddressUrl> {
    let base = Url::parse(&format!("amqp://{DEFAULT_HOST}:{DEFAULT_PORT}"))
        .map_err(|e| Error::Url(e.to_string()))?;
    let url = Url::options()
        .base_url(Some(&base))
        .parse(input)
        .map_err(|e| Error::Url(format!("{input}: {e}")))?;

    let host = url.host_str().unwrap_or(DEFAULT_HOST).to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let address = url.path().trim_start_matches('/').to_string();

    if address.is_empty() {
        return Err(Error::Url(format!("{input}: no address in URL")));
    }

    Ok(AddressUrl {
        host,
        port,
        address,
    })
}
