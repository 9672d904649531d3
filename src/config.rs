//! Relay configuration parsed from environment variables.

use crate::error::RelayError;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_BOARD: &str = "lobby";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_host: String,
    pub port: u16,
    /// Outbound queue depth per connection. A full queue drops frames for
    /// that client only.
    pub client_channel_capacity: usize,
    /// Board joined when the client does not name one.
    pub default_board: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_owned(),
            port: DEFAULT_PORT,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            default_board: DEFAULT_BOARD.to_owned(),
        }
    }
}

impl RelayConfig {
    /// Build typed relay config from the process environment.
    ///
    /// Optional:
    /// - `BIND_HOST`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `CLIENT_CHANNEL_CAPACITY`: default 256, must be non-zero
    /// - `DEFAULT_BOARD`: default `lobby`
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when a value is present but malformed.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RelayConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let bind_host = get("BIND_HOST").unwrap_or(defaults.bind_host);
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| RelayError::Config { key: "PORT", value: raw })?,
            None => defaults.port,
        };
        let client_channel_capacity = match get("CLIENT_CHANNEL_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(RelayError::Config { key: "CLIENT_CHANNEL_CAPACITY", value: raw }),
            },
            None => defaults.client_channel_capacity,
        };
        let default_board = get("DEFAULT_BOARD").unwrap_or(defaults.default_board);

        Ok(Self { bind_host, port, client_channel_capacity, default_board })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
