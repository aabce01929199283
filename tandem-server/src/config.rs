//! Rendezvous server configuration.
//!
//! Loaded from environment variables. The TURN credential is redacted in
//! Debug output.

use crate::store::RegistrationStrategy;
use std::collections::HashMap;
use std::env;
use std::fmt;
use tandem_core::IceServerConfig;
use tandem_core::utils::default_stun_urls;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Behavior of `POST /room/{id}` on an already bound room.
    pub registration_strategy: RegistrationStrategy,

    /// ICE servers handed to every broker client on connect.
    pub ice_servers: Vec<IceServerConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ice_urls: Vec<&String> = self.ice_servers.iter().flat_map(|s| &s.urls).collect();
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("registration_strategy", &self.registration_strategy)
            .field("ice_servers", &ice_urls)
            .field("turn_credential", &"[REDACTED]")
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            registration_strategy: RegistrationStrategy::default(),
            ice_servers: vec![IceServerConfig {
                urls: default_stun_urls(),
                username: None,
                credential: None,
            }],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid registration strategy: {0}")]
    InvalidRegistrationStrategy(String),

    #[error("Invalid ICE server list: {0}")]
    InvalidIceServers(String),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        check_bind_address(&bind_address)?;

        let registration_strategy = match vars.get("REGISTRATION_STRATEGY") {
            Some(value) => value
                .parse::<RegistrationStrategy>()
                .map_err(ConfigError::InvalidRegistrationStrategy)?,
            None => RegistrationStrategy::default(),
        };

        let urls = match vars.get("ICE_SERVERS") {
            Some(value) => {
                let urls: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect();

                if urls.is_empty() {
                    return Err(ConfigError::InvalidIceServers(
                        "ICE_SERVERS is set but contains no URLs".to_string(),
                    ));
                }
                if let Some(bad) = urls.iter().find(|url| !is_ice_url(url)) {
                    return Err(ConfigError::InvalidIceServers(format!(
                        "'{}' is not a stun:, turn: or turns: URL",
                        bad
                    )));
                }
                urls
            }
            None => default_stun_urls(),
        };

        let ice_servers = vec![IceServerConfig {
            urls,
            username: vars.get("TURN_USERNAME").cloned(),
            credential: vars.get("TURN_CREDENTIAL").cloned(),
        }];

        Ok(Self {
            bind_address,
            registration_strategy,
            ice_servers,
        })
    }

    /// Replace the bind address, validated like `BIND_ADDRESS`.
    pub fn with_bind_address(mut self, bind_address: &str) -> Result<Self, ConfigError> {
        check_bind_address(bind_address)?;
        self.bind_address = bind_address.to_string();
        Ok(self)
    }
}

fn check_bind_address(bind_address: &str) -> Result<(), ConfigError> {
    if bind_address.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::InvalidBindAddress(format!(
            "bind address must be host:port, got '{}'",
            bind_address
        )));
    }
    Ok(())
}

fn is_ice_url(url: &str) -> bool {
    ["stun:", "turn:", "turns:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}
