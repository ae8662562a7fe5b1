//! Session configuration from the environment.

use std::str::FromStr;

use super::{
    errors::{BTCP2PError, Result},
    network::Network,
    payload::ServiceFlags,
};

/// Capacity of the queue between the receive loop and the consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Host dialed when no address is configured, on the network's default port.
pub const DEFAULT_NODE_HOST: &str = "localhost";

fn default_address(network: Network) -> String {
    format!("{DEFAULT_NODE_HOST}:{}", network.default_port())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host:port` of the node to connect to.
    pub node_address: String,
    /// Network the node runs on, selects the message magic.
    pub network: Network,
    /// Number of decoded messages buffered before the receive loop stops reading.
    pub queue_capacity: usize,
    /// Best block height announced in our version message.
    pub start_height: u32,
    /// Services announced in our version message.
    pub services: ServiceFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_address: default_address(Network::RegTest),
            network: Network::RegTest,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            start_height: 0,
            services: ServiceFlags::UNNAMED,
        }
    }
}

impl Config {
    /// Creates configuration with environment variable overrides.
    ///
    /// Reads `BTC_NODE_ADDRESS`, `BTC_NETWORK`, `BTC_QUEUE_CAPACITY` and
    /// `BTC_START_HEIGHT`; unset or empty variables keep their default.
    /// Without an explicit address, the node is dialed on localhost at the
    /// default port of the selected network.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(network) = var("BTC_NETWORK") {
            config.network = network.parse()?;
            config.node_address = default_address(config.network);
        }

        if let Some(address) = var("BTC_NODE_ADDRESS") {
            config.node_address = address.trim().to_string();
        }

        if let Some(capacity) = var("BTC_QUEUE_CAPACITY") {
            config.queue_capacity = parse_number("BTC_QUEUE_CAPACITY", &capacity)?;
            if config.queue_capacity == 0 {
                return Err(BTCP2PError::InvalidConfig(
                    "BTC_QUEUE_CAPACITY must be greater than zero".to_string(),
                ));
            }
        }

        if let Some(height) = var("BTC_START_HEIGHT") {
            config.start_height = parse_number("BTC_START_HEIGHT", &height)?;
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BTCP2PError::InvalidConfig(format!("{key}: '{value}' is not a valid number")))
}
