//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top level client configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct GiapiConfig {
    /// Connection management
    pub connection: ConnectionConfig,

    /// EPICS channel handling
    pub epics: EpicsConfig,

    /// Status posting
    pub status: StatusConfig,
}

/// Reconnect behaviour of the connection manager.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Fixed delay between reconnect attempts
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Give up after this many failed attempts; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: None,
        }
    }
}

/// EPICS configuration fetching.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct EpicsConfig {
    /// How long to wait for the channel list
    #[serde(with = "humantime_serde")]
    pub init_timeout: Duration,
}

impl Default for EpicsConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(1),
        }
    }
}

/// Where status posts go.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSenderKind {
    /// Publish on the status topic
    #[default]
    Bus,

    /// Only log the posts
    Log,
}

/// Status posting configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Sender implementation
    pub sender: StatusSenderKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GiapiConfig::default();

        assert_eq!(config.connection.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.connection.max_reconnect_attempts, None);
        assert_eq!(config.epics.init_timeout, Duration::from_secs(1));
        assert_eq!(config.status.sender, StatusSenderKind::Bus);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GiapiConfig = toml::from_str(
            r#"
            [connection]
            reconnect_interval = "250ms"
            max_reconnect_attempts = 3

            [status]
            sender = "log"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.connection.reconnect_interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.connection.max_reconnect_attempts, Some(3));
        assert_eq!(config.epics, EpicsConfig::default());
        assert_eq!(config.status.sender, StatusSenderKind::Log);
    }
}
