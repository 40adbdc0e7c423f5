use std::fmt;

/// Where a message is sent to or consumed from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Fan-out destination; every matching consumer sees each message.
    Topic(String),

    /// Point-to-point destination; each message goes to exactly one consumer.
    Queue(String),

    /// Point-to-point destination owned by the session that created it.
    TemporaryQueue(String),
}

impl Destination {
    /// Creates a topic destination.
    pub fn topic<K>(name: K) -> Self
    where
        K: Into<String>,
    {
        Self::Topic(name.into())
    }

    /// Creates a queue destination.
    pub fn queue<K>(name: K) -> Self
    where
        K: Into<String>,
    {
        Self::Queue(name.into())
    }

    /// The destination name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Topic(name) | Self::Queue(name) | Self::TemporaryQueue(name) => name,
        }
    }

    /// Whether this is a topic.
    #[must_use]
    pub const fn is_topic(&self) -> bool {
        matches!(self, Self::Topic(_))
    }

    /// Whether this is a temporary queue.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::TemporaryQueue(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(name) => write!(f, "topic://{name}"),
            Self::Queue(name) => write!(f, "queue://{name}"),
            Self::TemporaryQueue(name) => write!(f, "temp-queue://{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        assert_eq!(Destination::topic("GMP.STATUS").to_string(), "topic://GMP.STATUS");
        assert_eq!(
            Destination::queue("GMP.UTIL.REQUEST").to_string(),
            "queue://GMP.UTIL.REQUEST"
        );
        assert!(Destination::TemporaryQueue("tmp".to_string()).is_temporary());
        assert!(!Destination::queue("q").is_topic());
    }
}
