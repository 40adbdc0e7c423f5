use std::fmt;

use tracing::warn;

/// Outcome of a GIAPI operation that did not fail with an [`crate::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// The operation succeeded.
    Ok = 0,

    /// The operation succeeded with a warning.
    Warning = 1,

    /// The operation was rejected.
    Error = 2,
}

impl StatusCode {
    /// The integer code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether this is [`StatusCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Maps a validation result onto a status code, logging the rejection.
    pub fn from_validation<E>(result: std::result::Result<(), E>) -> Self
    where
        E: fmt::Display,
    {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => {
                warn!("Rejected: {}", e);
                Self::Error
            }
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing_test::traced_test;

    #[test]
    fn test_integer_codes() {
        assert_eq!(StatusCode::Ok.as_i32(), 0);
        assert_eq!(StatusCode::Warning.as_i32(), 1);
        assert_eq!(StatusCode::Error.as_i32(), 2);
    }

    #[test]
    fn test_from_validation() {
        assert_eq!(StatusCode::from_validation::<String>(Ok(())), StatusCode::Ok);
        assert_eq!(
            StatusCode::from_validation(Err("duplicate item")),
            StatusCode::Error
        );
    }

    #[test]
    #[traced_test]
    fn test_rejection_is_logged() {
        let code = StatusCode::from_validation(Err("status item x already exists"));

        assert_eq!(code, StatusCode::Error);
        assert!(logs_contain("Rejected: status item x already exists"));
    }
}
