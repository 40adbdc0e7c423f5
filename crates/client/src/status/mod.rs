//! Status items, the status database and status posting.

mod codec;
mod database;
mod item;
mod sender;

pub use codec::{decode_status, encode_status};
pub use database::StatusDatabase;
pub use item::{ItemKind, StatusItem};
pub use sender::{BusStatusSender, LogStatusSender, StatusSender};

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Declared type of a status item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusType {
    /// 32-bit integer
    Int,
    /// Double precision float
    Double,
    /// Single precision float
    Float,
    /// String
    String,
    /// Boolean, sent as an integer
    Boolean,
    /// Signed byte, sent as an integer
    Byte,
    /// 16-bit integer, sent as an integer
    Short,
}

impl StatusType {
    /// The value a new item of this type starts with.
    #[must_use]
    pub fn initial_value(self) -> StatusValue {
        match self {
            Self::Int => StatusValue::Int(0),
            Self::Double => StatusValue::Double(0.0),
            Self::Float => StatusValue::Float(0.0),
            Self::String => StatusValue::String(String::new()),
            Self::Boolean => StatusValue::Boolean(false),
            Self::Byte => StatusValue::Byte(0),
            Self::Short => StatusValue::Short(0),
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "INT",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Boolean => "BOOLEAN",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
        };
        f.write_str(name)
    }
}

/// A typed status value.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusValue {
    /// 32-bit integer
    Int(i32),
    /// Double precision float
    Double(f64),
    /// Single precision float
    Float(f32),
    /// String
    String(String),
    /// Boolean
    Boolean(bool),
    /// Signed byte
    Byte(i8),
    /// 16-bit integer
    Short(i16),
}

impl StatusValue {
    /// The type of this value.
    #[must_use]
    pub const fn status_type(&self) -> StatusType {
        match self {
            Self::Int(_) => StatusType::Int,
            Self::Double(_) => StatusType::Double,
            Self::Float(_) => StatusType::Float,
            Self::String(_) => StatusType::String,
            Self::Boolean(_) => StatusType::Boolean,
            Self::Byte(_) => StatusType::Byte,
            Self::Short(_) => StatusType::Short,
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
        }
    }
}

/// Alarm severity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlarmSeverity {
    /// No alarm
    #[default]
    Ok,
    /// Warning
    Warning,
    /// Failure
    Failure,
}

impl AlarmSeverity {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Failure => 2,
        }
    }

    /// Severity for a wire code.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Warning),
            2 => Some(Self::Failure),
            _ => None,
        }
    }
}

/// Why an alarm was raised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlarmCause {
    /// No alarm
    #[default]
    Ok,
    /// Above the high-high limit
    HiHi,
    /// Above the high limit
    Hi,
    /// Below the low-low limit
    LoLo,
    /// Below the low limit
    Lo,
    /// Something else; requires a message
    Other,
}

impl AlarmCause {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Ok => 0,
            Self::HiHi => 1,
            Self::Hi => 2,
            Self::LoLo => 3,
            Self::Lo => 4,
            Self::Other => 5,
        }
    }

    /// Cause for a wire code.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::HiHi),
            2 => Some(Self::Hi),
            3 => Some(Self::LoLo),
            4 => Some(Self::Lo),
            5 => Some(Self::Other),
            _ => None,
        }
    }
}

/// The alarm part of an alarm item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlarmState {
    /// Severity
    pub severity: AlarmSeverity,
    /// Cause
    pub cause: AlarmCause,
    /// Explanation, required for [`AlarmCause::Other`]
    pub message: Option<String>,
}

impl AlarmState {
    /// Builds a normalized alarm state.
    ///
    /// An empty message counts as no message, and severity OK clears both the
    /// cause and the message.
    ///
    /// # Errors
    ///
    /// Cause OTHER without a message is rejected.
    pub fn new(
        name: &str,
        severity: AlarmSeverity,
        cause: AlarmCause,
        message: Option<&str>,
    ) -> Result<Self, ValidationError> {
        if severity == AlarmSeverity::Ok {
            return Ok(Self::default());
        }

        let message = message.filter(|m| !m.is_empty()).map(ToString::to_string);
        if cause == AlarmCause::Other && message.is_none() {
            return Err(ValidationError::MissingAlarmMessage(name.to_string()));
        }

        Ok(Self {
            severity,
            cause,
            message,
        })
    }
}

/// Health of a subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Health {
    /// Working
    Good,
    /// Degraded
    Warning,
    /// Not working
    Bad,
}

impl Health {
    /// The integer stored as the item value.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Good => 0,
            Self::Warning => 1,
            Self::Bad => 2,
        }
    }

    /// Health for a stored integer.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Good),
            1 => Some(Self::Warning),
            2 => Some(Self::Bad),
            _ => None,
        }
    }
}

/// Point-in-time copy of an item, as encoded on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    /// Item name
    pub name: String,
    /// Current value
    pub value: StatusValue,
    /// Time of the last change, millisecond precision
    pub timestamp: DateTime<Utc>,
    /// Kind specific payload
    pub kind: SnapshotKind,
}

/// Kind specific part of a [`StatusSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Plain item
    Plain,
    /// Alarm item
    Alarm(AlarmState),
    /// Health item
    Health,
}

/// Caller mistakes reported as [`crate::StatusCode::Error`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    /// No item by that name.
    #[error("no status item named {0}")]
    UnknownItem(String),

    /// An item by that name already exists.
    #[error("status item {0} already exists")]
    DuplicateItem(String),

    /// Empty item name.
    #[error("status item name must not be empty")]
    EmptyName,

    /// Value of the wrong type.
    #[error("status item {name} holds {expected}, not {actual}")]
    TypeMismatch {
        /// Item name
        name: String,
        /// Declared type
        expected: StatusType,
        /// Supplied type
        actual: StatusType,
    },

    /// Alarm operation on an item without alarm.
    #[error("status item {0} is not an alarm item")]
    NotAnAlarm(String),

    /// Health operation on an item that is not a health item.
    #[error("status item {0} is not a health item")]
    NotHealth(String),

    /// Generic value change on a health item.
    #[error("health item {0} only changes through set_health")]
    HealthValueReadOnly(String),

    /// Cause OTHER without a message.
    #[error("alarm on {0} with cause OTHER needs a message")]
    MissingAlarmMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_ok_severity_clears_cause_and_message() {
        let state =
            AlarmState::new("x", AlarmSeverity::Ok, AlarmCause::Other, Some("ignored")).unwrap();

        assert_eq!(state, AlarmState::default());
    }

    #[test]
    fn test_other_requires_message() {
        assert_matches!(
            AlarmState::new("x", AlarmSeverity::Warning, AlarmCause::Other, Some("")),
            Err(ValidationError::MissingAlarmMessage(_))
        );
        assert_matches!(
            AlarmState::new("x", AlarmSeverity::Warning, AlarmCause::Other, None),
            Err(ValidationError::MissingAlarmMessage(_))
        );
        assert!(AlarmState::new("x", AlarmSeverity::Failure, AlarmCause::Hi, Some("")).is_ok());
    }

    #[test]
    fn test_codes_round_trip() {
        for code in 0..=5 {
            assert_eq!(AlarmCause::from_code(code).unwrap().code(), code);
        }
        assert_eq!(AlarmSeverity::from_code(3), None);
        assert_eq!(Health::from_code(Health::Bad.code()), Some(Health::Bad));
    }
}
