use crate::status::{
    AlarmCause, AlarmSeverity, AlarmState, Health, SnapshotKind, StatusSnapshot, StatusType,
    StatusValue, ValidationError,
};

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// What a status item can do beyond holding a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    /// Value only
    Plain,
    /// Value plus alarm state
    Alarm,
    /// Health, stored as an INT value
    Health,
}

#[derive(Debug)]
struct ItemState {
    value: StatusValue,
    timestamp: DateTime<Utc>,
    alarm: AlarmState,
}

fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A named, typed value with change tracking.
///
/// New items are dirty so that the first post publishes their initial value.
#[derive(Debug)]
pub struct StatusItem {
    name: String,
    status_type: StatusType,
    kind: ItemKind,
    state: Mutex<ItemState>,
    dirty: AtomicBool,
}

impl StatusItem {
    pub(crate) fn new(name: &str, status_type: StatusType, kind: ItemKind) -> Self {
        let value = match kind {
            ItemKind::Health => StatusValue::Int(Health::Good.code()),
            ItemKind::Plain | ItemKind::Alarm => status_type.initial_value(),
        };

        Self {
            name: name.to_string(),
            status_type,
            kind,
            state: Mutex::new(ItemState {
                value,
                timestamp: now(),
                alarm: AlarmState::default(),
            }),
            dirty: AtomicBool::new(true),
        }
    }

    /// Item name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub const fn status_type(&self) -> StatusType {
        self.status_type
    }

    /// Item kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> StatusValue {
        self.state.lock().value.clone()
    }

    /// Time of the last change.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.state.lock().timestamp
    }

    /// Alarm state of an alarm item.
    #[must_use]
    pub fn alarm_state(&self) -> Option<AlarmState> {
        (self.kind == ItemKind::Alarm).then(|| self.state.lock().alarm.clone())
    }

    /// Health of a health item.
    #[must_use]
    pub fn health(&self) -> Option<Health> {
        if self.kind != ItemKind::Health {
            return None;
        }
        match self.state.lock().value {
            StatusValue::Int(code) => Health::from_code(code),
            _ => None,
        }
    }

    /// Whether the item changed since it was last posted.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Sets the value. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Rejects values of another type and any change of a health item.
    pub fn set_value(&self, value: StatusValue) -> Result<bool, ValidationError> {
        if self.kind == ItemKind::Health {
            return Err(ValidationError::HealthValueReadOnly(self.name.clone()));
        }
        self.store_value(value)
    }

    fn store_value(&self, value: StatusValue) -> Result<bool, ValidationError> {
        if value.status_type() != self.status_type {
            return Err(ValidationError::TypeMismatch {
                name: self.name.clone(),
                expected: self.status_type,
                actual: value.status_type(),
            });
        }

        let mut state = self.state.lock();
        if state.value == value {
            return Ok(false);
        }
        state.value = value;
        state.timestamp = now();
        self.dirty.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Sets the alarm of an alarm item. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Rejects items without alarm and cause OTHER without a message.
    pub fn set_alarm(
        &self,
        severity: AlarmSeverity,
        cause: AlarmCause,
        message: Option<&str>,
    ) -> Result<bool, ValidationError> {
        if self.kind != ItemKind::Alarm {
            return Err(ValidationError::NotAnAlarm(self.name.clone()));
        }
        let alarm = AlarmState::new(&self.name, severity, cause, message)?;

        let mut state = self.state.lock();
        if state.alarm == alarm {
            return Ok(false);
        }
        state.alarm = alarm;
        state.timestamp = now();
        self.dirty.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Clears the alarm of an alarm item. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Rejects items without alarm.
    pub fn clear_alarm(&self) -> Result<bool, ValidationError> {
        self.set_alarm(AlarmSeverity::Ok, AlarmCause::Ok, None)
    }

    /// Sets the health of a health item. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Rejects items that are not health items.
    pub fn set_health(&self, health: Health) -> Result<bool, ValidationError> {
        if self.kind != ItemKind::Health {
            return Err(ValidationError::NotHealth(self.name.clone()));
        }
        self.store_value(StatusValue::Int(health.code()))
    }

    /// Clears the dirty flag, returning whether it was set.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Copies the item for encoding.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock();
        let kind = match self.kind {
            ItemKind::Plain => SnapshotKind::Plain,
            ItemKind::Alarm => SnapshotKind::Alarm(state.alarm.clone()),
            ItemKind::Health => SnapshotKind::Health,
        };
        StatusSnapshot {
            name: self.name.clone(),
            value: state.value.clone(),
            timestamp: state.timestamp,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_new_item_is_dirty_with_initial_value() {
        let item = StatusItem::new("gpi:temp", StatusType::Double, ItemKind::Plain);

        assert!(item.is_dirty());
        assert_eq!(item.value(), StatusValue::Double(0.0));
    }

    #[test]
    fn test_same_value_does_not_mark_dirty() {
        let item = StatusItem::new("x", StatusType::Int, ItemKind::Plain);
        assert_eq!(item.set_value(StatusValue::Int(5)), Ok(true));
        assert!(item.take_dirty());

        assert_eq!(item.set_value(StatusValue::Int(5)), Ok(false));
        assert!(!item.is_dirty());
    }

    #[test]
    fn test_type_mismatch_has_no_side_effects() {
        let item = StatusItem::new("x", StatusType::Int, ItemKind::Plain);
        item.take_dirty();

        assert_matches!(
            item.set_value(StatusValue::String("5".to_string())),
            Err(ValidationError::TypeMismatch { .. })
        );
        assert_eq!(item.value(), StatusValue::Int(0));
        assert!(!item.is_dirty());
    }

    #[test]
    fn test_identical_alarm_is_idempotent() {
        let item = StatusItem::new("a", StatusType::Int, ItemKind::Alarm);
        assert_eq!(
            item.set_alarm(AlarmSeverity::Warning, AlarmCause::Hi, Some("hot")),
            Ok(true)
        );
        item.take_dirty();

        assert_eq!(
            item.set_alarm(AlarmSeverity::Warning, AlarmCause::Hi, Some("hot")),
            Ok(false)
        );
        assert!(!item.is_dirty());
    }

    #[test]
    fn test_ok_alarm_normalizes() {
        let item = StatusItem::new("a", StatusType::Int, ItemKind::Alarm);
        item.set_alarm(AlarmSeverity::Failure, AlarmCause::Other, Some("broken"))
            .unwrap();

        item.set_alarm(AlarmSeverity::Ok, AlarmCause::LoLo, Some("whatever"))
            .unwrap();

        assert_eq!(item.alarm_state(), Some(AlarmState::default()));
    }

    #[test]
    fn test_health_items() {
        let item = StatusItem::new("h", StatusType::Int, ItemKind::Health);

        assert_eq!(item.health(), Some(Health::Good));
        assert_matches!(
            item.set_value(StatusValue::Int(2)),
            Err(ValidationError::HealthValueReadOnly(_))
        );
        assert_eq!(item.set_health(Health::Bad), Ok(true));
        assert_eq!(item.value(), StatusValue::Int(2));
        assert_matches!(
            item.set_alarm(AlarmSeverity::Warning, AlarmCause::Hi, None),
            Err(ValidationError::NotAnAlarm(_))
        );
    }
}
