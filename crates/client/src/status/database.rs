use crate::status::{
    AlarmCause, AlarmSeverity, Health, ItemKind, StatusItem, StatusType, StatusValue,
    ValidationError,
};

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::debug;

/// Process-wide table of status items.
///
/// Items are looked up by name and iterated in creation order.
#[derive(Debug, Default)]
pub struct StatusDatabase {
    items: DashMap<String, Arc<StatusItem>>,
    order: RwLock<Vec<Arc<StatusItem>>>,
}

impl StatusDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &self,
        name: &str,
        status_type: StatusType,
        kind: ItemKind,
    ) -> Result<Arc<StatusItem>, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        // Holding the order lock across the entry keeps both views in step.
        let mut order = self.order.write();
        match self.items.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ValidationError::DuplicateItem(name.to_string())),
            Entry::Vacant(entry) => {
                let item = Arc::new(StatusItem::new(name, status_type, kind));
                entry.insert(item.clone());
                order.push(item.clone());
                debug!("Created status item {} ({})", name, status_type);
                Ok(item)
            }
        }
    }

    /// Creates a plain item.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or already taken.
    pub fn create_status_item(
        &self,
        name: &str,
        status_type: StatusType,
    ) -> Result<Arc<StatusItem>, ValidationError> {
        self.insert(name, status_type, ItemKind::Plain)
    }

    /// Creates an item with alarm state.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or already taken.
    pub fn create_alarm_status_item(
        &self,
        name: &str,
        status_type: StatusType,
    ) -> Result<Arc<StatusItem>, ValidationError> {
        self.insert(name, status_type, ItemKind::Alarm)
    }

    /// Creates a health item, initially GOOD.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or already taken.
    pub fn create_health_status_item(&self, name: &str) -> Result<Arc<StatusItem>, ValidationError> {
        self.insert(name, StatusType::Int, ItemKind::Health)
    }

    /// Looks up an item.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<StatusItem>> {
        self.items.get(name).map(|item| item.value().clone())
    }

    fn require(&self, name: &str) -> Result<Arc<StatusItem>, ValidationError> {
        self.get(name)
            .ok_or_else(|| ValidationError::UnknownItem(name.to_string()))
    }

    /// Sets the value of an item. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Fails for unknown items, health items and mismatched types.
    pub fn set_value(&self, name: &str, value: StatusValue) -> Result<bool, ValidationError> {
        self.require(name)?.set_value(value)
    }

    /// Sets the value of an INT item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_int(&self, name: &str, value: i32) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Int(value))
    }

    /// Sets the value of a STRING item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_string(&self, name: &str, value: &str) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::String(value.to_string()))
    }

    /// Sets the value of a DOUBLE item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_double(&self, name: &str, value: f64) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Double(value))
    }

    /// Sets the value of a FLOAT item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_float(&self, name: &str, value: f32) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Float(value))
    }

    /// Sets the value of a BOOLEAN item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_boolean(&self, name: &str, value: bool) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Boolean(value))
    }

    /// Sets the value of a BYTE item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_byte(&self, name: &str, value: i8) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Byte(value))
    }

    /// Sets the value of a SHORT item.
    ///
    /// # Errors
    ///
    /// See [`StatusDatabase::set_value`].
    pub fn set_value_as_short(&self, name: &str, value: i16) -> Result<bool, ValidationError> {
        self.set_value(name, StatusValue::Short(value))
    }

    /// Sets the alarm of an alarm item.
    ///
    /// # Errors
    ///
    /// Fails for unknown items, items without alarm, and cause OTHER
    /// without a message.
    pub fn set_alarm(
        &self,
        name: &str,
        severity: AlarmSeverity,
        cause: AlarmCause,
        message: Option<&str>,
    ) -> Result<bool, ValidationError> {
        self.require(name)?.set_alarm(severity, cause, message)
    }

    /// Clears the alarm of an alarm item.
    ///
    /// # Errors
    ///
    /// Fails for unknown items and items without alarm.
    pub fn clear_alarm(&self, name: &str) -> Result<bool, ValidationError> {
        self.require(name)?.clear_alarm()
    }

    /// Sets the health of a health item.
    ///
    /// # Errors
    ///
    /// Fails for unknown items and items that are not health items.
    pub fn set_health(&self, name: &str, health: Health) -> Result<bool, ValidationError> {
        self.require(name)?.set_health(health)
    }

    /// All items in creation order.
    #[must_use]
    pub fn items(&self) -> Vec<Arc<StatusItem>> {
        self.order.read().clone()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_duplicate_creation_fails() {
        let db = StatusDatabase::new();
        db.create_status_item("x", StatusType::Int).unwrap();

        assert_matches!(
            db.create_alarm_status_item("x", StatusType::Double),
            Err(ValidationError::DuplicateItem(_))
        );
        assert_matches!(
            db.create_status_item("", StatusType::Int),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_items_keep_creation_order() {
        let db = StatusDatabase::new();
        for name in ["c", "a", "b"] {
            db.create_status_item(name, StatusType::String).unwrap();
        }

        let names: Vec<_> = db.items().iter().map(|i| i.name().to_string()).collect();

        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn test_kind_checks() {
        let db = StatusDatabase::new();
        db.create_status_item("plain", StatusType::Int).unwrap();
        db.create_health_status_item("health").unwrap();

        assert_matches!(
            db.set_alarm("plain", AlarmSeverity::Warning, AlarmCause::Hi, None),
            Err(ValidationError::NotAnAlarm(_))
        );
        assert_matches!(
            db.set_alarm("missing", AlarmSeverity::Warning, AlarmCause::Hi, None),
            Err(ValidationError::UnknownItem(_))
        );
        assert_matches!(
            db.set_health("plain", Health::Bad),
            Err(ValidationError::NotHealth(_))
        );
        assert_matches!(
            db.set_value_as_int("health", 1),
            Err(ValidationError::HealthValueReadOnly(_))
        );
        assert_eq!(db.set_health("health", Health::Warning), Ok(true));
    }

    #[test]
    fn test_typed_setters() {
        let db = StatusDatabase::new();
        db.create_status_item("f", StatusType::Float).unwrap();

        assert_eq!(db.set_value_as_float("f", 1.5), Ok(true));
        assert_matches!(
            db.set_value_as_double("f", 1.5),
            Err(ValidationError::TypeMismatch { .. })
        );
        assert_eq!(db.get("f").unwrap().value(), StatusValue::Float(1.5));
    }

    #[test]
    fn test_narrow_type_setters() {
        let db = StatusDatabase::new();
        db.create_status_item("flag", StatusType::Boolean).unwrap();
        db.create_status_item("mode", StatusType::Byte).unwrap();
        db.create_status_item("step", StatusType::Short).unwrap();

        assert_eq!(db.set_value_as_boolean("flag", true), Ok(true));
        assert_eq!(db.set_value_as_boolean("flag", true), Ok(false));
        assert_eq!(db.set_value_as_byte("mode", -3), Ok(true));
        assert_eq!(db.set_value_as_short("step", 1200), Ok(true));
        assert_matches!(
            db.set_value_as_short("mode", 1),
            Err(ValidationError::TypeMismatch { .. })
        );
        assert_matches!(
            db.set_value_as_int("flag", 1),
            Err(ValidationError::TypeMismatch { .. })
        );

        assert_eq!(db.get("flag").unwrap().value(), StatusValue::Boolean(true));
        assert_eq!(db.get("mode").unwrap().value(), StatusValue::Byte(-3));
        assert_eq!(db.get("step").unwrap().value(), StatusValue::Short(1200));
    }
}
