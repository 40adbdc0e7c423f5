use crate::Giapi;
use crate::error::Result;
use crate::status::{
    AlarmCause, AlarmSeverity, Health, StatusType, StatusValue, ValidationError,
};
use crate::status_code::StatusCode;

fn code<T>(result: std::result::Result<T, ValidationError>) -> StatusCode {
    StatusCode::from_validation(result.map(|_| ()))
}

/// Status item creation, updates and posting.
#[derive(Clone, Copy, Debug)]
pub struct StatusUtil<'a> {
    giapi: &'a Giapi,
}

impl<'a> StatusUtil<'a> {
    pub(crate) const fn new(giapi: &'a Giapi) -> Self {
        Self { giapi }
    }

    /// Creates a plain item. A taken name is an error.
    #[must_use]
    pub fn create_status_item(&self, name: &str, status_type: StatusType) -> StatusCode {
        code(
            self.giapi
                .status_database()
                .create_status_item(name, status_type),
        )
    }

    /// Creates an alarm item. A taken name is an error.
    #[must_use]
    pub fn create_alarm_status_item(&self, name: &str, status_type: StatusType) -> StatusCode {
        code(
            self.giapi
                .status_database()
                .create_alarm_status_item(name, status_type),
        )
    }

    /// Creates a health item. A taken name is an error.
    #[must_use]
    pub fn create_health_status_item(&self, name: &str) -> StatusCode {
        code(self.giapi.status_database().create_health_status_item(name))
    }

    /// Sets an item of any type. The value must match the item's type.
    #[must_use]
    pub fn set_value(&self, name: &str, value: StatusValue) -> StatusCode {
        code(self.giapi.status_database().set_value(name, value))
    }

    /// Sets an INT item.
    #[must_use]
    pub fn set_value_as_int(&self, name: &str, value: i32) -> StatusCode {
        code(self.giapi.status_database().set_value_as_int(name, value))
    }

    /// Sets a STRING item.
    #[must_use]
    pub fn set_value_as_string(&self, name: &str, value: &str) -> StatusCode {
        code(self.giapi.status_database().set_value_as_string(name, value))
    }

    /// Sets a DOUBLE item.
    #[must_use]
    pub fn set_value_as_double(&self, name: &str, value: f64) -> StatusCode {
        code(self.giapi.status_database().set_value_as_double(name, value))
    }

    /// Sets a FLOAT item.
    #[must_use]
    pub fn set_value_as_float(&self, name: &str, value: f32) -> StatusCode {
        code(self.giapi.status_database().set_value_as_float(name, value))
    }

    /// Sets a BOOLEAN item.
    #[must_use]
    pub fn set_value_as_boolean(&self, name: &str, value: bool) -> StatusCode {
        code(self.giapi.status_database().set_value_as_boolean(name, value))
    }

    /// Sets a BYTE item.
    #[must_use]
    pub fn set_value_as_byte(&self, name: &str, value: i8) -> StatusCode {
        code(self.giapi.status_database().set_value_as_byte(name, value))
    }

    /// Sets a SHORT item.
    #[must_use]
    pub fn set_value_as_short(&self, name: &str, value: i16) -> StatusCode {
        code(self.giapi.status_database().set_value_as_short(name, value))
    }

    /// Sets the alarm of an alarm item.
    #[must_use]
    pub fn set_alarm(
        &self,
        name: &str,
        severity: AlarmSeverity,
        cause: AlarmCause,
        message: Option<&str>,
    ) -> StatusCode {
        code(
            self.giapi
                .status_database()
                .set_alarm(name, severity, cause, message),
        )
    }

    /// Clears the alarm of an alarm item.
    #[must_use]
    pub fn clear_alarm(&self, name: &str) -> StatusCode {
        code(self.giapi.status_database().clear_alarm(name))
    }

    /// Sets the health of a health item.
    #[must_use]
    pub fn set_health(&self, name: &str, health: Health) -> StatusCode {
        code(self.giapi.status_database().set_health(name, health))
    }

    /// Posts `name` if it changed since its last post.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the post fails.
    pub async fn post_status(&self, name: &str) -> Result<StatusCode> {
        self.giapi
            .status_sender()
            .post_status(self.giapi.status_database(), name)
            .await
    }

    /// Posts every changed item in creation order.
    ///
    /// # Errors
    ///
    /// Per-item failures are logged, not returned.
    pub async fn post_all_status(&self) -> Result<StatusCode> {
        self.giapi
            .status_sender()
            .post_all_status(self.giapi.status_database())
            .await
    }
}
