//! Mapping from GIAPI identifiers to bus destinations and selectors.

use crate::command::{ActivitySet, CommandKey, SequenceCommand};

use giapi_bus::{Destination, Selector};

/// Separator between name components.
pub const SEPARATOR: &str = ".";

/// Root of sequence command topics.
pub const SEQUENCE_COMMAND_PREFIX: &str = "GMP.SC";
/// Completion information topic.
pub const COMPLETION_INFO_TOPIC: &str = "GMP.SC.COMPLETION_INFO";
/// Root of EPICS status topics.
pub const EPICS_STATUS_PREFIX: &str = "GMP.GEMINI.EPICS";
/// Queue answering with the subscribable EPICS channels.
pub const EPICS_CHANNELS_QUEUE: &str = "GMP.GEMINI.EPICS.CHANNELS";
/// Queue answering single EPICS channel reads.
pub const EPICS_GET_QUEUE: &str = "GMP.GEMINI.EPICS.GET";
/// Queue answering TCS context requests.
pub const TCS_CONTEXT_QUEUE: &str = "GMP.GEMINI.TCS.CONTEXT";
/// PCS Zernike update topic.
pub const PCS_UPDATE_TOPIC: &str = "GMP.GEMINI.PCS.UPDATE";
/// Status item topic.
pub const STATUS_TOPIC: &str = "GMP.STATUS";
/// Utility request queue.
pub const UTIL_REQUEST_QUEUE: &str = "GMP.UTIL.REQUEST";
/// System log topic.
pub const SERVICES_LOG_TOPIC: &str = "GMP.SERVICES.LOG";
/// Observation event topic.
pub const OBSERVATION_EVENT_TOPIC: &str = "GMP.DATA.OBSEVENT";
/// File event topic.
pub const FILE_EVENT_TOPIC: &str = "GMP.DATA.FILE_EVENT";

/// Command action id property.
pub const ACTION_ID_PROPERTY: &str = "ActionId";
/// Command activity property.
pub const ACTIVITY_PROPERTY: &str = "Activity";
/// Reply key holding the response kind.
pub const HANDLER_RESPONSE_KEY: &str = "HANDLER_RESPONSE";
/// Reply key holding the error message.
pub const ERROR_MESSAGE_KEY: &str = "ERROR_MESSAGE";
/// EPICS get request property.
pub const CHANNEL_NAME_PROPERTY: &str = "CHANNEL_NAME";
/// Utility request type property.
pub const REQUEST_TYPE_PROPERTY: &str = "RequestType";
/// Utility request type asking for a property.
pub const PROPERTY_REQUEST_TYPE: i32 = 0;
/// Utility request key naming the property.
pub const PROPERTY_KEY: &str = "PropertyKey";
/// System log level property.
pub const LOG_LEVEL_PROPERTY: &str = "LOG_LEVEL";
/// File event type property.
pub const FILE_EVENT_TYPE_PROPERTY: &str = "FILE_EVENT_TYPE";
/// Observation event key naming the event.
pub const EVENT_KEY: &str = "EVENT";
/// Data event key holding the data label.
pub const DATA_LABEL_KEY: &str = "DATA_LABEL";
/// File event key holding the file name.
pub const FILENAME_KEY: &str = "FILENAME";
/// Intermediate file event key holding the hint.
pub const HINT_KEY: &str = "HINT";

/// Topic carrying `command`.
#[must_use]
pub fn sequence_command_topic(command: SequenceCommand) -> Destination {
    Destination::topic(format!(
        "{SEQUENCE_COMMAND_PREFIX}{SEPARATOR}{}",
        command.keyword()
    ))
}

/// Topic carrying APPLY commands for `prefix`.
#[must_use]
pub fn apply_topic(prefix: &str) -> Destination {
    Destination::topic(format!(
        "{SEQUENCE_COMMAND_PREFIX}{SEPARATOR}{}{SEPARATOR}{prefix}",
        SequenceCommand::Apply.keyword()
    ))
}

/// Topic a command consumer listens on.
#[must_use]
pub fn command_topic(key: &CommandKey) -> Destination {
    match key {
        CommandKey::Sequence(command) => sequence_command_topic(*command),
        CommandKey::Apply(prefix) => apply_topic(prefix),
    }
}

/// Topic carrying updates of `channel`.
#[must_use]
pub fn epics_topic(channel: &str) -> Destination {
    Destination::topic(format!(
        "{EPICS_STATUS_PREFIX}{SEPARATOR}{}",
        channel.to_uppercase()
    ))
}

/// Selector over the activity property matching `set`.
#[must_use]
pub fn activity_selector(set: ActivitySet) -> Selector {
    Selector::any_of(
        ACTIVITY_PROPERTY,
        set.activities().iter().map(|activity| activity.keyword()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use giapi_bus::Message;

    #[test]
    fn test_command_topics() {
        assert_eq!(
            sequence_command_topic(SequenceCommand::Observe).name(),
            "GMP.SC.OBSERVE"
        );
        assert_eq!(
            sequence_command_topic(SequenceCommand::EndVerify).name(),
            "GMP.SC.END_VERIFY"
        );
        assert_eq!(apply_topic("gpi:cc").name(), "GMP.SC.APPLY.gpi:cc");
        assert_eq!(
            command_topic(&CommandKey::Apply("gpi".to_string())),
            apply_topic("gpi")
        );
    }

    #[test]
    fn test_epics_topic_is_uppercased() {
        assert_eq!(
            epics_topic("tcs:sad:airMass").name(),
            "GMP.GEMINI.EPICS.TCS:SAD:AIRMASS"
        );
        assert!(epics_topic("x").is_topic());
    }

    #[test]
    fn test_selectors() {
        assert_eq!(
            activity_selector(ActivitySet::SetPresetStartCancel).to_string(),
            "Activity IN ('PRESET', 'START', 'PRESET_START', 'CANCEL')"
        );
        assert_eq!(
            activity_selector(ActivitySet::SetStartCancel).to_string(),
            "Activity IN ('START', 'CANCEL')"
        );

        let preset_start = activity_selector(ActivitySet::SetPresetStart);
        for keyword in ["PRESET", "START", "PRESET_START"] {
            assert!(preset_start.matches(&Message::empty().with_property(ACTIVITY_PROPERTY, keyword)));
        }
        assert!(!preset_start.matches(&Message::empty().with_property(ACTIVITY_PROPERTY, "CANCEL")));
    }
}
