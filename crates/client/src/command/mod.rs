//! Sequence commands, activities and the handler contract.

mod completion;
mod consumer;
mod holder;
mod registry;

pub use completion::CompletionInfoSender;
pub use consumer::SequenceCommandConsumer;
pub use holder::ActivityHolder;
pub use registry::CommandRegistry;

use std::fmt;
use std::str::FromStr;

use crate::topics::{ERROR_MESSAGE_KEY, HANDLER_RESPONSE_KEY};

use async_trait::async_trait;
use giapi_bus::{MapBody, MapValue, Message};
use indexmap::IndexMap;

/// Identifier the GMP assigns to each command it sends.
pub type ActionId = i32;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $keyword:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire keyword.
            #[must_use]
            pub const fn keyword(self) -> &'static str {
                match self {
                    $(Self::$variant => $keyword),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.keyword())
            }
        }

        impl FromStr for $name {
            type Err = UnknownKeyword;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($keyword => Ok(Self::$variant),)+
                    other => Err(UnknownKeyword(other.to_string())),
                }
            }
        }
    };
}

/// A string did not name any known value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown keyword: {0}")]
pub struct UnknownKeyword(pub String);

keyword_enum! {
    /// Coarse instrument operations the GMP can request.
    SequenceCommand {
        /// Self test
        Test => "TEST",
        /// Reboot
        Reboot => "REBOOT",
        /// Initialize
        Init => "INIT",
        /// Datum mechanisms
        Datum => "DATUM",
        /// Park mechanisms
        Park => "PARK",
        /// Verify configuration
        Verify => "VERIFY",
        /// End verification
        EndVerify => "END_VERIFY",
        /// Start guiding
        Guide => "GUIDE",
        /// Stop guiding
        EndGuide => "END_GUIDE",
        /// Apply a configuration; routed by prefix
        Apply => "APPLY",
        /// Take an observation
        Observe => "OBSERVE",
        /// End the observation
        EndObserve => "END_OBSERVE",
        /// Pause the observation
        Pause => "PAUSE",
        /// Continue a paused observation
        Continue => "CONTINUE",
        /// Stop the observation
        Stop => "STOP",
        /// Stop at the end of the current cycle
        StopCycle => "STOP_CYCLE",
        /// Abort the observation
        Abort => "ABORT",
        /// Engineering command
        Engineering => "ENGINEERING",
    }
}

keyword_enum! {
    /// Phase of a sequence command.
    Activity {
        /// Prepare
        Preset => "PRESET",
        /// Execute
        Start => "START",
        /// Prepare and execute
        PresetStart => "PRESET_START",
        /// Cancel
        Cancel => "CANCEL",
    }
}

keyword_enum! {
    /// The activities a handler subscribes to.
    ActivitySet {
        /// PRESET only
        SetPreset => "SET_PRESET",
        /// START only
        SetStart => "SET_START",
        /// PRESET, START and PRESET_START
        SetPresetStart => "SET_PRESET_START",
        /// CANCEL only
        SetCancel => "SET_CANCEL",
        /// PRESET and CANCEL
        SetPresetCancel => "SET_PRESET_CANCEL",
        /// START and CANCEL
        SetStartCancel => "SET_START_CANCEL",
        /// Everything
        SetPresetStartCancel => "SET_PRESET_START_CANCEL",
    }
}

impl ActivitySet {
    /// Activities whose messages this set receives.
    #[must_use]
    pub const fn activities(self) -> &'static [Activity] {
        match self {
            Self::SetPreset => &[Activity::Preset],
            Self::SetStart => &[Activity::Start],
            Self::SetPresetStart => &[Activity::Preset, Activity::Start, Activity::PresetStart],
            Self::SetCancel => &[Activity::Cancel],
            Self::SetPresetCancel => &[Activity::Preset, Activity::Cancel],
            Self::SetStartCancel => &[Activity::Start, Activity::Cancel],
            Self::SetPresetStartCancel => &[
                Activity::Preset,
                Activity::Start,
                Activity::PresetStart,
                Activity::Cancel,
            ],
        }
    }

    /// Activity keys a registration of this set occupies.
    #[must_use]
    pub const fn holder_keys(self) -> &'static [Activity] {
        match self {
            Self::SetPreset => &[Activity::Preset],
            Self::SetStart => &[Activity::Start],
            Self::SetPresetStart => &[Activity::PresetStart],
            Self::SetCancel => &[Activity::Cancel],
            Self::SetPresetCancel => &[Activity::Preset, Activity::Cancel],
            Self::SetStartCancel => &[Activity::Start, Activity::Cancel],
            Self::SetPresetStartCancel => &[Activity::Preset, Activity::Cancel, Activity::Start],
        }
    }
}

keyword_enum! {
    /// Handler answer to a command.
    Response {
        /// The command was accepted and will complete later
        Accepted => "ACCEPTED",
        /// The command started and will complete later
        Started => "STARTED",
        /// The command already completed
        Completed => "COMPLETED",
        /// The command failed
        Error => "ERROR",
    }
}

/// What a [`SequenceCommandHandler`] returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerResponse {
    response: Response,
    message: Option<String>,
}

impl HandlerResponse {
    /// Command accepted.
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            response: Response::Accepted,
            message: None,
        }
    }

    /// Command started.
    #[must_use]
    pub const fn started() -> Self {
        Self {
            response: Response::Started,
            message: None,
        }
    }

    /// Command completed.
    #[must_use]
    pub const fn completed() -> Self {
        Self {
            response: Response::Completed,
            message: None,
        }
    }

    /// Command failed with `message`.
    pub fn error<K>(message: K) -> Self
    where
        K: Into<String>,
    {
        Self {
            response: Response::Error,
            message: Some(message.into()),
        }
    }

    /// The response kind.
    #[must_use]
    pub const fn response(&self) -> Response {
        self.response
    }

    /// The error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Encodes the response as a map message.
    #[must_use]
    pub fn to_message(&self) -> Message {
        let mut map = MapBody::new();
        map.insert(
            HANDLER_RESPONSE_KEY.to_string(),
            MapValue::from(self.response.keyword()),
        );
        if let Some(message) = &self.message {
            map.insert(ERROR_MESSAGE_KEY.to_string(), MapValue::from(message.as_str()));
        }
        Message::map(map)
    }

    /// Decodes a response written by [`Self::to_message`].
    #[must_use]
    pub fn from_message(message: &Message) -> Option<Self> {
        let map = message.as_map()?;
        let response = map.get(HANDLER_RESPONSE_KEY)?.as_str()?.parse().ok()?;
        let message = map
            .get(ERROR_MESSAGE_KEY)
            .and_then(MapValue::as_str)
            .map(ToString::to_string);
        Some(Self { response, message })
    }
}

/// Ordered configuration attached to a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: IndexMap<String, String>,
}

impl Configuration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.insert(key.into(), value.into());
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Keys in arrival order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Configuration {
    /// Reads the configuration carried by a command message.
    ///
    /// Anything but a map body yields an empty configuration.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        message.as_map().map_or_else(Self::default, |map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value.to_string()))
                .collect()
        })
    }
}

impl<K, V> FromIterator<(K, V)> for Configuration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Instrument code that executes sequence commands.
#[async_trait]
pub trait SequenceCommandHandler: Send + Sync + 'static {
    /// Executes `activity` of `command`.
    async fn handle(
        &self,
        action_id: ActionId,
        command: SequenceCommand,
        activity: Activity,
        config: Configuration,
    ) -> HandlerResponse;
}

/// What a command consumer is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandKey {
    /// A sequence command other than APPLY.
    Sequence(SequenceCommand),

    /// An APPLY configuration prefix.
    Apply(String),
}

impl CommandKey {
    /// The command handlers see.
    #[must_use]
    pub const fn command(&self) -> SequenceCommand {
        match self {
            Self::Sequence(command) => *command,
            Self::Apply(_) => SequenceCommand::Apply,
        }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(command) => write!(f, "{command}"),
            Self::Apply(prefix) => write!(f, "APPLY:{prefix}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_parse_back() {
        for command in SequenceCommand::ALL {
            assert_eq!(command.keyword().parse::<SequenceCommand>(), Ok(*command));
        }
        assert_eq!("PRESET_START".parse::<Activity>(), Ok(Activity::PresetStart));
        assert!("RESET".parse::<Activity>().is_err());
    }

    #[test]
    fn test_holder_keys_are_subset_of_selected_activities() {
        for set in ActivitySet::ALL {
            for key in set.holder_keys() {
                assert!(set.activities().contains(key), "{set} {key}");
            }
        }
    }

    #[test]
    fn test_error_response_carries_message() {
        let message = HandlerResponse::error("filter wheel stuck").to_message();

        let map = message.as_map().unwrap();
        assert_eq!(map[HANDLER_RESPONSE_KEY], MapValue::from("ERROR"));
        assert_eq!(map[ERROR_MESSAGE_KEY], MapValue::from("filter wheel stuck"));
        assert_eq!(
            HandlerResponse::from_message(&message),
            Some(HandlerResponse::error("filter wheel stuck"))
        );
        assert!(!HandlerResponse::completed().to_message().as_map().unwrap().contains_key(ERROR_MESSAGE_KEY));
    }

    #[test]
    fn test_configuration_from_non_map_is_empty() {
        assert!(Configuration::from_message(&Message::text("x")).is_empty());
    }

    #[test]
    fn test_configuration_keeps_order() {
        let config: Configuration = [("gpi:b", "2"), ("gpi:a", "1")].into_iter().collect();

        assert_eq!(config.keys().collect::<Vec<_>>(), ["gpi:b", "gpi:a"]);
        assert_eq!(config.get("gpi:a"), Some("1"));
        assert_eq!(config.len(), 2);
    }
}
