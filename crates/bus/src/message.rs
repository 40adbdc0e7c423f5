use crate::destination::Destination;

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;
use uuid::Uuid;

/// A message-level property, usable in selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Property {
    /// Integer property.
    Int(i32),

    /// String property.
    String(String),
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<i32> for Property {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A typed entry of a map message body.
#[derive(Clone, Debug, PartialEq)]
pub enum MapValue {
    /// Signed byte.
    Byte(i8),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
}

impl MapValue {
    /// The string payload, if this is a string entry.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(value) => write!(f, "{value}"),
            Self::Short(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MapValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MapValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for MapValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MapValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Ordered key/value body.
pub type MapBody = IndexMap<String, MapValue>;

/// The payload of a message.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    /// No payload.
    #[default]
    Empty,

    /// Text payload.
    Text(String),

    /// Opaque bytes, usually written with [`crate::StreamWriter`].
    Bytes(Bytes),

    /// Ordered key/value payload.
    Map(MapBody),
}

/// A message travelling over the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    id: Uuid,
    properties: HashMap<String, Property>,
    reply_to: Option<Destination>,
    body: Body,
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Body::Empty)
    }
}

impl Message {
    /// Creates a message with the given body and a fresh id.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            id: Uuid::new_v4(),
            properties: HashMap::new(),
            reply_to: None,
            body,
        }
    }

    /// Creates a message without payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Body::Empty)
    }

    /// Creates a text message.
    pub fn text<K>(text: K) -> Self
    where
        K: Into<String>,
    {
        Self::new(Body::Text(text.into()))
    }

    /// Creates a bytes message.
    pub fn bytes<B>(bytes: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::new(Body::Bytes(bytes.into()))
    }

    /// Creates a map message.
    #[must_use]
    pub fn map(map: MapBody) -> Self {
        Self::new(Body::Map(map))
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Property>,
    {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the reply-to destination.
    #[must_use]
    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.reply_to = Some(destination);
        self
    }

    /// Sets the reply-to destination in place.
    pub fn set_reply_to(&mut self, destination: Destination) {
        self.reply_to = Some(destination);
    }

    /// The message id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Looks up a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Looks up an integer property.
    #[must_use]
    pub fn int_property(&self, key: &str) -> Option<i32> {
        match self.properties.get(key) {
            Some(Property::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Looks up a string property.
    #[must_use]
    pub fn string_property(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(Property::String(value)) => Some(value),
            _ => None,
        }
    }

    /// The reply-to destination, if any.
    #[must_use]
    pub const fn reply_to(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// The text payload, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The bytes payload, if this is a bytes message.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The map payload, if this is a map message.
    #[must_use]
    pub const fn as_map(&self) -> Option<&MapBody> {
        match &self.body {
            Body::Map(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_lookup_is_typed() {
        let message = Message::empty()
            .with_property("ActionId", 42)
            .with_property("Activity", "PRESET");

        assert_eq!(message.int_property("ActionId"), Some(42));
        assert_eq!(message.string_property("ActionId"), None);
        assert_eq!(message.string_property("Activity"), Some("PRESET"));
        assert_eq!(message.int_property("missing"), None);
    }

    #[test]
    fn test_map_body_keeps_insertion_order() {
        let mut map = MapBody::new();
        map.insert("z".to_string(), MapValue::from("last"));
        map.insert("a".to_string(), MapValue::Int(1));

        let message = Message::map(map);
        let keys: Vec<_> = message.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z".to_string(), "a".to_string()]);
        assert!(message.as_text().is_none());
    }

    #[test]
    fn test_each_message_gets_its_own_id() {
        assert_ne!(Message::empty().id(), Message::empty().id());
    }
}
