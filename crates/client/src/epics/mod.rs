//! EPICS channel relaying: admission control, subscriptions and reads.

mod configuration;
mod consumer;
mod fetcher;
mod registry;

pub use configuration::EpicsConfiguration;
pub use consumer::EpicsConsumer;
pub use fetcher::EpicsFetcher;
pub use registry::EpicsRegistry;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use giapi_bus::{BusError, StreamReader, StreamWriter};

/// Element type of an EPICS channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EpicsType {
    /// 32-bit integers
    Int,
    /// Double precision floats
    Double,
    /// Single precision floats
    Float,
    /// Strings
    String,
    /// Signed bytes
    Byte,
    /// 16-bit integers
    Short,
}

impl EpicsType {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Int => 0,
            Self::Double => 1,
            Self::Float => 2,
            Self::String => 3,
            Self::Byte => 4,
            Self::Short => 5,
        }
    }

    /// Type for a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Int),
            1 => Some(Self::Double),
            2 => Some(Self::Float),
            3 => Some(Self::String),
            4 => Some(Self::Byte),
            5 => Some(Self::Short),
            _ => None,
        }
    }
}

impl fmt::Display for EpicsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "INT",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
        };
        f.write_str(name)
    }
}

/// Typed element buffer of a channel.
#[derive(Clone, Debug, PartialEq)]
pub enum EpicsValues {
    /// 32-bit integers
    Int(Vec<i32>),
    /// Double precision floats
    Double(Vec<f64>),
    /// Single precision floats
    Float(Vec<f32>),
    /// Strings
    String(Vec<String>),
    /// Signed bytes
    Byte(Vec<i8>),
    /// 16-bit integers
    Short(Vec<i16>),
}

impl EpicsValues {
    /// The element type.
    #[must_use]
    pub const fn epics_type(&self) -> EpicsType {
        match self {
            Self::Int(_) => EpicsType::Int,
            Self::Double(_) => EpicsType::Double,
            Self::Float(_) => EpicsType::Float,
            Self::String(_) => EpicsType::String,
            Self::Byte(_) => EpicsType::Byte,
            Self::Short(_) => EpicsType::Short,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable snapshot of one channel update.
#[derive(Clone, Debug, PartialEq)]
pub struct EpicsStatusItem {
    name: String,
    values: EpicsValues,
}

fn read_n<T, F>(count: usize, mut read: F) -> Result<Vec<T>, BusError>
where
    F: FnMut() -> Result<T, BusError>,
{
    (0..count).map(|_| read()).collect()
}

impl EpicsStatusItem {
    /// Creates a snapshot.
    pub fn new<K>(name: K, values: EpicsValues) -> Self
    where
        K: Into<String>,
    {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type.
    #[must_use]
    pub const fn epics_type(&self) -> EpicsType {
        self.values.epics_type()
    }

    /// Number of elements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// The element buffer.
    #[must_use]
    pub const fn values(&self) -> &EpicsValues {
        &self.values
    }

    /// Element `index` of an INT channel.
    #[must_use]
    pub fn int_value(&self, index: usize) -> Option<i32> {
        match &self.values {
            EpicsValues::Int(v) => v.get(index).copied(),
            _ => None,
        }
    }

    /// Element `index` of a DOUBLE channel.
    #[must_use]
    pub fn double_value(&self, index: usize) -> Option<f64> {
        match &self.values {
            EpicsValues::Double(v) => v.get(index).copied(),
            _ => None,
        }
    }

    /// Element `index` of a FLOAT channel.
    #[must_use]
    pub fn float_value(&self, index: usize) -> Option<f32> {
        match &self.values {
            EpicsValues::Float(v) => v.get(index).copied(),
            _ => None,
        }
    }

    /// Element `index` of a STRING channel.
    #[must_use]
    pub fn string_value(&self, index: usize) -> Option<&str> {
        match &self.values {
            EpicsValues::String(v) => v.get(index).map(String::as_str),
            _ => None,
        }
    }

    /// Element `index` of a BYTE channel.
    #[must_use]
    pub fn byte_value(&self, index: usize) -> Option<i8> {
        match &self.values {
            EpicsValues::Byte(v) => v.get(index).copied(),
            _ => None,
        }
    }

    /// Element `index` of a SHORT channel.
    #[must_use]
    pub fn short_value(&self, index: usize) -> Option<i16> {
        match &self.values {
            EpicsValues::Short(v) => v.get(index).copied(),
            _ => None,
        }
    }

    /// Decodes an update body.
    ///
    /// # Errors
    ///
    /// Fails on truncated input, an unknown type code or a negative count.
    pub fn decode(bytes: &Bytes) -> Result<Self, BusError> {
        let mut reader = StreamReader::new(bytes.clone());
        let name = reader.read_utf()?;
        let code = reader.read_int()?;
        let epics_type = EpicsType::from_code(code)
            .ok_or_else(|| BusError::Decode(format!("unknown EPICS type code {code}")))?;
        let count = usize::try_from(reader.read_int()?)
            .map_err(|_| BusError::Decode("negative EPICS element count".to_string()))?;

        let values = match epics_type {
            EpicsType::Int => EpicsValues::Int(read_n(count, || reader.read_int())?),
            EpicsType::Double => EpicsValues::Double(read_n(count, || reader.read_double())?),
            EpicsType::Float => EpicsValues::Float(read_n(count, || reader.read_float())?),
            EpicsType::String => EpicsValues::String(read_n(count, || reader.read_utf())?),
            EpicsType::Byte => EpicsValues::Byte(read_n(count, || reader.read_byte())?),
            EpicsType::Short => EpicsValues::Short(read_n(count, || reader.read_short())?),
        };

        Ok(Self { name, values })
    }

    /// Encodes the snapshot the way the GMP sends it.
    ///
    /// # Errors
    ///
    /// Fails when a string is too long for the stream format.
    pub fn encode(&self) -> Result<Bytes, BusError> {
        let mut writer = StreamWriter::new();
        writer.write_utf(&self.name)?;
        writer.write_int(self.epics_type().code());
        let count = i32::try_from(self.count())
            .map_err(|_| BusError::Encode("too many EPICS elements".to_string()))?;
        writer.write_int(count);

        match &self.values {
            EpicsValues::Int(v) => v.iter().for_each(|x| writer.write_int(*x)),
            EpicsValues::Double(v) => v.iter().for_each(|x| writer.write_double(*x)),
            EpicsValues::Float(v) => v.iter().for_each(|x| writer.write_float(*x)),
            EpicsValues::String(v) => {
                for x in v {
                    writer.write_utf(x)?;
                }
            }
            EpicsValues::Byte(v) => v.iter().for_each(|x| writer.write_byte(*x)),
            EpicsValues::Short(v) => v.iter().for_each(|x| writer.write_short(*x)),
        }

        Ok(writer.finish())
    }
}

/// Instrument code reacting to channel updates.
#[async_trait]
pub trait EpicsStatusHandler: Send + Sync + 'static {
    /// Called with each update of a subscribed channel.
    async fn channel_changed(&self, item: EpicsStatusItem);
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_decode_doubles() {
        let mut writer = StreamWriter::new();
        writer.write_utf("tcs:sad:airMass").unwrap();
        writer.write_int(1);
        writer.write_int(2);
        writer.write_double(1.25);
        writer.write_double(2.5);

        let item = EpicsStatusItem::decode(&writer.finish()).unwrap();

        assert_eq!(item.name(), "tcs:sad:airMass");
        assert_eq!(item.epics_type(), EpicsType::Double);
        assert_eq!(item.count(), 2);
        assert_eq!(item.double_value(1), Some(2.5));
        assert_eq!(item.double_value(2), None);
        assert_eq!(item.int_value(0), None);
    }

    #[test]
    fn test_strings_survive_encoding() {
        let item = EpicsStatusItem::new(
            "ws:cc:state",
            EpicsValues::String(vec!["IDLE".to_string(), String::new()]),
        );

        let decoded = EpicsStatusItem::decode(&item.encode().unwrap()).unwrap();

        assert_eq!(decoded, item);
        assert_eq!(decoded.string_value(0), Some("IDLE"));
    }

    #[test]
    fn test_rejects_bad_headers() {
        let mut writer = StreamWriter::new();
        writer.write_utf("x").unwrap();
        writer.write_int(9);
        writer.write_int(0);
        assert_matches!(
            EpicsStatusItem::decode(&writer.finish()),
            Err(BusError::Decode(_))
        );

        let mut writer = StreamWriter::new();
        writer.write_utf("x").unwrap();
        writer.write_int(0);
        writer.write_int(3);
        writer.write_int(1);
        assert_matches!(
            EpicsStatusItem::decode(&writer.finish()),
            Err(BusError::Decode(_))
        );
    }
}
