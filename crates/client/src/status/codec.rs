use crate::status::{
    AlarmCause, AlarmSeverity, AlarmState, SnapshotKind, StatusSnapshot, StatusValue,
};

use bytes::Bytes;
use chrono::DateTime;
use giapi_bus::{BusError, StreamReader, StreamWriter};

const PLAIN_BASE: i8 = 0;
const ALARM_BASE: i8 = 10;
const HEALTH_BASE: i8 = 20;

const INT_OFFSET: i8 = 0;
const DOUBLE_OFFSET: i8 = 1;
const FLOAT_OFFSET: i8 = 2;
const STRING_OFFSET: i8 = 3;

fn value_offset(value: &StatusValue) -> i8 {
    match value {
        StatusValue::Double(_) => DOUBLE_OFFSET,
        StatusValue::Float(_) => FLOAT_OFFSET,
        StatusValue::String(_) => STRING_OFFSET,
        StatusValue::Int(_) | StatusValue::Boolean(_) | StatusValue::Byte(_) | StatusValue::Short(_) => {
            INT_OFFSET
        }
    }
}

fn write_value(writer: &mut StreamWriter, value: &StatusValue) -> Result<(), BusError> {
    match value {
        StatusValue::Int(v) => writer.write_int(*v),
        StatusValue::Boolean(v) => writer.write_int(i32::from(*v)),
        StatusValue::Byte(v) => writer.write_int(i32::from(*v)),
        StatusValue::Short(v) => writer.write_int(i32::from(*v)),
        StatusValue::Double(v) => writer.write_double(*v),
        StatusValue::Float(v) => writer.write_float(*v),
        // Receivers cannot tell an empty UTF string from a missing one.
        StatusValue::String(v) if v.is_empty() => writer.write_utf(" ")?,
        StatusValue::String(v) => writer.write_utf(v)?,
    }
    Ok(())
}

/// Encodes a status snapshot into the status topic wire format.
///
/// # Errors
///
/// Fails when a string is too long for the stream format.
pub fn encode_status(snapshot: &StatusSnapshot) -> Result<Bytes, BusError> {
    let base = match snapshot.kind {
        SnapshotKind::Plain => PLAIN_BASE,
        SnapshotKind::Alarm(_) => ALARM_BASE,
        SnapshotKind::Health => HEALTH_BASE,
    };

    let mut writer = StreamWriter::new();
    writer.write_byte(base + value_offset(&snapshot.value));
    writer.write_utf(&snapshot.name)?;
    write_value(&mut writer, &snapshot.value)?;
    writer.write_long(snapshot.timestamp.timestamp_millis());

    if let SnapshotKind::Alarm(alarm) = &snapshot.kind {
        writer.write_byte(alarm.severity.code());
        writer.write_byte(alarm.cause.code());
        match &alarm.message {
            Some(message) => {
                writer.write_bool(true);
                writer.write_utf(message)?;
            }
            None => writer.write_bool(false),
        }
    }

    Ok(writer.finish())
}

/// Decodes a status topic message body.
///
/// Widened values come back as [`StatusValue::Int`].
///
/// # Errors
///
/// Fails on truncated input or unknown codes.
pub fn decode_status(bytes: &Bytes) -> Result<StatusSnapshot, BusError> {
    let mut reader = StreamReader::new(bytes.clone());
    let tag = reader.read_byte()?;
    let name = reader.read_utf()?;

    let value = match tag % 10 {
        INT_OFFSET => StatusValue::Int(reader.read_int()?),
        DOUBLE_OFFSET => StatusValue::Double(reader.read_double()?),
        FLOAT_OFFSET => StatusValue::Float(reader.read_float()?),
        STRING_OFFSET => StatusValue::String(reader.read_utf()?),
        _ => return Err(BusError::Decode(format!("unknown status type tag {tag}"))),
    };

    let millis = reader.read_long()?;
    let timestamp = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BusError::Decode(format!("timestamp {millis} out of range")))?;

    let kind = match tag - tag % 10 {
        PLAIN_BASE => SnapshotKind::Plain,
        HEALTH_BASE => SnapshotKind::Health,
        ALARM_BASE => {
            let severity = reader.read_byte()?;
            let severity = AlarmSeverity::from_code(severity)
                .ok_or_else(|| BusError::Decode(format!("unknown alarm severity {severity}")))?;
            let cause = reader.read_byte()?;
            let cause = AlarmCause::from_code(cause)
                .ok_or_else(|| BusError::Decode(format!("unknown alarm cause {cause}")))?;
            let message = if reader.read_bool()? {
                Some(reader.read_utf()?)
            } else {
                None
            };
            SnapshotKind::Alarm(AlarmState {
                severity,
                cause,
                message,
            })
        }
        _ => return Err(BusError::Decode(format!("unknown status type tag {tag}"))),
    };

    Ok(StatusSnapshot {
        name,
        value,
        timestamp,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use chrono::Utc;

    fn snapshot(value: StatusValue, kind: SnapshotKind) -> StatusSnapshot {
        let now = Utc::now();
        StatusSnapshot {
            name: "gpi:cc:temp".to_string(),
            value,
            timestamp: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap(),
            kind,
        }
    }

    #[test]
    fn test_alarm_layout() {
        let snapshot = snapshot(
            StatusValue::Double(12.5),
            SnapshotKind::Alarm(AlarmState {
                severity: AlarmSeverity::Failure,
                cause: AlarmCause::Other,
                message: Some("too hot".to_string()),
            }),
        );

        let bytes = encode_status(&snapshot).unwrap();

        assert_eq!(bytes[0], 11);
        assert_eq!(decode_status(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_health_uses_int_offset() {
        let snapshot = snapshot(StatusValue::Int(2), SnapshotKind::Health);

        let bytes = encode_status(&snapshot).unwrap();

        assert_eq!(bytes[0], 20);
        assert_eq!(decode_status(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_empty_string_is_sent_as_space() {
        let bytes = encode_status(&snapshot(
            StatusValue::String(String::new()),
            SnapshotKind::Plain,
        ))
        .unwrap();

        assert_eq!(bytes[0], 3);
        assert_eq!(
            decode_status(&bytes).unwrap().value,
            StatusValue::String(" ".to_string())
        );
    }

    #[test]
    fn test_narrow_types_are_widened() {
        let bytes =
            encode_status(&snapshot(StatusValue::Boolean(true), SnapshotKind::Plain)).unwrap();
        assert_eq!(bytes[0], 0);
        assert_eq!(decode_status(&bytes).unwrap().value, StatusValue::Int(1));

        let bytes = encode_status(&snapshot(StatusValue::Short(-7), SnapshotKind::Plain)).unwrap();
        assert_eq!(decode_status(&bytes).unwrap().value, StatusValue::Int(-7));
    }

    #[test]
    fn test_unknown_tag() {
        let mut writer = StreamWriter::new();
        writer.write_byte(7);
        writer.write_utf("x").unwrap();

        assert_matches!(decode_status(&writer.finish()), Err(BusError::Decode(_)));
    }
}
