use crate::error::BusError;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Writes primitive values in big-endian data-stream layout.
///
/// Strings use a two byte length prefix followed by UTF-8 bytes.
#[derive(Debug, Default)]
pub struct StreamWriter {
    buffer: BytesMut,
}

impl StreamWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a signed byte.
    pub fn write_byte(&mut self, value: i8) {
        self.buffer.put_i8(value);
    }

    /// Appends a 16-bit integer.
    pub fn write_short(&mut self, value: i16) {
        self.buffer.put_i16(value);
    }

    /// Appends a 32-bit integer.
    pub fn write_int(&mut self, value: i32) {
        self.buffer.put_i32(value);
    }

    /// Appends a 64-bit integer.
    pub fn write_long(&mut self, value: i64) {
        self.buffer.put_i64(value);
    }

    /// Appends a single precision float.
    pub fn write_float(&mut self, value: f32) {
        self.buffer.put_f32(value);
    }

    /// Appends a double precision float.
    pub fn write_double(&mut self, value: f64) {
        self.buffer.put_f64(value);
    }

    /// Appends a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.put_u8(u8::from(value));
    }

    /// Appends a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Fails when the encoded string is longer than 65535 bytes.
    pub fn write_utf(&mut self, value: &str) -> Result<(), BusError> {
        let len = u16::try_from(value.len())
            .map_err(|_| BusError::Encode(format!("string of {} bytes is too long", value.len())))?;
        self.buffer.put_u16(len);
        self.buffer.put_slice(value.as_bytes());
        Ok(())
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finishes writing and returns the encoded bytes.
    #[must_use]
    pub fn finish(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// Reads primitive values written by [`StreamWriter`].
#[derive(Debug)]
pub struct StreamReader {
    buffer: Bytes,
}

macro_rules! read_primitive {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $get:ident) => {
        $(#[$doc])*
        ///
        /// # Errors
        ///
        /// Fails when the stream ends early.
        pub fn $name(&mut self) -> Result<$ty, BusError> {
            self.ensure(std::mem::size_of::<$ty>())?;
            Ok(self.buffer.$get())
        }
    };
}

impl StreamReader {
    /// Wraps the given bytes.
    pub fn new<B>(bytes: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self {
            buffer: bytes.into(),
        }
    }

    fn ensure(&self, needed: usize) -> Result<(), BusError> {
        if self.buffer.remaining() < needed {
            return Err(BusError::Decode(format!(
                "unexpected end of stream: needed {needed} bytes, {} left",
                self.buffer.remaining()
            )));
        }
        Ok(())
    }

    read_primitive!(
        /// Reads a signed byte.
        read_byte, i8, get_i8
    );
    read_primitive!(
        /// Reads a 16-bit integer.
        read_short, i16, get_i16
    );
    read_primitive!(
        /// Reads a 32-bit integer.
        read_int, i32, get_i32
    );
    read_primitive!(
        /// Reads a 64-bit integer.
        read_long, i64, get_i64
    );
    read_primitive!(
        /// Reads a single precision float.
        read_float, f32, get_f32
    );
    read_primitive!(
        /// Reads a double precision float.
        read_double, f64, get_f64
    );

    /// Reads a boolean.
    ///
    /// # Errors
    ///
    /// Fails when the stream ends early.
    pub fn read_bool(&mut self) -> Result<bool, BusError> {
        self.ensure(1)?;
        Ok(self.buffer.get_u8() != 0)
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Fails when the stream ends early or the bytes are not valid UTF-8.
    pub fn read_utf(&mut self) -> Result<String, BusError> {
        self.ensure(2)?;
        let len = usize::from(self.buffer.get_u16());
        self.ensure(len)?;
        let raw = self.buffer.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|e| BusError::Decode(e.to_string()))
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }
}
