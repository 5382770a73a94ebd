use bytes::Bytes;

use crate::config::SerializerFormat;

/// Types a producer can put on the wire as record keys or values.
pub trait Serializable {
    /// Format this type serializes to. Checked against
    /// `key.serializer` / `value.serializer` when the producer is built.
    const FORMAT: SerializerFormat;

    fn to_bytes(&self) -> Bytes;
}

impl Serializable for String {
    const FORMAT: SerializerFormat = SerializerFormat::String;

    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl Serializable for &'static str {
    const FORMAT: SerializerFormat = SerializerFormat::String;

    fn to_bytes(&self) -> Bytes {
        Bytes::from_static(self.as_bytes())
    }
}

impl Serializable for Bytes {
    const FORMAT: SerializerFormat = SerializerFormat::Bytes;

    fn to_bytes(&self) -> Bytes {
        self.clone()
    }
}

impl Serializable for Vec<u8> {
    const FORMAT: SerializerFormat = SerializerFormat::Bytes;

    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}
