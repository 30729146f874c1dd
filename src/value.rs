//! Field values and their store representation.
//!
//! Scalars are stored as text the store can sort on (`42`, `2.5`, `1`), strings
//! and bytes verbatim. Everything else goes through a [`Codec`] and is stored as
//! opaque bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::types::FieldType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    /// Output of a fallback codec.
    Encoded(Vec<u8>),
}

impl Value {
    /// Encode `value` with the default fallback codec (MessagePack).
    pub fn fallback<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        Codec::default().encode(value)
    }

    /// Decode an [`Value::Encoded`] produced by [`Value::fallback`].
    pub fn decode_fallback<T: DeserializeOwned>(self) -> Result<T> {
        Codec::default().decode(self)
    }

    /// Bytes written into the record hash.
    pub fn to_store_bytes(&self) -> Vec<u8> {
        match self {
            Value::Int(n) => n.to_string().into_bytes(),
            Value::Uint(n) => n.to_string().into_bytes(),
            Value::Float(f) => f.to_string().into_bytes(),
            Value::Bool(b) => if *b { b"1".to_vec() } else { b"0".to_vec() },
            Value::Str(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) | Value::Encoded(b) => b.clone(),
        }
    }

    /// Parse bytes read from a record hash according to the field's type.
    pub fn from_store_bytes(ty: FieldType, raw: Vec<u8>) -> std::result::Result<Value, String> {
        fn text(raw: &[u8]) -> std::result::Result<&str, String> {
            std::str::from_utf8(raw).map_err(|e| e.to_string())
        }

        match ty {
            FieldType::Int => text(&raw)?.parse().map(Value::Int).map_err(|e| e.to_string()),
            FieldType::Uint => text(&raw)?.parse().map(Value::Uint).map_err(|e| e.to_string()),
            FieldType::Float => text(&raw)?.parse().map(Value::Float).map_err(|e| e.to_string()),
            FieldType::Bool => match raw.as_slice() {
                b"1" | b"true" => Ok(Value::Bool(true)),
                b"0" | b"false" => Ok(Value::Bool(false)),
                _ => Err(format!("{:?} is not a boolean", String::from_utf8_lossy(&raw))),
            },
            FieldType::Str => String::from_utf8(raw).map(Value::Str).map_err(|e| e.to_string()),
            FieldType::Bytes => Ok(Value::Bytes(raw)),
            FieldType::Fallback => Ok(Value::Encoded(raw)),
        }
    }

    /// Score in a numeric or boolean index, if this value has one.
    pub fn score(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Uint(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Whether this value can be stored in a field of type `ty`.
    pub fn fits(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (Value::Int(_), FieldType::Int)
                | (Value::Uint(_), FieldType::Uint)
                | (Value::Float(_), FieldType::Float)
                | (Value::Bool(_), FieldType::Bool)
                | (Value::Str(_), FieldType::Str)
                | (Value::Bytes(_), FieldType::Bytes)
                | (Value::Encoded(_), FieldType::Fallback)
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Encoded(_) => "encoded",
        }
    }
}

/// Serializer used for fields without a scalar representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    MessagePack,
    Json,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        let bytes = match self {
            Codec::MessagePack => {
                rmp_serde::to_vec_named(value).map_err(|e| Error::encode("fallback", e))?
            }
            Codec::Json => serde_json::to_vec(value).map_err(|e| Error::encode("fallback", e))?,
        };
        Ok(Value::Encoded(bytes))
    }

    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        let bytes = match value {
            Value::Encoded(b) | Value::Bytes(b) => b,
            other => {
                return Err(Error::decode(
                    "fallback",
                    format!("expected encoded bytes, got {}", other.kind()),
                ))
            }
        };
        match self {
            Codec::MessagePack => {
                rmp_serde::from_slice(&bytes).map_err(|e| Error::decode("fallback", e))
            }
            Codec::Json => serde_json::from_slice(&bytes).map_err(|e| Error::decode("fallback", e)),
        }
    }
}

/// Rust types with a direct scalar store representation.
pub trait Scalar: Sized {
    const TYPE: FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(wanted: FieldType, got: &Value) -> Error {
    Error::decode("scalar", format!("expected {:?}, got {}", wanted, got.kind()))
}

macro_rules! signed_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const TYPE: FieldType = FieldType::Int;

            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int(n) => <$t>::try_from(n)
                        .map_err(|e| Error::decode(stringify!($t), e)),
                    other => Err(mismatch(FieldType::Int, &other)),
                }
            }
        }
    )*};
}

macro_rules! unsigned_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const TYPE: FieldType = FieldType::Uint;

            fn to_value(&self) -> Value {
                Value::Uint(*self as u64)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Uint(n) => <$t>::try_from(n)
                        .map_err(|e| Error::decode(stringify!($t), e)),
                    other => Err(mismatch(FieldType::Uint, &other)),
                }
            }
        }
    )*};
}

signed_scalar!(i8, i16, i32, i64, isize);
unsigned_scalar!(u8, u16, u32, u64, usize);

impl Scalar for f64 {
    const TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(mismatch(FieldType::Float, &other)),
        }
    }
}

impl Scalar for f32 {
    const TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f as f32),
            other => Err(mismatch(FieldType::Float, &other)),
        }
    }
}

impl Scalar for bool {
    const TYPE: FieldType = FieldType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(FieldType::Bool, &other)),
        }
    }
}

impl Scalar for String {
    const TYPE: FieldType = FieldType::Str;

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(FieldType::Str, &other)),
        }
    }
}

impl Scalar for Vec<u8> {
    const TYPE: FieldType = FieldType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch(FieldType::Bytes, &other)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Scalar> From<T> for Value {
    fn from(v: T) -> Self {
        v.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_store_bytes_round_trip() {
        let cases = [
            (FieldType::Int, Value::Int(-12)),
            (FieldType::Uint, Value::Uint(u64::MAX)),
            (FieldType::Float, Value::Float(0.1)),
            (FieldType::Bool, Value::Bool(true)),
            (FieldType::Str, Value::Str("héllo".to_string())),
            (FieldType::Bytes, Value::Bytes(vec![0, 255])),
        ];
        for (ty, value) in cases {
            let back = Value::from_store_bytes(ty, value.to_store_bytes()).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_bool_accepts_words() {
        assert_eq!(
            Value::from_store_bytes(FieldType::Bool, b"false".to_vec()),
            Ok(Value::Bool(false))
        );
        assert!(Value::from_store_bytes(FieldType::Bool, b"yes".to_vec()).is_err());
    }

    #[test]
    fn test_bad_number_is_error() {
        assert!(Value::from_store_bytes(FieldType::Int, b"12x".to_vec()).is_err());
        assert!(Value::from_store_bytes(FieldType::Uint, b"-1".to_vec()).is_err());
    }

    #[test]
    fn test_scores() {
        assert_eq!(Value::Bool(true).score(), Some(1.0));
        assert_eq!(Value::Int(-3).score(), Some(-3.0));
        assert_eq!(Value::Str("x".into()).score(), None);
    }

    #[test]
    fn test_scalar_narrowing_checks_range() {
        assert_eq!(i8::from_value(Value::Int(-5)).unwrap(), -5);
        assert!(i8::from_value(Value::Int(300)).is_err());
        assert!(u32::from_value(Value::Int(1)).is_err());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        zip: u32,
    }

    #[test]
    fn test_fallback_codecs() {
        let addr = Address {
            street: "Main".to_string(),
            zip: 12345,
        };
        for codec in [Codec::MessagePack, Codec::Json] {
            let value = codec.encode(&addr).unwrap();
            assert!(value.fits(FieldType::Fallback));
            let back: Address = codec.decode(value).unwrap();
            assert_eq!(back, addr);
        }
    }

    #[test]
    fn test_fallback_decode_failure() {
        let err = Value::Encoded(vec![0xc1]).decode_fallback::<Address>().unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
