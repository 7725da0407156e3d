//! Weakly typed decoding of [`Value`]s into Rust types
//!
//! Layers hold whatever their source produced: environment variables are
//! always strings, YAML may give an integer where a struct wants a string.
//! This deserializer bridges the gap:
//!
//! - strings parse into numbers and booleans
//! - numbers and booleans stringify
//! - a comma-separated string, or a single scalar, becomes a sequence
//! - null becomes an empty struct, map or sequence, `None`, or a zero value
//!
//! Struct fields are matched case-insensitively, since stored keys are
//! lower-cased.

use std::fmt;

use serde::de::value::{MapAccessDeserializer, MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};

use crate::value::{Mapping, Value};

/// Failure to decode a value into the requested type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{0}")]
    Message(String),

    #[error("cannot decode {got} as {expected}")]
    Mismatch { expected: &'static str, got: String },

    #[error("{value} is out of range for {expected}")]
    OutOfRange { expected: &'static str, value: String },
}

impl de::Error for DecodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        DecodeError::Message(msg.to_string())
    }
}

/// Decode `value` into `T`
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Describe a value for error messages
fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string ({:?})", s),
        Value::Sequence(_) | Value::Mapping(_) | Value::Bytes(_) => value.type_name().to_string(),
        other => format!("{} ({})", other.type_name(), other),
    }
}

fn mismatch(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::Mismatch {
        expected,
        got: describe(value),
    }
}

/// Go-style boolean literals
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Deserializer over an owned [`Value`]
#[derive(Debug, Clone)]
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    fn to_i64(&self) -> Result<i64, DecodeError> {
        match &self.value {
            Value::Integer(i) => Ok(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Null => Ok(0),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| {
                        s.parse::<f64>()
                            .ok()
                            .filter(|f| f.is_finite() && f.fract() == 0.0)
                            .map(|f| f as i64)
                    })
                    .ok_or_else(|| mismatch("integer", &self.value))
            }
            other => Err(mismatch("integer", other)),
        }
    }

    fn to_u64(&self) -> Result<u64, DecodeError> {
        if let Value::String(s) = &self.value {
            if let Ok(u) = s.trim().parse::<u64>() {
                return Ok(u);
            }
        }
        let i = self.to_i64()?;
        u64::try_from(i).map_err(|_| DecodeError::OutOfRange {
            expected: "unsigned integer",
            value: i.to_string(),
        })
    }

    fn to_f64(&self) -> Result<f64, DecodeError> {
        match &self.value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| mismatch("float", &self.value)),
            other => Err(mismatch("float", other)),
        }
    }

    fn to_bool(&self) -> Result<bool, DecodeError> {
        match &self.value {
            Value::Bool(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Null => Ok(false),
            Value::String(s) => parse_bool(s).ok_or_else(|| mismatch("boolean", &self.value)),
            other => Err(mismatch("boolean", other)),
        }
    }

    fn into_string(self) -> Result<String, DecodeError> {
        match self.value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            Value::Bool(_) | Value::Integer(_) | Value::Float(_) => Ok(self.value.to_string()),
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|e| DecodeError::Message(e.to_string()))
            }
            other => Err(mismatch("string", &other)),
        }
    }

    fn into_sequence(self) -> Vec<Value> {
        match self.value {
            Value::Sequence(seq) => seq,
            Value::Null => Vec::new(),
            Value::String(s) if s.trim().is_empty() => Vec::new(),
            Value::String(s) => s
                .split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect(),
            scalar => vec![scalar],
        }
    }
}

macro_rules! deserialize_signed {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                let i = self.to_i64()?;
                let narrowed = <$ty>::try_from(i).map_err(|_| DecodeError::OutOfRange {
                    expected: stringify!($ty),
                    value: i.to_string(),
                })?;
                visitor.$visit(narrowed)
            }
        )*
    };
}

macro_rules! deserialize_unsigned {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                let u = self.to_u64()?;
                let narrowed = <$ty>::try_from(u).map_err(|_| DecodeError::OutOfRange {
                    expected: stringify!($ty),
                    value: u.to_string(),
                })?;
                visitor.$visit(narrowed)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Integer(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::Sequence(seq) => visit_sequence(seq, visitor),
            Value::Mapping(map) => visit_mapping(map, visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bool(self.to_bool()?)
    }

    deserialize_signed! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
    }

    deserialize_unsigned! {
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f32(self.to_f64()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f64(self.to_f64()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let original = self.value.clone();
        let s = self.into_string()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(mismatch("char", &original)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.into_string()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.into_string()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::String(s) => visitor.visit_byte_buf(s.into_bytes()),
            other => ValueDeserializer::new(other).deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visit_sequence(self.into_sequence(), visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Mapping(map) => visit_mapping(map, visitor),
            Value::Null => visit_mapping(Mapping::new(), visitor),
            other => Err(mismatch("mapping", &other)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Mapping(map) => {
                let rekeyed = map
                    .into_iter()
                    .map(|(k, v)| {
                        let field = fields
                            .iter()
                            .find(|f| f.eq_ignore_ascii_case(&k))
                            .map(|f| f.to_string());
                        (field.unwrap_or(k), v)
                    })
                    .collect();
                visit_mapping(rekeyed, visitor)
            }
            Value::Null => visit_mapping(Mapping::new(), visitor),
            other => Err(mismatch("struct", &other)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::String(s) => {
                // Stored values may have been lower-cased along with their keys
                let variant = variants
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(&s))
                    .map(|v| v.to_string())
                    .unwrap_or(s);
                let access: StringDeserializer<DecodeError> = variant.into_deserializer();
                visitor.visit_enum(access)
            }
            Value::Mapping(map) if map.len() == 1 => {
                let access = MapDeserializer::<_, DecodeError>::new(map.into_iter());
                visitor.visit_enum(MapAccessDeserializer::new(access))
            }
            other => Err(mismatch("enum", &other)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

fn visit_sequence<'de, V: Visitor<'de>>(seq: Vec<Value>, visitor: V) -> Result<V::Value, DecodeError> {
    let mut access = SeqDeserializer::<_, DecodeError>::new(seq.into_iter());
    let out = visitor.visit_seq(&mut access)?;
    access.end()?;
    Ok(out)
}

fn visit_mapping<'de, V: Visitor<'de>>(map: Mapping, visitor: V) -> Result<V::Value, DecodeError> {
    let mut access = MapDeserializer::<_, DecodeError>::new(map.into_iter());
    let out = visitor.visit_map(&mut access)?;
    access.end()?;
    Ok(out)
}

impl<'de> IntoDeserializer<'de, DecodeError> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        ValueDeserializer::new(self)
    }
}
