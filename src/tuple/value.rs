use std::fmt;

use bytes::{Buf, BufMut};

use super::DataType;
use crate::common::{Result, StrataError};

/// Represents a typed value that can be stored in a tuple.
/// Each variant corresponds to a DataType and holds the actual data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Integer(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// String value (stored as Char)
    String(String),

    /// Timestamp value (microseconds since Unix epoch)
    Timestamp(i64),
}

impl Value {
    /// Returns true if this value can be stored in a column of the given type.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::TinyInt(_), DataType::TinyInt)
            | (Value::SmallInt(_), DataType::SmallInt)
            | (Value::Integer(_), DataType::Integer)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Float(_), DataType::Float)
            | (Value::Double(_), DataType::Double)
            | (Value::Timestamp(_), DataType::Timestamp) => true,
            (Value::String(s), DataType::Char(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Writes this value in its on-page encoding. Exactly `data_type.size()`
    /// bytes are written on success.
    pub fn write_to(&self, data_type: &DataType, buf: &mut impl BufMut) -> Result<()> {
        if !self.fits(data_type) {
            return Err(StrataError::ValueTypeMismatch {
                value: self.to_string(),
                data_type: data_type.to_string(),
            });
        }

        match (self, data_type) {
            (Value::Boolean(b), _) => buf.put_u8(u8::from(*b)),
            (Value::TinyInt(v), _) => buf.put_i8(*v),
            (Value::SmallInt(v), _) => buf.put_i16_le(*v),
            (Value::Integer(v), _) => buf.put_i32_le(*v),
            (Value::BigInt(v), _) => buf.put_i64_le(*v),
            (Value::Float(v), _) => buf.put_f32_le(*v),
            (Value::Double(v), _) => buf.put_f64_le(*v),
            (Value::Timestamp(v), _) => buf.put_i64_le(*v),
            (Value::String(s), DataType::Char(n)) => {
                let bytes = s.as_bytes();
                // Format: length (2 bytes) + data, zero-padded to n bytes
                buf.put_u16_le(bytes.len() as u16);
                buf.put_slice(bytes);
                buf.put_bytes(0, *n as usize - bytes.len());
            }
            (Value::String(_), _) => {
                return Err(StrataError::ValueTypeMismatch {
                    value: self.to_string(),
                    data_type: data_type.to_string(),
                })
            }
        }

        Ok(())
    }

    /// Reads one value of the given type, consuming exactly `data_type.size()` bytes.
    pub fn read_from(data_type: &DataType, buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < data_type.size() {
            return Err(StrataError::Malformed(format!(
                "need {} bytes for {}, {} left",
                data_type.size(),
                data_type,
                buf.remaining()
            )));
        }

        let value = match data_type {
            DataType::Boolean => match buf.get_u8() {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                other => {
                    return Err(StrataError::Malformed(format!(
                        "invalid boolean byte {:#04x}",
                        other
                    )))
                }
            },
            DataType::TinyInt => Value::TinyInt(buf.get_i8()),
            DataType::SmallInt => Value::SmallInt(buf.get_i16_le()),
            DataType::Integer => Value::Integer(buf.get_i32_le()),
            DataType::BigInt => Value::BigInt(buf.get_i64_le()),
            DataType::Float => Value::Float(buf.get_f32_le()),
            DataType::Double => Value::Double(buf.get_f64_le()),
            DataType::Timestamp => Value::Timestamp(buf.get_i64_le()),
            DataType::Char(n) => {
                let n = *n as usize;
                let len = buf.get_u16_le() as usize;
                if len > n {
                    return Err(StrataError::Malformed(format!(
                        "string length {} exceeds CHAR({})",
                        len, n
                    )));
                }
                let mut raw = vec![0u8; n];
                buf.copy_to_slice(&mut raw);
                raw.truncate(len);
                let s = String::from_utf8(raw)
                    .map_err(|e| StrataError::Malformed(format!("invalid UTF-8: {}", e)))?;
                Value::String(s)
            }
        };

        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Timestamp(v) => write!(f, "TIMESTAMP({})", v),
        }
    }
}

// Convenience conversions
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, data_type: &DataType) -> Vec<u8> {
        let mut bytes = Vec::new();
        value.write_to(data_type, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_integer_encoding() {
        let bytes = encode(&Value::Integer(42), &DataType::Integer);
        assert_eq!(bytes, vec![42, 0, 0, 0]);

        let recovered = Value::read_from(&DataType::Integer, &mut &bytes[..]).unwrap();
        assert_eq!(recovered, Value::Integer(42));
    }

    #[test]
    fn test_char_encoding() {
        let bytes = encode(&Value::from("hi"), &DataType::Char(5));
        assert_eq!(bytes, vec![2, 0, b'h', b'i', 0, 0, 0]);
        assert_eq!(bytes.len(), DataType::Char(5).size());

        let recovered = Value::read_from(&DataType::Char(5), &mut &bytes[..]).unwrap();
        assert_eq!(recovered, Value::String("hi".to_string()));
    }

    #[test]
    fn test_type_mismatch() {
        let mut bytes = Vec::new();
        let err = Value::Integer(1)
            .write_to(&DataType::BigInt, &mut bytes)
            .unwrap_err();
        assert!(matches!(err, StrataError::ValueTypeMismatch { .. }));
        assert!(bytes.is_empty());

        assert!(!Value::from("too long").fits(&DataType::Char(3)));
    }

    #[test]
    fn test_malformed_input() {
        let short = [1u8, 2];
        assert!(Value::read_from(&DataType::Integer, &mut &short[..]).is_err());

        let bad_bool = [7u8];
        assert!(Value::read_from(&DataType::Boolean, &mut &bad_bool[..]).is_err());

        // Declared length larger than the column
        let bad_len = [9u8, 0, b'a', b'b'];
        assert!(Value::read_from(&DataType::Char(2), &mut &bad_len[..]).is_err());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }
}
