use std::cmp::Ordering;
use std::fmt;

use super::DataType;

/// A typed value held by one tuple column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null - compatible with any column type
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Used for both Char and VarChar columns
    String(String),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Serializes a value to bytes according to the given column type.
    /// Returns None if the value is incompatible with the type.
    pub fn serialize(&self, data_type: &DataType) -> Option<Vec<u8>> {
        match (self, data_type) {
            // Nulls are recorded in the tuple's null bitmap, not here.
            (Value::Null, _) => Some(Vec::new()),

            (Value::Boolean(b), DataType::Boolean) => Some(vec![u8::from(*b)]),
            (Value::TinyInt(v), DataType::TinyInt) => Some(v.to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::SmallInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::Integer) => Some(v.to_le_bytes().to_vec()),
            (Value::BigInt(v), DataType::BigInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Float) => Some(v.to_le_bytes().to_vec()),
            (Value::Double(v), DataType::Double) => Some(v.to_le_bytes().to_vec()),
            (Value::Timestamp(v), DataType::Timestamp) => Some(v.to_le_bytes().to_vec()),

            (Value::String(s), DataType::Char(n)) => {
                let n = *n as usize;
                let bytes = s.as_bytes();
                if bytes.len() > n {
                    return None;
                }
                let mut result = bytes.to_vec();
                result.resize(n, b' ');
                Some(result)
            }

            (Value::String(s), DataType::VarChar(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len as usize {
                    return None;
                }
                let mut result = (bytes.len() as u16).to_le_bytes().to_vec();
                result.extend_from_slice(bytes);
                Some(result)
            }

            // Widening coercions
            (Value::TinyInt(v), DataType::SmallInt) => Some((*v as i16).to_le_bytes().to_vec()),
            (Value::TinyInt(v), DataType::Integer) => Some((*v as i32).to_le_bytes().to_vec()),
            (Value::TinyInt(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::Integer) => Some((*v as i32).to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Double) => Some((*v as f64).to_le_bytes().to_vec()),

            _ => None,
        }
    }

    /// Deserializes a value from bytes according to the column type.
    /// Returns the value and the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<(Self, usize)> {
        match data_type {
            DataType::Boolean => Some((Value::Boolean(*data.first()? != 0), 1)),

            DataType::TinyInt => Some((Value::TinyInt(*data.first()? as i8), 1)),

            DataType::SmallInt => {
                let bytes = data.get(..2)?;
                Some((
                    Value::SmallInt(i16::from_le_bytes(bytes.try_into().unwrap())),
                    2,
                ))
            }

            DataType::Integer => {
                let bytes = data.get(..4)?;
                Some((
                    Value::Integer(i32::from_le_bytes(bytes.try_into().unwrap())),
                    4,
                ))
            }

            DataType::BigInt => {
                let bytes = data.get(..8)?;
                Some((
                    Value::BigInt(i64::from_le_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }

            DataType::Float => {
                let bytes = data.get(..4)?;
                Some((
                    Value::Float(f32::from_le_bytes(bytes.try_into().unwrap())),
                    4,
                ))
            }

            DataType::Double => {
                let bytes = data.get(..8)?;
                Some((
                    Value::Double(f64::from_le_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }

            DataType::Char(n) => {
                let n = *n as usize;
                let bytes = data.get(..n)?;
                let s = String::from_utf8_lossy(bytes).trim_end().to_string();
                Some((Value::String(s), n))
            }

            DataType::VarChar(_) => {
                let len_bytes = data.get(..2)?;
                let len = u16::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                let bytes = data.get(2..2 + len)?;
                let s = String::from_utf8_lossy(bytes).to_string();
                Some((Value::String(s), 2 + len))
            }

            DataType::Timestamp => {
                let bytes = data.get(..8)?;
                Some((
                    Value::Timestamp(i64::from_le_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }
        }
    }

    /// Compares two values. None if they are not comparable (nulls or
    /// mismatched types).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,

            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::TinyInt(a), Value::TinyInt(b)) => Some(a.cmp(b)),
            (Value::SmallInt(a), Value::SmallInt(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),

            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
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

    #[test]
    fn test_integer_serialization() {
        let val = Value::Integer(42);
        let bytes = val.serialize(&DataType::Integer).unwrap();
        assert_eq!(bytes, vec![42, 0, 0, 0]);

        let (recovered, size) = Value::deserialize(&bytes, &DataType::Integer).unwrap();
        assert_eq!(recovered, val);
        assert_eq!(size, 4);
    }

    #[test]
    fn test_varchar_serialization() {
        let val = Value::String("hello".to_string());
        let bytes = val.serialize(&DataType::VarChar(100)).unwrap();
        assert_eq!(bytes, vec![5, 0, b'h', b'e', b'l', b'l', b'o']);

        let (recovered, size) = Value::deserialize(&bytes, &DataType::VarChar(100)).unwrap();
        assert_eq!(recovered, val);
        assert_eq!(size, 7);
    }

    #[test]
    fn test_char_serialization_pads_and_trims() {
        let val = Value::String("hi".to_string());
        let bytes = val.serialize(&DataType::Char(5)).unwrap();
        assert_eq!(bytes, vec![b'h', b'i', b' ', b' ', b' ']);

        let (recovered, size) = Value::deserialize(&bytes, &DataType::Char(5)).unwrap();
        assert_eq!(recovered, Value::String("hi".to_string()));
        assert_eq!(size, 5);
    }

    #[test]
    fn test_string_too_long() {
        let val = Value::String("much too long".to_string());
        assert!(val.serialize(&DataType::Char(5)).is_none());
        assert!(val.serialize(&DataType::VarChar(5)).is_none());
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            Value::Integer(10).compare(&Value::Integer(20)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("abc".into()).compare(&Value::String("abd".into())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).compare(&Value::BigInt(1)), None);
    }

    #[test]
    fn test_widening_coercion() {
        let val = Value::TinyInt(10);
        let bytes = val.serialize(&DataType::Integer).unwrap();
        assert_eq!(bytes, vec![10, 0, 0, 0]);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }
}
