use std::sync::Arc;

use super::{Schema, Value};

/// A single row.
///
/// Serialized layout:
///
/// ```text
/// +----------------+------------------+------------------+
/// | Null Bitmap    | Fixed-Size Data  | Variable-Size    |
/// | (N bytes)      | (F bytes)        | Data (V bytes)   |
/// +----------------+------------------+------------------+
/// ```
///
/// One bitmap bit per column (1 = NULL). Fixed-size columns are written in
/// schema order at stable offsets (nulls as zeroes); variable-size columns
/// follow, each with its length prefix (nulls as a zero length).
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Tuple {
    /// Creates a new tuple. The value count must match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "value count must match schema column count"
        );
        Self { schema, values }
    }

    /// Decodes a tuple from its serialized bytes.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let values = Self::deserialize_values(&schema, data)?;
        Some(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Serializes the tuple for storage. None if some value does not fit
    /// its column type.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.null_bitmap_size() + self.schema.fixed_size());

        bytes.extend_from_slice(&self.null_bitmap());

        for (i, col) in self.schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                continue;
            }
            let value = &self.values[i];
            if value.is_null() {
                // Zero filler keeps later fixed columns at stable offsets
                bytes.extend(std::iter::repeat(0u8).take(col.fixed_size().unwrap_or(0)));
            } else {
                bytes.extend(value.serialize(col.data_type())?);
            }
        }

        for (i, col) in self.schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                continue;
            }
            let value = &self.values[i];
            if value.is_null() {
                bytes.extend_from_slice(&0u16.to_le_bytes());
            } else {
                bytes.extend(value.serialize(col.data_type())?);
            }
        }

        Some(bytes)
    }

    fn null_bitmap(&self) -> Vec<u8> {
        let mut bitmap = vec![0u8; self.schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        bitmap
    }

    fn deserialize_values(schema: &Schema, data: &[u8]) -> Option<Vec<Value>> {
        let bitmap_size = schema.null_bitmap_size();
        let bitmap = data.get(..bitmap_size)?;
        let is_null = |i: usize| bitmap[i / 8] & (1 << (i % 8)) != 0;

        let mut offset = bitmap_size;
        let mut values = vec![Value::Null; schema.column_count()];

        for (i, col) in schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                continue;
            }
            if is_null(i) {
                offset += col.fixed_size().unwrap_or(0);
            } else {
                let (value, consumed) = Value::deserialize(data.get(offset..)?, col.data_type())?;
                values[i] = value;
                offset += consumed;
            }
        }

        for (i, col) in schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                continue;
            }
            if is_null(i) {
                let len_bytes = data.get(offset..offset + 2)?;
                if u16::from_le_bytes(len_bytes.try_into().unwrap()) != 0 {
                    return None;
                }
                offset += 2;
            } else {
                let (value, consumed) = Value::deserialize(data.get(offset..)?, col.data_type())?;
                values[i] = value;
                offset += consumed;
            }
        }

        Some(values)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

/// Fluent tuple construction against a schema.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
    next_index: usize,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: vec![Value::Null; count],
            next_index: 0,
        }
    }

    /// Sets the next column's value.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        if self.next_index < self.values.len() {
            self.values[self.next_index] = value.into();
            self.next_index += 1;
        }
        self
    }

    /// Leaves the next column NULL.
    pub fn null(mut self) -> Self {
        if self.next_index < self.values.len() {
            self.next_index += 1;
        }
        self
    }

    pub fn build(self) -> Tuple {
        Tuple::new(self.schema, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::DataType;

    fn create_test_schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(100))
            .nullable_column("email", DataType::VarChar(200))
            .column("age", DataType::SmallInt)
            .build_arc()
    }

    #[test]
    fn test_tuple_creation() {
        let schema = create_test_schema();
        let tuple = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(1),
                Value::String("Alice".to_string()),
                Value::String("alice@example.com".to_string()),
                Value::SmallInt(30),
            ],
        );

        assert_eq!(tuple.value(0), Some(&Value::Integer(1)));
        assert_eq!(
            tuple.value_by_name("name"),
            Some(&Value::String("Alice".to_string()))
        );
    }

    #[test]
    fn test_tuple_builder() {
        let schema = create_test_schema();
        let tuple = TupleBuilder::new(schema)
            .value(42i32)
            .value("Bob")
            .null()
            .value(25i16)
            .build();

        assert_eq!(tuple.value(0), Some(&Value::Integer(42)));
        assert_eq!(tuple.value(1), Some(&Value::String("Bob".to_string())));
        assert_eq!(tuple.value(2), Some(&Value::Null));
        assert_eq!(tuple.value(3), Some(&Value::SmallInt(25)));
    }

    #[test]
    fn test_serialization_round_trip() {
        let schema = create_test_schema();
        let original = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(42),
                Value::String("Test User".to_string()),
                Value::String("test@example.com".to_string()),
                Value::SmallInt(25),
            ],
        );

        let bytes = original.to_bytes().unwrap();
        let recovered = Tuple::from_bytes(schema, &bytes).unwrap();

        assert_eq!(original, recovered);
    }

    #[test]
    fn test_serialization_with_nulls() {
        let schema = create_test_schema();
        let original = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(1),
                Value::String("Name".to_string()),
                Value::Null,
                Value::SmallInt(20),
            ],
        );

        let bytes = original.to_bytes().unwrap();
        let recovered = Tuple::from_bytes(schema, &bytes).unwrap();

        assert_eq!(original, recovered);
        assert!(recovered.value(2).unwrap().is_null());
    }

    #[test]
    fn test_null_bitmap_beyond_one_byte() {
        let mut builder = Schema::builder();
        for name in ["a", "b", "c", "d", "e", "f", "g", "h", "i"] {
            builder = builder.nullable_column(name, DataType::Integer);
        }
        let schema = builder.build_arc();
        assert_eq!(schema.null_bitmap_size(), 2);

        let mut values = vec![Value::Integer(1); 9];
        values[0] = Value::Null;
        values[8] = Value::Null;
        let tuple = Tuple::new(schema.clone(), values);

        let bytes = tuple.to_bytes().unwrap();
        let recovered = Tuple::from_bytes(schema, &bytes).unwrap();

        assert_eq!(tuple, recovered);
        assert!(recovered.value(0).unwrap().is_null());
        assert!(recovered.value(8).unwrap().is_null());
        assert_eq!(recovered.value(4), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_mixed_fixed_variable_columns() {
        let schema = Schema::builder()
            .column("a", DataType::Integer)
            .column("b", DataType::VarChar(50))
            .column("c", DataType::BigInt)
            .column("d", DataType::VarChar(100))
            .build_arc();

        let tuple = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(1),
                Value::String("hello".to_string()),
                Value::BigInt(1234567890),
                Value::String("world".to_string()),
            ],
        );

        let bytes = tuple.to_bytes().unwrap();
        let recovered = Tuple::from_bytes(schema, &bytes).unwrap();

        assert_eq!(tuple, recovered);
    }
}
