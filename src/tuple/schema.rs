use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// A single column in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn fixed_size(&self) -> Option<usize> {
        self.data_type.fixed_size()
    }

    pub fn max_size(&self) -> usize {
        self.data_type.max_size()
    }
}

/// The schema of a table: its ordered columns plus derived layout facts.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    /// Column name -> index, for fast lookup
    name_to_index: HashMap<String, usize>,
    /// Total size of the fixed-length columns
    fixed_size: usize,
    /// Size of the null bitmap in bytes (one bit per column)
    null_bitmap_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        let mut fixed_size = 0;

        for (i, col) in columns.iter().enumerate() {
            name_to_index.insert(col.name.clone(), i);
            fixed_size += col.fixed_size().unwrap_or(0);
        }

        let null_bitmap_size = (columns.len() + 7) / 8;

        Self {
            columns,
            name_to_index,
            fixed_size,
            null_bitmap_size,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.name_to_index
            .get(name)
            .and_then(|&i| self.columns.get(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn fixed_size(&self) -> usize {
        self.fixed_size
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Largest serialized tuple this schema can produce.
    pub fn max_tuple_size(&self) -> usize {
        self.null_bitmap_size + self.columns.iter().map(|c| c.max_size()).sum::<usize>()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Fluent schema construction.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a non-nullable column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    /// Adds a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(100))
            .nullable_column("email", DataType::VarChar(200))
            .column("age", DataType::SmallInt)
            .build()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();

        assert_eq!(schema.column_count(), 4);
        assert_eq!(schema.column(0).unwrap().name(), "id");
        assert_eq!(schema.column(3).unwrap().name(), "age");
    }

    #[test]
    fn test_column_lookup() {
        let schema = create_test_schema();

        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("nonexistent"), None);

        let col = schema.column_by_name("email").unwrap();
        assert!(col.is_nullable());
        assert_eq!(*col.data_type(), DataType::VarChar(200));
    }

    #[test]
    fn test_size_calculations() {
        let schema = create_test_schema();

        // id (4) + age (2)
        assert_eq!(schema.fixed_size(), 6);
        // 4 columns fit in one bitmap byte
        assert_eq!(schema.null_bitmap_size(), 1);
        // bitmap + fixed + both varchars with prefixes
        assert_eq!(schema.max_tuple_size(), 1 + 6 + 102 + 202);
    }
}
