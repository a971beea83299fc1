use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::DataType;

/// One fixed-width field of a tuple layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    /// Position in the schema, assigned by `Schema::new`
    ordinal: usize,
    /// Byte offset of the field inside an encoded tuple
    offset: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            ordinal: 0,
            offset: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Encoded width in bytes.
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Layout of the tuples stored in one table's pages.
///
/// Every field is fixed-width, so all tuples of a schema encode to exactly
/// `tuple_size()` bytes and a page holds a fixed number of them.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    tuple_size: usize,
}

impl Schema {
    pub fn new(mut columns: Vec<Column>) -> Self {
        let mut by_name = HashMap::with_capacity(columns.len());
        let mut offset = 0;
        for (ordinal, column) in columns.iter_mut().enumerate() {
            column.ordinal = ordinal;
            column.offset = offset;
            offset += column.size();
            // First column wins on duplicate names
            by_name.entry(column.name.clone()).or_insert(ordinal);
        }

        Self {
            columns,
            by_name,
            tuple_size: offset,
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

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Field types in column order.
    pub fn data_types(&self) -> impl Iterator<Item = &DataType> {
        self.columns.iter().map(|column| &column.data_type)
    }

    /// Encoded size of one tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }
}

/// Schemas compare by field types, position by position. Column names do not
/// take part, so a page accepts any tuple with the same layout.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.data_types().eq(other.data_types())
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", column.name, column.data_type)?;
        }
        write!(f, ")")
    }
}

/// Fluent construction of a [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Char(10))
            .column("age", DataType::SmallInt)
            .build()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();

        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column(0).unwrap().name(), "id");
        assert_eq!(schema.column(1).unwrap().name(), "name");
        assert_eq!(schema.column(2).unwrap().name(), "age");
        assert!(schema.column(3).is_none());
    }

    #[test]
    fn test_column_lookup() {
        let schema = create_test_schema();

        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("age"), Some(2));
        assert_eq!(schema.column_index("nonexistent"), None);

        for (i, col) in schema.columns().enumerate() {
            assert_eq!(col.ordinal(), i);
        }
    }

    #[test]
    fn test_column_offsets() {
        let schema = create_test_schema();
        let offsets: Vec<usize> = schema.columns().map(Column::offset).collect();
        assert_eq!(offsets, vec![0, 4, 16]);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            create_test_schema().to_string(),
            "(id INTEGER, name CHAR(10), age SMALLINT)"
        );
    }

    #[test]
    fn test_tuple_size() {
        // id (4) + name (2 + 10) + age (2)
        assert_eq!(create_test_schema().tuple_size(), 18);
        assert_eq!(Schema::builder().build().tuple_size(), 0);
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = Schema::builder()
            .column("a", DataType::Integer)
            .column("b", DataType::BigInt)
            .build();
        let b = Schema::builder()
            .column("x", DataType::Integer)
            .column("y", DataType::BigInt)
            .build();
        let c = Schema::builder().column("a", DataType::Integer).build();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
