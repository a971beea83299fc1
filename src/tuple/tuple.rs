use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use super::{Schema, Value};
use crate::common::{RecordId, Result, StrataError};

/// Represents a single row/tuple in a table.
///
/// A tuple holds one value per column of its schema. Once it has been placed on a
/// page it also carries the `RecordId` of the slot it lives in.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | Column 0  | Column 1  | ... | Column N  |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Every column is written at its fixed width (see `DataType::size`) in schema
/// order, little-endian, so an encoded tuple is always `schema.tuple_size()`
/// bytes.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Location on disk, set while the tuple is stored in a page slot
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple with the given schema and values.
    /// Fails if the value count or any value type does not match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(StrataError::SchemaMismatch);
        }
        for (value, col) in values.iter().zip(schema.columns()) {
            if !value.fits(col.data_type()) {
                return Err(StrataError::ValueTypeMismatch {
                    value: value.to_string(),
                    data_type: col.data_type().to_string(),
                });
            }
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value for the given column name.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Returns all values in this tuple.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replaces the value at the given column index.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        let col = self.schema.column(index).ok_or(StrataError::SchemaMismatch)?;
        if !value.fits(col.data_type()) {
            return Err(StrataError::ValueTypeMismatch {
                value: value.to_string(),
                data_type: col.data_type().to_string(),
            });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Returns the number of columns/values in this tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this tuple has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: RecordId) {
        self.record_id = Some(record_id);
    }

    pub fn clear_record_id(&mut self) {
        self.record_id = None;
    }

    /// Appends the encoded tuple to `buf`.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        for (value, col) in self.values.iter().zip(self.schema.columns()) {
            value.write_to(col.data_type(), buf)?;
        }
        Ok(())
    }

    /// Serializes the tuple to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.tuple_size());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Decodes one tuple of `schema` from the front of `buf`.
    pub fn read_from(schema: Arc<Schema>, buf: &mut impl Buf) -> Result<Self> {
        let mut values = Vec::with_capacity(schema.column_count());
        for col in schema.columns() {
            values.push(Value::read_from(col.data_type(), buf)?);
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }
}

/// Equality is by schema and values; where the tuple is stored does not matter.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vals: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", vals.join(", "))
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
    current_index: usize,
}

impl TupleBuilder {
    /// Creates a new tuple builder for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: vec![None; count],
            current_index: 0,
        }
    }

    /// Sets the value at the current position and advances.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        if self.current_index < self.values.len() {
            self.values[self.current_index] = Some(value.into());
            self.current_index += 1;
        }
        self
    }

    /// Sets the value for a specific column by name.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some(index) = self.schema.column_index(name) {
            self.values[index] = Some(value.into());
        }
        self
    }

    /// Builds the tuple. Every column must have been given a value.
    pub fn build(self) -> Result<Tuple> {
        let values = self
            .values
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(StrataError::SchemaMismatch)?;
        Tuple::new(self.schema, values)
    }
}
