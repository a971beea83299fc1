use std::fmt;

/// Type of one tuple field. Every type has a fixed encoded width, so a schema
/// fixes the tuple size and with it the number of slots per page.
///
/// Numbers are little-endian. `Char(n)` is a u16 byte length followed by `n`
/// bytes, zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// One byte, 0 or 1
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    /// Up to `n` bytes of UTF-8
    Char(u16),
    /// Microseconds since the Unix epoch, as i64
    Timestamp,
}

impl DataType {
    /// Encoded width in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Boolean | DataType::TinyInt => 1,
            DataType::SmallInt => 2,
            DataType::Integer | DataType::Float => 4,
            DataType::BigInt | DataType::Double | DataType::Timestamp => 8,
            DataType::Char(n) => 2 + *n as usize,
        }
    }

    /// SQL-style type name, without the length of a `Char`.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Char(_) => "CHAR",
            DataType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Char(n) => write!(f, "{}({})", self.name(), n),
            other => f.write_str(other.name()),
        }
    }
}
