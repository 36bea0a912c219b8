use std::{cmp::Ordering, fmt};

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};

use crate::errors::{Error, Result};

use super::node_type::GenericKey;

/// Column types an index key may be built from. Every type has a fixed
/// serialized width so keys stay fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    BigInt,
    Int,
    SmallInt,
    Decimal,
    Char(usize),
    Boolean,
}

impl DataType {
    pub fn width(&self) -> usize {
        match *self {
            DataType::BigInt => 8,
            DataType::Int => 4,
            DataType::SmallInt => 2,
            DataType::Decimal => 4,
            DataType::Char(len) => len,
            DataType::Boolean => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Int => write!(f, "INT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Char(len) => write!(f, "CHAR({})", len),
            DataType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    BigInt(i64),
    Int(i32),
    SmallInt(i16),
    Decimal(f32),
    Char(String),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{:?}", v),
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// Serializes key tuples for one index and orders serialized keys.
///
/// Columns are laid out back to back in schema order, integers and floats
/// little endian, chars zero padded to their declared length. The rest of
/// the key, up to `key_size`, is zero.
#[derive(Debug, Clone)]
pub struct KeyManager {
    key_schema: Vec<DataType>,
    key_size: usize,
}

impl KeyManager {
    pub fn new(key_schema: Vec<DataType>, key_size: usize) -> Result<Self> {
        if key_schema.is_empty() {
            return Err(Error::KeySchema("key schema has no columns".to_string()));
        }

        let width: usize = key_schema.iter().map(DataType::width).sum();
        if width > key_size {
            return Err(Error::InvalidConfig(format!(
                "key schema needs {} bytes but the key size is {}",
                width, key_size
            )));
        }

        Ok(KeyManager {
            key_schema,
            key_size,
        })
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn key_schema(&self) -> &[DataType] {
        &self.key_schema
    }

    pub fn serialize_from_key(&self, values: &[Value]) -> Result<GenericKey> {
        if values.len() != self.key_schema.len() {
            return Err(Error::KeySchema(format!(
                "expected {} key columns, got {}",
                self.key_schema.len(),
                values.len()
            )));
        }

        let mut buffer = BytesMut::with_capacity(self.key_size);
        for (column, value) in self.key_schema.iter().zip(values) {
            match (column, value) {
                (DataType::BigInt, Value::BigInt(v)) => buffer.put_i64_le(*v),
                (DataType::Int, Value::Int(v)) => buffer.put_i32_le(*v),
                (DataType::SmallInt, Value::SmallInt(v)) => buffer.put_i16_le(*v),
                (DataType::Decimal, Value::Decimal(v)) => buffer.put_f32_le(*v),
                (DataType::Boolean, Value::Boolean(v)) => buffer.put_u8(*v as u8),
                (DataType::Char(len), Value::Char(v)) => {
                    let bytes = v.as_bytes();
                    if bytes.len() > *len {
                        return Err(Error::KeySchema(format!(
                            "{:?} does not fit in CHAR({})",
                            v, len
                        )));
                    }
                    buffer.put_slice(bytes);
                    buffer.put_bytes(0, len - bytes.len());
                }
                (column, value) => {
                    return Err(Error::KeySchema(format!(
                        "value {} does not match column type {}",
                        value, column
                    )))
                }
            }
        }
        buffer.put_bytes(0, self.key_size - buffer.len());

        Ok(GenericKey::from(buffer.freeze()))
    }

    pub fn deserialize_to_key(&self, key: &[u8]) -> Result<Vec<Value>> {
        if key.len() < self.key_size {
            return Err(Error::KeySchema(format!(
                "key of {} bytes is shorter than the key size {}",
                key.len(),
                self.key_size
            )));
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(self.key_schema.len());
        for column in &self.key_schema {
            let field = &key[offset..offset + column.width()];
            values.push(match *column {
                DataType::BigInt => Value::BigInt(LittleEndian::read_i64(field)),
                DataType::Int => Value::Int(LittleEndian::read_i32(field)),
                DataType::SmallInt => Value::SmallInt(LittleEndian::read_i16(field)),
                DataType::Decimal => Value::Decimal(LittleEndian::read_f32(field)),
                DataType::Boolean => Value::Boolean(field[0] != 0),
                DataType::Char(_) => {
                    let text = std::str::from_utf8(trim_padding(field)).map_err(|err| {
                        Error::Corrupted(format!("CHAR key column is not UTF-8: {}", err))
                    })?;
                    Value::Char(text.to_string())
                }
            });
            offset += column.width();
        }
        Ok(values)
    }

    /// Column by column comparison of two serialized keys.
    pub fn compare_keys(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        let mut offset = 0;
        for column in &self.key_schema {
            let end = offset + column.width();
            let (l, r) = (&lhs[offset..end], &rhs[offset..end]);
            let ordering = match *column {
                DataType::BigInt => LittleEndian::read_i64(l).cmp(&LittleEndian::read_i64(r)),
                DataType::Int => LittleEndian::read_i32(l).cmp(&LittleEndian::read_i32(r)),
                DataType::SmallInt => LittleEndian::read_i16(l).cmp(&LittleEndian::read_i16(r)),
                DataType::Decimal => {
                    LittleEndian::read_f32(l).total_cmp(&LittleEndian::read_f32(r))
                }
                DataType::Boolean => (l[0] != 0).cmp(&(r[0] != 0)),
                DataType::Char(_) => trim_padding(l).cmp(trim_padding(r)),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
            offset = end;
        }
        Ordering::Equal
    }

    /// Human readable form of a serialized key, for tree dumps.
    pub fn display_key(&self, key: &[u8]) -> String {
        match self.deserialize_to_key(key) {
            Ok(values) if values.len() == 1 => values[0].to_string(),
            Ok(values) => {
                let fields: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("({})", fields.join(", "))
            }
            Err(_) => format!("{:?}", key),
        }
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &field[..end]
}
