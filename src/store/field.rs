// Fixed-width field types and typed in-memory column batches.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    I32,
    I64,
    F32,
    F64,
}

impl FieldType {
    /// Encoded width of one value, in bytes.
    pub fn width(self) -> u64 {
        match self {
            FieldType::I32 | FieldType::F32 => 4,
            FieldType::I64 | FieldType::F64 => 8,
        }
    }

    pub fn parse(input: &str) -> Result<Self, Error> {
        match input.trim() {
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            other => Err(Error::new(ErrorKind::Validation)
                .with_message(format!("invalid field type '{other}' (use i32|i64|f32|f64)"))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::I32 => write!(f, "i32"),
            FieldType::I64 => write!(f, "i64"),
            FieldType::F32 => write!(f, "f32"),
            FieldType::F64 => write!(f, "f64"),
        }
    }
}

/// A batch of values for one column. Batches are the unit writers append
/// and the unit cluster pages are encoded from.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ColumnData {
    pub fn empty(field: FieldType) -> Self {
        match field {
            FieldType::I32 => Self::I32(Vec::new()),
            FieldType::I64 => Self::I64(Vec::new()),
            FieldType::F32 => Self::F32(Vec::new()),
            FieldType::F64 => Self::F64(Vec::new()),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::I32(_) => FieldType::I32,
            Self::I64(_) => FieldType::I64,
            Self::F32(_) => FieldType::F32,
            Self::F64(_) => FieldType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I32(values) => values.len(),
            Self::I64(values) => values.len(),
            Self::F32(values) => values.len(),
            Self::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: &ColumnData) -> Result<(), Error> {
        match (self, other) {
            (Self::I32(dst), Self::I32(src)) => dst.extend_from_slice(src),
            (Self::I64(dst), Self::I64(src)) => dst.extend_from_slice(src),
            (Self::F32(dst), Self::F32(src)) => dst.extend_from_slice(src),
            (Self::F64(dst), Self::F64(src)) => dst.extend_from_slice(src),
            (dst, src) => {
                return Err(Error::new(ErrorKind::Validation).with_message(format!(
                    "batch type {} does not match column type {}",
                    src.field_type(),
                    dst.field_type()
                )));
            }
        }
        Ok(())
    }

    /// Little-endian encoding of the first `rows` values.
    pub fn encode_prefix(&self, rows: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(rows * self.field_type().width() as usize);
        match self {
            Self::I32(values) => {
                for value in &values[..rows] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::I64(values) => {
                for value in &values[..rows] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::F32(values) => {
                for value in &values[..rows] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::F64(values) => {
                for value in &values[..rows] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        out
    }

    pub fn drop_prefix(&mut self, rows: usize) {
        match self {
            Self::I32(values) => {
                values.drain(..rows);
            }
            Self::I64(values) => {
                values.drain(..rows);
            }
            Self::F32(values) => {
                values.drain(..rows);
            }
            Self::F64(values) => {
                values.drain(..rows);
            }
        }
    }
}
