//! Array data types.
//!
//! Data types are serialised in array metadata by name (e.g. `"float64"`, `"string"`, `"S8"`), except for structured records which are an object listing their fields:
//! ```json
//! {
//!     "name": "structured",
//!     "fields": [["index", "S8"], ["n_counts", "float32"]]
//! }
//! ```

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "DataTypeMetadata", into = "DataTypeMetadata")]
#[rustfmt::skip]
pub enum DataType {
    /// `bool` Boolean.
    #[display("bool")]
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    #[display("int64")]
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    #[display("uint64")]
    UInt64,
    /// `float32` IEEE 754 single-precision floating point: sign bit, 8 bits exponent, 23 bits mantissa.
    #[display("float32")]
    Float32,
    /// `float64` IEEE 754 double-precision floating point: sign bit, 11 bits exponent, 52 bits mantissa.
    #[display("float64")]
    Float64,
    /// A variable-length UTF-8 encoded string.
    #[display("string")]
    String,
    /// `S<n>` fixed-length byte strings of `n` bytes, padded with trailing NUL bytes.
    #[display("S{_0}")]
    FixedBytes(usize),
    /// A structured (compound) record of named fixed-size fields, packed without padding.
    #[display("structured")]
    Structured(Vec<StructuredField>),
}

/// A named field of a [`DataType::Structured`] record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructuredField {
    /// The field name.
    pub name: String,
    /// The field data type.
    pub data_type: DataType,
}

impl StructuredField {
    /// Create a new structured field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The size of a data type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataTypeSize {
    /// Fixed size (in bytes).
    Fixed(usize),
    /// Variable sized.
    Variable,
}

/// An unsupported data type error.
#[derive(Debug, Error, From)]
#[error("unsupported data type {_0}")]
pub struct UnsupportedDataTypeError(String);

/// The serialised form of a [`DataType`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataTypeMetadata {
    /// A named data type.
    Name(String),
    /// A structured data type.
    Structured {
        /// Always `structured`.
        name: String,
        /// The fields of the record.
        fields: Vec<(String, DataTypeMetadata)>,
    },
}

impl DataType {
    /// Returns the name of the data type.
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Returns the [`DataTypeSize`].
    #[must_use]
    pub fn size(&self) -> DataTypeSize {
        match self {
            Self::String => DataTypeSize::Variable,
            Self::Bool | Self::Int8 | Self::UInt8 => DataTypeSize::Fixed(1),
            Self::Int16 | Self::UInt16 => DataTypeSize::Fixed(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => DataTypeSize::Fixed(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => DataTypeSize::Fixed(8),
            Self::FixedBytes(size) => DataTypeSize::Fixed(*size),
            Self::Structured(fields) => DataTypeSize::Fixed(
                fields
                    .iter()
                    .map(|field| field.data_type.fixed_size().unwrap_or(0))
                    .sum(),
            ),
        }
    }

    /// Returns the size in bytes of a fixed-size data type, otherwise returns [`None`].
    #[must_use]
    pub fn fixed_size(&self) -> Option<usize> {
        match self.size() {
            DataTypeSize::Fixed(size) => Some(size),
            DataTypeSize::Variable => None,
        }
    }

    /// Returns true if the data type is a signed or unsigned integer.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Returns true if the data type is numeric (boolean, integer or floating point).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Bool | Self::Float32 | Self::Float64)
    }

    /// Returns the byte offset of each field of a structured data type.
    #[must_use]
    pub fn field_offsets(fields: &[StructuredField]) -> Vec<usize> {
        fields
            .iter()
            .scan(0, |offset, field| {
                let field_offset = *offset;
                *offset += field.data_type.fixed_size().unwrap_or(0);
                Some(field_offset)
            })
            .collect()
    }

    /// Create a data type from its name.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedDataTypeError`] if the name is not recognised.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedDataTypeError> {
        Ok(match name {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            _ => {
                let size = name
                    .strip_prefix('S')
                    .and_then(|size| size.parse::<usize>().ok())
                    .filter(|size| *size > 0)
                    .ok_or_else(|| UnsupportedDataTypeError(name.to_string()))?;
                Self::FixedBytes(size)
            }
        })
    }
}

impl TryFrom<DataTypeMetadata> for DataType {
    type Error = UnsupportedDataTypeError;

    fn try_from(metadata: DataTypeMetadata) -> Result<Self, Self::Error> {
        match metadata {
            DataTypeMetadata::Name(name) => Self::from_name(&name),
            DataTypeMetadata::Structured { name, fields } => {
                if name != "structured" {
                    return Err(UnsupportedDataTypeError(name));
                }
                let fields = fields
                    .into_iter()
                    .map(|(name, data_type)| {
                        let data_type = Self::try_from(data_type)?;
                        if data_type.fixed_size().is_none() {
                            return Err(UnsupportedDataTypeError(format!(
                                "structured field {name} of variable-length type {data_type}"
                            )));
                        }
                        Ok(StructuredField { name, data_type })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Structured(fields))
            }
        }
    }
}

impl From<DataType> for DataTypeMetadata {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Structured(fields) => Self::Structured {
                name: "structured".to_string(),
                fields: fields
                    .into_iter()
                    .map(|field| (field.name, field.data_type.into()))
                    .collect(),
            },
            data_type => Self::Name(data_type.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names() {
        for name in [
            "bool", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
            "float32", "float64", "string", "S12",
        ] {
            assert_eq!(DataType::from_name(name).unwrap().name(), name);
        }
        assert!(DataType::from_name("S0").is_err());
        assert!(DataType::from_name("complex64").is_err());
        assert_eq!(
            DataType::from_name("float16").unwrap_err().to_string(),
            "unsupported data type float16"
        );
    }

    #[test]
    fn data_type_sizes() {
        assert_eq!(DataType::Float64.size(), DataTypeSize::Fixed(8));
        assert_eq!(DataType::String.size(), DataTypeSize::Variable);
        assert_eq!(DataType::FixedBytes(5).fixed_size(), Some(5));
        let record = DataType::Structured(vec![
            StructuredField::new("index", DataType::FixedBytes(3)),
            StructuredField::new("n_genes", DataType::Int32),
        ]);
        assert_eq!(record.fixed_size(), Some(7));
        let DataType::Structured(fields) = &record else {
            unreachable!()
        };
        assert_eq!(DataType::field_offsets(fields), vec![0, 3]);
    }

    #[test]
    fn data_type_serde() {
        let record = DataType::Structured(vec![
            StructuredField::new("index", DataType::FixedBytes(8)),
            StructuredField::new("n_counts", DataType::Float32),
        ]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"name":"structured","fields":[["index","S8"],["n_counts","float32"]]}"#
        );
        assert_eq!(serde_json::from_str::<DataType>(&json).unwrap(), record);
        assert_eq!(
            serde_json::from_str::<DataType>(r#""uint16""#).unwrap(),
            DataType::UInt16
        );
        assert!(serde_json::from_str::<DataType>(
            r#"{"name":"structured","fields":[["s","string"]]}"#
        )
        .is_err());
    }
}
