use itertools::Itertools;

use super::{ArrayBytes, ArrayError, DataType};

use ArrayError::IncompatibleElementType as IET;

/// A trait representing an array element type.
pub trait Element: Sized + Clone {
    /// Validate the data type.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the data type is incompatible with [`Element`].
    fn validate_data_type(data_type: &DataType) -> Result<(), ArrayError>;

    /// Convert a slice of elements into [`ArrayBytes`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the data type is incompatible with [`Element`].
    fn into_array_bytes<'a>(
        data_type: &DataType,
        elements: &'a [Self],
    ) -> Result<ArrayBytes<'a>, ArrayError>;
}

/// A trait representing an owned array element type.
pub trait ElementOwned: Element {
    /// Convert bytes into a [`Vec<ElementOwned>`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the data type is incompatible with [`Element`].
    fn from_array_bytes(data_type: &DataType, bytes: ArrayBytes<'_>)
        -> Result<Vec<Self>, ArrayError>;
}

impl Element for bool {
    fn validate_data_type(data_type: &DataType) -> Result<(), ArrayError> {
        (data_type == &DataType::Bool).then_some(()).ok_or(IET)
    }

    fn into_array_bytes<'a>(
        data_type: &DataType,
        elements: &'a [Self],
    ) -> Result<ArrayBytes<'a>, ArrayError> {
        Self::validate_data_type(data_type)?;
        Ok(elements.iter().map(|&value| u8::from(value)).collect_vec().into())
    }
}

impl ElementOwned for bool {
    fn from_array_bytes(
        data_type: &DataType,
        bytes: ArrayBytes<'_>,
    ) -> Result<Vec<Self>, ArrayError> {
        Self::validate_data_type(data_type)?;
        bytes
            .into_fixed()?
            .iter()
            .map(|&byte| match byte {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(ArrayError::InvalidElementValue),
            })
            .collect()
    }
}

// Element bytes are little-endian, the native layout on every supported target.
macro_rules! impl_element_pod {
    ($raw_type:ty, $pattern:pat $(,)?) => {
        impl Element for $raw_type {
            fn validate_data_type(data_type: &DataType) -> Result<(), ArrayError> {
                if matches!(data_type, $pattern) {
                    Ok(())
                } else {
                    Err(IET)
                }
            }

            fn into_array_bytes<'a>(
                data_type: &DataType,
                elements: &'a [Self],
            ) -> Result<ArrayBytes<'a>, ArrayError> {
                Self::validate_data_type(data_type)?;
                Ok(bytemuck::cast_slice::<$raw_type, u8>(elements).into())
            }
        }

        impl ElementOwned for $raw_type {
            fn from_array_bytes(
                data_type: &DataType,
                bytes: ArrayBytes<'_>,
            ) -> Result<Vec<Self>, ArrayError> {
                Self::validate_data_type(data_type)?;
                let bytes = bytes.into_fixed()?;
                if bytes.len() % std::mem::size_of::<$raw_type>() != 0 {
                    return Err(ArrayError::InvalidBytesInputSize(
                        bytes.len(),
                        bytes.len() - bytes.len() % std::mem::size_of::<$raw_type>(),
                    ));
                }
                Ok(bytemuck::pod_collect_to_vec::<u8, $raw_type>(&bytes))
            }
        }
    };
}

impl_element_pod!(i8, DataType::Int8);
impl_element_pod!(i16, DataType::Int16);
impl_element_pod!(i32, DataType::Int32);
impl_element_pod!(i64, DataType::Int64);
impl_element_pod!(u8, DataType::UInt8);
impl_element_pod!(u16, DataType::UInt16);
impl_element_pod!(u32, DataType::UInt32);
impl_element_pod!(u64, DataType::UInt64);
impl_element_pod!(f32, DataType::Float32);
impl_element_pod!(f64, DataType::Float64);

macro_rules! impl_element_string {
    ($raw_type:ty) => {
        impl Element for $raw_type {
            fn validate_data_type(data_type: &DataType) -> Result<(), ArrayError> {
                (data_type == &DataType::String).then_some(()).ok_or(IET)
            }

            fn into_array_bytes<'a>(
                data_type: &DataType,
                elements: &'a [Self],
            ) -> Result<ArrayBytes<'a>, ArrayError> {
                Self::validate_data_type(data_type)?;
                let mut bytes = Vec::with_capacity(elements.iter().map(|s| s.len()).sum());
                let mut offsets = Vec::with_capacity(elements.len() + 1);
                for element in elements {
                    offsets.push(bytes.len());
                    bytes.extend_from_slice(element.as_bytes());
                }
                offsets.push(bytes.len());
                Ok(ArrayBytes::new_vlen(bytes, offsets))
            }
        }
    };
}

impl_element_string!(&str);
impl_element_string!(String);

impl ElementOwned for String {
    fn from_array_bytes(
        data_type: &DataType,
        bytes: ArrayBytes<'_>,
    ) -> Result<Vec<Self>, ArrayError> {
        Self::validate_data_type(data_type)?;
        bytes
            .variable_elements()?
            .map(|element| {
                std::str::from_utf8(element)
                    .map(str::to_string)
                    .map_err(|_| ArrayError::InvalidElementValue)
            })
            .collect()
    }
}

/// Widen the integer elements in `bytes` of `data_type` to [`i64`].
///
/// # Errors
/// Returns [`ArrayError::IncompatibleElementType`] if `data_type` is not an integer, or [`ArrayError::InvalidElementValue`] if a [`u64`] element exceeds [`i64::MAX`].
pub fn integers_to_i64(data_type: &DataType, bytes: ArrayBytes<'_>) -> Result<Vec<i64>, ArrayError> {
    fn widen<T: ElementOwned + Into<i64>>(
        data_type: &DataType,
        bytes: ArrayBytes<'_>,
    ) -> Result<Vec<i64>, ArrayError> {
        Ok(T::from_array_bytes(data_type, bytes)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    match data_type {
        DataType::Int8 => widen::<i8>(data_type, bytes),
        DataType::Int16 => widen::<i16>(data_type, bytes),
        DataType::Int32 => widen::<i32>(data_type, bytes),
        DataType::Int64 => widen::<i64>(data_type, bytes),
        DataType::UInt8 => widen::<u8>(data_type, bytes),
        DataType::UInt16 => widen::<u16>(data_type, bytes),
        DataType::UInt32 => widen::<u32>(data_type, bytes),
        DataType::UInt64 => u64::from_array_bytes(data_type, bytes)?
            .into_iter()
            .map(|value| i64::try_from(value).map_err(|_| ArrayError::InvalidElementValue))
            .collect(),
        _ => Err(IET),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_pod() {
        let elements = [1.5f32, -0.0, 3.0];
        let bytes = f32::into_array_bytes(&DataType::Float32, &elements).unwrap();
        assert_eq!(bytes.size(), 12);
        let decoded = f32::from_array_bytes(&DataType::Float32, bytes).unwrap();
        assert_eq!(decoded, elements);
        assert!(f32::into_array_bytes(&DataType::Float64, &elements).is_err());
    }

    #[test]
    fn element_bool() {
        let bytes = bool::into_array_bytes(&DataType::Bool, &[true, false]).unwrap();
        assert_eq!(bytes.clone().into_fixed().unwrap().as_ref(), &[1, 0]);
        assert_eq!(
            bool::from_array_bytes(&DataType::Bool, bytes).unwrap(),
            vec![true, false]
        );
        assert!(matches!(
            bool::from_array_bytes(&DataType::Bool, vec![2u8].into()),
            Err(ArrayError::InvalidElementValue)
        ));
    }

    #[test]
    fn element_string() {
        let bytes = <&str>::into_array_bytes(&DataType::String, &["cell", "", "é"]).unwrap();
        assert_eq!(bytes.offsets().unwrap().as_ref(), &[0, 4, 4, 6]);
        assert_eq!(
            String::from_array_bytes(&DataType::String, bytes).unwrap(),
            vec!["cell".to_string(), String::new(), "é".to_string()]
        );
    }

    #[test]
    fn element_integers_to_i64() {
        let bytes = u16::into_array_bytes(&DataType::UInt16, &[0, 7, u16::MAX]).unwrap();
        assert_eq!(
            integers_to_i64(&DataType::UInt16, bytes).unwrap(),
            vec![0, 7, i64::from(u16::MAX)]
        );
        let bytes = u64::into_array_bytes(&DataType::UInt64, &[u64::MAX]).unwrap();
        assert!(integers_to_i64(&DataType::UInt64, bytes).is_err());
        let bytes = f64::into_array_bytes(&DataType::Float64, &[1.0]).unwrap();
        assert!(integers_to_i64(&DataType::Float64, bytes).is_err());
    }
}
