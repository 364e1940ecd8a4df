use std::borrow::Cow;

use itertools::Itertools;

use crate::array_subset::{bytes_len, ArraySubset};

use super::{ArrayError, DataType, DataTypeSize};

/// Array element bytes.
pub type RawBytes<'a> = Cow<'a, [u8]>;

/// Array element byte offsets.
pub type RawBytesOffsets<'a> = Cow<'a, [usize]>;

/// Fixed or variable length array bytes.
///
/// Fixed length bytes are the C-order little-endian element bytes of an array.
/// Variable length bytes are the concatenated element bytes, with `num_elements + 1` monotonically increasing offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayBytes<'a> {
    /// Bytes for a fixed length array.
    Fixed(RawBytes<'a>),
    /// Bytes and element byte offsets for a variable length array.
    Variable(RawBytes<'a>, RawBytesOffsets<'a>),
}

impl<'a> ArrayBytes<'a> {
    /// Create a new fixed length array bytes from `bytes`.
    pub fn new_flen(bytes: impl Into<RawBytes<'a>>) -> Self {
        Self::Fixed(bytes.into())
    }

    /// Create a new variable length array bytes from `bytes` and `offsets`.
    pub fn new_vlen(
        bytes: impl Into<RawBytes<'a>>,
        offsets: impl Into<RawBytesOffsets<'a>>,
    ) -> Self {
        Self::Variable(bytes.into(), offsets.into())
    }

    /// Create new [`ArrayBytes`] of `num_elements` zero elements of `data_type`.
    ///
    /// Zero elements of a variable length data type are empty.
    #[must_use]
    pub fn new_zeros(data_type: &DataType, num_elements: u64) -> ArrayBytes<'static> {
        match data_type.size() {
            DataTypeSize::Fixed(size) => {
                ArrayBytes::new_flen(vec![0u8; bytes_len(num_elements, size)])
            }
            DataTypeSize::Variable => ArrayBytes::new_vlen(
                Vec::new(),
                vec![0usize; bytes_len(num_elements, 1).saturating_add(1)],
            ),
        }
    }

    /// Convert the array bytes into fixed size bytes.
    ///
    /// # Errors
    /// Returns [`ArrayError::ExpectedFixedLengthBytes`] if the bytes are variable length.
    pub fn into_fixed(self) -> Result<RawBytes<'a>, ArrayError> {
        match self {
            Self::Fixed(bytes) => Ok(bytes),
            Self::Variable(_, _) => Err(ArrayError::ExpectedFixedLengthBytes),
        }
    }

    /// Convert the array bytes into variable sized bytes and element byte offsets.
    ///
    /// # Errors
    /// Returns [`ArrayError::ExpectedVariableLengthBytes`] if the bytes are fixed length.
    pub fn into_variable(self) -> Result<(RawBytes<'a>, RawBytesOffsets<'a>), ArrayError> {
        match self {
            Self::Fixed(_) => Err(ArrayError::ExpectedVariableLengthBytes),
            Self::Variable(bytes, offsets) => Ok((bytes, offsets)),
        }
    }

    /// Returns the size (in bytes) of the underlying element bytes.
    ///
    /// This only considers the size of the element bytes, and does not include the element offsets for a variable sized array.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Fixed(bytes) | Self::Variable(bytes, _) => bytes.len(),
        }
    }

    /// Return the byte offsets for variable sized bytes. Returns [`None`] for fixed size bytes.
    #[must_use]
    pub fn offsets(&self) -> Option<&RawBytesOffsets<'a>> {
        match self {
            Self::Fixed(_) => None,
            Self::Variable(_, offsets) => Some(offsets),
        }
    }

    /// Borrow the bytes (and offsets) without copying.
    #[must_use]
    pub fn as_borrowed(&self) -> ArrayBytes<'_> {
        match self {
            Self::Fixed(bytes) => ArrayBytes::new_flen(bytes.as_ref()),
            Self::Variable(bytes, offsets) => ArrayBytes::new_vlen(bytes.as_ref(), offsets.as_ref()),
        }
    }

    /// Convert into owned [`ArrayBytes<'_>`].
    #[must_use]
    pub fn into_owned<'b>(self) -> ArrayBytes<'b> {
        match self {
            Self::Fixed(bytes) => ArrayBytes::<'b>::new_flen(bytes.into_owned()),
            Self::Variable(bytes, offsets) => {
                ArrayBytes::<'b>::new_vlen(bytes.into_owned(), offsets.into_owned())
            }
        }
    }

    /// Validate that the array bytes hold `num_elements` elements of `data_type`.
    ///
    /// For fixed length bytes, check the length matches the expected size.
    /// For variable length bytes, check that there are `num_elements + 1` monotonically increasing offsets and that the last offset is equal to the length of the bytes.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the bytes are not valid.
    pub fn validate(&self, num_elements: u64, data_type: &DataType) -> Result<(), ArrayError> {
        match (self, data_type.size()) {
            (Self::Fixed(bytes), DataTypeSize::Fixed(size)) => {
                let expected = bytes_len(num_elements, size);
                if bytes.len() == expected {
                    Ok(())
                } else {
                    Err(ArrayError::InvalidBytesInputSize(bytes.len(), expected))
                }
            }
            (Self::Variable(bytes, offsets), DataTypeSize::Variable) => {
                let valid = offsets.len() as u64 == num_elements + 1
                    && offsets.first() == Some(&0)
                    && offsets.last() == Some(&bytes.len())
                    && offsets.iter().tuple_windows().all(|(a, b)| a <= b);
                if valid {
                    Ok(())
                } else {
                    Err(ArrayError::InvalidVariableSizedArrayOffsets)
                }
            }
            (Self::Fixed(_), DataTypeSize::Variable) => {
                Err(ArrayError::ExpectedVariableLengthBytes)
            }
            (Self::Variable(_, _), DataTypeSize::Fixed(_)) => {
                Err(ArrayError::ExpectedFixedLengthBytes)
            }
        }
    }

    /// Returns true if every element byte is zero.
    ///
    /// For variable length bytes, returns true if every element is empty.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Fixed(bytes) | Self::Variable(bytes, _) => bytes.iter().all(|&byte| byte == 0),
        }
    }

    /// Extract a subset of the array bytes of an array with `array_shape`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the `array_shape` is incompatible with `subset` or the bytes.
    pub fn extract_array_subset(
        &self,
        subset: &ArraySubset,
        array_shape: &[u64],
        data_type: &DataType,
    ) -> Result<ArrayBytes<'static>, ArrayError> {
        let invalid_subset = || ArrayError::InvalidArraySubset(subset.clone(), array_shape.to_vec());
        match self {
            Self::Variable(bytes, offsets) => {
                let runs = subset
                    .iter_contiguous_linearised_indices(array_shape)
                    .map_err(|_| invalid_subset())?;
                let mut ss_bytes = Vec::new();
                let mut ss_offsets = Vec::with_capacity(bytes_len(subset.num_elements(), 1) + 1);
                for (start, length) in runs {
                    for index in start..start + length {
                        let index = usize::try_from(index).map_err(|_| invalid_subset())?;
                        let (Some(&curr), Some(&next)) = (offsets.get(index), offsets.get(index + 1))
                        else {
                            return Err(invalid_subset());
                        };
                        ss_offsets.push(ss_bytes.len());
                        ss_bytes.extend_from_slice(&bytes[curr..next]);
                    }
                }
                ss_offsets.push(ss_bytes.len());
                Ok(ArrayBytes::new_vlen(ss_bytes, ss_offsets))
            }
            Self::Fixed(bytes) => {
                let element_size = data_type
                    .fixed_size()
                    .ok_or(ArrayError::ExpectedVariableLengthBytes)?;
                let bytes = subset
                    .extract_bytes(bytes, array_shape, element_size)
                    .map_err(|_| invalid_subset())?;
                Ok(ArrayBytes::new_flen(bytes))
            }
        }
    }

    /// Iterate over the bytes of each element of variable length bytes.
    ///
    /// # Errors
    /// Returns [`ArrayError::ExpectedVariableLengthBytes`] if the bytes are fixed length.
    pub fn variable_elements(&self) -> Result<impl Iterator<Item = &[u8]>, ArrayError> {
        match self {
            Self::Fixed(_) => Err(ArrayError::ExpectedVariableLengthBytes),
            Self::Variable(bytes, offsets) => Ok(offsets
                .iter()
                .tuple_windows()
                .map(move |(&curr, &next)| &bytes[curr..next])),
        }
    }
}

impl<'a> From<&'a [u8]> for ArrayBytes<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        ArrayBytes::new_flen(bytes)
    }
}

impl From<Vec<u8>> for ArrayBytes<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        ArrayBytes::new_flen(bytes)
    }
}

/// Encode variable length array bytes in the `vlen-utf8` layout.
///
/// The layout is a little-endian `u32` element count, then for each element a little-endian `u32` byte length followed by the element bytes.
///
/// # Errors
/// Returns [`ArrayError::InvalidVariableSizedArrayOffsets`] if an element or the element count does not fit in a `u32`.
pub fn encode_vlen(bytes: &[u8], offsets: &[usize]) -> Result<Vec<u8>, ArrayError> {
    let num_elements = offsets.len().saturating_sub(1);
    let mut encoded = Vec::with_capacity(4 + 4 * num_elements + bytes.len());
    let count =
        u32::try_from(num_elements).map_err(|_| ArrayError::InvalidVariableSizedArrayOffsets)?;
    encoded.extend_from_slice(&count.to_le_bytes());
    for (&curr, &next) in offsets.iter().tuple_windows() {
        let length =
            u32::try_from(next - curr).map_err(|_| ArrayError::InvalidVariableSizedArrayOffsets)?;
        encoded.extend_from_slice(&length.to_le_bytes());
        encoded.extend_from_slice(&bytes[curr..next]);
    }
    Ok(encoded)
}

/// Decode `vlen-utf8` encoded bytes holding `num_elements` elements, see [`encode_vlen`].
///
/// # Errors
/// Returns [`ArrayError::UnexpectedChunkDecodedSize`] if the encoded bytes are truncated or hold a different number of elements.
pub fn decode_vlen(encoded: &[u8], num_elements: u64) -> Result<ArrayBytes<'static>, ArrayError> {
    fn read_u32(encoded: &[u8], position: usize) -> Result<usize, ArrayError> {
        encoded
            .get(position..position + 4)
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map(|bytes| u32::from_le_bytes(bytes) as usize)
            .ok_or(ArrayError::UnexpectedChunkDecodedSize(encoded.len(), position + 4))
    }

    let count = read_u32(encoded, 0)?;
    if count as u64 != num_elements {
        return Err(ArrayError::UnexpectedChunkDecodedSize(
            count,
            bytes_len(num_elements, 1),
        ));
    }
    let mut bytes = Vec::with_capacity(encoded.len().saturating_sub(4 + 4 * count));
    let mut offsets = Vec::with_capacity(count + 1);
    let mut position = 4;
    for _ in 0..count {
        let length = read_u32(encoded, position)?;
        position += 4;
        let element = encoded
            .get(position..position + length)
            .ok_or(ArrayError::UnexpectedChunkDecodedSize(
                encoded.len(),
                position + length,
            ))?;
        offsets.push(bytes.len());
        bytes.extend_from_slice(element);
        position += length;
    }
    offsets.push(bytes.len());
    Ok(ArrayBytes::new_vlen(bytes, offsets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_bytes_zeros() {
        let zeros = ArrayBytes::new_zeros(&DataType::Float32, 3);
        assert_eq!(zeros.size(), 12);
        assert!(zeros.is_zero());
        assert!(zeros.validate(3, &DataType::Float32).is_ok());
        assert!(zeros.validate(4, &DataType::Float32).is_err());

        let strings = ArrayBytes::new_zeros(&DataType::String, 2);
        assert_eq!(strings.offsets().unwrap().as_ref(), &[0, 0, 0]);
        assert!(strings.validate(2, &DataType::String).is_ok());
        assert!(strings.validate(2, &DataType::Int8).is_err());
    }

    #[test]
    fn array_bytes_extract_variable() {
        // 2x2 array ["a", "bb", "", "ccc"]
        let bytes = ArrayBytes::new_vlen(b"abbccc".to_vec(), vec![0, 1, 3, 3, 6]);
        let column = bytes
            .extract_array_subset(
                &ArraySubset::new_with_ranges(&[0..2, 1..2]),
                &[2, 2],
                &DataType::String,
            )
            .unwrap();
        assert_eq!(column, ArrayBytes::new_vlen(b"bbccc".to_vec(), vec![0, 2, 5]));
        let elements: Vec<&[u8]> = column.variable_elements().unwrap().collect();
        assert_eq!(elements, vec![b"bb".as_slice(), b"ccc".as_slice()]);
    }

    #[test]
    fn array_bytes_vlen_encoding() {
        let encoded = encode_vlen(b"obscell", &[0, 3, 3, 7]).unwrap();
        assert_eq!(&encoded[0..4], &3u32.to_le_bytes());
        let decoded = decode_vlen(&encoded, 3).unwrap();
        assert_eq!(
            decoded,
            ArrayBytes::new_vlen(b"obscell".to_vec(), vec![0, 3, 3, 7])
        );
        assert!(decode_vlen(&encoded, 2).is_err());
        assert!(decode_vlen(&encoded[..encoded.len() - 1], 3).is_err());
    }
}
