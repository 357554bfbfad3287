//! Explicit encode/decode pairs for every wire-visible type.
//!
//! The wire form is little-endian throughout. Containers are encoded as
//! a `u32` count followed by that many elements; decoders validate the
//! count against [`MAX_WIRE_ELEMENTS`] before allocating.

/// Upper bound on container element counts accepted by decoders.
pub const MAX_WIRE_ELEMENTS: u32 = 4096;

/// Upper bound on string byte lengths accepted by decoders.
pub const MAX_WIRE_STRING: u32 = 64 * 1024;

/// Errors produced while decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Not enough bytes left in the input.
    #[error("unexpected end of input: need {needed} bytes, have {have}")]
    UnexpectedEnd {
        /// Bytes required by the field being decoded.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// A container count exceeds the decoder bound.
    #[error("count {count} exceeds bound {bound}")]
    CountOutOfBounds {
        /// The count read from the wire.
        count: u32,
        /// The bound it violated.
        bound: u32,
    },

    /// A string field does not hold valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// An enum discriminant byte has no known meaning.
    #[error("unknown discriminant {value} for {type_name}")]
    UnknownDiscriminant {
        /// The byte read from the wire.
        value: u8,
        /// Name of the type being decoded.
        type_name: &'static str,
    },

    /// A decoded field failed semantic validation.
    #[error("malformed {type_name} field")]
    Malformed {
        /// Name of the type being decoded.
        type_name: &'static str,
    },
}

/// Serialize a value into its wire form.
pub trait WireEncode {
    /// Append the wire form of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Convenience: encode into a fresh buffer.
    fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Deserialize a value from its wire form.
///
/// Decoders consume from the front of `input`, leaving any trailing
/// bytes for the caller.
pub trait WireDecode: Sized {
    /// Decode one value from the front of `input`.
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError>;
}

fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < len {
        return Err(CodecError::UnexpectedEnd {
            needed: len,
            have: input.len(),
        });
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

macro_rules! impl_int_codec {
    ($($ty:ty),*) => {
        $(
            impl WireEncode for $ty {
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl WireDecode for $ty {
                fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
                    let bytes = take(input, std::mem::size_of::<$ty>())?;
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_int_codec!(u8, u16, u32, u64);

impl WireEncode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl WireDecode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::UnknownDiscriminant {
                value: other,
                type_name: "bool",
            }),
        }
    }
}

impl WireEncode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        out.extend_from_slice(self.as_bytes());
    }
}

impl WireDecode for String {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let len = u32::decode(input)?;
        if len > MAX_WIRE_STRING {
            return Err(CodecError::CountOutOfBounds {
                count: len,
                bound: MAX_WIRE_STRING,
            });
        }
        let bytes = take(input, len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let count = u32::decode(input)?;
        if count > MAX_WIRE_ELEMENTS {
            return Err(CodecError::CountOutOfBounds {
                count,
                bound: MAX_WIRE_ELEMENTS,
            });
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(T::decode(input)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let mut buf = Vec::new();
        0xABu8.encode(&mut buf);
        0x1234u16.encode(&mut buf);
        0xDEADBEEFu32.encode(&mut buf);
        0x0123_4567_89AB_CDEFu64.encode(&mut buf);

        let mut input = buf.as_slice();
        assert_eq!(u8::decode(&mut input).expect("u8"), 0xAB);
        assert_eq!(u16::decode(&mut input).expect("u16"), 0x1234);
        assert_eq!(u32::decode(&mut input).expect("u32"), 0xDEADBEEF);
        assert_eq!(u64::decode(&mut input).expect("u64"), 0x0123_4567_89AB_CDEF);
        assert!(input.is_empty());
    }

    #[test]
    fn test_string_roundtrip() {
        let value = String::from("hello patchbay");
        let buf = value.to_wire();
        let mut input = buf.as_slice();
        assert_eq!(String::decode(&mut input).expect("string"), value);
    }

    #[test]
    fn test_string_length_bound() {
        let mut buf = Vec::new();
        (MAX_WIRE_STRING + 1).encode(&mut buf);
        let mut input = buf.as_slice();
        let err = String::decode(&mut input).expect_err("must fail");
        assert!(matches!(err, CodecError::CountOutOfBounds { .. }));
    }

    #[test]
    fn test_vec_roundtrip() {
        let values: Vec<u32> = vec![1, 2, 3, 500];
        let buf = values.to_wire();
        let mut input = buf.as_slice();
        assert_eq!(Vec::<u32>::decode(&mut input).expect("vec"), values);
    }

    #[test]
    fn test_vec_count_bound() {
        let mut buf = Vec::new();
        (MAX_WIRE_ELEMENTS + 1).encode(&mut buf);
        let mut input = buf.as_slice();
        let err = Vec::<u32>::decode(&mut input).expect_err("must fail");
        assert!(matches!(
            err,
            CodecError::CountOutOfBounds {
                count,
                bound: MAX_WIRE_ELEMENTS
            } if count == MAX_WIRE_ELEMENTS + 1
        ));
    }

    #[test]
    fn test_truncated_input() {
        let mut input: &[u8] = &[1, 2];
        let err = u32::decode(&mut input).expect_err("must fail");
        assert!(matches!(
            err,
            CodecError::UnexpectedEnd { needed: 4, have: 2 }
        ));
    }

    #[test]
    fn test_bool_roundtrip_and_reject() {
        let mut buf = Vec::new();
        true.encode(&mut buf);
        false.encode(&mut buf);
        let mut input = buf.as_slice();
        assert!(bool::decode(&mut input).expect("true"));
        assert!(!bool::decode(&mut input).expect("false"));

        let mut bad: &[u8] = &[7];
        assert!(bool::decode(&mut bad).is_err());
    }
}
