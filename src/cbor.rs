//! This module enables canonical CBOR encoding of high-level objects.
//!
//! Filecoin messages and actor parameters are serialized as DAG-CBOR
//! "tuples": a definite-length array holding every field in declaration
//! order. Encoding itself is delegated to
//! [`fvm_ipld_encoding`](https://docs.rs/fvm_ipld_encoding), which always
//! emits the canonical form (minimal integer heads, definite lengths).
//! Structs opt in with `#[derive(Serialize_tuple, Deserialize_tuple)]`.
//!
//! Decoding is stricter than "whatever serde accepts": the array header is
//! checked against the expected arity before any field is read, so a message
//! with a missing or extra field is reported as such instead of as an
//! obscure type error halfway through.
//!
//! Theory
//! ------
//!
//! Every CBOR item starts with a head byte: the top three bits are the major
//! type, the low five bits either hold a small argument directly (`0..=23`)
//! or announce how many big-endian bytes follow (`24` → 1, `25` → 2,
//! `26` → 4, `27` → 8). Canonical encoding requires the shortest form.
//!
//! | major | meaning           | example                      |
//! |-------|-------------------|------------------------------|
//! | 0     | unsigned integer  | `0x19 0x61 0xa8` = 25000     |
//! | 1     | negative integer  | `0x20` = -1                  |
//! | 2     | byte string       | `0x40` = `b""`               |
//! | 4     | array             | `0x8a` = 10 items follow     |

use serde::{de::DeserializeOwned, Serialize};

pub use fvm_ipld_encoding::{from_slice, strict_bytes, to_vec, Error as CodecError, DAG_CBOR};

const MAJOR_ARRAY: u8 = 4;

/// CBOR plumbing errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CborError {
    /// Input ended before the item did.
    #[error("Unexpected end of input")]
    InputTooShort,
    /// Item is not an array.
    #[error("Expected an array, got major type {0}")]
    UnexpectedMajorType(u8),
    /// Array length encoded with more bytes than necessary.
    #[error("Non-canonical array length")]
    NonCanonicalLength,
    /// Indefinite-length arrays are not allowed.
    #[error("Indefinite-length array")]
    IndefiniteLength,
    /// Input decodes, but is not the canonical encoding of the result.
    #[error("Non-canonical encoding")]
    NonCanonical,
    /// Array has wrong number of elements.
    #[error("Array length mismatch: expected {expected}, got {got}")]
    ArityMismatch {
        /// Expected number of elements
        expected: u64,
        /// Actual number of elements
        got: u64,
    },
    /// Underlying serde codec failure.
    #[error("{0}")]
    Codec(String),
}

/// Convenience alias for a result of fallible CBOR operations.
pub type CborResult<T> = Result<T, CborError>;

pub fn array_len(bytes: &[u8]) -> CborResult<u64> {
    //! Read the header of a top-level array and return its length.
    let (&head, rest) = bytes.split_first().ok_or(CborError::InputTooShort)?;
    let major = head >> 5;
    if major != MAJOR_ARRAY {
        return Err(CborError::UnexpectedMajorType(major));
    }
    let width = match head & 0x1f {
        short @ 0..=23 => return Ok(u64::from(short)),
        24 => 1,
        25 => 2,
        26 => 4,
        27 => 8,
        31 => return Err(CborError::IndefiniteLength),
        _ => return Err(CborError::Codec(format!("reserved head byte {head:#04x}"))),
    };
    let arg = rest.get(..width).ok_or(CborError::InputTooShort)?;
    let len = arg.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    let minimal = match width {
        1 => len >= 24,
        w => len >> (4 * w) != 0,
    };
    if !minimal {
        return Err(CborError::NonCanonicalLength);
    }
    Ok(len)
}

pub fn decode_tuple<T>(bytes: &[u8], arity: u64) -> CborResult<T>
where
    T: DeserializeOwned + Serialize,
{
    //! Decode a tuple-encoded struct after checking its arity.
    //!
    //! The input must be exactly the canonical encoding of the result:
    //! oversized integer heads and trailing data are rejected.
    let got = array_len(bytes)?;
    if got != arity {
        return Err(CborError::ArityMismatch {
            expected: arity,
            got,
        });
    }
    let value: T = from_slice(bytes).map_err(|e| CborError::Codec(e.to_string()))?;
    if encode(&value)? != bytes {
        return Err(CborError::NonCanonical);
    }
    Ok(value)
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> CborResult<Vec<u8>> {
    //! Canonical CBOR encoding.
    to_vec(value).map_err(|e| CborError::Codec(e.to_string()))
}
