//! Token amounts.
//!
//! Amounts are arbitrary precision non-negative integers (attoFIL). In JSON
//! they are decimal strings, on the wire they are byte strings: empty for
//! zero, otherwise a sign byte (`0x00` for positive) followed by the minimal
//! big-endian magnitude.

use crate::utils::lstrip;
use ethereum_types::U256;
use fvm_ipld_encoding::{BytesDe, BytesSer};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

const POSITIVE_SIGN: u8 = 0x00;
const NEGATIVE_SIGN: u8 = 0x01;

/// Amount parsing errors (both decimal and binary forms).
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum AmountError {
    /// Not a non-negative decimal integer.
    #[error("Invalid decimal amount: {0:?}")]
    InvalidDecimal(String),
    /// Amount does not fit into 256 bits.
    #[error("Amount overflows 256 bits")]
    Overflow,
    /// Binary form encodes a negative number.
    #[error("Negative amounts are not allowed")]
    Negative,
    /// Binary form starts with an unknown sign byte.
    #[error("Invalid sign byte {0:#04x}")]
    InvalidSign(u8),
    /// Binary form is not minimal (leading zeros or bare sign byte).
    #[error("Amount encoding is not minimal")]
    NonMinimal,
}

/// Non-negative token amount in attoFIL.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TokenAmount(U256);

impl TokenAmount {
    /// Zero amount.
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    /// Underlying integer.
    pub const fn atto(&self) -> U256 {
        self.0
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        //! Wire form: empty for zero, else sign byte and minimal magnitude.
        if self.is_zero() {
            return vec![];
        }
        let mut be = [0u8; 32];
        self.0.to_big_endian(&mut be);
        let mut out = vec![POSITIVE_SIGN];
        out.extend(lstrip(be));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AmountError> {
        //! Parse the wire form, rejecting negative and non-minimal encodings.
        let (&sign, magnitude) = match bytes.split_first() {
            None => return Ok(Self::zero()),
            Some(parts) => parts,
        };
        match sign {
            POSITIVE_SIGN => {}
            NEGATIVE_SIGN => return Err(AmountError::Negative),
            other => return Err(AmountError::InvalidSign(other)),
        }
        match magnitude.first() {
            None | Some(0) => return Err(AmountError::NonMinimal),
            Some(_) => {}
        }
        if magnitude.len() > 32 {
            return Err(AmountError::Overflow);
        }
        Ok(Self(U256::from_big_endian(magnitude)))
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidDecimal(s.to_string()));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|_| AmountError::Overflow)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            BytesSer(&self.to_bytes()).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(de::Error::custom)
        } else {
            let BytesDe(bytes) = BytesDe::deserialize(deserializer)?;
            Self::from_bytes(&bytes).map_err(de::Error::custom)
        }
    }
}
