//! Filecoin messages (transactions) support.
//!
//! A [`Message`] is encoded as a 10-element CBOR array, fields in
//! declaration order:
//!
//! ```txt
//! [Version, To, From, Nonce, Value, GasLimit, GasFeeCap, GasPremium, Method, Params]
//! ```
//!
//! A [`SignedMessage`] is a 2-element array `[Message, Signature]`. Both
//! also have a JSON form matching the one used by Filecoin node APIs
//! ([`MessageJson`], [`SignedMessageJson`]).

use crate::address::Address;
use crate::amount::TokenAmount;
use crate::cbor::{self, CborError};
use crate::hash::cbor_cid;
use crate::network::Network;
use crate::signature::{InvalidSignatureError, Signature, SignatureJson, SignatureType};
use cid::Cid;
use fvm_ipld_encoding::strict_bytes;
use fvm_ipld_encoding::tuple::*;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

/// The only message version in use.
pub const MESSAGE_VERSION: u64 = 0;
/// Number of fields in an encoded [`Message`].
pub const MESSAGE_ARITY: u64 = 10;
/// Number of fields in an encoded [`SignedMessage`].
pub const SIGNED_MESSAGE_ARITY: u64 = 2;

/// Actor method selector.
pub type MethodNum = u64;

/// Message decoding errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum MalformedMessageError {
    /// Encoded array has a wrong number of fields.
    #[error("Message has wrong number of fields: expected {expected}, got {got}")]
    ArityMismatch {
        /// Expected number of fields
        expected: u64,
        /// Actual number of fields
        got: u64,
    },
    /// Version other than [`MESSAGE_VERSION`].
    #[error("Unsupported message version {0}")]
    UnsupportedVersion(u64),
    /// CBOR is malformed: bad integers, amounts, addresses or trailing data.
    #[error("Invalid message encoding: {0}")]
    Encoding(String),
    /// JSON is malformed.
    #[error("Invalid message JSON: {0}")]
    Json(String),
    /// Signature part is malformed.
    #[error("Invalid message signature: {0}")]
    Signature(String),
}

impl From<CborError> for MalformedMessageError {
    fn from(value: CborError) -> Self {
        match value {
            CborError::ArityMismatch { expected, got } => Self::ArityMismatch { expected, got },
            other => Self::Encoding(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MalformedMessageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

/// Represents a single Filecoin message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct Message {
    /// Message version, always [`MESSAGE_VERSION`].
    pub version: u64,
    /// Recipient
    pub to: Address,
    /// Sender
    pub from: Address,
    /// Sender's sequence number.
    pub nonce: u64,
    /// Amount of funds to transfer.
    pub value: TokenAmount,
    /// Maximal amount of gas to spend.
    pub gas_limit: i64,
    /// Maximal price per gas unit.
    pub gas_fee_cap: TokenAmount,
    /// Priority fee per gas unit.
    pub gas_premium: TokenAmount,
    /// Method to invoke on the recipient.
    pub method: MethodNum,
    /// Method parameters, usually CBOR-encoded themselves.
    #[serde(with = "strict_bytes")]
    pub params: Vec<u8>,
}

fn check_version(version: u64) -> Result<(), MalformedMessageError> {
    if version != MESSAGE_VERSION {
        return Err(MalformedMessageError::UnsupportedVersion(version));
    }
    Ok(())
}

impl Message {
    pub fn to_cbor(&self) -> Result<Vec<u8>, MalformedMessageError> {
        //! Canonical encoding.
        Ok(cbor::encode(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, MalformedMessageError> {
        //! Strict decoding of the canonical encoding.
        let message: Self = cbor::decode_tuple(bytes, MESSAGE_ARITY)?;
        check_version(message.version)?;
        Ok(message)
    }

    pub fn cid(&self) -> Result<Cid, MalformedMessageError> {
        //! Content identifier of the unsigned message.
        Ok(cbor_cid(&self.to_cbor()?))
    }

    pub fn signing_bytes(&self) -> Result<Vec<u8>, MalformedMessageError> {
        //! Bytes a sender signs: the binary CID of the message.
        Ok(self.cid()?.to_bytes())
    }

    #[must_use]
    pub fn with_network(self, network: Network) -> Self {
        //! Render both addresses for the given network.
        Self {
            to: self.to.with_network(network),
            from: self.from.with_network(network),
            ..self
        }
    }

    pub fn to_json(&self) -> Result<String, MalformedMessageError> {
        //! Node API JSON form.
        Ok(serde_json::to_string(&MessageJson::from(self))?)
    }

    pub fn from_json(json: &str) -> Result<Self, MalformedMessageError> {
        //! Parse the node API JSON form.
        serde_json::from_str::<MessageJson>(json)?.try_into()
    }
}

/// Message with a signature attached.
#[derive(Clone, Debug, Eq, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct SignedMessage {
    /// Signed message
    pub message: Message,
    /// Sender's signature
    pub signature: Signature,
}

impl SignedMessage {
    pub fn to_cbor(&self) -> Result<Vec<u8>, MalformedMessageError> {
        //! Canonical encoding.
        Ok(cbor::encode(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, MalformedMessageError> {
        //! Strict decoding of the canonical encoding.
        let outer = cbor::array_len(bytes)?;
        if outer != SIGNED_MESSAGE_ARITY {
            return Err(MalformedMessageError::ArityMismatch {
                expected: SIGNED_MESSAGE_ARITY,
                got: outer,
            });
        }
        // The outer header is a single byte for a 2-element array.
        let inner = cbor::array_len(&bytes[1..])?;
        if inner != MESSAGE_ARITY {
            return Err(MalformedMessageError::ArityMismatch {
                expected: MESSAGE_ARITY,
                got: inner,
            });
        }
        let signed: Self = cbor::decode_tuple(bytes, SIGNED_MESSAGE_ARITY)?;
        check_version(signed.message.version)?;
        Ok(signed)
    }

    pub fn cid(&self) -> Result<Cid, MalformedMessageError> {
        //! Content identifier (transaction hash).
        //!
        //! BLS-signed messages are aggregated in blocks and identified by the
        //! CID of the unsigned message; everything else by the signed form.
        match self.signature.sig_type() {
            SignatureType::Bls => self.message.cid(),
            SignatureType::Secp256k1 => Ok(cbor_cid(&self.to_cbor()?)),
        }
    }

    #[must_use]
    pub fn with_network(self, network: Network) -> Self {
        //! Render both message addresses for the given network.
        Self {
            message: self.message.with_network(network),
            ..self
        }
    }

    pub fn to_json(&self) -> Result<String, MalformedMessageError> {
        //! Node API JSON form.
        Ok(serde_json::to_string(&SignedMessageJson::from(self))?)
    }

    pub fn from_json(json: &str) -> Result<Self, MalformedMessageError> {
        //! Parse the node API JSON form.
        serde_json::from_str::<SignedMessageJson>(json)?.try_into()
    }
}

/// JSON representation of a [`Message`].
#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageJson {
    /// Message version
    #[serde(default)]
    pub version: u64,
    /// Recipient
    pub to: Address,
    /// Sender
    pub from: Address,
    /// Sender's sequence number
    pub nonce: u64,
    /// Transferred amount (decimal string)
    pub value: TokenAmount,
    /// Gas limit
    pub gas_limit: i64,
    /// Gas fee cap (decimal string)
    pub gas_fee_cap: TokenAmount,
    /// Gas premium (decimal string)
    pub gas_premium: TokenAmount,
    /// Method selector
    pub method: MethodNum,
    /// Base64 parameters; `null`, `""` and a missing field all mean empty
    #[serde_as(as = "Option<Base64>")]
    pub params: Option<Vec<u8>>,
}

impl From<&Message> for MessageJson {
    fn from(value: &Message) -> Self {
        Self {
            version: value.version,
            to: value.to.clone(),
            from: value.from.clone(),
            nonce: value.nonce,
            value: value.value,
            gas_limit: value.gas_limit,
            gas_fee_cap: value.gas_fee_cap,
            gas_premium: value.gas_premium,
            method: value.method,
            params: Some(value.params.clone()),
        }
    }
}

impl TryFrom<MessageJson> for Message {
    type Error = MalformedMessageError;

    fn try_from(value: MessageJson) -> Result<Self, Self::Error> {
        check_version(value.version)?;
        Ok(Self {
            version: value.version,
            to: value.to,
            from: value.from,
            nonce: value.nonce,
            value: value.value,
            gas_limit: value.gas_limit,
            gas_fee_cap: value.gas_fee_cap,
            gas_premium: value.gas_premium,
            method: value.method,
            params: value.params.unwrap_or_default(),
        })
    }
}

/// JSON representation of a [`SignedMessage`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessageJson {
    /// Signed message
    pub message: MessageJson,
    /// Signature
    pub signature: SignatureJson,
}

impl From<&SignedMessage> for SignedMessageJson {
    fn from(value: &SignedMessage) -> Self {
        Self {
            message: MessageJson::from(&value.message),
            signature: SignatureJson::from(&value.signature),
        }
    }
}

impl TryFrom<SignedMessageJson> for SignedMessage {
    type Error = MalformedMessageError;

    fn try_from(value: SignedMessageJson) -> Result<Self, Self::Error> {
        Ok(Self {
            message: value.message.try_into()?,
            signature: value
                .signature
                .try_into()
                .map_err(|e: InvalidSignatureError| MalformedMessageError::Signature(e.to_string()))?,
        })
    }
}
