//! SECP256K1 signatures.
//!
//! The low-level pair [`sign_digest`] / [`verify_digest`] works on 32-byte
//! digests and never hashes its input. Filecoin does not sign digests
//! supplied by users though: the bytes to sign (for a message, the bytes of
//! its CID) are first reduced with Blake2b-256. [`sign_message`] and
//! [`verify_message`] implement that convention on top of the raw pair.

use crate::message::MalformedMessageError;
use crate::utils::blake2b_256;
use fvm_ipld_encoding::{BytesDe, BytesSer};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message as Digest, PublicKey, Secp256k1, SecretKey,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::{base64::Base64, serde_as};

/// Length of a recoverable SECP256K1 signature (`r ‖ s ‖ v`).
pub const SECP_SIG_LEN: usize = 65;
/// Length of a BLS signature.
pub const BLS_SIG_LEN: usize = 96;
/// Length of a digest accepted by [`sign_digest`].
pub const DIGEST_LEN: usize = 32;

/// Signature scheme tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SignatureType {
    /// Recoverable ECDSA over SECP256K1
    Secp256k1 = 1,
    /// BLS12-381 (parse only)
    Bls = 2,
}

impl SignatureType {
    /// Parse a signature type byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Secp256k1),
            2 => Some(Self::Bls),
            _ => None,
        }
    }

    /// Expected signature data length.
    pub const fn data_len(&self) -> usize {
        match self {
            Self::Secp256k1 => SECP_SIG_LEN,
            Self::Bls => BLS_SIG_LEN,
        }
    }
}

/// Errors raised while producing a signature.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SigningError {
    /// Private key is not a valid 32-byte SECP256K1 scalar.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    /// Digest is not exactly 32 bytes long.
    #[error("Digest must be 32 bytes long, got {0}")]
    InvalidDigest(usize),
    /// Unsigned transaction is not valid base64.
    #[error("Invalid base64 transaction: {0}")]
    InvalidBase64(String),
    /// Unsigned transaction could not be decoded or re-encoded.
    #[error(transparent)]
    Transaction(#[from] MalformedMessageError),
}

/// Signature verification failures.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum InvalidSignatureError {
    /// Public key does not parse (33 or 65 bytes expected).
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Digest is not exactly 32 bytes long.
    #[error("Digest must be 32 bytes long, got {0}")]
    InvalidDigest(usize),
    /// Signature bytes are malformed.
    #[error("Malformed signature: {0}")]
    Malformed(String),
    /// Signature was produced by another key.
    #[error("Signature does not match the signer")]
    SignerMismatch,
    /// Signature scheme cannot be verified by this library.
    #[error("Unsupported signature type {0:?}")]
    UnsupportedType(SignatureType),
    /// Signed transaction could not be decoded.
    #[error(transparent)]
    Transaction(#[from] MalformedMessageError),
}

/// Typed signature attached to a signed message.
///
/// The wire form is a byte string: the type byte followed by the data.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Signature {
    sig_type: SignatureType,
    data: Vec<u8>,
}

impl Signature {
    pub fn new(sig_type: SignatureType, data: Vec<u8>) -> Result<Self, InvalidSignatureError> {
        //! Create a signature, checking data length for the scheme.
        if data.len() != sig_type.data_len() {
            return Err(InvalidSignatureError::Malformed(format!(
                "{sig_type:?} signature must be {} bytes long, got {}",
                sig_type.data_len(),
                data.len()
            )));
        }
        Ok(Self { sig_type, data })
    }

    pub fn new_secp256k1(data: [u8; SECP_SIG_LEN]) -> Self {
        //! Wrap a recoverable SECP256K1 signature.
        Self {
            sig_type: SignatureType::Secp256k1,
            data: data.to_vec(),
        }
    }

    /// Signature scheme.
    pub const fn sig_type(&self) -> SignatureType {
        self.sig_type
    }
    /// Raw signature data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        //! Wire form: type byte followed by data.
        let mut out = Vec::with_capacity(1 + self.data.len());
        out.push(self.sig_type as u8);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidSignatureError> {
        //! Parse the wire form.
        let (&tag, data) = bytes
            .split_first()
            .ok_or_else(|| InvalidSignatureError::Malformed("empty signature".to_string()))?;
        let sig_type = SignatureType::from_byte(tag).ok_or_else(|| {
            InvalidSignatureError::Malformed(format!("unknown signature type {tag}"))
        })?;
        Self::new(sig_type, data.to_vec())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BytesSer(&self.to_bytes()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let BytesDe(bytes) = BytesDe::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// JSON representation of a [`Signature`] (`{"Type": 1, "Data": "<base64>"}`).
#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignatureJson {
    /// Signature scheme
    #[serde(rename = "Type")]
    pub sig_type: SignatureType,
    /// Signature data
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

impl From<&Signature> for SignatureJson {
    fn from(value: &Signature) -> Self {
        Self {
            sig_type: value.sig_type,
            data: value.data.clone(),
        }
    }
}

impl TryFrom<SignatureJson> for Signature {
    type Error = InvalidSignatureError;

    fn try_from(value: SignatureJson) -> Result<Self, Self::Error> {
        Self::new(value.sig_type, value.data)
    }
}

fn to_digest(digest: &[u8]) -> Option<Digest> {
    if digest.len() != DIGEST_LEN {
        return None;
    }
    Digest::from_slice(digest).ok()
}

pub fn sign_digest(digest: &[u8], private_key: &[u8]) -> Result<[u8; SECP_SIG_LEN], SigningError> {
    //! Sign a 32-byte digest as is.
    //!
    //! Nonces are derived deterministically (RFC 6979), so the same digest
    //! and key always produce the same signature. The output is
    //! `r ‖ s ‖ v` with recovery id `v` in `{0, 1}`.
    let secret = SecretKey::from_slice(private_key)
        .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?;
    let digest = to_digest(digest).ok_or(SigningError::InvalidDigest(digest.len()))?;
    let (recovery_id, compact) = Secp256k1::signing_only()
        .sign_ecdsa_recoverable(&digest, &secret)
        .serialize_compact();

    let mut out = [0u8; SECP_SIG_LEN];
    out[..64].copy_from_slice(&compact);
    // Recovery ids are always in 0..=3.
    out[64] = recovery_id.to_i32() as u8;
    Ok(out)
}

pub fn recover_public_key(
    digest: &[u8],
    signature: &[u8],
) -> Result<PublicKey, InvalidSignatureError> {
    //! Recover the signer of a 32-byte digest.
    let digest = to_digest(digest).ok_or(InvalidSignatureError::InvalidDigest(digest.len()))?;
    if signature.len() != SECP_SIG_LEN {
        return Err(InvalidSignatureError::Malformed(format!(
            "expected {SECP_SIG_LEN} bytes, got {}",
            signature.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(i32::from(signature[64]))
        .map_err(|e| InvalidSignatureError::Malformed(e.to_string()))?;
    let signature = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| InvalidSignatureError::Malformed(e.to_string()))?;
    Secp256k1::verification_only()
        .recover_ecdsa(&digest, &signature)
        .map_err(|_| InvalidSignatureError::SignerMismatch)
}

pub fn verify_digest(
    digest: &[u8],
    public_key: &[u8],
    signature: &[u8],
) -> Result<(), InvalidSignatureError> {
    //! Verify a signature over a 32-byte digest.
    //!
    //! Both compressed (33 bytes) and uncompressed (65 bytes) keys are
    //! accepted. The signer is recovered from the signature, so the recovery
    //! id is checked along with `r` and `s`.
    let expected = PublicKey::from_slice(public_key)
        .map_err(|e| InvalidSignatureError::InvalidPublicKey(e.to_string()))?;
    let recovered = recover_public_key(digest, signature)?;
    if recovered.serialize() != expected.serialize() {
        return Err(InvalidSignatureError::SignerMismatch);
    }
    Ok(())
}

pub fn sign_message(message: &[u8], private_key: &[u8]) -> Result<[u8; SECP_SIG_LEN], SigningError> {
    //! Sign arbitrary bytes the way Filecoin does: Blake2b-256, then ECDSA.
    sign_digest(&blake2b_256(&[message]), private_key)
}

pub fn verify_message(
    message: &[u8],
    public_key: &[u8],
    signature: &[u8],
) -> Result<(), InvalidSignatureError> {
    //! Counterpart of [`sign_message`].
    verify_digest(&blake2b_256(&[message]), public_key, signature)
}

pub fn recover_message_signer(
    message: &[u8],
    signature: &[u8],
) -> Result<PublicKey, InvalidSignatureError> {
    //! Recover the key that produced `signature` with [`sign_message`].
    recover_public_key(&blake2b_256(&[message]), signature)
}

#[cfg(test)]
mod test {
    use super::*;

    const PRIVATE_KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_sign_is_deterministic() {
        let digest = blake2b_256(&[b"payload"]);
        let first = sign_digest(&digest, &PRIVATE_KEY).unwrap();
        let second = sign_digest(&digest, &PRIVATE_KEY).unwrap();
        assert_eq!(first, second);
        assert!(first[64] <= 1);
    }

    #[test]
    fn test_bad_inputs() {
        assert_eq!(
            sign_digest(&[0u8; 31], &PRIVATE_KEY).unwrap_err(),
            SigningError::InvalidDigest(31)
        );
        assert!(matches!(
            sign_digest(&[0u8; 32], &[1u8; 31]).unwrap_err(),
            SigningError::InvalidPrivateKey(_)
        ));
        assert!(matches!(
            sign_digest(&[0u8; 32], &[0u8; 32]).unwrap_err(),
            SigningError::InvalidPrivateKey(_)
        ));
    }

    #[test]
    fn test_recovery_id_is_checked() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&PRIVATE_KEY).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret).serialize();
        let digest = blake2b_256(&[b"payload"]);
        let mut signature = sign_digest(&digest, &PRIVATE_KEY).unwrap();
        verify_digest(&digest, &public, &signature).unwrap();

        signature[64] ^= 1;
        assert!(verify_digest(&digest, &public, &signature).is_err());
        signature[64] = 4;
        assert!(matches!(
            verify_digest(&digest, &public, &signature).unwrap_err(),
            InvalidSignatureError::Malformed(_)
        ));
    }

    #[test]
    fn test_wire_form() {
        let signature = Signature::new_secp256k1([3u8; SECP_SIG_LEN]);
        let bytes = signature.to_bytes();
        assert_eq!(bytes.len(), 66);
        assert_eq!(bytes[0], 1);
        assert_eq!(Signature::from_bytes(&bytes).unwrap(), signature);

        assert!(Signature::from_bytes(&[]).is_err());
        assert!(Signature::from_bytes(&[3, 0, 0]).is_err());
        assert!(Signature::from_bytes(&bytes[..65]).is_err());
        assert!(Signature::new(SignatureType::Bls, vec![0; BLS_SIG_LEN]).is_ok());
    }

    #[test]
    fn test_json_form() {
        let signature = Signature::new_secp256k1([0u8; SECP_SIG_LEN]);
        let json = serde_json::to_string(&SignatureJson::from(&signature)).unwrap();
        assert!(json.starts_with("{\"Type\":1,\"Data\":\"AAAA"));
        let back: SignatureJson = serde_json::from_str(&json).unwrap();
        assert_eq!(Signature::try_from(back).unwrap(), signature);
    }
}
