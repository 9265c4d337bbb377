//! Content identifiers (transaction hashes).

use crate::cbor::DAG_CBOR;
use crate::message::{MalformedMessageError, SignedMessage};
use multihash::{Code, MultihashDigest};

pub use cid::Cid;

/// Hashing errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum HashError {
    /// Input is not a signed message.
    #[error(transparent)]
    Malformed(#[from] MalformedMessageError),
}

pub fn cbor_cid(bytes: &[u8]) -> Cid {
    //! CIDv1 of DAG-CBOR data with a BLAKE2b-256 multihash.
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(bytes))
}

pub fn hash_signed_message_json(json: &str) -> Result<String, HashError> {
    //! Transaction hash of a JSON signed message, as a base32 CID string.
    let signed = SignedMessage::from_json(json)?;
    Ok(signed.cid()?.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cid_prefix() {
        let cid = cbor_cid(&[0x80]);
        assert_eq!(&cid.to_bytes()[..6], &[0x01, 0x71, 0xa0, 0xe4, 0x02, 0x20]);
        assert_eq!(cid.to_bytes().len(), 38);
        assert!(cid.to_string().starts_with("bafy2bza"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            hash_signed_message_json("{").unwrap_err(),
            HashError::Malformed(MalformedMessageError::Json(_))
        ));
    }
}
