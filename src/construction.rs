//! Offline transaction construction.
//!
//! [`ConstructionClient`] is the entry point of this crate: it builds unsigned
//! transactions, signs them, parses them back and computes their hashes. It
//! never talks to a node, so nonces and gas parameters are supplied by the
//! caller in [`TxMetadata`].
//!
//! Transport formats:
//!
//! * unsigned transactions are base64 (standard alphabet) of the canonical
//!   CBOR [`Message`];
//! * signed transactions produced by [`ConstructionClient::sign_tx`] are the
//!   node API JSON form of [`SignedMessage`];
//! * [`ConstructionClient::parse_tx`] accepts base64 CBOR of either, and
//!   signed transactions in node API JSON form as well.

use crate::address::{Address, AddressConvertible, AddressFormatError};
use crate::amount::TokenAmount;
use crate::hash::{hash_signed_message_json, HashError};
use crate::message::{MalformedMessageError, Message, MethodNum, SignedMessage, MESSAGE_VERSION};
use crate::multisig::{method, DecodedParams, ParamsDecoders, ProposeParams, SwapSignerParams};
use crate::network::Network;
use crate::signature::{
    recover_message_signer, sign_message, verify_message, InvalidSignatureError, Signature,
    SignatureType, SigningError, SECP_SIG_LEN,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use tracing::{debug, trace};

/// Parameters that do not depend on the kind of transaction.
#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxMetadata {
    /// Sender's sequence number
    pub nonce: u64,
    /// Maximal price per gas unit
    pub gas_fee_cap: TokenAmount,
    /// Priority fee per gas unit
    pub gas_premium: TokenAmount,
    /// Maximal amount of gas to spend
    pub gas_limit: i64,
    /// Chain identifier, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Method override (payments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodNum>,
    /// Parameters override, base64 (payments only, requires `method`)
    #[serde_as(as = "Option<Base64>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<u8>>,
}

impl TxMetadata {
    pub fn new(
        nonce: u64,
        gas_fee_cap: TokenAmount,
        gas_premium: TokenAmount,
        gas_limit: i64,
    ) -> Self {
        //! Metadata without chain id and overrides.
        Self {
            nonce,
            gas_fee_cap,
            gas_premium,
            gas_limit,
            chain_id: None,
            method: None,
            params: None,
        }
    }

    fn has_override(&self) -> bool {
        self.method.is_some() || self.params.is_some()
    }
}

/// Input of [`ConstructionClient::construct_payment`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Amount to transfer
    pub quantity: u64,
    /// Nonce and gas parameters
    pub metadata: TxMetadata,
}

/// Transfer performed by a multisig wallet.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MultisigPaymentParams {
    /// Recipient address
    pub to: String,
    /// Amount to transfer
    pub quantity: u64,
}

/// Input of [`ConstructionClient::construct_multisig_payment`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MultisigPaymentRequest {
    /// Multisig wallet address
    pub multisig: String,
    /// Signer proposing the transfer
    pub from: String,
    /// Nonce and gas parameters
    pub metadata: TxMetadata,
    /// Transfer to propose
    pub params: MultisigPaymentParams,
}

/// Signer replacement in a multisig wallet.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SwapAuthorizedPartyParams {
    /// Signer to remove
    pub from: String,
    /// Signer to add
    pub to: String,
}

/// Input of [`ConstructionClient::construct_swap_authorized_party`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SwapAuthorizedPartyRequest {
    /// Multisig wallet address
    pub multisig: String,
    /// Signer proposing the swap
    pub from: String,
    /// Nonce and gas parameters
    pub metadata: TxMetadata,
    /// Swap to propose
    pub params: SwapAuthorizedPartyParams,
}

/// Input of [`ConstructionClient::parse_tx`]: exactly one field must be set.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParseTxRequest {
    /// Base64 CBOR of an unsigned message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned_tx: Option<String>,
    /// Base64 CBOR or node API JSON of a signed message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tx: Option<String>,
}

impl ParseTxRequest {
    /// Request to parse an unsigned transaction.
    pub fn unsigned(tx: impl Into<String>) -> Self {
        Self {
            unsigned_tx: Some(tx.into()),
            signed_tx: None,
        }
    }
    /// Request to parse a signed transaction.
    ///
    /// Both base64 CBOR and the JSON returned by
    /// [`ConstructionClient::sign_tx`] are accepted.
    pub fn signed(tx: impl Into<String>) -> Self {
        Self {
            unsigned_tx: None,
            signed_tx: Some(tx.into()),
        }
    }
}

/// Normalized view of a parsed message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Transferred amount
    pub quantity: TokenAmount,
    /// Invoked method
    pub method: MethodNum,
    /// Decoded parameters of a known method call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<DecodedParams>,
}

/// Result of [`ConstructionClient::parse_tx`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedTransaction {
    /// Parsed from an unsigned transaction.
    Unsigned(ParsedMessage),
    /// Parsed from a signed transaction.
    Signed(ParsedMessage),
}

impl ParsedTransaction {
    /// Parsed message.
    pub const fn message(&self) -> &ParsedMessage {
        match self {
            Self::Unsigned(message) | Self::Signed(message) => message,
        }
    }
    /// Whether the source transaction carried a signature.
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    pub fn to_json(&self) -> Result<String, ParseError> {
        //! JSON form: `{"unsigned": {...}}` or `{"signed": {...}}`.
        serde_json::to_string(self).map_err(|e| ParseError::Malformed(e.into()))
    }
}

/// Transaction construction errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConstructionError {
    /// Address field does not parse.
    #[error("Invalid `{field}` address: {source}")]
    InvalidAddress {
        /// Request field name
        field: &'static str,
        /// Parsing failure
        source: AddressFormatError,
    },
    /// Address belongs to the other network.
    #[error("`{field}` address is for {got}, client is configured for {expected}")]
    NetworkMismatch {
        /// Request field name
        field: &'static str,
        /// Client network
        expected: Network,
        /// Address network
        got: Network,
    },
    /// Gas limit is negative.
    #[error("Gas limit must not be negative, got {0}")]
    NegativeGasLimit(i64),
    /// Method or params override on a multisig call.
    #[error("Method and params can only be overridden for payments")]
    UnsupportedOverride,
    /// Params override without a method override.
    #[error("Params override requires a method")]
    ParamsWithoutMethod,
    /// Message could not be encoded.
    #[error(transparent)]
    Encoding(#[from] MalformedMessageError),
}

/// Transaction parsing errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Both or neither transaction fields are set.
    #[error("Exactly one of unsigned_tx and signed_tx must be set")]
    AmbiguousRequest,
    /// Transaction is not valid base64.
    #[error("Invalid base64 transaction: {0}")]
    InvalidBase64(String),
    /// Transaction or its params do not decode.
    #[error(transparent)]
    Malformed(#[from] MalformedMessageError),
}

/// Facade for offline transaction handling on a single network.
///
/// The client holds no mutable state: every operation depends only on its
/// arguments, the network and the params decoders chosen at construction.
#[derive(Clone, Debug)]
pub struct ConstructionClient {
    network: Network,
    decoders: ParamsDecoders,
}

impl ConstructionClient {
    pub fn new(network: Network) -> Self {
        //! Client with the default (multisig) params decoders.
        Self {
            network,
            decoders: ParamsDecoders::default(),
        }
    }

    #[must_use]
    pub fn with_params_decoders(mut self, decoders: ParamsDecoders) -> Self {
        //! Replace the table used by [`Self::parse_tx`].
        self.decoders = decoders;
        self
    }

    /// Network this client works with.
    pub const fn network(&self) -> Network {
        self.network
    }

    pub fn derive_from_public_key(&self, public_key: &[u8]) -> Result<String, AddressFormatError> {
        //! Address of a 65-byte uncompressed SECP256K1 public key.
        let address = Address::new_secp256k1(self.network, public_key)?;
        debug!(%address, "Derived address");
        Ok(address.to_string())
    }

    pub fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<[u8; SECP_SIG_LEN], SigningError> {
        //! Sign arbitrary bytes (Blake2b-256, then recoverable ECDSA).
        //!
        //! To sign a transaction by hand, pass [`Message::signing_bytes`].
        trace!(len = message.len(), "Signing bytes");
        sign_message(message, private_key)
    }

    pub fn verify(
        &self,
        message: &[u8],
        public_key: &[u8],
        signature: &[u8],
    ) -> Result<(), InvalidSignatureError> {
        //! Counterpart of [`Self::sign`].
        verify_message(message, public_key, signature)
    }

    pub fn construct_payment(&self, request: &PaymentRequest) -> Result<String, ConstructionError> {
        //! Unsigned transfer, base64 CBOR.
        //!
        //! `metadata.method` and `metadata.params` replace the plain transfer
        //! call when set.
        let metadata = &request.metadata;
        if metadata.params.is_some() && metadata.method.is_none() {
            return Err(ConstructionError::ParamsWithoutMethod);
        }
        let message = self.message(
            &request.to,
            &request.from,
            TokenAmount::from(request.quantity),
            metadata,
            metadata.method.unwrap_or(method::SEND),
            metadata.params.clone().unwrap_or_default(),
        )?;
        self.encode_unsigned(&message)
    }

    pub fn construct_multisig_payment(
        &self,
        request: &MultisigPaymentRequest,
    ) -> Result<String, ConstructionError> {
        //! Unsigned multisig `Propose` of a transfer, base64 CBOR.
        if request.metadata.has_override() {
            return Err(ConstructionError::UnsupportedOverride);
        }
        let to = self.parse_address("params.to", &request.params.to)?;
        let params =
            ProposeParams::transfer(to, TokenAmount::from(request.params.quantity)).to_cbor()?;
        let message = self.message(
            &request.multisig,
            &request.from,
            TokenAmount::zero(),
            &request.metadata,
            method::PROPOSE,
            params,
        )?;
        self.encode_unsigned(&message)
    }

    pub fn construct_swap_authorized_party(
        &self,
        request: &SwapAuthorizedPartyRequest,
    ) -> Result<String, ConstructionError> {
        //! Unsigned multisig `Propose` of a `SwapSigner` call, base64 CBOR.
        if request.metadata.has_override() {
            return Err(ConstructionError::UnsupportedOverride);
        }
        let multisig = self.parse_address("multisig", &request.multisig)?;
        let swap = SwapSignerParams {
            from: self.parse_address("params.from", &request.params.from)?,
            to: self.parse_address("params.to", &request.params.to)?,
        };
        let params = ProposeParams::swap_signer(multisig, &swap)?.to_cbor()?;
        let message = self.message(
            &request.multisig,
            &request.from,
            TokenAmount::zero(),
            &request.metadata,
            method::PROPOSE,
            params,
        )?;
        self.encode_unsigned(&message)
    }

    pub fn sign_tx(&self, unsigned_tx: &str, private_key: &[u8]) -> Result<String, SigningError> {
        //! Sign a base64 CBOR unsigned transaction.
        //!
        //! Returns the signed message in node API JSON form.
        let bytes = STANDARD
            .decode(unsigned_tx)
            .map_err(|e| SigningError::InvalidBase64(e.to_string()))?;
        let message = Message::from_cbor(&bytes)?.with_network(self.network);
        let signature = sign_message(&message.signing_bytes()?, private_key)?;
        let signed = SignedMessage {
            message,
            signature: Signature::new_secp256k1(signature),
        };
        debug!(
            from = %signed.message.from,
            nonce = signed.message.nonce,
            "Signed transaction"
        );
        Ok(signed.to_json()?)
    }

    pub fn parse_tx(&self, request: &ParseTxRequest) -> Result<ParsedTransaction, ParseError> {
        //! Decode a transaction into a normalized view.
        //!
        //! Params of methods known to the decoders table are decoded too.
        //! Params that no decoder understands are left out of the view.
        let unsigned = request.unsigned_tx.as_deref().filter(|tx| !tx.is_empty());
        let signed = request.signed_tx.as_deref().filter(|tx| !tx.is_empty());
        match (unsigned, signed) {
            (Some(tx), None) => {
                let message = Message::from_cbor(&decode_base64(tx)?)?;
                Ok(ParsedTransaction::Unsigned(self.normalize(message)))
            }
            (None, Some(tx)) if tx.trim_start().starts_with('{') => {
                let signed = SignedMessage::from_json(tx)?;
                Ok(ParsedTransaction::Signed(self.normalize(signed.message)))
            }
            (None, Some(tx)) => {
                let signed = SignedMessage::from_cbor(&decode_base64(tx)?)?;
                Ok(ParsedTransaction::Signed(self.normalize(signed.message)))
            }
            _ => Err(ParseError::AmbiguousRequest),
        }
    }

    pub fn hash(&self, signed_tx: &str) -> Result<String, HashError> {
        //! CID of a signed message in node API JSON form.
        let cid = hash_signed_message_json(signed_tx)?;
        debug!(%cid, "Hashed transaction");
        Ok(cid)
    }

    pub fn verify_tx(&self, signed_tx: &str) -> Result<Address, InvalidSignatureError> {
        //! Check that a signed transaction (node API JSON) was signed by its
        //! sender. Returns the sender address.
        //!
        //! Only SECP256K1 signatures can be checked.
        let signed = SignedMessage::from_json(signed_tx)?.with_network(self.network);
        let sig_type = signed.signature.sig_type();
        if sig_type != SignatureType::Secp256k1 {
            return Err(InvalidSignatureError::UnsupportedType(sig_type));
        }
        let signer = recover_message_signer(
            &signed.message.signing_bytes()?,
            signed.signature.data(),
        )?
        .address(self.network);
        if signer != signed.message.from {
            return Err(InvalidSignatureError::SignerMismatch);
        }
        Ok(signer)
    }

    fn parse_address(&self, field: &'static str, text: &str) -> Result<Address, ConstructionError> {
        let address: Address = text
            .parse()
            .map_err(|source| ConstructionError::InvalidAddress { field, source })?;
        if address.network() != self.network {
            return Err(ConstructionError::NetworkMismatch {
                field,
                expected: self.network,
                got: address.network(),
            });
        }
        Ok(address)
    }

    fn message(
        &self,
        to: &str,
        from: &str,
        value: TokenAmount,
        metadata: &TxMetadata,
        method: MethodNum,
        params: Vec<u8>,
    ) -> Result<Message, ConstructionError> {
        if metadata.gas_limit < 0 {
            return Err(ConstructionError::NegativeGasLimit(metadata.gas_limit));
        }
        if let Some(chain_id) = &metadata.chain_id {
            trace!(%chain_id, "Chain id is not part of the message");
        }
        Ok(Message {
            version: MESSAGE_VERSION,
            to: self.parse_address("to", to)?,
            from: self.parse_address("from", from)?,
            nonce: metadata.nonce,
            value,
            gas_limit: metadata.gas_limit,
            gas_fee_cap: metadata.gas_fee_cap,
            gas_premium: metadata.gas_premium,
            method,
            params,
        })
    }

    fn encode_unsigned(&self, message: &Message) -> Result<String, ConstructionError> {
        let bytes = message.to_cbor()?;
        debug!(
            to = %message.to,
            from = %message.from,
            nonce = message.nonce,
            method = message.method,
            "Constructed transaction"
        );
        Ok(STANDARD.encode(bytes))
    }

    fn normalize(&self, message: Message) -> ParsedMessage {
        let message = message.with_network(self.network);
        let params = self
            .decoders
            .decode(message.method, &message.params, self.network);
        ParsedMessage {
            from: message.from,
            to: message.to,
            quantity: message.value,
            method: message.method,
            params,
        }
    }
}

fn decode_base64(tx: &str) -> Result<Vec<u8>, ParseError> {
    STANDARD
        .decode(tx)
        .map_err(|e| ParseError::InvalidBase64(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    const FROM: &str = "t1d2xrzcslx7xlbbylc5c3d5lvandqw4iwl6epxba";
    const TO: &str = "t17uoq6tp427uzv7fztkbsnn64iwotfrristwpryy";

    fn metadata() -> TxMetadata {
        TxMetadata::new(1, TokenAmount::from(1), TokenAmount::from(1), 25000)
    }

    fn payment() -> PaymentRequest {
        PaymentRequest {
            from: FROM.to_string(),
            to: TO.to_string(),
            quantity: 100_000,
            metadata: metadata(),
        }
    }

    #[test]
    fn test_network_mismatch() {
        let client = ConstructionClient::new(Network::Mainnet);
        assert_eq!(
            client.construct_payment(&payment()).unwrap_err(),
            ConstructionError::NetworkMismatch {
                field: "to",
                expected: Network::Mainnet,
                got: Network::Testnet
            }
        );
    }

    #[test]
    fn test_invalid_address_field() {
        let client = ConstructionClient::new(Network::Testnet);
        let mut request = payment();
        request.from = "t1invalid".to_string();
        assert!(matches!(
            client.construct_payment(&request).unwrap_err(),
            ConstructionError::InvalidAddress { field: "from", .. }
        ));
    }

    #[test]
    fn test_negative_gas_limit() {
        let client = ConstructionClient::new(Network::Testnet);
        let mut request = payment();
        request.metadata.gas_limit = -1;
        assert_eq!(
            client.construct_payment(&request).unwrap_err(),
            ConstructionError::NegativeGasLimit(-1)
        );
    }

    #[test]
    fn test_payment_override() {
        let client = ConstructionClient::new(Network::Testnet);
        let mut request = payment();
        request.metadata.params = Some(vec![0x80]);
        assert_eq!(
            client.construct_payment(&request).unwrap_err(),
            ConstructionError::ParamsWithoutMethod
        );
        request.metadata.method = Some(3);
        let tx = client.construct_payment(&request).unwrap();
        let message = Message::from_cbor(&STANDARD.decode(tx).unwrap()).unwrap();
        assert_eq!(message.method, 3);
        assert_eq!(message.params, vec![0x80]);
    }

    #[test]
    fn test_multisig_rejects_override() {
        let client = ConstructionClient::new(Network::Testnet);
        let mut metadata = metadata();
        metadata.method = Some(0);
        let request = MultisigPaymentRequest {
            multisig: "t01002".to_string(),
            from: FROM.to_string(),
            metadata,
            params: MultisigPaymentParams {
                to: TO.to_string(),
                quantity: 1000,
            },
        };
        assert_eq!(
            client.construct_multisig_payment(&request).unwrap_err(),
            ConstructionError::UnsupportedOverride
        );
    }

    #[test]
    fn test_metadata_json() {
        let json = r#"{"nonce":1,"gasFeeCap":"1","gasPremium":"1","gasLimit":25000,"chainId":"314"}"#;
        let parsed: TxMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chain_id.as_deref(), Some("314"));
        assert_eq!(parsed.params, None);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }

    #[test]
    fn test_ambiguous_parse_request() {
        let client = ConstructionClient::new(Network::Testnet);
        assert_eq!(
            client.parse_tx(&ParseTxRequest::default()).unwrap_err(),
            ParseError::AmbiguousRequest
        );
        let both = ParseTxRequest {
            unsigned_tx: Some("gA==".to_string()),
            signed_tx: Some("gA==".to_string()),
        };
        assert_eq!(
            client.parse_tx(&both).unwrap_err(),
            ParseError::AmbiguousRequest
        );
        assert!(matches!(
            client.parse_tx(&ParseTxRequest::unsigned("@@")).unwrap_err(),
            ParseError::InvalidBase64(_)
        ));
    }
}
