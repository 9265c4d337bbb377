//! Filecoin address operations and verifications.
//!
//! An address is a protocol tag followed by a protocol-specific payload.
//! The binary form (used inside messages) is `protocol ‖ payload`, the
//! textual form is
//!
//! ```txt
//! network-prefix ‖ protocol-digit ‖ base32(payload ‖ checksum)
//! ```
//!
//! where `checksum` is a 4-byte Blake2b digest of the binary form. ID
//! addresses are rendered as a plain decimal number without checksum, and
//! delegated addresses put their namespace in decimal before an `f`
//! separator.

use crate::network::Network;
use crate::utils::{blake2b_160, blake2b_checksum};
use data_encoding::BASE32_NOPAD;
use fvm_ipld_encoding::{BytesDe, BytesSer};
pub use secp256k1::{PublicKey, SecretKey as PrivateKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt,
    hash::{Hash, Hasher},
    result::Result,
    str::FromStr,
};

/// Length of SECP256K1 and Actor payloads (a Blake2b-160 digest).
pub const PAYLOAD_HASH_LEN: usize = 20;
/// Length of BLS payloads (a compressed BLS public key).
pub const BLS_PUB_LEN: usize = 48;
/// Length of uncompressed SECP256K1 public keys.
pub const SECP_PUB_LEN: usize = 65;
/// Length of the checksum appended to textual addresses.
pub const CHECKSUM_LEN: usize = 4;
/// Maximal length of a delegated sub-address.
pub const MAX_SUBADDRESS_LEN: usize = 54;

/// Address protocol (the leading byte/digit of every address).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Protocol {
    /// Actor ID assigned by the chain.
    Id = 0,
    /// Hash of a SECP256K1 public key.
    Secp256k1 = 1,
    /// Hash of actor creation data.
    Actor = 2,
    /// BLS public key.
    Bls = 3,
    /// Namespaced sub-address managed by an address manager actor.
    Delegated = 4,
}

impl Protocol {
    /// Parse a protocol byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Id),
            1 => Some(Self::Secp256k1),
            2 => Some(Self::Actor),
            3 => Some(Self::Bls),
            4 => Some(Self::Delegated),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Id => "ID",
            Self::Secp256k1 => "SECP256K1",
            Self::Actor => "Actor",
            Self::Bls => "BLS",
            Self::Delegated => "Delegated",
        })
    }
}

/// Address parsing and validation errors.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum AddressFormatError {
    /// Nothing left to parse.
    #[error("Address is too short")]
    TooShort,
    /// First character is not a known network prefix.
    #[error("Unknown network prefix {0:?}")]
    UnknownNetwork(char),
    /// Protocol digit or byte is not known.
    #[error("Unknown address protocol {0:?}")]
    UnknownProtocol(String),
    /// Payload is not valid lowercase unpadded base32.
    #[error("Invalid address encoding: {0}")]
    InvalidEncoding(String),
    /// Checksum does not match the payload.
    #[error("Invalid address checksum")]
    InvalidChecksum,
    /// Payload has the wrong size for its protocol.
    #[error("Invalid payload length for {protocol} address: expected {expected}, got {got}")]
    InvalidPayloadLength {
        /// Address protocol
        protocol: Protocol,
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        got: usize,
    },
    /// ID or namespace is not a valid unsigned 64-bit number.
    #[error("Invalid actor ID: {0}")]
    InvalidId(String),
    /// Public key has a wrong length or format.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Delegated sub-address is longer than allowed.
    #[error("Delegated sub-address is {0} bytes long, at most 54 allowed")]
    SubaddressTooLong(usize),
}

/// Payload of a delegated (`f4`) address.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DelegatedAddress {
    namespace: u64,
    subaddress: Vec<u8>,
}

impl DelegatedAddress {
    pub fn new(namespace: u64, subaddress: &[u8]) -> Result<Self, AddressFormatError> {
        //! Create a delegated payload, checking sub-address length.
        if subaddress.len() > MAX_SUBADDRESS_LEN {
            return Err(AddressFormatError::SubaddressTooLong(subaddress.len()));
        }
        Ok(Self {
            namespace,
            subaddress: subaddress.to_vec(),
        })
    }
    /// Actor ID of the address manager.
    pub const fn namespace(&self) -> u64 {
        self.namespace
    }
    /// Manager-specific sub-address.
    pub fn subaddress(&self) -> &[u8] {
        &self.subaddress
    }
}

/// Protocol-specific address payload.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Payload {
    /// Actor ID
    Id(u64),
    /// Blake2b-160 of an uncompressed SECP256K1 public key
    Secp256k1([u8; PAYLOAD_HASH_LEN]),
    /// Blake2b-160 of actor creation data
    Actor([u8; PAYLOAD_HASH_LEN]),
    /// BLS public key
    Bls([u8; BLS_PUB_LEN]),
    /// Delegated sub-address
    Delegated(DelegatedAddress),
}

fn fixed<const N: usize>(protocol: Protocol, raw: &[u8]) -> Result<[u8; N], AddressFormatError> {
    raw.try_into()
        .map_err(|_| AddressFormatError::InvalidPayloadLength {
            protocol,
            expected: N,
            got: raw.len(),
        })
}

fn decode_varint(raw: &[u8]) -> Result<(u64, &[u8]), AddressFormatError> {
    unsigned_varint::decode::u64(raw).map_err(|e| AddressFormatError::InvalidId(e.to_string()))
}

fn encode_varint(value: u64, out: &mut Vec<u8>) {
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(value, &mut buf));
}

impl Payload {
    /// Protocol this payload belongs to.
    pub const fn protocol(&self) -> Protocol {
        match self {
            Self::Id(_) => Protocol::Id,
            Self::Secp256k1(_) => Protocol::Secp256k1,
            Self::Actor(_) => Protocol::Actor,
            Self::Bls(_) => Protocol::Bls,
            Self::Delegated(_) => Protocol::Delegated,
        }
    }

    pub fn from_raw(protocol: Protocol, raw: &[u8]) -> Result<Self, AddressFormatError> {
        //! Parse a binary payload (without the protocol byte).
        Ok(match protocol {
            Protocol::Id => {
                let (id, rest) = decode_varint(raw)?;
                if !rest.is_empty() {
                    return Err(AddressFormatError::InvalidId(format!(
                        "{} trailing bytes after ID",
                        rest.len()
                    )));
                }
                Self::Id(id)
            }
            Protocol::Secp256k1 => Self::Secp256k1(fixed(protocol, raw)?),
            Protocol::Actor => Self::Actor(fixed(protocol, raw)?),
            Protocol::Bls => Self::Bls(fixed(protocol, raw)?),
            Protocol::Delegated => {
                let (namespace, subaddress) = decode_varint(raw)?;
                Self::Delegated(DelegatedAddress::new(namespace, subaddress)?)
            }
        })
    }

    pub fn to_raw(&self) -> Vec<u8> {
        //! Binary payload (without the protocol byte).
        match self {
            Self::Id(id) => {
                let mut out = vec![];
                encode_varint(*id, &mut out);
                out
            }
            Self::Secp256k1(hash) | Self::Actor(hash) => hash.to_vec(),
            Self::Bls(key) => key.to_vec(),
            Self::Delegated(delegated) => {
                let mut out = vec![];
                encode_varint(delegated.namespace, &mut out);
                out.extend_from_slice(&delegated.subaddress);
                out
            }
        }
    }
}

/// Filecoin address.
///
/// Equality and hashing only consider the on-chain identity (protocol and
/// payload): the network prefix is not part of the binary form, so an address
/// read back from a message compares equal to the one that was written.
#[derive(Clone, Debug)]
pub struct Address {
    network: Network,
    payload: Payload,
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}
impl Eq for Address {}
impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.hash(state)
    }
}

impl Address {
    pub const fn new(network: Network, payload: Payload) -> Self {
        //! Create an address from an already validated payload.
        Self { network, payload }
    }

    pub const fn new_id(network: Network, id: u64) -> Self {
        //! Create an ID address.
        Self::new(network, Payload::Id(id))
    }

    pub fn new_secp256k1(network: Network, public_key: &[u8]) -> Result<Self, AddressFormatError> {
        //! Derive an address from a 65-byte uncompressed SECP256K1 public key.
        if public_key.len() != SECP_PUB_LEN {
            return Err(AddressFormatError::InvalidPublicKey(format!(
                "expected {SECP_PUB_LEN} bytes, got {}",
                public_key.len()
            )));
        }
        if public_key[0] != 0x04 {
            return Err(AddressFormatError::InvalidPublicKey(
                "uncompressed key must start with 0x04".to_string(),
            ));
        }
        Ok(Self::new(
            network,
            Payload::Secp256k1(blake2b_160(&[public_key])),
        ))
    }

    pub fn new_actor(network: Network, data: &[u8]) -> Self {
        //! Create an actor address from actor creation data.
        Self::new(network, Payload::Actor(blake2b_160(&[data])))
    }

    pub fn new_bls(network: Network, public_key: &[u8]) -> Result<Self, AddressFormatError> {
        //! Create a BLS address from a 48-byte public key.
        Ok(Self::new(
            network,
            Payload::Bls(fixed(Protocol::Bls, public_key)?),
        ))
    }

    pub fn new_delegated(
        network: Network,
        namespace: u64,
        subaddress: &[u8],
    ) -> Result<Self, AddressFormatError> {
        //! Create a delegated address.
        Ok(Self::new(
            network,
            Payload::Delegated(DelegatedAddress::new(namespace, subaddress)?),
        ))
    }

    pub fn from_bytes(network: Network, bytes: &[u8]) -> Result<Self, AddressFormatError> {
        //! Parse the binary form (`protocol ‖ payload`).
        //!
        //! The binary form has no network information, so it must be supplied.
        let (&byte, raw) = bytes.split_first().ok_or(AddressFormatError::TooShort)?;
        let protocol = Protocol::from_byte(byte)
            .ok_or_else(|| AddressFormatError::UnknownProtocol(byte.to_string()))?;
        Ok(Self::new(network, Payload::from_raw(protocol, raw)?))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        //! Binary form (`protocol ‖ payload`).
        let mut out = vec![self.protocol() as u8];
        out.extend(self.payload.to_raw());
        out
    }

    /// Network this address is rendered for.
    pub const fn network(&self) -> Network {
        self.network
    }
    /// Address protocol.
    pub const fn protocol(&self) -> Protocol {
        self.payload.protocol()
    }
    /// Address payload.
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn with_network(self, network: Network) -> Self {
        //! Same address, rendered for another network.
        Self { network, ..self }
    }

    pub fn id(&self) -> Option<u64> {
        //! Actor ID, if this is an ID address.
        match self.payload {
            Payload::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn checksum(&self) -> Option<[u8; CHECKSUM_LEN]> {
        //! Checksum appended to the textual form. ID addresses have none.
        match self.payload {
            Payload::Id(_) => None,
            _ => Some(blake2b_checksum(&[self.to_bytes()])),
        }
    }
}

fn base32_encode(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes).to_ascii_lowercase()
}

fn base32_decode(text: &str) -> Result<Vec<u8>, AddressFormatError> {
    if text.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(AddressFormatError::InvalidEncoding(
            "uppercase characters are not allowed".to_string(),
        ));
    }
    BASE32_NOPAD
        .decode(text.to_ascii_uppercase().as_bytes())
        .map_err(|e| AddressFormatError::InvalidEncoding(e.to_string()))
}

fn parse_decimal(text: &str) -> Result<u64, AddressFormatError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressFormatError::InvalidId(text.to_string()));
    }
    text.parse()
        .map_err(|_| AddressFormatError::InvalidId(text.to_string()))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.network.prefix();
        let checksum = match self.checksum() {
            Some(checksum) => checksum,
            None => return write!(f, "{prefix}0{}", self.id().unwrap_or_default()),
        };
        match &self.payload {
            Payload::Delegated(delegated) => {
                let body = [delegated.subaddress(), &checksum[..]].concat();
                write!(
                    f,
                    "{prefix}4{}f{}",
                    delegated.namespace(),
                    base32_encode(&body)
                )
            }
            payload => {
                let body = [payload.to_raw(), checksum.to_vec()].concat();
                write!(
                    f,
                    "{prefix}{}{}",
                    payload.protocol() as u8,
                    base32_encode(&body)
                )
            }
        }
    }
}

impl FromStr for Address {
    type Err = AddressFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let network_char = chars.next().ok_or(AddressFormatError::TooShort)?;
        let network = Network::from_prefix(network_char)
            .ok_or(AddressFormatError::UnknownNetwork(network_char))?;
        let protocol_char = chars.next().ok_or(AddressFormatError::TooShort)?;
        let protocol = protocol_char
            .to_digit(10)
            .and_then(|d| Protocol::from_byte(d as u8))
            .ok_or_else(|| AddressFormatError::UnknownProtocol(protocol_char.to_string()))?;
        // Both leading characters are ASCII at this point.
        let raw = &s[2..];
        if raw.is_empty() {
            return Err(AddressFormatError::TooShort);
        }

        let (payload, checksum) = match protocol {
            Protocol::Id => return Ok(Self::new_id(network, parse_decimal(raw)?)),
            Protocol::Delegated => {
                let (namespace, encoded) = raw.split_once('f').ok_or_else(|| {
                    AddressFormatError::InvalidEncoding("missing namespace separator".to_string())
                })?;
                let namespace = parse_decimal(namespace)?;
                let body = base32_decode(encoded)?;
                if body.len() < CHECKSUM_LEN {
                    return Err(AddressFormatError::TooShort);
                }
                let (subaddress, checksum) = body.split_at(body.len() - CHECKSUM_LEN);
                (
                    Payload::Delegated(DelegatedAddress::new(namespace, subaddress)?),
                    checksum.to_vec(),
                )
            }
            protocol => {
                let body = base32_decode(raw)?;
                if body.len() < CHECKSUM_LEN {
                    return Err(AddressFormatError::TooShort);
                }
                let (payload, checksum) = body.split_at(body.len() - CHECKSUM_LEN);
                (Payload::from_raw(protocol, payload)?, checksum.to_vec())
            }
        };

        let address = Self::new(network, payload);
        match address.checksum() {
            Some(expected) if expected[..] == checksum[..] => Ok(address),
            _ => Err(AddressFormatError::InvalidChecksum),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            BytesSer(&self.to_bytes()).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(de::Error::custom)
        } else {
            let BytesDe(bytes) = BytesDe::deserialize(deserializer)?;
            Self::from_bytes(Network::default(), &bytes).map_err(de::Error::custom)
        }
    }
}

/// A trait for objects that can generate an on-chain address.
pub trait AddressConvertible {
    /// Create an address for the given network
    fn address(&self, network: Network) -> Address;
}

impl AddressConvertible for secp256k1::PublicKey {
    fn address(&self, network: Network) -> Address {
        //! Generate a SECP256K1 address from public key.
        //!
        //! The payload is always derived from the uncompressed form.
        Address::new(
            network,
            Payload::Secp256k1(blake2b_160(&[self.serialize_uncompressed()])),
        )
    }
}
