//! Multisig actor call parameters.
//!
//! A multisig wallet moves funds through `Propose`: the outer message goes to
//! the multisig actor and carries a [`ProposeParams`] describing the call the
//! multisig should make. Changing a signer is itself such a call, addressed
//! to the multisig with [`SwapSignerParams`] nested inside the proposal.
//!
//! Decoding is table-driven: [`ParamsDecoders`] maps a method number to the
//! function that understands its parameters, and new actor calls can be
//! registered without touching the parser. Their results are reported as
//! [`DecodedParams::Call`].

use crate::address::Address;
use crate::amount::TokenAmount;
use crate::cbor;
use crate::message::{MalformedMessageError, MethodNum};
use crate::network::Network;
use fvm_ipld_encoding::strict_bytes;
use fvm_ipld_encoding::tuple::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Method numbers used by this crate.
pub mod method {
    use crate::message::MethodNum;

    /// Plain value transfer.
    pub const SEND: MethodNum = 0;
    /// Multisig: propose a transaction.
    pub const PROPOSE: MethodNum = 2;
    /// Multisig: replace a signer.
    pub const SWAP_SIGNER: MethodNum = 7;
}

const PROPOSE_ARITY: u64 = 4;
const SWAP_SIGNER_ARITY: u64 = 2;

/// Parameters of the multisig `Propose` method.
#[derive(Clone, Debug, Eq, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct ProposeParams {
    /// Call recipient
    pub to: Address,
    /// Amount to send with the call
    pub value: TokenAmount,
    /// Method to invoke on the recipient
    pub method: MethodNum,
    /// Encoded parameters of that method
    #[serde(with = "strict_bytes")]
    pub params: Vec<u8>,
}

impl ProposeParams {
    pub fn transfer(to: Address, value: TokenAmount) -> Self {
        //! Proposal of a plain transfer.
        Self {
            to,
            value,
            method: method::SEND,
            params: vec![],
        }
    }

    pub fn swap_signer(
        multisig: Address,
        swap: &SwapSignerParams,
    ) -> Result<Self, MalformedMessageError> {
        //! Proposal for the multisig to call `SwapSigner` on itself.
        Ok(Self {
            to: multisig,
            value: TokenAmount::zero(),
            method: method::SWAP_SIGNER,
            params: swap.to_cbor()?,
        })
    }

    /// Canonical encoding.
    pub fn to_cbor(&self) -> Result<Vec<u8>, MalformedMessageError> {
        Ok(cbor::encode(self)?)
    }
    /// Strict decoding of the canonical encoding.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, MalformedMessageError> {
        Ok(cbor::decode_tuple(bytes, PROPOSE_ARITY)?)
    }
}

/// Parameters of the multisig `SwapSigner` method.
#[derive(Clone, Debug, Eq, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct SwapSignerParams {
    /// Signer being removed
    pub from: Address,
    /// Signer being added
    pub to: Address,
}

impl SwapSignerParams {
    /// Canonical encoding.
    pub fn to_cbor(&self) -> Result<Vec<u8>, MalformedMessageError> {
        Ok(cbor::encode(self)?)
    }
    /// Strict decoding of the canonical encoding.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, MalformedMessageError> {
        Ok(cbor::decode_tuple(bytes, SWAP_SIGNER_ARITY)?)
    }
}

/// Human-readable view of decoded call parameters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DecodedParams {
    /// Multisig proposal.
    Propose {
        /// Call recipient
        to: Address,
        /// Amount to send with the call
        value: TokenAmount,
        /// Method to invoke on the recipient
        method: MethodNum,
        /// Nested parameters, if present and understood
        params: Option<Box<DecodedParams>>,
    },
    /// Signer replacement.
    SwapSigner {
        /// Signer being removed
        from: Address,
        /// Signer being added
        to: Address,
    },
    /// Any other call, as produced by a registered decoder.
    Call {
        /// Invoked method
        method: MethodNum,
        /// Decoded fields
        fields: serde_json::Value,
    },
}

/// Deepest nesting level decoded by [`ParamsDecoders`].
///
/// Message params are level 0. Params nested deeper stay opaque.
pub const MAX_PARAMS_DEPTH: usize = 4;

/// Decoder of a single method's parameters.
///
/// Receives the whole table and the nesting level of `params`, so that nested
/// calls can be decoded with [`ParamsDecoders::decode_nested`].
pub type ParamsDecoder = fn(
    &ParamsDecoders,
    &[u8],
    Network,
    usize,
) -> Result<DecodedParams, MalformedMessageError>;

/// Lookup table from method number to its parameters decoder.
#[derive(Clone, Debug)]
pub struct ParamsDecoders {
    decoders: HashMap<MethodNum, ParamsDecoder>,
}

impl Default for ParamsDecoders {
    fn default() -> Self {
        //! Table with multisig `Propose` and `SwapSigner` decoders.
        Self::empty()
            .register(method::PROPOSE, decode_propose)
            .register(method::SWAP_SIGNER, decode_swap_signer)
    }
}

impl ParamsDecoders {
    /// Table without any decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    #[must_use]
    pub fn register(mut self, method: MethodNum, decoder: ParamsDecoder) -> Self {
        //! Add (or replace) a decoder for the given method.
        self.decoders.insert(method, decoder);
        self
    }

    /// Whether a decoder for the method is known.
    pub fn contains(&self, method: MethodNum) -> bool {
        self.decoders.contains_key(&method)
    }

    pub fn decode(
        &self,
        method: MethodNum,
        params: &[u8],
        network: Network,
    ) -> Option<DecodedParams> {
        //! Decode message parameters.
        //!
        //! Method numbers are only unique per actor, so params a known
        //! decoder rejects belong to another actor's method: they stay
        //! opaque, like empty params and params of unknown methods.
        self.decode_nested(method, params, network, 0)
    }

    pub fn decode_nested(
        &self,
        method: MethodNum,
        params: &[u8],
        network: Network,
        depth: usize,
    ) -> Option<DecodedParams> {
        //! Same as [`Self::decode`] for params at the given nesting level.
        //!
        //! Returns `None` past [`MAX_PARAMS_DEPTH`].
        if params.is_empty() || depth > MAX_PARAMS_DEPTH {
            return None;
        }
        let decoder = self.decoders.get(&method)?;
        match decoder(self, params, network, depth) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                trace!(method, depth, %error, "Params left opaque");
                None
            }
        }
    }
}

fn decode_propose(
    decoders: &ParamsDecoders,
    params: &[u8],
    network: Network,
    depth: usize,
) -> Result<DecodedParams, MalformedMessageError> {
    let propose = ProposeParams::from_cbor(params)?;
    let inner = decoders.decode_nested(propose.method, &propose.params, network, depth + 1);
    Ok(DecodedParams::Propose {
        to: propose.to.with_network(network),
        value: propose.value,
        method: propose.method,
        params: inner.map(Box::new),
    })
}

fn decode_swap_signer(
    _decoders: &ParamsDecoders,
    params: &[u8],
    network: Network,
    _depth: usize,
) -> Result<DecodedParams, MalformedMessageError> {
    let swap = SwapSignerParams::from_cbor(params)?;
    Ok(DecodedParams::SwapSigner {
        from: swap.from.with_network(network),
        to: swap.to.with_network(network),
    })
}
