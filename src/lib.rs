#![doc(html_root_url = "https://docs.rs/filecoin-construction/0.1.0-beta.1")]
#![warn(rust_2018_idioms, missing_docs)]
#![deny(dead_code, unused_imports, unused_mut)]

//! Rust library to build Filecoin transactions offline: address derivation,
//! canonical message encoding, multisig calls, signing, verification and
//! transaction hashes.
//!
//! This library acts primary as a proxy to several underlying libraries
//! (`secp256k1`, `blake2`, `fvm_ipld_encoding`, `cid`), with the addition of
//! Filecoin-specific components. It never talks to a node: nonces, gas
//! parameters and broadcasting are up to the caller.
//!
//! ## Usage
//!
//! The entry point is [`ConstructionClient`], bound to a single network.
//!
//! Let's transfer some attoFIL to another account. To do so, we need to
//! create a transaction, sign it and compute its hash (CID) to track it.
//!
//! ```rust
//! use filecoin_construction::construction::{PaymentRequest, TxMetadata};
//! use filecoin_construction::{ConstructionClient, Network, TokenAmount};
//! use rustc_hex::FromHex;
//!
//! let client = ConstructionClient::new(Network::Testnet);
//! let request = PaymentRequest {
//!     from: "t1d2xrzcslx7xlbbylc5c3d5lvandqw4iwl6epxba".to_string(),
//!     to: "t17uoq6tp427uzv7fztkbsnn64iwotfrristwpryy".to_string(),
//!     quantity: 100_000,
//!     metadata: TxMetadata::new(1, TokenAmount::from(1), TokenAmount::from(1), 25_000),
//! };
//! let unsigned = client.construct_payment(&request).expect("Must be valid");
//!
//! let private_key: Vec<u8> = "f15716d3b003b304b8055d9cc62e6b9c869d56cc930c3858d4d7c31f5f53f14a"
//!     .from_hex()
//!     .expect("Must be valid hex");
//! let signed = client.sign_tx(&unsigned, &private_key).expect("Must sign");
//! assert_eq!(
//!     client.verify_tx(&signed).expect("Must verify").to_string(),
//!     request.from
//! );
//! println!("{}", client.hash(&signed).expect("Must hash"));
//! ```
//!
//! ## Lower level
//!
//! Every building block is public: [`Address`] codec, [`Message`] and
//! [`SignedMessage`] with their canonical encoding, [`multisig`] parameters
//! and [`signature`] primitives working on raw digests.
//!
//! ## License
//!
//! This project is licensed under the Apache License, Version 2.0.

pub mod address;
pub use address::{Address, AddressConvertible, AddressFormatError, PrivateKey, PublicKey};
pub mod amount;
pub use amount::TokenAmount;
pub mod cbor;
pub mod construction;
pub use construction::ConstructionClient;
pub mod hash;
pub use hash::Cid;
pub mod message;
pub use message::{Message, SignedMessage};
pub mod multisig;
pub mod network;
pub use network::Network;
pub mod signature;
pub use signature::Signature;
mod utils;
pub use ethereum_types::U256;
pub use utils::{blake2b_160, blake2b_256};
