//! Network selector.
//!
//! Filecoin addresses carry a one-letter prefix naming the network they
//! belong to. The binary form of an address does not, so every component that
//! renders addresses as text needs to be told which network it serves.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Network an address or a client is bound to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network, `f` prefix.
    #[default]
    Mainnet,
    /// Any test network, `t` prefix.
    Testnet,
}

impl Network {
    /// Prefix character used in textual addresses.
    pub const fn prefix(&self) -> char {
        match self {
            Self::Mainnet => 'f',
            Self::Testnet => 't',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        //! Resolve an address prefix character, if known.
        match prefix {
            'f' => Some(Self::Mainnet),
            't' => Some(Self::Testnet),
            _ => None,
        }
    }

    pub const fn from_testnet_flag(testnet: bool) -> Self {
        //! Map the boolean "is testnet" selector used by adapter layers.
        if testnet {
            Self::Testnet
        } else {
            Self::Mainnet
        }
    }
}

/// Unknown network name.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("Unknown network: {0:?}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "f" => Ok(Self::Mainnet),
            "testnet" | "test" | "t" => Ok(Self::Testnet),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        })
    }
}
