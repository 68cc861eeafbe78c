use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// An EVM chain the gateway can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmNetwork {
    /// Gateway network name, e.g. `arbitrum`
    pub name: &'static str,
    pub chain_id: u64,
    /// CAIP-2 identifier, e.g. `eip155:42161`
    pub network_id: &'static str,
}

impl EvmNetwork {
    /// Look a network up by gateway name or CAIP-2 id.
    ///
    /// Names are matched case-insensitively.
    pub fn resolve(identifier: &str) -> Option<EvmNetwork> {
        let identifier = identifier.trim();
        networks::ALL
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(identifier) || n.network_id == identifier)
            .copied()
    }
}

impl Display for EvmNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmAddress(pub alloy_primitives::Address);

impl From<alloy_primitives::Address> for EvmAddress {
    fn from(addr: alloy_primitives::Address) -> Self {
        EvmAddress(addr)
    }
}

impl FromStr for EvmAddress {
    type Err = alloy_primitives::AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = alloy_primitives::Address::from_str(s.trim())?;
        Ok(EvmAddress(addr))
    }
}

impl Display for EvmAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for EvmAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EvmAddress({})", self.0)
    }
}

impl Serialize for EvmAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EvmAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A 65-byte ECDSA signature, `0x`-hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmSignature(pub alloy_primitives::Signature);

impl Display for EvmSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for EvmSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EvmSignature({})", self.0)
    }
}

impl FromStr for EvmSignature {
    type Err = alloy_primitives::SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sig = alloy_primitives::Signature::from_str(s.trim())?;
        Ok(EvmSignature(sig))
    }
}

impl Serialize for EvmSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EvmSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EvmSignature::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<alloy_primitives::Signature> for EvmSignature {
    fn from(sig: alloy_primitives::Signature) -> Self {
        EvmSignature(sig)
    }
}

/// A network known at compile time.
pub trait ExplicitEvmNetwork {
    const NETWORK: EvmNetwork;
}

impl<T> From<T> for EvmNetwork
where
    T: ExplicitEvmNetwork,
{
    fn from(_: T) -> Self {
        T::NETWORK
    }
}

pub mod networks {
    use super::*;

    macro_rules! define_explicit_evm_network {
        ($struct_name:ident, $name:literal, $chain_id:literal) => {
            pub struct $struct_name;

            impl ExplicitEvmNetwork for $struct_name {
                const NETWORK: EvmNetwork = EvmNetwork {
                    name: $name,
                    chain_id: $chain_id,
                    network_id: concat!("eip155:", $chain_id),
                };
            }
        };
    }

    define_explicit_evm_network!(Ethereum, "ethereum", 1);
    define_explicit_evm_network!(EthereumSepolia, "ethereum-sepolia", 11155111);
    define_explicit_evm_network!(Arbitrum, "arbitrum", 42161);
    define_explicit_evm_network!(ArbitrumSepolia, "arbitrum-sepolia", 421614);
    define_explicit_evm_network!(Base, "base", 8453);
    define_explicit_evm_network!(BaseSepolia, "base-sepolia", 84532);
    define_explicit_evm_network!(Optimism, "optimism", 10);
    define_explicit_evm_network!(Polygon, "polygon", 137);
    define_explicit_evm_network!(Avalanche, "avalanche", 43114);

    /// Every network the authorization builder can resolve.
    pub const ALL: &[EvmNetwork] = &[
        Ethereum::NETWORK,
        EthereumSepolia::NETWORK,
        Arbitrum::NETWORK,
        ArbitrumSepolia::NETWORK,
        Base::NETWORK,
        BaseSepolia::NETWORK,
        Optimism::NETWORK,
        Polygon::NETWORK,
        Avalanche::NETWORK,
    ];
}
