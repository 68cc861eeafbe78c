use serde::{Deserialize, Serialize};

use crate::{
    core::{Scheme, SchemePayload},
    networks::evm::{EvmAddress, EvmSignature},
    types::AmountValue,
};

use std::{
    fmt::{Debug, Display},
    str::FromStr,
    time::{SystemTime, SystemTimeError},
};

/// Scheme name of EIP-3009 transfer-with-authorization payments.
pub const EXACT_SCHEME: &str = "exact";

/// A 32-byte EIP-3009 authorization nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; 32]);

impl Nonce {
    /// Draw a fresh nonce from the thread-local CSPRNG.
    pub fn random() -> Self {
        Nonce(rand::random())
    }
}

impl Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce(0x{})", hex::encode(self.0))
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Nonce {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Nonce(arr))
    }
}

impl Serialize for Nonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Nonce::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Unix time in seconds. Travels as a decimal string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampSeconds(pub u64);

impl TimestampSeconds {
    pub fn now() -> Result<Self, SystemTimeError> {
        let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
        Ok(TimestampSeconds(now.as_secs()))
    }

    pub fn saturating_add(self, seconds: u64) -> Self {
        TimestampSeconds(self.0.saturating_add(seconds))
    }
}

impl Display for TimestampSeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for TimestampSeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimestampSeconds({})", self.0)
    }
}

impl Serialize for TimestampSeconds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimestampSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let seconds = s.trim().parse::<u64>().map_err(serde::de::Error::custom)?;
        Ok(TimestampSeconds(seconds))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: EvmSignature,
    pub authorization: ExactEvmAuthorization,
}

/// The signed EIP-3009 transfer terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: AmountValue,
    pub valid_after: TimestampSeconds,
    pub valid_before: TimestampSeconds,
    pub nonce: Nonce,
}

impl ExactEvmAuthorization {
    /// Whether `valid_after <= now <= valid_before`.
    pub fn is_valid_at(&self, now: TimestampSeconds) -> bool {
        self.valid_after <= now && now <= self.valid_before
    }
}

/// The value carried in the `X-PAYMENT` header for the exact EVM scheme.
pub type SignedAuthorizationPayload = SchemePayload<ExactEvmScheme>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEvmScheme;

impl Scheme for ExactEvmScheme {
    type Payload = ExactEvmPayload;
    const SCHEME_NAME: &'static str = EXACT_SCHEME;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_hex_forms() {
        let nonce = Nonce([0xab; 32]);
        let text = nonce.to_string();

        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 66);
        assert_eq!(text.parse::<Nonce>().unwrap(), nonce);
        assert_eq!(text.trim_start_matches("0x").parse::<Nonce>().unwrap(), nonce);
        assert!("0xabcd".parse::<Nonce>().is_err());
    }

    #[test]
    fn test_random_nonces_differ() {
        assert_ne!(Nonce::random(), Nonce::random());
    }

    #[test]
    fn test_timestamps_are_strings_on_the_wire() {
        let ts = TimestampSeconds(1_700_000_060);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1700000060\"");
        let back: TimestampSeconds = serde_json::from_str("\"1700000060\"").unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_validity_window_bounds_are_inclusive() {
        let authorization = ExactEvmAuthorization {
            from: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            to: "0x2222222222222222222222222222222222222222".parse().unwrap(),
            value: AmountValue(1),
            valid_after: TimestampSeconds(100),
            valid_before: TimestampSeconds(160),
            nonce: Nonce([0; 32]),
        };

        assert!(!authorization.is_valid_at(TimestampSeconds(99)));
        assert!(authorization.is_valid_at(TimestampSeconds(100)));
        assert!(authorization.is_valid_at(TimestampSeconds(160)));
        assert!(!authorization.is_valid_at(TimestampSeconds(161)));
    }
}
