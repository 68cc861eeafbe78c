//! Miscellaneous common types used throughout agentpay.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Any JSON value, used for opaque gateway metadata.
pub type AnyJson = serde_json::Value;

/// The x402 protocol version carried in `x402Version`.
///
/// ```
/// use agentpay_core::types::X402Version;
///
/// let v: X402Version = serde_json::from_value(serde_json::json!(1)).unwrap();
/// assert_eq!(v, X402Version::V1);
/// assert_eq!(serde_json::to_value(v).unwrap(), serde_json::json!(1));
/// assert!(serde_json::from_value::<X402Version>(serde_json::json!(7)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum X402Version {
    /// `"x402Version": 1`, the version paired with the `X-PAYMENT` header.
    #[default]
    V1,
    /// `"x402Version": 2`.
    V2,
}

impl TryFrom<u8> for X402Version {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(X402Version::V1),
            2 => Ok(X402Version::V2),
            other => Err(format!(
                "Unsupported X402 version {}; expected 1 or 2",
                other
            )),
        }
    }
}

impl From<X402Version> for u8 {
    fn from(value: X402Version) -> Self {
        match value {
            X402Version::V1 => 1,
            X402Version::V2 => 2,
        }
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}
