//! Wire types exchanged with the settlement gateway.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::types::{AmountValue, AnyJson, X402Version};

/// Request header carrying the base64 signed authorization.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the base64 settlement receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";

/// One accepted payment method from a 402 challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    /// Authorization scheme name, e.g. `exact`
    pub scheme: String,
    /// Network identifier, e.g. `arbitrum` or `eip155:42161`
    pub network: String,
    /// Ceiling for the authorized amount, in atomic units
    pub max_amount_required: AmountValue,
    /// Recipient address
    pub pay_to: String,
    /// Token contract address
    pub asset: String,
    /// Upper bound for the authorization validity window
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Opaque gateway metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<AnyJson>,
}

/// Status code field of a gateway reply.
///
/// Some gateway endpoints send it as a JSON string and some as a number; both
/// are normalized to the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GatewayCode(pub String);

impl GatewayCode {
    /// Code of a 402 challenge body.
    pub const PAYMENT_REQUIRED: &'static str = "402";
    /// Code of a successful call or settlement.
    pub const SUCCESS: &'static str = "0";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == Self::SUCCESS
    }

    pub fn is_payment_required(&self) -> bool {
        self.0 == Self::PAYMENT_REQUIRED
    }
}

impl Display for GatewayCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for GatewayCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => GatewayCode(s.trim().to_string()),
            Raw::Number(n) => GatewayCode(n.to_string()),
        })
    }
}

/// Body of the first, unpaid request to the x402 endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub code: GatewayCode,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub accepts: Vec<PaymentOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<X402Version>,
}

/// Generic `{code, msg, data}` reply envelope used by every gateway endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayReply<T = AnyJson> {
    pub code: GatewayCode,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> GatewayReply<T> {
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Signed payment sent in the `X-PAYMENT` header.
///
/// `P` is the scheme-specific payload; it defaults to raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<P = AnyJson> {
    pub x402_version: X402Version,
    pub scheme: String,
    pub network: String,
    pub payload: P,
}

/// Settlement receipt echoed in the `X-Payment-Response` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(default)]
    pub transaction: String,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}
