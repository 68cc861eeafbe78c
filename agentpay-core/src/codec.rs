//! Base64 codec for the `X-PAYMENT` and `X-Payment-Response` headers.
//!
//! The header value is the standard base64 of the payload's JSON form. Decoding
//! goes through JSON parsing, so field order in the encoded form is irrelevant.

use std::fmt::Display;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{Error, Result};

/// A base64-encoded x402 header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base64EncodedHeader(pub String);

impl Base64EncodedHeader {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode `value` as base64 of its JSON serialization.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value)?;
        Ok(Base64EncodedHeader(BASE64_STANDARD.encode(json)))
    }

    /// Decode the header back into `T`.
    ///
    /// Fails with [`Error::MalformedHeader`] on invalid base64, non UTF-8
    /// content, or JSON that does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = BASE64_STANDARD
            .decode(self.0.trim())
            .map_err(|err| Error::MalformedHeader(format!("invalid base64: {err}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|err| Error::MalformedHeader(format!("invalid UTF-8: {err}")))?;
        serde_json::from_str(&json)
            .map_err(|err| Error::MalformedHeader(format!("unexpected payload shape: {err}")))
    }
}

impl From<String> for Base64EncodedHeader {
    fn from(value: String) -> Self {
        Base64EncodedHeader(value)
    }
}

impl From<&str> for Base64EncodedHeader {
    fn from(value: &str) -> Self {
        Base64EncodedHeader(value.to_string())
    }
}

impl Serialize for Base64EncodedHeader {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64EncodedHeader {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Base64EncodedHeader)
    }
}

impl Display for Base64EncodedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Base64EncodedHeader> {
    Base64EncodedHeader::encode(value)
}

pub fn decode<T: DeserializeOwned>(header: &str) -> Result<T> {
    Base64EncodedHeader::from(header).decode()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        transport::{PaymentPayload, SettlementResponse},
        types::{AnyJson, X402Version},
    };

    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let payload = PaymentPayload {
            x402_version: X402Version::V1,
            scheme: "exact".to_string(),
            network: "arbitrum".to_string(),
            payload: json!({
                "signature": "0xdeadbeef",
                "authorization": {
                    "from": "0x1111111111111111111111111111111111111111",
                    "to": "0x2222222222222222222222222222222222222222",
                    "value": "550000",
                    "validAfter": "1700000000",
                    "validBefore": "1700000060",
                    "nonce": "0x00",
                }
            }),
        };

        let header = encode(&payload).unwrap();
        let decoded: PaymentPayload<AnyJson> = header.decode().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_field_order_is_irrelevant() {
        let reordered = BASE64_STANDARD
            .encode(r#"{"transaction":"0xabc","network":"arbitrum","success":true}"#);
        let receipt: SettlementResponse = decode(&reordered).unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.transaction, "0xabc");
        assert_eq!(receipt.network, "arbitrum");
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let err = decode::<SettlementResponse>("not base64 at all!").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[test]
    fn test_missing_required_fields_is_malformed() {
        let header = encode(&json!({"transaction": "0xabc"})).unwrap();
        let err = header.decode::<SettlementResponse>().unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));

        let header = encode(&json!({"scheme": "exact"})).unwrap();
        assert!(header.decode::<PaymentPayload<AnyJson>>().is_err());
    }
}
