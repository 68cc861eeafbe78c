//! Canonical request signing for direct (non-402) gateway API calls.
//!
//! The gateway recomputes the signature on its side, so the procedure has to
//! be reproduced byte for byte:
//!
//! 1. Drop the `sign` field and every gateway-declared excluded field.
//! 2. Flatten each object-valued field one level: its children become
//!    top-level fields and the parent name is discarded.
//! 3. Drop fields whose value is `null` or an empty string.
//! 4. Render every value as a string and trim it.
//! 5. Sort field names by byte order.
//! 6. Join as `name=value` pairs with `&` and append `&key=<secret>`.
//! 7. SHA-512 the UTF-8 bytes and render the digest as uppercase hex.
//!
//! ```
//! use agentpay_core::canonical::CanonicalSigner;
//! use serde_json::json;
//!
//! let fields = json!({"merchantOrderNo": "ORD1", "appId": "TEST000001"});
//! let fields = fields.as_object().unwrap();
//!
//! let signer = CanonicalSigner::default();
//! assert_eq!(
//!     signer.canonical_string(fields, "9999"),
//!     "appId=TEST000001&merchantOrderNo=ORD1&key=9999"
//! );
//! assert_eq!(signer.sign(fields, "9999").as_str().len(), 128);
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Display},
    str::FromStr,
};

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::errors::{Error, Result};

/// Name of the field that carries the signature itself. Never signed.
pub const SIGNATURE_FIELD: &str = "sign";

/// Name under which the shared secret is appended to the pre-hash string.
pub const SECRET_FIELD: &str = "key";

/// A gateway API call before signing: field name to scalar or nested object.
pub type SignableRequest = Map<String, Value>;

/// Uppercase hex SHA-512 digest of a canonical request string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CanonicalSignature(String);

impl CanonicalSignature {
    /// Length of the hex rendering of a SHA-512 digest.
    pub const HEX_LEN: usize = 128;

    fn digest(canonical: &str) -> Self {
        CanonicalSignature(hex::encode_upper(Sha512::digest(canonical.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for CanonicalSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::MalformedInput(format!(
                "signature must be {} hex characters",
                Self::HEX_LEN
            )));
        }
        Ok(CanonicalSignature(s.to_ascii_uppercase()))
    }
}

impl Display for CanonicalSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for CanonicalSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalSignature({})", self.0)
    }
}

impl Serialize for CanonicalSignature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CanonicalSignature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical request signer.
///
/// `excluded_fields` holds the gateway-declared non-signed fields on top of
/// [`SIGNATURE_FIELD`], which is always excluded.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalSigner {
    #[builder(default, with = |fields: impl IntoIterator<Item: Into<String>>| {
        fields.into_iter().map(Into::<String>::into).collect()
    })]
    pub excluded_fields: BTreeSet<String>,
}

impl CanonicalSigner {
    /// Whether `name` is left out of the signature wherever it appears.
    pub fn is_excluded(&self, name: &str) -> bool {
        name == SIGNATURE_FIELD || self.excluded_fields.contains(name)
    }

    /// The sorted `name -> value` pairs that end up in the pre-hash string.
    ///
    /// Top-level scalar fields are placed first. Children of nested objects are
    /// then added in parent-name order and never replace a name that is already
    /// present, so the result does not depend on the input's key order.
    pub fn canonical_fields(&self, fields: &SignableRequest) -> BTreeMap<String, String> {
        let mut canonical = BTreeMap::new();
        let mut nested = BTreeMap::new();

        for (name, value) in fields {
            if self.is_excluded(name) {
                continue;
            }
            match value {
                Value::Object(children) => {
                    nested.insert(name.as_str(), children);
                }
                scalar => {
                    if let Some(text) = render(scalar) {
                        canonical.insert(name.clone(), text);
                    }
                }
            }
        }

        for children in nested.into_values() {
            for (name, value) in children {
                if self.is_excluded(name) || canonical.contains_key(name) {
                    continue;
                }
                if let Some(text) = render(value) {
                    canonical.insert(name.clone(), text);
                }
            }
        }

        canonical
    }

    /// The exact string that gets hashed: `a=1&b=2&key=<secret>`.
    pub fn canonical_string(&self, fields: &SignableRequest, secret: &str) -> String {
        let joined = self
            .canonical_fields(fields)
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{joined}&{SECRET_FIELD}={secret}")
    }

    pub fn sign(&self, fields: &SignableRequest, secret: &str) -> CanonicalSignature {
        CanonicalSignature::digest(&self.canonical_string(fields, secret))
    }

    /// Sign `fields` and return them with the `sign` field set.
    pub fn attach_signature(&self, mut fields: SignableRequest, secret: &str) -> SignableRequest {
        let signature = self.sign(&fields, secret);
        fields.insert(
            SIGNATURE_FIELD.to_string(),
            Value::String(signature.into_string()),
        );
        fields
    }

    /// Serialize a typed request into a [`SignableRequest`].
    pub fn to_signable<T: Serialize>(request: &T) -> Result<SignableRequest> {
        match serde_json::to_value(request)? {
            Value::Object(fields) => Ok(fields),
            other => Err(Error::MalformedInput(format!(
                "signable request must be a JSON object, got {other}"
            ))),
        }
    }

    /// Check the `sign` field of a message received from the gateway.
    ///
    /// The digests are compared in constant time.
    pub fn verify(&self, fields: &SignableRequest, secret: &str) -> bool {
        let Some(received) = fields
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<CanonicalSignature>().ok())
        else {
            return false;
        };
        let expected = self.sign(fields, secret);
        received
            .as_str()
            .as_bytes()
            .ct_eq(expected.as_str().as_bytes())
            .into()
    }
}

/// Sign with no gateway-declared exclusions beyond `sign` itself.
pub fn sign(fields: &SignableRequest, secret: &str) -> CanonicalSignature {
    CanonicalSigner::default().sign(fields, secret)
}

/// String form of a field value, or `None` when the field is dropped.
fn render(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    Some(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> SignableRequest {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_known_vector() {
        let request = fields(json!({"appId": "TEST000001", "merchantOrderNo": "ORD1"}));
        let signer = CanonicalSigner::default();

        assert_eq!(
            signer.canonical_string(&request, "9999"),
            "appId=TEST000001&merchantOrderNo=ORD1&key=9999"
        );
        assert_eq!(
            signer.sign(&request, "9999").as_str(),
            "DB9042820C58999F75EC2161751E6B631E41AFFCDC5FD373E56FD0FE0E5598523212C9FA5EACBAB6E2973186E3C1832F488011DF22C0B5D674D904E4DE2304A5"
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = fields(json!({
            "merchantOrderNo": "ORD1",
            "amount": 10,
            "appId": "TEST000001",
            "bankParam": {"bankName": "Y", "bankCode": "X"},
        }));
        let b = fields(json!({
            "bankParam": {"bankCode": "X", "bankName": "Y"},
            "appId": "TEST000001",
            "amount": 10,
            "merchantOrderNo": "ORD1",
        }));

        assert_eq!(sign(&a, "secret"), sign(&b, "secret"));
    }

    #[test]
    fn test_excluded_and_empty_fields_are_dropped() {
        let signer = CanonicalSigner::builder()
            .excluded_fields(["remark", "email"])
            .build();
        let request = fields(json!({
            "appId": "A1",
            "sign": "ABCDEF",
            "remark": "free text",
            "email": "ops@example.com",
            "note": "",
            "missing": null,
        }));

        let canonical = signer.canonical_string(&request, "s");
        assert_eq!(canonical, "appId=A1&key=s");
        for absent in ["sign=", "remark=", "email=", "note=", "missing="] {
            assert!(!canonical.contains(absent), "{absent} leaked into {canonical}");
        }
    }

    #[test]
    fn test_nested_object_is_flattened() {
        let request = fields(json!({"a": 1, "bankParam": {"bankCode": "X", "bankName": "Y"}}));
        let canonical = CanonicalSigner::default().canonical_string(&request, "k");

        assert_eq!(canonical, "a=1&bankCode=X&bankName=Y&key=k");
        assert!(!canonical.contains("bankParam="));
    }

    #[test]
    fn test_excluded_child_names_are_dropped() {
        let signer = CanonicalSigner::builder().excluded_fields(["remark"]).build();
        let request = fields(json!({"a": "1", "extra": {"remark": "hi", "b": "2"}}));

        assert_eq!(signer.canonical_string(&request, "k"), "a=1&b=2&key=k");
    }

    #[test]
    fn test_excluded_parent_drops_children() {
        let signer = CanonicalSigner::builder().excluded_fields(["contact"]).build();
        let request = fields(json!({"a": "1", "contact": {"phone": "555"}}));

        assert_eq!(signer.canonical_string(&request, "k"), "a=1&key=k");
    }

    #[test]
    fn test_top_level_field_wins_over_flattened_child() {
        let request = fields(json!({"z": {"a": "child"}, "a": "top"}));

        assert_eq!(
            CanonicalSigner::default().canonical_string(&request, "k"),
            "a=top&key=k"
        );
    }

    #[test]
    fn test_values_are_stringified_and_trimmed() {
        let request = fields(json!({
            "name": "  padded  ",
            "count": 42,
            "ratio": 1.5,
            "enabled": true,
            "disabled": false,
        }));

        assert_eq!(
            CanonicalSigner::default().canonical_string(&request, "k"),
            "count=42&disabled=false&enabled=true&name=padded&ratio=1.5&key=k"
        );
    }

    #[test]
    fn test_byte_order_sort() {
        let request = fields(json!({"b": "1", "B": "2", "a": "3", "_": "4"}));

        assert_eq!(
            CanonicalSigner::default().canonical_string(&request, "k"),
            "B=2&_=4&a=3&b=1&key=k"
        );
    }

    #[test]
    fn test_empty_request_still_appends_key() {
        let request = SignableRequest::new();

        assert_eq!(
            CanonicalSigner::default().canonical_string(&request, "9999"),
            "&key=9999"
        );
        assert_eq!(
            sign(&request, "9999").as_str(),
            "2124EB38E90389F2EA417B1BF58EBB6CA5B67446CE6C00EC40561B743FE4668B1941995A3E2CDD10FE28EB51D356653F9A913E6FD2C3D7CE966DB0590699EA33"
        );
    }

    #[test]
    fn test_attach_and_verify() {
        let signer = CanonicalSigner::default();
        let request = fields(json!({"appId": "TEST000001", "merchantOrderNo": "ORD1"}));

        let signed = signer.attach_signature(request, "9999");
        assert!(signer.verify(&signed, "9999"));
        assert!(!signer.verify(&signed, "0000"));

        let mut tampered = signed.clone();
        tampered.insert("merchantOrderNo".into(), json!("ORD2"));
        assert!(!signer.verify(&tampered, "9999"));
    }

    #[test]
    fn test_verify_rejects_single_digit_change() {
        let signer = CanonicalSigner::default();
        let request = fields(json!({"appId": "TEST000001", "merchantOrderNo": "ORD1"}));
        let signature = signer.sign(&request, "9999").into_string();

        let last = signature.as_bytes()[CanonicalSignature::HEX_LEN - 1];
        let flipped = if last == b'0' { '1' } else { '0' };
        let mut forged = signature[..CanonicalSignature::HEX_LEN - 1].to_string();
        forged.push(flipped);

        let mut signed = request.clone();
        signed.insert(SIGNATURE_FIELD.into(), Value::String(forged));
        assert!(!signer.verify(&signed, "9999"));

        signed.insert(SIGNATURE_FIELD.into(), Value::String(signature));
        assert!(signer.verify(&signed, "9999"));
    }

    #[test]
    fn test_verify_accepts_lowercase_signature() {
        let signer = CanonicalSigner::default();
        let mut request = fields(json!({"appId": "A"}));
        let lower = signer.sign(&request, "s").as_str().to_ascii_lowercase();
        request.insert(SIGNATURE_FIELD.into(), Value::String(lower));

        assert!(signer.verify(&request, "s"));
    }

    #[test]
    fn test_to_signable_rejects_non_objects() {
        assert!(CanonicalSigner::to_signable(&vec![1, 2]).is_err());
        assert!(CanonicalSigner::to_signable(&json!({"a": 1})).is_ok());
    }
}
