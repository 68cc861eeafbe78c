//! Signed REST calls straight to the gateway.
//!
//! Every request is serialized to a JSON object, stamped with `appId`, signed
//! with the shared secret and POSTed with the signature in its `sign` field.

use std::fmt::Debug;

use bon::Builder;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    canonical::{CanonicalSigner, SignableRequest},
    http_transport::HttpTransport,
    transport::GatewayReply,
    types::AnyJson,
};

pub const PAYMENT_QUERY_PATH: &str = "/open/api/payment/query";
pub const TRANSFER_PAYMENT_PATH: &str = "/open/api/transfer/payment";
pub const BANK_CHECK_PATH: &str = "/open/api/bankCheck";

const APP_ID_FIELD: &str = "appId";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        status: http::StatusCode,
        body: String,
    },
    #[error("Gateway rejected the request (code {code}): {message}")]
    Rejected { code: String, message: String },
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Serialization/Deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl From<crate::errors::Error> for GatewayError {
    fn from(err: crate::errors::Error) -> Self {
        match err {
            crate::errors::Error::SerdeJsonError(err) => GatewayError::SerdeError(err),
            other => GatewayError::MalformedInput(other.to_string()),
        }
    }
}

#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    #[builder(into)]
    pub merchant_order_no: String,
}

/// Beneficiary bank account. Flattened into the parent when signing.
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankParam {
    #[builder(into)]
    pub bank_code: String,
    #[builder(into)]
    pub bank_name: String,
    #[builder(into)]
    pub account_no: String,
    #[builder(into)]
    pub account_name: String,
}

#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[builder(into)]
    pub merchant_order_no: String,
    /// Decimal fiat amount, e.g. `"100.00"`.
    #[builder(into)]
    pub amount: String,
    #[builder(into)]
    pub currency: String,
    pub bank_param: BankParam,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankCheckRequest {
    #[builder(into)]
    pub bank_code: String,
    #[builder(into)]
    pub account_no: String,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
}

/// Client for the gateway's signed REST API.
#[derive(Builder, Clone)]
pub struct GatewayClient<T> {
    pub transport: T,
    #[builder(into)]
    pub app_id: String,
    #[builder(into)]
    secret: String,
    #[builder(default)]
    pub signer: CanonicalSigner,
}

impl<T: Debug> Debug for GatewayClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("transport", &self.transport)
            .field("app_id", &self.app_id)
            .field("secret", &"[REDACTED]")
            .field("signer", &self.signer)
            .finish()
    }
}

#[cfg(feature = "http-client")]
impl GatewayClient<crate::http_transport::ReqwestTransport> {
    pub fn from_config(
        config: &crate::config::GatewayConfig,
    ) -> Result<Self, crate::config::ConfigError> {
        Ok(GatewayClient::builder()
            .transport(config.transport()?)
            .app_id(&config.app_id)
            .secret(&config.secret)
            .signer(config.canonical_signer())
            .build())
    }
}

impl<T> GatewayClient<T> {
    /// The JSON body that would be sent for `request`, `sign` included.
    pub fn signed_body<R: Serialize>(&self, request: &R) -> Result<SignableRequest, GatewayError> {
        let mut fields = CanonicalSigner::to_signable(request)?;
        if fields.is_empty() {
            return Err(GatewayError::MalformedInput(
                "refusing to sign a request without fields".to_string(),
            ));
        }
        fields.insert(APP_ID_FIELD.to_string(), AnyJson::from(self.app_id.as_str()));

        Ok(self.signer.attach_signature(fields, &self.secret))
    }

    /// Check the `sign` field of a notification pushed by the gateway.
    pub fn verify_callback(&self, notification: &SignableRequest) -> bool {
        self.signer.verify(notification, &self.secret)
    }
}

impl<T: HttpTransport> GatewayClient<T> {
    /// Sign and POST `request` to `path`. Any code other than `"0"` is an
    /// error carrying the gateway's message as-is.
    pub async fn call<R, D>(&self, path: &str, request: &R) -> Result<GatewayReply<D>, GatewayError>
    where
        R: Serialize,
        D: DeserializeOwned,
    {
        let body = AnyJson::Object(self.signed_body(request)?);

        let response = self
            .transport
            .post_json(path, &body)
            .await
            .map_err(|err| GatewayError::Transport(Box::new(err)))?;

        if !response.status.is_success() {
            return Err(GatewayError::HttpStatus {
                status: response.status,
                body: response.text(),
            });
        }

        let reply: GatewayReply<D> = response.json()?;
        if !reply.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Gateway rejected {path}: code='{}', msg='{}'",
                reply.code,
                reply.msg
            );

            return Err(GatewayError::Rejected {
                code: reply.code.to_string(),
                message: reply.msg,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Gateway call {path} succeeded");

        Ok(reply)
    }

    pub async fn query_payment(
        &self,
        merchant_order_no: impl Into<String>,
    ) -> Result<GatewayReply, GatewayError> {
        let request = PaymentStatusRequest::builder()
            .merchant_order_no(merchant_order_no)
            .build();
        self.call(PAYMENT_QUERY_PATH, &request).await
    }

    pub async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<GatewayReply, GatewayError> {
        self.call(TRANSFER_PAYMENT_PATH, request).await
    }

    pub async fn bank_check(&self, request: &BankCheckRequest) -> Result<GatewayReply, GatewayError> {
        self.call(BANK_CHECK_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{HeaderMap, StatusCode};
    use serde_json::json;

    use crate::{canonical::SIGNATURE_FIELD, http_transport::GatewayResponse};

    use super::*;

    /// Answers every POST with the same reply and records the bodies.
    #[derive(Debug)]
    struct ReplyTransport {
        status: StatusCode,
        reply: AnyJson,
        posted: Mutex<Vec<(String, AnyJson)>>,
    }

    impl ReplyTransport {
        fn new(status: StatusCode, reply: AnyJson) -> Self {
            ReplyTransport {
                status,
                reply,
                posted: Mutex::default(),
            }
        }

        fn last_body(&self) -> AnyJson {
            self.posted.lock().unwrap().last().unwrap().1.clone()
        }
    }

    impl HttpTransport for ReplyTransport {
        type Error = std::io::Error;

        async fn get(
            &self,
            _path: &str,
            _query: &[(&str, &str)],
            _headers: HeaderMap,
        ) -> Result<GatewayResponse, Self::Error> {
            unreachable!("the REST client only POSTs")
        }

        async fn post_json(&self, path: &str, body: &AnyJson) -> Result<GatewayResponse, Self::Error> {
            self.posted
                .lock()
                .unwrap()
                .push((path.to_string(), body.clone()));
            Ok(GatewayResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: serde_json::to_vec(&self.reply).unwrap(),
            })
        }
    }

    fn client(transport: ReplyTransport) -> GatewayClient<ReplyTransport> {
        GatewayClient::builder()
            .transport(transport)
            .app_id("TEST000001")
            .secret("9999")
            .build()
    }

    #[tokio::test]
    async fn test_query_payment_is_signed() {
        let client = client(ReplyTransport::new(
            StatusCode::OK,
            json!({"code": "0", "msg": "success", "data": {"status": "PAID"}}),
        ));

        let reply = client.query_payment("ORD1").await.unwrap();
        assert_eq!(reply.data, Some(json!({"status": "PAID"})));

        let posted = client.transport.posted.lock().unwrap().clone();
        assert_eq!(posted[0].0, PAYMENT_QUERY_PATH);

        let body = posted[0].1.as_object().unwrap();
        assert_eq!(body["appId"], "TEST000001");
        assert_eq!(body["merchantOrderNo"], "ORD1");
        // appId=TEST000001&merchantOrderNo=ORD1&key=9999
        assert_eq!(
            body[SIGNATURE_FIELD],
            "DB9042820C58999F75EC2161751E6B631E41AFFCDC5FD373E56FD0FE0E5598523212C9FA5EACBAB6E2973186E3C1832F488011DF22C0B5D674D904E4DE2304A5"
        );
    }

    #[tokio::test]
    async fn test_transfer_flattens_bank_param() {
        let client = client(ReplyTransport::new(StatusCode::OK, json!({"code": 0, "msg": "ok"})));
        let request = TransferRequest::builder()
            .merchant_order_no("ORD2")
            .amount("100.00")
            .currency("USD")
            .bank_param(
                BankParam::builder()
                    .bank_code("X")
                    .bank_name("Y")
                    .account_no("123")
                    .account_name("Jo")
                    .build(),
            )
            .build();

        client.create_transfer(&request).await.unwrap();

        let body = client.transport.last_body();
        let fields = body.as_object().unwrap();
        let canonical = client.signer.canonical_string(fields, "9999");
        assert!(canonical.contains("bankCode=X"));
        assert!(canonical.contains("bankName=Y"));
        assert!(!canonical.contains("bankParam="));
        assert!(client.verify_callback(fields));
    }

    #[tokio::test]
    async fn test_rejection_keeps_gateway_message() {
        let client = client(ReplyTransport::new(
            StatusCode::OK,
            json!({"code": "1001", "msg": "Signature verification failed"}),
        ));

        let err = client
            .bank_check(
                &BankCheckRequest::builder()
                    .bank_code("X")
                    .account_no("123")
                    .build(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Rejected { ref code, ref message }
                if code == "1001" && message == "Signature verification failed"
        ));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let client = client(ReplyTransport::new(StatusCode::BAD_GATEWAY, json!("down")));

        let err = client.query_payment("ORD1").await.unwrap_err();

        assert!(matches!(
            err,
            GatewayError::HttpStatus { status: StatusCode::BAD_GATEWAY, .. }
        ));
    }

    #[test]
    fn test_empty_request_is_refused() {
        #[derive(Serialize)]
        struct Empty {}

        let client = client(ReplyTransport::new(StatusCode::OK, json!({})));
        assert!(matches!(
            client.signed_body(&Empty {}),
            Err(GatewayError::MalformedInput(_))
        ));
        assert!(matches!(
            client.signed_body(&"not an object"),
            Err(GatewayError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_verify_callback_rejects_tampering() {
        let client = client(ReplyTransport::new(StatusCode::OK, json!({})));
        let mut notification = client
            .signed_body(&PaymentStatusRequest::builder().merchant_order_no("ORD1").build())
            .unwrap();
        assert!(client.verify_callback(&notification));

        notification.insert("merchantOrderNo".to_string(), json!("ORD9"));
        assert!(!client.verify_callback(&notification));

        let debug = format!("{client:?}");
        assert!(!debug.contains("9999"));
    }
}
