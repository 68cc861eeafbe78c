//! The HTTP seam between the payment flows and the gateway.
//!
//! Flows only speak [`HttpTransport`], so tests and embedders can swap in
//! their own client. [`ReqwestTransport`] is the default implementation.

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::types::AnyJson;

/// A fully buffered gateway response.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// The body as text, lossy for non-UTF-8 bytes.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// A header value, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

pub trait HttpTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// GET `path` relative to the gateway base URL.
    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
    ) -> impl Future<Output = Result<GatewayResponse, Self::Error>> + Send;

    /// POST a JSON body to `path` relative to the gateway base URL.
    fn post_json(
        &self,
        path: &str,
        body: &AnyJson,
    ) -> impl Future<Output = Result<GatewayResponse, Self::Error>> + Send;
}

#[cfg(feature = "http-client")]
pub use reqwest_transport::*;

#[cfg(feature = "http-client")]
mod reqwest_transport {
    use url::Url;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    pub enum TransportError {
        #[error("URL parse error: {0}")]
        UrlParseError(#[from] url::ParseError),
        #[error("HTTP request error: {0}")]
        HttpRequestError(#[from] reqwest::Error),
    }

    /// [`HttpTransport`] over a shared [`reqwest::Client`].
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        pub base_url: Url,
        pub client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(base_url: Url) -> Self {
            ReqwestTransport {
                base_url,
                client: reqwest::Client::new(),
            }
        }

        pub fn with_client(base_url: Url, client: reqwest::Client) -> Self {
            ReqwestTransport { base_url, client }
        }

        /// Resolve `path` under the base URL, keeping any base path prefix.
        pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
            let mut base = self.base_url.clone();
            if !base.path().ends_with('/') {
                let with_slash = format!("{}/", base.path());
                base.set_path(&with_slash);
            }
            Ok(base.join(path.trim_start_matches('/'))?)
        }

        async fn collect(response: reqwest::Response) -> Result<GatewayResponse, TransportError> {
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            Ok(GatewayResponse {
                status,
                headers,
                body,
            })
        }
    }

    impl HttpTransport for ReqwestTransport {
        type Error = TransportError;

        async fn get(
            &self,
            path: &str,
            query: &[(&str, &str)],
            headers: HeaderMap,
        ) -> Result<GatewayResponse, Self::Error> {
            let response = self
                .client
                .get(self.endpoint(path)?)
                .query(query)
                .headers(headers)
                .send()
                .await?;

            Self::collect(response).await
        }

        async fn post_json(
            &self,
            path: &str,
            body: &AnyJson,
        ) -> Result<GatewayResponse, Self::Error> {
            let response = self
                .client
                .post(self.endpoint(path)?)
                .json(body)
                .send()
                .await?;

            Self::collect(response).await
        }
    }

}
