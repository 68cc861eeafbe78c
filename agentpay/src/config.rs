//! Gateway credentials and endpoints.
//!
//! Which environment is used is an explicit `sandbox` flag, never inferred
//! from the credentials themselves.

use std::fmt::Debug;

use bon::Builder;
use serde::Deserialize;
use url::Url;

use crate::{canonical::CanonicalSigner, client::DEFAULT_X402_RESOURCE_PATH};

pub const ENV_APP_ID: &str = "AGENTPAY_APP_ID";
pub const ENV_SECRET: &str = "AGENTPAY_SECRET";
pub const ENV_SANDBOX: &str = "AGENTPAY_SANDBOX";
pub const ENV_SANDBOX_URL: &str = "AGENTPAY_SANDBOX_URL";
pub const ENV_PRODUCTION_URL: &str = "AGENTPAY_PRODUCTION_URL";
pub const ENV_EXCLUDED_FIELDS: &str = "AGENTPAY_EXCLUDED_FIELDS";
pub const ENV_X402_RESOURCE_PATH: &str = "AGENTPAY_X402_RESOURCE_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
    #[error("No {environment} base URL configured")]
    MissingBaseUrl { environment: &'static str },
}

/// Gateway connection settings.
///
/// ```
/// use agentpay::config::GatewayConfig;
///
/// let config = GatewayConfig::builder()
///     .app_id("TEST000001")
///     .secret("9999")
///     .sandbox(true)
///     .sandbox_base_url("https://sandbox.gateway.test".parse().unwrap())
///     .build();
///
/// assert_eq!(config.base_url().unwrap().as_str(), "https://sandbox.gateway.test/");
/// assert!(!format!("{config:?}").contains("9999"));
/// ```
#[derive(Builder, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[builder(into)]
    pub app_id: String,
    /// Shared secret appended as `key=` when signing. Never logged.
    #[builder(into)]
    pub secret: String,
    #[builder(default)]
    #[serde(default)]
    pub sandbox: bool,
    pub sandbox_base_url: Option<Url>,
    pub production_base_url: Option<Url>,
    /// Gateway-declared fields that are sent but not signed.
    #[builder(default, with = |fields: impl IntoIterator<Item: Into<String>>| {
        fields.into_iter().map(Into::<String>::into).collect()
    })]
    #[serde(default)]
    pub excluded_fields: Vec<String>,
    #[builder(into, default = DEFAULT_X402_RESOURCE_PATH.to_string())]
    #[serde(default = "default_x402_resource_path")]
    pub x402_resource_path: String,
}

fn default_x402_resource_path() -> String {
    DEFAULT_X402_RESOURCE_PATH.to_string()
}

impl Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("app_id", &self.app_id)
            .field("secret", &"[REDACTED]")
            .field("sandbox", &self.sandbox)
            .field("sandbox_base_url", &self.sandbox_base_url)
            .field("production_base_url", &self.production_base_url)
            .field("excluded_fields", &self.excluded_fields)
            .field("x402_resource_path", &self.x402_resource_path)
            .finish()
    }
}

impl GatewayConfig {
    /// The base URL of the selected environment.
    pub fn base_url(&self) -> Result<&Url, ConfigError> {
        let (url, environment) = if self.sandbox {
            (self.sandbox_base_url.as_ref(), "sandbox")
        } else {
            (self.production_base_url.as_ref(), "production")
        };
        url.ok_or(ConfigError::MissingBaseUrl { environment })
    }

    pub fn canonical_signer(&self) -> CanonicalSigner {
        CanonicalSigner::builder()
            .excluded_fields(self.excluded_fields.iter().cloned())
            .build()
    }

    #[cfg(feature = "http-client")]
    pub fn transport(&self) -> Result<crate::http_transport::ReqwestTransport, ConfigError> {
        Ok(crate::http_transport::ReqwestTransport::new(
            self.base_url()?.clone(),
        ))
    }

    /// Read the configuration from `AGENTPAY_*` environment variables.
    ///
    /// ```bash
    /// export AGENTPAY_APP_ID=TEST000001
    /// export AGENTPAY_SECRET=...
    /// export AGENTPAY_SANDBOX=true
    /// export AGENTPAY_SANDBOX_URL=https://sandbox.gateway.test
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));
        let url = |name: &'static str| {
            lookup(name)
                .map(|raw| {
                    raw.parse::<Url>().map_err(|err| ConfigError::InvalidVar {
                        name,
                        reason: err.to_string(),
                    })
                })
                .transpose()
        };

        let sandbox = match lookup(ENV_SANDBOX) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidVar {
                name: ENV_SANDBOX,
                reason: format!("expected true or false, got {raw:?}"),
            })?,
            None => false,
        };

        let excluded_fields = lookup(ENV_EXCLUDED_FIELDS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = GatewayConfig {
            app_id: required(ENV_APP_ID)?,
            secret: required(ENV_SECRET)?,
            sandbox,
            sandbox_base_url: url(ENV_SANDBOX_URL)?,
            production_base_url: url(ENV_PRODUCTION_URL)?,
            excluded_fields,
            x402_resource_path: lookup(ENV_X402_RESOURCE_PATH)
                .unwrap_or_else(default_x402_resource_path),
        };

        config.base_url()?;
        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
