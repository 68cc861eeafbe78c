use std::{borrow::Cow, time::SystemTimeError};

use alloy_core::{
    sol,
    sol_types::{Eip712Domain, SolStruct},
};
use alloy_primitives::{FixedBytes, U256};
use alloy_signer::{Error as AlloySignerError, Signer as AlloySigner};
use bon::Builder;

use crate::{
    core::{Scheme, SchemePayload},
    networks::evm::{EvmAddress, EvmNetwork, EvmSignature},
    schemes::exact_evm::*,
    transport::{PaymentOption, PaymentPayload},
    types::{AmountValue, X402Version},
};

/// EIP-712 domain name of the USDC token contracts.
pub const USDC_DOMAIN_NAME: &str = "USD Coin";

/// EIP-712 domain version of the USDC token contracts.
pub const USDC_DOMAIN_VERSION: &str = "2";

/// Upper bound applied to `maxTimeoutSeconds` when no other is configured.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

sol!(
    /// EIP-3009 `TransferWithAuthorization` message.
    ///
    /// The struct name is part of the EIP-712 type hash.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&ExactEvmAuthorization> for TransferWithAuthorization {
    fn from(authorization: &ExactEvmAuthorization) -> Self {
        TransferWithAuthorization {
            from: authorization.from.0,
            to: authorization.to.0,
            value: U256::from(authorization.value.0),
            validAfter: U256::from(authorization.valid_after.0),
            validBefore: U256::from(authorization.valid_before.0),
            nonce: FixedBytes(authorization.nonce.0),
        }
    }
}

/// The EIP-712 domain a USDC transfer authorization is bound to.
pub fn transfer_domain(network: EvmNetwork, asset: EvmAddress) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(USDC_DOMAIN_NAME)),
        Some(Cow::Borrowed(USDC_DOMAIN_VERSION)),
        Some(U256::from(network.chain_id)),
        Some(asset.0),
        None,
    )
}

/// Wallet capability that signs EIP-712 typed data.
///
/// This is the only place agentpay touches key material, and only through
/// this trait. Any [`alloy_signer::Signer`] implements it.
pub trait TypedDataSigner {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The address whose key produces the signatures.
    fn payer_address(&self) -> EvmAddress;

    fn sign_typed_data(
        &self,
        domain: &Eip712Domain,
        message: &TransferWithAuthorization,
    ) -> impl Future<Output = Result<EvmSignature, Self::Error>> + Send;
}

impl<S: AlloySigner + Sync> TypedDataSigner for S {
    type Error = AlloySignerError;

    fn payer_address(&self) -> EvmAddress {
        EvmAddress(AlloySigner::address(self))
    }

    async fn sign_typed_data(
        &self,
        domain: &Eip712Domain,
        message: &TransferWithAuthorization,
    ) -> Result<EvmSignature, Self::Error> {
        let eip712_hash = message.eip712_signing_hash(domain);
        let signature = self.sign_hash(&eip712_hash).await?;

        Ok(EvmSignature(signature))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("No wallet signer is configured for the payer")]
    SignerNotConfigured,
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Requested amount {requested} exceeds the accepted maximum {limit}")]
    AmountExceedsLimit {
        requested: AmountValue,
        limit: AmountValue,
    },
    #[error("Refusing to authorize a zero amount")]
    ZeroAmount,
    #[error("Invalid {field} address {value:?}: {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        source: alloy_primitives::AddressError,
    },
    #[error("Signer error: {0}")]
    Signer(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("System time error: {0}")]
    SystemTime(#[from] SystemTimeError),
}

/// Builds signed EIP-3009 authorizations for the options of a 402 challenge.
///
/// ```
/// use alloy::signers::local::PrivateKeySigner;
/// use agentpay::schemes::exact_evm_signer::ExactEvmAuthorizer;
///
/// let authorizer = ExactEvmAuthorizer::builder()
///     .signer(PrivateKeySigner::random())
///     .protocol_max_timeout_seconds(120)
///     .build();
/// assert_eq!(authorizer.protocol_max_timeout_seconds, 120);
/// ```
#[derive(Builder, Debug, Clone)]
pub struct ExactEvmAuthorizer<S> {
    /// The wallet capability. `None` while the agent has no wallet.
    pub signer: Option<S>,
    /// Payer address, defaults to the signer's own address.
    #[builder(into)]
    pub payer: Option<EvmAddress>,
    /// Cap on the validity window, whatever the option allows.
    #[builder(default = DEFAULT_MAX_TIMEOUT_SECONDS)]
    pub protocol_max_timeout_seconds: u64,
    #[builder(default)]
    pub allow_zero_amount: bool,
}

impl<S> ExactEvmAuthorizer<S> {
    pub fn new(signer: S) -> Self {
        ExactEvmAuthorizer::builder().signer(signer).build()
    }

    /// The amount to authorize: the override when given, else the option's
    /// maximum.
    pub fn authorized_amount(
        &self,
        option: &PaymentOption,
        amount_override: Option<AmountValue>,
    ) -> Result<AmountValue, AuthorizationError> {
        let limit = option.max_amount_required;
        let value = match amount_override {
            Some(requested) if requested > limit => {
                return Err(AuthorizationError::AmountExceedsLimit { requested, limit });
            }
            Some(requested) => requested,
            None => limit,
        };
        if value.is_zero() && !self.allow_zero_amount {
            return Err(AuthorizationError::ZeroAmount);
        }
        Ok(value)
    }
}

impl<S: TypedDataSigner> ExactEvmAuthorizer<S> {
    pub async fn authorize(
        &self,
        option: &PaymentOption,
        amount_override: Option<AmountValue>,
    ) -> Result<SchemePayload<ExactEvmScheme>, AuthorizationError> {
        let now = TimestampSeconds::now()?;
        self.authorize_at(option, amount_override, now).await
    }

    /// Same as [`Self::authorize`] with an explicit clock.
    pub async fn authorize_at(
        &self,
        option: &PaymentOption,
        amount_override: Option<AmountValue>,
        now: TimestampSeconds,
    ) -> Result<SchemePayload<ExactEvmScheme>, AuthorizationError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(AuthorizationError::SignerNotConfigured)?;

        if !ExactEvmScheme::accepts(option) {
            return Err(AuthorizationError::UnsupportedScheme(option.scheme.clone()));
        }

        let value = self.authorized_amount(option, amount_override)?;
        let network = EvmNetwork::resolve(&option.network)
            .ok_or_else(|| AuthorizationError::UnsupportedNetwork(option.network.clone()))?;
        let to = parse_address("payTo", &option.pay_to)?;
        let asset = parse_address("asset", &option.asset)?;
        let from = self.payer.unwrap_or_else(|| signer.payer_address());

        let timeout = option
            .max_timeout_seconds
            .min(self.protocol_max_timeout_seconds);

        let authorization = ExactEvmAuthorization {
            from,
            to,
            value,
            valid_after: now,
            valid_before: now.saturating_add(timeout),
            nonce: Nonce::random(),
        };

        let domain = transfer_domain(network, asset);
        let signature = signer
            .sign_typed_data(&domain, &TransferWithAuthorization::from(&authorization))
            .await
            .map_err(|err| AuthorizationError::Signer(Box::new(err)))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Signed transfer authorization: network='{}', value={}, validBefore={}",
            network.name,
            value,
            authorization.valid_before
        );

        Ok(PaymentPayload {
            x402_version: X402Version::V1,
            scheme: option.scheme.clone(),
            network: option.network.clone(),
            payload: ExactEvmPayload {
                signature,
                authorization,
            },
        })
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<EvmAddress, AuthorizationError> {
    value
        .parse()
        .map_err(|source| AuthorizationError::InvalidAddress {
            field,
            value: value.to_string(),
            source,
        })
}
