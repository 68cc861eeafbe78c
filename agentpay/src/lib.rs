//! # agentpay
//!
//! agentpay lets an autonomous wallet agent pay through a fiat/crypto
//! settlement gateway. It speaks the two ways the gateway authorizes money
//! movement:
//!
//! - **Signed REST calls.** Server-to-gateway requests carry a SHA-512
//!   signature over their canonicalised fields and a shared secret.
//! - **x402 payments.** The gateway answers with HTTP 402 and a list of
//!   accepted payment options; the payer signs an EIP-3009
//!   `TransferWithAuthorization` over EIP-712 typed data and resubmits it in
//!   the `X-PAYMENT` header.
//!
//! agentpay never holds key material. Signing goes through the
//! [`schemes::exact_evm_signer::TypedDataSigner`] capability, which every
//! `alloy` signer already implements.
//!
//! ## Components
//!
//! ### Protocol types (re-exported from `agentpay-core`)
//!
//! - **[`canonical`]**: canonical field flattening and SHA-512 request signing.
//! - **[`codec`]**: base64 JSON codec for the payment headers.
//! - **[`transport`]**: x402 wire types, e.g. [`transport::PaymentOption`].
//! - **[`types`]**: shared value types such as [`types::AmountValue`].
//!
//! ### Payments
//!
//! - **[`networks`]**: the EVM networks the gateway settles on.
//! - **[`schemes`]**: the `exact` EVM scheme and its authorization builder.
//! - **[`client`]**: the x402 payment flow state machine.
//! - **[`gateway`]**: the signed REST client.
//! - **[`http_transport`]**: the HTTP seam both clients are written against.
//! - **[`config`]**: credentials and endpoints.
//!
//! ## Paying an x402 challenge
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use agentpay::{
//!     client::{OptionSelector, PaymentQuery, X402Client},
//!     config::GatewayConfig,
//!     schemes::exact_evm_signer::ExactEvmAuthorizer,
//! };
//!
//! # async fn pay() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let wallet = PrivateKeySigner::random();
//! let payer = wallet.address().to_string();
//!
//! let client = X402Client::builder()
//!     .transport(config.transport()?)
//!     .authorizer(ExactEvmAuthorizer::new(wallet))
//!     .resource_path(config.x402_resource_path.clone())
//!     .build();
//!
//! let query = PaymentQuery::builder()
//!     .app_id(config.app_id.clone())
//!     .qr_code("QR-ORD1")
//!     .address(payer)
//!     .build();
//!
//! let result = client
//!     .pay(query, &OptionSelector::First, None)
//!     .await?
//!     .into_result()?;
//!
//! if let Some(receipt) = result.receipt {
//!     println!("settled in {}", receipt.transaction);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Each step is also available on its own through [`client::PaymentFlow`],
//! whose [`client::FlowState`] can be inspected between steps.
//!
//! ## Calling the REST API
//!
//! ```no_run
//! use agentpay::{config::GatewayConfig, gateway::GatewayClient};
//!
//! # async fn query() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let gateway = GatewayClient::from_config(&config)?;
//!
//! let reply = gateway.query_payment("ORD1").await?;
//! println!("{:?}", reply.data);
//! # Ok(())
//! # }
//! ```
//!
//! ## Adding a network
//!
//! Networks outside the built-in table can be declared anywhere:
//!
//! ```
//! use agentpay::networks::evm::{ExplicitEvmNetwork, EvmNetwork};
//!
//! struct MyChain;
//!
//! impl ExplicitEvmNetwork for MyChain {
//!     const NETWORK: EvmNetwork = EvmNetwork {
//!         name: "my-chain",
//!         chain_id: 12345,
//!         network_id: "eip155:12345",
//!     };
//! }
//!
//! let network: EvmNetwork = MyChain.into();
//! assert_eq!(network.chain_id, 12345);
//! ```

pub mod canonical {
    pub use agentpay_core::canonical::*;
}

pub mod codec {
    pub use agentpay_core::codec::*;
}

pub mod transport {
    pub use agentpay_core::transport::*;
}

pub mod types {
    pub use agentpay_core::types::*;
}

pub mod errors {
    pub use agentpay_core::errors::*;
}

pub mod client;
pub mod config;
pub mod core;
pub mod gateway;
pub mod http_transport;
pub mod networks;
pub mod schemes;
