//! agentpay core library.
//!
//! Protocol types shared by every agentpay component, plus the two pure
//! building blocks that need no network or wallet access:
//!
//! - [`canonical`]: canonical parameter flattening and SHA-512 signing for
//!   direct gateway REST calls.
//! - [`codec`]: base64 JSON codec for the `X-PAYMENT` / `X-Payment-Response`
//!   headers.

pub mod canonical;
pub mod codec;
pub mod errors;
pub mod transport;
pub mod types;
