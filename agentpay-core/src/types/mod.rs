//! Core types used across agentpay.

mod amount;
mod common;

pub use amount::*;
pub use common::*;
