//! Schemes are defined here. The gateway only settles `exact` EVM payments.

pub mod exact_evm;
pub mod exact_evm_signer;
