//! Network-specific types. Only EVM chains settle through the gateway.

pub mod evm;
