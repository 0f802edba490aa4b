//! Remote transaction signer abstraction
//!
//! The engine never holds user key material: a remote custodial service
//! signs on its behalf. The signer computes nothing - gas, fees, nonce and
//! chain id are all resolved by the caller and passed in, so the same
//! request is reproducible and auditable.

mod privy;

pub use privy::PrivySigner;

use crate::error::Result;
use alloy::primitives::{Address, Bytes, U256};

/// A fully-resolved transaction, ready to be signed.
#[derive(Debug, Clone)]
pub struct SignableTx {
    /// Target contract address
    pub to: Address,
    /// Transaction value in wei
    pub value: U256,
    /// Encoded calldata
    pub data: Bytes,
    /// Chain the transaction is valid on
    pub chain_id: u64,
    /// Account nonce
    pub nonce: u64,
    /// Gas limit (already padded by the caller's safety multiplier)
    pub gas_limit: u64,
    /// Legacy gas price in wei
    pub gas_price: u128,
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: u128,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: u128,
}

/// Trait for obtaining signatures from a custodial key-management service.
///
/// One signer instance serves many accounts; the account to sign for is a
/// per-call argument because each strategy trades from its own wallet.
pub trait RemoteSigner: Send + Sync {
    /// Signs a transaction for `account`, returning the raw signed bytes
    /// ready for broadcast.
    fn sign_transaction(
        &self,
        account: Address,
        tx: &SignableTx,
    ) -> impl std::future::Future<Output = Result<Bytes>> + Send;
}
