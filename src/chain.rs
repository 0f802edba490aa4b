//! Chain gateway: every direct read/write against one blockchain endpoint
//!
//! The executor only talks to the chain through the [`ChainGateway`] trait,
//! so tests substitute a fake and production uses [`RpcGateway`] over an
//! alloy HTTP provider.

use crate::contracts::IERC20;
use crate::error::{EngineError, Result};
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Minimal confirmation view the engine cares about.
///
/// Deliberately not the full alloy receipt: the loop only branches on
/// success/revert, and fakes should not have to fabricate RPC receipts.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Read and write operations against one blockchain network endpoint.
pub trait ChainGateway: Send + Sync {
    /// Estimate gas units for a call
    fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Current legacy gas price in wei
    fn gas_price(&self) -> impl std::future::Future<Output = Result<u128>> + Send;

    /// EIP-1559 fee estimate: (max fee per gas, max priority fee per gas)
    fn fees_per_gas(&self) -> impl std::future::Future<Output = Result<(u128, u128)>> + Send;

    /// Next nonce for an address
    fn next_nonce(&self, address: Address)
        -> impl std::future::Future<Output = Result<u64>> + Send;

    /// ERC-20 allowance of `spender` over `owner`'s `token`
    fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> impl std::future::Future<Output = Result<U256>> + Send;

    /// Broadcast a signed raw transaction
    fn broadcast(&self, raw: Bytes) -> impl std::future::Future<Output = Result<TxHash>> + Send;

    /// Block until the transaction is mined, within a bounded window.
    ///
    /// Fails with [`EngineError::TransactionReverted`] on a failure receipt
    /// and [`EngineError::ConfirmationTimeout`] when no receipt arrives.
    fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> impl std::future::Future<Output = Result<Confirmation>> + Send;
}

/// Type alias for the read/broadcast provider
type HttpProvider = Arc<RootProvider<Ethereum>>;

/// [`ChainGateway`] implementation over an alloy HTTP provider.
pub struct RpcGateway {
    provider: HttpProvider,
    receipt_poll_interval: Duration,
    receipt_poll_attempts: u32,
}

impl RpcGateway {
    /// Create a gateway for one RPC endpoint.
    pub fn new(rpc_url: Url) -> Self {
        // Read-only provider without fillers; signing happens remotely and
        // broadcasts are raw bytes.
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<Ethereum>()
            .connect_http(rpc_url);

        Self {
            provider: Arc::new(provider),
            receipt_poll_interval: Duration::from_secs(2),
            receipt_poll_attempts: 60,
        }
    }

    /// Override the receipt polling schedule (interval, attempts).
    pub fn with_receipt_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_poll_attempts = attempts;
        self
    }
}

fn rpc_err(err: impl std::fmt::Display) -> EngineError {
    EngineError::RpcUnavailable(err.to_string())
}

impl ChainGateway for RpcGateway {
    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<u64> {
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data);

        self.provider.estimate_gas(request).await.map_err(rpc_err)
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.map_err(rpc_err)
    }

    async fn fees_per_gas(&self) -> Result<(u128, u128)> {
        let estimate = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(rpc_err)?;

        Ok((estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas))
    }

    async fn next_nonce(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(rpc_err)
    }

    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        let call = IERC20::allowanceCall { owner, spender };
        let data = call.abi_encode();

        let result: Bytes = self
            .provider
            .call(
                TransactionRequest::default()
                    .with_to(token)
                    .with_input(data),
            )
            .await
            .map_err(rpc_err)?;

        IERC20::allowanceCall::abi_decode_returns(&result)
            .map_err(|e| EngineError::RpcUnavailable(format!("decode allowance: {e}")))
    }

    async fn broadcast(&self, raw: Bytes) -> Result<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw.as_ref())
            .await
            .map_err(rpc_err)?;

        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        for _ in 0..self.receipt_poll_attempts {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(rpc_err)?;

            if let Some(receipt) = receipt {
                if !receipt.status() {
                    return Err(EngineError::TransactionReverted(tx_hash));
                }
                return Ok(Confirmation {
                    tx_hash,
                    block_number: receipt.block_number,
                });
            }

            tokio::time::sleep(self.receipt_poll_interval).await;
        }

        Err(EngineError::ConfirmationTimeout(tx_hash))
    }
}
