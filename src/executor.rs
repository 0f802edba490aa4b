//! Trade execution loop
//!
//! Drives due strategies to completion, one at a time: claim, ensure
//! allowance, quote, sign remotely, broadcast, confirm, notify, reschedule.
//! Per-strategy failures are caught at the strategy boundary and logged;
//! the failed strategy keeps its schedule and is retried on a later poll.

use crate::chain::{ChainGateway, Confirmation};
use crate::config::{EngineConfig, NetworkConfig};
use crate::contracts::IERC20;
use crate::error::Result;
use crate::notify::Notifier;
use crate::quote::SwapQuoteProvider;
use crate::signer::{RemoteSigner, SignableTx};
use crate::store::{Strategy, StrategyStore};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Submitted gas limit: estimate padded by the configured safety multiplier.
fn padded_gas_limit(estimate: u64, multiplier: f64) -> u64 {
    (estimate as f64 * multiplier) as u64
}

/// The core orchestrator. All collaborators are injected so tests can
/// substitute fakes per component.
pub struct TradeExecutor<C, S, Q, D, N> {
    chain: C,
    signer: S,
    quotes: Q,
    store: D,
    notifier: N,
    network: NetworkConfig,
    config: EngineConfig,
}

impl<C, S, Q, D, N> TradeExecutor<C, S, Q, D, N>
where
    C: ChainGateway,
    S: RemoteSigner,
    Q: SwapQuoteProvider,
    D: StrategyStore,
    N: Notifier,
{
    pub fn new(
        chain: C,
        signer: S,
        quotes: Q,
        store: D,
        notifier: N,
        network: NetworkConfig,
        config: EngineConfig,
    ) -> Self {
        Self {
            chain,
            signer,
            quotes,
            store,
            notifier,
            network,
            config,
        }
    }

    /// Run until the future is dropped (main selects against ctrl-c).
    ///
    /// Each cycle polls the store once, then sleeps the poll interval. A
    /// failed cycle sleeps the error backoff plus jitter instead, so a
    /// down store or RPC is not hammered in a tight loop.
    pub async fn run(&self) {
        info!(
            chain_id = self.network.chain_id,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "trade execution loop started"
        );

        loop {
            match self.poll_once().await {
                Ok(processed) => {
                    if processed > 0 {
                        info!(processed, "poll cycle complete");
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(err) => {
                    let backoff = self.jittered_backoff();
                    warn!(error = %err, backoff_ms = backoff.as_millis() as u64, "poll cycle failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn jittered_backoff(&self) -> Duration {
        let base = self.config.error_backoff;
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
        base + Duration::from_millis(jitter_ms)
    }

    /// One pass over the currently due strategies. Returns how many were
    /// attempted. Only a due-query failure propagates; everything raised
    /// while trading one strategy is contained to that strategy.
    pub async fn poll_once(&self) -> Result<usize> {
        let due = self.store.find_due(Utc::now()).await?;
        debug!(due = due.len(), "checked for trades to process");

        let mut attempted = 0;
        for strategy in &due {
            // Leases run from the moment of the claim, not the poll start;
            // confirming an earlier strategy can take a while.
            match self
                .store
                .claim(strategy.id, Utc::now(), self.config.claim_lease)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!(strategy = strategy.id, "claimed by another instance, skipping");
                    continue;
                }
                Err(err) => {
                    warn!(strategy = strategy.id, error = %err, "claim failed, skipping");
                    continue;
                }
            }

            attempted += 1;
            match self.process_strategy(strategy).await {
                Ok(confirmation) => {
                    info!(
                        strategy = strategy.id,
                        tx_hash = %confirmation.tx_hash,
                        block = confirmation.block_number,
                        "trade confirmed"
                    );
                }
                Err(err) => {
                    // The strategy stays due and is retried next cycle.
                    warn!(strategy = strategy.id, error = %err, "trade failed");
                    if let Err(store_err) = self.store.mark_failed(strategy.id).await {
                        warn!(strategy = strategy.id, error = %store_err, "failed to record failure");
                    }
                }
            }
        }

        Ok(attempted)
    }

    /// Execute one due strategy end to end and reschedule it.
    pub async fn process_strategy(&self, strategy: &Strategy) -> Result<Confirmation> {
        let account = strategy.owner_account;
        debug!(strategy = strategy.id, account = ?account, "processing strategy");

        // The native asset has no ERC-20 allowance to gate on.
        if strategy.source_token != self.network.native_token {
            self.ensure_allowance(account, strategy.source_token, strategy.amount_per_trade)
                .await?;
        }

        let quote = self
            .quotes
            .quote(
                strategy.source_token,
                strategy.destination_token,
                strategy.amount_per_trade,
                account,
                self.config.slippage_pct,
            )
            .await?;

        let tx_hash = self
            .send_transaction(account, quote.to, quote.value, quote.data.clone())
            .await?;
        debug!(strategy = strategy.id, %tx_hash, "swap broadcast");

        let confirmation = self.chain.wait_for_confirmation(tx_hash).await?;

        // Best-effort: a notification failure never un-reschedules the trade.
        let body = format!(
            "Successfully bought {} of {:?}",
            quote.dst_amount, strategy.destination_token
        );
        if let Err(err) = self.notifier.notify(account, "New investment", &body).await {
            warn!(strategy = strategy.id, error = %err, "notification failed");
        }

        let next = Utc::now() + chrono::Duration::seconds(strategy.recurrence_seconds);
        self.store.advance(strategy.id, next).await?;

        Ok(confirmation)
    }

    /// Gate the swap on the aggregator's spending allowance: when it is
    /// below the trade amount, approve the maximum and wait for that
    /// approval to confirm before anything downstream depends on it.
    async fn ensure_allowance(&self, account: Address, token: Address, amount: U256) -> Result<()> {
        let spender = self.network.aggregator_spender;
        let allowance = self.chain.read_allowance(token, account, spender).await?;
        if allowance >= amount {
            return Ok(());
        }

        let call = IERC20::approveCall {
            spender,
            amount: U256::MAX,
        };
        let data = Bytes::from(call.abi_encode());

        let tx_hash = self
            .send_transaction(account, token, U256::ZERO, data)
            .await?;
        info!(account = ?account, token = ?token, %tx_hash, "approving aggregator spender");

        // An unconfirmed approval must never be followed by the swap that
        // depends on it: nonce and allowance downstream both hinge on it.
        self.chain.wait_for_confirmation(tx_hash).await?;
        Ok(())
    }

    /// Resolve gas, fees and nonce, have the remote signer sign, broadcast.
    async fn send_transaction(
        &self,
        account: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<TxHash> {
        let gas = self
            .chain
            .estimate_gas(account, to, value, data.clone())
            .await?;
        let gas_price = self.chain.gas_price().await?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.chain.fees_per_gas().await?;
        let nonce = self.chain.next_nonce(account).await?;

        let tx = SignableTx {
            to,
            value,
            data,
            chain_id: self.network.chain_id,
            nonce,
            gas_limit: padded_gas_limit(gas, self.config.gas_limit_multiplier),
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
        };

        let raw = self.signer.sign_transaction(account, &tx).await?;
        self.chain.broadcast(raw).await
    }
}
