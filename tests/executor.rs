//! End-to-end tests of the trade execution loop against fake collaborators.
//!
//! Each fake records its calls into a shared ordered log so tests can
//! assert sequencing (e.g. the approval confirms before the quote is
//! requested), not just call counts.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use chrono::Utc;
use dca_engine::{
    ChainGateway, Confirmation, EngineConfig, EngineError, NetworkConfig, NewStrategy, Notifier,
    RemoteSigner, MemoryStrategyStore, SignableTx, Strategy, StrategyStore, SwapQuote,
    SwapQuoteProvider, TradeExecutor,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
const AERO: &str = "0x940181a94a35a4569e4529a3cdfb74e38fd98631";

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Clone)]
struct FakeChain {
    log: Log,
    allowance: U256,
    revert: bool,
    time_out: bool,
    confirm_delay: Duration,
    broadcasts: Arc<Mutex<u8>>,
}

impl FakeChain {
    fn new(log: Log, allowance: U256) -> Self {
        Self {
            log,
            allowance,
            revert: false,
            time_out: false,
            confirm_delay: Duration::ZERO,
            broadcasts: Arc::new(Mutex::new(0)),
        }
    }

    fn reverting(mut self) -> Self {
        self.revert = true;
        self
    }

    fn timing_out(mut self) -> Self {
        self.time_out = true;
        self
    }

    fn slow_confirmations(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    fn broadcast_count(&self) -> u8 {
        *self.broadcasts.lock().unwrap()
    }
}

impl ChainGateway for FakeChain {
    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Address,
        _value: U256,
        _data: Bytes,
    ) -> dca_engine::Result<u64> {
        Ok(21_000)
    }

    async fn gas_price(&self) -> dca_engine::Result<u128> {
        Ok(1_000_000)
    }

    async fn fees_per_gas(&self) -> dca_engine::Result<(u128, u128)> {
        Ok((2_000_000, 1_000))
    }

    async fn next_nonce(&self, _address: Address) -> dca_engine::Result<u64> {
        Ok(7)
    }

    async fn read_allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> dca_engine::Result<U256> {
        self.log.push("allowance");
        Ok(self.allowance)
    }

    async fn broadcast(&self, _raw: Bytes) -> dca_engine::Result<TxHash> {
        let mut count = self.broadcasts.lock().unwrap();
        *count += 1;
        self.log.push("broadcast");
        Ok(TxHash::repeat_byte(*count))
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> dca_engine::Result<Confirmation> {
        if !self.confirm_delay.is_zero() {
            tokio::time::sleep(self.confirm_delay).await;
        }
        if self.revert {
            return Err(EngineError::TransactionReverted(tx_hash));
        }
        if self.time_out {
            return Err(EngineError::ConfirmationTimeout(tx_hash));
        }
        self.log.push("confirm");
        Ok(Confirmation {
            tx_hash,
            block_number: Some(1234),
        })
    }
}

#[derive(Clone)]
struct FakeSigner {
    log: Log,
    reject: bool,
}

impl RemoteSigner for FakeSigner {
    async fn sign_transaction(&self, _account: Address, tx: &SignableTx) -> dca_engine::Result<Bytes> {
        if self.reject {
            return Err(EngineError::SignerRejected("policy denied".to_string()));
        }
        self.log.push(format!("sign:{:?}", tx.to));
        Ok(Bytes::from(tx.nonce.to_be_bytes().to_vec()))
    }
}

#[derive(Clone)]
struct FakeQuotes {
    log: Log,
    router: Address,
    fail: bool,
}

impl SwapQuoteProvider for FakeQuotes {
    async fn quote(
        &self,
        _src: Address,
        _dst: Address,
        _amount: U256,
        _from: Address,
        _slippage_pct: f64,
    ) -> dca_engine::Result<SwapQuote> {
        if self.fail {
            return Err(EngineError::QuoteUnavailable("500 Internal Server Error".to_string()));
        }
        self.log.push("quote");
        Ok(SwapQuote {
            to: self.router,
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            value: U256::ZERO,
            dst_amount: U256::from(777u64),
        })
    }
}

#[derive(Clone, Default)]
struct FakeNotifier {
    sent: Arc<Mutex<Vec<(Address, String)>>>,
    fail: bool,
}

impl FakeNotifier {
    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for FakeNotifier {
    async fn notify(&self, recipient: Address, _title: &str, body: &str) -> dca_engine::Result<()> {
        if self.fail {
            return Err(EngineError::NotifyFailed("channel offline".to_string()));
        }
        self.sent.lock().unwrap().push((recipient, body.to_string()));
        Ok(())
    }
}

/// Store handle that can be shared between an executor and the test (and
/// between two executor "instances" in the double-processing test). Records
/// the timestamp passed to each claim.
#[derive(Clone, Default)]
struct SharedStore {
    inner: Arc<MemoryStrategyStore>,
    claim_times: Arc<Mutex<Vec<chrono::DateTime<Utc>>>>,
}

impl StrategyStore for SharedStore {
    async fn find_due(&self, now: chrono::DateTime<Utc>) -> dca_engine::Result<Vec<Strategy>> {
        self.inner.find_due(now).await
    }

    async fn claim(
        &self,
        id: i64,
        now: chrono::DateTime<Utc>,
        lease: Duration,
    ) -> dca_engine::Result<bool> {
        self.claim_times.lock().unwrap().push(now);
        self.inner.claim(id, now, lease).await
    }

    async fn advance(&self, id: i64, next_trade_at: chrono::DateTime<Utc>) -> dca_engine::Result<()> {
        self.inner.advance(id, next_trade_at).await
    }

    async fn mark_failed(&self, id: i64) -> dca_engine::Result<()> {
        self.inner.mark_failed(id).await
    }
}

struct Harness {
    log: Log,
    chain: FakeChain,
    signer: FakeSigner,
    quotes: FakeQuotes,
    store: SharedStore,
    notifier: FakeNotifier,
    network: NetworkConfig,
}

impl Harness {
    fn new(allowance: U256) -> Self {
        let log = Log::default();
        let network = NetworkConfig::base();
        Self {
            chain: FakeChain::new(log.clone(), allowance),
            signer: FakeSigner {
                log: log.clone(),
                reject: false,
            },
            quotes: FakeQuotes {
                log: log.clone(),
                router: network.aggregator_spender,
                fail: false,
            },
            store: SharedStore::default(),
            notifier: FakeNotifier::default(),
            network,
            log,
        }
    }

    fn executor(
        &self,
    ) -> TradeExecutor<FakeChain, FakeSigner, FakeQuotes, SharedStore, FakeNotifier> {
        TradeExecutor::new(
            self.chain.clone(),
            self.signer.clone(),
            self.quotes.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.network.clone(),
            EngineConfig::default(),
        )
    }

    fn insert(&self, source_token: Address, amount: u64) -> Strategy {
        self.store.inner.insert(NewStrategy {
            owner_account: Address::repeat_byte(0x42),
            source_token,
            destination_token: AERO.parse().unwrap(),
            amount_per_trade: U256::from(amount),
            recurrence_seconds: 3600,
        })
    }
}

// Scenario A: native-asset source skips the allowance check entirely.
#[tokio::test]
async fn native_source_trades_without_allowance_check() {
    let harness = Harness::new(U256::ZERO);
    let strategy = harness.insert(harness.network.native_token, 100);

    let before = Utc::now();
    let attempted = harness.executor().poll_once().await.unwrap();
    assert_eq!(attempted, 1);

    assert_eq!(harness.log.count("allowance"), 0);
    assert_eq!(harness.chain.broadcast_count(), 1);
    assert_eq!(harness.notifier.sent_count(), 1);

    // Rescheduled to now + recurrence, strictly in the future
    let next = harness.store.inner.get(strategy.id).unwrap().next_trade_at.unwrap();
    assert!(next > before);
    let expected = before + chrono::Duration::seconds(strategy.recurrence_seconds);
    assert!((next - expected).num_seconds().abs() <= 5);
}

// Scenario B: insufficient allowance issues an approval that confirms
// before the swap quote is even requested.
#[tokio::test]
async fn low_allowance_approves_before_quoting() {
    let harness = Harness::new(U256::from(50u64));
    let source: Address = USDC.parse().unwrap();
    harness.insert(source, 100);

    let attempted = harness.executor().poll_once().await.unwrap();
    assert_eq!(attempted, 1);

    let events = harness.log.events();
    let quote_pos = events.iter().position(|e| e == "quote").unwrap();
    let first_confirm = events.iter().position(|e| e == "confirm").unwrap();
    assert!(
        first_confirm < quote_pos,
        "approval must confirm before the quote is requested: {events:?}"
    );

    // First signed transaction targets the token contract, second the router
    let signs: Vec<&String> = events.iter().filter(|e| e.starts_with("sign:")).collect();
    assert_eq!(signs.len(), 2);
    assert_eq!(*signs[0], format!("sign:{source:?}"));
    assert_eq!(*signs[1], format!("sign:{:?}", harness.network.aggregator_spender));
    assert_eq!(harness.chain.broadcast_count(), 2);
}

// Sufficient allowance: the gate is read but no approval is issued, and a
// second pass makes the same decision (idempotent check).
#[tokio::test]
async fn sufficient_allowance_skips_approval_idempotently() {
    let harness = Harness::new(U256::from(1_000u64));
    let source: Address = USDC.parse().unwrap();
    let strategy = harness.insert(source, 100);

    let executor = harness.executor();
    executor.process_strategy(&strategy).await.unwrap();
    executor.process_strategy(&strategy).await.unwrap();

    assert_eq!(harness.log.count("allowance"), 2);
    // Only swap transactions were signed, never an approval
    let signs = harness.log.count("sign:");
    assert_eq!(signs, 2);
    assert_eq!(
        harness.log.count(&format!("sign:{source:?}")),
        0,
        "no approval transaction expected"
    );
}

// Scenario C: the aggregator fails; nothing is broadcast and the strategy
// stays due with its failure recorded.
#[tokio::test]
async fn quote_failure_leaves_strategy_due() {
    let mut harness = Harness::new(U256::from(1_000u64));
    harness.quotes.fail = true;
    let strategy = harness.insert(USDC.parse().unwrap(), 100);

    harness.executor().poll_once().await.unwrap();

    assert_eq!(harness.chain.broadcast_count(), 0);
    assert_eq!(harness.notifier.sent_count(), 0);

    let stored = harness.store.inner.get(strategy.id).unwrap();
    assert_eq!(stored.next_trade_at, None, "must not reschedule on failure");
    assert_eq!(stored.failure_count, 1);
}

// Scenario D: broadcast succeeds but the receipt reverts; no notification,
// no reschedule.
#[tokio::test]
async fn reverted_swap_is_not_rescheduled_or_notified() {
    let mut harness = Harness::new(U256::ZERO);
    harness.chain = harness.chain.clone().reverting();
    let strategy = harness.insert(harness.network.native_token, 100);

    harness.executor().poll_once().await.unwrap();

    assert_eq!(harness.chain.broadcast_count(), 1, "swap was broadcast");
    assert_eq!(harness.notifier.sent_count(), 0);

    let stored = harness.store.inner.get(strategy.id).unwrap();
    assert_eq!(stored.next_trade_at, None);
    assert_eq!(stored.failure_count, 1);
}

// Broadcast succeeds but the receipt never lands within the bounded wait;
// no notification, no reschedule.
#[tokio::test]
async fn confirmation_timeout_is_not_rescheduled_or_notified() {
    let mut harness = Harness::new(U256::ZERO);
    harness.chain = harness.chain.clone().timing_out();
    let strategy = harness.insert(harness.network.native_token, 100);

    harness.executor().poll_once().await.unwrap();

    assert_eq!(harness.chain.broadcast_count(), 1, "swap was broadcast");
    assert_eq!(harness.notifier.sent_count(), 0);

    let stored = harness.store.inner.get(strategy.id).unwrap();
    assert_eq!(stored.next_trade_at, None);
    assert_eq!(stored.failure_count, 1);
}

// A signer rejection aborts before any broadcast and keeps the strategy due.
#[tokio::test]
async fn signer_rejection_broadcasts_nothing() {
    let mut harness = Harness::new(U256::ZERO);
    harness.signer.reject = true;
    let strategy = harness.insert(harness.network.native_token, 100);

    harness.executor().poll_once().await.unwrap();

    assert_eq!(harness.chain.broadcast_count(), 0);
    let stored = harness.store.inner.get(strategy.id).unwrap();
    assert_eq!(stored.next_trade_at, None);
    assert_eq!(stored.failure_count, 1);
}

// Scenario E: two loop instances share one store; the claim lease ensures
// the due window is traded exactly once.
#[tokio::test]
async fn two_instances_trade_a_due_window_once() {
    let harness = Harness::new(U256::ZERO);
    let strategy = harness.insert(harness.network.native_token, 100);

    let first = harness.executor();
    let second = harness.executor();

    let (a, b) = tokio::join!(first.poll_once(), second.poll_once());
    assert_eq!(a.unwrap() + b.unwrap(), 1, "exactly one instance may trade");

    assert_eq!(harness.chain.broadcast_count(), 1);
    assert_eq!(harness.notifier.sent_count(), 1);
    assert!(harness.store.inner.get(strategy.id).unwrap().next_trade_at.is_some());
}

// A notification failure is best-effort: the confirmed trade is still
// rescheduled.
#[tokio::test]
async fn notification_failure_does_not_block_reschedule() {
    let mut harness = Harness::new(U256::ZERO);
    harness.notifier.fail = true;
    let strategy = harness.insert(harness.network.native_token, 100);

    assert_eq!(harness.executor().poll_once().await.unwrap(), 1);

    let stored = harness.store.inner.get(strategy.id).unwrap();
    assert!(stored.next_trade_at.is_some());
    assert_eq!(stored.failure_count, 0);
}

// Leases are measured from the claim itself, not the start of the poll
// cycle: a slow confirmation on the first strategy must not shorten the
// lease taken for the second.
#[tokio::test]
async fn claims_use_a_fresh_timestamp_per_strategy() {
    let mut harness = Harness::new(U256::ZERO);
    harness.chain = harness
        .chain
        .clone()
        .slow_confirmations(Duration::from_millis(80));
    harness.insert(harness.network.native_token, 100);
    harness.insert(harness.network.native_token, 100);

    assert_eq!(harness.executor().poll_once().await.unwrap(), 2);

    let claims = harness.store.claim_times.lock().unwrap().clone();
    assert_eq!(claims.len(), 2);
    let gap = (claims[1] - claims[0]).num_milliseconds();
    assert!(
        gap >= 70,
        "second claim should be stamped after the first trade confirmed, gap was {gap}ms"
    );
}

// A strategy rescheduled into the future is ignored by later polls.
#[tokio::test]
async fn rescheduled_strategy_waits_out_its_interval() {
    let harness = Harness::new(U256::ZERO);
    harness.insert(harness.network.native_token, 100);

    let executor = harness.executor();
    assert_eq!(executor.poll_once().await.unwrap(), 1);
    assert_eq!(executor.poll_once().await.unwrap(), 0);
    assert_eq!(harness.chain.broadcast_count(), 1);
}
