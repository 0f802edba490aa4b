//! Strategy store: durable recurring-investment configurations
//!
//! The store exclusively owns Strategy rows. The executor reads a snapshot,
//! claims a lease so no other instance trades the same strategy in the same
//! due window, and writes back only the schedule/failure fields.

mod memory;
mod sql;

pub use memory::MemoryStrategyStore;
pub use sql::SqlStrategyStore;

use crate::error::Result;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One user's recurring-investment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub id: i64,
    /// Custodial account that executes the trades
    pub owner_account: Address,
    /// Token sold each execution
    pub source_token: Address,
    /// Token bought each execution
    pub destination_token: Address,
    /// Smallest-unit amount of source token spent per execution
    pub amount_per_trade: U256,
    /// Interval between executions
    pub recurrence_seconds: i64,
    /// Next scheduled execution; `None` means due immediately
    pub next_trade_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Consecutive failures since the last successful trade. Hook for a
    /// future pause/alert policy; the engine only counts.
    pub failure_count: i64,
}

impl Strategy {
    /// A strategy is due when it has never run or its schedule has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_trade_at {
            None => true,
            Some(at) => at <= now,
        }
    }
}

/// Fields for inserting a strategy (row id and bookkeeping are assigned by
/// the store). Creation is normally done by the investment front end; the
/// engine itself never inserts.
#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub owner_account: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub amount_per_trade: U256,
    pub recurrence_seconds: i64,
}

/// Durable, consistent storage of strategies.
pub trait StrategyStore: Send + Sync {
    /// All strategies due at `now` and not under another instance's lease.
    fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Strategy>>> + Send;

    /// Atomically take a lease on a due, unclaimed strategy. Returns false
    /// when another instance already holds it or it is no longer due.
    fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Record a successful trade: set the next schedule, clear the lease
    /// and the failure counter.
    fn advance(
        &self,
        id: i64,
        next_trade_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Record a failed attempt: bump the failure counter and clear the
    /// lease so the strategy is retried on the next poll.
    fn mark_failed(&self, id: i64) -> impl std::future::Future<Output = Result<()>> + Send;
}
