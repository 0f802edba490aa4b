//! In-memory strategy store
//!
//! Same contract as the SQL store, backed by a mutex-guarded vector. Used
//! in tests and local dry runs; claims are atomic under the single lock.

use super::{NewStrategy, Strategy, StrategyStore};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
struct Slot {
    strategy: Strategy,
    locked_until: Option<DateTime<Utc>>,
}

/// Mutex-guarded [`StrategyStore`].
#[derive(Debug, Default)]
pub struct MemoryStrategyStore {
    inner: Mutex<Vec<Slot>>,
}

impl MemoryStrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new strategy, assigning the next id.
    pub fn insert(&self, new: NewStrategy) -> Strategy {
        let mut slots = self.inner.lock().expect("store lock poisoned");
        let strategy = Strategy {
            id: slots.len() as i64 + 1,
            owner_account: new.owner_account,
            source_token: new.source_token,
            destination_token: new.destination_token,
            amount_per_trade: new.amount_per_trade,
            recurrence_seconds: new.recurrence_seconds,
            next_trade_at: None,
            created_at: Utc::now(),
            failure_count: 0,
        };
        slots.push(Slot {
            strategy: strategy.clone(),
            locked_until: None,
        });
        strategy
    }

    /// Fetch one strategy by id.
    pub fn get(&self, id: i64) -> Option<Strategy> {
        let slots = self.inner.lock().expect("store lock poisoned");
        slots
            .iter()
            .find(|s| s.strategy.id == id)
            .map(|s| s.strategy.clone())
    }

    fn unknown(id: i64) -> EngineError {
        EngineError::StoreUnavailable(format!("unknown strategy id {id}"))
    }
}

impl StrategyStore for MemoryStrategyStore {
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Strategy>> {
        let slots = self.inner.lock().expect("store lock poisoned");
        Ok(slots
            .iter()
            .filter(|s| s.strategy.is_due(now))
            .filter(|s| s.locked_until.is_none_or(|until| until <= now))
            .map(|s| s.strategy.clone())
            .collect())
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>, lease: Duration) -> Result<bool> {
        let mut slots = self.inner.lock().expect("store lock poisoned");
        let slot = slots
            .iter_mut()
            .find(|s| s.strategy.id == id)
            .ok_or_else(|| Self::unknown(id))?;

        let claimable =
            slot.strategy.is_due(now) && slot.locked_until.is_none_or(|until| until <= now);
        if claimable {
            slot.locked_until = Some(now + chrono::Duration::seconds(lease.as_secs() as i64));
        }
        Ok(claimable)
    }

    async fn advance(&self, id: i64, next_trade_at: DateTime<Utc>) -> Result<()> {
        let mut slots = self.inner.lock().expect("store lock poisoned");
        let slot = slots
            .iter_mut()
            .find(|s| s.strategy.id == id)
            .ok_or_else(|| Self::unknown(id))?;

        slot.strategy.next_trade_at = Some(next_trade_at);
        slot.strategy.failure_count = 0;
        slot.locked_until = None;
        Ok(())
    }

    async fn mark_failed(&self, id: i64) -> Result<()> {
        let mut slots = self.inner.lock().expect("store lock poisoned");
        let slot = slots
            .iter_mut()
            .find(|s| s.strategy.id == id)
            .ok_or_else(|| Self::unknown(id))?;

        slot.strategy.failure_count += 1;
        slot.locked_until = None;
        Ok(())
    }
}
