//! SQLite-backed strategy store (sqlx)
//!
//! Claims are single conditional UPDATE statements, so two engine instances
//! sharing one database cannot both win the same due window.

use super::{NewStrategy, Strategy, StrategyStore};
use crate::error::{EngineError, Result};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS strategies (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_account      TEXT    NOT NULL,
    source_token       TEXT    NOT NULL,
    destination_token  TEXT    NOT NULL,
    amount_per_trade   TEXT    NOT NULL,
    recurrence_seconds INTEGER NOT NULL,
    next_trade_at      INTEGER,
    created_at         INTEGER NOT NULL,
    failure_count      INTEGER NOT NULL DEFAULT 0,
    locked_until       INTEGER
)
"#;

const STRATEGY_COLUMNS: &str = "id, owner_account, source_token, destination_token, \
     amount_per_trade, recurrence_seconds, next_trade_at, created_at, failure_count";

/// sqlx/SQLite implementation of [`StrategyStore`].
pub struct SqlStrategyStore {
    pool: SqlitePool,
}

impl SqlStrategyStore {
    /// Connect to the database and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert a new strategy (used by the investment front end and tests).
    pub async fn insert(&self, new: NewStrategy) -> Result<Strategy> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO strategies \
             (owner_account, source_token, destination_token, amount_per_trade, \
              recurrence_seconds, next_trade_at, created_at) \
             VALUES (?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(format!("{:?}", new.owner_account))
        .bind(format!("{:?}", new.source_token))
        .bind(format!("{:?}", new.destination_token))
        .bind(new.amount_per_trade.to_string())
        .bind(new.recurrence_seconds)
        .bind(created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(Strategy {
            id: result.last_insert_rowid(),
            owner_account: new.owner_account,
            source_token: new.source_token,
            destination_token: new.destination_token,
            amount_per_trade: new.amount_per_trade,
            recurrence_seconds: new.recurrence_seconds,
            next_trade_at: None,
            created_at: Utc
                .timestamp_opt(created_at.timestamp(), 0)
                .single()
                .unwrap_or(created_at),
            failure_count: 0,
        })
    }

    /// Fetch one strategy by id.
    pub async fn get(&self, id: i64) -> Result<Option<Strategy>> {
        let row = sqlx::query(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| strategy_from_row(&r)).transpose()
    }
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> EngineError {
    EngineError::StoreUnavailable(format!("corrupt strategy row, {field}: {err}"))
}

fn parse_address(row: &SqliteRow, column: &str) -> Result<Address> {
    let text: String = row.try_get(column)?;
    text.parse().map_err(|e| corrupt(column, e))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| corrupt("timestamp", secs))
}

fn strategy_from_row(row: &SqliteRow) -> Result<Strategy> {
    let amount_text: String = row.try_get("amount_per_trade")?;
    let next_trade_secs: Option<i64> = row.try_get("next_trade_at")?;

    Ok(Strategy {
        id: row.try_get("id")?,
        owner_account: parse_address(row, "owner_account")?,
        source_token: parse_address(row, "source_token")?,
        destination_token: parse_address(row, "destination_token")?,
        amount_per_trade: amount_text
            .parse::<U256>()
            .map_err(|e| corrupt("amount_per_trade", e))?,
        recurrence_seconds: row.try_get("recurrence_seconds")?,
        next_trade_at: next_trade_secs.map(timestamp).transpose()?,
        created_at: timestamp(row.try_get("created_at")?)?,
        failure_count: row.try_get("failure_count")?,
    })
}

impl StrategyStore for SqlStrategyStore {
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Strategy>> {
        let rows = sqlx::query(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies \
             WHERE (next_trade_at IS NULL OR next_trade_at <= ?) \
               AND (locked_until IS NULL OR locked_until <= ?)"
        ))
        .bind(now.timestamp())
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(strategy_from_row).collect()
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>, lease: Duration) -> Result<bool> {
        let locked_until = now.timestamp() + lease.as_secs() as i64;
        let result = sqlx::query(
            "UPDATE strategies SET locked_until = ? \
             WHERE id = ? \
               AND (next_trade_at IS NULL OR next_trade_at <= ?) \
               AND (locked_until IS NULL OR locked_until <= ?)",
        )
        .bind(locked_until)
        .bind(id)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn advance(&self, id: i64, next_trade_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE strategies \
             SET next_trade_at = ?, locked_until = NULL, failure_count = 0 \
             WHERE id = ?",
        )
        .bind(next_trade_at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE strategies \
             SET failure_count = failure_count + 1, locked_until = NULL \
             WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
