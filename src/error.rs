//! Error taxonomy for the execution engine.
//!
//! Every failure that can abort one trade attempt maps to exactly one of
//! these variants, so callers can log and branch without string matching.

use alloy::primitives::TxHash;
use thiserror::Error;

/// Errors raised while processing a strategy or talking to a collaborator.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The custodial signing service could not be reached (or answered 5xx).
    #[error("remote signer unavailable: {0}")]
    SignerUnavailable(String),

    /// The custodial signing service refused to sign for this account.
    #[error("remote signer rejected the request: {0}")]
    SignerRejected(String),

    /// The swap aggregator returned a non-2xx status or a malformed payload.
    #[error("swap quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// A broadcast transaction was mined with a failure status.
    #[error("transaction {0} reverted on-chain")]
    TransactionReverted(TxHash),

    /// No receipt arrived within the bounded confirmation window. The
    /// transaction may still confirm later; the strategy stays due.
    #[error("no receipt for transaction {0} within the confirmation window")]
    ConfirmationTimeout(TxHash),

    /// A chain read (gas, fees, nonce, allowance) or broadcast failed at
    /// the RPC layer.
    #[error("rpc request failed: {0}")]
    RpcUnavailable(String),

    /// The strategy store could not be read or written.
    #[error("strategy store unavailable: {0}")]
    StoreUnavailable(String),

    /// Best-effort notification delivery failed. Never aborts a trade.
    #[error("notification delivery failed: {0}")]
    NotifyFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}
