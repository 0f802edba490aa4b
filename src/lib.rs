//! DCA execution engine
//!
//! A daemon that executes recurring token purchases on Base for custodial
//! wallets. For each due strategy it ensures an ERC-20 allowance toward the
//! swap aggregator, fetches an executable swap, has the custodial service
//! sign the transaction, broadcasts it, waits for confirmation, notifies
//! the user, and reschedules.
//!
//! # Example
//!
//! ```rust,ignore
//! use dca_engine::{
//!     AppConfig, MemoryStrategyStore, OneInchQuoteProvider, PrivySigner,
//!     PushChannelNotifier, RpcGateway, TradeExecutor,
//! };
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let chain = RpcGateway::new(config.network.rpc_url.parse()?);
//!     let signer = PrivySigner::new(&config.privy)?;
//!     let quotes = OneInchQuoteProvider::new(
//!         &config.aggregator.base_url,
//!         &config.aggregator.api_key,
//!         config.network.chain_id,
//!     );
//!     let store = MemoryStrategyStore::new();
//!     let notifier = PushChannelNotifier::new(&config.notifier);
//!
//!     let executor = TradeExecutor::new(
//!         chain, signer, quotes, store, notifier,
//!         config.network, config.engine,
//!     );
//!     executor.run().await;
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod notify;
pub mod quote;
pub mod signer;
pub mod store;

// Re-export main types for convenience
pub use chain::{ChainGateway, Confirmation, RpcGateway};
pub use config::{AggregatorConfig, AppConfig, EngineConfig, NetworkConfig, NotifierConfig, PrivyConfig};
pub use error::{EngineError, Result};
pub use executor::TradeExecutor;
pub use notify::{Notifier, PushChannelNotifier};
pub use quote::{OneInchQuoteProvider, SwapQuote, SwapQuoteProvider};
pub use signer::{PrivySigner, RemoteSigner, SignableTx};
pub use store::{MemoryStrategyStore, NewStrategy, SqlStrategyStore, Strategy, StrategyStore};
