//! Configuration for the execution engine
//!
//! Everything the loop used to hardcode (token sentinel, aggregator
//! spender, gas multiplier) lives here and is injected at construction.

use alloy::primitives::Address;
use eyre::{Context, Result};
use std::time::Duration;

/// Network configuration: chain identity plus the addresses the engine
/// needs on that chain (Base mainnet by default).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Chain ID (8453 for Base)
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Sentinel address the aggregator uses for the chain's native asset
    pub native_token: Address,
    /// Aggregator router that must be approved to spend ERC-20 source tokens
    pub aggregator_spender: Address,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::base()
    }
}

impl NetworkConfig {
    /// Base mainnet configuration (default)
    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            rpc_url: "https://1rpc.io/base".to_string(),
            native_token: "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
                .parse()
                .unwrap(),
            aggregator_spender: "0x111111125421ca6dc452d289314280a0f8842a65"
                .parse()
                .unwrap(),
        }
    }

    /// Override the RPC URL
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Override the aggregator spender address
    pub fn with_aggregator_spender(mut self, spender: Address) -> Self {
        self.aggregator_spender = spender;
        self
    }
}

/// Tuning knobs for the trade execution loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max slippage passed to the aggregator, in percent
    pub slippage_pct: f64,
    /// Submitted gas limit = estimated gas * this multiplier
    pub gas_limit_multiplier: f64,
    /// Delay between due-strategy polls
    pub poll_interval: Duration,
    /// Base backoff after a failed poll cycle (jitter is added on top)
    pub error_backoff: Duration,
    /// How long a claimed strategy stays invisible to other instances
    pub claim_lease: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slippage_pct: 3.0,
            gas_limit_multiplier: 2.0,
            poll_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
            claim_lease: Duration::from_secs(300),
        }
    }
}

/// Credentials for the Privy wallet API.
#[derive(Debug, Clone)]
pub struct PrivyConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// P-256 authorization private key (PKCS#8 PEM, or its bare base64 body)
    pub authorization_key_pem: String,
}

/// Swap aggregator API settings.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Notification channel settings.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub endpoint: String,
    pub channel: String,
}

/// Everything the daemon needs, gathered from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub engine: EngineConfig,
    pub privy: PrivyConfig,
    pub aggregator: AggregatorConfig,
    pub notifier: NotifierConfig,
    pub database_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenvy).
    pub fn from_env() -> Result<Self> {
        let mut network = NetworkConfig::base();
        if let Ok(rpc_url) = std::env::var("DCA_RPC_URL") {
            network.rpc_url = rpc_url;
        }
        if let Ok(spender) = std::env::var("DCA_AGGREGATOR_SPENDER") {
            network.aggregator_spender = spender
                .parse()
                .context("DCA_AGGREGATOR_SPENDER is not a valid address")?;
        }

        let mut engine = EngineConfig::default();
        if let Ok(slippage) = std::env::var("DCA_SLIPPAGE_PCT") {
            engine.slippage_pct = slippage.parse().context("DCA_SLIPPAGE_PCT must be a number")?;
        }
        if let Ok(multiplier) = std::env::var("DCA_GAS_LIMIT_MULTIPLIER") {
            engine.gas_limit_multiplier = multiplier
                .parse()
                .context("DCA_GAS_LIMIT_MULTIPLIER must be a number")?;
        }
        if let Ok(secs) = std::env::var("DCA_POLL_INTERVAL_SECS") {
            engine.poll_interval =
                Duration::from_secs(secs.parse().context("DCA_POLL_INTERVAL_SECS must be an integer")?);
        }

        let privy = PrivyConfig {
            base_url: std::env::var("PRIVY_API_URL")
                .unwrap_or_else(|_| "https://auth.privy.io/api/v1".to_string()),
            app_id: std::env::var("PRIVY_APP_ID").context("PRIVY_APP_ID must be set")?,
            app_secret: std::env::var("PRIVY_APP_SECRET").context("PRIVY_APP_SECRET must be set")?,
            authorization_key_pem: std::env::var("PRIVY_AUTHORIZATION_KEY")
                .context("PRIVY_AUTHORIZATION_KEY must be set")?,
        };

        let aggregator = AggregatorConfig {
            base_url: std::env::var("INCH_API_URL")
                .unwrap_or_else(|_| "https://api.1inch.dev".to_string()),
            api_key: std::env::var("INCH_API_KEY").context("INCH_API_KEY must be set")?,
        };

        let notifier = NotifierConfig {
            endpoint: std::env::var("PUSH_ENDPOINT").context("PUSH_ENDPOINT must be set")?,
            channel: std::env::var("PUSH_CHANNEL").context("PUSH_CHANNEL must be set")?,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://dca-engine.db?mode=rwc".to_string());

        Ok(Self {
            network,
            engine,
            privy,
            aggregator,
            notifier,
            database_url,
        })
    }
}
