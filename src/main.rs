use dca_engine::{
    AppConfig, OneInchQuoteProvider, PrivySigner, PushChannelNotifier, RpcGateway,
    SqlStrategyStore, TradeExecutor,
};
use eyre::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(chain_id = config.network.chain_id, "dca-engine starting");

    let rpc_url = config
        .network
        .rpc_url
        .parse()
        .context("Invalid RPC URL")?;
    let chain = RpcGateway::new(rpc_url);
    let signer = PrivySigner::new(&config.privy)?;
    let quotes = OneInchQuoteProvider::new(
        &config.aggregator.base_url,
        &config.aggregator.api_key,
        config.network.chain_id,
    );
    let store = SqlStrategyStore::connect(&config.database_url)
        .await
        .context("Failed to open strategy store")?;
    let notifier = PushChannelNotifier::new(&config.notifier);

    let executor = TradeExecutor::new(
        chain,
        signer,
        quotes,
        store,
        notifier,
        config.network,
        config.engine,
    );

    tokio::select! {
        _ = executor.run() => {}
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("dca-engine stopped");
    Ok(())
}
