//! Swap quote provider: 1inch aggregator client
//!
//! Turns a desired token swap into an executable transaction (target,
//! calldata, value). One attempt per trade cycle; retries happen naturally
//! on the next due-poll.

use crate::error::{EngineError, Result};
use alloy::primitives::{Address, Bytes, U256};
use std::time::Duration;

/// An executable swap returned by the aggregator.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    /// Contract to call (the aggregator router)
    pub to: Address,
    /// Encoded swap calldata
    pub data: Bytes,
    /// Native value to attach (non-zero when selling the native asset)
    pub value: U256,
    /// Expected destination amount, informational
    pub dst_amount: U256,
}

/// Trait for fetching executable swap quotes.
pub trait SwapQuoteProvider: Send + Sync {
    /// Quote a swap of `amount` of `src` into `dst`, executed by `from`,
    /// bounded by `slippage_pct` percent slippage.
    fn quote(
        &self,
        src: Address,
        dst: Address,
        amount: U256,
        from: Address,
        slippage_pct: f64,
    ) -> impl std::future::Future<Output = Result<SwapQuote>> + Send;
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    dst_amount: String,
    tx: SwapTransaction,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapTransaction {
    to: String,
    data: String,
    value: String,
    #[allow(dead_code)]
    #[serde(default)]
    gas: Option<u64>,
    #[allow(dead_code)]
    #[serde(default)]
    gas_price: Option<String>,
}

/// 1inch swap API client
pub struct OneInchQuoteProvider {
    base_url: String,
    api_key: String,
    chain_id: u64,
    client: reqwest::Client,
}

impl OneInchQuoteProvider {
    /// Create a new quote provider for one chain.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, chain_id: u64) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            chain_id,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .use_rustls_tls()
                .build()
                .unwrap(),
        }
    }

    fn swap_url(&self) -> String {
        format!("{}/swap/v6.0/{}/swap", self.base_url, self.chain_id)
    }
}

fn quote_err(err: impl std::fmt::Display) -> EngineError {
    EngineError::QuoteUnavailable(err.to_string())
}

impl SwapQuoteProvider for OneInchQuoteProvider {
    async fn quote(
        &self,
        src: Address,
        dst: Address,
        amount: U256,
        from: Address,
        slippage_pct: f64,
    ) -> Result<SwapQuote> {
        let response = self
            .client
            .get(self.swap_url())
            .bearer_auth(&self.api_key)
            .query(&[
                ("src", format!("{src:?}")),
                ("dst", format!("{dst:?}")),
                ("amount", amount.to_string()),
                ("from", format!("{from:?}")),
                ("origin", format!("{from:?}")),
                ("slippage", slippage_pct.to_string()),
                ("allowPartialFill", "false".to_string()),
                ("disableEstimate", "true".to_string()),
                ("usePermit2", "false".to_string()),
            ])
            .send()
            .await
            .map_err(quote_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::QuoteUnavailable(format!("{status} - {body}")));
        }

        let swap: SwapResponse = response.json().await.map_err(quote_err)?;
        swap.try_into()
    }
}

impl TryFrom<SwapResponse> for SwapQuote {
    type Error = EngineError;

    fn try_from(swap: SwapResponse) -> Result<SwapQuote> {
        Ok(SwapQuote {
            to: swap
                .tx
                .to
                .parse()
                .map_err(|e| EngineError::QuoteUnavailable(format!("bad tx.to: {e}")))?,
            data: swap
                .tx
                .data
                .parse()
                .map_err(|e| EngineError::QuoteUnavailable(format!("bad tx.data: {e}")))?,
            value: swap
                .tx
                .value
                .parse()
                .map_err(|e| EngineError::QuoteUnavailable(format!("bad tx.value: {e}")))?,
            dst_amount: swap
                .dst_amount
                .parse()
                .map_err(|e| EngineError::QuoteUnavailable(format!("bad dstAmount: {e}")))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_swap_response() {
        let json = r#"{
            "dstAmount": "123456789",
            "tx": {
                "from": "0x94af12b6eef0d6a746dcf5cee09dfa0f4b39cf42",
                "to": "0x111111125421ca6dc452d289314280a0f8842a65",
                "data": "0xdeadbeef",
                "value": "0",
                "gas": 250000,
                "gasPrice": "12000000"
            }
        }"#;

        let swap: SwapResponse = serde_json::from_str(json).unwrap();
        let quote: SwapQuote = swap.try_into().unwrap();

        assert_eq!(
            quote.to,
            "0x111111125421ca6dc452d289314280a0f8842a65"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(quote.data, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(quote.value, U256::ZERO);
        assert_eq!(quote.dst_amount, U256::from(123456789u64));
    }

    #[test]
    fn rejects_malformed_tx_target() {
        let json = r#"{
            "dstAmount": "1",
            "tx": { "to": "not-an-address", "data": "0x", "value": "0" }
        }"#;

        let swap: SwapResponse = serde_json::from_str(json).unwrap();
        let result: Result<SwapQuote> = swap.try_into();
        assert!(matches!(result, Err(EngineError::QuoteUnavailable(_))));
    }
}
