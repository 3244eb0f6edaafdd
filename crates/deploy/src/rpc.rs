//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(quantity: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(quantity.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity: {quantity}"))
}

/// Fetch the chain id served by `url`.
pub async fn fetch_chain_id(url: &Url) -> Result<u64, anyhow::Error> {
    let client = create_client()?;
    let chain_id: String = json_rpc_call(&client, url, "eth_chainId", vec![]).await?;
    parse_quantity(&chain_id)
}

/// Fail unless the endpoint at `url` serves chain `expected`.
///
/// Journals are keyed by network name, so a network name pointing at the
/// wrong chain would make previous deployments look present (or absent).
pub async fn ensure_chain_id(url: &Url, expected: u64) -> Result<(), anyhow::Error> {
    let actual = fetch_chain_id(url)
        .await
        .with_context(|| format!("Failed to query chain id from {url}"))?;

    if actual != expected {
        anyhow::bail!(
            "RPC endpoint {} serves chain id {}, but the network is configured for chain id {}",
            url,
            actual,
            expected
        );
    }

    tracing::debug!(url = %url, chain_id = actual, "Chain id verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x7a69").unwrap(), 31337);
        assert_eq!(parse_quantity("0xaa36a7").unwrap(), 11155111);
        assert!(parse_quantity("0xzz").is_err());
    }
}
