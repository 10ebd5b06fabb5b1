// src/fetcher.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Blockchain, RawBalance};

pub const DEFAULT_BASE_URL: &str = "https://api.blockchair.com";

/// Why a balance could not be read. The aggregator treats every variant alike.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider answered HTTP {0}")]
    Status(StatusCode),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("no balance data for {0}")]
    NoData(String),
}

/// Source of raw on-chain balances
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn fetch_balance(
        &self,
        blockchain: &Blockchain,
        address: &str,
    ) -> Result<RawBalance, FetchError>;
}

/// Blockchair address-dashboard client
#[derive(Debug, Clone)]
pub struct BlockchairClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl BlockchairClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> eyre::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// `{base}/{blockchain}/dashboards/address/{address}[?key=..]`
    pub fn dashboard_url(&self, blockchain: &Blockchain, address: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([blockchain.as_str(), "dashboards", "address", address]);
        }
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        url
    }
}

#[async_trait]
impl BalanceProvider for BlockchairClient {
    async fn fetch_balance(
        &self,
        blockchain: &Blockchain,
        address: &str,
    ) -> Result<RawBalance, FetchError> {
        let url = self.dashboard_url(blockchain, address);
        info!("📡 Fetching {} balance for {}", blockchain, address);

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let text = resp.text().await?;
        debug!("📩 Raw dashboard response: {}", text);

        let parsed: Value =
            serde_json::from_str(&text).map_err(|_| FetchError::NoData(address.to_string()))?;

        extract_balance(&parsed, address).ok_or_else(|| FetchError::NoData(address.to_string()))
    }
}

/// Read `data.<address>.address.balance` from a dashboard response.
///
/// The balance may be a JSON integer or a string of digits (wei overflow JSON numbers).
pub fn extract_balance(response: &Value, address: &str) -> Option<RawBalance> {
    let data = response.get("data")?.as_object()?;

    // hex addresses come back lowercased
    let entry = data.get(address).or_else(|| {
        data.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(address))
            .map(|(_, v)| v)
    })?;

    match entry.get("address")?.get("balance")? {
        Value::Number(n) => n.as_u64().map(RawBalance::from),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, RawQuery, State},
        http::StatusCode as HttpStatus,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Map};
    use std::sync::{Arc, Mutex};

    type SeenQueries = Arc<Mutex<Vec<Option<String>>>>;

    /// Stand-in dashboard endpoint: `broken` answers 500, `garbled` answers HTML,
    /// anything else holds 1 BTC. Records each query string.
    async fn dashboard(
        Path((_chain, address)): Path<(String, String)>,
        RawQuery(query): RawQuery,
        State(seen): State<SeenQueries>,
    ) -> Response {
        seen.lock().unwrap().push(query);
        match address.as_str() {
            "broken" => HttpStatus::INTERNAL_SERVER_ERROR.into_response(),
            "garbled" => "<html>rate limited</html>".into_response(),
            _ => {
                let mut data = Map::new();
                data.insert(address.clone(), json!({ "address": { "balance": 100000000 } }));
                Json(json!({ "data": data })).into_response()
            }
        }
    }

    async fn spawn_dashboard() -> (String, SeenQueries) {
        let seen: SeenQueries = Arc::default();
        let app = Router::new()
            .route("/:chain/dashboards/address/:address", get(dashboard))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    fn client_at(base: &str, key: Option<&str>) -> BlockchairClient {
        BlockchairClient::new(base, key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    fn client(key: Option<&str>) -> BlockchairClient {
        BlockchairClient::new(
            "https://api.blockchair.com",
            key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn url_without_key_has_no_query() {
        let url = client(None).dashboard_url(&Blockchain::BitcoinCash, "qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a");
        assert_eq!(
            url.as_str(),
            "https://api.blockchair.com/bitcoin-cash/dashboards/address/qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a"
        );
    }

    #[test]
    fn url_carries_api_key() {
        let url = client(Some("secret")).dashboard_url(&Blockchain::Bitcoin, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
        assert_eq!(url.path(), "/bitcoin/dashboards/address/1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
        assert_eq!(url.query(), Some("key=secret"));
    }

    #[test]
    fn url_escapes_address_segment() {
        let url = client(None).dashboard_url(&Blockchain::Litecoin, "a/b");
        assert_eq!(url.path(), "/litecoin/dashboards/address/a%2Fb");
    }

    #[test]
    fn extracts_numeric_balance() {
        let body = json!({
            "data": { "addrA": { "address": { "balance": 100000000, "type": "pubkeyhash" } } },
            "context": { "code": 200 }
        });
        assert_eq!(extract_balance(&body, "addrA"), Some(100_000_000));
    }

    #[test]
    fn extracts_string_balance_beyond_u64() {
        let body = json!({
            "data": { "0xabc": { "address": { "balance": "123456789012345678901234" } } }
        });
        assert_eq!(
            extract_balance(&body, "0xABC"),
            Some(123_456_789_012_345_678_901_234)
        );
    }

    #[test]
    fn missing_or_malformed_data_is_none() {
        assert_eq!(extract_balance(&json!({}), "a"), None);
        assert_eq!(extract_balance(&json!({ "data": [] }), "a"), None);
        assert_eq!(extract_balance(&json!({ "data": { "b": {} } }), "a"), None);
        assert_eq!(
            extract_balance(&json!({ "data": { "a": { "address": {} } } }), "a"),
            None
        );
        assert_eq!(
            extract_balance(&json!({ "data": { "a": { "address": { "balance": -5 } } } }), "a"),
            None
        );
        assert_eq!(
            extract_balance(&json!({ "data": { "a": { "address": { "balance": "12.5" } } } }), "a"),
            None
        );
    }

    #[tokio::test]
    async fn fetches_balance_over_http() {
        let (base, seen) = spawn_dashboard().await;
        let raw = client_at(&base, None)
            .fetch_balance(&Blockchain::Bitcoin, "1BoatSLRHtKNngkdXEeobR76b53LETtpyT")
            .await
            .unwrap();

        assert_eq!(raw, 100_000_000);
        assert_eq!(*seen.lock().unwrap(), vec![None::<String>]);
    }

    #[tokio::test]
    async fn api_key_is_sent_only_when_present() {
        let (base, seen) = spawn_dashboard().await;

        client_at(&base, Some("secret"))
            .fetch_balance(&Blockchain::Litecoin, "L1")
            .await
            .unwrap();
        client_at(&base, Some(""))
            .fetch_balance(&Blockchain::Litecoin, "L1")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].as_deref(), Some("key=secret"));
        assert_eq!(seen[1], None);
    }

    #[tokio::test]
    async fn server_error_is_status_failure() {
        let (base, _) = spawn_dashboard().await;
        let err = client_at(&base, None)
            .fetch_balance(&Blockchain::Bitcoin, "broken")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn non_json_body_is_no_data() {
        let (base, _) = spawn_dashboard().await;
        let err = client_at(&base, None)
            .fetch_balance(&Blockchain::Bitcoin, "garbled")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NoData(ref a) if a == "garbled"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_failure() {
        // bind then drop so the port is closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_at(&format!("http://{addr}"), None)
            .fetch_balance(&Blockchain::Ethereum, "0xabc")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }
}
