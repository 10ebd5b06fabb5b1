// src/aggregator.rs
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::converter::{convert, round_usd};
use crate::fetcher::{BalanceProvider, FetchError};
use crate::models::{AddressEntry, AddressResult, PortfolioReport, RawBalance};

pub const FETCH_FAILED_MESSAGE: &str = "Unable to fetch data for this address";

/// Builds portfolio reports from a user's address set
#[derive(Clone)]
pub struct Aggregator {
    provider: Arc<dyn BalanceProvider>,
    lookup_timeout: Duration,
    max_concurrent_lookups: usize,
}

impl Aggregator {
    pub fn new(
        provider: Arc<dyn BalanceProvider>,
        lookup_timeout: Duration,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            provider,
            lookup_timeout,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
        }
    }

    /// Look up every address and total the estimates.
    ///
    /// Never fails: a lookup error becomes a `Failure` result worth zero. Results keep
    /// the input order even though lookups overlap.
    pub async fn build_portfolio(&self, entries: &[AddressEntry]) -> PortfolioReport {
        // each lookup owns its entry; handler futures must be Send + 'static
        let results: Vec<AddressResult> = stream::iter(entries.iter().cloned())
            .map(|entry| {
                let this = self.clone();
                async move {
                    let outcome = this.lookup(&entry).await;
                    to_result(&entry, outcome)
                }
            })
            .buffered(self.max_concurrent_lookups)
            .collect()
            .await;

        let total: Decimal = results
            .iter()
            .map(AddressResult::estimated_value_usd)
            .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v));

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            "💼 Portfolio built: {}/{} addresses priced, total ${}",
            succeeded,
            results.len(),
            round_usd(total)
        );

        PortfolioReport {
            results,
            total_value_usd: round_usd(total),
            generated_at: Utc::now(),
        }
    }

    async fn lookup(&self, entry: &AddressEntry) -> Result<RawBalance, FetchError> {
        let fetch = self.provider.fetch_balance(&entry.blockchain, &entry.address);
        match timeout(self.lookup_timeout, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout(self.lookup_timeout)),
        }
    }
}

fn to_result(entry: &AddressEntry, outcome: Result<RawBalance, FetchError>) -> AddressResult {
    match outcome {
        Ok(raw) => {
            let converted = convert(&entry.blockchain, raw);
            AddressResult::Success {
                id: entry.id,
                blockchain: entry.blockchain.clone(),
                address: entry.address.clone(),
                balance: converted.main_unit_amount,
                balance_raw: raw,
                estimated_value_usd: converted.estimated_value_usd,
                last_updated: Utc::now(),
            }
        }
        Err(e) => {
            warn!("Lookup failed for {} address {}: {}", entry.blockchain, entry.address, e);
            AddressResult::Failure {
                id: entry.id,
                blockchain: entry.blockchain.clone(),
                address: entry.address.clone(),
                error: FETCH_FAILED_MESSAGE.to_string(),
            }
        }
    }
}
