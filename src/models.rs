// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::converter::round_usd;

/// Balance in a chain's smallest unit (satoshi, wei, ...)
pub type RawBalance = u128;

/// Ledgers a user can track. Anything else parses to `Unsupported`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Blockchain {
    Bitcoin,
    Ethereum,
    Dogecoin,
    Litecoin,
    BitcoinCash,
    Unsupported(String),
}

impl Blockchain {
    pub const SUPPORTED: [Blockchain; 5] = [
        Blockchain::Bitcoin,
        Blockchain::Ethereum,
        Blockchain::Dogecoin,
        Blockchain::Litecoin,
        Blockchain::BitcoinCash,
    ];

    /// Case-insensitive, no whitespace trimming; never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "bitcoin" => Blockchain::Bitcoin,
            "ethereum" => Blockchain::Ethereum,
            "dogecoin" => Blockchain::Dogecoin,
            "litecoin" => Blockchain::Litecoin,
            "bitcoin-cash" => Blockchain::BitcoinCash,
            other => Blockchain::Unsupported(other.to_string()),
        }
    }

    /// Lowercase identifier, also used as the provider path segment
    pub fn as_str(&self) -> &str {
        match self {
            Blockchain::Bitcoin => "bitcoin",
            Blockchain::Ethereum => "ethereum",
            Blockchain::Dogecoin => "dogecoin",
            Blockchain::Litecoin => "litecoin",
            Blockchain::BitcoinCash => "bitcoin-cash",
            Blockchain::Unsupported(id) => id,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Blockchain::Unsupported(_))
    }

    pub fn display_name(&self) -> &str {
        match self {
            Blockchain::Bitcoin => "Bitcoin",
            Blockchain::Ethereum => "Ethereum",
            Blockchain::Dogecoin => "Dogecoin",
            Blockchain::Litecoin => "Litecoin",
            Blockchain::BitcoinCash => "Bitcoin Cash",
            Blockchain::Unsupported(id) => id,
        }
    }

    pub fn symbol(&self) -> String {
        match self {
            Blockchain::Bitcoin => "BTC".into(),
            Blockchain::Ethereum => "ETH".into(),
            Blockchain::Dogecoin => "DOGE".into(),
            Blockchain::Litecoin => "LTC".into(),
            Blockchain::BitcoinCash => "BCH".into(),
            Blockchain::Unsupported(id) => id.to_uppercase(),
        }
    }
}

impl From<String> for Blockchain {
    fn from(raw: String) -> Self {
        Blockchain::parse(&raw)
    }
}

impl From<Blockchain> for String {
    fn from(chain: Blockchain) -> Self {
        chain.as_str().to_string()
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One wallet address tracked by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: Uuid,
    pub blockchain: Blockchain,
    pub address: String,
}

/// Unvalidated request to track an address
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAddress {
    #[serde(default)]
    pub blockchain: String,
    #[serde(default)]
    pub address: String,
}

/// Outcome of a single address lookup within one aggregation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AddressResult {
    Success {
        id: Uuid,
        blockchain: Blockchain,
        address: String,
        balance: Decimal, // main unit (BTC, ETH, ...)
        #[serde(rename = "balanceRaw", serialize_with = "as_string")]
        balance_raw: RawBalance,
        #[serde(rename = "estimatedValueUSD", serialize_with = "as_usd")]
        estimated_value_usd: Decimal,
        #[serde(rename = "lastUpdated")]
        last_updated: DateTime<Utc>,
    },
    Failure {
        id: Uuid,
        blockchain: Blockchain,
        address: String,
        error: String,
    },
}

impl AddressResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AddressResult::Success { .. })
    }

    /// Zero for failures
    pub fn estimated_value_usd(&self) -> Decimal {
        match self {
            AddressResult::Success { estimated_value_usd, .. } => *estimated_value_usd,
            AddressResult::Failure { .. } => Decimal::ZERO,
        }
    }
}

/// Aggregated view of all of a user's addresses
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    #[serde(rename = "portfolio")]
    pub results: Vec<AddressResult>,
    #[serde(rename = "totalPortfolioValueUSD", serialize_with = "as_usd")]
    pub total_value_usd: Decimal, // already rounded to cents
    #[serde(rename = "lastUpdated")]
    pub generated_at: DateTime<Utc>,
}

fn as_usd<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format!("{:.2}", round_usd(*value)))
}

fn as_string<S: Serializer>(value: &RawBalance, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
