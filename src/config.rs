use dotenvy::dotenv;
use eyre::Result;
use std::{env, fmt, time::Duration};
use tracing::info;

use crate::fetcher::DEFAULT_BASE_URL;

/// Sample-env placeholder; treated as no key
const PLACEHOLDER_API_KEY: &str = "your_blockchair_api_key_here";

#[derive(Clone)]
pub struct Config {
    pub blockchair_url: String,
    pub blockchair_api_key: Option<String>,
    pub db_path: String,
    pub port: u16,
    pub lookup_timeout: Duration,
    pub max_concurrent_lookups: usize,
}

// keeps the API key out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("blockchair_url", &self.blockchair_url)
            .field("blockchair_api_key", &self.blockchair_api_key.as_ref().map(|_| "<redacted>"))
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("max_concurrent_lookups", &self.max_concurrent_lookups)
            .finish()
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // .env is optional

    let blockchair_url =
        env::var("BLOCKCHAIR_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    // absent key => unauthenticated requests
    let blockchair_api_key = normalize_api_key(env::var("BLOCKCHAIR_API_KEY").ok());

    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "portfolio.db".to_string());

    let port = parse_or(env::var("PORT").ok(), 5000);

    let lookup_timeout = Duration::from_secs(parse_or(env::var("LOOKUP_TIMEOUT_SECS").ok(), 10));

    let max_concurrent_lookups =
        parse_or::<usize>(env::var("MAX_CONCURRENT_LOOKUPS").ok(), 4).max(1);

    let cfg = Config {
        blockchair_url,
        blockchair_api_key,
        db_path,
        port,
        lookup_timeout,
        max_concurrent_lookups,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

fn normalize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}
