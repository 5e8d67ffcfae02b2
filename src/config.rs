use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;

pub const DEFAULT_SNIPPET_RADIUS: usize = 50;
pub const DEFAULT_PREFETCH_PAGES: usize = 1;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        snippet_radius: get_env_or_default("FOLIO_SNIPPET_RADIUS", DEFAULT_SNIPPET_RADIUS),
        prefetch_pages: get_env_or_default("FOLIO_PREFETCH_PAGES", DEFAULT_PREFETCH_PAGES).max(1),
        log_level: get_env_or_default("FOLIO_LOG_LEVEL", tracing::Level::INFO),
    }
});

#[derive(Debug, Clone)]
pub struct Config {
    /// Characters of context kept on each side of a match.
    pub snippet_radius: usize,
    /// Pages whose text may be requested ahead of the page being scanned.
    pub prefetch_pages: usize,
    pub log_level: tracing::Level,
}

fn get_env_or_default<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring invalid value for {key}: {raw:?}");
            default
        }),
        Err(_) => default,
    }
}
