pub mod app;
pub mod database;

use std::env;
use std::str::FromStr;

pub use app::AppConfig;
pub use database::{run_migrations, DatabaseConfig};

/// Reads `key`, falling back to `default` when unset or unparsable.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            default
        }),
        Err(_) => default,
    }
}
