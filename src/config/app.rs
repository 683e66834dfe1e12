use anyhow::{bail, Result};
use std::env;

use super::env_or;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = AppConfig {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3001),
            environment: env_or("ENVIRONMENT", "development".to_string()),
            log_level: env_or("LOG_LEVEL", "info".to_string()),
            jwt_secret: env_or("JWT_SECRET", "your-secret-key-change-in-production".to_string()),
            jwt_ttl_hours: env_or("JWT_TTL_HOURS", 6),
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
        };

        if config.is_production() && env::var("JWT_SECRET").is_err() {
            bail!("JWT_SECRET must be set in production");
        }

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            jwt_ttl_hours: 6,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}
