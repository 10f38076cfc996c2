use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub geo: GeoConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Distance from the seller's home coordinate beyond which a sale is a
    /// roaming candidate.
    pub roaming_threshold_meters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, specific env vars override.
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        if let Ok(v) = env::var("GEO_ROAMING_THRESHOLD_M") {
            self.geo.roaming_threshold_meters =
                v.parse().unwrap_or(self.geo.roaming_threshold_meters);
        }

        if let Ok(v) = env::var("ENRICHMENT_ENABLED") {
            self.enrichment.enabled = v.parse().unwrap_or(self.enrichment.enabled);
        }
        if let Ok(v) = env::var("ENRICHMENT_BASE_URL") {
            self.enrichment.base_url = v;
        }
        if let Ok(v) = env::var("ENRICHMENT_TIMEOUT_SECS") {
            self.enrichment.timeout_secs = v.parse().unwrap_or(self.enrichment.timeout_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig { max_connections: 10, connection_timeout: 30 },
            security: SecurityConfig {
                jwt_secret: "dev-secret".to_string(),
                jwt_expiry_hours: 24,
                enable_cors: true,
            },
            geo: GeoConfig { roaming_threshold_meters: 100.0 },
            enrichment: EnrichmentConfig {
                enabled: true,
                base_url: "http://ip-api.com".to_string(),
                timeout_secs: 5,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig { max_connections: 25, connection_timeout: 10 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: true,
            },
            geo: GeoConfig { roaming_threshold_meters: 100.0 },
            enrichment: EnrichmentConfig {
                enabled: true,
                base_url: "http://ip-api.com".to_string(),
                timeout_secs: 5,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig { max_connections: 50, connection_timeout: 5 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                enable_cors: false,
            },
            geo: GeoConfig { roaming_threshold_meters: 100.0 },
            enrichment: EnrichmentConfig {
                enabled: true,
                base_url: "http://ip-api.com".to_string(),
                timeout_secs: 3,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
