//! Server configuration: environment-driven settings and the runtime
//! configuration object the server is constructed from.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::ports::ProviderRegistry;
use crate::outbound::persistence::DbPool;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RECONCILE_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Settings loaded via OrthoConfig from environment, file, and CLI layers.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PORTAL")]
pub struct PortalSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection URL. When absent the server runs on in-memory
    /// adapters, which is only useful for local development.
    pub database_url: Option<String>,
    /// Length of the brute-force throttle window in seconds.
    pub rate_limit_window_seconds: Option<u64>,
    /// Attempts admitted per identifier and device within one window.
    pub rate_limit_max_attempts: Option<u32>,
    /// Pause between reconciliation sweeps in seconds.
    pub reconcile_interval_seconds: Option<u64>,
    /// Request timeout for provider HTTP calls in seconds.
    pub provider_timeout_seconds: Option<u64>,
    /// MTN MoMo collections endpoint. The adapter is only registered when
    /// this is set.
    pub mtn_endpoint: Option<String>,
    /// MTN MoMo collections subscription key.
    pub mtn_subscription_key: Option<String>,
    /// MTN MoMo target environment.
    pub mtn_target_environment: Option<String>,
    /// MTN MoMo bearer token.
    pub mtn_access_token: Option<String>,
    /// Airtel Money API endpoint. The adapter is only registered when this
    /// is set.
    pub airtel_endpoint: Option<String>,
    /// Airtel Money bearer token.
    pub airtel_access_token: Option<String>,
    /// Airtel Money operating market country code.
    pub airtel_country: Option<String>,
}

impl PortalSettings {
    /// Return the configured bind address, falling back to the default.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Return the throttle window as a duration.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(
            self.rate_limit_window_seconds
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
        )
    }

    /// Return the per-window attempt budget.
    pub fn rate_limit_max_attempts(&self) -> u32 {
        self.rate_limit_max_attempts
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_ATTEMPTS)
    }

    /// Return the sweep interval as a duration.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(
            self.reconcile_interval_seconds
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECONDS),
        )
    }

    /// Return the provider request timeout as a duration.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(
            self.provider_timeout_seconds
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
        )
    }
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: String,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) providers: ProviderRegistry,
    pub(crate) rate_limit_window: Duration,
    pub(crate) rate_limit_max_attempts: u32,
}

impl ServerConfig {
    /// Construct a server configuration binding to `bind_addr` with default
    /// throttle settings and no registered providers.
    #[must_use]
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            db_pool: None,
            providers: ProviderRegistry::default(),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_MAX_ATTEMPTS,
        }
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// When provided, the server uses database-backed repositories;
    /// otherwise it falls back to the in-memory adapters.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Attach the mobile-money provider registry.
    #[must_use]
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Override the brute-force throttle parameters.
    #[must_use]
    pub fn with_rate_limit(mut self, window: Duration, max_attempts: u32) -> Self {
        self.rate_limit_window = window;
        self.rate_limit_max_attempts = max_attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> PortalSettings {
        PortalSettings::load_from_iter([OsString::from("backend")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("PORTAL_BIND_ADDR", None::<String>),
            ("PORTAL_DATABASE_URL", None::<String>),
            ("PORTAL_RATE_LIMIT_WINDOW_SECONDS", None::<String>),
            ("PORTAL_RATE_LIMIT_MAX_ATTEMPTS", None::<String>),
            ("PORTAL_RECONCILE_INTERVAL_SECONDS", None::<String>),
            ("PORTAL_PROVIDER_TIMEOUT_SECONDS", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr(), DEFAULT_BIND_ADDR);
        assert!(settings.database_url.is_none());
        assert_eq!(settings.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(settings.rate_limit_max_attempts(), 10);
        assert_eq!(settings.reconcile_interval(), Duration::from_secs(30));
        assert_eq!(settings.provider_timeout(), Duration::from_secs(10));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("PORTAL_BIND_ADDR", Some("127.0.0.1:9090".to_owned())),
            (
                "PORTAL_DATABASE_URL",
                Some("postgres://localhost/portal".to_owned()),
            ),
            ("PORTAL_RATE_LIMIT_WINDOW_SECONDS", Some("120".to_owned())),
            ("PORTAL_RATE_LIMIT_MAX_ATTEMPTS", Some("3".to_owned())),
            ("PORTAL_RECONCILE_INTERVAL_SECONDS", Some("5".to_owned())),
            ("PORTAL_PROVIDER_TIMEOUT_SECONDS", Some("2".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr(), "127.0.0.1:9090");
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/portal")
        );
        assert_eq!(settings.rate_limit_window(), Duration::from_secs(120));
        assert_eq!(settings.rate_limit_max_attempts(), 3);
        assert_eq!(settings.reconcile_interval(), Duration::from_secs(5));
        assert_eq!(settings.provider_timeout(), Duration::from_secs(2));
    }
}
