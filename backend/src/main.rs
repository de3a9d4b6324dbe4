//! Backend entry-point: wires configuration, storage, providers, the
//! reconciliation worker, and the HTTP server.

use std::sync::Arc;

use actix_web::web;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use backend::domain::ports::ProviderRegistry;
use backend::inbound::http::health::HealthState;
use backend::outbound::persistence::{DbPool, PoolConfig};
use ortho_config::OrthoConfig;
use backend::outbound::providers::{
    AirtelMoneyCredentials, AirtelMoneyProvider, MtnMomoCredentials, MtnMomoProvider,
};
use backend::server::{PortalSettings, ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = PortalSettings::load()
        .map_err(|e| std::io::Error::other(format!("failed to load configuration: {e}")))?;

    let mut config = ServerConfig::new(settings.bind_addr())
        .with_rate_limit(
            settings.rate_limit_window(),
            settings.rate_limit_max_attempts(),
        )
        .with_providers(build_provider_registry(&settings)?);

    if let Some(url) = settings.database_url.as_deref() {
        let pool = DbPool::new(PoolConfig::new(url))
            .await
            .map_err(|e| std::io::Error::other(format!("failed to build database pool: {e}")))?;
        config = config.with_db_pool(pool);
    } else {
        warn!("no database configured; falling back to in-memory adapters");
    }

    let health_state = web::Data::new(HealthState::new());
    let (server, worker) = create_server(health_state, config)?;

    let interval = settings.reconcile_interval();
    tokio::spawn(async move { worker.run(interval).await });

    server.await
}

fn parse_endpoint(raw: &str, provider: &str) -> std::io::Result<Url> {
    Url::parse(raw)
        .map_err(|e| std::io::Error::other(format!("invalid {provider} endpoint {raw:?}: {e}")))
}

/// Register an adapter for each provider whose endpoint is configured.
fn build_provider_registry(settings: &PortalSettings) -> std::io::Result<ProviderRegistry> {
    let timeout = settings.provider_timeout();
    let mut registry = ProviderRegistry::default();

    if let Some(raw) = settings.mtn_endpoint.as_deref() {
        let endpoint = parse_endpoint(raw, "MTN MoMo")?;
        let credentials = MtnMomoCredentials {
            subscription_key: settings.mtn_subscription_key.clone().unwrap_or_default(),
            target_environment: settings
                .mtn_target_environment
                .clone()
                .unwrap_or_else(|| "sandbox".to_owned()),
            access_token: settings.mtn_access_token.clone().unwrap_or_default(),
        };
        let provider = MtnMomoProvider::new(endpoint, timeout, credentials)
            .map_err(|e| std::io::Error::other(format!("MTN MoMo client build failed: {e}")))?;
        registry = registry.with(Arc::new(provider));
    }

    if let Some(raw) = settings.airtel_endpoint.as_deref() {
        let endpoint = parse_endpoint(raw, "Airtel Money")?;
        let credentials = AirtelMoneyCredentials {
            access_token: settings.airtel_access_token.clone().unwrap_or_default(),
            country: settings.airtel_country.clone().unwrap_or_default(),
        };
        let provider = AirtelMoneyProvider::new(endpoint, timeout, credentials)
            .map_err(|e| std::io::Error::other(format!("Airtel Money client build failed: {e}")))?;
        registry = registry.with(Arc::new(provider));
    }

    Ok(registry)
}
