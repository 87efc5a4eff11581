/// Factory: build the token verifier and its key cache from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::auth::{TokenVerifier, VerifierSettings};
use crate::services::keys::{HttpKeyDiscovery, KeyError, KeyMaterialCache};

/// Fetches the key set once; an error here aborts startup.
pub async fn build_key_cache(config: &Config) -> Result<Arc<KeyMaterialCache>, KeyError> {
    let discovery = HttpKeyDiscovery::new(
        config.jwks_url.clone(),
        Duration::from_secs(config.jwks_fetch_timeout_seconds),
    )?;

    tracing::info!(url = %discovery.url(), "fetching verification keys");

    let cache = KeyMaterialCache::load(
        Arc::new(discovery),
        config.jwt_algorithm,
        Duration::from_secs(config.jwks_min_refresh_gap_seconds),
    )
    .await?;

    Ok(Arc::new(cache))
}

pub fn build_token_verifier(config: &Config, keys: Arc<KeyMaterialCache>) -> TokenVerifier {
    TokenVerifier::new(
        keys,
        VerifierSettings {
            algorithm: config.jwt_algorithm,
            audience: config.auth_audience.clone(),
            issuer: config.auth_issuer.clone(),
            leeway_seconds: config.access_token_leeway_seconds,
        },
    )
}
