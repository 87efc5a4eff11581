use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use url::Url;

use super::KeyError;

/// Source of the published verification keys.
#[async_trait]
pub trait KeyDiscovery: Send + Sync {
    async fn fetch_key_set(&self) -> Result<JwkSet, KeyError>;
}

/// JWKS endpoint over HTTP with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpKeyDiscovery {
    client: reqwest::Client,
    url: Url,
}

impl HttpKeyDiscovery {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, KeyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl KeyDiscovery for HttpKeyDiscovery {
    async fn fetch_key_set(&self) -> Result<JwkSet, KeyError> {
        let jwks = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;

        Ok(jwks)
    }
}
