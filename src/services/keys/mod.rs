/*!
 * Verification key material
 *
 * Responsibility:
 * - Fetch the identity provider's JWKS (discovery)
 * - Hold the current KeySet behind a read-mostly lock (cache)
 * - Refresh on schedule and on rotation hints, keeping the last good set on failure
 */
mod cache;
mod discovery;
mod key_set;

pub use cache::KeyMaterialCache;
pub use discovery::{HttpKeyDiscovery, KeyDiscovery};
pub use key_set::{KeySet, VerificationKey};

use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key discovery request failed: {0}")]
    Http(reqwest::Error),
    #[error("key discovery timed out")]
    Timeout,
    #[error("key set contains no usable {0:?} keys")]
    Empty(Algorithm),
}

impl From<reqwest::Error> for KeyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}
