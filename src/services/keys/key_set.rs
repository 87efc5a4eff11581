use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};

use super::KeyError;

/// A single admitted verification key.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: String,
    pub key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Keys of the pinned algorithm family, in the order the provider published them.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub algorithm: Algorithm,
    pub keys: Vec<VerificationKey>,
    pub fetched_at: DateTime<Utc>,
}

impl KeySet {
    /// Admit the keys of `jwks` that can verify `algorithm` tokens.
    ///
    /// Keys without `kid`, encryption keys and keys of another family are
    /// skipped. A set with nothing left is an error: an empty KeySet would
    /// reject every token.
    pub fn from_jwks(
        jwks: &JwkSet,
        algorithm: Algorithm,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, KeyError> {
        let mut keys = Vec::with_capacity(jwks.keys.len());

        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::warn!("skipping jwk without kid");
                continue;
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                tracing::debug!(kid, "skipping encryption jwk");
                continue;
            }
            if !matches_algorithm(jwk, algorithm) {
                tracing::warn!(kid, ?algorithm, "skipping jwk of another algorithm family");
                continue;
            }
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push(VerificationKey {
                    kid: kid.to_string(),
                    key,
                }),
                Err(err) => tracing::warn!(kid, error = %err, "skipping unusable jwk"),
            }
        }

        if keys.is_empty() {
            return Err(KeyError::Empty(algorithm));
        }

        Ok(Self {
            algorithm,
            keys,
            fetched_at,
        })
    }

    pub fn find(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// A declared `alg` must agree with the pinned one; the key type and curve must
// always agree.
fn matches_algorithm(jwk: &Jwk, algorithm: Algorithm) -> bool {
    if let Some(key_alg) = &jwk.common.key_algorithm {
        let same = matches!(
            (key_alg, algorithm),
            (KeyAlgorithm::ES256, Algorithm::ES256)
                | (KeyAlgorithm::RS256, Algorithm::RS256)
                | (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
        );
        if !same {
            return false;
        }
    }

    match (&jwk.algorithm, algorithm) {
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            params.curve == EllipticCurve::P256
        }
        (AlgorithmParameters::RSA(_), Algorithm::RS256) => true,
        (AlgorithmParameters::OctetKeyPair(params), Algorithm::EdDSA) => {
            params.curve == EllipticCurve::Ed25519
        }
        _ => false,
    }
}
