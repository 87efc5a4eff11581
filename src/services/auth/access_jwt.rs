use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::services::keys::KeyMaterialCache;

/// Why a bearer token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a well-formed JWS")]
    Malformed,
    #[error("token header has no 'alg'")]
    MissingAlg,
    #[error("token algorithm {0:?} is not accepted")]
    UnsupportedAlgorithm(String),
    #[error("token header has no 'kid'")]
    MissingKeyId,
    #[error("no verification key for kid {0:?}")]
    UnknownKey(String),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token claims rejected: {0}")]
    InvalidClaims(&'static str),
    #[error("token has no subject")]
    MissingSubject,
}

/// The four rejection classes callers are allowed to depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    MissingAlg,
    InvalidSignature,
    Expired,
    MissingSubject,
}

impl TokenError {
    /// Anything that fails before trust is established folds into `InvalidSignature`.
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::MissingAlg => TokenErrorKind::MissingAlg,
            Self::Expired => TokenErrorKind::Expired,
            Self::MissingSubject => TokenErrorKind::MissingSubject,
            Self::Malformed
            | Self::UnsupportedAlgorithm(_)
            | Self::MissingKeyId
            | Self::UnknownKey(_)
            | Self::InvalidSignature
            | Self::InvalidClaims(_) => TokenErrorKind::InvalidSignature,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                Self::UnsupportedAlgorithm(String::new())
            }
            ErrorKind::InvalidIssuer => Self::InvalidClaims("iss"),
            ErrorKind::InvalidAudience => Self::InvalidClaims("aud"),
            ErrorKind::ImmatureSignature => Self::InvalidClaims("nbf"),
            ErrorKind::InvalidSubject => Self::InvalidClaims("sub"),
            ErrorKind::MissingRequiredClaim(_) => Self::InvalidClaims("required claim missing"),
            _ => Self::Malformed,
        }
    }
}

// `From` cannot see the header; put the presented `alg` back into algorithm rejections.
fn decode_error(e: jsonwebtoken::errors::Error, alg: &str) -> TokenError {
    match TokenError::from(e) {
        TokenError::UnsupportedAlgorithm(_) => TokenError::UnsupportedAlgorithm(alg.to_string()),
        other => other,
    }
}

// Header fields read before any key lookup. `alg` stays optional so a missing
// value is reported as such instead of as a parse failure.
#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

fn read_header(token: &str) -> Result<RawHeader, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    exp: u64,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(default)]
    email: Option<String>,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub key_id: String,
    pub expires_at: u64,
    pub issued_at: Option<u64>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub algorithm: Algorithm,
    pub audience: String,
    pub issuer: Option<String>,
    pub leeway_seconds: u64,
}

/// Bearer token verifier pinned to one algorithm family.
///
/// - Keys come from the shared `KeyMaterialCache`; an unknown `kid` asks the
///   cache for a refresh and fails this attempt.
/// - The signature is checked before claims are trusted.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyMaterialCache>,
    algorithm: Algorithm,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyMaterialCache>, settings: VerifierSettings) -> Self {
        let mut validation = Validation::new(settings.algorithm);
        validation.set_audience(&[settings.audience.as_str()]);
        if let Some(issuer) = settings.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        validation.leeway = settings.leeway_seconds;

        Self {
            keys,
            algorithm: settings.algorithm,
            validation,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let header = read_header(token)?;

        let alg = header.alg.ok_or(TokenError::MissingAlg)?;
        match Algorithm::from_str(&alg) {
            Ok(parsed) if parsed == self.algorithm => {}
            _ => return Err(TokenError::UnsupportedAlgorithm(alg)),
        }

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(TokenError::MissingKeyId)?;

        let Some(key) = self.keys.get(&kid).await else {
            self.keys.request_refresh();
            return Err(TokenError::UnknownKey(kid));
        };

        let data = jsonwebtoken::decode::<AccessTokenClaims>(token, &key.key, &self.validation)
            .map_err(|e| decode_error(e, &alg))?;
        let claims = data.claims;

        let subject = claims
            .sub
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)?;

        Ok(VerifiedToken {
            subject,
            key_id: kid,
            expires_at: claims.exp,
            issued_at: claims.iat,
            email: claims.email,
        })
    }
}
