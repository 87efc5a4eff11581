pub mod access_jwt;
pub mod factory;

pub use access_jwt::{TokenError, TokenErrorKind, TokenVerifier, VerifiedToken, VerifierSettings};
pub use factory::{build_key_cache, build_token_verifier};
