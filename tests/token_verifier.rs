mod common;

use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde_json::json;

use access_gate::services::auth::{TokenError, TokenErrorKind, TokenVerifier, VerifierSettings};
use common::{ScriptedDiscovery, TestKey, claims, jwks, load_keys, now};

async fn verifier_for(key: &TestKey) -> TokenVerifier {
    let keys = load_keys(ScriptedDiscovery::serving(jwks(&[key])), Duration::from_secs(30)).await;
    TokenVerifier::new(
        keys,
        VerifierSettings {
            algorithm: Algorithm::EdDSA,
            audience: "authenticated".to_string(),
            issuer: None,
            leeway_seconds: 0,
        },
    )
}

#[tokio::test]
async fn valid_token_yields_subject() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let verified = verifier.verify(&key.token_for("subject-1")).await.unwrap();

    assert_eq!(verified.subject, "subject-1");
    assert_eq!(verified.key_id, "k1");
}

#[tokio::test]
async fn tampered_signature_is_invalid_signature() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let token = key.token_for("subject-1");
    let (signed, sig) = token.rsplit_once('.').unwrap();
    let flipped = if sig.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{signed}.{flipped}{}", &sig[1..]);

    let err = verifier.verify(&tampered).await.unwrap_err();
    assert_eq!(err, TokenError::InvalidSignature);
    assert_eq!(err.kind(), TokenErrorKind::InvalidSignature);
}

#[tokio::test]
async fn tampered_claims_are_invalid_signature_even_if_plausible() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let original = key.token_for("subject-1");
    let forged = key.token_for("admin");
    let (o_header, rest) = original.split_once('.').unwrap();
    let (_, o_sig) = rest.split_once('.').unwrap();
    let f_claims = forged.split('.').nth(1).unwrap();

    let spliced = format!("{o_header}.{f_claims}.{o_sig}");
    let err = verifier.verify(&spliced).await.unwrap_err();
    assert_eq!(err.kind(), TokenErrorKind::InvalidSignature);
}

#[tokio::test]
async fn signature_from_another_key_is_rejected() {
    let key = TestKey::new("k1", 1);
    let impostor = TestKey::new("k1", 9);
    let verifier = verifier_for(&key).await;

    let err = verifier.verify(&impostor.token_for("s")).await.unwrap_err();
    assert_eq!(err, TokenError::InvalidSignature);
}

#[tokio::test]
async fn missing_alg_is_reported() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let token = key.sign(&json!({"typ": "JWT", "kid": "k1"}), &claims("s", 3600));
    let err = verifier.verify(&token).await.unwrap_err();

    assert_eq!(err, TokenError::MissingAlg);
    assert_eq!(err.kind(), TokenErrorKind::MissingAlg);
}

#[tokio::test]
async fn foreign_algorithm_is_unsupported() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    for alg in ["HS256", "RS256", "none"] {
        let token = key.sign(&json!({"alg": alg, "kid": "k1"}), &claims("s", 3600));
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(
            matches!(err, TokenError::UnsupportedAlgorithm(_)),
            "{alg}: {err:?}"
        );
        assert_eq!(err.kind(), TokenErrorKind::InvalidSignature);
    }
}

#[tokio::test]
async fn missing_kid_is_rejected() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let token = key.sign(&json!({"alg": "EdDSA"}), &claims("s", 3600));
    assert_eq!(verifier.verify(&token).await.unwrap_err(), TokenError::MissingKeyId);
}

#[tokio::test]
async fn expired_token_is_expired() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let token = key.sign(&key.header(), &claims("s", -600));
    let err = verifier.verify(&token).await.unwrap_err();

    assert_eq!(err, TokenError::Expired);
    assert_eq!(err.kind(), TokenErrorKind::Expired);
}

#[tokio::test]
async fn blank_or_absent_subject_is_missing_subject() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let blank = key.sign(&key.header(), &claims("   ", 3600));
    assert_eq!(verifier.verify(&blank).await.unwrap_err(), TokenError::MissingSubject);

    let absent = key.sign(
        &key.header(),
        &json!({"aud": "authenticated", "exp": now() + 3600}),
    );
    let err = verifier.verify(&absent).await.unwrap_err();
    assert_eq!(err, TokenError::MissingSubject);
    assert_eq!(err.kind(), TokenErrorKind::MissingSubject);
}

#[tokio::test]
async fn wrong_audience_is_rejected() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    let token = key.sign(
        &key.header(),
        &json!({"sub": "s", "aud": "service_role", "exp": now() + 3600}),
    );
    let err = verifier.verify(&token).await.unwrap_err();
    assert!(matches!(err, TokenError::InvalidClaims(_)), "{err:?}");
}

#[tokio::test]
async fn garbage_is_malformed() {
    let key = TestKey::new("k1", 1);
    let verifier = verifier_for(&key).await;

    assert_eq!(verifier.verify("not-a-token").await.unwrap_err(), TokenError::Malformed);
}
