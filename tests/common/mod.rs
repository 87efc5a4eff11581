#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey};
use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::JwkSet;
use serde_json::{Value, json};
use uuid::Uuid;

use access_gate::app::{Stores, build_router, build_state};
use access_gate::config::Config;
use access_gate::model::{Identity, IdentityStatus, PermissionCode, Role, RoleScope};
use access_gate::repos::InMemoryStore;
use access_gate::services::PermissionCatalog;
use access_gate::services::keys::{KeyDiscovery, KeyError, KeyMaterialCache};
use access_gate::state::AppState;

pub struct TestKey {
    pub kid: String,
    signing: SigningKey,
}

impl TestKey {
    pub fn new(kid: &str, seed: u8) -> Self {
        Self {
            kid: kid.to_string(),
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(self.signing.verifying_key().as_bytes()),
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig",
        })
    }

    /// Compact JWS over arbitrary header/claims, so tests can build broken headers.
    pub fn sign(&self, header: &Value, claims: &Value) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap()),
        );
        let sig = self.signing.sign(input.as_bytes());
        format!("{}.{}", input, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
    }

    pub fn token_for(&self, sub: &str) -> String {
        self.sign(&self.header(), &claims(sub, 3600))
    }

    pub fn header(&self) -> Value {
        json!({"alg": "EdDSA", "typ": "JWT", "kid": self.kid})
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn claims(sub: &str, ttl: i64) -> Value {
    json!({
        "sub": sub,
        "aud": "authenticated",
        "iat": now(),
        "exp": now() + ttl,
    })
}

pub fn jwks(keys: &[&TestKey]) -> JwkSet {
    let keys: Vec<Value> = keys.iter().map(|k| k.jwk()).collect();
    serde_json::from_value(json!({ "keys": keys })).unwrap()
}

/// Key discovery that serves whatever the test last configured.
pub struct ScriptedDiscovery {
    current: Mutex<Option<JwkSet>>,
    calls: AtomicUsize,
}

impl ScriptedDiscovery {
    pub fn serving(set: JwkSet) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(set)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn serve(&self, set: JwkSet) {
        *self.current.lock().unwrap() = Some(set);
    }

    pub fn fail(&self) {
        *self.current.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyDiscovery for ScriptedDiscovery {
    async fn fetch_key_set(&self) -> Result<JwkSet, KeyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().clone().ok_or(KeyError::Timeout)
    }
}

pub fn config() -> Config {
    Config::from_lookup(|key| match key {
        "STORE_BACKEND" => Some("memory".to_string()),
        "AUTH_JWKS_URL" => Some("http://127.0.0.1:9/jwks.json".to_string()),
        "AUTH_JWT_ALGORITHM" => Some("EdDSA".to_string()),
        "STORE_TIMEOUT_MS" => Some("200".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn code(raw: &str) -> PermissionCode {
    PermissionCode::parse(raw).unwrap()
}

pub fn identity(subject: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        external_subject: subject.to_string(),
        email: format!("{subject}@example.com"),
        status: IdentityStatus::Active,
    }
}

pub fn role(code: &str) -> Role {
    Role {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: code.to_string(),
        scope: RoleScope::Global,
    }
}

pub async fn load_keys(discovery: Arc<ScriptedDiscovery>, gap: Duration) -> Arc<KeyMaterialCache> {
    Arc::new(
        KeyMaterialCache::load(discovery, Algorithm::EdDSA, gap)
            .await
            .unwrap(),
    )
}

/// U1: admin {MANAGE_USERS, VIEW_AUDIT}; U2: no roles; U3: role without permissions.
pub struct World {
    pub key: TestKey,
    pub store: Arc<InMemoryStore>,
    pub discovery: Arc<ScriptedDiscovery>,
    pub keys: Arc<KeyMaterialCache>,
    pub u1: Identity,
    pub u2: Identity,
    pub u3: Identity,
}

impl World {
    pub async fn new() -> Self {
        let key = TestKey::new("k1", 1);
        let discovery = ScriptedDiscovery::serving(jwks(&[&key]));
        let keys = load_keys(discovery.clone(), Duration::ZERO).await;

        let store = Arc::new(InMemoryStore::new());
        let (u1, u2, u3) = (identity("u1"), identity("u2"), identity("u3"));
        for i in [&u1, &u2, &u3] {
            store.add_identity(i.clone()).await;
        }

        let admin = role("admin");
        store
            .add_role(admin.clone(), vec![code("MANAGE_USERS"), code("VIEW_AUDIT")])
            .await;
        store.assign(u1.id, admin.id).await;

        let hollow = role("hollow");
        store.add_role(hollow.clone(), Vec::new()).await;
        store.assign(u3.id, hollow.id).await;

        Self {
            key,
            store,
            discovery,
            keys,
            u1,
            u2,
            u3,
        }
    }

    pub fn stores(&self) -> Stores {
        Stores::memory(self.store.clone())
    }

    pub fn state(&self) -> AppState {
        build_state(&self.stores(), self.keys.clone(), &config())
    }

    pub async fn router(&self) -> Router {
        router_over(&self.stores(), self.keys.clone()).await
    }
}

pub async fn router_over(stores: &Stores, keys: Arc<KeyMaterialCache>) -> Router {
    let config = config();
    let catalog = PermissionCatalog::load(stores.roles.as_ref(), config.store_timeout)
        .await
        .unwrap();
    let state = build_state(stores, keys, &config);
    build_router(state, &catalog, &config).unwrap()
}
