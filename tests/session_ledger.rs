mod common;

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use access_gate::services::{CloseOutcome, IdentityResolver, LedgerError, SessionLedger, SessionMeta};
use common::World;

fn ledger(world: &World) -> SessionLedger {
    let timeout = Duration::from_secs(1);
    SessionLedger::new(
        world.store.clone(),
        IdentityResolver::new(world.store.clone(), timeout),
        timeout,
    )
}

fn meta(token: &str, expires_in: i64) -> SessionMeta {
    SessionMeta {
        access_token: token.to_string(),
        refresh_token: Some(format!("refresh-{token}")),
        expires_in,
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("tests".to_string()),
    }
}

#[tokio::test]
async fn opening_twice_leaves_exactly_one_active_session() {
    let world = World::new().await;
    let ledger = ledger(&world);

    let first = ledger.open(world.u1.id, meta("t1", 3600)).await.unwrap();
    let second = ledger.open(world.u1.id, meta("t2", 3600)).await.unwrap();

    let sessions = world.store.sessions_of(world.u1.id).await;
    let active: Vec<_> = sessions.iter().filter(|s| s.active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);

    let previous = sessions.iter().find(|s| s.id == first.id).unwrap();
    assert!(!previous.active);
    assert!(previous.logout_at.unwrap() <= second.login_at);
}

#[tokio::test]
async fn sessions_of_other_identities_are_untouched() {
    let world = World::new().await;
    let ledger = ledger(&world);

    ledger.open(world.u1.id, meta("t1", 3600)).await.unwrap();
    ledger.open(world.u2.id, meta("t2", 3600)).await.unwrap();

    assert!(world.store.sessions_of(world.u1.id).await[0].active);
}

#[tokio::test]
async fn tokens_are_stored_hashed() {
    let world = World::new().await;
    let session = ledger(&world)
        .open(world.u1.id, meta("plain-token", 3600))
        .await
        .unwrap();

    assert_eq!(session.access_token_hash.len(), 32);
    assert_ne!(session.access_token_hash, b"plain-token".to_vec());
    assert!(session.expires_at.unwrap() > session.login_at);
}

#[tokio::test]
async fn non_positive_lifetime_means_no_expiry() {
    let world = World::new().await;
    let session = ledger(&world).open(world.u1.id, meta("t", 0)).await.unwrap();
    assert_eq!(session.expires_at, None);
}

#[tokio::test]
async fn close_is_idempotent_and_distinct_from_not_found() {
    let world = World::new().await;
    let ledger = ledger(&world);
    ledger.open(world.u1.id, meta("t1", 3600)).await.unwrap();

    let now = Utc::now();
    assert_eq!(ledger.close("t1", now).await.unwrap(), CloseOutcome::Closed);
    assert_eq!(ledger.close("t1", now).await.unwrap(), CloseOutcome::AlreadyClosed);
    assert_eq!(ledger.close("never-issued", now).await.unwrap(), CloseOutcome::NotFound);
}

#[tokio::test]
async fn replaced_session_closes_as_already_closed() {
    let world = World::new().await;
    let ledger = ledger(&world);
    ledger.open(world.u1.id, meta("t1", 3600)).await.unwrap();
    ledger.open(world.u1.id, meta("t2", 3600)).await.unwrap();

    assert_eq!(
        ledger.close("t1", Utc::now()).await.unwrap(),
        CloseOutcome::AlreadyClosed
    );
}

#[tokio::test]
async fn expiry_is_observed_lazily_on_close() {
    let world = World::new().await;
    let ledger = ledger(&world);
    let session = ledger.open(world.u1.id, meta("t1", 60)).await.unwrap();

    let later = session.login_at + chrono::Duration::seconds(600);
    assert_eq!(ledger.close("t1", later).await.unwrap(), CloseOutcome::Expired);

    let stored = &world.store.sessions_of(world.u1.id).await[0];
    assert!(!stored.active);
    assert_eq!(stored.logout_at, session.expires_at);

    assert_eq!(ledger.close("t1", later).await.unwrap(), CloseOutcome::AlreadyClosed);
}

#[tokio::test]
async fn unknown_identity_cannot_open_a_session() {
    let world = World::new().await;
    let err = ledger(&world)
        .open(Uuid::new_v4(), meta("t", 60))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownIdentity));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_leave_exactly_one_active_session() {
    let world = World::new().await;
    let ledger = ledger(&world);

    let mut opens = tokio::task::JoinSet::new();
    for i in 0..16 {
        let ledger = ledger.clone();
        let identity = world.u1.id;
        opens.spawn(async move { ledger.open(identity, meta(&format!("t{i}"), 3600)).await });
    }
    while let Some(opened) = opens.join_next().await {
        opened.unwrap().unwrap();
    }

    let sessions = world.store.sessions_of(world.u1.id).await;
    assert_eq!(sessions.len(), 16);

    let active: Vec<_> = sessions.iter().filter(|s| s.active).collect();
    assert_eq!(active.len(), 1);
    let current = active[0];

    for replaced in sessions.iter().filter(|s| !s.active) {
        let logout_at = replaced.logout_at.unwrap();
        assert!(logout_at <= current.login_at);
        assert!(replaced.login_at <= logout_at);
    }
}
