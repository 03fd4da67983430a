mod common;

use common::{engine_with_db, invite};
use engine::{EngineError, ReferralCode};
use uuid::Uuid;

#[tokio::test]
async fn root_codes_are_sequential() {
    let (engine, _db) = engine_with_db().await;

    let first = engine.create_root_user("alice").await.unwrap();
    let second = engine.create_root_user("zoe").await.unwrap();

    assert!(first.is_root);
    assert_eq!(first.referral_code.to_string(), "1");
    assert_eq!(second.referral_code.to_string(), "2");
    assert_eq!(first.invites_left, 3);
    assert_eq!(first.aggregated_rating, 0.0);
}

#[tokio::test]
async fn invited_users_extend_the_inviter_code() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();

    let bob = invite(&engine, "alice", "bob").await;
    let carol = invite(&engine, "alice", "carol").await;
    let dave = invite(&engine, "bob", "dave").await;

    assert_eq!(bob.referral_code.to_string(), "1-1");
    assert_eq!(carol.referral_code.to_string(), "1-2");
    assert_eq!(dave.referral_code.to_string(), "1-1-1");
    assert_eq!(dave.invited_by.as_deref(), Some("bob"));
    assert_eq!(
        dave.referral_code.parent(),
        Some(ReferralCode::root(1).unwrap().child(1).unwrap())
    );
    assert!(!dave.is_root);
}

#[tokio::test]
async fn handshake_distance_between_users() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();
    engine.create_root_user("zoe").await.unwrap();
    invite(&engine, "alice", "bob").await;
    invite(&engine, "alice", "carol").await;
    invite(&engine, "bob", "dave").await;

    assert_eq!(engine.handshake_distance_between("alice", "alice").await.unwrap(), 0);
    assert_eq!(engine.handshake_distance_between("bob", "dave").await.unwrap(), 1);
    assert_eq!(engine.handshake_distance_between("carol", "dave").await.unwrap(), 3);
    assert_eq!(engine.handshake_distance_between("dave", "carol").await.unwrap(), 3);
    // Separate trees: "1-1-1" and "2".
    assert_eq!(engine.handshake_distance_between("dave", "zoe").await.unwrap(), 4);
}

#[tokio::test]
async fn invitations_are_limited_and_decremented_once() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();

    for _ in 0..3 {
        engine.create_invitation("alice").await.unwrap();
    }
    let err = engine.create_invitation("alice").await.unwrap_err();
    assert_eq!(err, EngineError::Validation("no invitations left".to_string()));

    let invitations = engine.list_invitations("alice").await.unwrap();
    assert_eq!(invitations.len(), 3);
    assert!(invitations.iter().all(|i| !i.used));

    engine
        .register_with_invitation(invitations[0].code, "bob")
        .await
        .unwrap();
    // Registration does not spend a second invite.
    assert_eq!(engine.user("alice").await.unwrap().invites_left, 0);
}

#[tokio::test]
async fn invitation_can_be_used_only_once() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();
    let invitation = engine.create_invitation("alice").await.unwrap();

    engine
        .register_with_invitation(invitation.code, "bob")
        .await
        .unwrap();
    let err = engine
        .register_with_invitation(invitation.code, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert!(matches!(
        engine.user("carol").await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));

    let stored = engine.list_invitations("alice").await.unwrap();
    assert!(stored[0].used);
    assert_eq!(stored[0].invited_user.as_deref(), Some("bob"));
}

#[tokio::test]
async fn unknown_invitation_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();

    let err = engine
        .register_with_invitation(Uuid::new_v4(), "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn usernames_are_unique_after_normalization() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("Alice").await.unwrap();

    let err = engine.create_root_user("  alice ").await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("alice".to_string()));

    let invitation = engine.create_invitation("ALICE").await.unwrap();
    let err = engine
        .register_with_invitation(invitation.code, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    // The failed registration left the invitation unused.
    let stored = engine.list_invitations("alice").await.unwrap();
    assert!(!stored[0].used);
}

#[tokio::test]
async fn configured_invites_apply_to_new_users() {
    let db = common::connect().await;
    let engine = engine::Engine::builder()
        .database(db)
        .invites_per_user(1)
        .build()
        .await
        .unwrap();
    engine.create_root_user("alice").await.unwrap();
    let bob = invite(&engine, "alice", "bob").await;

    assert_eq!(bob.invites_left, 1);
    assert!(engine.create_invitation("alice").await.is_err());
}

#[tokio::test]
async fn registered_codes_sit_directly_under_the_inviter() {
    let (engine, _db) = engine_with_db().await;
    engine.create_root_user("alice").await.unwrap();
    let chain = [("alice", "bob"), ("bob", "carol"), ("carol", "dave"), ("bob", "erin")];

    for (inviter, username) in chain {
        let user = invite(&engine, inviter, username).await;
        let inviter = engine.user(inviter).await.unwrap();
        user.referral_code
            .ensure_child_of(&inviter.referral_code)
            .unwrap();
        assert!(matches!(
            user.referral_code.ensure_child_of(&user.referral_code),
            Err(EngineError::InvalidReferralCode(_))
        ));
    }
    assert_eq!(engine.user("erin").await.unwrap().referral_code.to_string(), "1-1-2");
}
