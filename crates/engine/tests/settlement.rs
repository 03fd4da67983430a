mod common;

use std::sync::Arc;

use common::{
    RecordingSink, accepted_deal, engine_with_db, engine_with_sink, invite, settle,
};
use engine::{
    EngineError, OfferStatus, Party, SettlementFlags, SettlementStage, SettlementStep,
    TransactionStatus,
};
use uuid::Uuid;

#[tokio::test]
async fn happy_path_closes_transaction_and_offer() {
    let (engine, _db) = engine_with_db().await;
    let (offer, tx) = accepted_deal(&engine).await;

    let tx1 = engine
        .author_asserts_transfer_done(tx.id, "alice")
        .await
        .unwrap();
    assert_eq!(tx1.stage(), SettlementStage::AuthorAssertedPaid);
    assert_eq!(tx1.status, TransactionStatus::InProgress);

    let tx2 = engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    assert_eq!(tx2.stage(), SettlementStage::AwaitingReturnLeg);

    let tx3 = engine
        .accepting_user_asserts_transfer_done(tx.id, "bob")
        .await
        .unwrap();
    assert_eq!(tx3.stage(), SettlementStage::ReturnLegAsserted);

    let closed = engine
        .author_confirms_money_received(tx.id, "alice")
        .await
        .unwrap();
    assert_eq!(closed.stage(), SettlementStage::BothConfirmed);
    assert_eq!(closed.status, TransactionStatus::Closed);
    assert!(closed.closed_at.is_some());

    assert_eq!(engine.offer(offer.id).await.unwrap().status, OfferStatus::Closed);
    let stored = engine.transaction(tx.id, "bob").await.unwrap();
    assert_eq!(stored.flags, closed.flags);
    assert_eq!(stored.status, TransactionStatus::Closed);
}

#[tokio::test]
async fn steps_are_restricted_to_their_party() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;

    let cases = [
        (SettlementStep::AuthorAssertsTransferDone, "bob"),
        (SettlementStep::AuthorAssertsTransferDone, "carol"),
        (SettlementStep::AcceptingUserConfirmsMoneyReceived, "alice"),
        (SettlementStep::AcceptingUserAssertsTransferDone, "alice"),
        (SettlementStep::AuthorConfirmsMoneyReceived, "bob"),
    ];
    for (step, actor) in cases {
        let err = engine
            .apply_settlement_step(tx.id, actor, step)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)), "{step:?} by {actor}");
    }

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert_eq!(stored.flags, SettlementFlags::default());
    assert_eq!(stored.status, TransactionStatus::Open);
}

#[tokio::test]
async fn author_cannot_close_before_counterparty_confirms() {
    let (engine, _db) = engine_with_db().await;
    let (offer, tx) = accepted_deal(&engine).await;

    engine
        .author_asserts_transfer_done(tx.id, "alice")
        .await
        .unwrap();
    let err = engine
        .author_confirms_money_received(tx.id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert!(!stored.flags.author_confirms_money_received);
    assert_eq!(
        engine.offer(offer.id).await.unwrap().status,
        OfferStatus::InProgress
    );
}

#[tokio::test]
async fn repeated_steps_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;

    let once = engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    let twice = engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    assert_eq!(once.flags, twice.flags);
    assert_eq!(once.status, twice.status);
}

#[tokio::test]
async fn closed_transaction_is_terminal() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;

    engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    let closed = engine
        .author_confirms_money_received(tx.id, "alice")
        .await
        .unwrap();
    assert!(closed.is_closed());
    // The return-leg assertion was never sent, and now cannot be.
    assert!(matches!(
        engine
            .accepting_user_asserts_transfer_done(tx.id, "bob")
            .await
            .unwrap_err(),
        EngineError::Conflict(_)
    ));
    // Re-sending a recorded step is still fine.
    assert!(
        engine
            .author_confirms_money_received(tx.id, "alice")
            .await
            .is_ok()
    );
    assert!(matches!(
        engine.open_dispute(tx.id, "bob").await.unwrap_err(),
        EngineError::Conflict(_)
    ));
}

#[tokio::test]
async fn evidence_is_role_bound_and_does_not_move_flags() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;

    let updated = engine
        .upload_evidence(tx.id, "alice", Party::Author, "receipts/alice.png")
        .await
        .unwrap();
    assert_eq!(updated.author_evidence.as_deref(), Some("receipts/alice.png"));
    assert_eq!(updated.flags, SettlementFlags::default());

    let err = engine
        .upload_evidence(tx.id, "alice", Party::AcceptingUser, "fake.png")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine
        .upload_evidence(tx.id, "bob", Party::AcceptingUser, "receipts/bob.png")
        .await
        .unwrap();
    let stored = engine.transaction(tx.id, "bob").await.unwrap();
    assert_eq!(stored.accepting_user_evidence.as_deref(), Some("receipts/bob.png"));
    assert_eq!(stored.author_evidence.as_deref(), Some("receipts/alice.png"));
}

#[tokio::test]
async fn dispute_keeps_settlement_going() {
    let (engine, _db) = engine_with_db().await;
    let (offer, tx) = accepted_deal(&engine).await;

    let disputed = engine.open_dispute(tx.id, "bob").await.unwrap();
    assert_eq!(disputed.status, TransactionStatus::Dispute);
    assert!(matches!(
        engine.open_dispute(tx.id, "carol").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));

    let asserted = engine
        .author_asserts_transfer_done(tx.id, "alice")
        .await
        .unwrap();
    assert_eq!(asserted.status, TransactionStatus::Dispute);

    let closed = settle(&engine, &tx).await;
    assert_eq!(closed.status, TransactionStatus::Closed);
    assert_eq!(engine.offer(offer.id).await.unwrap().status, OfferStatus::Closed);
}

#[tokio::test]
async fn transaction_visibility() {
    let (engine, _db) = engine_with_db().await;
    let (offer, tx) = accepted_deal(&engine).await;
    invite(&engine, "bob", "dave").await;

    assert!(engine.transaction(tx.id, "alice").await.is_ok());
    assert!(engine.transaction(tx.id, "bob").await.is_ok());
    assert!(matches!(
        engine.transaction(tx.id, "dave").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));
    assert!(matches!(
        engine.transaction(Uuid::new_v4(), "alice").await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));

    let by_offer = engine.transaction_for_offer(offer.id).await.unwrap();
    assert_eq!(by_offer.map(|t| t.id), Some(tx.id));
    assert!(
        engine
            .transaction_for_offer(Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn root_users_can_follow_any_transaction() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;
    engine.create_root_user("moderator").await.unwrap();

    assert!(engine.transaction(tx.id, "moderator").await.is_ok());
    engine
        .add_comment(tx.id, "moderator", "please upload receipts")
        .await
        .unwrap();
    // Root users still cannot settle on anyone's behalf.
    assert!(matches!(
        engine
            .author_asserts_transfer_done(tx.id, "moderator")
            .await
            .unwrap_err(),
        EngineError::Forbidden(_)
    ));
}

#[tokio::test]
async fn comments_are_kept_in_order() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;

    engine.add_comment(tx.id, "alice", "sent via SWIFT").await.unwrap();
    engine.add_comment(tx.id, "bob", "got it, thanks").await.unwrap();
    assert!(matches!(
        engine.add_comment(tx.id, "bob", "   ").await.unwrap_err(),
        EngineError::Validation(_)
    ));
    assert!(matches!(
        engine.add_comment(tx.id, "carol", "hi").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));

    let comments = engine.comments(tx.id, "bob").await.unwrap();
    assert_eq!(
        comments.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(),
        vec!["sent via SWIFT", "got it, thanks"]
    );
}

#[tokio::test]
async fn settlement_progress_is_notified() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine_with_sink(sink.clone()).await;
    let (_offer, tx) = accepted_deal(&engine).await;

    settle(&engine, &tx).await;
    let kinds = sink.kinds();
    assert_eq!(
        kinds[kinds.len() - 5..],
        [
            "settlement_progress",
            "settlement_progress",
            "settlement_progress",
            "settlement_progress",
            "transaction_closed",
        ]
    );
}

#[tokio::test]
async fn writes_on_unknown_transactions_are_not_found() {
    let (engine, _db) = engine_with_db().await;
    accepted_deal(&engine).await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        engine
            .author_asserts_transfer_done(missing, "alice")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        engine
            .accepting_user_confirms_money_received(missing, "bob")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        engine
            .upload_evidence(missing, "alice", Party::Author, "receipts/alice.png")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
}

#[tokio::test]
async fn steps_that_keep_the_status_do_not_rewrite_it() {
    let (engine, _db) = engine_with_db().await;
    let (_offer, tx) = accepted_deal(&engine).await;
    engine.open_dispute(tx.id, "alice").await.unwrap();

    engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    engine
        .accepting_user_asserts_transfer_done(tx.id, "bob")
        .await
        .unwrap();

    let stored = engine.transaction(tx.id, "alice").await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Dispute);
    assert!(stored.closed_at.is_none());
    assert_eq!(stored.stage(), SettlementStage::ReturnLegAsserted);
}
