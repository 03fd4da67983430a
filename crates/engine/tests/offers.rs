mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{RecordingSink, engine_with_db, engine_with_sink, seed_users, usd_offer};
use engine::{
    Currency, EngineError, Money, NewBankDetailCmd, NewOfferCmd, OfferListFilter, OfferStatus,
    RateSnapshot,
};

fn offer_cmd(author: &str, offered: Currency, amount: Money, needed: Currency) -> NewOfferCmd {
    NewOfferCmd::new(author, offered, amount, needed, Utc::now())
}

#[tokio::test]
async fn create_offer_starts_open() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;

    let offer = usd_offer(&engine, "alice").await;
    assert_eq!(offer.status, OfferStatus::Open);
    let stored = engine.offer(offer.id).await.unwrap();
    assert_eq!(stored.author, "alice");
    assert_eq!(stored.amount_offered, Money::from_major(10));
    assert_eq!(stored.currency_needed, Currency::Rub);
    assert_eq!(stored.status, OfferStatus::Open);
}

#[tokio::test]
async fn same_currency_is_a_validation_error() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;

    let err = engine
        .create_offer(offer_cmd("alice", Currency::Rub, Money::from_major(10), Currency::Rub))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn amount_must_be_positive_and_within_ceiling() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;

    let zero = engine
        .create_offer(offer_cmd("alice", Currency::Usd, Money::ZERO, Currency::Rub))
        .await
        .unwrap_err();
    assert!(matches!(zero, EngineError::Validation(_)));

    // The ceiling itself is allowed.
    engine
        .create_offer(offer_cmd("alice", Currency::Usd, Money::from_major(50), Currency::Mnt))
        .await
        .unwrap();
    let over = engine
        .create_offer(offer_cmd("alice", Currency::Usd, Money::new(5_001), Currency::Mnt))
        .await
        .unwrap_err();
    assert!(matches!(over, EngineError::Validation(_)));

    engine
        .create_offer(offer_cmd(
            "alice",
            Currency::Mnt,
            Money::from_major(150_000),
            Currency::Usd,
        ))
        .await
        .unwrap();
    assert!(
        engine
            .create_offer(offer_cmd("alice", Currency::Rub, Money::from_major(5_001), Currency::Usd))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn unknown_author_is_not_found() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_offer(offer_cmd("ghost", Currency::Usd, Money::from_major(1), Currency::Rub))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn bank_detail_must_match_owner_and_needed_currency() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;

    let rub = engine
        .add_bank_detail(
            NewBankDetailCmd::new("alice", Currency::Rub)
                .bank_name("Tinkoff")
                .account_or_phone("+7 900 000 00 00")
                .recipient_name("Alice A."),
        )
        .await
        .unwrap();
    let usd = engine
        .add_bank_detail(NewBankDetailCmd::new("alice", Currency::Usd))
        .await
        .unwrap();
    let bobs = engine
        .add_bank_detail(NewBankDetailCmd::new("bob", Currency::Rub))
        .await
        .unwrap();

    let ok = engine
        .create_offer(
            offer_cmd("alice", Currency::Usd, Money::from_major(10), Currency::Rub)
                .bank_detail(rub.id),
        )
        .await
        .unwrap();
    assert_eq!(ok.bank_detail_id, Some(rub.id));

    for detail in [usd.id, bobs.id] {
        let err = engine
            .create_offer(
                offer_cmd("alice", Currency::Usd, Money::from_major(10), Currency::Rub)
                    .bank_detail(detail),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    let details = engine.bank_details("alice").await.unwrap();
    assert_eq!(details.len(), 2);
    assert!(details.iter().any(|d| d.bank_name.as_deref() == Some("Tinkoff")));
}

#[tokio::test]
async fn list_offers_filters_and_orders_newest_first() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;
    let now = Utc::now();

    let older = engine
        .create_offer(NewOfferCmd::new(
            "alice",
            Currency::Usd,
            Money::from_major(5),
            Currency::Rub,
            now - Duration::minutes(5),
        ))
        .await
        .unwrap();
    let newer = engine
        .create_offer(NewOfferCmd::new(
            "bob",
            Currency::Rub,
            Money::from_major(500),
            Currency::Mnt,
            now,
        ))
        .await
        .unwrap();

    let all = engine.list_offers(OfferListFilter::open()).await.unwrap();
    assert_eq!(
        all.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );

    let mine = engine
        .list_offers(OfferListFilter::default().author("alice"))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, older.id);

    let first = engine
        .list_offers(OfferListFilter::default().limit(1))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
}

#[tokio::test]
async fn new_offers_are_announced() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine_with_sink(sink.clone()).await;
    seed_users(&engine).await;

    usd_offer(&engine, "alice").await;
    assert_eq!(sink.kinds(), vec!["new_offer"]);
}

#[tokio::test]
async fn counterparty_amount_uses_latest_rates() {
    let (engine, _db) = engine_with_db().await;
    seed_users(&engine).await;
    let offer = usd_offer(&engine, "alice").await;

    assert_eq!(engine.counterparty_amount(offer.id).await.unwrap(), None);
    assert!(engine.rates_need_refresh(Utc::now()).await.unwrap());

    let now = Utc::now();
    engine
        .record_rates(RateSnapshot::new(
            80.0,
            40.0,
            3_400.0,
            None,
            now - Duration::hours(20),
        ))
        .await
        .unwrap();
    assert!(engine.rates_need_refresh(now).await.unwrap());

    engine
        .record_rates(RateSnapshot::new(90.0, 38.0, 3_420.0, Some(91.0), now))
        .await
        .unwrap();
    assert!(!engine.rates_need_refresh(now).await.unwrap());
    assert_eq!(engine.latest_rates().await.unwrap().unwrap().usd_rub, 90.0);

    assert_eq!(
        engine.counterparty_amount(offer.id).await.unwrap(),
        Some(Money::from_major(900))
    );
}

#[tokio::test]
async fn broken_rates_are_rejected_at_write() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .record_rates(RateSnapshot::new(f64::NAN, 1.0, 1.0, None, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(engine.latest_rates().await.unwrap().is_none());
}
