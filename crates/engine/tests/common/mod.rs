#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Currency, Engine, Money, NewOfferCmd, NewRequestCmd, Notification, NotificationSink,
    NotifyError, Offer, RequestForTransaction, Transaction, User,
};
use migration::MigratorTrait;

/// Sink that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().iter().map(|n| n.kind()).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Sink that always fails.
pub struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("smtp down".to_string()))
    }
}

pub async fn connect() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = connect().await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn engine_with_sink(sink: Arc<dyn NotificationSink>) -> Engine {
    let db = connect().await;
    Engine::builder()
        .database(db)
        .notification_sink(sink)
        .build()
        .await
        .unwrap()
}

/// Registers `username` through an invitation from `inviter`.
pub async fn invite(engine: &Engine, inviter: &str, username: &str) -> User {
    let invitation = engine.create_invitation(inviter).await.unwrap();
    engine
        .register_with_invitation(invitation.code, username)
        .await
        .unwrap()
}

/// Root `alice` with invited users `bob` and `carol`.
pub async fn seed_users(engine: &Engine) {
    engine.create_root_user("alice").await.unwrap();
    invite(engine, "alice", "bob").await;
    invite(engine, "alice", "carol").await;
}

/// 10.00 USD for RUB, published by `author`.
pub async fn usd_offer(engine: &Engine, author: &str) -> Offer {
    engine
        .create_offer(NewOfferCmd::new(
            author,
            Currency::Usd,
            Money::from_major(10),
            Currency::Rub,
            Utc::now(),
        ))
        .await
        .unwrap()
}

pub async fn apply(engine: &Engine, offer: &Offer, applicant: &str) -> RequestForTransaction {
    engine
        .submit_request(NewRequestCmd::new(offer.id, applicant, Utc::now()))
        .await
        .unwrap()
}

/// Alice's offer accepted for bob, ready to settle.
pub async fn accepted_deal(engine: &Engine) -> (Offer, Transaction) {
    seed_users(engine).await;
    let offer = usd_offer(engine, "alice").await;
    let request = apply(engine, &offer, "bob").await;
    let tx = engine.accept_request(request.id, "alice").await.unwrap();
    (offer, tx)
}

/// Runs the four settlement steps in order.
pub async fn settle(engine: &Engine, tx: &Transaction) -> Transaction {
    engine
        .author_asserts_transfer_done(tx.id, "alice")
        .await
        .unwrap();
    engine
        .accepting_user_confirms_money_received(tx.id, "bob")
        .await
        .unwrap();
    engine
        .accepting_user_asserts_transfer_done(tx.id, "bob")
        .await
        .unwrap();
    engine
        .author_confirms_money_received(tx.id, "alice")
        .await
        .unwrap()
}
