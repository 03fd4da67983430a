use sea_orm::{DatabaseTransaction, EntityTrait};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Offer, Party, ResultEngine, Transaction, bank_details, offers,
    requests, transactions, users, util::model_currency,
};

use super::Engine;

/// A transaction loaded together with its offer and the caller's side.
pub(super) struct SettlementView {
    pub(super) transaction: Transaction,
    pub(super) offer: Offer,
    pub(super) party: Option<Party>,
}

impl SettlementView {
    /// The participant on the other side of `party`.
    pub(super) fn counterpart(&self, party: Party) -> &str {
        match party {
            Party::Author => &self.transaction.accepting_user,
            Party::AcceptingUser => &self.offer.author,
        }
    }
}

impl Engine {
    pub(super) async fn find_user(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find_by_id(username.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<users::Model> {
        self.find_user(db, username)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {username}")))
    }

    pub(super) async fn require_offer(
        &self,
        db: &DatabaseTransaction,
        offer_id: Uuid,
    ) -> ResultEngine<Offer> {
        let model = offers::Entity::find_by_id(offer_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("offer not exists".to_string()))?;
        Offer::try_from(model)
    }

    pub(super) async fn require_request(
        &self,
        db: &DatabaseTransaction,
        request_id: Uuid,
    ) -> ResultEngine<requests::Model> {
        requests::Entity::find_by_id(request_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("request not exists".to_string()))
    }

    pub(super) async fn require_transaction(
        &self,
        db: &DatabaseTransaction,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        Transaction::try_from(model)
    }

    /// Loads a transaction and its offer, resolving which side `actor` is on.
    pub(super) async fn settlement_view(
        &self,
        db: &DatabaseTransaction,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<SettlementView> {
        let transaction = self.require_transaction(db, transaction_id).await?;
        let offer = self.require_offer(db, transaction.offer_id).await?;
        let party = transaction.party_of(actor, &offer.author);
        Ok(SettlementView {
            transaction,
            offer,
            party,
        })
    }

    /// Participants and root users may read a transaction and its comments.
    pub(super) async fn require_can_view(
        &self,
        db: &DatabaseTransaction,
        view: &SettlementView,
        actor: &str,
    ) -> ResultEngine<()> {
        if view.party.is_some() {
            return Ok(());
        }
        let is_root = self
            .find_user(db, actor)
            .await?
            .is_some_and(|user| user.is_root);
        if !is_root {
            return Err(EngineError::Forbidden(format!(
                "{actor} is not part of this transaction"
            )));
        }
        Ok(())
    }

    /// Checks an optional bank detail belongs to `owner` and is in `currency`.
    pub(super) async fn require_bank_detail(
        &self,
        db: &DatabaseTransaction,
        bank_detail_id: Option<Uuid>,
        owner: &str,
        currency: Currency,
    ) -> ResultEngine<()> {
        let Some(id) = bank_detail_id else {
            return Ok(());
        };
        let model = bank_details::Entity::find_by_id(id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bank detail not exists".to_string()))?;
        if model.user_id != owner {
            return Err(EngineError::Validation(
                "bank detail belongs to another user".to_string(),
            ));
        }
        let detail_currency = model_currency(&model.currency)?;
        if detail_currency != currency {
            return Err(EngineError::Validation(format!(
                "bank detail is for {}, expected {}",
                detail_currency.code(),
                currency.code()
            )));
        }
        Ok(())
    }
}
