use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Money, NewOfferCmd, Notification, Offer, OfferStatus, ResultEngine,
    exchange_rates::required_counterparty_amount, offers, util::normalize_username,
};

use super::{Engine, with_tx};

/// Filters for listing offers. Results are newest first.
#[derive(Clone, Debug, Default)]
pub struct OfferListFilter {
    pub status: Option<OfferStatus>,
    pub author: Option<String>,
    pub limit: Option<u64>,
}

impl OfferListFilter {
    #[must_use]
    pub fn open() -> Self {
        Self {
            status: Some(OfferStatus::Open),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Engine {
    /// Publish a new open offer.
    pub async fn create_offer(&self, cmd: NewOfferCmd) -> ResultEngine<Offer> {
        let author = normalize_username(&cmd.author)?;
        let offer = Offer::new(
            author,
            cmd.currency_offered,
            cmd.amount_offered,
            cmd.currency_needed,
            cmd.bank_detail_id,
            cmd.published_at,
        )?;
        self.limits
            .check(offer.currency_offered, offer.amount_offered)?;

        let offer = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &offer.author).await?;
            // The counterparty pays `currency_needed` into the author's account.
            self.require_bank_detail(
                &db_tx,
                offer.bank_detail_id,
                &offer.author,
                offer.currency_needed,
            )
            .await?;
            offers::ActiveModel::from(&offer).insert(&db_tx).await?;
            Ok(offer)
        })?;

        tracing::info!(
            offer_id = %offer.id,
            author = %offer.author,
            amount = %offer.amount_offered.display_in(offer.currency_offered),
            needed = %offer.currency_needed,
            "offer published"
        );
        self.notify(Notification::NewOffer {
            offer_id: offer.id,
            author: offer.author.clone(),
            currency_offered: offer.currency_offered,
            amount_offered: offer.amount_offered,
            currency_needed: offer.currency_needed,
        });
        Ok(offer)
    }

    pub async fn offer(&self, offer_id: Uuid) -> ResultEngine<Offer> {
        with_tx!(self, |db_tx| self.require_offer(&db_tx, offer_id).await)
    }

    pub async fn list_offers(&self, filter: OfferListFilter) -> ResultEngine<Vec<Offer>> {
        let author = filter
            .author
            .as_deref()
            .map(normalize_username)
            .transpose()?;
        with_tx!(self, |db_tx| {
            let mut query = offers::Entity::find();
            if let Some(status) = filter.status {
                query = query.filter(offers::Column::Status.eq(status.as_str()));
            }
            if let Some(author) = &author {
                query = query.filter(offers::Column::Author.eq(author.clone()));
            }
            query = query
                .order_by_desc(offers::Column::PublishedAt)
                .order_by_desc(offers::Column::Id);
            if let Some(limit) = filter.limit {
                query = query.limit(limit);
            }
            query
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Offer::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Amount of `currency_needed` the counterparty owes at the latest rates.
    ///
    /// `None` when no usable snapshot is stored.
    pub async fn counterparty_amount(&self, offer_id: Uuid) -> ResultEngine<Option<Money>> {
        let offer = self.offer(offer_id).await?;
        let rates = self.latest_rates().await?;
        if rates.is_none() {
            tracing::warn!(offer_id = %offer_id, "no exchange rates stored");
        }
        Ok(required_counterparty_amount(&offer, rates.as_ref()))
    }

    /// Move an open offer to `in_progress`. Replays are no-ops.
    pub(super) async fn move_offer_to_in_progress(
        &self,
        db: &DatabaseTransaction,
        offer: &Offer,
    ) -> ResultEngine<()> {
        match offer.status {
            OfferStatus::InProgress => Ok(()),
            OfferStatus::Closed => Err(EngineError::Conflict("offer is closed".to_string())),
            OfferStatus::Open | OfferStatus::Pending => {
                self.set_offer_status(db, offer, OfferStatus::InProgress)
                    .await
            }
        }
    }

    /// Forward-only status write, guarded on the status that was read.
    pub(super) async fn set_offer_status(
        &self,
        db: &DatabaseTransaction,
        offer: &Offer,
        next: OfferStatus,
    ) -> ResultEngine<()> {
        if !offer.status.can_move_to(next) {
            return Err(EngineError::Conflict(format!(
                "offer cannot move from {} to {}",
                offer.status.as_str(),
                next.as_str()
            )));
        }
        let updated = offers::Entity::update_many()
            .col_expr(offers::Column::Status, Expr::value(next.as_str()))
            .filter(offers::Column::Id.eq(offer.id.to_string()))
            .filter(offers::Column::Status.eq(offer.status.as_str()))
            .exec(db)
            .await?;
        if updated.rows_affected != 1 {
            return Err(EngineError::Conflict(
                "offer changed concurrently, please retry".to_string(),
            ));
        }
        tracing::info!(offer_id = %offer.id, status = next.as_str(), "offer status changed");
        Ok(())
    }
}
