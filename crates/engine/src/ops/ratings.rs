use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    EngineError, RateCmd, Rating, ResultEngine, aggregate_scores, ratings, users,
    util::{normalize_optional_text, normalize_username},
    validate_score,
};

use super::{Engine, with_tx};

impl Engine {
    /// Rate the other participant of a closed transaction.
    ///
    /// Rating twice replaces the earlier score. The ratee's aggregated rating
    /// is recomputed in the same database transaction.
    pub async fn rate(&self, cmd: RateCmd) -> ResultEngine<Rating> {
        let score = validate_score(cmd.score)?;
        let rater = normalize_username(&cmd.rater)?;
        let ratee = normalize_username(&cmd.ratee)?;
        let comment = normalize_optional_text(cmd.comment.as_deref());

        let (rating, aggregated) = with_tx!(self, |db_tx| {
            let view = self
                .settlement_view(&db_tx, cmd.transaction_id, &rater)
                .await?;
            let Some(party) = view.party else {
                return Err(EngineError::Forbidden(format!(
                    "{rater} is not part of this transaction"
                )));
            };
            if view.counterpart(party) != ratee {
                return Err(EngineError::Validation(format!(
                    "{ratee} is not the counterparty of {rater}"
                )));
            }
            if !view.transaction.is_closed() {
                return Err(EngineError::Conflict(
                    "only closed transactions can be rated".to_string(),
                ));
            }

            let candidate = Rating {
                id: Uuid::new_v4(),
                transaction_id: view.transaction.id,
                author: rater.clone(),
                recipient: ratee.clone(),
                score,
                comment: comment.clone(),
                created_at: cmd.rated_at,
                updated_at: cmd.rated_at,
            };
            ratings::Entity::insert(ratings::ActiveModel::from(&candidate))
                .on_conflict(
                    OnConflict::columns([
                        ratings::Column::TransactionId,
                        ratings::Column::Author,
                        ratings::Column::Recipient,
                    ])
                    .update_columns([
                        ratings::Column::Score,
                        ratings::Column::Comment,
                        ratings::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;

            let stored = self
                .find_rating(&db_tx, view.transaction.id, &rater, &ratee)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("rating not exists".to_string()))?;
            let aggregated = self.refresh_aggregated_rating(&db_tx, &ratee).await?;
            Ok((stored, aggregated))
        })?;

        tracing::info!(
            transaction_id = %rating.transaction_id,
            author = %rating.author,
            recipient = %rating.recipient,
            score = rating.score,
            aggregated,
            "rating stored"
        );
        Ok(rating)
    }

    /// Ratings received by `username`, newest first.
    pub async fn ratings_for(&self, username: &str) -> ResultEngine<Vec<Rating>> {
        let username = normalize_username(username)?;
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &username).await?;
            ratings::Entity::find()
                .filter(ratings::Column::Recipient.eq(username.clone()))
                .order_by_desc(ratings::Column::UpdatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Rating::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// The rating `author` left on a transaction, if any.
    pub async fn rating_by(
        &self,
        transaction_id: Uuid,
        author: &str,
    ) -> ResultEngine<Option<Rating>> {
        let author = normalize_username(author)?;
        with_tx!(self, |db_tx| {
            ratings::Entity::find()
                .filter(ratings::Column::TransactionId.eq(transaction_id.to_string()))
                .filter(ratings::Column::Author.eq(author.clone()))
                .one(&db_tx)
                .await?
                .map(Rating::try_from)
                .transpose()
        })
    }

    async fn find_rating(
        &self,
        db: &DatabaseTransaction,
        transaction_id: Uuid,
        author: &str,
        recipient: &str,
    ) -> ResultEngine<Option<Rating>> {
        ratings::Entity::find()
            .filter(ratings::Column::TransactionId.eq(transaction_id.to_string()))
            .filter(ratings::Column::Author.eq(author.to_string()))
            .filter(ratings::Column::Recipient.eq(recipient.to_string()))
            .one(db)
            .await?
            .map(Rating::try_from)
            .transpose()
    }

    /// Recompute and store the mean of every score `username` received.
    async fn refresh_aggregated_rating(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<f64> {
        let scores: Vec<i32> = ratings::Entity::find()
            .filter(ratings::Column::Recipient.eq(username.to_string()))
            .select_only()
            .column(ratings::Column::Score)
            .into_tuple()
            .all(db)
            .await?;
        let aggregated = aggregate_scores(&scores);
        users::Entity::update_many()
            .col_expr(users::Column::AggregatedRating, Expr::value(aggregated))
            .filter(users::Column::Username.eq(username.to_string()))
            .exec(db)
            .await?;
        Ok(aggregated)
    }
}
