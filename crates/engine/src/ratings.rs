//! Post-settlement ratings.
//!
//! One row per `(transaction, author, recipient)`. A user's
//! `aggregated_rating` is always the mean of the scores they received, see
//! [`aggregate_scores`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

/// Validates a score is in `1..=5`.
pub fn validate_score(score: i32) -> ResultEngine<i32> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(EngineError::InvalidScore(score))
    }
}

/// Arithmetic mean of `scores`, `0.0` when there are none.
///
/// ```
/// use engine::aggregate_scores;
///
/// assert_eq!(aggregate_scores(&[]), 0.0);
/// assert_eq!(aggregate_scores(&[5, 4]), 4.5);
/// ```
pub fn aggregate_scores(scores: &[i32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: i64 = scores.iter().map(|s| i64::from(*s)).sum();
    total as f64 / scores.len() as f64
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub author: String,
    pub recipient: String,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ratings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub author: String,
    pub recipient: String,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Rating> for ActiveModel {
    fn from(rating: &Rating) -> Self {
        Self {
            id: ActiveValue::Set(rating.id.to_string()),
            transaction_id: ActiveValue::Set(rating.transaction_id.to_string()),
            author: ActiveValue::Set(rating.author.clone()),
            recipient: ActiveValue::Set(rating.recipient.clone()),
            score: ActiveValue::Set(rating.score),
            comment: ActiveValue::Set(rating.comment.clone()),
            created_at: ActiveValue::Set(rating.created_at),
            updated_at: ActiveValue::Set(rating.updated_at),
        }
    }
}

impl TryFrom<Model> for Rating {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "rating")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            author: model.author,
            recipient: model.recipient,
            score: model.score,
            comment: model.comment,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_received_scores() {
        assert_eq!(aggregate_scores(&[5]), 5.0);
        assert_eq!(aggregate_scores(&[1, 2, 3, 4, 5]), 3.0);
        assert!((aggregate_scores(&[5, 4, 4]) - 13.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_bounds() {
        assert_eq!(validate_score(1).unwrap(), 1);
        assert_eq!(validate_score(5).unwrap(), 5);
        assert_eq!(validate_score(0).unwrap_err(), EngineError::InvalidScore(0));
        assert_eq!(validate_score(6).unwrap_err(), EngineError::InvalidScore(6));
    }
}
