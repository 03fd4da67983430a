//! Free-form messages attached to a transaction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionComment {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionComment {
    pub fn new(
        transaction_id: Uuid,
        author: String,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            author,
            content,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTimeUtc,
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

impl From<&TransactionComment> for ActiveModel {
    fn from(comment: &TransactionComment) -> Self {
        Self {
            id: ActiveValue::Set(comment.id.to_string()),
            transaction_id: ActiveValue::Set(comment.transaction_id.to_string()),
            author: ActiveValue::Set(comment.author.clone()),
            content: ActiveValue::Set(comment.content.clone()),
            created_at: ActiveValue::Set(comment.created_at),
        }
    }
}

impl TryFrom<Model> for TransactionComment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "comment")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            author: model.author,
            content: model.content,
            created_at: model.created_at,
        })
    }
}
