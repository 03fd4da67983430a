//! Offer primitives.
//!
//! An `Offer` is a posted intent to exchange a fixed amount of one currency
//! for another. Its status only ever moves forward:
//! `open → in_progress → closed`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine,
    util::{model_currency, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Open,
    /// Kept for rows written by older clients; the engine never sets it.
    Pending,
    InProgress,
    Closed,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    /// Position in the lifecycle, used to reject backward moves.
    fn rank(self) -> u8 {
        match self {
            Self::Open | Self::Pending => 0,
            Self::InProgress => 1,
            Self::Closed => 2,
        }
    }

    /// Returns `true` if the status may move from `self` to `next`.
    pub fn can_move_to(self, next: OfferStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl TryFrom<&str> for OfferStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::Validation(format!(
                "invalid offer status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub author: String,
    pub currency_offered: Currency,
    pub amount_offered: Money,
    pub currency_needed: Currency,
    pub status: OfferStatus,
    pub bank_detail_id: Option<Uuid>,
    pub published_at: DateTime<Utc>,
}

impl Offer {
    /// Builds a new open offer after checking the currency pair and amount.
    ///
    /// Ceilings are enforced by the caller, which owns the configuration.
    pub fn new(
        author: String,
        currency_offered: Currency,
        amount_offered: Money,
        currency_needed: Currency,
        bank_detail_id: Option<Uuid>,
        published_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if currency_offered == currency_needed {
            return Err(EngineError::Validation(
                "offered currency and needed currency cannot be the same".to_string(),
            ));
        }
        if !amount_offered.is_positive() {
            return Err(EngineError::Validation(
                "amount_offered must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            author,
            currency_offered,
            amount_offered,
            currency_needed,
            status: OfferStatus::Open,
            bank_detail_id,
            published_at,
        })
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, OfferStatus::Open | OfferStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub author: String,
    pub currency_offered: String,
    pub amount_offered_minor: i64,
    pub currency_needed: String,
    pub status: String,
    pub bank_detail_id: Option<String>,
    pub published_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::Author",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(has_many = "super::requests::Entity")]
    Requests,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Offer> for ActiveModel {
    fn from(offer: &Offer) -> Self {
        Self {
            id: ActiveValue::Set(offer.id.to_string()),
            author: ActiveValue::Set(offer.author.clone()),
            currency_offered: ActiveValue::Set(offer.currency_offered.code().to_string()),
            amount_offered_minor: ActiveValue::Set(offer.amount_offered.minor()),
            currency_needed: ActiveValue::Set(offer.currency_needed.code().to_string()),
            status: ActiveValue::Set(offer.status.as_str().to_string()),
            bank_detail_id: ActiveValue::Set(offer.bank_detail_id.map(|id| id.to_string())),
            published_at: ActiveValue::Set(offer.published_at),
        }
    }
}

impl TryFrom<Model> for Offer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "offer")?,
            author: model.author,
            currency_offered: model_currency(&model.currency_offered)?,
            amount_offered: Money::new(model.amount_offered_minor),
            currency_needed: model_currency(&model.currency_needed)?,
            status: OfferStatus::try_from(model.status.as_str())?,
            bank_detail_id: model
                .bank_detail_id
                .as_deref()
                .map(|id| parse_uuid(id, "bank detail"))
                .transpose()?,
            published_at: model.published_at,
        })
    }
}
