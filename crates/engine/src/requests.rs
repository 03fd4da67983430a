//! Requests for transaction: a counterparty's bid to fulfill an offer.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid request status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestForTransaction {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub applicant: String,
    pub status: RequestStatus,
    pub bank_detail_id: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
}

impl RequestForTransaction {
    pub fn new(
        offer_id: Uuid,
        applicant: String,
        bank_detail_id: Option<Uuid>,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            offer_id,
            applicant,
            status: RequestStatus::Pending,
            bank_detail_id,
            applied_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "requests_for_transaction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub offer_id: String,
    pub applicant: String,
    pub status: String,
    pub bank_detail_id: Option<String>,
    pub applied_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offers::Entity",
        from = "Column::OfferId",
        to = "super::offers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offers,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RequestForTransaction> for ActiveModel {
    fn from(request: &RequestForTransaction) -> Self {
        Self {
            id: ActiveValue::Set(request.id.to_string()),
            offer_id: ActiveValue::Set(request.offer_id.to_string()),
            applicant: ActiveValue::Set(request.applicant.clone()),
            status: ActiveValue::Set(request.status.as_str().to_string()),
            bank_detail_id: ActiveValue::Set(request.bank_detail_id.map(|id| id.to_string())),
            applied_at: ActiveValue::Set(request.applied_at),
        }
    }
}

impl TryFrom<Model> for RequestForTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "request")?,
            offer_id: parse_uuid(&model.offer_id, "offer")?,
            applicant: model.applicant,
            status: RequestStatus::try_from(model.status.as_str())?,
            bank_detail_id: model
                .bank_detail_id
                .as_deref()
                .map(|id| parse_uuid(id, "bank detail"))
                .transpose()?,
            applied_at: model.applied_at,
        })
    }
}
