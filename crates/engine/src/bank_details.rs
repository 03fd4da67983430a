//! Payment instructions a user shares with a counterparty.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError,
    util::{model_currency, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetail {
    pub id: Uuid,
    pub user_id: String,
    pub currency: Currency,
    pub bank_name: Option<String>,
    pub account_or_phone: Option<String>,
    pub recipient_name: Option<String>,
}

impl BankDetail {
    pub fn new(
        user_id: String,
        currency: Currency,
        bank_name: Option<String>,
        account_or_phone: Option<String>,
        recipient_name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            currency,
            bank_name,
            account_or_phone,
            recipient_name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub bank_name: Option<String>,
    pub account_or_phone: Option<String>,
    pub recipient_name: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankDetail> for ActiveModel {
    fn from(detail: &BankDetail) -> Self {
        Self {
            id: ActiveValue::Set(detail.id.to_string()),
            user_id: ActiveValue::Set(detail.user_id.clone()),
            currency: ActiveValue::Set(detail.currency.code().to_string()),
            bank_name: ActiveValue::Set(detail.bank_name.clone()),
            account_or_phone: ActiveValue::Set(detail.account_or_phone.clone()),
            recipient_name: ActiveValue::Set(detail.recipient_name.clone()),
        }
    }
}

impl TryFrom<Model> for BankDetail {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "bank detail")?,
            user_id: model.user_id,
            currency: model_currency(&model.currency)?,
            bank_name: model.bank_name,
            account_or_phone: model.account_or_phone,
            recipient_name: model.recipient_name,
        })
    }
}
