//! Users table.
//!
//! The engine identifies users by their normalized username. Every user has a
//! referral code placing them in the invite tree.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ReferralCode};

/// Snapshot of a user as seen by the marketplace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub is_root: bool,
    pub referral_code: ReferralCode,
    pub invited_by: Option<String>,
    pub invites_left: i32,
    pub aggregated_rating: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub username: String,
    pub is_root: bool,
    #[sea_orm(unique)]
    pub referral_code: String,
    pub invited_by: Option<String>,
    pub invites_left: i32,
    pub aggregated_rating: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for User {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            referral_code: model.referral_code.parse()?,
            username: model.username,
            is_root: model.is_root,
            invited_by: model.invited_by,
            invites_left: model.invites_left,
            aggregated_rating: model.aggregated_rating,
            created_at: model.created_at,
        })
    }
}
