use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Invitation, ReferralCode, ResultEngine, User, error::is_unique_violation,
    invitations, users, util::normalize_username,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a root account (no inviter) with the next free root code.
    pub async fn create_root_user(&self, username: &str) -> ResultEngine<User> {
        let username = normalize_username(username)?;
        let user = with_tx!(self, |db_tx| {
            if self.find_user(&db_tx, &username).await?.is_some() {
                return Err(EngineError::ExistingKey(username));
            }

            let root_codes: Vec<String> = users::Entity::find()
                .filter(users::Column::IsRoot.eq(true))
                .select_only()
                .column(users::Column::ReferralCode)
                .into_tuple()
                .all(&db_tx)
                .await?;
            let mut last = 0u32;
            for code in &root_codes {
                let code: ReferralCode = code.parse()?;
                if let Some(first) = code.segments().first() {
                    last = last.max(*first);
                }
            }
            let referral_code = ReferralCode::root(last + 1)?;
            if !referral_code.is_root() {
                return Err(EngineError::InvalidReferralCode(format!(
                    "{referral_code} is not a root code"
                )));
            }

            let model = users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                is_root: ActiveValue::Set(true),
                referral_code: ActiveValue::Set(referral_code.to_string()),
                invited_by: ActiveValue::Set(None),
                invites_left: ActiveValue::Set(self.invites_per_user),
                aggregated_rating: ActiveValue::Set(0.0),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| map_code_collision(err, &username))?;

            User::try_from(model)
        })?;

        tracing::info!(username = %user.username, code = %user.referral_code, "root user created");
        Ok(user)
    }

    /// Spend one of `inviter`'s invitations.
    pub async fn create_invitation(&self, inviter: &str) -> ResultEngine<Invitation> {
        let inviter = normalize_username(inviter)?;
        let invitation = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &inviter).await?;

            let spent = users::Entity::update_many()
                .col_expr(
                    users::Column::InvitesLeft,
                    Expr::col(users::Column::InvitesLeft).sub(1),
                )
                .filter(users::Column::Username.eq(inviter.clone()))
                .filter(users::Column::InvitesLeft.gt(0))
                .exec(&db_tx)
                .await?;
            if spent.rows_affected == 0 {
                return Err(EngineError::Validation("no invitations left".to_string()));
            }

            let model = invitations::ActiveModel {
                code: ActiveValue::Set(Uuid::new_v4().to_string()),
                inviter: ActiveValue::Set(inviter.clone()),
                used: ActiveValue::Set(false),
                invited_user: ActiveValue::Set(None),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            Invitation::try_from(model)
        })?;

        tracing::info!(inviter = %invitation.inviter, code = %invitation.code, "invitation created");
        Ok(invitation)
    }

    /// Register `username` by consuming an unused invitation.
    ///
    /// The new code is the inviter's code plus the next child index, so the
    /// tree position is fixed at registration time.
    pub async fn register_with_invitation(&self, code: Uuid, username: &str) -> ResultEngine<User> {
        let username = normalize_username(username)?;
        let user = with_tx!(self, |db_tx| {
            let invitation = invitations::Entity::find_by_id(code.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("invitation not exists".to_string()))?;
            if invitation.used {
                return Err(EngineError::Conflict("invitation already used".to_string()));
            }
            if self.find_user(&db_tx, &username).await?.is_some() {
                return Err(EngineError::ExistingKey(username));
            }

            let inviter = self.require_user(&db_tx, &invitation.inviter).await?;
            let inviter_code: ReferralCode = inviter.referral_code.parse()?;
            let children = users::Entity::find()
                .filter(users::Column::InvitedBy.eq(inviter.username.clone()))
                .count(&db_tx)
                .await?;
            let index = u32::try_from(children + 1).map_err(|_| {
                EngineError::InvalidReferralCode("too many invited users".to_string())
            })?;
            let referral_code = inviter_code.child(index)?;
            referral_code.ensure_child_of(&inviter_code)?;

            // Only one registration can flip `used`.
            let consumed = invitations::Entity::update_many()
                .col_expr(invitations::Column::Used, Expr::value(true))
                .col_expr(invitations::Column::InvitedUser, Expr::value(username.clone()))
                .filter(invitations::Column::Code.eq(invitation.code.clone()))
                .filter(invitations::Column::Used.eq(false))
                .exec(&db_tx)
                .await
                .map_err(|err| map_code_collision(err, &username))?;
            if consumed.rows_affected != 1 {
                return Err(EngineError::Conflict("invitation already used".to_string()));
            }

            let model = users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                is_root: ActiveValue::Set(false),
                referral_code: ActiveValue::Set(referral_code.to_string()),
                invited_by: ActiveValue::Set(Some(inviter.username.clone())),
                invites_left: ActiveValue::Set(self.invites_per_user),
                aggregated_rating: ActiveValue::Set(0.0),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| map_code_collision(err, &username))?;

            User::try_from(model)
        })?;

        tracing::info!(
            username = %user.username,
            code = %user.referral_code,
            invited_by = ?user.invited_by,
            "user registered"
        );
        Ok(user)
    }

    pub async fn user(&self, username: &str) -> ResultEngine<User> {
        let username = normalize_username(username)?;
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, &username).await?;
            User::try_from(model)
        })
    }

    /// Number of invite-tree edges between two users.
    pub async fn handshake_distance_between(&self, a: &str, b: &str) -> ResultEngine<u32> {
        let a = normalize_username(a)?;
        let b = normalize_username(b)?;
        with_tx!(self, |db_tx| {
            let a = User::try_from(self.require_user(&db_tx, &a).await?)?;
            let b = User::try_from(self.require_user(&db_tx, &b).await?)?;
            Ok(a.referral_code.distance_to(&b.referral_code))
        })
    }

    /// Invitations created by `inviter`, oldest first.
    pub async fn list_invitations(&self, inviter: &str) -> ResultEngine<Vec<Invitation>> {
        let inviter = normalize_username(inviter)?;
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &inviter).await?;
            let models = invitations::Entity::find()
                .filter(invitations::Column::Inviter.eq(inviter.clone()))
                .order_by_asc(invitations::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Invitation::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}

/// A unique violation while registering means another registration won the
/// same username, referral code or invitation.
fn map_code_collision(err: sea_orm::DbErr, username: &str) -> EngineError {
    if is_unique_violation(&err) {
        EngineError::Conflict(format!(
            "concurrent registration for {username}, please retry"
        ))
    } else {
        err.into()
    }
}
