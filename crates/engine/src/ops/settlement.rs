use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Notification, OfferStatus, Party, ResultEngine, SettlementStep, Transaction,
    TransactionComment, TransactionStatus, comments, transactions,
    util::{normalize_required_text, normalize_username},
};

use super::{Engine, with_tx};

fn step_column(step: SettlementStep) -> transactions::Column {
    match step {
        SettlementStep::AuthorAssertsTransferDone => {
            transactions::Column::AuthorAssertsTransferDone
        }
        SettlementStep::AcceptingUserConfirmsMoneyReceived => {
            transactions::Column::AcceptingUserConfirmsMoneyReceived
        }
        SettlementStep::AcceptingUserAssertsTransferDone => {
            transactions::Column::AcceptingUserAssertsTransferDone
        }
        SettlementStep::AuthorConfirmsMoneyReceived => {
            transactions::Column::AuthorConfirmsMoneyReceived
        }
    }
}

impl Engine {
    /// The author says the first leg has been sent.
    pub async fn author_asserts_transfer_done(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Transaction> {
        self.apply_settlement_step(transaction_id, actor, SettlementStep::AuthorAssertsTransferDone)
            .await
    }

    /// The accepting user confirms the first leg arrived.
    pub async fn accepting_user_confirms_money_received(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Transaction> {
        self.apply_settlement_step(
            transaction_id,
            actor,
            SettlementStep::AcceptingUserConfirmsMoneyReceived,
        )
        .await
    }

    /// The accepting user says the return leg has been sent.
    pub async fn accepting_user_asserts_transfer_done(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Transaction> {
        self.apply_settlement_step(
            transaction_id,
            actor,
            SettlementStep::AcceptingUserAssertsTransferDone,
        )
        .await
    }

    /// The author confirms the return leg arrived. This closes the
    /// transaction and its offer.
    pub async fn author_confirms_money_received(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Transaction> {
        self.apply_settlement_step(
            transaction_id,
            actor,
            SettlementStep::AuthorConfirmsMoneyReceived,
        )
        .await
    }

    /// Record one settlement confirmation on behalf of `actor`.
    ///
    /// Only the party that owns `step` may perform it. Re-sending a step that
    /// is already recorded returns the transaction unchanged.
    pub async fn apply_settlement_step(
        &self,
        transaction_id: Uuid,
        actor: &str,
        step: SettlementStep,
    ) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        let (view, changed) = with_tx!(self, |db_tx| {
            let mut view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            if view.party != Some(step.party()) {
                return Err(EngineError::Forbidden(format!(
                    "{actor} cannot perform {}",
                    step.as_str()
                )));
            }

            let status_before = view.transaction.status;
            let changed = view.transaction.apply(step, Utc::now())?;
            if changed {
                let tx = &view.transaction;
                let mut update = transactions::Entity::update_many()
                    .col_expr(step_column(step), Expr::value(true))
                    .filter(transactions::Column::Id.eq(tx.id.to_string()))
                    .filter(transactions::Column::Status.ne(TransactionStatus::Closed.as_str()));
                // Status and closed_at are only written by the step that moves them.
                if tx.status != status_before {
                    update = update
                        .col_expr(transactions::Column::Status, Expr::value(tx.status.as_str()))
                        .col_expr(transactions::Column::ClosedAt, Expr::value(tx.closed_at))
                        .filter(transactions::Column::Status.eq(status_before.as_str()));
                }
                let updated = update.exec(&db_tx).await?;
                if updated.rows_affected != 1 {
                    return Err(EngineError::Conflict(
                        "transaction changed concurrently, please retry".to_string(),
                    ));
                }
                if tx.is_closed() {
                    self.set_offer_status(&db_tx, &view.offer, OfferStatus::Closed)
                        .await?;
                }
            }
            Ok((view, changed))
        })?;

        if changed {
            let tx = &view.transaction;
            tracing::info!(
                transaction_id = %tx.id,
                step = step.as_str(),
                stage = tx.stage().as_str(),
                status = tx.status.as_str(),
                "settlement step recorded"
            );
            self.notify(Notification::SettlementProgress {
                transaction_id: tx.id,
                step,
                actor: actor.clone(),
                recipient: view.counterpart(step.party()).to_string(),
            });
            if tx.is_closed() {
                self.notify(Notification::TransactionClosed {
                    transaction_id: tx.id,
                    offer_id: tx.offer_id,
                });
            }
        }
        Ok(view.transaction)
    }

    /// Attach a proof-of-transfer reference. Flags are not touched.
    pub async fn upload_evidence(
        &self,
        transaction_id: Uuid,
        actor: &str,
        role: Party,
        image_ref: &str,
    ) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        with_tx!(self, |db_tx| {
            let mut view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            if view.party != Some(role) {
                return Err(EngineError::Forbidden(format!(
                    "{actor} cannot upload evidence as {}",
                    role.as_str()
                )));
            }
            view.transaction.attach_evidence(role, image_ref)?;
            let (column, value) = match role {
                Party::Author => (
                    transactions::Column::AuthorEvidence,
                    view.transaction.author_evidence.clone(),
                ),
                Party::AcceptingUser => (
                    transactions::Column::AcceptingUserEvidence,
                    view.transaction.accepting_user_evidence.clone(),
                ),
            };
            transactions::Entity::update_many()
                .col_expr(column, Expr::value(value))
                .filter(transactions::Column::Id.eq(transaction_id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(view.transaction)
        })
    }

    /// Escalate a transaction to a dispute. Participants only.
    pub async fn open_dispute(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        let (transaction, opened) = with_tx!(self, |db_tx| {
            let mut view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            if view.party.is_none() {
                return Err(EngineError::Forbidden(format!(
                    "{actor} is not part of this transaction"
                )));
            }
            let opened = view.transaction.open_dispute()?;
            if opened {
                self.write_status(&db_tx, &view.transaction).await?;
            }
            Ok((view.transaction, opened))
        })?;

        if opened {
            tracing::warn!(transaction_id = %transaction.id, opened_by = %actor, "dispute opened");
            self.notify(Notification::DisputeOpened {
                transaction_id: transaction.id,
                opened_by: actor,
            });
        }
        Ok(transaction)
    }

    /// Participants and root users may read a transaction.
    pub async fn transaction(&self, transaction_id: Uuid, actor: &str) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        with_tx!(self, |db_tx| {
            let view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            self.require_can_view(&db_tx, &view, &actor).await?;
            Ok(view.transaction)
        })
    }

    pub async fn transaction_for_offer(&self, offer_id: Uuid) -> ResultEngine<Option<Transaction>> {
        with_tx!(self, |db_tx| {
            transactions::Entity::find()
                .filter(transactions::Column::OfferId.eq(offer_id.to_string()))
                .one(&db_tx)
                .await?
                .map(Transaction::try_from)
                .transpose()
        })
    }

    pub async fn add_comment(
        &self,
        transaction_id: Uuid,
        actor: &str,
        content: &str,
    ) -> ResultEngine<TransactionComment> {
        let actor = normalize_username(actor)?;
        let content = normalize_required_text(content, "comment")?;
        with_tx!(self, |db_tx| {
            let view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            self.require_can_view(&db_tx, &view, &actor).await?;
            let comment = TransactionComment::new(
                view.transaction.id,
                actor.clone(),
                content.clone(),
                Utc::now(),
            );
            comments::ActiveModel::from(&comment).insert(&db_tx).await?;
            Ok(comment)
        })
    }

    /// Comments on a transaction, oldest first.
    pub async fn comments(
        &self,
        transaction_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Vec<TransactionComment>> {
        let actor = normalize_username(actor)?;
        with_tx!(self, |db_tx| {
            let view = self.settlement_view(&db_tx, transaction_id, &actor).await?;
            self.require_can_view(&db_tx, &view, &actor).await?;
            comments::Entity::find()
                .filter(comments::Column::TransactionId.eq(transaction_id.to_string()))
                .order_by_asc(comments::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(TransactionComment::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    async fn write_status(&self, db: &DatabaseTransaction, tx: &Transaction) -> ResultEngine<()> {
        transactions::Entity::update_many()
            .col_expr(transactions::Column::Status, Expr::value(tx.status.as_str()))
            .filter(transactions::Column::Id.eq(tx.id.to_string()))
            .exec(db)
            .await?;
        Ok(())
    }
}
