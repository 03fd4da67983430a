use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    EngineError, NewRequestCmd, Notification, Offer, OfferStatus, RequestForTransaction,
    RequestStatus, ResultEngine, Transaction, error::is_unique_violation, requests, transactions,
    util::normalize_username,
};

use super::{Engine, with_tx};

impl Engine {
    /// Apply to an open offer.
    pub async fn submit_request(&self, cmd: NewRequestCmd) -> ResultEngine<RequestForTransaction> {
        let applicant = normalize_username(&cmd.applicant)?;
        let (request, offer_author) = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &applicant).await?;
            let offer = self.require_offer(&db_tx, cmd.offer_id).await?;
            if offer.author == applicant {
                return Err(EngineError::SelfRequest(offer.id.to_string()));
            }
            if !offer.is_open() {
                return Err(EngineError::OfferNotOpen(format!(
                    "offer {} is {}",
                    offer.id,
                    offer.status.as_str()
                )));
            }

            // Any earlier request, even a rejected one, blocks a new one.
            let existing = requests::Entity::find()
                .filter(requests::Column::OfferId.eq(offer.id.to_string()))
                .filter(requests::Column::Applicant.eq(applicant.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::DuplicateRequest(format!(
                    "{applicant} already applied to offer {}",
                    offer.id
                )));
            }

            // The author pays `currency_offered` into the applicant's account.
            self.require_bank_detail(
                &db_tx,
                cmd.bank_detail_id,
                &applicant,
                offer.currency_offered,
            )
            .await?;

            let request = RequestForTransaction::new(
                offer.id,
                applicant.clone(),
                cmd.bank_detail_id,
                cmd.applied_at,
            );
            requests::ActiveModel::from(&request)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        EngineError::DuplicateRequest(format!(
                            "{applicant} already applied to offer {}",
                            offer.id
                        ))
                    } else {
                        err.into()
                    }
                })?;
            Ok((request, offer.author))
        })?;

        tracing::info!(
            request_id = %request.id,
            offer_id = %request.offer_id,
            applicant = %request.applicant,
            "request submitted"
        );
        self.notify(Notification::RequestSubmitted {
            request_id: request.id,
            offer_id: request.offer_id,
            applicant: request.applicant.clone(),
            offer_author,
        });
        Ok(request)
    }

    /// Accept a pending request: the offer moves to `in_progress` and its
    /// settlement transaction is created.
    ///
    /// Accepting the same request again returns the existing transaction.
    /// Other pending requests for the offer are left untouched.
    pub async fn accept_request(&self, request_id: Uuid, actor: &str) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        let (request, transaction, newly_accepted) = with_tx!(self, |db_tx| {
            let model = self.require_request(&db_tx, request_id).await?;
            let mut request = RequestForTransaction::try_from(model)?;
            let offer = self.require_offer(&db_tx, request.offer_id).await?;
            if offer.author != actor {
                return Err(EngineError::Forbidden(
                    "only the offer author can accept requests".to_string(),
                ));
            }

            match request.status {
                RequestStatus::Rejected => Err(EngineError::Conflict(
                    "request was already rejected".to_string(),
                )),
                RequestStatus::Accepted => {
                    let (transaction, _) = self
                        .get_or_create_transaction(&db_tx, &offer, &request.applicant)
                        .await?;
                    Ok((request, transaction, false))
                }
                RequestStatus::Pending => {
                    if offer.status == OfferStatus::Closed {
                        return Err(EngineError::Conflict("offer is closed".to_string()));
                    }
                    let (transaction, _) = self
                        .get_or_create_transaction(&db_tx, &offer, &request.applicant)
                        .await?;
                    self.move_offer_to_in_progress(&db_tx, &offer).await?;

                    let updated = requests::Entity::update_many()
                        .col_expr(
                            requests::Column::Status,
                            Expr::value(RequestStatus::Accepted.as_str()),
                        )
                        .filter(requests::Column::Id.eq(request.id.to_string()))
                        .filter(requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                        .exec(&db_tx)
                        .await?;
                    if updated.rows_affected != 1 {
                        return Err(EngineError::Conflict(
                            "request changed concurrently, please retry".to_string(),
                        ));
                    }
                    request.status = RequestStatus::Accepted;
                    Ok((request, transaction, true))
                }
            }
        })?;

        if newly_accepted {
            tracing::info!(
                request_id = %request.id,
                offer_id = %request.offer_id,
                transaction_id = %transaction.id,
                "request accepted"
            );
            self.notify(Notification::RequestAccepted {
                request_id: request.id,
                offer_id: request.offer_id,
                transaction_id: transaction.id,
                applicant: request.applicant,
            });
        }
        Ok(transaction)
    }

    /// Decline a pending request. Rejecting twice is a no-op.
    pub async fn reject_request(
        &self,
        request_id: Uuid,
        actor: &str,
    ) -> ResultEngine<RequestForTransaction> {
        let actor = normalize_username(actor)?;
        let (request, newly_rejected) = with_tx!(self, |db_tx| {
            let model = self.require_request(&db_tx, request_id).await?;
            let mut request = RequestForTransaction::try_from(model)?;
            let offer = self.require_offer(&db_tx, request.offer_id).await?;
            if offer.author != actor {
                return Err(EngineError::Forbidden(
                    "only the offer author can reject requests".to_string(),
                ));
            }
            match request.status {
                RequestStatus::Rejected => Ok((request, false)),
                RequestStatus::Accepted => Err(EngineError::Conflict(
                    "request was already accepted".to_string(),
                )),
                RequestStatus::Pending => {
                    let updated = requests::Entity::update_many()
                        .col_expr(
                            requests::Column::Status,
                            Expr::value(RequestStatus::Rejected.as_str()),
                        )
                        .filter(requests::Column::Id.eq(request.id.to_string()))
                        .filter(requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                        .exec(&db_tx)
                        .await?;
                    if updated.rows_affected != 1 {
                        return Err(EngineError::Conflict(
                            "request changed concurrently, please retry".to_string(),
                        ));
                    }
                    request.status = RequestStatus::Rejected;
                    Ok((request, true))
                }
            }
        })?;

        if newly_rejected {
            tracing::info!(request_id = %request.id, offer_id = %request.offer_id, "request rejected");
            self.notify(Notification::RequestRejected {
                request_id: request.id,
                offer_id: request.offer_id,
                applicant: request.applicant.clone(),
            });
        }
        Ok(request)
    }

    /// Take an offer directly, without going through a request.
    pub async fn start_transaction(&self, offer_id: Uuid, actor: &str) -> ResultEngine<Transaction> {
        let actor = normalize_username(actor)?;
        let (transaction, created) = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, &actor).await?;
            let offer = self.require_offer(&db_tx, offer_id).await?;
            if offer.author == actor {
                return Err(EngineError::SelfRequest(offer.id.to_string()));
            }
            let (transaction, created) = self
                .get_or_create_transaction(&db_tx, &offer, &actor)
                .await?;
            self.move_offer_to_in_progress(&db_tx, &offer).await?;
            Ok((transaction, created))
        })?;

        if created {
            tracing::info!(
                transaction_id = %transaction.id,
                offer_id = %transaction.offer_id,
                accepting_user = %transaction.accepting_user,
                "transaction started"
            );
            self.notify(Notification::TransactionStarted {
                transaction_id: transaction.id,
                offer_id: transaction.offer_id,
                accepting_user: transaction.accepting_user.clone(),
            });
        }
        Ok(transaction)
    }

    /// Requests still in play for an offer, oldest first. Author only.
    pub async fn requests_for_offer(
        &self,
        offer_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Vec<RequestForTransaction>> {
        let actor = normalize_username(actor)?;
        with_tx!(self, |db_tx| {
            let offer = self.require_offer(&db_tx, offer_id).await?;
            if offer.author != actor {
                return Err(EngineError::Forbidden(
                    "only the offer author can list its requests".to_string(),
                ));
            }
            requests::Entity::find()
                .filter(requests::Column::OfferId.eq(offer_id.to_string()))
                .filter(requests::Column::Status.ne(RequestStatus::Rejected.as_str()))
                .order_by_asc(requests::Column::AppliedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(RequestForTransaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub async fn request(&self, request_id: Uuid) -> ResultEngine<RequestForTransaction> {
        with_tx!(self, |db_tx| {
            let model = self.require_request(&db_tx, request_id).await?;
            RequestForTransaction::try_from(model)
        })
    }

    /// Insert-if-absent keyed on the offer, then read back the winner.
    ///
    /// Returns the transaction and whether this call created it. A stored
    /// transaction for a different counterparty is a conflict.
    async fn get_or_create_transaction(
        &self,
        db: &DatabaseTransaction,
        offer: &Offer,
        accepting_user: &str,
    ) -> ResultEngine<(Transaction, bool)> {
        let offer_key = offer.id.to_string();
        let existing = transactions::Entity::find()
            .filter(transactions::Column::OfferId.eq(offer_key.clone()))
            .one(db)
            .await?;

        let created = match existing {
            Some(_) => false,
            None => {
                if !offer.is_open() {
                    return Err(EngineError::Conflict(format!(
                        "offer {} is {}",
                        offer.id,
                        offer.status.as_str()
                    )));
                }
                let candidate =
                    Transaction::new(offer.id, accepting_user.to_string(), Utc::now());
                let inserted = transactions::Entity::insert(transactions::ActiveModel::from(
                    &candidate,
                ))
                .on_conflict(
                    OnConflict::column(transactions::Column::OfferId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
                inserted == 1
            }
        };

        let model = transactions::Entity::find()
            .filter(transactions::Column::OfferId.eq(offer_key))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        let transaction = Transaction::try_from(model)?;
        if transaction.accepting_user != accepting_user {
            return Err(EngineError::Conflict(format!(
                "offer {} is already taken by another user",
                offer.id
            )));
        }
        Ok((transaction, created))
    }
}
