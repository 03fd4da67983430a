//! Settlement transaction primitives.
//!
//! A `Transaction` pairs an accepted offer with its counterparty and tracks
//! the manual bilateral settlement:
//!
//! 1. the author asserts the first transfer is done,
//! 2. the accepting user confirms receiving it,
//! 3. the accepting user asserts the return transfer is done,
//! 4. the author confirms receiving it, which closes transaction and offer.
//!
//! The four flags are independent and monotonic. [`SettlementStage`] is the
//! projection of the flags that callers and tests reason about.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Open,
    InProgress,
    Closed,
    Dispute,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Dispute => "dispute",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            "dispute" => Ok(Self::Dispute),
            other => Err(EngineError::Validation(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

/// The two sides of a settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The offer author.
    Author,
    /// The counterparty whose request was accepted.
    AcceptingUser,
}

impl Party {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::AcceptingUser => "accepting_user",
        }
    }
}

impl TryFrom<&str> for Party {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "author" => Ok(Self::Author),
            "accepting_user" => Ok(Self::AcceptingUser),
            other => Err(EngineError::Validation(format!("invalid party: {other}"))),
        }
    }
}

/// One of the four settlement flag writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStep {
    AuthorAssertsTransferDone,
    AcceptingUserConfirmsMoneyReceived,
    AcceptingUserAssertsTransferDone,
    AuthorConfirmsMoneyReceived,
}

impl SettlementStep {
    /// The only party allowed to perform the step.
    pub fn party(self) -> Party {
        match self {
            Self::AuthorAssertsTransferDone | Self::AuthorConfirmsMoneyReceived => Party::Author,
            Self::AcceptingUserConfirmsMoneyReceived | Self::AcceptingUserAssertsTransferDone => {
                Party::AcceptingUser
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorAssertsTransferDone => "author_asserts_transfer_done",
            Self::AcceptingUserConfirmsMoneyReceived => "accepting_user_confirms_money_received",
            Self::AcceptingUserAssertsTransferDone => "accepting_user_asserts_transfer_done",
            Self::AuthorConfirmsMoneyReceived => "author_confirms_money_received",
        }
    }
}

/// The four confirmation flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettlementFlags {
    pub author_asserts_transfer_done: bool,
    pub accepting_user_confirms_money_received: bool,
    pub accepting_user_asserts_transfer_done: bool,
    pub author_confirms_money_received: bool,
}

impl SettlementFlags {
    pub fn get(&self, step: SettlementStep) -> bool {
        match step {
            SettlementStep::AuthorAssertsTransferDone => self.author_asserts_transfer_done,
            SettlementStep::AcceptingUserConfirmsMoneyReceived => {
                self.accepting_user_confirms_money_received
            }
            SettlementStep::AcceptingUserAssertsTransferDone => {
                self.accepting_user_asserts_transfer_done
            }
            SettlementStep::AuthorConfirmsMoneyReceived => self.author_confirms_money_received,
        }
    }

    /// Sets a flag. There is deliberately no way to clear one.
    fn set(&mut self, step: SettlementStep) {
        match step {
            SettlementStep::AuthorAssertsTransferDone => self.author_asserts_transfer_done = true,
            SettlementStep::AcceptingUserConfirmsMoneyReceived => {
                self.accepting_user_confirms_money_received = true
            }
            SettlementStep::AcceptingUserAssertsTransferDone => {
                self.accepting_user_asserts_transfer_done = true
            }
            SettlementStep::AuthorConfirmsMoneyReceived => {
                self.author_confirms_money_received = true
            }
        }
    }

    pub fn stage(&self) -> SettlementStage {
        SettlementStage::from_flags(self)
    }
}

/// Settlement progress derived from the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    /// Nothing asserted yet.
    Opened,
    /// The author says the first leg is sent.
    AuthorAssertedPaid,
    /// The counterparty got the first leg but has not sent the return leg.
    AwaitingReturnLeg,
    /// The counterparty says the return leg is sent.
    ReturnLegAsserted,
    /// Both sides confirmed receipt.
    BothConfirmed,
}

impl SettlementStage {
    pub fn from_flags(flags: &SettlementFlags) -> Self {
        match (
            flags.accepting_user_confirms_money_received,
            flags.author_confirms_money_received,
            flags.accepting_user_asserts_transfer_done,
        ) {
            (true, true, _) => Self::BothConfirmed,
            (true, false, true) => Self::ReturnLegAsserted,
            (true, false, false) => Self::AwaitingReturnLeg,
            (false, _, _) if flags.author_asserts_transfer_done => Self::AuthorAssertedPaid,
            (false, _, _) => Self::Opened,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::AuthorAssertedPaid => "author_asserted_paid",
            Self::AwaitingReturnLeg => "awaiting_return_leg",
            Self::ReturnLegAsserted => "return_leg_asserted",
            Self::BothConfirmed => "both_confirmed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub accepting_user: String,
    pub flags: SettlementFlags,
    pub author_evidence: Option<String>,
    pub accepting_user_evidence: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(offer_id: Uuid, accepting_user: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            offer_id,
            accepting_user,
            flags: SettlementFlags::default(),
            author_evidence: None,
            accepting_user_evidence: None,
            status: TransactionStatus::Open,
            created_at,
            closed_at: None,
        }
    }

    pub fn stage(&self) -> SettlementStage {
        self.flags.stage()
    }

    pub fn is_closed(&self) -> bool {
        self.status == TransactionStatus::Closed
    }

    /// Which side `user` is on, given the offer author.
    pub fn party_of(&self, user: &str, offer_author: &str) -> Option<Party> {
        if user == offer_author {
            Some(Party::Author)
        } else if user == self.accepting_user {
            Some(Party::AcceptingUser)
        } else {
            None
        }
    }

    /// Applies a settlement step. Returns `false` when the flag was already
    /// set, which makes replays harmless.
    ///
    /// Closing requires the counterparty's confirmation: the author's final
    /// confirmation is the second of the two receipts.
    pub fn apply(&mut self, step: SettlementStep, now: DateTime<Utc>) -> ResultEngine<bool> {
        if self.flags.get(step) {
            return Ok(false);
        }
        if self.is_closed() {
            return Err(EngineError::Conflict("transaction is closed".to_string()));
        }

        match step {
            SettlementStep::AuthorConfirmsMoneyReceived => {
                if !self.flags.accepting_user_confirms_money_received {
                    return Err(EngineError::Conflict(
                        "accepting user has not confirmed receiving the transfer yet".to_string(),
                    ));
                }
                self.flags.set(step);
                self.status = TransactionStatus::Closed;
                self.closed_at = Some(now);
            }
            SettlementStep::AuthorAssertsTransferDone => {
                self.flags.set(step);
                if self.status == TransactionStatus::Open {
                    self.status = TransactionStatus::InProgress;
                }
            }
            SettlementStep::AcceptingUserConfirmsMoneyReceived
            | SettlementStep::AcceptingUserAssertsTransferDone => {
                self.flags.set(step);
            }
        }
        Ok(true)
    }

    /// Stores a proof-of-transfer reference for `party`. Flags are untouched.
    pub fn attach_evidence(&mut self, party: Party, image_ref: &str) -> ResultEngine<()> {
        let image_ref = image_ref.trim();
        if image_ref.is_empty() {
            return Err(EngineError::Validation(
                "evidence reference must not be empty".to_string(),
            ));
        }
        if self.is_closed() {
            return Err(EngineError::Conflict("transaction is closed".to_string()));
        }
        match party {
            Party::Author => self.author_evidence = Some(image_ref.to_string()),
            Party::AcceptingUser => self.accepting_user_evidence = Some(image_ref.to_string()),
        }
        Ok(())
    }

    /// Escalates to a dispute. Returns `false` if already disputed.
    pub fn open_dispute(&mut self) -> ResultEngine<bool> {
        match self.status {
            TransactionStatus::Closed => Err(EngineError::Conflict(
                "cannot dispute a closed transaction".to_string(),
            )),
            TransactionStatus::Dispute => Ok(false),
            TransactionStatus::Open | TransactionStatus::InProgress => {
                self.status = TransactionStatus::Dispute;
                Ok(true)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub offer_id: String,
    pub accepting_user: String,
    pub author_asserts_transfer_done: bool,
    pub accepting_user_confirms_money_received: bool,
    pub accepting_user_asserts_transfer_done: bool,
    pub author_confirms_money_received: bool,
    pub author_evidence: Option<String>,
    pub accepting_user_evidence: Option<String>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
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
    #[sea_orm(has_many = "super::ratings::Entity")]
    Ratings,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl Related<super::ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ratings.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            offer_id: ActiveValue::Set(tx.offer_id.to_string()),
            accepting_user: ActiveValue::Set(tx.accepting_user.clone()),
            author_asserts_transfer_done: ActiveValue::Set(tx.flags.author_asserts_transfer_done),
            accepting_user_confirms_money_received: ActiveValue::Set(
                tx.flags.accepting_user_confirms_money_received,
            ),
            accepting_user_asserts_transfer_done: ActiveValue::Set(
                tx.flags.accepting_user_asserts_transfer_done,
            ),
            author_confirms_money_received: ActiveValue::Set(
                tx.flags.author_confirms_money_received,
            ),
            author_evidence: ActiveValue::Set(tx.author_evidence.clone()),
            accepting_user_evidence: ActiveValue::Set(tx.accepting_user_evidence.clone()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            created_at: ActiveValue::Set(tx.created_at),
            closed_at: ActiveValue::Set(tx.closed_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            offer_id: parse_uuid(&model.offer_id, "offer")?,
            accepting_user: model.accepting_user,
            flags: SettlementFlags {
                author_asserts_transfer_done: model.author_asserts_transfer_done,
                accepting_user_confirms_money_received: model
                    .accepting_user_confirms_money_received,
                accepting_user_asserts_transfer_done: model.accepting_user_asserts_transfer_done,
                author_confirms_money_received: model.author_confirms_money_received,
            },
            author_evidence: model.author_evidence,
            accepting_user_evidence: model.accepting_user_evidence,
            status: TransactionStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            closed_at: model.closed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Transaction {
        Transaction::new(Uuid::new_v4(), "bob".to_string(), Utc::now())
    }

    #[test]
    fn stage_projection_follows_the_flags() {
        let mut flags = SettlementFlags::default();
        assert_eq!(flags.stage(), SettlementStage::Opened);

        flags.author_asserts_transfer_done = true;
        assert_eq!(flags.stage(), SettlementStage::AuthorAssertedPaid);

        flags.accepting_user_confirms_money_received = true;
        assert_eq!(flags.stage(), SettlementStage::AwaitingReturnLeg);

        flags.accepting_user_asserts_transfer_done = true;
        assert_eq!(flags.stage(), SettlementStage::ReturnLegAsserted);

        flags.author_confirms_money_received = true;
        assert_eq!(flags.stage(), SettlementStage::BothConfirmed);
    }

    #[test]
    fn both_confirmed_ignores_return_leg_assertion() {
        let flags = SettlementFlags {
            accepting_user_confirms_money_received: true,
            author_confirms_money_received: true,
            ..SettlementFlags::default()
        };
        assert_eq!(flags.stage(), SettlementStage::BothConfirmed);
    }

    #[test]
    fn author_assertion_moves_open_to_in_progress() {
        let mut tx = fresh();
        assert!(tx.apply(SettlementStep::AuthorAssertsTransferDone, Utc::now()).unwrap());
        assert_eq!(tx.status, TransactionStatus::InProgress);
        // Replays are no-ops.
        assert!(!tx.apply(SettlementStep::AuthorAssertsTransferDone, Utc::now()).unwrap());
    }

    #[test]
    fn closing_requires_counterparty_confirmation() {
        let mut tx = fresh();
        let err = tx
            .apply(SettlementStep::AuthorConfirmsMoneyReceived, Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(!tx.flags.author_confirms_money_received);

        tx.apply(SettlementStep::AcceptingUserConfirmsMoneyReceived, Utc::now())
            .unwrap();
        tx.apply(SettlementStep::AuthorConfirmsMoneyReceived, Utc::now())
            .unwrap();
        assert!(tx.is_closed());
        assert!(tx.closed_at.is_some());
    }

    #[test]
    fn closed_is_terminal() {
        let mut tx = fresh();
        tx.apply(SettlementStep::AcceptingUserConfirmsMoneyReceived, Utc::now())
            .unwrap();
        tx.apply(SettlementStep::AuthorConfirmsMoneyReceived, Utc::now())
            .unwrap();

        let err = tx
            .apply(SettlementStep::AcceptingUserAssertsTransferDone, Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(tx.open_dispute().is_err());
        assert!(tx.attach_evidence(Party::Author, "shot.png").is_err());
    }

    #[test]
    fn dispute_is_kept_when_author_asserts() {
        let mut tx = fresh();
        assert!(tx.open_dispute().unwrap());
        assert!(!tx.open_dispute().unwrap());
        tx.apply(SettlementStep::AuthorAssertsTransferDone, Utc::now())
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Dispute);
    }

    #[test]
    fn evidence_does_not_move_flags() {
        let mut tx = fresh();
        tx.attach_evidence(Party::AcceptingUser, "screenshots/1.png")
            .unwrap();
        assert_eq!(tx.accepting_user_evidence.as_deref(), Some("screenshots/1.png"));
        assert_eq!(tx.flags, SettlementFlags::default());
        assert!(tx.attach_evidence(Party::Author, "   ").is_err());
    }
}
