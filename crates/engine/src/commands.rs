//! Command structs for engine operations.
//!
//! These types group parameters for write operations (offers, requests,
//! ratings, bank details), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Currency, Money};

/// Publish a new offer.
#[derive(Clone, Debug)]
pub struct NewOfferCmd {
    pub author: String,
    pub currency_offered: Currency,
    pub amount_offered: Money,
    pub currency_needed: Currency,
    pub bank_detail_id: Option<Uuid>,
    pub published_at: DateTime<Utc>,
}

impl NewOfferCmd {
    #[must_use]
    pub fn new(
        author: impl Into<String>,
        currency_offered: Currency,
        amount_offered: Money,
        currency_needed: Currency,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            author: author.into(),
            currency_offered,
            amount_offered,
            currency_needed,
            bank_detail_id: None,
            published_at,
        }
    }

    /// Where the counterparty should send `currency_needed`.
    #[must_use]
    pub fn bank_detail(mut self, bank_detail_id: Uuid) -> Self {
        self.bank_detail_id = Some(bank_detail_id);
        self
    }
}

/// Apply to someone else's offer.
#[derive(Clone, Debug)]
pub struct NewRequestCmd {
    pub offer_id: Uuid,
    pub applicant: String,
    pub bank_detail_id: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
}

impl NewRequestCmd {
    #[must_use]
    pub fn new(offer_id: Uuid, applicant: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            offer_id,
            applicant: applicant.into(),
            bank_detail_id: None,
            applied_at,
        }
    }

    /// Where the author should send `currency_offered`.
    #[must_use]
    pub fn bank_detail(mut self, bank_detail_id: Uuid) -> Self {
        self.bank_detail_id = Some(bank_detail_id);
        self
    }
}

/// Rate the other participant of a closed transaction.
#[derive(Clone, Debug)]
pub struct RateCmd {
    pub transaction_id: Uuid,
    pub rater: String,
    pub ratee: String,
    pub score: i32,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

impl RateCmd {
    #[must_use]
    pub fn new(
        transaction_id: Uuid,
        rater: impl Into<String>,
        ratee: impl Into<String>,
        score: i32,
        rated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            rater: rater.into(),
            ratee: ratee.into(),
            score,
            comment: None,
            rated_at,
        }
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Register payment instructions for a currency.
#[derive(Clone, Debug)]
pub struct NewBankDetailCmd {
    pub user_id: String,
    pub currency: Currency,
    pub bank_name: Option<String>,
    pub account_or_phone: Option<String>,
    pub recipient_name: Option<String>,
}

impl NewBankDetailCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, currency: Currency) -> Self {
        Self {
            user_id: user_id.into(),
            currency,
            bank_name: None,
            account_or_phone: None,
            recipient_name: None,
        }
    }

    #[must_use]
    pub fn bank_name(mut self, bank_name: impl Into<String>) -> Self {
        self.bank_name = Some(bank_name.into());
        self
    }

    #[must_use]
    pub fn account_or_phone(mut self, account_or_phone: impl Into<String>) -> Self {
        self.account_or_phone = Some(account_or_phone.into());
        self
    }

    #[must_use]
    pub fn recipient_name(mut self, recipient_name: impl Into<String>) -> Self {
        self.recipient_name = Some(recipient_name.into());
        self
    }
}
