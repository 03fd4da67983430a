//! Core of a peer-to-peer currency exchange board.
//!
//! Invite-only users post offers to swap a fixed amount of one currency for
//! another, counterparties apply, the author accepts one applicant and both
//! sides settle off-platform while the [`Engine`] tracks the four settlement
//! confirmations. Closed deals can be rated.
//!
//! All state lives in a SQL database accessed through `sea-orm`; every
//! [`Engine`] operation runs in its own database transaction.

pub use bank_details::BankDetail;
pub use commands::{NewBankDetailCmd, NewOfferCmd, NewRequestCmd, RateCmd};
pub use comments::TransactionComment;
pub use currency::Currency;
pub use error::EngineError;
pub use exchange_rates::{RateSnapshot, required_counterparty_amount};
pub use invitations::Invitation;
pub use limits::OfferLimits;
pub use money::Money;
pub use notifications::{LogSink, Notification, NotificationSink, NotifyError};
pub use offers::{Offer, OfferStatus};
pub use ops::{Engine, EngineBuilder, OfferListFilter};
pub use ratings::{MAX_SCORE, MIN_SCORE, Rating, aggregate_scores, validate_score};
pub use referral::{ReferralCode, handshake_distance};
pub use requests::{RequestForTransaction, RequestStatus};
pub use transactions::{
    Party, SettlementFlags, SettlementStage, SettlementStep, Transaction, TransactionStatus,
};
pub use users::User;

mod bank_details;
mod commands;
mod comments;
mod currency;
mod error;
mod exchange_rates;
mod invitations;
mod limits;
mod money;
mod notifications;
mod offers;
mod ops;
mod ratings;
mod referral;
mod requests;
mod transactions;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
