//! The module contains the errors the engine can return.
//!
//! Every engine operation returns a [`ResultEngine`], so callers always get a
//! tagged error instead of a panic. The main groups are:
//!
//! - [`Validation`]: bad input or a violated business rule (same-currency
//!   offer, amount over ceiling, unknown currency code).
//! - [`InvalidAmount`]: a decimal amount that does not parse.
//! - [`Forbidden`]: the wrong actor called a role-restricted operation.
//! - [`KeyNotFound`]: the referenced entity does not exist.
//! - [`DuplicateRequest`] / [`SelfRequest`] / [`OfferNotOpen`]: request
//!   arbitration rejections.
//! - [`Conflict`]: the transition is not allowed from the current state.
//!
//!  [`ResultEngine`]: crate::ResultEngine
//!  [`Validation`]: EngineError::Validation
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`DuplicateRequest`]: EngineError::DuplicateRequest
//!  [`SelfRequest`]: EngineError::SelfRequest
//!  [`OfferNotOpen`]: EngineError::OfferNotOpen
//!  [`Conflict`]: EngineError::Conflict
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid referral code: {0}")]
    InvalidReferralCode(String),
    #[error("Invalid score {0}: must be between 1 and 5")]
    InvalidScore(i32),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),
    #[error("Cannot apply to your own offer: {0}")]
    SelfRequest(String),
    #[error("Offer is not open: {0}")]
    OfferNotOpen(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for errors the caller caused (bad input, wrong actor,
    /// invalid state), as opposed to storage failures.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidReferralCode(a), Self::InvalidReferralCode(b)) => a == b,
            (Self::InvalidScore(a), Self::InvalidScore(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::DuplicateRequest(a), Self::DuplicateRequest(b)) => a == b,
            (Self::SelfRequest(a), Self::SelfRequest(b)) => a == b,
            (Self::OfferNotOpen(a), Self::OfferNotOpen(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Returns `true` when the storage rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
