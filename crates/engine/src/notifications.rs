//! Outbound notifications.
//!
//! The engine emits a [`Notification`] after a state change has been
//! committed. Delivery is best effort: a failing [`NotificationSink`] is logged
//! and never rolls anything back.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{Currency, Money, SettlementStep};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    NewOffer {
        offer_id: Uuid,
        author: String,
        currency_offered: Currency,
        amount_offered: Money,
        currency_needed: Currency,
    },
    RequestSubmitted {
        request_id: Uuid,
        offer_id: Uuid,
        applicant: String,
        offer_author: String,
    },
    RequestAccepted {
        request_id: Uuid,
        offer_id: Uuid,
        transaction_id: Uuid,
        applicant: String,
    },
    RequestRejected {
        request_id: Uuid,
        offer_id: Uuid,
        applicant: String,
    },
    TransactionStarted {
        transaction_id: Uuid,
        offer_id: Uuid,
        accepting_user: String,
    },
    SettlementProgress {
        transaction_id: Uuid,
        step: SettlementStep,
        actor: String,
        /// The participant who should act next.
        recipient: String,
    },
    TransactionClosed {
        transaction_id: Uuid,
        offer_id: Uuid,
    },
    DisputeOpened {
        transaction_id: Uuid,
        opened_by: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewOffer { .. } => "new_offer",
            Self::RequestSubmitted { .. } => "request_submitted",
            Self::RequestAccepted { .. } => "request_accepted",
            Self::RequestRejected { .. } => "request_rejected",
            Self::TransactionStarted { .. } => "transaction_started",
            Self::SettlementProgress { .. } => "settlement_progress",
            Self::TransactionClosed { .. } => "transaction_closed",
            Self::DisputeOpened { .. } => "dispute_opened",
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivery seam for notifications (email, chat bot, queue...).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Default sink: writes every notification to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)?;
        tracing::info!(kind = notification.kind(), %payload, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_serialize_with_a_kind_tag() {
        let n = Notification::DisputeOpened {
            transaction_id: Uuid::nil(),
            opened_by: "bob".to_string(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "dispute_opened");
        assert_eq!(json["opened_by"], "bob");
        assert_eq!(n.kind(), "dispute_opened");
    }

    #[test]
    fn log_sink_accepts_everything() {
        let n = Notification::TransactionClosed {
            transaction_id: Uuid::nil(),
            offer_id: Uuid::nil(),
        };
        assert!(LogSink.deliver(&n).is_ok());
    }
}
