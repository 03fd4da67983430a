use std::{fmt, sync::Arc};

use chrono::Duration;
use sea_orm::DatabaseConnection;

use crate::{EngineError, LogSink, Notification, NotificationSink, OfferLimits, ResultEngine};

mod access;
mod bank_details;
mod offers;
mod rates;
mod ratings;
mod referrals;
mod requests;
mod settlement;

pub use offers::OfferListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The block must evaluate to a `ResultEngine<_>`; an early `?` drops the
/// transaction, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

const DEFAULT_INVITES_PER_USER: i32 = 3;
const DEFAULT_RATE_MAX_AGE_HOURS: i64 = 12;

pub struct Engine {
    database: DatabaseConnection,
    limits: OfferLimits,
    invites_per_user: i32,
    rate_max_age: Duration,
    notifier: Arc<dyn NotificationSink>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("limits", &self.limits)
            .field("invites_per_user", &self.invites_per_user)
            .field("rate_max_age", &self.rate_max_age)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn offer_limits(&self) -> &OfferLimits {
        &self.limits
    }

    /// Hands a committed event to the sink. Failures are logged and dropped.
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.deliver(&notification) {
            tracing::warn!(
                kind = notification.kind(),
                error = %err,
                "notification delivery failed"
            );
        }
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    limits: OfferLimits,
    invites_per_user: i32,
    rate_max_age: Duration,
    notifier: Arc<dyn NotificationSink>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            limits: OfferLimits::default(),
            invites_per_user: DEFAULT_INVITES_PER_USER,
            rate_max_age: Duration::hours(DEFAULT_RATE_MAX_AGE_HOURS),
            notifier: Arc::new(LogSink),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Per-currency ceilings for new offers.
    pub fn offer_limits(mut self, limits: OfferLimits) -> EngineBuilder {
        self.limits = limits;
        self
    }

    /// Invitations granted to every new user.
    pub fn invites_per_user(mut self, invites: i32) -> EngineBuilder {
        self.invites_per_user = invites;
        self
    }

    /// Age after which the latest rate snapshot needs a refresh.
    pub fn rate_max_age(mut self, max_age: Duration) -> EngineBuilder {
        self.rate_max_age = max_age;
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.notifier = sink;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.invites_per_user < 0 {
            return Err(EngineError::Validation(
                "invites_per_user must be >= 0".to_string(),
            ));
        }
        if self.rate_max_age <= Duration::zero() {
            return Err(EngineError::Validation(
                "rate max age must be positive".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            limits: self.limits,
            invites_per_user: self.invites_per_user,
            rate_max_age: self.rate_max_age,
            notifier: self.notifier,
        })
    }
}
