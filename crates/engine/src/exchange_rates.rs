//! Exchange-rate snapshots and the counterparty amount they imply.
//!
//! The engine never fetches rates itself. A collector stores snapshots with
//! `Engine::record_rates` and readers degrade to `None` when nothing usable is
//! stored.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, Offer, util::parse_uuid};

/// Rates as quote units per one base unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub id: Uuid,
    /// RUB per USD.
    pub usd_rub: f64,
    /// MNT per RUB.
    pub rub_mnt: f64,
    /// MNT per USD.
    pub usd_mnt: f64,
    /// Second USD/RUB source, informational only.
    pub usd_rub_alternative: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(
        usd_rub: f64,
        rub_mnt: f64,
        usd_mnt: f64,
        usd_rub_alternative: Option<f64>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            usd_rub,
            rub_mnt,
            usd_mnt,
            usd_rub_alternative,
            fetched_at,
        }
    }

    /// Returns `true` when the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.fetched_at > max_age
    }

    /// Converts `amount` of `from` into `to`.
    ///
    /// `None` for identical currencies or when the relevant rate is unusable.
    pub fn convert(&self, amount: Money, from: Currency, to: Currency) -> Option<Money> {
        let (rate, invert) = match (from, to) {
            (Currency::Usd, Currency::Rub) => (self.usd_rub, false),
            (Currency::Rub, Currency::Usd) => (self.usd_rub, true),
            (Currency::Rub, Currency::Mnt) => (self.rub_mnt, false),
            (Currency::Mnt, Currency::Rub) => (self.rub_mnt, true),
            (Currency::Usd, Currency::Mnt) => (self.usd_mnt, false),
            (Currency::Mnt, Currency::Usd) => (self.usd_mnt, true),
            _ => return None,
        };
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        amount.convert(if invert { 1.0 / rate } else { rate })
    }
}

/// Amount of `offer.currency_needed` the counterparty should send back.
///
/// ```
/// use chrono::Utc;
/// use engine::{Currency, Money, Offer, RateSnapshot, required_counterparty_amount};
///
/// let offer = Offer::new(
///     "alice".into(),
///     Currency::Usd,
///     Money::from_major(10),
///     Currency::Rub,
///     None,
///     Utc::now(),
/// )
/// .unwrap();
/// let rates = RateSnapshot::new(90.0, 27.0, 2430.0, None, Utc::now());
///
/// assert_eq!(
///     required_counterparty_amount(&offer, Some(&rates)),
///     Some(Money::from_major(900))
/// );
/// assert_eq!(required_counterparty_amount(&offer, None), None);
/// ```
pub fn required_counterparty_amount(offer: &Offer, rates: Option<&RateSnapshot>) -> Option<Money> {
    rates?.convert(
        offer.amount_offered,
        offer.currency_offered,
        offer.currency_needed,
    )
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub usd_rub: f64,
    pub rub_mnt: f64,
    pub usd_mnt: f64,
    pub usd_rub_alternative: Option<f64>,
    pub fetched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RateSnapshot> for ActiveModel {
    fn from(snapshot: &RateSnapshot) -> Self {
        Self {
            id: ActiveValue::Set(snapshot.id.to_string()),
            usd_rub: ActiveValue::Set(snapshot.usd_rub),
            rub_mnt: ActiveValue::Set(snapshot.rub_mnt),
            usd_mnt: ActiveValue::Set(snapshot.usd_mnt),
            usd_rub_alternative: ActiveValue::Set(snapshot.usd_rub_alternative),
            fetched_at: ActiveValue::Set(snapshot.fetched_at),
        }
    }
}

impl TryFrom<Model> for RateSnapshot {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "exchange rate")?,
            usd_rub: model.usd_rub,
            rub_mnt: model.rub_mnt,
            usd_mnt: model.usd_mnt,
            usd_rub_alternative: model.usd_rub_alternative,
            fetched_at: model.fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> RateSnapshot {
        RateSnapshot::new(80.0, 40.0, 3400.0, Some(81.5), Utc::now())
    }

    fn offer(offered: Currency, amount: Money, needed: Currency) -> Offer {
        Offer::new("alice".into(), offered, amount, needed, None, Utc::now()).unwrap()
    }

    #[test]
    fn converts_every_supported_pair() {
        let r = rates();
        let usd = Money::from_major(10);
        let rub = Money::from_major(800);
        let mnt = Money::from_major(34_000);

        assert_eq!(r.convert(usd, Currency::Usd, Currency::Rub), Some(rub));
        assert_eq!(r.convert(rub, Currency::Rub, Currency::Usd), Some(usd));
        assert_eq!(
            r.convert(Money::from_major(100), Currency::Rub, Currency::Mnt),
            Some(Money::from_major(4_000))
        );
        assert_eq!(
            r.convert(Money::from_major(4_000), Currency::Mnt, Currency::Rub),
            Some(Money::from_major(100))
        );
        assert_eq!(r.convert(usd, Currency::Usd, Currency::Mnt), Some(mnt));
        assert_eq!(r.convert(mnt, Currency::Mnt, Currency::Usd), Some(usd));
    }

    #[test]
    fn division_rounds_to_minor_units() {
        let r = RateSnapshot::new(3.0, 1.0, 1.0, None, Utc::now());
        // 1.00 RUB / 3 = 0.333.. USD
        assert_eq!(
            r.convert(Money::from_major(1), Currency::Rub, Currency::Usd),
            Some(Money::new(33))
        );
    }

    #[test]
    fn unusable_rates_degrade_to_none() {
        let zero = RateSnapshot::new(0.0, 40.0, 3400.0, None, Utc::now());
        let nan = RateSnapshot::new(f64::NAN, 40.0, 3400.0, None, Utc::now());
        let o = offer(Currency::Usd, Money::from_major(5), Currency::Rub);

        assert_eq!(required_counterparty_amount(&o, Some(&zero)), None);
        assert_eq!(required_counterparty_amount(&o, Some(&nan)), None);
        assert_eq!(required_counterparty_amount(&o, None), None);
        // The other pairs are unaffected by the broken USD/RUB rate.
        let o = offer(Currency::Rub, Money::from_major(5), Currency::Mnt);
        assert_eq!(
            required_counterparty_amount(&o, Some(&zero)),
            Some(Money::from_major(200))
        );
    }

    #[test]
    fn staleness_uses_max_age() {
        let now = Utc::now();
        let fresh = RateSnapshot::new(1.0, 1.0, 1.0, None, now - Duration::hours(11));
        let old = RateSnapshot::new(1.0, 1.0, 1.0, None, now - Duration::hours(13));
        assert!(!fresh.is_stale(now, Duration::hours(12)));
        assert!(old.is_stale(now, Duration::hours(12)));
    }
}
