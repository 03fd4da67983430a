//! Per-currency ceilings for new offers.

use std::collections::HashMap;

use crate::{Currency, EngineError, Money, ResultEngine};

/// Maximum `amount_offered` per offered currency.
///
/// A currency without an entry has no ceiling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfferLimits {
    ceilings: HashMap<Currency, Money>,
}

impl Default for OfferLimits {
    fn default() -> Self {
        Self::unbounded()
            .with(Currency::Usd, Money::from_major(50))
            .with(Currency::Rub, Money::from_major(5_000))
            .with(Currency::Mnt, Money::from_major(150_000))
    }
}

impl OfferLimits {
    /// Limits with no ceiling at all.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            ceilings: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, currency: Currency, ceiling: Money) -> Self {
        self.ceilings.insert(currency, ceiling);
        self
    }

    pub fn ceiling(&self, currency: Currency) -> Option<Money> {
        self.ceilings.get(&currency).copied()
    }

    /// Rejects amounts strictly above the ceiling. The ceiling itself is allowed.
    pub fn check(&self, currency: Currency, amount: Money) -> ResultEngine<()> {
        match self.ceiling(currency) {
            Some(ceiling) if amount > ceiling => Err(EngineError::Validation(format!(
                "amount {} exceeds the maximum of {}",
                amount.display_in(currency),
                ceiling.display_in(currency)
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_is_inclusive() {
        let limits = OfferLimits::default();
        assert!(limits.check(Currency::Usd, Money::from_major(50)).is_ok());
        assert!(limits.check(Currency::Usd, Money::new(5_001)).is_err());
        assert!(limits.check(Currency::Mnt, Money::from_major(150_000)).is_ok());
        assert!(limits.check(Currency::Rub, Money::from_major(5_001)).is_err());
    }

    #[test]
    fn over_ceiling_is_a_validation_error() {
        let err = OfferLimits::default()
            .check(Currency::Usd, Money::from_major(51))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn missing_currency_is_unbounded() {
        let limits = OfferLimits::unbounded().with(Currency::Usd, Money::from_major(1));
        assert!(limits.check(Currency::Rub, Money::from_major(1_000_000)).is_ok());
    }
}
