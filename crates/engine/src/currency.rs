use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code accepted on the board.
///
/// The board trades between three currencies. Each of them stores amounts as
/// an `i64` number of **minor units** (see [`Money`](crate::Money)), with two
/// fraction digits, so `12.50 USD` ⇄ `1250`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Rub,
    Mnt,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Rub => "RUB",
            Currency::Mnt => "MNT",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "RUB" => Ok(Currency::Rub),
            "MNT" => Ok(Currency::Mnt),
            other => Err(EngineError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

impl core::str::FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::try_from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Currency::try_from("usd").unwrap(), Currency::Usd);
        assert_eq!(Currency::try_from(" Rub ").unwrap(), Currency::Rub);
        assert_eq!("MNT".parse::<Currency>().unwrap(), Currency::Mnt);
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        assert!(matches!(
            Currency::try_from("EUR").unwrap_err(),
            EngineError::Validation(_)
        ));
    }
}
