//! Handles settings for the application. Configuration is read from
//! `settings.toml` (optional) and `SWAPBOARD__SECTION__KEY` environment
//! variables, the latter taking precedence.
//!
//! See `settings.toml` for an annotated example.
use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use engine::{Currency, EngineError, Money, OfferLimits};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite(String::from("./swapboard.db"))
    }
}

#[derive(Debug, Deserialize)]
pub struct Marketplace {
    #[serde(default = "default_invites_per_user")]
    pub invites_per_user: i32,
    /// Ceilings keyed by currency code, as decimal strings (`"50"`, `"5000.00"`).
    #[serde(default)]
    pub offer_limits: HashMap<String, String>,
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            invites_per_user: default_invites_per_user(),
            offer_limits: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Rates {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub marketplace: Marketplace,
    #[serde(default)]
    pub rates: Rates,
}

impl Settings {
    /// Loads `path`, or `settings.toml` from the working directory when no
    /// path is given. Only an explicit path is required to exist.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or("settings")).required(path.is_some()))
            .add_source(Environment::with_prefix("SWAPBOARD").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Default ceilings overridden by the configured ones.
    pub fn offer_limits(&self) -> Result<OfferLimits, EngineError> {
        let mut limits = OfferLimits::default();
        for (code, ceiling) in &self.marketplace.offer_limits {
            let currency = Currency::try_from(code.as_str())?;
            limits = limits.with(currency, ceiling.parse::<Money>()?);
        }
        Ok(limits)
    }

    pub fn rate_max_age(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_hours(self.rates.max_age_hours).ok_or_else(|| {
            ConfigError::Message(format!(
                "rates.max_age_hours out of range: {}",
                self.rates.max_age_hours
            ))
        })
    }
}

fn default_level() -> String {
    String::from("info")
}

fn default_invites_per_user() -> i32 {
    3
}

fn default_max_age_hours() -> i64 {
    12
}
