use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, TransactionTrait};

use crate::{EngineError, RateSnapshot, ResultEngine, exchange_rates};

use super::{Engine, with_tx};

fn usable(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

impl Engine {
    /// Store a snapshot collected by an external rate fetcher.
    pub async fn record_rates(&self, snapshot: RateSnapshot) -> ResultEngine<RateSnapshot> {
        let required = [snapshot.usd_rub, snapshot.rub_mnt, snapshot.usd_mnt];
        if !required.into_iter().all(usable) {
            return Err(EngineError::Validation(
                "exchange rates must be finite and > 0".to_string(),
            ));
        }
        if snapshot.usd_rub_alternative.is_some_and(|rate| !usable(rate)) {
            return Err(EngineError::Validation(
                "alternative USD/RUB rate must be finite and > 0".to_string(),
            ));
        }

        let snapshot = with_tx!(self, |db_tx| {
            exchange_rates::ActiveModel::from(&snapshot)
                .insert(&db_tx)
                .await?;
            Ok(snapshot)
        })?;
        tracing::info!(
            usd_rub = snapshot.usd_rub,
            rub_mnt = snapshot.rub_mnt,
            usd_mnt = snapshot.usd_mnt,
            fetched_at = %snapshot.fetched_at,
            "exchange rates recorded"
        );
        Ok(snapshot)
    }

    /// The most recently fetched snapshot, if any.
    pub async fn latest_rates(&self) -> ResultEngine<Option<RateSnapshot>> {
        with_tx!(self, |db_tx| {
            exchange_rates::Entity::find()
                .order_by_desc(exchange_rates::Column::FetchedAt)
                .one(&db_tx)
                .await?
                .map(RateSnapshot::try_from)
                .transpose()
        })
    }

    /// `true` when no snapshot is stored or the latest one is too old.
    pub async fn rates_need_refresh(&self, now: DateTime<Utc>) -> ResultEngine<bool> {
        let latest = self.latest_rates().await?;
        Ok(latest.is_none_or(|snapshot| snapshot.is_stale(now, self.rate_max_age)))
    }
}
