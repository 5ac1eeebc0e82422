// =============================================================================
// Persisted row shapes — FromRow structs mirroring `ranked_entries` and
// `pnl_points`
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::persist::error::PersistError;
use crate::types::{PnlPoint, RankedEntry};

/// A `ranked_entries` row as read back from storage. `labels`/`metrics` are
/// stored as JSON text and decoded lazily by the caller — the repository
/// itself never needs to inspect them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RankedEntryRecord {
    pub period_days: i64,
    pub address: String,
    pub rank: i64,
    pub score: f64,
    pub weight: f64,
    pub win_rate: f64,
    pub executed_orders: i64,
    pub realized_pnl: f64,
    pub pnl_consistency: f64,
    pub efficiency: f64,
    pub remark: Option<String>,
    pub labels: String,
    pub metrics: String,
    pub stat_open_positions: Option<i64>,
    pub stat_closed_positions: Option<i64>,
    pub stat_avg_pos_duration: Option<f64>,
    pub stat_total_pnl: Option<f64>,
    pub stat_max_drawdown: f64,
    pub fetched_at: String,
}

impl RankedEntryRecord {
    /// Builds the row representation of a scored entry. `fetched_at` is
    /// stamped once per `replace_period` call so every row in the same
    /// cycle shares an identical timestamp.
    pub fn from_ranked_entry(
        period_days: u32,
        entry: &RankedEntry,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, PersistError> {
        let labels = serde_json::to_string(&entry.labels).map_err(|source| PersistError::Serialize {
            address: entry.address.clone(),
            source,
        })?;
        let metrics = serde_json::to_string(&entry.meta).map_err(|source| PersistError::Serialize {
            address: entry.address.clone(),
            source,
        })?;

        Ok(Self {
            period_days: period_days as i64,
            address: entry.address.clone(),
            rank: entry.rank as i64,
            score: entry.score,
            weight: entry.weight,
            win_rate: entry.win_rate,
            executed_orders: entry.executed_orders as i64,
            realized_pnl: entry.realized_pnl,
            pnl_consistency: entry.pnl_consistency,
            efficiency: entry.efficiency,
            remark: entry.remark.clone(),
            labels,
            metrics,
            stat_open_positions: entry.stat_open_positions,
            stat_closed_positions: entry.stat_closed_positions,
            stat_avg_pos_duration: entry.stat_avg_pos_duration,
            stat_total_pnl: entry.stat_total_pnl,
            stat_max_drawdown: entry.stat_max_drawdown,
            fetched_at: fetched_at.to_rfc3339(),
        })
    }
}

/// A `pnl_points` row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PnlPointRecord {
    pub period_days: i64,
    pub address: String,
    pub source: String,
    pub window_name: String,
    pub point_ts: i64,
    pub pnl_value: Option<f64>,
    pub equity_value: Option<f64>,
}

impl PnlPointRecord {
    pub fn from_pnl_point(point: &PnlPoint) -> Self {
        Self {
            period_days: point.period.0 as i64,
            address: point.address.clone(),
            source: point.source.to_string(),
            window_name: point.window_name.clone(),
            point_ts: point.timestamp_ms,
            pnl_value: point.pnl_value,
            equity_value: point.equity_value,
        }
    }
}
