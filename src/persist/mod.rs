// =============================================================================
// Persister — transactional, idempotent storage for ranked entries and
// pnl time series
// =============================================================================
//
// Grounded in the pack's `GitIgnite-poly_discover` leaderboard repository
// (a thin wrapper around `sqlx::SqlitePool` with typed `FromRow` rows), but
// `replace_period` here does delete-then-insert rather than upsert: the
// delete step already guarantees no unique-key collision within the
// transaction, so a redundant `ON CONFLICT` clause is dropped.

pub mod error;
pub mod records;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::persist::error::PersistError;
use crate::persist::records::{PnlPointRecord, RankedEntryRecord};
use crate::types::{
    window_name_to_period_days, Period, PnlPoint, PnlSource, PortfolioSeriesByAddress, RankedEntry,
};

const RANKED_ENTRY_BATCH: usize = 100;
const PNL_POINT_BATCH: usize = 400;

pub struct Persister {
    pool: SqlitePool,
}

impl Persister {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent `CREATE TABLE IF NOT EXISTS` bootstrap. No migration
    /// framework is introduced — schema changes are additive and re-running
    /// this is always safe.
    pub async fn bootstrap_schema(&self) -> Result<(), PersistError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ranked_entries (
                period_days           INTEGER NOT NULL,
                address               TEXT NOT NULL,
                rank                  INTEGER NOT NULL,
                score                 REAL NOT NULL,
                weight                REAL NOT NULL,
                win_rate              REAL NOT NULL,
                executed_orders       INTEGER NOT NULL,
                realized_pnl          REAL NOT NULL,
                pnl_consistency       REAL NOT NULL,
                efficiency            REAL NOT NULL,
                remark                TEXT,
                labels                TEXT NOT NULL,
                metrics               TEXT NOT NULL,
                stat_open_positions   INTEGER,
                stat_closed_positions INTEGER,
                stat_avg_pos_duration REAL,
                stat_total_pnl        REAL,
                stat_max_drawdown     REAL NOT NULL,
                fetched_at            TEXT NOT NULL,
                PRIMARY KEY (period_days, address)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PersistError::Transaction {
            step: "bootstrap ranked_entries",
            source,
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pnl_points (
                period_days  INTEGER NOT NULL,
                address      TEXT NOT NULL,
                source       TEXT NOT NULL,
                window_name  TEXT NOT NULL,
                point_ts     INTEGER NOT NULL,
                pnl_value    REAL,
                equity_value REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PersistError::Transaction {
            step: "bootstrap pnl_points",
            source,
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pnl_points_period_address ON pnl_points(period_days, address)",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PersistError::Transaction {
            step: "bootstrap pnl_points index",
            source,
        })?;

        Ok(())
    }

    /// Atomically replaces every `ranked_entries`/`pnl_points` row for
    /// `period` with the given entries and derived time series. On any
    /// failure the transaction rolls back and the previous cycle's data
    /// remains visible.
    #[instrument(skip(self, ranked_entries, portfolio_series), fields(period = period.0))]
    pub async fn replace_period(
        &self,
        period: Period,
        ranked_entries: &[RankedEntry],
        portfolio_series: &PortfolioSeriesByAddress,
    ) -> Result<(), PersistError> {
        let fetched_at = Utc::now();
        let pnl_points = synthesize_pnl_points(period, ranked_entries, portfolio_series);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(PersistError::Connection)?;

        sqlx::query("DELETE FROM ranked_entries WHERE period_days = ?1")
            .bind(period.0 as i64)
            .execute(&mut *tx)
            .await
            .map_err(|source| PersistError::Transaction {
                step: "delete ranked_entries",
                source,
            })?;

        sqlx::query("DELETE FROM pnl_points WHERE period_days = ?1")
            .bind(period.0 as i64)
            .execute(&mut *tx)
            .await
            .map_err(|source| PersistError::Transaction {
                step: "delete pnl_points",
                source,
            })?;

        let records: Vec<RankedEntryRecord> = ranked_entries
            .iter()
            .map(|e| RankedEntryRecord::from_ranked_entry(period.0, e, fetched_at))
            .collect::<Result<_, _>>()?;

        for chunk in records.chunks(RANKED_ENTRY_BATCH) {
            let mut builder = sqlx::QueryBuilder::new(
                "INSERT INTO ranked_entries (
                    period_days, address, rank, score, weight, win_rate, executed_orders,
                    realized_pnl, pnl_consistency, efficiency, remark, labels, metrics,
                    stat_open_positions, stat_closed_positions, stat_avg_pos_duration,
                    stat_total_pnl, stat_max_drawdown, fetched_at
                ) ",
            );
            builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.period_days)
                    .push_bind(&r.address)
                    .push_bind(r.rank)
                    .push_bind(r.score)
                    .push_bind(r.weight)
                    .push_bind(r.win_rate)
                    .push_bind(r.executed_orders)
                    .push_bind(r.realized_pnl)
                    .push_bind(r.pnl_consistency)
                    .push_bind(r.efficiency)
                    .push_bind(&r.remark)
                    .push_bind(&r.labels)
                    .push_bind(&r.metrics)
                    .push_bind(r.stat_open_positions)
                    .push_bind(r.stat_closed_positions)
                    .push_bind(r.stat_avg_pos_duration)
                    .push_bind(r.stat_total_pnl)
                    .push_bind(r.stat_max_drawdown)
                    .push_bind(&r.fetched_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|source| PersistError::Transaction {
                    step: "insert ranked_entries",
                    source,
                })?;
        }

        for chunk in pnl_points.chunks(PNL_POINT_BATCH) {
            let mut builder = sqlx::QueryBuilder::new(
                "INSERT INTO pnl_points (
                    period_days, address, source, window_name, point_ts, pnl_value, equity_value
                ) ",
            );
            builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.period_days)
                    .push_bind(&r.address)
                    .push_bind(&r.source)
                    .push_bind(&r.window_name)
                    .push_bind(r.point_ts)
                    .push_bind(r.pnl_value)
                    .push_bind(r.equity_value);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|source| PersistError::Transaction {
                    step: "insert pnl_points",
                    source,
                })?;
        }

        tx.commit()
            .await
            .map_err(|source| PersistError::Transaction {
                step: "commit",
                source,
            })?;

        info!(
            period = period.0,
            ranked = records.len(),
            pnl_points = pnl_points.len(),
            "period replaced"
        );
        Ok(())
    }

    pub async fn read_ranked(
        &self,
        period: Period,
        limit: i64,
    ) -> Result<Vec<RankedEntryRecord>, PersistError> {
        sqlx::query_as::<_, RankedEntryRecord>(
            "SELECT * FROM ranked_entries WHERE period_days = ?1 ORDER BY rank ASC LIMIT ?2",
        )
        .bind(period.0 as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PersistError::Query {
            query: "read_ranked",
            source,
        })
    }

    pub async fn read_selected(
        &self,
        period: Period,
        limit: i64,
    ) -> Result<Vec<RankedEntryRecord>, PersistError> {
        sqlx::query_as::<_, RankedEntryRecord>(
            "SELECT * FROM ranked_entries WHERE period_days = ?1 \
             ORDER BY weight DESC, rank ASC LIMIT ?2",
        )
        .bind(period.0 as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PersistError::Query {
            query: "read_selected",
            source,
        })
    }
}

fn synthesize_pnl_points(
    period: Period,
    ranked_entries: &[RankedEntry],
    portfolio_series: &PortfolioSeriesByAddress,
) -> Vec<PnlPointRecord> {
    let mut points = Vec::new();

    for entry in ranked_entries {
        for sample in &entry.meta.raw_entry.pnl_list {
            points.push(PnlPointRecord::from_pnl_point(&PnlPoint {
                period,
                address: entry.address.clone(),
                source: PnlSource::Hyperbot,
                window_name: format!("period_{}", period.0),
                timestamp_ms: sample.timestamp_ms,
                pnl_value: Some(sample.value),
                equity_value: None,
            }));
        }

        if let Some(series_list) = portfolio_series.get(&entry.address) {
            for series in series_list {
                let Some(window_period_days) = window_name_to_period_days(&series.window_name)
                else {
                    continue;
                };
                if window_period_days != period.0 {
                    continue;
                }

                for sample in &series.pnl_history {
                    points.push(PnlPointRecord::from_pnl_point(&PnlPoint {
                        period,
                        address: entry.address.clone(),
                        source: PnlSource::Hyperliquid,
                        window_name: series.window_name.clone(),
                        timestamp_ms: sample.timestamp_ms,
                        pnl_value: Some(sample.value),
                        equity_value: None,
                    }));
                }
                for sample in &series.account_value_history {
                    points.push(PnlPointRecord::from_pnl_point(&PnlPoint {
                        period,
                        address: entry.address.clone(),
                        source: PnlSource::Hyperliquid,
                        window_name: series.window_name.clone(),
                        timestamp_ms: sample.timestamp_ms,
                        pnl_value: None,
                        equity_value: Some(sample.value),
                    }));
                }
            }
        }
    }

    if points.len() > PNL_POINT_BATCH * 1000 {
        warn!(count = points.len(), "unusually large pnl point batch for one cycle");
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryMeta, FilterReason, RawLeaderboardEntry, ScoringDetails};
    use std::collections::HashMap;

    async fn memory_persister() -> Persister {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let persister = Persister::new(pool);
        persister.bootstrap_schema().await.unwrap();
        persister
    }

    fn sample_entry(address: &str, rank: u32, score: f64) -> RankedEntry {
        RankedEntry {
            address: address.to_string(),
            rank,
            score,
            weight: if rank == 1 { 1.0 } else { 0.0 },
            filtered: false,
            filter_reason: None,
            win_rate: 0.6,
            executed_orders: 50,
            realized_pnl: 10_000.0,
            efficiency: 200.0,
            pnl_consistency: 0.5,
            remark: None,
            labels: vec!["top".to_string()],
            stat_open_positions: Some(2),
            stat_closed_positions: Some(48),
            stat_avg_pos_duration: Some(3600.0),
            stat_total_pnl: Some(10_000.0),
            stat_max_drawdown: 0.1,
            meta: EntryMeta {
                raw_entry: RawLeaderboardEntry {
                    address: address.to_string(),
                    win_rate: 0.6,
                    executed_orders: 50,
                    realized_pnl: 10_000.0,
                    remark: None,
                    labels: vec!["top".to_string()],
                    pnl_list: Vec::new(),
                    stats: None,
                },
                scoring_details: ScoringDetails::zero(),
                stats: None,
                filtered: false,
                filter_reason: None::<FilterReason>,
                api_max_drawdown: 0.1,
            },
        }
    }

    #[tokio::test]
    async fn replace_period_then_read_back() {
        let persister = memory_persister().await;
        let period = Period(30);
        let entries = vec![sample_entry("0xone", 1, 0.9), sample_entry("0xtwo", 2, 0.5)];

        persister
            .replace_period(period, &entries, &HashMap::new())
            .await
            .unwrap();

        let ranked = persister.read_ranked(period, 10).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].address, "0xone");
        assert_eq!(ranked[1].address, "0xtwo");
    }

    #[tokio::test]
    async fn replace_period_is_idempotent() {
        let persister = memory_persister().await;
        let period = Period(30);
        let entries = vec![sample_entry("0xone", 1, 0.9)];

        persister
            .replace_period(period, &entries, &HashMap::new())
            .await
            .unwrap();
        persister
            .replace_period(period, &entries, &HashMap::new())
            .await
            .unwrap();

        let ranked = persister.read_ranked(period, 10).await.unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn read_selected_orders_by_weight_then_rank() {
        let persister = memory_persister().await;
        let period = Period(30);
        let mut a = sample_entry("0xa", 2, 0.4);
        a.weight = 0.3;
        let mut b = sample_entry("0xb", 1, 0.6);
        b.weight = 0.7;
        persister
            .replace_period(period, &[a, b], &HashMap::new())
            .await
            .unwrap();

        let selected = persister.read_selected(period, 10).await.unwrap();
        assert_eq!(selected[0].address, "0xb");
        assert_eq!(selected[1].address, "0xa");
    }

    #[tokio::test]
    async fn replace_period_does_not_touch_other_periods() {
        let persister = memory_persister().await;
        persister
            .replace_period(Period(7), &[sample_entry("0xweek", 1, 0.9)], &HashMap::new())
            .await
            .unwrap();
        persister
            .replace_period(Period(30), &[sample_entry("0xmonth", 1, 0.9)], &HashMap::new())
            .await
            .unwrap();

        let week = persister.read_ranked(Period(7), 10).await.unwrap();
        let month = persister.read_ranked(Period(30), 10).await.unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(month.len(), 1);
        assert_eq!(week[0].address, "0xweek");
    }
}
