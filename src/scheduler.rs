// =============================================================================
// Scheduler — periodic driver for the full refresh cycle
// =============================================================================
//
// Mirrors the teacher's `main.rs` strategy loop: `tokio::time::interval`
// inside `loop { interval.tick().await; ... }`, one cycle immediately and
// then on every tick. Cycles for different periods execute sequentially —
// the gates bound fan-out *within* a cycle, never across periods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::app_config::AppConfig;
use crate::bus::CandidateSink;
use crate::concurrency::{Gate, GateItem};
use crate::persist::Persister;
use crate::scorer;
use crate::types::{
    AddressStats, CandidateEvent, CandidateEventMeta, LeaderboardMeta, Period,
    PortfolioSeriesByAddress, RankedEntry, WindowSeries,
};
use crate::upstream::UpstreamClient;

pub struct Scheduler {
    config: AppConfig,
    upstream: Arc<UpstreamClient>,
    stats_gate: Gate,
    series_gate: Gate,
    persister: Arc<Persister>,
    sink: Arc<dyn CandidateSink>,
}

impl Scheduler {
    pub fn new(
        config: AppConfig,
        upstream: Arc<UpstreamClient>,
        persister: Arc<Persister>,
        sink: Arc<dyn CandidateSink>,
    ) -> Self {
        let stats_gate = Gate::new(config.leaderboard_stats_concurrency);
        let series_gate = Gate::new(config.leaderboard_series_concurrency);
        Self {
            config,
            upstream,
            stats_gate,
            series_gate,
            persister,
            sink,
        }
    }

    /// Runs one cycle immediately, then on every `refresh_ms` tick, until
    /// `cancel` fires. Ticks observed after cancellation are suppressed; an
    /// in-flight cycle is allowed to finish its current phase before
    /// honoring cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.refresh_ms));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.run_all_periods(&cancel).await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("scheduler stopped");
    }

    async fn run_all_periods(&self, cancel: &CancellationToken) {
        for &period_days in &self.config.periods {
            if cancel.is_cancelled() {
                break;
            }
            let period = Period(period_days);
            if let Err(e) = self.run_cycle(period, cancel).await {
                error!(period = period_days, error = %e, "refresh cycle failed");
            }
        }
    }

    #[instrument(skip(self, cancel), fields(period = period.0))]
    async fn run_cycle(&self, period: Period, cancel: &CancellationToken) -> anyhow::Result<()> {
        // ---- 1. Page the leaderboard -------------------------------------
        let raw_entries = self.page_leaderboard(period, cancel).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        // ---- 2. Phase 1 score ---------------------------------------------
        let (ranked, used_fallback) =
            scorer::score_detailed(&raw_entries, &self.config.scoring, self.config.select_count);
        if cancel.is_cancelled() {
            return Ok(());
        }

        // ---- 3. Choose enrichment target -----------------------------------
        let target = enrich_target(ranked.len(), self.config.enrich_count, self.config.select_count);
        let to_enrich = &ranked[..target];
        let addresses: Vec<String> = to_enrich.iter().map(|e| e.address.clone()).collect();

        // ---- 4. Fan-out enrichment ------------------------------------------
        let (stats_by_address, series_by_address) = tokio::join!(
            self.fetch_stats(&addresses, period, cancel),
            self.fetch_series(&addresses, cancel),
        );
        if cancel.is_cancelled() {
            return Ok(());
        }

        // ---- 5. Phase 2: enrich, re-filter, re-rank, re-weight --------------
        let mut ranked = ranked;
        scorer::apply_stats(&mut ranked, &stats_by_address);
        let ranked = scorer::refilter_and_renormalize(ranked, &self.config.scoring, self.config.select_count);

        if used_fallback && !self.config.fallback_when_all_filtered {
            warn!(period = period.0, "every candidate failed hard filters; fallback publication disabled, skipping cycle");
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        // ---- 6. Persist -------------------------------------------------------
        self.persister
            .replace_period(period, &ranked, &series_by_address)
            .await?;

        if cancel.is_cancelled() {
            return Ok(());
        }

        // ---- 7. Publish ---------------------------------------------------------
        self.publish_selected(period, &ranked).await;

        Ok(())
    }

    async fn page_leaderboard(
        &self,
        period: Period,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<crate::types::RawLeaderboardEntry>> {
        let mut entries = Vec::new();
        let mut page_num = 1u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let (page, _has_more) = self
                .upstream
                .fetch_page(period.0, page_num, self.config.page_size, self.config.sort)
                .await?;

            let page_len = page.len() as u32;
            entries.extend(page);

            if page_len < self.config.page_size || entries.len() as u32 >= self.config.top_n {
                break;
            }
            page_num += 1;
        }

        entries.truncate(self.config.top_n as usize);
        Ok(entries)
    }

    async fn fetch_stats(
        &self,
        addresses: &[String],
        period: Period,
        cancel: &CancellationToken,
    ) -> HashMap<String, AddressStats> {
        let items: Vec<StatsItem> = addresses.iter().cloned().map(StatsItem).collect();
        let upstream = self.upstream.clone();

        let results = self
            .stats_gate
            .run_all_cancellable(
                items,
                move |item: StatsItem| {
                    let upstream = upstream.clone();
                    async move {
                        match upstream.fetch_address_stat(&item.0, period.0).await {
                            Ok(Some(stats)) => Ok(Some((item.0, stats))),
                            Ok(None) => Ok(None),
                            Err(e) => Err(e),
                        }
                    }
                },
                cancel.clone(),
            )
            .await;

        results.into_iter().flatten().flatten().collect()
    }

    async fn fetch_series(
        &self,
        addresses: &[String],
        cancel: &CancellationToken,
    ) -> PortfolioSeriesByAddress {
        let items: Vec<SeriesItem> = addresses.iter().cloned().map(SeriesItem).collect();
        let upstream = self.upstream.clone();

        let results = self
            .series_gate
            .run_all_cancellable(
                items,
                move |item: SeriesItem| {
                    let upstream = upstream.clone();
                    async move {
                        match upstream.fetch_portfolio_series(&item.0).await {
                            Ok(Some(series)) => Ok(Some((item.0, series))),
                            Ok(None) => Ok(None),
                            Err(e) => Err(e),
                        }
                    }
                },
                cancel.clone(),
            )
            .await;

        results.into_iter().flatten().flatten().collect()
    }

    async fn publish_selected(&self, period: Period, ranked: &[RankedEntry]) {
        for entry in ranked.iter().filter(|e| e.rank as usize <= self.config.select_count) {
            let event = build_candidate_event(period, entry);
            if let Err(e) = self.sink.publish(event).await {
                warn!(address = %entry.address, error = %e, "candidate publish failed");
            }
        }
    }
}

struct StatsItem(String);
impl GateItem for StatsItem {
    type Output = Option<(String, AddressStats)>;
    fn label(&self) -> String {
        self.0.clone()
    }
}

struct SeriesItem(String);
impl GateItem for SeriesItem {
    type Output = Option<(String, Vec<WindowSeries>)>;
    fn label(&self) -> String {
        self.0.clone()
    }
}

/// `enrichTarget = min(len(ranked), max(enrichCount, selectCount*2))`
/// (`spec.md` §4.5 step 3).
fn enrich_target(ranked_len: usize, enrich_count: usize, select_count: usize) -> usize {
    ranked_len.min(enrich_count.max(select_count.saturating_mul(2)))
}

fn build_candidate_event(period: Period, entry: &RankedEntry) -> CandidateEvent {
    CandidateEvent {
        address: entry.address.clone(),
        source: "daily".to_string(),
        ts: Utc::now().to_rfc3339(),
        tags: vec![format!("period:{}", period.0), "leaderboard".to_string()],
        nickname: entry.remark.clone(),
        score_hint: entry.score,
        meta: CandidateEventMeta {
            leaderboard: LeaderboardMeta {
                period_days: period.0,
                rank: entry.rank,
                weight: entry.weight,
                score: entry.score,
                win_rate: entry.win_rate,
                executed_orders: entry.executed_orders,
                realized_pnl: entry.realized_pnl,
                pnl_consistency: entry.pnl_consistency,
                efficiency: entry.efficiency,
                labels: entry.labels.clone(),
            },
        },
    }
}
