// =============================================================================
// AppConfig — process-wide configuration, loaded once from the environment
// =============================================================================
//
// Every field has a sensible default and env overrides are read explicitly,
// in the same spirit as the teacher's `RuntimeConfig` — but unlike it,
// `AppConfig` is not hot-reloadable or persisted back to disk: `spec.md`
// treats `ScoringParams` (and the rest of this surface) as read-only after
// startup.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{Period, ScoringParams, SortField};

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "failed to parse env override, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_periods(key: &str, default: Vec<u32>) -> Vec<u32> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed: Vec<u32> = raw
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if parsed.is_empty() {
                default
            } else {
                parsed
            }
        }
        Err(_) => default,
    }
}

/// Concurrency, scheduler, and scoring configuration for one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // --- Upstream endpoints --------------------------------------------
    pub leaderboard_base_url: String,
    pub stats_base_url: String,
    pub info_url: String,

    // --- Concurrency -----------------------------------------------------
    pub leaderboard_stats_concurrency: usize,
    pub leaderboard_series_concurrency: usize,

    // --- Scheduler ---------------------------------------------------------
    pub top_n: u32,
    pub select_count: usize,
    pub enrich_count: usize,
    pub periods: Vec<u32>,
    pub page_size: u32,
    pub refresh_ms: u64,
    pub sort: SortField,

    // --- Scoring -------------------------------------------------------------
    pub scoring: ScoringParams,

    // --- Policy knobs --------------------------------------------------------
    /// When every candidate fails hard filters for a period, should the
    /// cycle still publish the pre-drop fallback set, or skip publication
    /// entirely for that period? Default `true` matches the original
    /// behavior (`spec.md` Design Note "Fallback-when-all-filtered").
    pub fallback_when_all_filtered: bool,

    // --- Database --------------------------------------------------------
    pub database_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            leaderboard_base_url: "https://example-exchange.invalid/leaderboard".to_string(),
            stats_base_url: "https://example-exchange.invalid/stats".to_string(),
            info_url: "https://example-exchange.invalid/info".to_string(),
            leaderboard_stats_concurrency: 4,
            leaderboard_series_concurrency: 2,
            top_n: 1000,
            select_count: 12,
            enrich_count: 12,
            periods: vec![30],
            page_size: 100,
            refresh_ms: 86_400_000,
            sort: SortField::RealizedPnl,
            scoring: ScoringParams::default(),
            fallback_when_all_filtered: true,
            database_url: "sqlite://alpha_pool.db".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable. Does not read or write
    /// any file — there is no config file for this process.
    pub fn load_from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            leaderboard_base_url: std::env::var("LEADERBOARD_BASE_URL")
                .unwrap_or(defaults.leaderboard_base_url),
            stats_base_url: std::env::var("STATS_BASE_URL").unwrap_or(defaults.stats_base_url),
            info_url: std::env::var("INFO_URL").unwrap_or(defaults.info_url),

            leaderboard_stats_concurrency: env_parse(
                "LEADERBOARD_STATS_CONCURRENCY",
                defaults.leaderboard_stats_concurrency,
            ),
            leaderboard_series_concurrency: env_parse(
                "LEADERBOARD_SERIES_CONCURRENCY",
                defaults.leaderboard_series_concurrency,
            ),

            top_n: env_parse("TOP_N", defaults.top_n),
            select_count: env_parse("SELECT_COUNT", defaults.select_count),
            enrich_count: env_parse("ENRICH_COUNT", defaults.enrich_count),
            periods: env_periods("PERIODS", defaults.periods),
            page_size: env_parse("PAGE_SIZE", defaults.page_size),
            refresh_ms: env_parse("REFRESH_MS", defaults.refresh_ms),
            sort: SortField::try_from(env_parse::<u8>("SORT", defaults.sort.to_query_value()))
                .unwrap_or(defaults.sort),

            scoring: ScoringParams {
                smooth_pnl_weight: env_parse("SMOOTH_PNL_WEIGHT", defaults.scoring.smooth_pnl_weight),
                win_rate_weight: env_parse("WIN_RATE_WEIGHT", defaults.scoring.win_rate_weight),
                pnl_weight: env_parse("PNL_WEIGHT", defaults.scoring.pnl_weight),
                trade_freq_weight: env_parse("TRADE_FREQ_WEIGHT", defaults.scoring.trade_freq_weight),
                optimal_trades: env_parse("OPTIMAL_TRADES", defaults.scoring.optimal_trades),
                trade_sigma: env_parse("TRADE_SIGMA", defaults.scoring.trade_sigma),
                pnl_reference: env_parse("PNL_REFERENCE", defaults.scoring.pnl_reference),
                max_drawdown_limit: env_parse(
                    "MAX_DRAWDOWN_LIMIT",
                    defaults.scoring.max_drawdown_limit,
                ),
                scalping_threshold: env_parse(
                    "SCALPING_THRESHOLD",
                    defaults.scoring.scalping_threshold,
                ),
                max_trades_hard_limit: env_parse(
                    "MAX_TRADES_HARD_LIMIT",
                    defaults.scoring.max_trades_hard_limit,
                ),
            },

            fallback_when_all_filtered: env_parse(
                "FALLBACK_WHEN_ALL_FILTERED",
                defaults.fallback_when_all_filtered,
            ),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
        };

        info!(
            periods = ?config.periods,
            select_count = config.select_count,
            refresh_ms = config.refresh_ms,
            "app config loaded"
        );

        config
    }

    pub fn periods_as_period_type(&self) -> Vec<Period> {
        self.periods.iter().map(|&days| Period(days)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.select_count, 12);
        assert_eq!(cfg.enrich_count, 12);
        assert_eq!(cfg.periods, vec![30]);
        assert_eq!(cfg.page_size, 100);
        assert!(cfg.fallback_when_all_filtered);
        assert_eq!(cfg.scoring.max_trades_hard_limit, 200);
    }

    #[test]
    fn periods_as_period_type_wraps_each_value() {
        let cfg = AppConfig {
            periods: vec![1, 7, 30],
            ..AppConfig::default()
        };
        let periods = cfg.periods_as_period_type();
        assert_eq!(periods, vec![Period(1), Period(7), Period(30)]);
    }
}
