// =============================================================================
// Shared domain types — trader scoring and selection engine
// =============================================================================
//
// These types flow between every component: `UpstreamClient` produces
// `RawLeaderboardEntry` and `AddressStats`/`WindowSeries`, `Scorer` consumes
// them and produces `RankedEntry`, `Persister` writes/reads `RankedEntry` and
// `PnlPoint`. None of them hold interior mutability — mutation happens in the
// components, not the data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------
// Period
// -----------------------------------------------------------------------

/// A leaderboard lookback window in days (e.g. 30). Wrapped so it can't be
/// confused with other `u32` parameters (page size, concurrency limits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period(pub u32);

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -----------------------------------------------------------------------
// Sort order for the leaderboard page API
// -----------------------------------------------------------------------

/// Wire sort order for `fetch_page`. Value `2` is intentionally unused by the
/// upstream API and preserved here as a gap for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    WinRate,
    AccountValue,
    RealizedPnl,
    TradesCount,
    ProfitableTrades,
    LastOperation,
    AvgHoldingPeriod,
    CurrentPositions,
}

impl SortField {
    pub fn to_query_value(self) -> u8 {
        match self {
            SortField::WinRate => 0,
            SortField::AccountValue => 1,
            SortField::RealizedPnl => 3,
            SortField::TradesCount => 4,
            SortField::ProfitableTrades => 5,
            SortField::LastOperation => 6,
            SortField::AvgHoldingPeriod => 7,
            SortField::CurrentPositions => 8,
        }
    }
}

impl TryFrom<u8> for SortField {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(SortField::WinRate),
            1 => Ok(SortField::AccountValue),
            3 => Ok(SortField::RealizedPnl),
            4 => Ok(SortField::TradesCount),
            5 => Ok(SortField::ProfitableTrades),
            6 => Ok(SortField::LastOperation),
            7 => Ok(SortField::AvgHoldingPeriod),
            8 => Ok(SortField::CurrentPositions),
            other => Err(format!(
                "sort value {other} is not a recognized sort field (2 is a reserved gap)"
            )),
        }
    }
}

impl Default for SortField {
    fn default() -> Self {
        SortField::RealizedPnl
    }
}

// -----------------------------------------------------------------------
// Raw leaderboard entry (upstream input)
// -----------------------------------------------------------------------

/// A single `(timestamp_ms, value)` sample. Accepts both tuple and object
/// wire shapes; see `coerce::flatten_pnl_points`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PnlSample {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Optional nested stats block embedded in a raw leaderboard entry. Every
/// field may be absent or numerically invalid and must be tolerated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddedStats {
    pub max_drawdown: Option<f64>,
    pub total_pnl: Option<f64>,
    pub open_pos_count: Option<i64>,
    pub close_pos_count: Option<i64>,
    pub avg_pos_duration: Option<f64>,
    pub win_rate: Option<f64>,
}

/// One row from the leaderboard page API, after JSON decoding but before
/// scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLeaderboardEntry {
    pub address: String,
    pub win_rate: f64,
    pub executed_orders: u64,
    pub realized_pnl: f64,
    pub remark: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub pnl_list: Vec<PnlSample>,
    #[serde(default)]
    pub stats: Option<EmbeddedStats>,
}

impl RawLeaderboardEntry {
    /// Normalize the address to lowercase, as every downstream consumer
    /// expects (`spec.md` step 1 of Phase 1 scoring).
    pub fn normalized_address(&self) -> String {
        self.address.to_lowercase()
    }
}

// -----------------------------------------------------------------------
// Enrichment inputs (from the stats / portfolio-history endpoints)
// -----------------------------------------------------------------------

/// Per-address stats returned by `query-addr-stat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressStats {
    pub win_rate: Option<f64>,
    pub open_pos_count: Option<i64>,
    pub close_pos_count: Option<i64>,
    pub avg_pos_duration: Option<f64>,
    pub total_pnl: Option<f64>,
    pub max_drawdown: Option<f64>,
}

/// One named window (`day`, `week`, `month`, ...) from the portfolio-history
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSeries {
    pub window_name: String,
    #[serde(default)]
    pub pnl_history: Vec<PnlSample>,
    #[serde(default)]
    pub account_value_history: Vec<PnlSample>,
}

/// Maps a portfolio-history window name to the `period_days` it represents,
/// per `spec.md` §4.4 step 4.
pub fn window_name_to_period_days(window_name: &str) -> Option<u32> {
    match window_name {
        "day" => Some(1),
        "week" => Some(7),
        "month" => Some(30),
        _ => None,
    }
}

// -----------------------------------------------------------------------
// Scoring configuration
// -----------------------------------------------------------------------

/// Process-wide scoring configuration, loaded once at startup and treated as
/// read-only for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    pub smooth_pnl_weight: f64,
    pub win_rate_weight: f64,
    pub pnl_weight: f64,
    pub trade_freq_weight: f64,
    pub optimal_trades: f64,
    pub trade_sigma: f64,
    pub pnl_reference: f64,
    pub max_drawdown_limit: f64,
    pub scalping_threshold: f64,
    pub max_trades_hard_limit: u64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            smooth_pnl_weight: 0.45,
            win_rate_weight: 0.30,
            pnl_weight: 0.15,
            trade_freq_weight: 0.10,
            optimal_trades: 100.0,
            trade_sigma: 150.0,
            pnl_reference: 100_000.0,
            max_drawdown_limit: 0.80,
            scalping_threshold: 100.0,
            max_trades_hard_limit: 200,
        }
    }
}

// -----------------------------------------------------------------------
// Scoring output
// -----------------------------------------------------------------------

/// The fully decomposed intermediate values behind a composite score. Any
/// non-finite intermediate degrades the whole struct to zero values, never
/// `NaN` (see `scorer::details`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringDetails {
    pub smooth_pnl_score: f64,
    pub max_drawdown: f64,
    pub ulcer_index: f64,
    pub up_fraction: f64,
    pub raw_win_rate: f64,
    pub adj_win_rate: f64,
    pub normalized_pnl: f64,
    pub trade_freq_score: f64,
    pub weighted_smooth_pnl: f64,
    pub weighted_win_rate: f64,
    pub weighted_pnl: f64,
    pub weighted_trade_freq: f64,
}

impl ScoringDetails {
    /// All-zero details, used whenever an entry is hard-filtered or a
    /// computation degrades to a degenerate case.
    pub fn zero() -> Self {
        Self {
            smooth_pnl_score: 0.0,
            max_drawdown: 0.0,
            ulcer_index: 0.0,
            up_fraction: 0.0,
            raw_win_rate: 0.0,
            adj_win_rate: 0.0,
            normalized_pnl: 0.0,
            trade_freq_score: 0.0,
            weighted_smooth_pnl: 0.0,
            weighted_win_rate: 0.0,
            weighted_pnl: 0.0,
            weighted_trade_freq: 0.0,
        }
    }

    pub fn composite(&self) -> f64 {
        let score = self.weighted_smooth_pnl
            + self.weighted_win_rate
            + self.weighted_pnl
            + self.weighted_trade_freq;
        if score.is_finite() {
            score
        } else {
            0.0
        }
    }
}

/// Why an entry was excluded from the persisted/selected set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterReason {
    MaxDrawdownExceeded,
    ScalpingPenalty,
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterReason::MaxDrawdownExceeded => write!(f, "max_drawdown_exceeded"),
            FilterReason::ScalpingPenalty => write!(f, "scalping_penalty"),
        }
    }
}

/// Opaque-in-the-original, tagged-variant here: the audit blob persisted
/// alongside every ranked entry (Design Note "Opaque `meta` blob").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub raw_entry: RawLeaderboardEntry,
    pub scoring_details: ScoringDetails,
    pub stats: Option<AddressStats>,
    pub filtered: bool,
    pub filter_reason: Option<FilterReason>,
    pub api_max_drawdown: f64,
}

/// One trader's ranked result for one period, after Phase 1 (and, once
/// enrichment runs, Phase 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub address: String,
    pub rank: u32,
    pub score: f64,
    pub weight: f64,
    pub filtered: bool,
    pub filter_reason: Option<FilterReason>,

    pub win_rate: f64,
    pub executed_orders: u64,
    pub realized_pnl: f64,

    /// `realized_pnl / max(executed_orders, 1)`, except when
    /// `executed_orders == 0`, in which case it equals `realized_pnl`
    /// unchanged (Design Note "Efficiency when executedOrders = 0").
    pub efficiency: f64,
    pub pnl_consistency: f64,

    pub remark: Option<String>,
    pub labels: Vec<String>,

    pub stat_open_positions: Option<i64>,
    pub stat_closed_positions: Option<i64>,
    pub stat_avg_pos_duration: Option<f64>,
    pub stat_total_pnl: Option<f64>,
    pub stat_max_drawdown: f64,

    pub meta: EntryMeta,
}

impl RankedEntry {
    pub fn compute_efficiency(executed_orders: u64, realized_pnl: f64) -> f64 {
        if executed_orders == 0 {
            realized_pnl
        } else {
            realized_pnl / executed_orders.max(1) as f64
        }
    }
}

// -----------------------------------------------------------------------
// Persisted time-series point
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlSource {
    Hyperbot,
    Hyperliquid,
}

impl std::fmt::Display for PnlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PnlSource::Hyperbot => write!(f, "hyperbot"),
            PnlSource::Hyperliquid => write!(f, "hyperliquid"),
        }
    }
}

/// A single persisted time-series sample, keyed by
/// `(period, address, source, window_name, timestamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlPoint {
    pub period: Period,
    pub address: String,
    pub source: PnlSource,
    pub window_name: String,
    pub timestamp_ms: i64,
    pub pnl_value: Option<f64>,
    pub equity_value: Option<f64>,
}

// -----------------------------------------------------------------------
// Downstream candidate event
// -----------------------------------------------------------------------

/// Leaderboard-derived metadata attached to a `CandidateEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardMeta {
    pub period_days: u32,
    pub rank: u32,
    pub weight: f64,
    pub score: f64,
    pub win_rate: f64,
    pub executed_orders: u64,
    pub realized_pnl: f64,
    pub pnl_consistency: f64,
    pub efficiency: f64,
    pub labels: Vec<String>,
}

/// Event published to the downstream consensus/signal bus for every
/// top-`selectCount` entry after a successful persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub address: String,
    pub source: String,
    pub ts: String,
    pub tags: Vec<String>,
    pub nickname: Option<String>,
    pub score_hint: f64,
    pub meta: CandidateEventMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEventMeta {
    pub leaderboard: LeaderboardMeta,
}

/// Portfolio-history series keyed by lowercase address, assembled by the
/// scheduler after the enrichment fan-out and handed to
/// `Persister::replace_period`.
pub type PortfolioSeriesByAddress = HashMap<String, Vec<WindowSeries>>;
