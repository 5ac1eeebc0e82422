// =============================================================================
// Scorer — pure two-phase scoring pipeline
// =============================================================================
//
// No I/O, no ambient state: every function here is a total function of its
// arguments. Phase 1 (`score`) turns raw leaderboard entries into a ranked,
// weighted set using only the data the leaderboard page itself carries.
// Phase 2 (`apply_stats` + `refilter_and_renormalize`) folds in the
// enrichment fetched by the scheduler and re-derives ranks/weights without
// touching the already-computed score (enrichment never changes `score`,
// only which entries survive and how weight is distributed).

pub mod details;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{
    AddressStats, EntryMeta, FilterReason, RankedEntry, RawLeaderboardEntry, ScoringDetails,
    ScoringParams,
};

/// Phase 1: raw entries in, ranked+weighted entries out.
///
/// `select_count` is the alpha-pool size (`spec.md` §6's `selectCount`):
/// weights are normalized only over the top `select_count` surviving
/// entries by score.
pub fn score(
    raw_entries: &[RawLeaderboardEntry],
    params: &ScoringParams,
    select_count: usize,
) -> Vec<RankedEntry> {
    score_detailed(raw_entries, params, select_count).0
}

/// As [`score`], but also reports whether Phase 1 had to fall back to the
/// hard-filter-survived set because every one of those records was then
/// dropped as a suspicious perfect-record/high-sample pair (scenario S6).
/// Callers that need to know whether the returned set is a "real" selection
/// or a fallback (e.g. to decide whether to still publish it) should use
/// this instead of re-deriving the answer from the output — every returned
/// entry always has `filtered == false`, so that field can't distinguish
/// the two cases.
pub fn score_detailed(
    raw_entries: &[RawLeaderboardEntry],
    params: &ScoringParams,
    select_count: usize,
) -> (Vec<RankedEntry>, bool) {
    let built: Vec<RankedEntry> = raw_entries.iter().map(|r| build_entry(r, params)).collect();

    let unfiltered: Vec<RankedEntry> = built.into_iter().filter(|e| !e.filtered).collect();

    let survivors: Vec<RankedEntry> = unfiltered
        .iter()
        .filter(|e| !(e.win_rate >= 0.999 && e.executed_orders >= 10))
        .cloned()
        .collect();

    let used_fallback = survivors.is_empty() && !unfiltered.is_empty();
    let mut result = if used_fallback { unfiltered } else { survivors };

    assign_ranks_and_weights(&mut result, select_count);
    (result, used_fallback)
}

/// Phase 2 step A: overwrite win rate and stat* fields from the enrichment
/// map, keyed by normalized (lowercase) address. Entries with no matching
/// stats are left untouched. Score is never touched here.
pub fn apply_stats(entries: &mut [RankedEntry], stats_by_address: &HashMap<String, AddressStats>) {
    for entry in entries.iter_mut() {
        let Some(stats) = stats_by_address.get(&entry.address) else {
            continue;
        };

        if let Some(wr) = stats.win_rate {
            if wr.is_finite() {
                entry.win_rate = wr.clamp(0.0, 1.0);
            }
        }
        if stats.open_pos_count.is_some() {
            entry.stat_open_positions = stats.open_pos_count;
        }
        if stats.close_pos_count.is_some() {
            entry.stat_closed_positions = stats.close_pos_count;
        }
        if stats.avg_pos_duration.is_some() {
            entry.stat_avg_pos_duration = stats.avg_pos_duration;
        }
        if stats.total_pnl.is_some() {
            entry.stat_total_pnl = stats.total_pnl;
        }
        if let Some(dd) = stats.max_drawdown {
            if dd.is_finite() {
                entry.stat_max_drawdown = dd;
            }
        }

        entry.meta.stats = Some(stats.clone());
    }
}

/// Phase 2 step B: re-evaluate hard filter A against the (possibly
/// enriched) `stat_max_drawdown`, drop newly-filtered entries, then
/// re-rank and re-weight exactly as Phase 1 does.
pub fn refilter_and_renormalize(
    mut entries: Vec<RankedEntry>,
    params: &ScoringParams,
    select_count: usize,
) -> Vec<RankedEntry> {
    for entry in entries.iter_mut() {
        if !entry.filtered && entry.stat_max_drawdown > params.max_drawdown_limit {
            entry.filtered = true;
            entry.filter_reason = Some(FilterReason::MaxDrawdownExceeded);
        }
    }

    let mut survivors: Vec<RankedEntry> = entries.into_iter().filter(|e| !e.filtered).collect();
    assign_ranks_and_weights(&mut survivors, select_count);
    survivors
}

// -------------------------------------------------------------------------
// Internals
// -------------------------------------------------------------------------

fn build_entry(raw: &RawLeaderboardEntry, params: &ScoringParams) -> RankedEntry {
    let address = raw.normalized_address();
    let win_rate = raw.win_rate.clamp(0.0, 1.0);
    let executed_orders = raw.executed_orders;
    let realized_pnl = if raw.realized_pnl.is_finite() {
        raw.realized_pnl
    } else {
        0.0
    };

    let api_max_drawdown = raw
        .stats
        .as_ref()
        .and_then(|s| s.max_drawdown)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    let stat_open_positions = raw.stats.as_ref().and_then(|s| s.open_pos_count);
    let stat_closed_positions = raw.stats.as_ref().and_then(|s| s.close_pos_count);
    let stat_avg_pos_duration = raw.stats.as_ref().and_then(|s| s.avg_pos_duration);
    let stat_total_pnl = raw.stats.as_ref().and_then(|s| s.total_pnl);

    // Hard filter A: API-reported (or embedded) drawdown already too deep.
    if api_max_drawdown > params.max_drawdown_limit {
        return finalize_entry(
            address,
            win_rate,
            executed_orders,
            realized_pnl,
            raw,
            ScoringDetails::zero(),
            true,
            Some(FilterReason::MaxDrawdownExceeded),
            api_max_drawdown,
            stat_open_positions,
            stat_closed_positions,
            stat_avg_pos_duration,
            stat_total_pnl,
        );
    }

    // Hard filter B: trade count alone disqualifies (scalping).
    if executed_orders > params.max_trades_hard_limit {
        return finalize_entry(
            address,
            win_rate,
            executed_orders,
            realized_pnl,
            raw,
            ScoringDetails::zero(),
            true,
            Some(FilterReason::ScalpingPenalty),
            api_max_drawdown,
            stat_open_positions,
            stat_closed_positions,
            stat_avg_pos_duration,
            stat_total_pnl,
        );
    }

    let num_trades = executed_orders as f64;
    let num_wins = (num_trades * win_rate).round();
    let num_losses = num_trades - num_wins;

    let details = details::compute(realized_pnl, num_wins, num_losses, &raw.pnl_list, params);

    // Second hard filter: path-derived drawdown, for when API stats never
    // reported one.
    if details.max_drawdown > params.max_drawdown_limit {
        return finalize_entry(
            address,
            win_rate,
            executed_orders,
            realized_pnl,
            raw,
            ScoringDetails::zero(),
            true,
            Some(FilterReason::MaxDrawdownExceeded),
            api_max_drawdown.max(details.max_drawdown),
            stat_open_positions,
            stat_closed_positions,
            stat_avg_pos_duration,
            stat_total_pnl,
        );
    }

    let stat_max_drawdown = api_max_drawdown.max(details.max_drawdown);

    finalize_entry(
        address,
        win_rate,
        executed_orders,
        realized_pnl,
        raw,
        details,
        false,
        None,
        stat_max_drawdown,
        stat_open_positions,
        stat_closed_positions,
        stat_avg_pos_duration,
        stat_total_pnl,
    )
}

#[allow(clippy::too_many_arguments)]
fn finalize_entry(
    address: String,
    win_rate: f64,
    executed_orders: u64,
    realized_pnl: f64,
    raw: &RawLeaderboardEntry,
    details: ScoringDetails,
    filtered: bool,
    filter_reason: Option<FilterReason>,
    stat_max_drawdown: f64,
    stat_open_positions: Option<i64>,
    stat_closed_positions: Option<i64>,
    stat_avg_pos_duration: Option<f64>,
    stat_total_pnl: Option<f64>,
) -> RankedEntry {
    let score = if filtered { 0.0 } else { details.composite() };

    RankedEntry {
        address,
        rank: 0,
        score,
        weight: 0.0,
        filtered,
        filter_reason,
        win_rate,
        executed_orders,
        realized_pnl,
        efficiency: RankedEntry::compute_efficiency(executed_orders, realized_pnl),
        pnl_consistency: details.smooth_pnl_score,
        remark: raw.remark.clone(),
        labels: raw.labels.clone(),
        stat_open_positions,
        stat_closed_positions,
        stat_avg_pos_duration,
        stat_total_pnl,
        stat_max_drawdown,
        meta: EntryMeta {
            raw_entry: raw.clone(),
            scoring_details: details,
            stats: None,
            filtered,
            filter_reason,
            api_max_drawdown: stat_max_drawdown,
        },
    }
}

fn assign_ranks_and_weights(entries: &mut Vec<RankedEntry>, select_count: usize) {
    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = (i + 1) as u32;
    }

    let top_k = select_count.min(entries.len());
    let weight_sum: f64 = entries[..top_k].iter().map(|e| e.score.max(0.0)).sum();

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.weight = if i < top_k && weight_sum > 0.0 {
            entry.score.max(0.0) / weight_sum
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddedStats, PnlSample};

    fn raw(address: &str, win_rate: f64, executed_orders: u64, realized_pnl: f64) -> RawLeaderboardEntry {
        RawLeaderboardEntry {
            address: address.to_string(),
            win_rate,
            executed_orders,
            realized_pnl,
            remark: None,
            labels: Vec::new(),
            pnl_list: Vec::new(),
            stats: None,
        }
    }

    fn pnl_series(points: &[(i64, f64)]) -> Vec<PnlSample> {
        points
            .iter()
            .map(|&(ts, v)| PnlSample {
                timestamp_ms: ts,
                value: v,
            })
            .collect()
    }

    #[test]
    fn s1_ideal_trader_scores_near_expected() {
        let mut entry = raw("0xAAA", 0.70, 80, 50_000.0);
        entry.pnl_list = pnl_series(&[
            (1, 0.0),
            (2, 10_000.0),
            (3, 20_000.0),
            (4, 30_000.0),
            (5, 40_000.0),
            (6, 50_000.0),
        ]);
        entry.stats = Some(EmbeddedStats {
            max_drawdown: Some(0.05),
            ..Default::default()
        });

        let ranked = score(&[entry], &ScoringParams::default(), 12);
        assert_eq!(ranked.len(), 1);
        let e = &ranked[0];
        assert!(!e.filtered);
        assert!((e.score - 0.898).abs() < 0.01);
        assert_eq!(e.rank, 1);
        assert!((e.weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn s2_perfect_record_high_sample_is_excluded() {
        let entries = vec![
            raw("0xPERFECT", 1.0, 50, 10_000.0),
            raw("0xMODERATE", 0.55, 80, 20_000.0),
        ];
        let ranked = score(&entries, &ScoringParams::default(), 12);
        assert!(ranked.iter().all(|e| e.address != "0xperfect"));
        assert!(ranked.iter().any(|e| e.address == "0xmoderate"));
    }

    #[test]
    fn s3_perfect_record_low_sample_is_retained() {
        let entries = vec![raw("0xLUCKY", 1.0, 5, 1_000.0)];
        let ranked = score(&entries, &ScoringParams::default(), 12);
        assert_eq!(ranked.len(), 1);
        assert!(!ranked[0].filtered);
    }

    #[test]
    fn s4_deep_drawdown_is_filtered_out() {
        let mut entry = raw("0xCRASH", 0.6, 50, 90_000.0);
        entry.pnl_list = pnl_series(&[(1, 0.0), (2, 100_000.0), (3, 10_000.0)]);
        let ranked = score(&[entry], &ScoringParams::default(), 12);
        assert!(ranked.is_empty() || ranked[0].address != "0xcrash");
    }

    #[test]
    fn s5_scalper_filtered_moderate_trader_ranks_first() {
        let entries = vec![
            raw("0xSCALPER", 0.65, 400, 80_000.0),
            raw("0xMODERATE", 0.60, 100, 40_000.0),
        ];
        let ranked = score(&entries, &ScoringParams::default(), 12);
        assert!(ranked.iter().all(|e| e.address != "0xscalper"));
        assert_eq!(ranked[0].address, "0xmoderate");
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn s6_all_filtered_falls_back_to_unfiltered_pair() {
        let entries = vec![
            raw("0xONE", 1.0, 50, 10_000.0),
            raw("0xTWO", 1.0, 50, 20_000.0),
        ];
        let ranked = score(&entries, &ScoringParams::default(), 12);
        assert_eq!(ranked.len(), 2);
        let weight_sum: f64 = ranked.iter().map(|e| e.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-6);
        let mut ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        ranks.sort();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn score_detailed_flags_s6_as_a_fallback() {
        let entries = vec![
            raw("0xONE", 1.0, 50, 10_000.0),
            raw("0xTWO", 1.0, 50, 20_000.0),
        ];
        let (ranked, used_fallback) = score_detailed(&entries, &ScoringParams::default(), 12);
        assert_eq!(ranked.len(), 2);
        assert!(used_fallback);
        assert!(ranked.iter().all(|e| !e.filtered));
    }

    #[test]
    fn score_detailed_does_not_flag_a_normal_selection() {
        let entries = vec![
            raw("0xA", 0.7, 80, 50_000.0),
            raw("0xB", 0.55, 60, 20_000.0),
        ];
        let (ranked, used_fallback) = score_detailed(&entries, &ScoringParams::default(), 12);
        assert_eq!(ranked.len(), 2);
        assert!(!used_fallback);
    }

    #[test]
    fn s7_weight_normalization_over_top_k() {
        let mut entries = vec![
            stub_entry("0xa", 0.8),
            stub_entry("0xb", 0.4),
            stub_entry("0xc", 0.2),
        ];
        assign_ranks_and_weights(&mut entries, 2);

        assert!((entries[0].weight - 0.8 / 1.2).abs() < 1e-9);
        assert!((entries[1].weight - 0.4 / 1.2).abs() < 1e-9);
        assert_eq!(entries[2].weight, 0.0);
    }

    #[test]
    fn boundary_zero_or_one_pnl_points_zero_smooth_score() {
        let mut entry = raw("0xSHORT", 0.5, 10, 1_000.0);
        entry.pnl_list = pnl_series(&[(1, 500.0)]);
        let ranked = score(&[entry], &ScoringParams::default(), 12);
        assert_eq!(ranked[0].pnl_consistency, 0.0);
    }

    #[test]
    fn boundary_no_trades_has_zero_trade_freq_and_half_win_rate() {
        let entry = raw("0xIDLE", 0.0, 0, 0.0);
        let ranked = score(&[entry], &ScoringParams::default(), 12);
        assert_eq!(ranked[0].meta.scoring_details.trade_freq_score, 0.0);
        assert!((ranked[0].meta.scoring_details.adj_win_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn boundary_nonpositive_realized_pnl_zeroes_normalized_pnl() {
        let entry = raw("0xLOSS", 0.4, 30, -500.0);
        let ranked = score(&[entry], &ScoringParams::default(), 12);
        assert_eq!(ranked[0].meta.scoring_details.normalized_pnl, 0.0);
    }

    #[test]
    fn phase2_refilter_drops_entries_with_enriched_drawdown() {
        let entries = vec![raw("0xOK", 0.55, 40, 5_000.0)];
        let mut ranked = score(&entries, &ScoringParams::default(), 12);

        let mut stats_map = HashMap::new();
        stats_map.insert(
            "0xok".to_string(),
            AddressStats {
                win_rate: Some(0.60),
                max_drawdown: Some(0.95),
                ..Default::default()
            },
        );
        apply_stats(&mut ranked, &stats_map);
        assert!((ranked[0].win_rate - 0.60).abs() < 1e-9);

        let refiltered = refilter_and_renormalize(ranked, &ScoringParams::default(), 12);
        assert!(refiltered.is_empty());
    }

    #[test]
    fn invariant_every_score_finite_and_weight_in_unit_range() {
        let entries = vec![
            raw("0xa", 0.7, 80, 50_000.0),
            raw("0xb", 0.3, 300, -1_000.0),
            raw("0xc", 1.0, 5, 500.0),
        ];
        let ranked = score(&entries, &ScoringParams::default(), 2);
        for e in &ranked {
            assert!(e.score.is_finite());
            assert!(e.weight >= 0.0 && e.weight <= 1.0);
        }
        for e in &ranked {
            if e.rank as usize > 2 {
                assert_eq!(e.weight, 0.0);
            }
        }
    }

    fn stub_entry(address: &str, score_value: f64) -> RankedEntry {
        RankedEntry {
            address: address.to_string(),
            rank: 0,
            score: score_value,
            weight: 0.0,
            filtered: false,
            filter_reason: None,
            win_rate: 0.5,
            executed_orders: 10,
            realized_pnl: 1_000.0,
            efficiency: 100.0,
            pnl_consistency: 0.5,
            remark: None,
            labels: Vec::new(),
            stat_open_positions: None,
            stat_closed_positions: None,
            stat_avg_pos_duration: None,
            stat_total_pnl: None,
            stat_max_drawdown: 0.0,
            meta: EntryMeta {
                raw_entry: raw(address, 0.5, 10, 1_000.0),
                scoring_details: ScoringDetails::zero(),
                stats: None,
                filtered: false,
                filter_reason: None,
                api_max_drawdown: 0.0,
            },
        }
    }
}
