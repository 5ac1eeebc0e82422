// =============================================================================
// ScoringDetails computation — pure numeric sequence analysis
// =============================================================================
//
// Every function here is a pure, total function of its inputs: no I/O, no
// shared state, never panics. A non-finite intermediate anywhere degrades
// the whole result to zero rather than propagating `NaN` (mirrors the
// teacher's `signals::weighted_score` discipline of clamping every
// sub-score before combining it).

use crate::types::{PnlSample, ScoringDetails, ScoringParams};

/// Smooth-PnL sub-score plus its three supporting components (drawdown,
/// ulcer index, up-fraction). Needs at least two valid points; anything
/// less degrades to all-zero.
pub fn smooth_pnl_components(pnl_list: &[PnlSample]) -> (f64, f64, f64, f64) {
    let values: Vec<f64> = pnl_list
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();

    if values.len() < 2 {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let first = values[0];
    let x: Vec<f64> = values.iter().map(|v| v - first).collect();
    let n = x.len();

    let mut peak = x[0];
    let mut drawdowns = Vec::with_capacity(n);
    for &xi in &x {
        if xi > peak {
            peak = xi;
        }
        let dd = if peak > 0.0 {
            ((peak - xi) / peak).max(0.0)
        } else {
            0.0
        };
        drawdowns.push(dd);
    }

    let max_drawdown = drawdowns.iter().cloned().fold(0.0_f64, f64::max);
    let ulcer_index = (drawdowns.iter().map(|d| d * d).sum::<f64>() / n as f64).sqrt();

    let up_steps = x.windows(2).filter(|w| w[1] > w[0]).count();
    let up_fraction = up_steps as f64 / (n - 1) as f64;

    let last = x[n - 1];
    let max_abs = x.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
    let r = if last > 0.0 && max_abs > 0.0 {
        last / max_abs
    } else {
        0.0
    };

    let smooth_pnl_score = r.max(0.0) * up_fraction / (1.0 + max_drawdown + ulcer_index);

    if smooth_pnl_score.is_finite() {
        (smooth_pnl_score, max_drawdown, ulcer_index, up_fraction)
    } else {
        (0.0, 0.0, 0.0, 0.0)
    }
}

/// Laplace-smoothed win rate with penalties for unreal zero-loss and
/// suspiciously-high high-sample records.
pub fn adjusted_win_rate(num_wins: f64, num_losses: f64) -> f64 {
    let base = (num_wins + 1.0) / (num_wins + num_losses + 2.0);

    if num_losses == 0.0 && num_wins > 0.0 {
        base * 0.7
    } else if base > 0.95 && num_wins + num_losses > 20.0 {
        base * 0.8
    } else {
        base
    }
}

/// Log-normalized realized PnL, clamped to `[0, 1]`.
pub fn normalized_pnl(realized_pnl: f64, pnl_reference: f64) -> f64 {
    if realized_pnl <= 0.0 {
        return 0.0;
    }
    (((realized_pnl + 1.0).log10()) / pnl_reference.log10()).clamp(0.0, 1.0)
}

/// Gaussian trade-count bell score with a progressive excess-trade penalty.
pub fn trade_freq_score(num_trades: f64, params: &ScoringParams) -> f64 {
    if num_trades <= 0.0 {
        return 0.0;
    }

    let diff = num_trades - params.optimal_trades;
    let base = (-(diff * diff) / (2.0 * params.trade_sigma * params.trade_sigma)).exp();

    if num_trades > params.scalping_threshold {
        let excess = num_trades - params.scalping_threshold;
        let penalty = if excess <= 50.0 {
            0.7
        } else if excess <= 100.0 {
            0.4
        } else if excess <= 200.0 {
            0.2
        } else {
            0.05
        };
        base * penalty
    } else {
        base
    }
}

/// Assembles the full [`ScoringDetails`] for one entry, given the inputs
/// the scorer derives per `spec.md` §4.3.1. `maxDrawdown` returned here is
/// the path-derived value only (the caller combines it with any API stats
/// drawdown before re-testing hard filter A).
pub fn compute(
    realized_pnl: f64,
    num_wins: f64,
    num_losses: f64,
    pnl_list: &[PnlSample],
    params: &ScoringParams,
) -> ScoringDetails {
    let (smooth_pnl_score, max_drawdown, ulcer_index, up_fraction) =
        smooth_pnl_components(pnl_list);

    let raw_win_rate = if num_wins + num_losses > 0.0 {
        num_wins / (num_wins + num_losses)
    } else {
        0.0
    };
    let adj_win_rate = adjusted_win_rate(num_wins, num_losses);
    let normalized_pnl_v = normalized_pnl(realized_pnl, params.pnl_reference);
    let trade_freq = trade_freq_score(num_wins + num_losses, params);

    let weighted_smooth_pnl = params.smooth_pnl_weight * smooth_pnl_score;
    let weighted_win_rate = params.win_rate_weight * adj_win_rate;
    let weighted_pnl = params.pnl_weight * normalized_pnl_v;
    let weighted_trade_freq = params.trade_freq_weight * trade_freq;

    ScoringDetails {
        smooth_pnl_score,
        max_drawdown,
        ulcer_index,
        up_fraction,
        raw_win_rate,
        adj_win_rate,
        normalized_pnl: normalized_pnl_v,
        trade_freq_score: trade_freq,
        weighted_smooth_pnl,
        weighted_win_rate,
        weighted_pnl,
        weighted_trade_freq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: i64, value: f64) -> PnlSample {
        PnlSample {
            timestamp_ms: ts,
            value,
        }
    }

    #[test]
    fn smooth_pnl_needs_two_points() {
        assert_eq!(smooth_pnl_components(&[]), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(
            smooth_pnl_components(&[sample(1, 10.0)]),
            (0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn ideal_monotonic_series_scores_one() {
        let series = vec![
            sample(1, 0.0),
            sample(2, 10_000.0),
            sample(3, 20_000.0),
            sample(4, 30_000.0),
            sample(5, 40_000.0),
            sample(6, 50_000.0),
        ];
        let (score, max_dd, ulcer, up_frac) = smooth_pnl_components(&series);
        assert!((up_frac - 1.0).abs() < 1e-9);
        assert!((max_dd - 0.0).abs() < 1e-9);
        assert!((ulcer - 0.0).abs() < 1e-9);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn deep_drawdown_is_captured() {
        let series = vec![sample(1, 0.0), sample(2, 100_000.0), sample(3, 10_000.0)];
        let (_, max_dd, _, _) = smooth_pnl_components(&series);
        assert!((max_dd - 0.9).abs() < 1e-9);
    }

    #[test]
    fn adj_win_rate_zero_loss_penalty() {
        let v = adjusted_win_rate(10.0, 0.0);
        let base = 11.0 / 12.0;
        assert!((v - base * 0.7).abs() < 1e-9);
    }

    #[test]
    fn adj_win_rate_no_trades_is_half() {
        assert!((adjusted_win_rate(0.0, 0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn adj_win_rate_high_sample_high_rate_penalty() {
        // 20 wins, 1 loss -> base = 21/23 = 0.913, not > 0.95, no penalty
        let v1 = adjusted_win_rate(20.0, 1.0);
        assert!((v1 - 21.0 / 23.0).abs() < 1e-9);

        // 39 wins, 1 loss -> base = 40/41 = 0.9756 > 0.95, sample size 40 > 20
        let v2 = adjusted_win_rate(39.0, 1.0);
        let base2 = 40.0 / 41.0;
        assert!((v2 - base2 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn normalized_pnl_clamps_and_zeroes_nonpositive() {
        assert_eq!(normalized_pnl(0.0, 100_000.0), 0.0);
        assert_eq!(normalized_pnl(-500.0, 100_000.0), 0.0);
        let v = normalized_pnl(50_000.0, 100_000.0);
        assert!((v - 0.9377).abs() < 1e-3);
    }

    #[test]
    fn trade_freq_zero_trades_is_zero() {
        let params = ScoringParams::default();
        assert_eq!(trade_freq_score(0.0, &params), 0.0);
    }

    #[test]
    fn trade_freq_penalty_tiers() {
        let params = ScoringParams::default();
        // scalping_threshold = 100, excess tiers at 50/100/200
        let at_120 = trade_freq_score(120.0, &params); // excess 20 -> x0.7
        let at_170 = trade_freq_score(170.0, &params); // excess 70 -> x0.4
        let at_270 = trade_freq_score(270.0, &params); // excess 170 -> x0.2
        let at_400 = trade_freq_score(400.0, &params); // excess 300 -> x0.05

        let base = |n: f64| {
            let diff = n - params.optimal_trades;
            (-(diff * diff) / (2.0 * params.trade_sigma * params.trade_sigma)).exp()
        };

        assert!((at_120 - base(120.0) * 0.7).abs() < 1e-9);
        assert!((at_170 - base(170.0) * 0.4).abs() < 1e-9);
        assert!((at_270 - base(270.0) * 0.2).abs() < 1e-9);
        assert!((at_400 - base(400.0) * 0.05).abs() < 1e-9);
    }
}
