// =============================================================================
// Selection Strategies — Definitions for the Arena system
// =============================================================================
//
// Each strategy encapsulates a distinct way of ranking traders. In a future
// Arena phase, these would be scored using Thompson Sampling and dynamically
// arbitrated based on which one's picks actually performed downstream.
// =============================================================================

use serde::{Deserialize, Serialize};

/// A candidate trader-selection strategy definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionStrategy {
    /// Unique identifier (e.g. "static_score", "momentum_weighted").
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Description of the strategy's ranking approach.
    pub description: String,

    /// Whether this strategy is currently enabled for arbitration.
    pub enabled: bool,
}

impl SelectionStrategy {
    /// Create a new strategy definition.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            enabled: true,
        }
    }
}

/// Return the default set of candidate selection strategies.
///
/// `static_score` is the one actually in production use (`crate::scorer`);
/// the other three are placeholders a future Arena phase would compete
/// against it.
pub fn default_strategies() -> Vec<SelectionStrategy> {
    vec![
        SelectionStrategy::new(
            "static_score",
            "StaticScore",
            "The current composite-score ranking: smooth-PnL shape, adjusted \
             win rate, log-normalized PnL, and trade-frequency bell score, \
             combined by fixed weights (`ScoringParams`).",
        ),
        SelectionStrategy::new(
            "momentum_weighted",
            "MomentumWeighted",
            "Hypothetical variant that overweights traders whose recent-window \
             PnL growth rate exceeds their full-period average, favoring \
             traders currently heating up over steady long-run performers.",
        ),
        SelectionStrategy::new(
            "recency_weighted",
            "RecencyWeighted",
            "Hypothetical variant that exponentially discounts older pnlList \
             points before computing the smooth-PnL components, so a recent \
             drawdown matters more than an identical one further in the past.",
        ),
        SelectionStrategy::new(
            "thompson_bandit",
            "ThompsonBandit",
            "Hypothetical variant where trader inclusion itself is a bandit \
             arm: traders are explored/exploited based on downstream outcome \
             feedback rather than ranked purely by composite score.",
        ),
    ]
}

// =============================================================================
// Stub for future Thompson Sampling implementation
// =============================================================================

/// Thompson Sampling state for a single selection strategy.
///
/// Uses a Beta(alpha, beta) distribution where:
///   - `alpha` starts at 1 and increments on each win.
///   - `beta` starts at 1 and increments on each loss.
///
/// Sampling from Beta(alpha, beta) gives a random variable in [0, 1] that
/// represents the estimated win probability of this strategy's picks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThompsonState {
    pub strategy_id: String,
    pub alpha: f64,
    pub beta: f64,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
}

impl ThompsonState {
    /// Create a new Thompson state with uniform prior (alpha=1, beta=1).
    pub fn new(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            alpha: 1.0,
            beta: 1.0,
            total_trades: 0,
            wins: 0,
            losses: 0,
        }
    }

    /// Record a win for this profile.
    pub fn record_win(&mut self) {
        self.alpha += 1.0;
        self.wins += 1;
        self.total_trades += 1;
    }

    /// Record a loss for this profile.
    pub fn record_loss(&mut self) {
        self.beta += 1.0;
        self.losses += 1;
        self.total_trades += 1;
    }

    /// Estimated win rate (posterior mean of the Beta distribution).
    pub fn estimated_win_rate(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Thompson score — a simple deterministic approximation.
    ///
    /// In the full implementation, this will sample from Beta(alpha, beta)
    /// using a proper random number generator. For now we return the posterior
    /// mean as a placeholder.
    pub fn thompson_score(&self) -> f64 {
        self.estimated_win_rate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategies_count() {
        let strategies = default_strategies();
        assert_eq!(strategies.len(), 4);
    }

    #[test]
    fn default_strategies_all_enabled() {
        let strategies = default_strategies();
        assert!(strategies.iter().all(|s| s.enabled));
    }

    #[test]
    fn default_strategies_unique_ids() {
        let strategies = default_strategies();
        let ids: Vec<&str> = strategies.iter().map(|s| s.id.as_str()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn thompson_state_initial() {
        let ts = ThompsonState::new("static_score");
        assert_eq!(ts.alpha, 1.0);
        assert_eq!(ts.beta, 1.0);
        assert_eq!(ts.total_trades, 0);
        // Uniform prior => 50% win rate.
        assert!((ts.estimated_win_rate() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn thompson_state_after_wins() {
        let mut ts = ThompsonState::new("static_score");
        for _ in 0..10 {
            ts.record_win();
        }
        // alpha = 11, beta = 1 => win rate ≈ 11/12 ≈ 0.917
        assert!(ts.estimated_win_rate() > 0.9);
    }

    #[test]
    fn thompson_state_after_losses() {
        let mut ts = ThompsonState::new("recency_weighted");
        for _ in 0..10 {
            ts.record_loss();
        }
        // alpha = 1, beta = 11 => win rate ≈ 1/12 ≈ 0.083
        assert!(ts.estimated_win_rate() < 0.1);
    }
}
