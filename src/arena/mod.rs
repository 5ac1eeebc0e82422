// =============================================================================
// Arena Module — Thompson Sampling Selection-Strategy Arbitration (Future Phase)
// =============================================================================
//
// A stub for a future replacement of the static scorer: instead of always
// ranking by the deterministic composite score, a later phase could run
// several candidate trader-selection strategies side by side and use
// Thompson Sampling to arbitrate between them based on which one's picks
// actually performed best downstream. Out of scope for the current scoring
// engine — this module exists only as the stub the rest of the system is
// expected to grow into.
//
// Architecture:
//   - Each SelectionStrategy defines a distinct trader-ranking approach
//     (StaticScore, MomentumWeighted, RecencyWeighted, ThompsonBandit).
//   - Strategies accumulate wins/losses parameterised by a Beta distribution.
//   - Thompson Sampling draws from each strategy's posterior and selects the
//     one with the highest sample — a principled explore/exploit approach.

pub mod profile;
