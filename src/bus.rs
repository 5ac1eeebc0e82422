// =============================================================================
// CandidateSink — downstream consensus/signal bus, consumed via a narrow
// interface
// =============================================================================
//
// `spec.md` treats the downstream bus as an external collaborator: the core
// makes one best-effort publish attempt per candidate and logs failure
// rather than retrying or blocking the cycle on it.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::CandidateEvent;

#[async_trait]
pub trait CandidateSink: Send + Sync {
    async fn publish(&self, event: CandidateEvent) -> anyhow::Result<()>;
}

/// Default sink: logs every candidate at `info` and always succeeds, so the
/// scoring engine is runnable standalone without a real downstream bus wired
/// up.
pub struct LoggingCandidateSink;

#[async_trait]
impl CandidateSink for LoggingCandidateSink {
    async fn publish(&self, event: CandidateEvent) -> anyhow::Result<()> {
        info!(
            address = %event.address,
            score_hint = event.score_hint,
            rank = event.meta.leaderboard.rank,
            "candidate published"
        );
        Ok(())
    }
}

/// Wires candidates into a real downstream bus without this crate depending
/// on one — the receiving end is owned by whatever process consumes the
/// channel.
pub struct ChannelCandidateSink {
    sender: mpsc::Sender<CandidateEvent>,
}

impl ChannelCandidateSink {
    pub fn new(sender: mpsc::Sender<CandidateEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl CandidateSink for ChannelCandidateSink {
    async fn publish(&self, event: CandidateEvent) -> anyhow::Result<()> {
        self.sender.send(event).await.map_err(|e| {
            warn!(error = %e, "candidate channel closed");
            anyhow::anyhow!("candidate channel closed: {e}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateEventMeta, LeaderboardMeta};

    fn sample_event(address: &str) -> CandidateEvent {
        CandidateEvent {
            address: address.to_string(),
            source: "daily".to_string(),
            ts: "2026-01-01T00:00:00Z".to_string(),
            tags: vec!["period:30".to_string(), "leaderboard".to_string()],
            nickname: None,
            score_hint: 0.9,
            meta: CandidateEventMeta {
                leaderboard: LeaderboardMeta {
                    period_days: 30,
                    rank: 1,
                    weight: 1.0,
                    score: 0.9,
                    win_rate: 0.7,
                    executed_orders: 80,
                    realized_pnl: 50_000.0,
                    pnl_consistency: 0.9,
                    efficiency: 625.0,
                    labels: Vec::new(),
                },
            },
        }
    }

    #[tokio::test]
    async fn logging_sink_always_succeeds() {
        let sink = LoggingCandidateSink;
        assert!(sink.publish(sample_event("0xabc")).await.is_ok());
    }

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelCandidateSink::new(tx);
        sink.publish(sample_event("0xabc")).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.address, "0xabc");
    }

    #[tokio::test]
    async fn channel_sink_errors_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sink = ChannelCandidateSink::new(tx);
        assert!(sink.publish(sample_event("0xabc")).await.is_err());
    }
}
