// =============================================================================
// UpstreamClient — typed fetcher for the leaderboard, stats, and portfolio
// history endpoints
// =============================================================================
//
// One `reqwest::Client` is built once and shared across every call (the
// teacher's `BinanceClient` pattern: a single reusable, thread-safe HTTP
// transport). Every call goes through `request_with_retry`, a small
// table-driven retry/backoff/timeout wrapper, so the retry policy lives in
// one place instead of being hand-duplicated per endpoint.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::coerce::{as_finite_number, as_non_negative_u64, as_unit_fraction};
use crate::types::{
    AddressStats, EmbeddedStats, PnlSample, RawLeaderboardEntry, SortField, WindowSeries,
};
use crate::upstream::error::UpstreamError;

/// Per-endpoint retry policy: `attempts` is the total number of tries
/// including the first (so `attempts: 1` means no retries).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_start: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Page boundaries matter more for throughput than retry-driven success,
    /// so pagination gets zero retries (`spec.md` §4.1).
    pub const LEADERBOARD: RetryPolicy = RetryPolicy {
        attempts: 1,
        backoff_start: Duration::from_millis(200),
        timeout: Duration::from_secs(6),
    };

    /// Two retries after the first attempt (three tries total).
    pub const STATS: RetryPolicy = RetryPolicy {
        attempts: 3,
        backoff_start: Duration::from_millis(200),
        timeout: Duration::from_secs(8),
    };

    /// One retry after the first attempt (two tries total).
    pub const PORTFOLIO: RetryPolicy = RetryPolicy {
        attempts: 2,
        backoff_start: Duration::from_millis(200),
        timeout: Duration::from_secs(8),
    };
}

pub struct UpstreamClient {
    http: reqwest::Client,
    leaderboard_base_url: String,
    stats_base_url: String,
    info_url: String,
}

impl UpstreamClient {
    pub fn new(leaderboard_base_url: impl Into<String>, stats_base_url: impl Into<String>, info_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            leaderboard_base_url: leaderboard_base_url.into(),
            stats_base_url: stats_base_url.into(),
            info_url: info_url.into(),
        }
    }

    // -------------------------------------------------------------------
    // Leaderboard page
    // -------------------------------------------------------------------

    /// `GET {base}?pageNum=..&pageSize=..&period=..&sort=..`.
    ///
    /// Returns up to `page_size` entries plus whether a subsequent page may
    /// hold more (true iff this page was full).
    #[instrument(skip(self), name = "upstream::fetch_page", fields(period, page_num, page_size))]
    pub async fn fetch_page(
        &self,
        period_days: u32,
        page_num: u32,
        page_size: u32,
        sort: SortField,
    ) -> Result<(Vec<RawLeaderboardEntry>, bool), UpstreamError> {
        let endpoint = "leaderboard::fetch_page";
        let url = self.leaderboard_base_url.clone();
        let sort_value = sort.to_query_value();

        let body = self
            .request_with_retry(endpoint, RetryPolicy::LEADERBOARD, || {
                self.http.get(&url).query(&[
                    ("pageNum", page_num.to_string()),
                    ("pageSize", page_size.to_string()),
                    ("period", period_days.to_string()),
                    ("sort", sort_value.to_string()),
                ])
            })
            .await?;

        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| UpstreamError::Decode {
                endpoint: endpoint.to_string(),
                detail: "response is not an object with a `data` array".to_string(),
            })?;

        let entries: Vec<RawLeaderboardEntry> = data.iter().map(parse_raw_entry).collect();
        let has_more = entries.len() as u32 >= page_size;

        debug!(count = entries.len(), has_more, "leaderboard page fetched");
        Ok((entries, has_more))
    }

    // -------------------------------------------------------------------
    // Per-address stats
    // -------------------------------------------------------------------

    /// `GET {base}/query-addr-stat/{address}?period=..`. Returns `None` for a
    /// missing or structurally invalid payload rather than an error — only
    /// transport/decoding failures after retry exhaustion raise
    /// `UpstreamError`.
    #[instrument(skip(self), name = "upstream::fetch_address_stat", fields(address, period))]
    pub async fn fetch_address_stat(
        &self,
        address: &str,
        period_days: u32,
    ) -> Result<Option<AddressStats>, UpstreamError> {
        let endpoint = "stats::fetch_address_stat";
        let url = format!("{}/query-addr-stat/{}", self.stats_base_url, address);

        let body = self
            .request_with_retry(endpoint, RetryPolicy::STATS, || {
                self.http
                    .get(&url)
                    .query(&[("period", period_days.to_string())])
            })
            .await?;

        let Some(data) = body.get("data") else {
            return Ok(None);
        };
        if !data.is_object() {
            return Ok(None);
        }

        Ok(Some(AddressStats {
            win_rate: data.get("winRate").and_then(as_finite_number),
            open_pos_count: data
                .get("openPosCount")
                .and_then(as_finite_number)
                .map(|n| n as i64),
            close_pos_count: data
                .get("closePosCount")
                .and_then(as_finite_number)
                .map(|n| n as i64),
            avg_pos_duration: data.get("avgPosDuration").and_then(as_finite_number),
            total_pnl: data.get("totalPnl").and_then(as_finite_number),
            max_drawdown: data.get("maxDrawdown").and_then(as_finite_number),
        }))
    }

    // -------------------------------------------------------------------
    // Portfolio history (exchange-native)
    // -------------------------------------------------------------------

    /// `POST {info_url}` with body `{type:"portfolio", user:"0x.."}`. The
    /// response is a top-level array of `[windowName, {...}]` pairs.
    #[instrument(skip(self), name = "upstream::fetch_portfolio_series", fields(address))]
    pub async fn fetch_portfolio_series(
        &self,
        address: &str,
    ) -> Result<Option<Vec<WindowSeries>>, UpstreamError> {
        let endpoint = "portfolio::fetch_portfolio_series";
        let url = self.info_url.clone();
        let payload = serde_json::json!({ "type": "portfolio", "user": address });

        let body = self
            .request_with_retry(endpoint, RetryPolicy::PORTFOLIO, || {
                self.http.post(&url).json(&payload)
            })
            .await?;

        let Some(entries) = body.as_array() else {
            return Ok(None);
        };

        let mut series = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(pair) = entry.as_array() else {
                continue;
            };
            if pair.len() != 2 {
                continue;
            }
            let Some(window_name) = pair[0].as_str() else {
                continue;
            };
            let payload = &pair[1];

            series.push(WindowSeries {
                window_name: window_name.to_string(),
                pnl_history: parse_pnl_samples(payload.get("pnlHistory")),
                account_value_history: parse_pnl_samples(payload.get("accountValueHistory")),
            });
        }

        Ok(Some(series))
    }

    // -------------------------------------------------------------------
    // Retry/backoff/timeout core
    // -------------------------------------------------------------------

    async fn request_with_retry<F>(
        &self,
        endpoint: &str,
        policy: RetryPolicy,
        build: F,
    ) -> Result<Value, UpstreamError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 1..=policy.attempts {
            if attempt > 1 {
                let backoff = policy.backoff_start * (attempt - 1);
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(policy.timeout, build().send()).await {
                Ok(Ok(resp)) => {
                    let status = resp.status();
                    if !status.is_success() {
                        let err = UpstreamError::Http {
                            endpoint: endpoint.to_string(),
                            status: status.as_u16(),
                        };
                        warn!(endpoint, attempt, status = status.as_u16(), "upstream call returned non-success status");
                        last_err = Some(err);
                        continue;
                    }

                    match resp.json::<Value>().await {
                        Ok(body) => return Ok(body),
                        Err(e) => {
                            let err = UpstreamError::Decode {
                                endpoint: endpoint.to_string(),
                                detail: e.to_string(),
                            };
                            warn!(endpoint, attempt, error = %e, "failed to decode upstream response body");
                            last_err = Some(err);
                        }
                    }
                }
                Ok(Err(e)) => {
                    let err = UpstreamError::Network {
                        endpoint: endpoint.to_string(),
                        detail: e.to_string(),
                    };
                    warn!(endpoint, attempt, error = %e, "network failure calling upstream");
                    last_err = Some(err);
                }
                Err(_) => {
                    let err = UpstreamError::Timeout {
                        endpoint: endpoint.to_string(),
                        elapsed_ms: policy.timeout.as_millis() as u64,
                    };
                    warn!(endpoint, attempt, "upstream call timed out");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.expect("at least one attempt always runs"))
    }
}

// -------------------------------------------------------------------------
// Parsing helpers
// -------------------------------------------------------------------------

fn parse_raw_entry(value: &Value) -> RawLeaderboardEntry {
    let address = value
        .get("address")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let win_rate = value.get("winRate").map(as_unit_fraction).unwrap_or(0.0);
    let executed_orders = value
        .get("executedOrders")
        .map(as_non_negative_u64)
        .unwrap_or(0);
    let realized_pnl = value
        .get("realizedPnl")
        .and_then(as_finite_number)
        .unwrap_or(0.0);

    let remark = value
        .get("remark")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    let labels = value
        .get("labels")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    let pnl_list = parse_pnl_samples(value.get("pnlList"));

    let stats = value.get("stats").filter(|s| s.is_object()).map(|s| EmbeddedStats {
        max_drawdown: s.get("maxDrawdown").and_then(as_finite_number),
        total_pnl: s.get("totalPnl").and_then(as_finite_number),
        open_pos_count: s.get("openPosCount").and_then(as_finite_number).map(|n| n as i64),
        close_pos_count: s.get("closePosCount").and_then(as_finite_number).map(|n| n as i64),
        avg_pos_duration: s.get("avgPosDuration").and_then(as_finite_number),
        win_rate: s.get("winRate").and_then(as_finite_number),
    });

    RawLeaderboardEntry {
        address,
        win_rate,
        executed_orders,
        realized_pnl,
        remark,
        labels,
        pnl_list,
        stats,
    }
}

/// Accepts both `[ts, value]` tuples and `{timestamp, value|pnl}` objects,
/// coercing strings to numbers and silently dropping malformed points while
/// keeping valid neighbors.
fn parse_pnl_samples(value: Option<&Value>) -> Vec<PnlSample> {
    let Some(arr) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    arr.iter()
        .filter_map(|point| {
            if let Some(pair) = point.as_array() {
                if pair.len() < 2 {
                    return None;
                }
                let ts = as_finite_number(&pair[0])? as i64;
                let v = as_finite_number(&pair[1])?;
                Some(PnlSample { timestamp_ms: ts, value: v })
            } else if point.is_object() {
                let ts = point.get("timestamp").and_then(as_finite_number)? as i64;
                let v = point
                    .get("value")
                    .or_else(|| point.get("pnl"))
                    .and_then(as_finite_number)?;
                Some(PnlSample { timestamp_ms: ts, value: v })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_raw_entry_tolerates_missing_fields() {
        let v = json!({ "address": "0xABC" });
        let entry = parse_raw_entry(&v);
        assert_eq!(entry.address, "0xABC");
        assert_eq!(entry.win_rate, 0.0);
        assert_eq!(entry.executed_orders, 0);
        assert!(entry.pnl_list.is_empty());
        assert!(entry.stats.is_none());
    }

    #[test]
    fn parse_pnl_samples_mixed_shapes_drops_malformed() {
        let v = json!([
            [1, 10.0],
            { "timestamp": 2, "value": 20.0 },
            { "timestamp": 3, "pnl": "30" },
            { "timestamp": "bad" },
            [4],
            "garbage",
        ]);
        let samples = parse_pnl_samples(Some(&v));
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].value, 10.0);
        assert_eq!(samples[1].value, 20.0);
        assert_eq!(samples[2].value, 30.0);
    }

    #[test]
    fn parse_raw_entry_coerces_numeric_strings() {
        let v = json!({
            "address": "0xabc",
            "winRate": "0.75",
            "executedOrders": "12",
            "realizedPnl": "1000.5"
        });
        let entry = parse_raw_entry(&v);
        assert_eq!(entry.win_rate, 0.75);
        assert_eq!(entry.executed_orders, 12);
        assert_eq!(entry.realized_pnl, 1000.5);
    }
}
