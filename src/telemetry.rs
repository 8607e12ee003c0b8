//! Search telemetry and status aggregation.

use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{info, warn};

use crate::record::Match;
use crate::worker::WorkerStatus;

/// Process-wide search counters.
#[derive(Debug, Clone)]
pub struct Telemetry {
    launch_start: Instant,
    search_start: Instant,
    key_count: u64,
    hit_count: u64,
    /// Counters since launch, never reset
    total_keys: u64,
    total_hits: u64,
}

/// Point-in-time view of [`Telemetry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub launch_uptime: Duration,
    pub search_uptime: Duration,
    pub key_count: u64,
    pub hit_count: u64,
    /// Hits per hundred candidates, 0 when nothing was generated
    pub hit_rate: f64,
    pub keys_per_second: f64,
    pub total_key_count: u64,
    pub total_hit_count: u64,
}

impl TelemetrySnapshot {
    /// Hit rate over the whole launch, 0 when nothing was generated.
    pub fn total_hit_rate(&self) -> f64 {
        if self.total_key_count == 0 {
            0.0
        } else {
            self.total_hit_count as f64 / self.total_key_count as f64 * 100.0
        }
    }

    /// Average throughput over the whole launch.
    pub fn total_keys_per_second(&self) -> f64 {
        let secs = self.launch_uptime.as_secs_f64();
        if secs > 0.0 {
            self.total_key_count as f64 / secs
        } else {
            0.0
        }
    }
}

impl Telemetry {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            launch_start: now,
            search_start: now,
            key_count: 0,
            hit_count: 0,
            total_keys: 0,
            total_hits: 0,
        }
    }

    pub fn record_keys(&mut self, count: u64) {
        self.key_count = self.key_count.saturating_add(count);
        self.total_keys = self.total_keys.saturating_add(count);
    }

    pub fn record_hit(&mut self) {
        self.hit_count += 1;
        self.total_hits += 1;
    }

    /// Starts a new search window, keeping the launch time.
    pub fn reset_window(&mut self) {
        self.search_start = Instant::now();
        self.key_count = 0;
        self.hit_count = 0;
    }

    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn hit_rate(&self) -> f64 {
        if self.key_count == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.key_count as f64 * 100.0
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let search_uptime = self.search_start.elapsed();
        let secs = search_uptime.as_secs_f64();
        let keys_per_second = if secs > 0.0 {
            self.key_count as f64 / secs
        } else {
            0.0
        };

        TelemetrySnapshot {
            launch_uptime: self.launch_start.elapsed(),
            search_uptime,
            key_count: self.key_count,
            hit_count: self.hit_count,
            hit_rate: self.hit_rate(),
            keys_per_second,
            total_key_count: self.total_keys,
            total_hit_count: self.total_hits,
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds seeker events into telemetry and forwards hits to the reporter.
///
/// Never blocks: a report that does not fit into the reporter queue is
/// dropped with a warning.
pub struct Aggregator {
    telemetry: Telemetry,
    hostname: String,
    reports: Sender<Match>,
}

impl Aggregator {
    pub fn new(hostname: impl Into<String>, reports: Sender<Match>) -> Self {
        Self {
            telemetry: Telemetry::new(),
            hostname: hostname.into(),
            reports,
        }
    }

    /// Consumes one seeker event.
    pub fn record(&mut self, status: WorkerStatus) {
        self.telemetry.record_keys(status.key_count);

        let Some(hit) = status.hit else {
            return;
        };
        self.telemetry.record_hit();

        warn!(
            sid = status.sid,
            key_count = status.key_count,
            match_string = %hit.result.match_string,
            matched_authorized_key = hit.result.matched_authorized_key,
            matched_fingerprint = hit.result.matched_fingerprint,
            fingerprint = %hit.key.fingerprint,
            auth = %hit.key.authorized_key,
            "run select hit"
        );

        let report = Match::new(
            status.timestamp,
            self.hostname.clone(),
            status.sid,
            hit.result,
            hit.key,
        );
        match self.reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                warn!(sid = m.seeker_id, "report queue full, dropping match report")
            }
            Err(TrySendError::Disconnected(m)) => {
                warn!(sid = m.seeker_id, "reporter gone, dropping match report")
            }
        }
    }

    /// Starts a new search window.
    pub fn reset_window(&mut self) {
        self.telemetry.reset_window();
    }

    /// Logs the current statistics and returns them.
    pub fn display(&self) -> TelemetrySnapshot {
        let snapshot = self.telemetry.snapshot();
        info!(
            launch_duration = ?snapshot.launch_uptime,
            search_duration = ?snapshot.search_uptime,
            key_count = snapshot.key_count,
            hit_count = snapshot.hit_count,
            hit_rate = snapshot.hit_rate,
            "Runtime Stats: {} keys ({}/s)",
            format_number(snapshot.key_count),
            format_number(snapshot.keys_per_second as u64),
        );
        snapshot
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

/// Formats a count with K/M/B suffixes.
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyMaterial;
    use crate::matcher::MatchResult;
    use crossbeam_channel::bounded;

    fn hit_status(sid: usize, key_count: u64) -> WorkerStatus {
        let result = MatchResult {
            matched_authorized_key: true,
            matched_fingerprint: false,
            match_string: "aaa".into(),
        };
        let key = KeyMaterial {
            authorized_key: "aaa-key".into(),
            fingerprint: "fp".into(),
            ..Default::default()
        };
        WorkerStatus::hit(sid, key_count, result, key)
    }

    #[test]
    fn test_hit_rate_without_candidates() {
        let telemetry = Telemetry::new();
        assert_eq!(telemetry.hit_rate(), 0.0);
        let snapshot = telemetry.snapshot();
        assert!(snapshot.hit_rate.is_finite());
        assert_eq!(snapshot.key_count, 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut telemetry = Telemetry::new();
        telemetry.record_keys(200);
        telemetry.record_hit();
        assert!((telemetry.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_window() {
        let mut telemetry = Telemetry::new();
        telemetry.record_keys(10);
        telemetry.record_hit();
        telemetry.reset_window();
        assert_eq!(telemetry.key_count(), 0);
        assert_eq!(telemetry.hit_count(), 0);

        telemetry.record_keys(5);
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.key_count, 5);
        assert_eq!(snapshot.total_key_count, 15);
        assert_eq!(snapshot.total_hit_count, 1);
        assert!((snapshot.total_hit_rate() - 100.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregator_folds_heartbeats() {
        let (tx, rx) = bounded(4);
        let mut aggregator = Aggregator::new("host", tx);
        aggregator.record(WorkerStatus::heartbeat(1, 100));
        aggregator.record(WorkerStatus::heartbeat(2, 50));

        assert_eq!(aggregator.telemetry().key_count(), 150);
        assert_eq!(aggregator.telemetry().hit_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_aggregator_forwards_hits() {
        let (tx, rx) = bounded(4);
        let mut aggregator = Aggregator::new("host-1", tx);
        aggregator.record(hit_status(2, 7));

        assert_eq!(aggregator.telemetry().key_count(), 7);
        assert_eq!(aggregator.telemetry().hit_count(), 1);
        let report = rx.try_recv().unwrap();
        assert_eq!(report.hostname, "host-1");
        assert_eq!(report.seeker_id, 2);
        assert_eq!(report.match_string, "aaa");
        assert!(report.matched_authorized_key);
        assert_eq!(report.key.authorized_string, "aaa-key");
    }

    #[test]
    fn test_aggregator_never_blocks_on_full_queue() {
        let (tx, rx) = bounded(1);
        let mut aggregator = Aggregator::new("host", tx);
        for _ in 0..5 {
            aggregator.record(hit_status(1, 1));
        }
        assert_eq!(aggregator.telemetry().hit_count(), 5);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.50K");
        assert_eq!(format_number(2_000_000), "2.00M");
    }
}
