//! Search supervisor.
//!
//! Owns the seeker pool and the active pattern. A single loop waits on the
//! pattern refresh timer, the telemetry timer, fetched targets, seeker
//! events and the shutdown signal. Coordinator requests run on a separate
//! `vkg-target` thread so the loop never waits on the network.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::crypto::KeyGenerator;
use crate::error::ClientError;
use crate::matcher::{PatternCell, PatternUpdate};
use crate::reporter::TargetSource;
use crate::telemetry::{Aggregator, TelemetrySnapshot};
use crate::worker::{SeekerPool, SeekerSettings};

/// Supervisor tuning.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    /// Number of seekers
    pub workers: usize,
    /// Period between pattern fetches
    pub refresh_interval: Duration,
    /// Period between telemetry displays
    pub display_interval: Duration,
    /// Capacity of the seeker status channel
    pub status_capacity: usize,
    pub seeker: SeekerSettings,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            refresh_interval: Duration::from_secs(20),
            display_interval: Duration::from_secs(5),
            status_capacity: 1024,
            seeker: SeekerSettings::default(),
        }
    }
}

/// Background thread running one target fetch per request.
///
/// Dropping it closes the request channel; the thread exits after its
/// current fetch and is never joined.
struct TargetFetcher {
    requests: Sender<()>,
    results: Receiver<Result<String, ClientError>>,
    in_flight: bool,
}

impl TargetFetcher {
    fn spawn<S: TargetSource + 'static>(source: Arc<S>) -> io::Result<Self> {
        let (requests, request_rx) = bounded::<()>(1);
        let (result_tx, results) = bounded(1);
        thread::Builder::new()
            .name("vkg-target".into())
            .spawn(move || {
                for () in request_rx.iter() {
                    if result_tx.send(source.fetch_target()).is_err() {
                        break;
                    }
                }
                debug!("target fetcher stopped");
            })?;
        Ok(Self {
            requests,
            results,
            in_flight: false,
        })
    }

    /// Asks for a fetch unless one is already running.
    fn request(&mut self) {
        if self.in_flight {
            debug!("target fetch still in flight, skipping refresh");
            return;
        }
        self.in_flight = self.requests.try_send(()).is_ok();
    }
}

pub struct Supervisor<S> {
    settings: SupervisorSettings,
    source: Arc<S>,
    generator: Arc<dyn KeyGenerator>,
    patterns: Arc<PatternCell>,
    aggregator: Aggregator,
}

impl<S: TargetSource + 'static> Supervisor<S> {
    pub fn new(
        settings: SupervisorSettings,
        source: S,
        generator: Arc<dyn KeyGenerator>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            settings,
            source: Arc::new(source),
            generator,
            patterns: Arc::new(PatternCell::new()),
            aggregator,
        }
    }

    /// Returns the shared pattern cell.
    pub fn patterns(&self) -> Arc<PatternCell> {
        self.patterns.clone()
    }

    /// Fetches the pattern on the calling thread and swaps it in.
    pub fn refresh_pattern(&mut self) -> PatternUpdate {
        let fetched = self.source.fetch_target();
        self.apply_target(fetched)
    }

    /// Swaps in the outcome of a fetch.
    ///
    /// A failed fetch clears the pattern; an invalid one keeps the last
    /// good pattern. Any change starts a new telemetry window.
    pub fn apply_target(&mut self, fetched: Result<String, ClientError>) -> PatternUpdate {
        let update = match fetched {
            Ok(text) => match self.patterns.publish(&text) {
                Ok(update) => update,
                Err(e) => {
                    error!(error = %e, "unable to compile target, keeping previous");
                    PatternUpdate::Unchanged
                }
            },
            Err(e) => {
                error!(error = %e, "Unable to fetch target");
                self.patterns.clear()
            }
        };

        match update {
            PatternUpdate::Replaced => {
                info!(target_pattern = %self.patterns.text(), "search pattern updated");
                self.aggregator.reset_window();
            }
            PatternUpdate::Cleared => {
                warn!("no active search pattern");
                self.aggregator.reset_window();
            }
            PatternUpdate::Unchanged => {}
        }
        update
    }

    /// Runs until `shutdown` fires (or its sender is dropped).
    ///
    /// Seekers start idle and pick up the pattern once the first fetch
    /// completes. Returns the final telemetry.
    pub fn run(mut self, shutdown: Receiver<()>) -> io::Result<TelemetrySnapshot> {
        let mut fetcher = TargetFetcher::spawn(self.source.clone())?;
        fetcher.request();

        let (status_tx, status_rx) = bounded(self.settings.status_capacity);
        let pool = SeekerPool::spawn(
            self.settings.workers,
            self.generator.clone(),
            self.patterns.clone(),
            status_tx,
            self.settings.seeker,
        )?;
        info!(workers = pool.num_workers(), "seekers started");

        let targets = fetcher.results.clone();
        let refresh = tick(self.settings.refresh_interval);
        let display = tick(self.settings.display_interval);

        loop {
            select! {
                recv(refresh) -> _ => fetcher.request(),
                recv(targets) -> msg => match msg {
                    Ok(fetched) => {
                        fetcher.in_flight = false;
                        self.apply_target(fetched);
                    }
                    Err(_) => {
                        error!("target fetcher exited");
                        break;
                    }
                },
                recv(display) -> _ => {
                    self.aggregator.display();
                }
                recv(status_rx) -> msg => match msg {
                    Ok(status) => self.aggregator.record(status),
                    Err(_) => {
                        error!("all seekers exited");
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    warn!("interrupt detected");
                    break;
                }
            }
        }

        pool.stop();
        drop(status_rx);
        pool.join();

        Ok(self.aggregator.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyMaterial;
    use crate::error::{ClientError, KeyGenError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct FixedGenerator;

    impl KeyGenerator for FixedGenerator {
        fn generate(&self) -> Result<KeyMaterial, KeyGenError> {
            Ok(KeyMaterial {
                authorized_key: "aaa-key".into(),
                fingerprint: "fp".into(),
                ..Default::default()
            })
        }
    }

    /// Replays a list of responses, repeating the last one.
    struct ScriptedSource {
        responses: Mutex<Vec<Option<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(responses: &[Option<&str>]) -> Self {
            Self {
                responses: Mutex::new(
                    responses.iter().rev().map(|r| r.map(String::from)).collect(),
                ),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl TargetSource for ScriptedSource {
        fn fetch_target(&self) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop().unwrap()
            } else {
                responses[0].clone()
            };
            next.ok_or(ClientError::Status {
                url: "http://coordinator/target".into(),
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            })
        }
    }

    /// Answers `first` immediately, then hangs for `stall` on every later call.
    struct StallingSource {
        first: Option<&'static str>,
        stall: Duration,
        calls: AtomicUsize,
    }

    impl TargetSource for StallingSource {
        fn fetch_target(&self) -> Result<String, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.first {
                Some(first) if call == 0 => Ok(first.to_string()),
                _ => {
                    std::thread::sleep(self.stall);
                    Ok("^zzz".to_string())
                }
            }
        }
    }

    fn settings() -> SupervisorSettings {
        SupervisorSettings {
            workers: 2,
            refresh_interval: Duration::from_secs(3600),
            display_interval: Duration::from_secs(3600),
            status_capacity: 64,
            seeker: SeekerSettings {
                status_interval: Duration::from_millis(50),
                idle_poll: Duration::from_millis(5),
                backoff: Duration::from_millis(5),
            },
        }
    }

    /// Sends shutdown after `after` and returns how long `run` took to return.
    fn time_shutdown<S: TargetSource + 'static>(sup: Supervisor<S>, after: Duration) -> Duration {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let handle = std::thread::spawn(move || sup.run(shutdown_rx));
        std::thread::sleep(after);
        let sent = Instant::now();
        shutdown_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        sent.elapsed()
    }

    fn supervisor(source: ScriptedSource) -> (Supervisor<ScriptedSource>, Receiver<crate::record::Match>) {
        let (tx, rx) = bounded(64);
        let aggregator = Aggregator::new("test-host", tx);
        (
            Supervisor::new(settings(), source, Arc::new(FixedGenerator), aggregator),
            rx,
        )
    }

    #[test]
    fn test_refresh_swaps_pattern() {
        let (mut sup, _rx) = supervisor(ScriptedSource::new(&[Some("^aaa"), Some("^bbb")]));
        assert_eq!(sup.refresh_pattern(), PatternUpdate::Replaced);
        assert_eq!(sup.patterns().text(), "^aaa");
        assert_eq!(sup.refresh_pattern(), PatternUpdate::Replaced);
        assert_eq!(sup.patterns().text(), "^bbb");
        assert_eq!(sup.refresh_pattern(), PatternUpdate::Unchanged);
    }

    #[test]
    fn test_fetch_failure_clears_pattern() {
        let (mut sup, _rx) = supervisor(ScriptedSource::new(&[Some("^aaa"), None]));
        sup.refresh_pattern();
        assert_eq!(sup.refresh_pattern(), PatternUpdate::Cleared);
        assert!(sup.patterns().snapshot().is_none());
    }

    #[test]
    fn test_invalid_pattern_keeps_previous() {
        let (mut sup, _rx) = supervisor(ScriptedSource::new(&[Some("^aaa"), Some("((")]));
        sup.refresh_pattern();
        assert_eq!(sup.refresh_pattern(), PatternUpdate::Unchanged);
        assert_eq!(sup.patterns().text(), "^aaa");
    }

    #[test]
    fn test_run_reports_hits_until_shutdown() {
        let (sup, reports) = supervisor(ScriptedSource::new(&[Some("^aaa")]));
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = std::thread::spawn(move || sup.run(shutdown_rx));
        let report = reports.recv_timeout(Duration::from_secs(10)).unwrap();
        shutdown_tx.send(()).unwrap();
        let snapshot = handle.join().unwrap().unwrap();

        assert_eq!(report.hostname, "test-host");
        assert_eq!(report.match_string, "aaa");
        assert!(report.matched_authorized_key);
        assert!(snapshot.hit_count >= 1);
        assert!(snapshot.key_count >= snapshot.hit_count);
    }

    #[test]
    fn test_run_idles_when_coordinator_unreachable() {
        let source = ScriptedSource::new(&[None]);
        let calls = source.calls.clone();
        let (sup, reports) = supervisor(source);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = std::thread::spawn(move || sup.run(shutdown_rx));
        std::thread::sleep(Duration::from_millis(100));
        drop(shutdown_tx);
        let snapshot = handle.join().unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.key_count, 0);
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn test_invalid_first_pattern_leaves_seekers_idle() {
        let source = ScriptedSource::new(&[Some("((")]);
        let calls = source.calls.clone();
        let (sup, reports) = supervisor(source);
        let patterns = sup.patterns();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = std::thread::spawn(move || sup.run(shutdown_rx));
        std::thread::sleep(Duration::from_millis(100));
        shutdown_tx.send(()).unwrap();
        let snapshot = handle.join().unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(patterns.snapshot().is_none());
        assert_eq!(snapshot.total_key_count, 0);
        assert_eq!(snapshot.total_hit_count, 0);
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn test_stalled_refresh_does_not_delay_shutdown() {
        let source = StallingSource {
            first: Some("^aaa"),
            stall: Duration::from_secs(4),
            calls: AtomicUsize::new(0),
        };
        let (tx, _rx) = bounded(64);
        let settings = SupervisorSettings {
            refresh_interval: Duration::from_millis(50),
            ..settings()
        };
        let sup = Supervisor::new(
            settings,
            source,
            Arc::new(FixedGenerator),
            Aggregator::new("test-host", tx),
        );

        let elapsed = time_shutdown(sup, Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(500), "shutdown took {elapsed:?}");
    }

    #[test]
    fn test_stalled_initial_fetch_does_not_delay_shutdown() {
        let source = StallingSource {
            first: None,
            stall: Duration::from_secs(4),
            calls: AtomicUsize::new(0),
        };
        let (tx, _rx) = bounded(64);
        let sup = Supervisor::new(
            settings(),
            source,
            Arc::new(FixedGenerator),
            Aggregator::new("test-host", tx),
        );

        let elapsed = time_shutdown(sup, Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(500), "shutdown took {elapsed:?}");
    }
}
