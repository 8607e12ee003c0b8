//! Seeker: one generate, derive, match loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, info_span, warn};

use crate::crypto::KeyGenerator;
use crate::matcher::{PatternCell, PatternReader};

use super::WorkerStatus;

/// Undelivered events a seeker holds before it stops generating.
const MAX_PENDING: usize = 256;

/// Timing knobs shared by every seeker.
#[derive(Debug, Clone, Copy)]
pub struct SeekerSettings {
    /// Period between heartbeat events
    pub status_interval: Duration,
    /// Sleep slice while idle; also bounds how late a stop is noticed
    pub idle_poll: Duration,
    /// Pause after a failed key generation
    pub backoff: Duration,
}

impl Default for SeekerSettings {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(5),
            idle_poll: Duration::from_millis(250),
            backoff: Duration::from_secs(1),
        }
    }
}

/// A worker that generates key pairs and tests them against the active pattern.
///
/// Seekers share nothing mutable: they read the pattern snapshot and push
/// events into the status channel without ever blocking on it.
pub struct Seeker {
    /// Seeker ID (1..=N)
    id: usize,
    generator: Arc<dyn KeyGenerator>,
    patterns: PatternReader,
    status_tx: Sender<WorkerStatus>,
    stop_flag: Arc<AtomicBool>,
    settings: SeekerSettings,
    /// Candidates generated since the last queued event
    key_count: u64,
    /// Events the channel had no room for yet
    pending: VecDeque<WorkerStatus>,
    last_status: Instant,
}

impl Seeker {
    pub fn new(
        id: usize,
        generator: Arc<dyn KeyGenerator>,
        patterns: Arc<PatternCell>,
        status_tx: Sender<WorkerStatus>,
        stop_flag: Arc<AtomicBool>,
        settings: SeekerSettings,
    ) -> Self {
        Self {
            id,
            generator,
            patterns: PatternReader::new(patterns),
            status_tx,
            stop_flag,
            settings,
            key_count: 0,
            pending: VecDeque::new(),
            last_status: Instant::now(),
        }
    }

    /// Runs the seeker loop until the stop flag is set or the status
    /// channel is closed.
    pub fn run(mut self) {
        let span = info_span!("seeker", sid = self.id);
        let _enter = span.enter();
        info!("seeker starting");

        let mut announced_idle = false;

        while !self.stopped() {
            if !self.flush() {
                debug!("status channel closed");
                break;
            }
            if self.last_status.elapsed() >= self.settings.status_interval {
                self.heartbeat();
            }
            if self.pending.len() >= MAX_PENDING {
                thread::sleep(self.settings.idle_poll);
                continue;
            }

            if self.patterns.refresh() {
                let target = self.patterns.current().map(|p| p.as_str()).unwrap_or("");
                warn!(target_pattern = target, "new target detected");
                announced_idle = false;
            }

            let Some(pattern) = self.patterns.current() else {
                if !announced_idle {
                    info!("no current target, sleeping");
                    announced_idle = true;
                }
                thread::sleep(self.settings.idle_poll);
                continue;
            };

            let key = match self.generator.generate() {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "error generating key");
                    self.pause(self.settings.backoff);
                    continue;
                }
            };
            self.key_count += 1;

            let result = pattern.match_key(&key);
            if result.is_match() {
                let status = WorkerStatus::hit(self.id, self.key_count, result, key);
                self.key_count = 0;
                self.pending.push_back(status);
            }
        }

        // Whatever still does not fit is dropped with the seeker.
        self.flush();
        info!(dropped = self.pending.len(), "seeker stopped");
    }

    /// Returns the seeker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Queues a throughput report, folding it into an undelivered one.
    fn heartbeat(&mut self) {
        self.last_status = Instant::now();
        let count = std::mem::take(&mut self.key_count);
        match self.pending.back_mut() {
            Some(last) if !last.is_hit() => last.key_count += count,
            _ => self
                .pending
                .push_back(WorkerStatus::heartbeat(self.id, count)),
        }
    }

    /// Hands queued events to the channel without blocking.
    ///
    /// Returns `false` once the receiving side is gone.
    fn flush(&mut self) -> bool {
        while let Some(status) = self.pending.pop_front() {
            match self.status_tx.try_send(status) {
                Ok(()) => {}
                Err(TrySendError::Full(status)) => {
                    self.pending.push_front(status);
                    return true;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }

    /// Sleeps for `total` in idle-poll slices, returning early on stop.
    fn pause(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(self.settings.idle_poll));
        }
    }
}
