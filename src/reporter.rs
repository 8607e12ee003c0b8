//! Client side of the coordinator protocol.
//!
//! [`CoordinatorClient`] fetches the active pattern and posts matches.
//! [`MatchReporter`] drains queued matches on its own thread so a slow
//! coordinator never stalls the search loop.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::record::Match;

/// Default timeout for every coordinator request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can supply the current pattern text.
pub trait TargetSource: Send + Sync {
    fn fetch_target(&self) -> Result<String, ClientError>;
}

#[derive(Debug, Deserialize)]
struct TargetEnvelope {
    #[serde(rename = "matchString")]
    match_string: String,
}

/// Extracts the pattern from a `/target` response body.
///
/// Accepts plain text or a `{"matchString": ...}` envelope.
pub fn parse_target(body: &str) -> String {
    let body = body.trim_end_matches(['\r', '\n']);
    if body.trim_start().starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<TargetEnvelope>(body) {
            return envelope.match_string;
        }
    }
    body.to_string()
}

/// Blocking HTTP client for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    base_url: String,
    http: Client,
}

impl CoordinatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches the active pattern from `GET /target`.
    pub fn fetch_target(&self) -> Result<String, ClientError> {
        let url = self.endpoint("/target");
        let response = self.http.get(&url).send()?;
        let status = response.status();
        debug!(code = status.as_u16(), "target requested");
        if !status.is_success() {
            return Err(ClientError::Status { url, status });
        }

        let target = parse_target(&response.text()?);
        debug!(target_pattern = %target, "target is");
        Ok(target)
    }

    /// Posts one match to `POST /match`.
    pub fn report(&self, m: &Match) -> Result<(), ClientError> {
        let url = self.endpoint("/match");
        let body = serde_json::to_vec(m)?;
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { url, status });
        }
        Ok(())
    }
}

impl TargetSource for CoordinatorClient {
    fn fetch_target(&self) -> Result<String, ClientError> {
        CoordinatorClient::fetch_target(self)
    }
}

/// Background thread delivering matches at most once.
pub struct MatchReporter {
    handle: Option<JoinHandle<()>>,
    abandon: Arc<AtomicBool>,
    /// Disconnects when the thread exits
    done: Receiver<()>,
}

impl MatchReporter {
    /// Starts the reporter thread.
    ///
    /// The thread exits once every sender of `reports` is dropped and the
    /// queue is drained.
    pub fn spawn(client: CoordinatorClient, reports: Receiver<Match>) -> io::Result<Self> {
        let abandon = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = bounded::<()>(0);
        let flag = abandon.clone();
        let handle = thread::Builder::new()
            .name("vkg-reporter".into())
            .spawn(move || {
                let _done = done_tx;
                let mut dropped = 0usize;
                for m in reports.iter() {
                    if flag.load(Ordering::Relaxed) {
                        dropped += 1;
                        continue;
                    }
                    match client.report(&m) {
                        Ok(()) => info!(
                            sid = m.seeker_id,
                            match_string = %m.match_string,
                            "match reported"
                        ),
                        Err(e) => warn!(
                            sid = m.seeker_id,
                            fingerprint = %m.key.fingerprint,
                            error = %e,
                            "unable to report match"
                        ),
                    }
                }
                if dropped > 0 {
                    warn!(dropped, "match reports abandoned at shutdown");
                }
            })?;

        Ok(Self {
            handle: Some(handle),
            abandon,
            done,
        })
    }

    /// Waits up to `grace` for queued reports to be delivered.
    ///
    /// Reports still queued after that are dropped and the thread is left to
    /// finish its current request on its own. Returns whether every report
    /// was attempted.
    pub fn join(mut self, grace: Duration) -> bool {
        match self.done.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => {
                self.abandon.store(true, Ordering::Relaxed);
                warn!(?grace, "coordinator too slow, abandoning queued reports");
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                true
            }
        }
    }
}
