//! Events sent from seekers to the aggregator.

use chrono::{DateTime, Utc};

use crate::crypto::KeyMaterial;
use crate::matcher::MatchResult;

/// A candidate that satisfied the active pattern.
#[derive(Debug, Clone)]
pub struct Hit {
    pub result: MatchResult,
    pub key: KeyMaterial,
}

/// One status report from a seeker.
///
/// Heartbeats carry no hit and only report throughput.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub timestamp: DateTime<Utc>,
    /// Seeker id (1..=N)
    pub sid: usize,
    /// Candidates generated since the previous delivered event
    pub key_count: u64,
    pub hit: Option<Hit>,
}

impl WorkerStatus {
    pub fn heartbeat(sid: usize, key_count: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            sid,
            key_count,
            hit: None,
        }
    }

    pub fn hit(sid: usize, key_count: u64, result: MatchResult, key: KeyMaterial) -> Self {
        Self {
            timestamp: Utc::now(),
            sid,
            key_count,
            hit: Some(Hit { result, key }),
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.hit.is_some()
    }
}
