//! Atomically swappable pattern snapshot shared by the supervisor and seekers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::Pattern;
use crate::error::PatternError;

/// Outcome of publishing new pattern text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternUpdate {
    /// The text equals the active pattern
    Unchanged,
    /// A new pattern is active
    Replaced,
    /// No pattern is active any more
    Cleared,
}

/// Holds the active pattern.
///
/// The supervisor is the only writer. Patterns are replaced wholesale, so a
/// reader sees either the old or the new pattern, never a mix.
#[derive(Debug, Default)]
pub struct PatternCell {
    current: RwLock<Option<Arc<Pattern>>>,
    generation: AtomicU64,
    /// Last text that failed to compile
    rejected: Mutex<Option<String>>,
}

impl PatternCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active pattern, if any.
    pub fn snapshot(&self) -> Option<Arc<Pattern>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a counter that changes on every swap.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the source text of the active pattern, empty when idle.
    pub fn text(&self) -> String {
        self.snapshot()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default()
    }

    /// Compiles and activates `text`.
    ///
    /// Empty text clears the pattern. A compile failure leaves the active
    /// pattern untouched and is returned only the first time that text is
    /// published; repeats of it are `Unchanged`.
    pub fn publish(&self, text: &str) -> Result<PatternUpdate, PatternError> {
        if text.is_empty() {
            return Ok(self.clear());
        }
        if self.text() == text {
            return Ok(PatternUpdate::Unchanged);
        }

        let mut rejected = self.rejected.lock().unwrap_or_else(PoisonError::into_inner);
        if rejected.as_deref() == Some(text) {
            return Ok(PatternUpdate::Unchanged);
        }
        match Pattern::compile(text) {
            Ok(pattern) => {
                *rejected = None;
                drop(rejected);
                self.swap(Some(Arc::new(pattern)));
                Ok(PatternUpdate::Replaced)
            }
            Err(e) => {
                *rejected = Some(text.to_string());
                Err(e)
            }
        }
    }

    /// Deactivates the pattern.
    pub fn clear(&self) -> PatternUpdate {
        if self.snapshot().is_none() {
            return PatternUpdate::Unchanged;
        }
        self.swap(None);
        PatternUpdate::Cleared
    }

    fn swap(&self, pattern: Option<Arc<Pattern>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = pattern;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Per-seeker cached view of a [`PatternCell`].
///
/// Only takes the lock when the generation moved, so the hot loop pays a
/// single atomic load per candidate.
#[derive(Debug)]
pub struct PatternReader {
    cell: Arc<PatternCell>,
    seen: u64,
    pattern: Option<Arc<Pattern>>,
}

impl PatternReader {
    pub fn new(cell: Arc<PatternCell>) -> Self {
        let seen = cell.generation();
        let pattern = cell.snapshot();
        Self {
            cell,
            seen,
            pattern,
        }
    }

    /// Picks up a swapped pattern, returning whether it changed.
    pub fn refresh(&mut self) -> bool {
        let generation = self.cell.generation();
        if generation == self.seen {
            return false;
        }
        self.seen = generation;
        self.pattern = self.cell.snapshot();
        true
    }

    /// Returns the pattern seen by the last [`refresh`](Self::refresh).
    #[inline]
    pub fn current(&self) -> Option<&Pattern> {
        self.pattern.as_deref()
    }
}
