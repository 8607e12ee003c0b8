//! Seeker pool management.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::crypto::KeyGenerator;
use crate::matcher::PatternCell;

use super::seeker::{Seeker, SeekerSettings};
use super::WorkerStatus;

/// Owns a fixed set of seeker threads.
pub struct SeekerPool {
    /// Number of seekers
    num_workers: usize,
    /// Seeker thread handles (Option to allow taking during join)
    handles: Option<Vec<JoinHandle<()>>>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
}

impl SeekerPool {
    /// Spawns `num_workers` seekers numbered 1..=num_workers.
    pub fn spawn(
        num_workers: usize,
        generator: Arc<dyn KeyGenerator>,
        patterns: Arc<PatternCell>,
        status_tx: Sender<WorkerStatus>,
        settings: SeekerSettings,
    ) -> io::Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            num_workers,
            handles: Some(Vec::with_capacity(num_workers)),
            stop_flag,
        };

        for id in 1..=num_workers {
            let seeker = Seeker::new(
                id,
                generator.clone(),
                patterns.clone(),
                status_tx.clone(),
                pool.stop_flag.clone(),
                settings,
            );

            // On failure the pool drops here, stopping the seekers already running.
            let handle = thread::Builder::new()
                .name(format!("vkg-seeker-{}", id))
                .spawn(move || seeker.run())?;

            if let Some(handles) = pool.handles.as_mut() {
                handles.push(handle);
            }
        }

        Ok(pool)
    }

    /// Signals all seekers to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Stops the seekers and waits for them to exit.
    pub fn join(mut self) {
        self.stop();
        self.join_handles();
    }

    /// Returns the number of seekers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns true if the pool has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn join_handles(&mut self) {
        if let Some(handles) = self.handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for SeekerPool {
    fn drop(&mut self) {
        self.stop();
        self.join_handles();
    }
}
