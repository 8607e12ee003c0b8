//! Append-only JSON Lines log of accepted matches.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ServerError;
use crate::record::Match;

#[derive(Serialize)]
struct LogRecord<'a> {
    time: DateTime<Utc>,
    msg: &'static str,
    payload: &'a Match,
}

/// The match log file.
///
/// Writers are serialized so every record lands as one whole line.
#[derive(Debug)]
pub struct MatchLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl MatchLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(&path).map_err(|source| ServerError::MatchLog {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record for `m` and syncs it to disk.
    pub fn append(&self, m: &Match) -> io::Result<()> {
        let record = LogRecord {
            time: Utc::now(),
            msg: "match reported",
            payload: m,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line)?;
        file.sync_data()
    }
}
