//! Runtime configuration for the vanity key generator.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;
use crate::supervisor::SupervisorSettings;
use crate::worker::SeekerSettings;

/// Distributed SSH vanity key generator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search for keys matching the coordinator's pattern
    Client(ClientConfig),
    /// Serve the pattern and record reported matches
    Server(ServerConfig),
}

#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator base URL
    #[arg(long, env = "VKG_COORDINATOR", default_value = "http://127.0.0.1:8080")]
    pub coordinator: String,

    /// Number of seeker threads
    #[arg(short = 'w', long, default_value = "3")]
    pub workers: usize,

    /// Pattern refresh interval in seconds
    #[arg(long, default_value = "20")]
    pub refresh_interval: u64,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "5")]
    pub report_interval: u64,

    /// Seeker heartbeat interval in seconds
    #[arg(long, default_value = "5")]
    pub status_interval: u64,

    /// Idle poll slice in milliseconds
    #[arg(long, default_value = "250")]
    pub idle_poll: u64,

    /// Back-off after a failed key generation, in seconds
    #[arg(long, default_value = "1")]
    pub backoff: u64,
}

impl ClientConfig {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }

        for (name, value) in [
            ("refresh-interval", self.refresh_interval),
            ("report-interval", self.report_interval),
            ("status-interval", self.status_interval),
            ("idle-poll", self.idle_poll),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }

        let url = reqwest::Url::parse(&self.coordinator).map_err(|e| {
            ConfigError::InvalidCoordinator {
                url: self.coordinator.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidCoordinator {
                url: self.coordinator.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        Ok(())
    }

    /// Returns the supervisor settings derived from the flags.
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            workers: self.workers,
            refresh_interval: Duration::from_secs(self.refresh_interval),
            display_interval: Duration::from_secs(self.report_interval),
            seeker: SeekerSettings {
                status_interval: Duration::from_secs(self.status_interval),
                idle_poll: Duration::from_millis(self.idle_poll),
                backoff: Duration::from_secs(self.backoff),
            },
            ..SupervisorSettings::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Port on which the server listens for connections
    #[arg(short = 'p', long, default_value = "8080")]
    pub port: u16,

    /// Address to bind (default all addresses)
    #[arg(short = 'b', long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Log successful matches to this file
    #[arg(short = 'l', long, default_value = "matchfile.log")]
    pub match_log: PathBuf,
}

impl ServerConfig {
    /// Returns `bind:port`, bracketing IPv6 addresses.
    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}
