//! # vanity_keygen
//!
//! Distributed SSH vanity key generator.
//!
//! ## Architecture
//!
//! - `crypto`: Ed25519 key generation and OpenSSH encodings
//! - `matcher`: Regular expression patterns and the shared pattern snapshot
//! - `worker`: Seekers and the seeker pool
//! - `telemetry`: Status aggregation and runtime statistics
//! - `supervisor`: Pattern refresh and the client event loop
//! - `reporter`: Coordinator client and background match reporting
//! - `server`: The coordinator service and its match log
//! - `config`: Command line configuration

pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod record;
pub mod reporter;
pub mod server;
pub mod supervisor;
pub mod telemetry;
pub mod worker;

pub use config::{Cli, ClientConfig, Command, ServerConfig};
pub use crypto::{Ed25519Generator, KeyGenerator, KeyMaterial};
pub use error::{Error, Result};
pub use matcher::{MatchResult, Pattern, PatternCell};
pub use record::{KeyRecord, Match};
pub use reporter::{CoordinatorClient, MatchReporter, TargetSource};
pub use supervisor::{Supervisor, SupervisorSettings};
pub use telemetry::{Aggregator, Telemetry, TelemetrySnapshot};
pub use worker::{SeekerPool, WorkerStatus};
