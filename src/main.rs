//! Vanity key generator CLI
//!
//! Usage:
//!   vkg server -p 8080 -l matches.log           # Serve the pattern, record matches
//!   vkg client --coordinator http://host:8080   # Search with 3 seekers
//!   VKG_TARGET='^ssh-ed25519 .*abc$' vkg server # Override the served pattern

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::bounded;
use tracing::info;

use vanity_keygen::reporter::DEFAULT_TIMEOUT;
use vanity_keygen::server::{self, TargetProvider};
use vanity_keygen::telemetry::format_number;
use vanity_keygen::{
    logging, Aggregator, Cli, ClientConfig, Command, CoordinatorClient, Ed25519Generator,
    MatchReporter, Result, ServerConfig, Supervisor,
};

/// Pending match reports held for the reporter thread.
const REPORT_QUEUE: usize = 64;

/// How long queued reports may still be delivered after shutdown.
const REPORT_GRACE: Duration = Duration::from_secs(5);

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Client(config) => run_client(config),
        Command::Server(config) => run_server(config),
    }
}

fn run_client(config: ClientConfig) -> Result<()> {
    config.validate()?;

    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        hostname = %hostname,
        coordinator = %config.coordinator,
        workers = config.workers,
        "Launching vkg client"
    );

    let client = CoordinatorClient::new(&config.coordinator, DEFAULT_TIMEOUT)?;

    let (report_tx, report_rx) = bounded(REPORT_QUEUE);
    let reporter = MatchReporter::spawn(client.clone(), report_rx)?;

    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let supervisor = Supervisor::new(
        config.supervisor_settings(),
        client,
        Arc::new(Ed25519Generator::new()),
        Aggregator::new(hostname, report_tx),
    );
    let stats = supervisor.run(shutdown_rx)?;

    // Aggregator is gone, so the reporter drains its queue and exits.
    reporter.join(REPORT_GRACE);

    println!("\n--- Final Statistics ---");
    println!("Total keys generated: {}", format_number(stats.total_key_count));
    println!("Total matches found:  {}", stats.total_hit_count);
    println!("Hit rate:             {:.6}%", stats.total_hit_rate());
    println!("Time elapsed:         {:.2}s", stats.launch_uptime.as_secs_f64());
    println!(
        "Average speed:        {}/s",
        format_number(stats.total_keys_per_second() as u64)
    );

    Ok(())
}

fn run_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::run(&config, TargetProvider::from_env()))?;
    Ok(())
}
