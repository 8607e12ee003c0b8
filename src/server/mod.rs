//! Coordinator service.
//!
//! Serves the active pattern on `GET /target` and records reported matches
//! from `POST /match` into the match log.

mod match_log;
mod target;

pub use match_log::MatchLog;
pub use target::{TargetProvider, DEFAULT_TARGET, TARGET_ENV};

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::record::Match;

#[derive(Clone)]
struct AppState {
    target: TargetProvider,
    log: Arc<MatchLog>,
}

/// Builds the coordinator routes.
pub fn router(target: TargetProvider, log: Arc<MatchLog>) -> Router {
    Router::new()
        .route("/target", get(handle_target))
        .route("/match", post(handle_match))
        .with_state(AppState { target, log })
}

async fn handle_target(State(state): State<AppState>) -> String {
    let target = state.target.current();
    debug!(target_pattern = %target, "gave target");
    target
}

/// Decode failures still answer `200 OK`; the client cannot fix its payload.
async fn handle_match(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let m: Match = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "Decoder Failed");
            return (StatusCode::OK, "OK");
        }
    };

    info!(
        hostname = %m.hostname,
        seeker_id = m.seeker_id,
        auth_key = %m.key.authorized_string,
        finger = %m.key.fingerprint,
        "received match"
    );

    let log = state.log.clone();
    let written = tokio::task::spawn_blocking(move || log.append(&m)).await;
    match written {
        Ok(Ok(())) => (StatusCode::OK, "OK"),
        Ok(Err(e)) => {
            error!(error = %e, path = %state.log.path().display(), "unable to write match log");
            (StatusCode::INTERNAL_SERVER_ERROR, "match not recorded")
        }
        Err(e) => {
            error!(error = %e, "match log writer panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "match not recorded")
        }
    }
}

/// A bound coordinator, ready to serve.
pub struct Coordinator {
    listener: TcpListener,
    app: Router,
}

impl Coordinator {
    /// Binds `addr` and prepares the routes.
    pub async fn bind(
        addr: &str,
        target: TargetProvider,
        log: Arc<MatchLog>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            app: router(target, log),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` resolves, then lets in-flight requests finish.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}

/// Runs the coordinator until interrupted.
pub async fn run(config: &ServerConfig, target: TargetProvider) -> Result<(), ServerError> {
    info!("Starting Server");

    let log = Arc::new(MatchLog::open(&config.match_log)?);
    info!(match_log = %config.match_log.display(), "Logging matches to file");

    let addr = config.listen_addr();
    let coordinator = Coordinator::bind(&addr, target, log).await?;
    let local = coordinator.local_addr().map_err(ServerError::Serve)?;
    info!(addr = %local, "listening");

    coordinator
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "unable to listen for interrupt");
                return;
            }
            warn!("server closed");
        })
        .await
}
