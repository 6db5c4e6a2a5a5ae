//! Daemon entry point for the roster MCP server.
//!
//! Loads configuration from the environment, picks the database backend,
//! starts the rate limiter sweeper, and serves the MCP protocol over stdio
//! and/or streamable HTTP.

mod backend;
mod config;

use std::sync::Arc;

use roster_core::control::DataControlPlane;
use roster_core::rate_limit::RateLimiter;
use roster_core::store::TableStore;
use roster_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{BackendSettings, RosterConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RosterConfig::from_args()?;
    match &config.backend {
        BackendSettings::Rest { url, service_key } => {
            let store = backend::build_rest_store(url, service_key)?;
            run(store, &config).await
        }
        BackendSettings::InMemory { seed } => {
            let store = backend::build_memory_store(seed.as_deref())?;
            run(store, &config).await
        }
    }
}

async fn run<S: TableStore>(store: S, config: &RosterConfig) -> Result<(), BoxError> {
    let limiter = RateLimiter::new(config.rate_limit);
    let _sweeper = limiter.clone().spawn_sweeper();
    info!(
        window_secs = config.rate_limit.window.as_secs(),
        max_requests = config.rate_limit.max_requests,
        scope = %config.rate_limit_scope,
        "rate limiter ready"
    );

    let control = Arc::new(
        DataControlPlane::new(store, limiter).with_call_timeout(config.call_timeout),
    );

    let http = config.mcp_serve.then(|| {
        let http_config = McpHttpServerConfig::new(config.mcp_http_addr)
            .with_stateful_mode(config.mcp_stateful)
            .with_rate_limit_scope(config.rate_limit_scope);
        tokio::spawn(serve_streamable_http(Arc::clone(&control), http_config))
    });
    let stdio = config
        .enable_stdio
        .then(|| serve_stdio(Arc::clone(&control), config.rate_limit_scope));

    supervise(stdio, http).await
}

type HttpTask = JoinHandle<Result<(), BoxError>>;

/// Whichever transport finished first while both were running.
enum Finished {
    Stdio(Result<(), BoxError>),
    Http(Result<Result<(), BoxError>, JoinError>),
}

/// Runs stdio in the foreground while the HTTP task runs in the background.
/// A failed HTTP task ends the daemon even while stdio is still open.
async fn supervise<F>(stdio: Option<F>, mut http: Option<HttpTask>) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    if let Some(stdio) = stdio {
        tokio::pin!(stdio);
        let first = match http.as_mut() {
            Some(task) => tokio::select! {
                result = &mut stdio => Finished::Stdio(result),
                joined = task => Finished::Http(joined),
            },
            None => Finished::Stdio(stdio.as_mut().await),
        };
        let stdio_result = match first {
            Finished::Stdio(result) => result,
            Finished::Http(joined) => {
                http = None;
                http_outcome(joined)?;
                stdio.await
            }
        };
        if let Err(err) = stdio_result {
            error!(error = %err, "stdio transport stopped");
            return Err(err);
        }
        info!("stdio session closed");
    }

    if let Some(task) = http {
        http_outcome(task.await)?;
    }
    Ok(())
}

fn http_outcome(joined: Result<Result<(), BoxError>, JoinError>) -> Result<(), BoxError> {
    match joined {
        Ok(Ok(())) => {
            info!("HTTP transport stopped");
            Ok(())
        }
        Ok(Err(err)) => {
            error!(error = %err, "HTTP transport failed");
            Err(err)
        }
        Err(err) => {
            error!(error = %err, "HTTP transport task ended abnormally");
            Err(err.into())
        }
    }
}
