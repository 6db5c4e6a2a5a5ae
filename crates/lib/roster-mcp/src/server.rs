//! MCP server runners for roster.

use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use roster_core::control::{ClientId, DataControlPlane};
use roster_core::store::TableStore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::RosterMcp;

const STDIO_CLIENT: &str = "stdio";
const STATELESS_HTTP_CLIENT: &str = "http";

/// Which callers share a rate-limit bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimitScope {
    /// One bucket per MCP session.
    #[default]
    Session,
    /// One bucket for every caller.
    Global,
}

impl RateLimitScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Global => "global",
        }
    }

    fn client_for(self, session_label: &str) -> ClientId {
        match self {
            Self::Session => ClientId::new(session_label),
            Self::Global => ClientId::global(),
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownScope(pub String);

impl fmt::Display for UnknownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rate limit scope `{}` (expected session or global)", self.0)
    }
}

impl Error for UnknownScope {}

impl FromStr for RateLimitScope {
    type Err = UnknownScope;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "global" => Ok(Self::Global),
            _ => Err(UnknownScope(value.to_string())),
        }
    }
}

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub rate_limit_scope: RateLimitScope,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            rate_limit_scope: RateLimitScope::Session,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_rate_limit_scope(mut self, rate_limit_scope: RateLimitScope) -> Self {
        self.rate_limit_scope = rate_limit_scope;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }

    #[must_use]
    pub const fn with_sse_retry(mut self, sse_retry: Option<Duration>) -> Self {
        self.sse_retry = sse_retry;
        self
    }

    /// Identity for a newly opened session.
    ///
    /// Stateless mode has no session to key on, so every request shares one
    /// bucket.
    fn session_client(&self) -> ClientId {
        if self.stateful_mode {
            self.rate_limit_scope
                .client_for(&Uuid::new_v4().to_string())
        } else {
            self.rate_limit_scope.client_for(STATELESS_HTTP_CLIENT)
        }
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 4020)))
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: TableStore>(
    control: Arc<DataControlPlane<S>>,
    scope: RateLimitScope,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = RosterMcp::with_control(control, scope.client_for(STDIO_CLIENT));
    info!(client = %service.client_id(), "serving MCP over stdio");
    let (stdin, stdout) = stdio();
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<S: TableStore>(
    control: Arc<DataControlPlane<S>>,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service_config = config.clone();
    let service: StreamableHttpService<RosterMcp<S>, LocalSessionManager> =
        StreamableHttpService::new(
            move || {
                let client_id = service_config.session_client();
                debug!(client = %client_id, "opening MCP session");
                Ok(RosterMcp::with_control(Arc::clone(&control), client_id))
            },
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, stateful = config.stateful_mode, scope = %config.rate_limit_scope, "serving MCP over streamable HTTP");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scopes_case_insensitively() {
        assert_eq!("Session".parse::<RateLimitScope>(), Ok(RateLimitScope::Session));
        assert_eq!(" global ".parse::<RateLimitScope>(), Ok(RateLimitScope::Global));
        assert!("tenant".parse::<RateLimitScope>().is_err());
    }

    #[test]
    fn stateful_sessions_get_distinct_clients() {
        let config = McpHttpServerConfig::default();

        let first = config.session_client();
        let second = config.session_client();

        assert_ne!(first, second);
        assert_ne!(first, ClientId::global());
    }

    #[test]
    fn global_scope_and_stateless_mode_share_a_bucket() {
        let global = McpHttpServerConfig::default().with_rate_limit_scope(RateLimitScope::Global);
        assert_eq!(global.session_client(), ClientId::global());

        let stateless = McpHttpServerConfig::default().with_stateful_mode(false);
        assert_eq!(stateless.session_client(), stateless.session_client());
    }
}
