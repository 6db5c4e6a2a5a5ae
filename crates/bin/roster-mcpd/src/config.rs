use clap::{Parser, builder::BoolishValueParser};
use roster_core::rate_limit::RateLimitConfig;
use roster_mcp::RateLimitScope;
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 100;
const DEFAULT_RATE_LIMIT_SCOPE: &str = "session";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "roster-mcpd", version, about = "Roster MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "ROSTER_BACKEND_URL")]
    backend_url: Option<String>,

    #[arg(long, env = "ROSTER_SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,

    #[arg(
        long,
        env = "ROSTER_DB_IN_MEMORY",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    db_in_memory: bool,

    #[arg(long, env = "ROSTER_DB_SEED")]
    db_seed: Option<PathBuf>,

    #[arg(
        long = "stdio",
        env = "ROSTER_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "ROSTER_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "ROSTER_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "ROSTER_MCP_STATEFUL",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_stateful: bool,

    #[arg(
        long,
        env = "ROSTER_RATE_LIMIT_WINDOW_SECS",
        default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECS
    )]
    rate_limit_window_secs: u64,

    #[arg(
        long,
        env = "ROSTER_RATE_LIMIT_MAX_REQUESTS",
        default_value_t = DEFAULT_RATE_LIMIT_MAX_REQUESTS
    )]
    rate_limit_max_requests: usize,

    #[arg(long, env = "ROSTER_RATE_LIMIT_SCOPE", default_value = DEFAULT_RATE_LIMIT_SCOPE)]
    rate_limit_scope: String,

    #[arg(long, env = "ROSTER_RATE_LIMIT_SWEEP_SECS")]
    rate_limit_sweep_secs: Option<u64>,

    #[arg(
        long,
        env = "ROSTER_CALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_CALL_TIMEOUT_SECS
    )]
    call_timeout_secs: u64,
}

/// Where table operations are sent.
#[derive(Clone)]
pub enum BackendSettings {
    Rest { url: String, service_key: String },
    InMemory { seed: Option<PathBuf> },
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest { url, .. } => f
                .debug_struct("Rest")
                .field("url", url)
                .finish_non_exhaustive(),
            Self::InMemory { seed } => f.debug_struct("InMemory").field("seed", seed).finish(),
        }
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub backend: BackendSettings,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub mcp_stateful: bool,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_scope: RateLimitScope,
    pub call_timeout: Option<Duration>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
    NothingToServe,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
            Self::NothingToServe => write!(
                f,
                "no transport enabled: set ROSTER_ENABLE_STDIO or ROSTER_MCP_SERVE"
            ),
        }
    }
}

impl Error for ConfigError {}

impl RosterConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl TryFrom<CliArgs> for RosterConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let backend = if args.db_in_memory {
            BackendSettings::InMemory { seed: args.db_seed }
        } else {
            if let Some(seed) = args.db_seed {
                return Err(ConfigError::InvalidSetting {
                    name: "ROSTER_DB_SEED",
                    value: format!("{} (only used with ROSTER_DB_IN_MEMORY)", seed.display()),
                });
            }
            let url = non_blank(args.backend_url)
                .ok_or(ConfigError::MissingSetting("ROSTER_BACKEND_URL"))?;
            let service_key = non_blank(args.service_key)
                .ok_or(ConfigError::MissingSetting("ROSTER_SERVICE_KEY"))?;
            BackendSettings::Rest { url, service_key }
        };

        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::NothingToServe);
        }

        if args.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ROSTER_RATE_LIMIT_WINDOW_SECS",
                value: args.rate_limit_window_secs.to_string(),
            });
        }
        if args.rate_limit_max_requests == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ROSTER_RATE_LIMIT_MAX_REQUESTS",
                value: args.rate_limit_max_requests.to_string(),
            });
        }
        let rate_limit_scope = args
            .rate_limit_scope
            .parse::<RateLimitScope>()
            .map_err(|_| ConfigError::InvalidSetting {
                name: "ROSTER_RATE_LIMIT_SCOPE",
                value: args.rate_limit_scope.clone(),
            })?;

        let window = Duration::from_secs(args.rate_limit_window_secs);
        let sweep_secs = args
            .rate_limit_sweep_secs
            .unwrap_or(args.rate_limit_window_secs);
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ROSTER_RATE_LIMIT_SWEEP_SECS",
                value: sweep_secs.to_string(),
            });
        }
        let rate_limit = RateLimitConfig::new(window, args.rate_limit_max_requests)
            .with_sweep_interval(Duration::from_secs(sweep_secs));

        let call_timeout = if args.call_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(args.call_timeout_secs))
        };

        Ok(Self {
            backend,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            mcp_stateful: args.mcp_stateful,
            rate_limit,
            rate_limit_scope,
            call_timeout,
        })
    }
}
