//! Data control plane: validation, rate limiting, and table operations.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use roster_store::FilterError;

use crate::rate_limit::{RateLimited, RateLimiter};
use crate::store::{StoreError, TableStore};

pub mod data;
pub mod requests;

pub use requests::{
    CreateRecordsRequest,
    DeleteRecordsRequest,
    ReadRowsRequest,
    UpdateRecordsRequest,
};

#[derive(Debug)]
pub enum ControlError {
    Validation(String),
    RateLimited(RateLimited),
    Store(StoreError),
    Timeout(Duration),
}

impl ControlError {
    /// HTTP-style status for the failure class.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RateLimited(_) => 429,
            Self::Store(_) | Self::Timeout(_) => 500,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::RateLimited(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Timeout(limit) => {
                write!(f, "database call timed out after {}s", limit.as_secs_f64())
            }
        }
    }
}

impl Error for ControlError {}

impl From<FilterError> for ControlError {
    fn from(err: FilterError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RateLimited> for ControlError {
    fn from(err: RateLimited) -> Self {
        Self::RateLimited(err)
    }
}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Identity a caller is rate limited under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The single bucket shared by every caller.
    #[must_use]
    pub fn global() -> Self {
        Self::new("default")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry point for the generic table tools.
///
/// Each operation validates its request, then takes a slot from the rate
/// limiter, then runs one store call bounded by the optional call timeout.
pub struct DataControlPlane<S: TableStore> {
    store: S,
    limiter: RateLimiter,
    call_timeout: Option<Duration>,
}

impl<S: TableStore + Clone> Clone for DataControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S: TableStore> DataControlPlane<S> {
    pub const fn new(store: S, limiter: RateLimiter) -> Self {
        Self {
            store,
            limiter,
            call_timeout: None,
        }
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
