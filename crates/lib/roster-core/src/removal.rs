//! Scout removal.
//!
//! Removing a scout deletes its history rows, then its profile, then the
//! auth account the profile links to. Like an invitation it stops at the
//! first failure without undoing earlier steps, and the returned
//! [`RemovalReport`] says how far it got.

use std::error::Error;
use std::fmt;

use roster_store::schema::{COLUMN_ID, COLUMN_SCOUT_ID, COLUMN_USER_ID, TABLE_SCOUT_HISTORY, TABLE_SCOUTS};
use roster_store::{Filter, FilterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::auth::{AuthAdmin, AuthError};
use crate::store::{Select, StoreError, TableStore};

#[derive(Debug)]
pub enum RemovalError {
    InvalidInput(String),
    NotFound(String),
    Auth(AuthError),
    Store(StoreError),
    Filter(FilterError),
}

impl fmt::Display for RemovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
            Self::NotFound(scout_id) => write!(f, "Scout not found: {scout_id}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Filter(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RemovalError {}

impl From<AuthError> for RemovalError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for RemovalError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<FilterError> for RemovalError {
    fn from(err: FilterError) -> Self {
        Self::Filter(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStep {
    DeleteHistory,
    DeleteProfile,
    DeleteAccount,
}

impl RemovalStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeleteHistory => "delete_history",
            Self::DeleteProfile => "delete_profile",
            Self::DeleteAccount => "delete_account",
        }
    }
}

impl fmt::Display for RemovalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalFailure {
    pub step: RemovalStep,
    pub message: String,
}

/// Outcome of one removal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub scout_id: String,
    pub user_id: Option<String>,
    pub completed: Vec<RemovalStep>,
    pub failure: Option<RemovalFailure>,
}

impl RemovalReport {
    fn new(scout_id: &str, user_id: Option<String>) -> Self {
        Self {
            scout_id: scout_id.to_string(),
            user_id,
            completed: Vec::new(),
            failure: None,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    fn record(&mut self, step: RemovalStep, outcome: Result<(), RemovalError>) -> bool {
        match outcome {
            Ok(()) => {
                info!(scout_id = %self.scout_id, %step, "removal step completed");
                self.completed.push(step);
                true
            }
            Err(err) => {
                error!(scout_id = %self.scout_id, %step, error = %err, "removal step failed");
                self.failure = Some(RemovalFailure {
                    step,
                    message: err.to_string(),
                });
                false
            }
        }
    }
}

/// Removes scouts and their accounts.
pub struct ScoutRemovalService<A: AuthAdmin, S: TableStore> {
    auth: A,
    store: S,
}

impl<A: AuthAdmin, S: TableStore> ScoutRemovalService<A, S> {
    pub const fn new(auth: A, store: S) -> Self {
        Self { auth, store }
    }

    pub const fn auth(&self) -> &A {
        &self.auth
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Removes the scout whose profile `id` is `scout_id`.
    ///
    /// A profile without a linked `user_id` is removed without touching the
    /// auth provider.
    ///
    /// # Errors
    /// Returns `RemovalError::InvalidInput` for a blank id,
    /// `RemovalError::NotFound` when no profile has that id, and a store
    /// error when the lookup itself fails. Nothing has been deleted in any of
    /// those cases. Failures after that point are reported in the returned
    /// `RemovalReport`.
    pub async fn remove_scout(&self, scout_id: &str) -> Result<RemovalReport, RemovalError> {
        let scout_id = scout_id.trim();
        if scout_id.is_empty() {
            return Err(RemovalError::InvalidInput("scout id is required".to_string()));
        }
        let key = scout_key(scout_id);

        let by_id = Filter::eq(COLUMN_ID, key.clone())?;
        let found = self
            .store
            .select(
                TABLE_SCOUTS,
                &Select::all()
                    .with_columns(vec![COLUMN_ID.to_string(), COLUMN_USER_ID.to_string()])
                    .with_filter(by_id.clone())
                    .with_limit(1),
            )
            .await?;
        let Some(profile) = found.first() else {
            return Err(RemovalError::NotFound(scout_id.to_string()));
        };
        let user_id = profile
            .get(COLUMN_USER_ID)
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut report = RemovalReport::new(scout_id, user_id.clone());

        let by_scout = Filter::eq(COLUMN_SCOUT_ID, key)?;
        let history = self
            .store
            .delete(TABLE_SCOUT_HISTORY, &by_scout)
            .await
            .map(drop)
            .map_err(RemovalError::from);
        if !report.record(RemovalStep::DeleteHistory, history) {
            return Ok(report);
        }

        let deleted_profile = self
            .store
            .delete(TABLE_SCOUTS, &by_id)
            .await
            .map(drop)
            .map_err(RemovalError::from);
        if !report.record(RemovalStep::DeleteProfile, deleted_profile) {
            return Ok(report);
        }

        if let Some(user_id) = user_id {
            let account = self.auth.delete_user(&user_id).await.map_err(RemovalError::from);
            report.record(RemovalStep::DeleteAccount, account);
        }

        Ok(report)
    }
}

/// Profile ids are integers in the hosted schema; anything else is matched
/// as text.
fn scout_key(scout_id: &str) -> Value {
    scout_id
        .parse::<i64>()
        .map_or_else(|_| Value::from(scout_id), Value::from)
}
