//! Account invitation.
//!
//! An invitation creates the account, asks the auth provider to mail a
//! password reset, records the role, and for scouts seeds a profile. Steps
//! run in order and stop at the first failure. Nothing already done is
//! undone; the returned [`InvitationReport`] says how far the run got.

use std::error::Error;
use std::fmt;

use roster_store::schema::{COLUMN_USER_ID, TABLE_SCOUTS, TABLE_USER_ROLES};
use roster_store::{Filter, FilterError, RoleAssignment, ScoutProfile, UserMetadata, to_row};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::{AuthAdmin, AuthError, CreateUserRequest};
use crate::store::{Select, StoreError, TableStore};

pub const ONE_TIME_PASSWORD_LEN: usize = 12;

const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// Largest multiple of the alphabet size that fits in a byte.
const PASSWORD_SAMPLE_BOUND: u8 = 248;

/// Draws an alphanumeric password from the OS random source.
///
/// # Errors
/// Returns `InviteError::Random` if the OS random source is unavailable.
pub fn generate_one_time_password() -> Result<String, InviteError> {
    let mut password = String::with_capacity(ONE_TIME_PASSWORD_LEN);
    let mut buffer = [0u8; 32];
    while password.len() < ONE_TIME_PASSWORD_LEN {
        getrandom::fill(&mut buffer).map_err(|err| InviteError::Random(err.to_string()))?;
        for byte in buffer {
            if password.len() == ONE_TIME_PASSWORD_LEN {
                break;
            }
            if byte < PASSWORD_SAMPLE_BOUND {
                let index = usize::from(byte) % PASSWORD_ALPHABET.len();
                password.push(char::from(PASSWORD_ALPHABET[index]));
            }
        }
    }
    Ok(password)
}

#[derive(Debug)]
pub enum InviteError {
    InvalidInput(String),
    Auth(AuthError),
    Store(StoreError),
    Filter(FilterError),
    Encode(serde_json::Error),
    Random(String),
}

impl fmt::Display for InviteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Filter(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode record: {err}"),
            Self::Random(message) => write!(f, "failed to generate password: {message}"),
        }
    }
}

impl Error for InviteError {}

impl From<AuthError> for InviteError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for InviteError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<FilterError> for InviteError {
    fn from(err: FilterError) -> Self {
        Self::Filter(err)
    }
}

impl From<serde_json::Error> for InviteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err)
    }
}

/// Who to invite and the metadata to attach to the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    #[serde(flatten)]
    pub metadata: UserMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStep {
    GeneratePassword,
    CreateAccount,
    SendPasswordReset,
    AssignRole,
    CreateProfile,
}

impl InvitationStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeneratePassword => "generate_password",
            Self::CreateAccount => "create_account",
            Self::SendPasswordReset => "send_password_reset",
            Self::AssignRole => "assign_role",
            Self::CreateProfile => "create_profile",
        }
    }
}

impl fmt::Display for InvitationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: InvitationStep,
    pub message: String,
}

/// Outcome of one invitation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationReport {
    pub email: String,
    pub user_id: Option<String>,
    pub completed: Vec<InvitationStep>,
    pub failure: Option<StepFailure>,
}

impl InvitationReport {
    fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            user_id: None,
            completed: Vec::new(),
            failure: None,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    fn record<T>(&mut self, step: InvitationStep, outcome: Result<T, InviteError>) -> Option<T> {
        match outcome {
            Ok(value) => {
                info!(email = %self.email, %step, "invitation step completed");
                self.completed.push(step);
                Some(value)
            }
            Err(err) => {
                error!(email = %self.email, %step, error = %err, "invitation step failed");
                self.failure = Some(StepFailure {
                    step,
                    message: err.to_string(),
                });
                None
            }
        }
    }
}

/// Runs invitations against an auth provider and a table store.
pub struct InvitationService<A: AuthAdmin, S: TableStore> {
    auth: A,
    store: S,
    redirect_to: Option<String>,
}

impl<A: AuthAdmin, S: TableStore> InvitationService<A, S> {
    pub const fn new(auth: A, store: S) -> Self {
        Self {
            auth,
            store,
            redirect_to: None,
        }
    }

    /// URL the password-reset mail sends the user to.
    #[must_use]
    pub fn with_redirect_to(mut self, redirect_to: Option<String>) -> Self {
        self.redirect_to = redirect_to;
        self
    }

    pub const fn auth(&self) -> &A {
        &self.auth
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Invites one user.
    ///
    /// # Errors
    /// Returns `InviteError::InvalidInput` for a malformed email; nothing
    /// has been touched in that case. Failures after that point are reported
    /// in the returned `InvitationReport`.
    pub async fn invite(&self, request: InviteRequest) -> Result<InvitationReport, InviteError> {
        let email = request.email.trim().to_string();
        validate_email(&email)?;
        let metadata = request.metadata;
        let mut report = InvitationReport::new(&email);

        let Some(password) =
            report.record(InvitationStep::GeneratePassword, generate_one_time_password())
        else {
            return Ok(report);
        };

        let create = CreateUserRequest {
            email: email.clone(),
            password,
            email_confirm: false,
            user_metadata: metadata.clone(),
        };
        let created = self.auth.create_user(&create).await.map_err(InviteError::from);
        let Some(user) = report.record(InvitationStep::CreateAccount, created) else {
            return Ok(report);
        };
        report.user_id = Some(user.id.clone());

        let reset = self
            .auth
            .send_password_reset(&email, self.redirect_to.as_deref())
            .await
            .map_err(InviteError::from);
        if report.record(InvitationStep::SendPasswordReset, reset).is_none() {
            return Ok(report);
        }

        let assigned = self.assign_role(&user.id, &metadata.user_role).await;
        if report.record(InvitationStep::AssignRole, assigned).is_none() {
            return Ok(report);
        }

        if metadata.is_scout() {
            let profile = self.create_profile(&user.id, &metadata).await;
            report.record(InvitationStep::CreateProfile, profile);
        }

        Ok(report)
    }

    async fn assign_role(&self, user_id: &str, user_role: &str) -> Result<(), InviteError> {
        let by_user = Filter::eq(COLUMN_USER_ID, user_id)?;
        let existing = self
            .store
            .select(
                TABLE_USER_ROLES,
                &Select::all().with_filter(by_user.clone()).with_limit(1),
            )
            .await?;
        let row = to_row(&RoleAssignment {
            user_id: user_id.to_string(),
            user_role: user_role.to_string(),
        })?;
        if existing.is_empty() {
            self.store.insert(TABLE_USER_ROLES, vec![row]).await?;
        } else {
            self.store.update(TABLE_USER_ROLES, row, &by_user).await?;
        }
        Ok(())
    }

    async fn create_profile(&self, user_id: &str, metadata: &UserMetadata) -> Result<(), InviteError> {
        let row = to_row(&ScoutProfile::for_new_scout(user_id, metadata))?;
        self.store.insert(TABLE_SCOUTS, vec![row]).await?;
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), InviteError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(())
    } else {
        Err(InviteError::InvalidInput(format!(
            "`{email}` is not an email address"
        )))
    }
}
