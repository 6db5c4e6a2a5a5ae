//! Auth provider admin client.
//!
//! Every call runs with the admin (service) key: account creation,
//! password-reset delivery, listing, email confirmation, and deletion.

use std::error::Error;
use std::fmt;
use std::future::Future;

use roster_store::UserMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::BackendError;

pub mod memory;
pub mod rest;

pub use memory::MemoryAuthAdmin;
pub use rest::RestAuthAdmin;

#[derive(Debug)]
pub enum AuthError {
    Backend(BackendError),
    InvalidInput(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for AuthError {}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.into())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Admin request to create an account.
#[derive(Clone, Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}

impl fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("email_confirm", &self.email_confirm)
            .field("user_metadata", &self.user_metadata)
            .finish()
    }
}

/// Account as returned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<String>,
}

pub trait AuthAdmin: Send + Sync + 'static {
    fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> impl Future<Output = AuthResult<AuthUser>> + Send;

    fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> impl Future<Output = AuthResult<()>> + Send;

    fn list_users(&self) -> impl Future<Output = AuthResult<Vec<AuthUser>>> + Send;

    /// Marks the account's email as confirmed and returns the account.
    fn confirm_email(&self, user_id: &str) -> impl Future<Output = AuthResult<AuthUser>> + Send;

    fn delete_user(&self, user_id: &str) -> impl Future<Output = AuthResult<()>> + Send;
}

/// Trims `user_id` and checks it is safe to use as a URL path segment.
///
/// # Errors
/// Returns `AuthError::InvalidInput` for an empty id or one with characters
/// other than ASCII letters, digits, `-` and `_`.
pub fn validate_user_id(user_id: &str) -> AuthResult<&str> {
    let trimmed = user_id.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(AuthError::InvalidInput(format!(
            "`{user_id}` is not a user id"
        )))
    }
}
