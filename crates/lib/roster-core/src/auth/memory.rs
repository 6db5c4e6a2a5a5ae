use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{AuthAdmin, AuthResult, AuthUser, CreateUserRequest, validate_user_id};
use crate::backend::BackendError;

/// In-process `AuthAdmin` that records what it was asked to do.
///
/// Account creation, reset delivery, and deletion can be primed to fail,
/// which is how the invitation and removal tests exercise partial
/// completion.
#[derive(Clone, Default)]
pub struct MemoryAuthAdmin {
    state: Arc<Mutex<MemoryAuthState>>,
}

#[derive(Default)]
struct MemoryAuthState {
    users: Vec<AuthUser>,
    created: usize,
    password_resets: Vec<PasswordReset>,
    fail_create: Option<String>,
    fail_reset: Option<String>,
    fail_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub email: String,
    pub redirect_to: Option<String>,
}

impl MemoryAuthAdmin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create_user` fail with `message`.
    pub async fn fail_create_user(&self, message: impl Into<String>) {
        self.state.lock().await.fail_create = Some(message.into());
    }

    /// Makes every subsequent `send_password_reset` fail with `message`.
    pub async fn fail_password_reset(&self, message: impl Into<String>) {
        self.state.lock().await.fail_reset = Some(message.into());
    }

    /// Makes every subsequent `delete_user` fail with `message`.
    pub async fn fail_delete_user(&self, message: impl Into<String>) {
        self.state.lock().await.fail_delete = Some(message.into());
    }

    /// Adds an account directly, as if created outside roster.
    pub async fn add_user(&self, user: AuthUser) {
        self.state.lock().await.users.push(user);
    }

    pub async fn users(&self) -> Vec<AuthUser> {
        self.state.lock().await.users.clone()
    }

    pub async fn password_resets(&self) -> Vec<PasswordReset> {
        self.state.lock().await.password_resets.clone()
    }
}

fn user_not_found() -> BackendError {
    BackendError::Status {
        status: 404,
        message: "User not found".to_string(),
    }
}

fn injected(message: &str) -> BackendError {
    BackendError::Status {
        status: 500,
        message: message.to_string(),
    }
}

impl AuthAdmin for MemoryAuthAdmin {
    async fn create_user(&self, request: &CreateUserRequest) -> AuthResult<AuthUser> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_create.as_deref() {
            return Err(injected(message).into());
        }
        let duplicate = state
            .users
            .iter()
            .any(|user| user.email.as_deref() == Some(request.email.as_str()));
        if duplicate {
            return Err(BackendError::Status {
                status: 422,
                message: "A user with this email address has already been registered".to_string(),
            }
            .into());
        }
        state.created += 1;
        let user = AuthUser {
            id: format!("user-{}", state.created),
            email: Some(request.email.clone()),
            user_metadata: serde_json::to_value(&request.user_metadata).unwrap_or(Value::Null),
            email_confirmed_at: None,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_reset.as_deref() {
            return Err(injected(message).into());
        }
        state.password_resets.push(PasswordReset {
            email: email.to_string(),
            redirect_to: redirect_to.map(str::to_string),
        });
        Ok(())
    }

    async fn list_users(&self) -> AuthResult<Vec<AuthUser>> {
        Ok(self.state.lock().await.users.clone())
    }

    async fn confirm_email(&self, user_id: &str) -> AuthResult<AuthUser> {
        let user_id = validate_user_id(user_id)?;
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(user_not_found)?;
        user.email_confirmed_at
            .get_or_insert_with(|| Utc::now().to_rfc3339());
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: &str) -> AuthResult<()> {
        let user_id = validate_user_id(user_id)?;
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_delete.as_deref() {
            return Err(injected(message).into());
        }
        let before = state.users.len();
        state.users.retain(|user| user.id != user_id);
        if state.users.len() == before {
            return Err(user_not_found().into());
        }
        Ok(())
    }
}
