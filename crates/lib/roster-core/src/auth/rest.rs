use reqwest::{Method, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{AuthAdmin, AuthResult, AuthUser, CreateUserRequest, validate_user_id};
use crate::backend::{BackendClient, BackendError, check_status};

const ADMIN_USERS_PATH: &str = "auth/v1/admin/users";
const RECOVER_PATH: &str = "auth/v1/recover";

/// Accounts requested per page when listing.
const USERS_PAGE_SIZE: usize = 200;

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<AuthUser>,
}

/// `AuthAdmin` backed by the hosted auth service's admin API.
#[derive(Debug, Clone)]
pub struct RestAuthAdmin {
    client: BackendClient,
}

impl RestAuthAdmin {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }

    fn user_endpoint(&self, user_id: &str) -> AuthResult<reqwest::Url> {
        let user_id = validate_user_id(user_id)?;
        Ok(self.client.endpoint(&format!("{ADMIN_USERS_PATH}/{user_id}"))?)
    }
}

async fn decode_user(response: Response) -> AuthResult<AuthUser> {
    let body = response.bytes().await?;
    let user = serde_json::from_slice::<AuthUser>(&body)
        .map_err(|err| BackendError::Decode(format!("expected a user object: {err}")))?;
    Ok(user)
}

impl AuthAdmin for RestAuthAdmin {
    async fn create_user(&self, request: &CreateUserRequest) -> AuthResult<AuthUser> {
        debug!(email = %request.email, "creating account");
        let url = self.client.endpoint(ADMIN_USERS_PATH)?;
        let response = self
            .client
            .request(Method::POST, url)
            .json(request)
            .send()
            .await?;
        decode_user(check_status(response).await?).await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> AuthResult<()> {
        debug!(email, "requesting password reset email");
        let url = self.client.endpoint(RECOVER_PATH)?;
        let mut request = self.client.request(Method::POST, url);
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.json(&json!({ "email": email })).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_users(&self) -> AuthResult<Vec<AuthUser>> {
        let url = self.client.endpoint(ADMIN_USERS_PATH)?;
        let per_page = USERS_PAGE_SIZE.to_string();
        let mut users = Vec::new();
        for page in 1_usize.. {
            let response = self
                .client
                .request(Method::GET, url.clone())
                .query(&[("page", page.to_string().as_str()), ("per_page", per_page.as_str())])
                .send()
                .await?;
            let body = check_status(response).await?.bytes().await?;
            let batch = serde_json::from_slice::<UserPage>(&body)
                .map_err(|err| BackendError::Decode(format!("expected a user list: {err}")))?
                .users;
            let last = batch.len() < USERS_PAGE_SIZE;
            users.extend(batch);
            if last {
                break;
            }
        }
        debug!(count = users.len(), "listed accounts");
        Ok(users)
    }

    async fn confirm_email(&self, user_id: &str) -> AuthResult<AuthUser> {
        let url = self.user_endpoint(user_id)?;
        debug!(user_id, "confirming account email");
        let response = self
            .client
            .request(Method::PUT, url)
            .json(&json!({ "email_confirm": true }))
            .send()
            .await?;
        decode_user(check_status(response).await?).await
    }

    async fn delete_user(&self, user_id: &str) -> AuthResult<()> {
        let url = self.user_endpoint(user_id)?;
        debug!(user_id, "deleting account");
        let response = self.client.request(Method::DELETE, url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use roster_store::UserMetadata;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::AuthError;

    fn admin_for(server: &MockServer) -> RestAuthAdmin {
        RestAuthAdmin::new(BackendClient::new(&server.uri(), "service-key").expect("client"))
    }

    fn scout_request() -> CreateUserRequest {
        CreateUserRequest {
            email: "a@example.com".to_string(),
            password: "Abc123def456".to_string(),
            email_confirm: false,
            user_metadata: UserMetadata {
                is_leader: false,
                full_name: "Ada".to_string(),
                rank: "recruit".to_string(),
                user_role: "scout".to_string(),
                crew: "Terns".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn create_user_posts_admin_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/admin/users"))
            .and(header("apikey", "service-key"))
            .and(body_json(json!({
                "email": "a@example.com",
                "password": "Abc123def456",
                "email_confirm": false,
                "user_metadata": {
                    "is_leader": false,
                    "full_name": "Ada",
                    "rank": "recruit",
                    "user_role": "scout",
                    "crew": "Terns"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "4b0c2f4e-1111-2222-3333-444455556666",
                "email": "a@example.com",
                "user_metadata": {"user_role": "scout"},
                "aud": "authenticated"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = admin_for(&server)
            .create_user(&scout_request())
            .await
            .expect("account created");

        assert_eq!(user.id, "4b0c2f4e-1111-2222-3333-444455556666");
        assert_eq!(user.user_metadata["user_role"], json!("scout"));
    }

    #[tokio::test]
    async fn password_reset_passes_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/recover"))
            .and(query_param("redirect_to", "https://app.example.com/update-password"))
            .and(body_json(json!({"email": "a@example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        admin_for(&server)
            .send_password_reset("a@example.com", Some("https://app.example.com/update-password"))
            .await
            .expect("reset sent");
    }

    #[tokio::test]
    async fn duplicate_account_surfaces_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/admin/users"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": 422,
                "msg": "A user with this email address has already been registered"
            })))
            .mount(&server)
            .await;

        let err = admin_for(&server)
            .create_user(&scout_request())
            .await
            .expect_err("duplicate is rejected");

        assert!(matches!(
            err,
            AuthError::Backend(BackendError::Status { status: 422, ref message })
                if message.contains("already been registered")
        ));
    }

    #[tokio::test]
    async fn list_users_follows_pages_until_a_short_one() {
        let server = MockServer::start().await;
        let full_page: Vec<_> = (0..USERS_PAGE_SIZE)
            .map(|n| json!({"id": format!("user-{n}"), "email": format!("u{n}@example.com")}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/auth/v1/admin/users"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": full_page,
                "aud": "authenticated"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/admin/users"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{"id": "last", "email": "last@example.com"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let users = admin_for(&server).list_users().await.expect("listed");

        assert_eq!(users.len(), USERS_PAGE_SIZE + 1);
        assert_eq!(users.last().map(|user| user.id.as_str()), Some("last"));
    }

    #[tokio::test]
    async fn confirm_email_updates_the_account() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/admin/users/user-7"))
            .and(body_json(json!({"email_confirm": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-7",
                "email": "a@example.com",
                "email_confirmed_at": "2024-05-01T10:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = admin_for(&server).confirm_email("user-7").await.expect("confirmed");

        assert_eq!(user.email_confirmed_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn delete_user_surfaces_missing_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/auth/v1/admin/users/user-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/auth/v1/admin/users/user-8"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "msg": "User not found"
            })))
            .mount(&server)
            .await;
        let admin = admin_for(&server);

        admin.delete_user("user-7").await.expect("deleted");
        let err = admin.delete_user("user-8").await.expect_err("missing account");

        assert!(matches!(
            err,
            AuthError::Backend(BackendError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn unsafe_user_ids_never_reach_the_provider() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = admin_for(&server)
            .delete_user("../../rest/v1/scouts")
            .await
            .expect_err("rejected");

        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", scout_request());
        assert!(!rendered.contains("Abc123def456"));
    }
}
