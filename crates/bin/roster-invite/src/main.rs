//! Account administration CLI.
//!
//! Runs one command against the hosted auth and database APIs: an
//! invitation, an account listing, confirmation or deletion, or a scout
//! removal. Results are printed as JSON on stdout. Invitations and removals
//! exit non-zero when any step failed.

mod config;

use std::process::ExitCode;

use roster_core::auth::{AuthAdmin, RestAuthAdmin};
use roster_core::backend::BackendClient;
use roster_core::invite::InvitationService;
use roster_core::removal::ScoutRemovalService;
use roster_core::store::RestTableStore;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{AdminCommand, AdminConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<ExitCode, BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AdminConfig::from_args()?;
    let client = BackendClient::new(&config.backend_url, config.service_key.as_str())?;
    let auth = RestAuthAdmin::new(client.clone());
    let store = RestTableStore::new(client);

    match config.command {
        AdminCommand::Invite {
            redirect_to,
            request,
        } => {
            let service = InvitationService::new(auth, store).with_redirect_to(redirect_to);
            let report = service.invite(request).await?;
            print_json(&report)?;
            if let Some(failure) = &report.failure {
                error!(email = %report.email, step = %failure.step, "invitation incomplete");
                return Ok(ExitCode::FAILURE);
            }
            info!(email = %report.email, user_id = ?report.user_id, "invitation complete");
        }
        AdminCommand::ListUsers => {
            let users = auth.list_users().await?;
            print_json(&users)?;
        }
        AdminCommand::ConfirmEmail { user_id } => {
            let user = auth.confirm_email(&user_id).await?;
            print_json(&user)?;
            info!(user_id = %user.id, "email confirmed");
        }
        AdminCommand::DeleteUser { user_id } => {
            auth.delete_user(&user_id).await?;
            print_json(&json!({ "deleted": user_id }))?;
            info!(%user_id, "account deleted");
        }
        AdminCommand::RemoveScout { scout_id } => {
            let report = ScoutRemovalService::new(auth, store)
                .remove_scout(&scout_id)
                .await?;
            print_json(&report)?;
            if let Some(failure) = &report.failure {
                error!(scout_id = %report.scout_id, step = %failure.step, "scout removal incomplete");
                return Ok(ExitCode::FAILURE);
            }
            info!(scout_id = %report.scout_id, user_id = ?report.user_id, "scout removed");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
