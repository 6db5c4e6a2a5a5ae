use clap::{Args, Parser, Subcommand};
use roster_core::invite::InviteRequest;
use roster_store::UserMetadata;
use std::error::Error;
use std::fmt;

#[derive(Parser, Debug)]
#[command(
    name = "roster-invite",
    version,
    about = "Invite users and manage roster accounts."
)]
struct CliArgs {
    #[arg(long, env = "ROSTER_BACKEND_URL", global = true)]
    backend_url: Option<String>,

    #[arg(long, env = "ROSTER_SERVICE_KEY", hide_env_values = true, global = true)]
    service_key: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Create the account, send a password reset, assign the role.
    Invite(InviteArgs),
    /// Print every account as JSON.
    ListUsers,
    /// Mark an account's email address as confirmed.
    ConfirmEmail {
        #[arg(long)]
        user_id: String,
    },
    /// Delete an account.
    DeleteUser {
        #[arg(long)]
        user_id: String,
    },
    /// Delete a scout's history and profile, then its account.
    RemoveScout {
        #[arg(long)]
        scout_id: String,
    },
}

#[derive(Args, Debug)]
struct InviteArgs {
    #[arg(long)]
    email: String,

    #[arg(long, default_value = "")]
    role: String,

    #[arg(long, default_value = "")]
    full_name: String,

    #[arg(long, default_value = "")]
    rank: String,

    #[arg(long, default_value = "")]
    crew: String,

    #[arg(long, default_value_t = false)]
    leader: bool,

    #[arg(long, env = "ROSTER_RESET_REDIRECT")]
    redirect_to: Option<String>,
}

/// What one run of the CLI does.
#[derive(Debug, Clone)]
pub enum AdminCommand {
    Invite {
        redirect_to: Option<String>,
        request: InviteRequest,
    },
    ListUsers,
    ConfirmEmail {
        user_id: String,
    },
    DeleteUser {
        user_id: String,
    },
    RemoveScout {
        scout_id: String,
    },
}

/// Backend credentials plus the command to run against them.
#[derive(Clone)]
pub struct AdminConfig {
    pub backend_url: String,
    pub service_key: String,
    pub command: AdminCommand,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("backend_url", &self.backend_url)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
        }
    }
}

impl Error for ConfigError {}

impl AdminConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl From<CliCommand> for AdminCommand {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Invite(args) => Self::Invite {
                redirect_to: non_blank(args.redirect_to),
                request: InviteRequest {
                    email: args.email,
                    metadata: UserMetadata {
                        is_leader: args.leader,
                        full_name: args.full_name,
                        rank: args.rank,
                        user_role: args.role,
                        crew: args.crew,
                    },
                },
            },
            CliCommand::ListUsers => Self::ListUsers,
            CliCommand::ConfirmEmail { user_id } => Self::ConfirmEmail { user_id },
            CliCommand::DeleteUser { user_id } => Self::DeleteUser { user_id },
            CliCommand::RemoveScout { scout_id } => Self::RemoveScout { scout_id },
        }
    }
}

impl TryFrom<CliArgs> for AdminConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let backend_url =
            non_blank(args.backend_url).ok_or(ConfigError::MissingSetting("ROSTER_BACKEND_URL"))?;
        let service_key =
            non_blank(args.service_key).ok_or(ConfigError::MissingSetting("ROSTER_SERVICE_KEY"))?;

        Ok(Self {
            backend_url,
            service_key,
            command: args.command.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        let mut argv = vec![
            "roster-invite",
            "--backend-url",
            "https://project.example.com",
            "--service-key",
            "service-key",
        ];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv)
    }

    #[test]
    fn builds_scout_invitation() {
        let args = parse(&[
            "invite",
            "--email",
            "a@example.com",
            "--role",
            "scout",
            "--full-name",
            "John Soe",
            "--rank",
            "Senior",
            "--crew",
            "Terns",
        ])
        .expect("arguments parse");

        let config = AdminConfig::try_from(args).expect("config should parse");

        let AdminCommand::Invite { request, .. } = config.command else {
            panic!("expected an invitation, got {:?}", config.command);
        };
        assert_eq!(request.email, "a@example.com");
        assert!(request.metadata.is_scout());
        assert!(!request.metadata.is_leader);
        assert_eq!(request.metadata.crew, "Terns");
    }

    #[test]
    fn email_is_required() {
        assert!(parse(&["invite", "--role", "scout"]).is_err());
    }

    #[test]
    fn a_command_is_required() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn blank_credentials_are_missing() {
        let mut args = parse(&["invite", "--email", "a@example.com", "--leader"]).expect("arguments parse");
        args.service_key = Some(String::new());

        let err = AdminConfig::try_from(args).expect_err("blank key");

        assert!(matches!(err, ConfigError::MissingSetting("ROSTER_SERVICE_KEY")));
    }

    #[test]
    fn account_commands_take_their_ids() {
        let remove = AdminConfig::try_from(parse(&["remove-scout", "--scout-id", "5"]).expect("parses"))
            .expect("config");
        assert!(matches!(remove.command, AdminCommand::RemoveScout { ref scout_id } if scout_id == "5"));

        let delete = AdminConfig::try_from(parse(&["delete-user", "--user-id", "abc"]).expect("parses"))
            .expect("config");
        assert!(matches!(delete.command, AdminCommand::DeleteUser { ref user_id } if user_id == "abc"));

        let list = AdminConfig::try_from(parse(&["list-users"]).expect("parses")).expect("config");
        assert!(matches!(list.command, AdminCommand::ListUsers));

        assert!(parse(&["confirm-email"]).is_err());
    }

    #[test]
    fn credentials_may_follow_the_command() {
        let args = CliArgs::try_parse_from([
            "roster-invite",
            "list-users",
            "--backend-url",
            "https://project.example.com",
            "--service-key",
            "service-key",
        ])
        .expect("global flags parse after the command");

        let config = AdminConfig::try_from(args).expect("config");
        assert_eq!(config.backend_url, "https://project.example.com");
    }
}
