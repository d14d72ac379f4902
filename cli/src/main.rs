//! `projectdesk` command-line front end.
//!
//! Each invocation is one app session: wire `App`, run the boot-time session
//! check, execute a single command, print JSON on stdout. Logs go to stderr
//! (`RUST_LOG`, default `warn`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use projectdesk::config::ConfigError;
use projectdesk::guards::{Guard, GuardDecision};
use projectdesk::net::types::{OrganizationCreate, OrganizationUpdate, ProjectCreate, ProjectStatus, ProjectUpdate};
use projectdesk::roles::{self, OrgRole};
use projectdesk::{App, AppError, ClientConfig, Session};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{message} ({source})", message = .source.user_message())]
    App {
        #[from]
        source: AppError,
    },
    #[error("not signed in; run `projectdesk login` first")]
    NotSignedIn,
    #[error("no organization selected; run `projectdesk org use <id>`")]
    NoOrganization,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "projectdesk", about = "ProjectDesk session and project CLI")]
struct Cli {
    #[arg(long, env = "PROJECTDESK_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "PROJECTDESK_STATE_DIR")]
    state_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PROJECTDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PROJECTDESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: String,
    },
    Logout,
    Whoami,
    VerifyEmail {
        token: String,
    },
    ResendVerification,
    /// Print the guard decision for a route class.
    Route {
        #[arg(value_enum)]
        kind: RouteKind,
    },
    Org(OrgCommand),
    Project(ProjectCommand),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RouteKind {
    /// Login and register pages.
    Guest,
    /// Any signed-in page.
    Protected,
    /// Pages scoped to the active organization.
    Org,
}

#[derive(Args, Debug)]
struct OrgCommand {
    #[command(subcommand)]
    command: OrgSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrgSubcommand {
    List,
    Use {
        org_id: String,
    },
    Current,
    Clear,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
    },
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
    },
    Delete {
        org_id: String,
    },
    Members,
    Invite {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "member")]
        role: OrgRole,
    },
    Role {
        member_id: String,
        role: OrgRole,
    },
    Remove {
        member_id: String,
    },
}

#[derive(Args, Debug)]
struct ProjectCommand {
    #[command(subcommand)]
    command: ProjectSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectSubcommand {
    List,
    Get {
        project_id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, help = "ISO date, e.g. 2025-03-01")]
        start_date: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        project_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    Delete {
        project_id: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl From<StatusArg> for ProjectStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Planning => Self::Planning,
            StatusArg::Active => Self::Active,
            StatusArg::OnHold => Self::OnHold,
            StatusArg::Completed => Self::Completed,
            StatusArg::Cancelled => Self::Cancelled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config = config.with_api_base_url(url)?;
    }
    if let Some(dir) = &cli.state_dir {
        config = config.with_state_dir(dir)?;
    }

    let app = App::new(&config)?;
    app.boot().await;

    match cli.command {
        Command::Login { email, password } => {
            app.sign_in(&email, &password).await?;
            print_json(&session_json(&app.session().snapshot()))
        }
        Command::Register { email, password, full_name } => {
            app.sign_up(&email, &password, &full_name).await?;
            print_json(&session_json(&app.session().snapshot()))
        }
        Command::Logout => {
            app.sign_out().await;
            print_json(&session_json(&app.session().snapshot()))
        }
        Command::Whoami => print_json(&session_json(&app.session().snapshot())),
        Command::VerifyEmail { token } => {
            let session = app.verify_email(&token).await?;
            print_json(&session_json(&session))
        }
        Command::ResendVerification => {
            let message = app.resend_verification_email().await?;
            print_json(&json!({ "message": message }))
        }
        Command::Route { kind } => {
            let chain: &[Guard] = match kind {
                RouteKind::Guest => &[Guard::GuestOnly],
                RouteKind::Protected => &[Guard::AuthenticatedOnly],
                RouteKind::Org => &[Guard::AuthenticatedOnly, Guard::OrganizationSelected],
            };
            print_json(&decision_json(app.guard(chain)))
        }
        Command::Org(org) => {
            require_signed_in(&app)?;
            run_org(&app, org).await
        }
        Command::Project(project) => {
            require_signed_in(&app)?;
            run_project(&app, project).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn require_signed_in(app: &App) -> Result<(), CliError> {
    match app.guard(&[Guard::AuthenticatedOnly]) {
        GuardDecision::Render => Ok(()),
        _ => Err(CliError::NotSignedIn),
    }
}

async fn active_org(app: &App) -> Result<String, CliError> {
    app.ensure_active_org().await?.ok_or(CliError::NoOrganization)
}

async fn run_org(app: &App, org: OrgCommand) -> Result<(), CliError> {
    match org.command {
        OrgSubcommand::List => print_json(&serde_json::to_value(app.organizations().await?)?),
        OrgSubcommand::Use { org_id } => print_json(&serde_json::to_value(app.select_organization(&org_id).await?)?),
        OrgSubcommand::Current => {
            active_org(app).await?;
            let org = app.active_organization().await?;
            let role = app.my_role().await?;
            print_json(&json!({
                "organization": org,
                "role": role,
                "can_manage_members": roles::can_manage_members(role),
                "can_manage_settings": roles::can_manage_settings(role),
                "can_delete_org": roles::can_delete_org(role),
            }))
        }
        OrgSubcommand::Clear => {
            app.orgs().clear();
            print_json(&json!({ "active_org_id": null }))
        }
        OrgSubcommand::Create { name, slug } => {
            let org = app.create_organization(&OrganizationCreate { name, slug }).await?;
            print_json(&serde_json::to_value(org)?)
        }
        OrgSubcommand::Update { name, slug } => {
            let org_id = active_org(app).await?;
            let update = OrganizationUpdate { name, slug, ..OrganizationUpdate::default() };
            print_json(&serde_json::to_value(app.update_organization(&org_id, &update).await?)?)
        }
        OrgSubcommand::Delete { org_id } => {
            app.delete_organization(&org_id).await?;
            print_json(&json!({ "deleted": org_id }))
        }
        OrgSubcommand::Members => {
            let org_id = active_org(app).await?;
            print_json(&serde_json::to_value(app.members(&org_id).await?)?)
        }
        OrgSubcommand::Invite { email, role } => {
            let org_id = active_org(app).await?;
            print_json(&serde_json::to_value(app.invite_member(&org_id, &email, role).await?)?)
        }
        OrgSubcommand::Role { member_id, role } => {
            let org_id = active_org(app).await?;
            print_json(&serde_json::to_value(app.update_member_role(&org_id, &member_id, role).await?)?)
        }
        OrgSubcommand::Remove { member_id } => {
            let org_id = active_org(app).await?;
            app.remove_member(&org_id, &member_id).await?;
            print_json(&json!({ "removed": member_id }))
        }
    }
}

async fn run_project(app: &App, project: ProjectCommand) -> Result<(), CliError> {
    active_org(app).await?;
    match project.command {
        ProjectSubcommand::List => print_json(&serde_json::to_value(app.projects().await?)?),
        ProjectSubcommand::Get { project_id } => print_json(&serde_json::to_value(app.project(&project_id).await?)?),
        ProjectSubcommand::Create { name, start_date, description } => {
            let data = ProjectCreate { name, description, start_date, schedule_from: None, currency: None };
            print_json(&serde_json::to_value(app.create_project(&data).await?)?)
        }
        ProjectSubcommand::Update { project_id, name, description, status } => {
            let update = ProjectUpdate { name, description, status: status.map(ProjectStatus::from) };
            print_json(&serde_json::to_value(app.update_project(&project_id, &update).await?)?)
        }
        ProjectSubcommand::Delete { project_id } => {
            app.delete_project(&project_id).await?;
            print_json(&json!({ "deleted": project_id }))
        }
    }
}

fn session_json(session: &Session) -> Value {
    json!({
        "status": format!("{:?}", session.status).to_lowercase(),
        "initialized": session.is_initialized(),
        "authenticated": session.is_authenticated(),
        "user": session.user,
    })
}

fn decision_json(decision: GuardDecision) -> Value {
    match decision {
        GuardDecision::Render => json!({ "decision": "render" }),
        GuardDecision::Loading => json!({ "decision": "loading" }),
        GuardDecision::SelectOrganization => json!({ "decision": "select-organization" }),
        GuardDecision::Redirect(redirect) => {
            json!({ "decision": "redirect", "to": redirect.to, "replace": redirect.replace })
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
