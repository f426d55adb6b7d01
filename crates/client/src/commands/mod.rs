//! Command-line surface of the `hsadmin` binary

pub mod interactive;
pub mod rooms;
pub mod server;
pub mod tokens;
pub mod users;

use clap::{Args, Parser, Subcommand};

use hsadmin_shared::Resource;

use crate::client::{AdminClient, Session};
use crate::config::Config;
use crate::listing::{self, render_row, CountPredicate, Filter, FilterField, Sort};
use crate::prompt::Console;

/// Homeserver administration tool
#[derive(Debug, Parser)]
#[command(name = "hsadmin", version, about)]
pub struct Cli {
    /// Homeserver base URL (overrides HOMESERVER_URL)
    #[arg(long, global = true)]
    pub homeserver: Option<String>,

    /// Admin access token (overrides ADMIN_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "HSADMIN_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List rooms
    List(ListArgs),
    /// Delete a room by ID or alias
    Delete {
        /// Room ID (!id:server) or alias (#alias:server)
        room: String,
        /// Purge history: true/yes/purge or false/no/keep
        #[arg(default_value = "true")]
        purge: String,
        /// Poll the deletion status until it finishes
        #[arg(long)]
        wait: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the status of a room deletion
    Status {
        /// Deletion ID returned by `delete`
        delete_id: String,
    },
    /// Allow everyone in a room to start and join calls
    Fix {
        /// Room ID or alias
        room: String,
    },
    /// Fix call permissions in every room
    FixAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Report the call permissions of a room
    Check {
        /// Room ID or alias
        room: String,
    },
    /// Show the identity behind the admin token
    Whoami,
    /// Show server version and totals
    Stats {
        /// Also break down users by state and rooms by size
        #[arg(long)]
        detailed: bool,
    },
    /// Show connection details and which endpoints answer
    Info,
    /// List user accounts
    Users(ListArgs),
    /// Create a user account
    CreateUser {
        /// Localpart or full user ID
        username: String,
        #[arg(long, env = "HSADMIN_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        displayname: Option<String>,
        /// Grant server admin rights
        #[arg(long)]
        admin: bool,
    },
    /// Deactivate a user account
    Deactivate {
        /// Full user ID (@user:server)
        user: String,
        /// Also erase the user's data
        #[arg(long)]
        erase: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Manage registration tokens
    Tokens {
        #[command(subcommand)]
        action: tokens::TokenAction,
    },
    /// Interactive select-confirm-execute operations
    Batch {
        #[command(subcommand)]
        action: interactive::BatchAction,
    },
}

/// Filtering and sorting flags shared by listing commands
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Case-insensitive text to look for
    #[arg(long)]
    pub filter: Option<String>,

    /// Field the text filter applies to: name, alias, id or any
    #[arg(long, default_value = "any")]
    pub field: FilterField,

    /// Count predicate such as 5, >10, <20 or 10-50
    #[arg(long, allow_hyphen_values = true)]
    pub count: Option<CountPredicate>,

    /// Sort key (name, alias, id, count, date, role); prefix '-' for descending
    #[arg(long, allow_hyphen_values = true)]
    pub sort: Option<Sort>,
}

impl ListArgs {
    /// Filter described by the flags; a count predicate wins over text
    pub fn to_filter(&self) -> anyhow::Result<Option<Filter>> {
        if let Some(predicate) = self.count {
            return Ok(Some(Filter::Count(predicate)));
        }
        match &self.filter {
            Some(text) => Ok(Some(Filter::parse(self.field, text)?)),
            None => Ok(None),
        }
    }
}

/// Everything a command needs once the session is established
pub struct Context {
    pub config: Config,
    pub client: AdminClient,
    pub session: Session,
}

impl Cli {
    /// Load configuration, authenticate, and run the chosen command
    pub async fn run(self, console: &mut dyn Console) -> anyhow::Result<()> {
        let config = Config::from_env_with(self.homeserver, self.token)?;
        let client = AdminClient::from_config(&config)?;
        let session = client
            .authenticate(&config.homeserver_url, &config.admin_token)
            .await?;
        let ctx = Context {
            config,
            client,
            session,
        };

        match self.command {
            Commands::List(args) => rooms::list(&ctx, &args, console).await,
            Commands::Delete {
                room,
                purge,
                wait,
                yes,
            } => rooms::delete(&ctx, &room, &purge, wait, yes, console).await,
            Commands::Status { delete_id } => rooms::status(&ctx, &delete_id, console).await,
            Commands::Fix { room } => rooms::fix(&ctx, &room, console).await,
            Commands::FixAll { yes } => rooms::fix_all(&ctx, yes, console).await,
            Commands::Check { room } => rooms::check(&ctx, &room, console).await,
            Commands::Whoami => server::whoami(&ctx, console).await,
            Commands::Stats { detailed } => server::stats(&ctx, detailed, console).await,
            Commands::Info => server::info(&ctx, console).await,
            Commands::Users(args) => users::list(&ctx, &args, console).await,
            Commands::CreateUser {
                username,
                password,
                displayname,
                admin,
            } => users::create(&ctx, &username, password, displayname, admin, console).await,
            Commands::Deactivate { user, erase, yes } => {
                users::deactivate(&ctx, &user, erase, yes, console).await
            }
            Commands::Tokens { action } => action.run(&ctx, console).await,
            Commands::Batch { action } => action.run(&ctx, console).await,
        }
    }
}

/// Print a filtered, sorted collection with one-based indices
pub(crate) fn print_listing<R: Resource>(
    console: &mut dyn Console,
    items: &[R],
    filter: Option<&Filter>,
    sort: Option<&Sort>,
) {
    let view = listing::apply(items, filter, sort);
    let mut title = format!("Total {}: {}", R::KIND.plural(), view.len());
    if view.len() != items.len() {
        title = format!("{} of {}", title, items.len());
    }
    console.write_line(&title);
    if let Some(filter) = filter {
        console.write_line(&format!("Filter: {}", filter));
    }
    console.write_line("");
    for (pos, &i) in view.iter().enumerate() {
        for line in render_row(pos + 1, &items[i]) {
            console.write_line(&line);
        }
    }
}

/// Fail the command when any batch item failed
pub(crate) fn check_report(report: &crate::batch::BatchReport) -> anyhow::Result<()> {
    if report.failed() > 0 {
        anyhow::bail!("{} of {} items failed", report.failed(), report.len());
    }
    Ok(())
}
