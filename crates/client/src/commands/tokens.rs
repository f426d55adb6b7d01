//! Registration token commands

use std::path::PathBuf;

use clap::Subcommand;
use time::macros::format_description;
use time::OffsetDateTime;

use hsadmin_shared::RegistrationToken;

use super::{check_report, Context};
use crate::api::{write_token_file, NewToken, TokenFilter};
use crate::batch::{self, ActionKind, PendingAction, Target};
use crate::listing::render_row;
use crate::prompt::Console;

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    /// List registration tokens
    List,
    /// Create random registration tokens
    Create {
        /// Number of tokens to create
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
        /// Registrations allowed per token
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "unlimited")]
        uses: u32,
        /// Allow any number of registrations
        #[arg(long)]
        unlimited: bool,
        /// Days until the tokens expire (never by default)
        #[arg(long)]
        expires_days: Option<u32>,
        /// Write the created tokens to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write existing registration tokens to a file
    Export {
        /// Which tokens to include: all, active or unused
        #[arg(long, default_value = "all")]
        filter: TokenFilter,
        /// Output file (exported_tokens_<timestamp>.txt by default)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete a registration token
    Delete {
        token: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

impl TokenAction {
    pub async fn run(self, ctx: &Context, console: &mut dyn Console) -> anyhow::Result<()> {
        match self {
            TokenAction::List => list(ctx, console).await,
            TokenAction::Create {
                count,
                uses,
                unlimited,
                expires_days,
                output,
            } => {
                let uses = if unlimited { None } else { Some(uses) };
                create(ctx, count, uses, expires_days, output, console).await
            }
            TokenAction::Export { filter, output } => export(ctx, filter, output, console).await,
            TokenAction::Delete { token, yes } => delete(ctx, &token, yes, console).await,
        }
    }
}

async fn list(ctx: &Context, console: &mut dyn Console) -> anyhow::Result<()> {
    let tokens = ctx.client.collect_all::<RegistrationToken>(&ctx.session).await?;
    if tokens.is_empty() {
        console.write_line("No registration tokens found.");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    console.write_line(&format!("Total registration tokens: {}", tokens.len()));
    console.write_line("");
    for (i, token) in tokens.iter().enumerate() {
        for line in render_row(i + 1, token) {
            console.write_line(&line);
        }
        if token.is_expired_at(now) {
            console.write_line("     Status: EXPIRED");
        } else if token.remaining_uses() == Some(0) {
            console.write_line("     Status: USED UP");
        }
    }
    Ok(())
}

async fn create(
    ctx: &Context,
    count: u32,
    uses_allowed: Option<u32>,
    expiry_days: Option<u32>,
    output: Option<PathBuf>,
    console: &mut dyn Console,
) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    let mut created = Vec::new();
    let mut failed = 0;

    for i in 1..=count {
        let new_token = NewToken::generate(uses_allowed, expiry_days, now);
        match ctx.client.create_registration_token(&ctx.session, &new_token).await {
            Ok(token) => {
                console.write_line(&format!("[{}/{}] Created {}", i, count, token.masked()));
                created.push(token);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Token creation failed");
                console.write_line(&format!("[{}/{}] FAILED: {}", i, count, e));
                failed += 1;
            }
        }
    }

    if let Some(path) = &output {
        if !created.is_empty() {
            write_token_file(path, ctx.session.base_url().as_str(), &created, "new tokens", now)?;
            console.write_line(&format!("Tokens saved to: {}", path.display()));
            console.write_line("Keep the token file secure, anyone holding a token can register.");
        }
    } else {
        console.write_line("");
        for token in &created {
            console.write_line(&token.token);
        }
    }

    console.write_line("");
    console.write_line(&format!("Created: {}", created.len()));
    console.write_line(&format!("Failed: {}", failed));
    if failed > 0 {
        anyhow::bail!("{} of {} tokens could not be created", failed, count);
    }
    Ok(())
}

async fn export(
    ctx: &Context,
    filter: TokenFilter,
    output: Option<PathBuf>,
    console: &mut dyn Console,
) -> anyhow::Result<()> {
    let tokens = ctx.client.collect_all::<RegistrationToken>(&ctx.session).await?;
    if tokens.is_empty() {
        console.write_line("No registration tokens found to export.");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let selected: Vec<RegistrationToken> =
        tokens.into_iter().filter(|t| filter.matches(t, now)).collect();
    if selected.is_empty() {
        console.write_line(&format!(
            "No tokens match the selected criteria ({}).",
            filter.describe()
        ));
        return Ok(());
    }

    let path = match output {
        Some(path) => path,
        None => PathBuf::from(default_export_name(now)?),
    };
    console.write_line(&format!(
        "Exporting {} tokens ({})...",
        selected.len(),
        filter.describe()
    ));
    write_token_file(&path, ctx.session.base_url().as_str(), &selected, filter.describe(), now)?;
    tracing::info!(count = selected.len(), path = %path.display(), "Registration tokens exported");

    console.write_line(&format!("Tokens exported to: {}", path.display()));
    console.write_line("Keep the token file secure, anyone holding a token can register.");
    Ok(())
}

fn default_export_name(now: OffsetDateTime) -> anyhow::Result<String> {
    let stamp = now.format(format_description!("[year][month][day]_[hour][minute][second]"))?;
    Ok(format!("exported_tokens_{}.txt", stamp))
}

async fn delete(ctx: &Context, token: &str, yes: bool, console: &mut dyn Console) -> anyhow::Result<()> {
    let pending = PendingAction::new(ActionKind::DeleteRegistrationToken, vec![Target::from_id(token)]);
    if !yes && !pending.confirm(console) {
        console.write_line("Cancelled.");
        return Ok(());
    }

    let report = batch::execute(
        &ctx.client,
        &ctx.session,
        &pending.kind,
        &pending.targets,
        console,
    )
    .await?;
    check_report(&report)
}
