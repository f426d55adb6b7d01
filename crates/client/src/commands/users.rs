//! User commands

use hsadmin_shared::User;

use super::{check_report, print_listing, Context, ListArgs};
use crate::api::NewUser;
use crate::batch::{self, ActionKind, PendingAction, Target};
use crate::prompt::Console;

pub async fn list(ctx: &Context, args: &ListArgs, console: &mut dyn Console) -> anyhow::Result<()> {
    let filter = args.to_filter()?;
    let users = ctx.client.collect_all::<User>(&ctx.session).await?;
    print_listing(console, &users, filter.as_ref(), args.sort.as_ref());
    Ok(())
}

pub async fn create(
    ctx: &Context,
    username: &str,
    password: String,
    displayname: Option<String>,
    admin: bool,
    console: &mut dyn Console,
) -> anyhow::Result<()> {
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    let server_name = ctx
        .session
        .server_name()
        .ok_or_else(|| anyhow::anyhow!("Cannot derive server name from {}", ctx.session.user_id()))?;

    let user = NewUser {
        user_id: NewUser::qualify(username, server_name),
        password,
        displayname,
        admin,
    };
    console.write_line(&format!("Creating user: {}", user.user_id));
    let created = ctx.client.create_user(&ctx.session, &user).await?;

    console.write_line("User created.");
    console.write_line(&format!("  User ID: {}", created.name));
    console.write_line(&format!("  Admin: {}", created.admin));
    Ok(())
}

pub async fn deactivate(
    ctx: &Context,
    user_id: &str,
    erase: bool,
    yes: bool,
    console: &mut dyn Console,
) -> anyhow::Result<()> {
    let target = match ctx.client.user_details(&ctx.session, user_id).await {
        Ok(user) => Target::from_resource(&user),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            tracing::debug!(user_id, error = %e, "User details unavailable");
            Target::from_id(user_id)
        }
    };

    let pending = PendingAction::new(ActionKind::DeactivateUser { erase }, vec![target]);
    if !yes && !pending.confirm(console) {
        console.write_line("Deactivation cancelled.");
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
