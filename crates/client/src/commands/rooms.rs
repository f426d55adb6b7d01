//! Room commands

use hsadmin_shared::{DeleteStatus, Room};

use super::{check_report, print_listing, Context, ListArgs};
use crate::api::{DeleteRoomOptions, FixOutcome};
use crate::batch::{self, ActionKind, PendingAction, Target};
use crate::prompt::Console;

pub async fn list(ctx: &Context, args: &ListArgs, console: &mut dyn Console) -> anyhow::Result<()> {
    let filter = args.to_filter()?;
    let rooms = ctx.client.collect_all::<Room>(&ctx.session).await?;
    print_listing(console, &rooms, filter.as_ref(), args.sort.as_ref());
    Ok(())
}

/// Accepts true/yes/purge and false/no/keep
pub fn parse_purge(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "purge" | "1" => Ok(true),
        "false" | "no" | "n" | "keep" | "0" => Ok(false),
        other => anyhow::bail!("Invalid purge value '{}' (expected true or false)", other),
    }
}

pub async fn delete(
    ctx: &Context,
    room: &str,
    purge: &str,
    wait: bool,
    yes: bool,
    console: &mut dyn Console,
) -> anyhow::Result<()> {
    let purge = parse_purge(purge)?;
    let room_id = ctx.client.resolve_room(&ctx.session, room).await?;

    let target = match ctx.client.room_details(&ctx.session, &room_id).await {
        Ok(details) => Target::from_resource(&details),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            tracing::debug!(room_id = %room_id, error = %e, "Room details unavailable");
            Target::from_id(room_id.clone())
        }
    };

    let options = DeleteRoomOptions::with_purge(purge);
    console.write_line(&format!("Purge history: {}", if purge { "yes" } else { "no" }));
    let pending = PendingAction::new(ActionKind::DeleteRoom(options.clone()), vec![target]);
    if !yes && !pending.confirm(console) {
        console.write_line("Deletion cancelled.");
        return Ok(());
    }

    let delete_id = ctx.client.delete_room(&ctx.session, &room_id, &options).await?;
    console.write_line(&format!("Deletion scheduled for {}", room_id));
    console.write_line(&format!("Delete ID: {}", delete_id));

    if wait {
        wait_for_deletion(ctx, &delete_id, console).await?;
    }
    Ok(())
}

async fn wait_for_deletion(ctx: &Context, delete_id: &str, console: &mut dyn Console) -> anyhow::Result<()> {
    let attempts = ctx.config.status_poll_attempts;
    let status = ctx
        .client
        .wait_for_deletion(
            &ctx.session,
            delete_id,
            attempts,
            ctx.config.status_poll_interval(),
            |attempt, status| {
                console.write_line(&format!("  [{}/{}] Status: {}", attempt, attempts, status.status));
            },
        )
        .await?;

    match status.status.as_str() {
        "complete" => {
            console.write_line("Room deletion completed.");
            Ok(())
        }
        "failed" => anyhow::bail!(
            "Room deletion failed: {}",
            status.error.as_deref().unwrap_or("unknown error")
        ),
        other => {
            console.write_line(&format!(
                "Deletion still {} after {} checks. Run `hsadmin status {}` later.",
                other, attempts, delete_id
            ));
            Ok(())
        }
    }
}

pub async fn status(ctx: &Context, delete_id: &str, console: &mut dyn Console) -> anyhow::Result<()> {
    let status = ctx.client.delete_status(&ctx.session, delete_id).await?;
    for line in describe_status(&status) {
        console.write_line(&line);
    }
    Ok(())
}

fn describe_status(status: &DeleteStatus) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(id) = &status.delete_id {
        lines.push(format!("Delete ID: {}", id));
    }
    if let Some(room_id) = &status.room_id {
        lines.push(format!("Room: {}", room_id));
    }
    lines.push(format!("Status: {}", status.status));
    if let Some(error) = &status.error {
        lines.push(format!("Error: {}", error));
    }
    lines
}

pub async fn fix(ctx: &Context, room: &str, console: &mut dyn Console) -> anyhow::Result<()> {
    let room_id = ctx.client.resolve_room(&ctx.session, room).await?;
    console.write_line(&format!("Fixing call permissions for {}", room_id));
    match ctx.client.fix_call_permissions(&ctx.session, &room_id).await? {
        FixOutcome::AlreadyCompliant => console.write_line("Call permissions already allow everyone."),
        FixOutcome::Updated { event_id } => {
            console.write_line("Permissions updated.");
            console.write_line(&format!("  Event ID: {}", event_id));
        }
    }
    Ok(())
}

pub async fn fix_all(ctx: &Context, yes: bool, console: &mut dyn Console) -> anyhow::Result<()> {
    let rooms = ctx.client.collect_all::<Room>(&ctx.session).await?;
    if rooms.is_empty() {
        console.write_line("No rooms found.");
        return Ok(());
    }

    let targets: Vec<Target> = rooms.iter().map(Target::from_resource).collect();
    let pending = PendingAction::new(ActionKind::FixCallPermissions, targets);
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
    for line in report.render("Call permissions") {
        console.write_line(&line);
    }
    check_report(&report)
}

pub async fn check(ctx: &Context, room: &str, console: &mut dyn Console) -> anyhow::Result<()> {
    let room_id = ctx.client.resolve_room(&ctx.session, room).await?;
    let report = ctx.client.check_call_permissions(&ctx.session, &room_id).await?;

    console.write_line(&format!("Call permissions for {}", report.room_id));
    for (event, level) in &report.levels {
        let level = level.map_or_else(|| "not set".to_string(), |l| l.to_string());
        console.write_line(&format!("  {}: {}", event, level));
    }
    console.write_line(&format!(
        "Needs fix: {}",
        if report.needs_fix() { "yes" } else { "no" }
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_purge() {
        for value in ["true", "YES", "purge", "1"] {
            assert!(parse_purge(value).unwrap_or(false), "{value}");
        }
        for value in ["false", "no", "Keep", "0"] {
            assert!(!parse_purge(value).unwrap_or(true), "{value}");
        }
        assert!(parse_purge("maybe").is_err());
    }

    #[test]
    fn test_describe_failed_status() {
        let status = DeleteStatus {
            delete_id: Some("abc".into()),
            room_id: Some("!r:example.org".into()),
            status: "failed".into(),
            error: Some("shutdown failed".into()),
        };
        let lines = describe_status(&status);
        assert_eq!(lines[2], "Status: failed");
        assert_eq!(lines[3], "Error: shutdown failed");
    }
}
