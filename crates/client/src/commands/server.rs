//! Identity and server information commands

use super::Context;
use crate::prompt::Console;

pub async fn whoami(ctx: &Context, console: &mut dyn Console) -> anyhow::Result<()> {
    console.write_line(&format!("User ID: {}", ctx.session.user_id()));
    console.write_line(&format!("Server: {}", ctx.session.base_url()));
    Ok(())
}

pub async fn stats(ctx: &Context, detailed: bool, console: &mut dyn Console) -> anyhow::Result<()> {
    let stats = ctx.client.server_stats(&ctx.session).await?;
    let total = |n: Option<u64>| n.map_or_else(|| "unknown".to_string(), |n| n.to_string());

    console.write_line(&format!("Server version: {}", stats.server_version));
    console.write_line(&format!("Total users: {}", total(stats.total_users)));
    console.write_line(&format!("Total rooms: {}", total(stats.total_rooms)));
    if !detailed {
        return Ok(());
    }

    let details = ctx.client.detailed_stats(&ctx.session).await?;
    console.write_line("");
    console.write_line("Detailed statistics");
    match details.users {
        Some(users) => {
            console.write_line(&format!("Active users: {}", users.active));
            console.write_line(&format!("Admin users: {}", users.admins));
            console.write_line(&format!("Deactivated users: {}", users.deactivated));
        }
        None => console.write_line("User breakdown: N/A"),
    }
    match details.rooms {
        Some(rooms) => {
            console.write_line(&format!("Empty rooms: {}", rooms.empty));
            console.write_line(&format!("Small rooms (1-5 members): {}", rooms.small));
            console.write_line(&format!("Medium rooms (6-20 members): {}", rooms.medium));
            console.write_line(&format!("Large rooms (20+ members): {}", rooms.large));
            console.write_line(&format!(
                "Average room size: {:.1} members",
                rooms.average_members
            ));
        }
        None => console.write_line("Room breakdown: N/A"),
    }
    Ok(())
}

/// Connection summary plus a reachability check of the main endpoints
pub async fn info(ctx: &Context, console: &mut dyn Console) -> anyhow::Result<()> {
    console.write_line(&format!("Homeserver URL: {}", ctx.session.base_url()));
    match ctx.client.server_version(&ctx.session).await {
        Ok(version) => console.write_line(&format!("Server version: {}", version.server_version)),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(_) => console.write_line("Server version: unable to retrieve"),
    }
    console.write_line(&format!("Connected as: {}", ctx.session.user_id()));

    console.write_line("");
    console.write_line("Endpoint status:");
    for endpoint in ctx.client.check_endpoints(&ctx.session).await {
        match &endpoint.state {
            Ok(()) => console.write_line(&format!("  {}: available", endpoint.name)),
            Err(reason) => {
                console.write_line(&format!("  {}: unavailable ({})", endpoint.name, reason))
            }
        }
    }
    Ok(())
}
