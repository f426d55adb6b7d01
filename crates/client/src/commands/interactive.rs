//! Interactive batch commands

use clap::Subcommand;

use hsadmin_shared::{RegistrationToken, Resource, Room, User};

use super::{check_report, Context};
use crate::api::DeleteRoomOptions;
use crate::batch::ActionKind;
use crate::flow::{BatchFlow, FlowOutcome};
use crate::prompt::Console;

#[derive(Debug, Subcommand)]
pub enum BatchAction {
    /// Pick rooms to delete
    DeleteRooms {
        /// Keep room history instead of purging it
        #[arg(long)]
        keep_history: bool,
    },
    /// Pick users to deactivate
    DeactivateUsers {
        /// Also erase the users' data
        #[arg(long)]
        erase: bool,
    },
    /// Pick registration tokens to delete
    DeleteTokens,
}

impl BatchAction {
    pub async fn run(self, ctx: &Context, console: &mut dyn Console) -> anyhow::Result<()> {
        match self {
            BatchAction::DeleteRooms { keep_history } => {
                let action = ActionKind::DeleteRoom(DeleteRoomOptions::with_purge(!keep_history));
                run_flow::<Room>(ctx, action, console).await
            }
            BatchAction::DeactivateUsers { erase } => {
                run_flow::<User>(ctx, ActionKind::DeactivateUser { erase }, console).await
            }
            BatchAction::DeleteTokens => {
                run_flow::<RegistrationToken>(ctx, ActionKind::DeleteRegistrationToken, console).await
            }
        }
    }
}

async fn run_flow<R: Resource>(ctx: &Context, action: ActionKind, console: &mut dyn Console) -> anyhow::Result<()> {
    if action.target_kind() != R::KIND {
        anyhow::bail!("'{}' does not apply to {}", action, R::KIND.plural());
    }
    let flow = BatchFlow::<R>::load(&ctx.client, &ctx.session, action, ctx.config.page_size).await?;
    match flow.run(console).await? {
        FlowOutcome::Cancelled => Ok(()),
        FlowOutcome::Completed(report) => check_report(&report),
    }
}
