//! Confirmed batch actions and their per-item results

use std::fmt;

use hsadmin_shared::{AdminError, AdminResult, Resource, ResourceKind};

use crate::api::{DeleteRoomOptions, FixOutcome};
use crate::client::{AdminClient, Session};
use crate::prompt::{confirm, Console};

/// Operation applied to every selected target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    DeleteRoom(DeleteRoomOptions),
    DeactivateUser { erase: bool },
    FixCallPermissions,
    DeleteRegistrationToken,
}

impl ActionKind {
    /// Collection the action's targets come from
    pub fn target_kind(&self) -> ResourceKind {
        match self {
            ActionKind::DeleteRoom(_) | ActionKind::FixCallPermissions => ResourceKind::Room,
            ActionKind::DeactivateUser { .. } => ResourceKind::User,
            ActionKind::DeleteRegistrationToken => ResourceKind::RegistrationToken,
        }
    }

    /// Irreversible actions need a typed phrase instead of yes/no
    pub fn is_destructive(&self) -> bool {
        !matches!(self, ActionKind::FixCallPermissions)
    }

    /// Phrase the operator must type, e.g. `delete 3 rooms`
    pub fn required_phrase(&self, count: usize) -> Option<String> {
        let (verb, singular, plural) = match self {
            ActionKind::DeleteRoom(_) => ("delete", "room", "rooms"),
            ActionKind::DeactivateUser { .. } => ("deactivate", "user", "users"),
            ActionKind::DeleteRegistrationToken => ("delete", "token", "tokens"),
            ActionKind::FixCallPermissions => return None,
        };
        let noun = if count == 1 { singular } else { plural };
        Some(format!("{} {} {}", verb, count, noun))
    }

    fn warnings(&self) -> Vec<String> {
        match self {
            ActionKind::DeleteRoom(options) => vec![
                "WARNING: This action cannot be undone!".to_string(),
                if options.purge {
                    "All room history will be PURGED from the database.".to_string()
                } else {
                    "Room history will be kept (purge disabled).".to_string()
                },
            ],
            ActionKind::DeactivateUser { erase } => {
                let mut lines = vec![
                    "WARNING: This action cannot be undone!".to_string(),
                    "Deactivated users lose access and all their sessions end.".to_string(),
                ];
                if *erase {
                    lines.push("User data will be ERASED.".to_string());
                }
                lines
            }
            ActionKind::FixCallPermissions => {
                vec!["Call event permissions will be set to level 0.".to_string()]
            }
            ActionKind::DeleteRegistrationToken => vec![
                "WARNING: This action cannot be undone!".to_string(),
                "Deleted tokens can no longer be used to register.".to_string(),
            ],
        }
    }

    /// Apply the action to one target and describe what happened
    async fn apply(
        &self,
        client: &AdminClient,
        session: &Session,
        target: &Target,
    ) -> AdminResult<String> {
        match self {
            ActionKind::DeleteRoom(options) => {
                let delete_id = client.delete_room(session, &target.id, options).await?;
                Ok(format!("deletion scheduled (delete_id {})", delete_id))
            }
            ActionKind::DeactivateUser { erase } => {
                client.deactivate_user(session, &target.id, *erase).await?;
                Ok("deactivated".to_string())
            }
            ActionKind::FixCallPermissions => {
                match client.fix_call_permissions(session, &target.id).await? {
                    FixOutcome::AlreadyCompliant => Ok("already compliant".to_string()),
                    FixOutcome::Updated { event_id } => Ok(format!("updated (event {})", event_id)),
                }
            }
            ActionKind::DeleteRegistrationToken => {
                client.delete_registration_token(session, &target.id).await?;
                Ok("deleted".to_string())
            }
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::DeleteRoom(options) if options.purge => f.write_str("delete room (purge)"),
            ActionKind::DeleteRoom(_) => f.write_str("delete room (keep history)"),
            ActionKind::DeactivateUser { erase: true } => f.write_str("deactivate user (erase)"),
            ActionKind::DeactivateUser { .. } => f.write_str("deactivate user"),
            ActionKind::FixCallPermissions => f.write_str("fix call permissions"),
            ActionKind::DeleteRegistrationToken => f.write_str("delete registration token"),
        }
    }
}

/// One item an action is applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    /// Short description for progress output
    pub label: String,
    /// Lines shown in the confirmation summary
    pub summary: Vec<String>,
}

impl Target {
    pub fn from_resource<R: Resource>(resource: &R) -> Self {
        let mut summary = vec![resource.headline()];
        summary.extend(resource.details());
        Self {
            id: resource.id().to_string(),
            label: resource.label().to_string(),
            summary,
        }
    }

    /// Target known only by its identifier
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            summary: vec![id.clone()],
            id,
        }
    }
}

/// An action bound to its targets, waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub targets: Vec<Target>,
}

impl PendingAction {
    pub fn new(kind: ActionKind, targets: Vec<Target>) -> Self {
        Self { kind, targets }
    }

    pub fn required_phrase(&self) -> Option<String> {
        self.kind.required_phrase(self.targets.len())
    }

    /// Show what will happen and ask the operator
    pub fn confirm(&self, console: &mut dyn Console) -> bool {
        console.write_line(&format!(
            "You have selected {} {} to {}:",
            self.targets.len(),
            if self.targets.len() == 1 { "item" } else { "items" },
            self.kind
        ));
        console.write_line("");
        for (i, target) in self.targets.iter().enumerate() {
            for (line_no, line) in target.summary.iter().enumerate() {
                if line_no == 0 {
                    console.write_line(&format!("{}. {}", i + 1, line));
                } else {
                    console.write_line(&format!("   {}", line));
                }
            }
        }
        console.write_line("");
        for warning in self.kind.warnings() {
            console.write_line(&warning);
        }

        match self.required_phrase() {
            Some(phrase) => confirm(console, "> ", Some(&phrase)),
            None => confirm(console, "Proceed? (yes/no): ", None),
        }
    }
}

/// Outcome for a single target
#[derive(Debug)]
pub struct ItemResult {
    pub target: Target,
    pub outcome: Result<String, AdminError>,
}

impl ItemResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every target's result, in execution order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Target, &AdminError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (&r.target, e)))
    }

    pub fn render(&self, title: &str) -> Vec<String> {
        let rule = "=".repeat(50);
        let mut lines = vec![
            String::new(),
            rule.clone(),
            format!("{} SUMMARY", title.to_uppercase()),
            rule,
            format!("Successful: {}", self.succeeded()),
            format!("Failed: {}", self.failed()),
        ];
        if self.failed() > 0 {
            lines.push(String::new());
            lines.push("Failures:".to_string());
            for (target, error) in self.failures() {
                lines.push(format!("  - {} ({}): {}", target.label, target.id, error));
                if let Some(payload) = error.payload() {
                    lines.push(format!("    {}", payload));
                }
            }
        }
        lines
    }
}

/// Apply `kind` to each target in turn
///
/// A failing target is recorded and the batch moves on. Only an
/// authentication failure stops the batch, and that error is returned
/// instead of a report.
pub async fn execute(
    client: &AdminClient,
    session: &Session,
    kind: &ActionKind,
    targets: &[Target],
    console: &mut dyn Console,
) -> AdminResult<BatchReport> {
    let total = targets.len();
    let mut report = BatchReport::default();

    for (i, target) in targets.iter().enumerate() {
        console.write_line(&format!("[{}/{}] Processing: {}", i + 1, total, target.label));

        let outcome = match kind.apply(client, session, target).await {
            Ok(detail) => {
                tracing::info!(action = %kind, target = %target.id, "{}", detail);
                console.write_line(&format!("  OK: {}", detail));
                Ok(detail)
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(action = %kind, target = %target.id, error = %e, "Batch aborted");
                console.write_line(&format!("  FAILED: {}", e));
                console.write_line(&format!(
                    "Aborting: {} of {} items were processed before the session was lost",
                    i, total
                ));
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(action = %kind, target = %target.id, error = %e, "Batch item failed");
                console.write_line(&format!("  FAILED: {}", e));
                Err(e)
            }
        };

        report.results.push(ItemResult {
            target: target.clone(),
            outcome,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedConsole;

    fn targets(n: usize) -> Vec<Target> {
        (1..=n).map(|i| Target::from_id(format!("!r{}:example.org", i))).collect()
    }

    #[test]
    fn test_required_phrases() {
        let delete = ActionKind::DeleteRoom(DeleteRoomOptions::default());
        assert_eq!(delete.required_phrase(1).as_deref(), Some("delete 1 room"));
        assert_eq!(delete.required_phrase(3).as_deref(), Some("delete 3 rooms"));
        assert_eq!(
            ActionKind::DeactivateUser { erase: false }.required_phrase(2).as_deref(),
            Some("deactivate 2 users")
        );
        assert_eq!(
            ActionKind::DeleteRegistrationToken.required_phrase(5).as_deref(),
            Some("delete 5 tokens")
        );
        assert_eq!(ActionKind::FixCallPermissions.required_phrase(2), None);
        assert!(ActionKind::DeleteRegistrationToken.is_destructive());
        assert!(!ActionKind::FixCallPermissions.is_destructive());
    }

    #[test]
    fn test_token_deletion_needs_phrase_not_yes() {
        let tokens: Vec<Target> = (1..=5).map(|n| Target::from_id(format!("tok{}", n))).collect();
        let action = PendingAction::new(ActionKind::DeleteRegistrationToken, tokens);

        let mut console = ScriptedConsole::new(["y"]);
        assert!(!action.confirm(&mut console));
        assert!(console.contains("WARNING: This action cannot be undone!"));

        let mut console = ScriptedConsole::new(["delete 5 tokens"]);
        assert!(action.confirm(&mut console));
    }

    #[test]
    fn test_confirm_lists_targets_and_purge_status() {
        let action = PendingAction::new(
            ActionKind::DeleteRoom(DeleteRoomOptions::default()),
            targets(2),
        );
        let mut console = ScriptedConsole::new(["delete 2 rooms"]);
        assert!(action.confirm(&mut console));
        assert!(console.contains("1. !r1:example.org"));
        assert!(console.contains("PURGED"));
        assert!(console.contains("Type 'delete 2 rooms' to confirm:"));
    }

    #[test]
    fn test_confirm_rejects_near_miss() {
        let action = PendingAction::new(
            ActionKind::DeactivateUser { erase: false },
            targets(1),
        );
        let mut console = ScriptedConsole::new(["deactivate 1 users"]);
        assert!(!action.confirm(&mut console));
    }

    #[test]
    fn test_report_counts_and_render() {
        let mut report = BatchReport::default();
        report.results.push(ItemResult {
            target: Target::from_id("!a:example.org"),
            outcome: Ok("deleted".into()),
        });
        report.results.push(ItemResult {
            target: Target::from_id("!b:example.org"),
            outcome: Err(AdminError::Remote {
                status: 500,
                errcode: Some("M_UNKNOWN".into()),
                message: "boom".into(),
                body: r#"{"errcode":"M_UNKNOWN","error":"boom"}"#.into(),
            }),
        });
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);

        let lines = report.render("Deletion");
        assert!(lines.contains(&"DELETION SUMMARY".to_string()));
        assert!(lines.iter().any(|l| l.contains("!b:example.org") && l.contains("boom")));
        assert!(lines.iter().any(|l| l.contains(r#""errcode":"M_UNKNOWN""#)));
    }
}
