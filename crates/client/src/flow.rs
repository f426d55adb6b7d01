//! Interactive batch flow
//!
//! Drives one batch operation through its states:
//!
//! ```text
//! Listing -> Filtering / Sorting -> Listing
//! Listing -> Selecting -> Confirming -> Executing -> Reporting
//!                              |
//!                              +-> Listing (phrase mismatch)
//! ```
//!
//! Nothing is sent to the server before `Executing`, and `Executing` is
//! only entered from a successful confirmation.

use hsadmin_shared::{AdminResult, Resource};

use crate::batch::{self, ActionKind, BatchReport, PendingAction, Target};
use crate::client::{AdminClient, Session};
use crate::listing::{render_row, Filter, FilterField, Listing, Sort};
use crate::prompt::Console;
use crate::selection::BatchSelection;

const COMMAND_PROMPT: &str =
    "Select (e.g. 1-5,7), [f]ilter, [s]ort, [c]lear, [r]eset, [n]ext/[p]rev/[g]oto page, [q]uit: ";

const SORT_PROMPT: &str =
    "Sort by [name/alias/id/count/date/role], prefix '-' for descending: ";

/// Where the flow currently is
#[derive(Debug)]
pub enum FlowState {
    Listing,
    Filtering,
    Sorting,
    /// Raw selection text typed by the operator
    Selecting(String),
    Confirming(PendingAction),
    Executing(PendingAction),
    Reporting(BatchReport),
}

/// How a flow ended
#[derive(Debug)]
pub enum FlowOutcome {
    /// The operator left without executing anything
    Cancelled,
    Completed(BatchReport),
}

/// One interactive batch operation over a fetched collection
pub struct BatchFlow<'a, R> {
    client: &'a AdminClient,
    session: &'a Session,
    action: ActionKind,
    listing: Listing<R>,
}

impl<'a, R: Resource> BatchFlow<'a, R> {
    pub fn new(
        client: &'a AdminClient,
        session: &'a Session,
        action: ActionKind,
        items: Vec<R>,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            session,
            action,
            listing: Listing::new(items, page_size),
        }
    }

    /// Fetch the whole collection the action applies to
    pub async fn load(
        client: &'a AdminClient,
        session: &'a Session,
        action: ActionKind,
        page_size: usize,
    ) -> AdminResult<Self> {
        let items = client.collect_all::<R>(session).await?;
        tracing::debug!(kind = ?R::KIND, count = items.len(), "Loaded collection");
        Ok(Self::new(client, session, action, items, page_size))
    }

    pub fn listing(&self) -> &Listing<R> {
        &self.listing
    }

    /// Run until the operator quits or the batch has been reported
    ///
    /// Only a fatal error during execution is returned as `Err`.
    pub async fn run(mut self, console: &mut dyn Console) -> AdminResult<FlowOutcome> {
        if self.listing.total() == 0 {
            console.write_line(&format!("No {} found.", R::KIND.plural()));
            return Ok(FlowOutcome::Cancelled);
        }

        let mut state = FlowState::Listing;
        loop {
            state = match state {
                FlowState::Listing => match self.listing_command(console) {
                    Some(next) => next,
                    None => {
                        console.write_line("Cancelled.");
                        return Ok(FlowOutcome::Cancelled);
                    }
                },
                FlowState::Filtering => {
                    self.read_filter(console);
                    FlowState::Listing
                }
                FlowState::Sorting => {
                    self.read_sort(console);
                    FlowState::Listing
                }
                FlowState::Selecting(input) => match BatchSelection::parse(&input, self.listing.len()) {
                    Ok(selection) => {
                        let targets = self
                            .listing
                            .resolve(&selection)
                            .iter()
                            .map(Target::from_resource)
                            .collect();
                        FlowState::Confirming(PendingAction::new(self.action.clone(), targets))
                    }
                    Err(e) => {
                        console.write_line(&e.to_string());
                        FlowState::Listing
                    }
                },
                FlowState::Confirming(pending) => {
                    if pending.confirm(console) {
                        FlowState::Executing(pending)
                    } else {
                        console.write_line("Not confirmed, nothing was changed.");
                        FlowState::Listing
                    }
                }
                FlowState::Executing(pending) => {
                    let report = batch::execute(
                        self.client,
                        self.session,
                        &pending.kind,
                        &pending.targets,
                        console,
                    )
                    .await?;
                    FlowState::Reporting(report)
                }
                FlowState::Reporting(report) => {
                    for line in report.render(&self.action.to_string()) {
                        console.write_line(&line);
                    }
                    return Ok(FlowOutcome::Completed(report));
                }
            };
        }
    }

    /// Show the current page and read the next command; `None` quits
    fn listing_command(&mut self, console: &mut dyn Console) -> Option<FlowState> {
        console.write_line("");
        for line in self.listing.status_lines() {
            console.write_line(&line);
        }
        console.write_line("");
        if self.listing.is_empty() {
            console.write_line("No items match the current filter.");
        }
        for (index, item) in self.listing.page_rows() {
            for line in render_row(index, item) {
                console.write_line(&line);
            }
        }
        console.write_line("");

        let input = console.read_line(COMMAND_PROMPT)?;
        let command = input.trim();
        let next = match command.to_lowercase().as_str() {
            "q" | "quit" => return None,
            "" if self.listing.is_empty() => return None,
            "f" => FlowState::Filtering,
            "s" => FlowState::Sorting,
            "c" => {
                self.listing.set_filter(None);
                FlowState::Listing
            }
            "r" => {
                self.listing.reset();
                FlowState::Listing
            }
            "" | "n" => {
                if !self.listing.next_page() {
                    console.write_line("Already on the last page.");
                }
                FlowState::Listing
            }
            "p" => {
                if !self.listing.prev_page() {
                    console.write_line("Already on the first page.");
                }
                FlowState::Listing
            }
            "g" => {
                let page = console
                    .read_line(&format!("Page (1-{}): ", self.listing.page_count()))
                    .and_then(|p| p.trim().parse::<usize>().ok());
                if !page.map_or(false, |p| self.listing.goto_page(p)) {
                    console.write_line("Invalid page number.");
                }
                FlowState::Listing
            }
            _ => FlowState::Selecting(command.to_string()),
        };
        Some(next)
    }

    fn read_filter(&mut self, console: &mut dyn Console) {
        let Some(field) = console.read_line("Filter by [name/alias/id/any/count]: ") else {
            return;
        };
        let field = match field.parse::<FilterField>() {
            Ok(field) => field,
            Err(e) => {
                console.write_line(&e.to_string());
                return;
            }
        };
        let hint = if field == FilterField::Count {
            "Count (5, >10, <20, 10-50): "
        } else {
            "Text: "
        };
        let Some(text) = console.read_line(hint) else {
            return;
        };
        match Filter::parse(field, &text) {
            Ok(filter) => self.listing.set_filter(Some(filter)),
            Err(e) => console.write_line(&e.to_string()),
        }
    }

    fn read_sort(&mut self, console: &mut dyn Console) {
        let Some(key) = console.read_line(SORT_PROMPT) else {
            return;
        };
        if key.trim().is_empty() {
            self.listing.set_sort(None);
            return;
        }
        match key.parse::<Sort>() {
            Ok(sort) => self.listing.set_sort(Some(sort)),
            Err(e) => console.write_line(&e.to_string()),
        }
    }
}
