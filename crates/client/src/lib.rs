//! hsadmin - homeserver administration client
//!
//! A typed client for the homeserver admin API plus the interactive batch
//! tooling built on it:
//!
//! - [`client`]: authentication, requests with retry, paginated listings
//! - [`api`]: room, user, registration token and server operations
//! - [`listing`] and [`selection`]: client-side filter/sort/paging and the
//!   `1-5,7` index syntax
//! - [`batch`] and [`flow`]: confirmed, per-item batch execution and the
//!   interactive state machine that drives it
//! - [`commands`]: the `hsadmin` command-line surface

pub mod api;
pub mod batch;
pub mod client;
pub mod commands;
pub mod config;
pub mod flow;
pub mod listing;
pub mod prompt;
pub mod selection;

pub use batch::{execute, ActionKind, BatchReport, ItemResult, PendingAction, Target};
pub use client::{AdminClient, ClientOptions, Page, Session};
pub use config::{Config, ConfigError};
pub use flow::{BatchFlow, FlowOutcome, FlowState};
pub use listing::{CountPredicate, Filter, FilterError, FilterField, Listing, Sort, SortKey};
pub use prompt::{confirm, Console, ScriptedConsole, StdConsole};
pub use selection::{BatchSelection, SelectionError};

pub use hsadmin_shared::{
    AdminError, AdminResult, DeleteStatus, RegistrationToken, Resource, ResourceKind, Room, User,
};
