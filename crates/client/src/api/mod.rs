//! Typed admin API operations
//!
//! Each submodule extends [`AdminClient`](crate::client::AdminClient) with
//! the calls for one area of the server.

pub mod rooms;
pub mod server;
pub mod tokens;
pub mod users;

pub use rooms::{CallPermissionReport, DeleteRoomOptions, FixOutcome, CALL_EVENT_TYPES};
pub use server::{DetailedStats, EndpointStatus, RoomBreakdown, ServerStats, UserBreakdown};
pub use tokens::{generate_token, write_token_file, NewToken, TokenFilter, UnknownTokenFilter};
pub use users::NewUser;
