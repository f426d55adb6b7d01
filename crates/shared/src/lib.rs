//! hsadmin Shared Types and Errors
//!
//! Resource records and the error taxonomy shared by the admin client and CLI.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
