//! CLI command implementations.

pub mod create;
pub mod delete;
pub mod status;
pub mod update;
pub mod wait;

mod context;

pub use context::CommandContext;
