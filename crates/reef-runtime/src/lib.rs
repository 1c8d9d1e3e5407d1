//! Environment lifecycle orchestration.
//!
//! This crate drives an external declarative-infrastructure engine through
//! asynchronous, eventually-consistent operations: it reconciles partial
//! configuration changes into complete parameter sets, polls long-running
//! remote operations with bounded retries, and sequences the side-effect
//! steps that follow a successful environment creation.
//!
//! All remote systems are collaborator traits (see [`provider`]); concrete
//! implementations live in separate crates.

pub mod certificate;
pub mod credentials;
pub mod error;
pub mod params;
pub mod provider;
pub mod provision;
pub mod secrets;
pub mod stack;
pub mod template;
pub mod wait;

pub use error::{OrchestratorError, Result};
pub use provider::Providers;
pub use stack::StackService;
