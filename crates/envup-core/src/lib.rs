//! `envup-core`: upgrades the infrastructure template of an application's
//! environment stacks to the latest known version.
//!
//! ```text
//! Orchestrator ── resolve targets ──► EnvironmentDirectory
//!     │ per environment, in order
//!     ├─ current_version ──► EnvironmentStatusReader
//!     ├─ version::compare_with_policy
//!     ├─ CompatibilityGuard::check
//!     └─ UpgradeScheduler ── stack_status (poll) ──► EnvironmentStatusReader
//!                         └─ upgrade ──► UpgradeInvoker
//! ```

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod guard;
pub mod io;
pub mod local;
pub mod orchestrator;
pub mod paths;
pub mod scheduler;
pub mod select;
pub mod types;
pub mod version;

#[cfg(test)]
mod fakes;

pub use error::{BackendError, EnvUpError, Result};
pub use orchestrator::{Orchestrator, RunReport, RunState, UpgradeSettings};
