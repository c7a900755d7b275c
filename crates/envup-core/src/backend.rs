//! Collaborator interfaces consumed by the orchestrator.
//!
//! Each capability is a narrow trait so that callers can inject the cloud
//! backend, the local file backend in [`crate::local`], or a test double
//! independently of one another.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{EnvironmentRecord, StackStatus};

/// Registry of the environments belonging to an application.
#[async_trait]
pub trait EnvironmentDirectory: Send + Sync {
    /// `Ok(None)` when the application has no environment called `name`.
    async fn get_environment(
        &self,
        app: &str,
        name: &str,
    ) -> Result<Option<EnvironmentRecord>, BackendError>;

    async fn list_environments(&self, app: &str) -> Result<Vec<EnvironmentRecord>, BackendError>;
}

/// Live view of an environment's stack. Reads may lag mutations made
/// elsewhere; implementations must not cache.
#[async_trait]
pub trait EnvironmentStatusReader: Send + Sync {
    async fn current_version(&self, app: &str, env: &str) -> Result<String, BackendError>;

    async fn stack_status(&self, app: &str, env: &str) -> Result<StackStatus, BackendError>;
}

/// Re-deploys an environment's stack with the given template version.
#[async_trait]
pub trait UpgradeInvoker: Send + Sync {
    async fn upgrade(&self, app: &str, env: &str, target_version: &str)
        -> Result<(), BackendError>;
}

/// Receives advisory messages. Never influences control flow.
pub trait DiagnosticsSink: Send + Sync {
    fn advise(&self, app: &str, env: &str, message: &str);
}

/// Default sink: advisories go to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn advise(&self, app: &str, env: &str, message: &str) {
        tracing::debug!(app, env, "{message}");
    }
}
