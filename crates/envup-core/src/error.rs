use std::time::Duration;

use thiserror::Error;

/// Error type returned by external collaborators (directory, status reader,
/// upgrade invoker). Opaque to the orchestrator beyond its message chain.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The read that failed, reported with `EnvUpError::Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    ListEnvironments,
    GetEnvironment,
    TemplateVersion,
    StackStatus,
}

impl ReadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadStage::ListEnvironments => "list environments",
            ReadStage::GetEnvironment => "get environment",
            ReadStage::TemplateVersion => "get template version",
            ReadStage::StackStatus => "get stack status",
        }
    }
}

impl std::fmt::Display for ReadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EnvUpError {
    #[error("not initialized: no .envup/ directory found")]
    NotInitialized,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidName(String),

    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    #[error("environment {env} does not exist in application {app}")]
    EnvironmentNotFound { app: String, env: String },

    #[error("{stage} for {} in application {app}: {source}", read_scope(.env))]
    Read {
        stage: ReadStage,
        app: String,
        env: Option<String>,
        #[source]
        source: BackendError,
    },

    #[error("environment {env} in application {app} reports template version '{version}': {reason}")]
    InvalidVersionFormat {
        app: String,
        env: String,
        version: String,
        reason: String,
    },

    #[error("cannot upgrade environment {env} in application {app}: {remediation}")]
    Blocked {
        app: String,
        env: String,
        remediation: String,
    },

    #[error("stack of environment {env} in application {app} is in a failed state; resolve it before upgrading")]
    StackInFailedState { app: String, env: String },

    #[error("timed out after {:.1}s waiting for the stack of environment {env} in application {app} to become idle", .waited.as_secs_f64())]
    UpgradeTimedOut {
        app: String,
        env: String,
        waited: Duration,
    },

    #[error("upgrade of application {app} cancelled{}", cancel_scope(.env))]
    Cancelled { app: String, env: Option<String> },

    #[error("upgrade environment {env} in application {app}: {source}")]
    UpgradeInvocation {
        app: String,
        env: String,
        #[source]
        source: BackendError,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl EnvUpError {
    /// The environment this error is scoped to, if any.
    pub fn environment(&self) -> Option<&str> {
        match self {
            EnvUpError::EnvironmentNotFound { env, .. }
            | EnvUpError::InvalidVersionFormat { env, .. }
            | EnvUpError::Blocked { env, .. }
            | EnvUpError::StackInFailedState { env, .. }
            | EnvUpError::UpgradeTimedOut { env, .. }
            | EnvUpError::UpgradeInvocation { env, .. } => Some(env),
            EnvUpError::Read { env, .. } | EnvUpError::Cancelled { env, .. } => env.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EnvUpError::Cancelled { .. })
    }
}

fn read_scope(env: &Option<String>) -> String {
    match env {
        Some(env) => format!("environment {env}"),
        None => "all environments".to_string(),
    }
}

fn cancel_scope(env: &Option<String>) -> String {
    env.as_deref()
        .map(|env| format!(" while processing environment {env}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, EnvUpError>;
