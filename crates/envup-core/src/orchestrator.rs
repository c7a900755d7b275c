//! Sequential, fail-fast upgrade of an application's environments.
//!
//! A run moves through explicit phases:
//!
//! ```text
//! Resolve ──► Evaluate(0) ──► Evaluate(1) ──► … ──► Finished(Completed)
//!    │             │
//!    └─────────────┴──► Finished(Failed | Cancelled)
//! ```
//!
//! The target set is resolved once. Each environment reaches a terminal
//! outcome before the next one is looked at, and the first failure ends the
//! run with the remaining environments left untouched. The [`RunReport`]
//! records how far the run got.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{
    DiagnosticsSink, EnvironmentDirectory, EnvironmentStatusReader, TracingDiagnostics,
    UpgradeInvoker,
};
use crate::cancel::Cancellation;
use crate::config::Config;
use crate::error::{EnvUpError, ReadStage, Result};
use crate::guard::{CompatibilityGuard, GuardVerdict};
use crate::scheduler::{PollSettings, ScheduleReport, UpgradeScheduler};
use crate::types::{EnvironmentRecord, Target, UpgradeDecision, UpgradeRequest};
use crate::version::{self, InvalidVersionPolicy, VersionOrdering};

// ---------------------------------------------------------------------------
// UpgradeSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UpgradeSettings {
    pub latest_version: String,
    pub invalid_versions: InvalidVersionPolicy,
    pub poll: PollSettings,
}

impl UpgradeSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.ensure_valid()?;
        Ok(Self {
            latest_version: config.latest_template_version.clone(),
            invalid_versions: config.invalid_versions,
            poll: config.poll.settings(),
        })
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentOutcome {
    NotEvaluated,
    Skipped,
    Upgraded,
    Blocked,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<UpgradeDecision>,
    pub outcome: EnvironmentOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleReport>,
}

impl EnvironmentReport {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            deployed_version: None,
            decision: None,
            outcome: EnvironmentOutcome::NotEvaluated,
            schedule: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub app: String,
    pub latest_version: String,
    pub state: RunState,
    pub environments: Vec<EnvironmentReport>,
    /// Environment that halted the run, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip)]
    error: Option<EnvUpError>,
}

impl RunReport {
    fn new(app: &str, latest_version: &str) -> Self {
        let now = Utc::now();
        Self {
            app: app.to_string(),
            latest_version: latest_version.to_string(),
            state: RunState::Completed,
            environments: Vec::new(),
            halted_at: None,
            message: None,
            started_at: now,
            finished_at: now,
            error: None,
        }
    }

    pub fn error(&self) -> Option<&EnvUpError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<EnvUpError> {
        self.error.take()
    }

    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    pub fn upgraded(&self) -> impl Iterator<Item = &str> {
        self.environments
            .iter()
            .filter(|e| e.outcome == EnvironmentOutcome::Upgraded)
            .map(|e| e.name.as_str())
    }

    /// Record the error that ended the run. `index` is the environment being
    /// processed, if any.
    fn halt(&mut self, index: Option<usize>, error: EnvUpError) -> RunState {
        let state = if error.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Failed
        };
        if let Some(env) = index.and_then(|i| self.environments.get_mut(i)) {
            env.outcome = match &error {
                EnvUpError::Cancelled { .. } => EnvironmentOutcome::Cancelled,
                EnvUpError::Blocked { .. } => EnvironmentOutcome::Blocked,
                _ => EnvironmentOutcome::Failed,
            };
            self.halted_at = Some(env.name.clone());
        }
        self.message = Some(error.to_string());
        self.error = Some(error);
        state
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

enum RunPhase {
    Resolve,
    Evaluate(usize),
    Finished(RunState),
}

pub struct Orchestrator {
    directory: Arc<dyn EnvironmentDirectory>,
    status: Arc<dyn EnvironmentStatusReader>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    guard: CompatibilityGuard,
    scheduler: UpgradeScheduler,
    latest_version: String,
    invalid_versions: InvalidVersionPolicy,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<dyn EnvironmentDirectory>,
        status: Arc<dyn EnvironmentStatusReader>,
        invoker: Arc<dyn UpgradeInvoker>,
        settings: UpgradeSettings,
    ) -> Self {
        let scheduler = UpgradeScheduler::new(status.clone(), invoker, settings.poll);
        Self {
            directory,
            status,
            diagnostics: Arc::new(TracingDiagnostics),
            guard: CompatibilityGuard::new(),
            scheduler,
            latest_version: settings.latest_version,
            invalid_versions: settings.invalid_versions,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Upgrade the requested environments, returning the first failure as an
    /// error.
    pub async fn run_upgrade(
        &self,
        request: &UpgradeRequest,
        cancel: &Cancellation,
    ) -> Result<RunReport> {
        self.execute(request, cancel).await.into_result()
    }

    /// [`run_upgrade`](Self::run_upgrade) from raw `--name` / `--all` inputs.
    /// Conflicting inputs fail before any read.
    pub async fn run_upgrade_from_flags(
        &self,
        app: &str,
        name: Option<String>,
        all: bool,
        cancel: &Cancellation,
    ) -> Result<RunReport> {
        let request = UpgradeRequest::new(app, Target::from_flags(name, all)?);
        self.run_upgrade(&request, cancel).await
    }

    /// Drive one run to a terminal state. Failures are recorded in the report.
    pub async fn execute(&self, request: &UpgradeRequest, cancel: &Cancellation) -> RunReport {
        let mut report = RunReport::new(&request.app, &self.latest_version);
        let mut targets: Vec<EnvironmentRecord> = Vec::new();
        let mut phase = RunPhase::Resolve;

        loop {
            phase = match phase {
                RunPhase::Resolve => match self.resolve(request).await {
                    Ok(envs) => {
                        tracing::info!(
                            app = %request.app,
                            count = envs.len(),
                            latest = %self.latest_version,
                            "resolved environments to upgrade"
                        );
                        report.environments =
                            envs.iter().map(|e| EnvironmentReport::pending(&e.name)).collect();
                        targets = envs;
                        RunPhase::Evaluate(0)
                    }
                    Err(e) => RunPhase::Finished(report.halt(None, e)),
                },
                RunPhase::Evaluate(i) if i >= targets.len() => {
                    RunPhase::Finished(RunState::Completed)
                }
                RunPhase::Evaluate(i) => {
                    if cancel.is_cancelled() {
                        let e = EnvUpError::Cancelled {
                            app: request.app.clone(),
                            env: None,
                        };
                        RunPhase::Finished(report.halt(None, e))
                    } else {
                        match self
                            .evaluate(&request.app, &targets[i], &mut report.environments[i], cancel)
                            .await
                        {
                            Ok(()) => RunPhase::Evaluate(i + 1),
                            Err(e) => RunPhase::Finished(report.halt(Some(i), e)),
                        }
                    }
                }
                RunPhase::Finished(state) => {
                    report.state = state;
                    report.finished_at = Utc::now();
                    break;
                }
            };
        }

        match report.state {
            RunState::Completed => tracing::info!(
                app = %report.app,
                upgraded = report.upgraded().count(),
                "upgrade run completed"
            ),
            RunState::Failed | RunState::Cancelled => tracing::warn!(
                app = %report.app,
                state = ?report.state,
                halted_at = report.halted_at.as_deref().unwrap_or("-"),
                "upgrade run stopped"
            ),
        }
        report
    }

    async fn resolve(&self, request: &UpgradeRequest) -> Result<Vec<EnvironmentRecord>> {
        request.validate()?;
        let app = &request.app;
        let mut envs = match &request.target {
            Target::Single(name) => {
                let record = self
                    .directory
                    .get_environment(app, name)
                    .await
                    .map_err(|source| EnvUpError::Read {
                        stage: ReadStage::GetEnvironment,
                        app: app.clone(),
                        env: Some(name.clone()),
                        source,
                    })?
                    .ok_or_else(|| EnvUpError::EnvironmentNotFound {
                        app: app.clone(),
                        env: name.clone(),
                    })?;
                vec![record]
            }
            Target::All => self
                .directory
                .list_environments(app)
                .await
                .map_err(|source| EnvUpError::Read {
                    stage: ReadStage::ListEnvironments,
                    app: app.clone(),
                    env: None,
                    source,
                })?,
        };
        for env in &mut envs {
            if env.app.is_empty() {
                env.app = app.clone();
            }
        }
        Ok(envs)
    }

    async fn evaluate(
        &self,
        app: &str,
        record: &EnvironmentRecord,
        report: &mut EnvironmentReport,
        cancel: &Cancellation,
    ) -> Result<()> {
        let env = record.name.as_str();
        let latest = self.latest_version.as_str();

        let deployed = self
            .status
            .current_version(app, env)
            .await
            .map_err(|source| EnvUpError::Read {
                stage: ReadStage::TemplateVersion,
                app: app.to_string(),
                env: Some(env.to_string()),
                source,
            })?;
        report.deployed_version = Some(deployed.clone());

        let ordering = version::compare_with_policy(&deployed, latest, self.invalid_versions)
            .map_err(|e| {
                let version::VersionError::InvalidFormat { version, reason } = e;
                EnvUpError::InvalidVersionFormat {
                    app: app.to_string(),
                    env: env.to_string(),
                    version,
                    reason,
                }
            })?;

        match ordering {
            VersionOrdering::Equal => {
                report.decision = Some(UpgradeDecision::SkipUpToDate);
                report.outcome = EnvironmentOutcome::Skipped;
                self.diagnostics.advise(
                    app,
                    env,
                    &format!("Environment {env} is already on the latest version {latest}, skip upgrade."),
                );
                Ok(())
            }
            VersionOrdering::Newer => {
                // Someone upgraded with a newer release of this tool.
                report.decision = Some(UpgradeDecision::SkipAheadOfKnown);
                report.outcome = EnvironmentOutcome::Skipped;
                self.diagnostics.advise(
                    app,
                    env,
                    &format!(
                        "Skip upgrading environment {env} to version {latest} since it's on version {deployed}. \
                         Are you using the latest version of envup?"
                    ),
                );
                Ok(())
            }
            VersionOrdering::Older => {
                if let GuardVerdict::Blocked { remediation } = self.guard.check(&deployed, record) {
                    report.decision = Some(UpgradeDecision::Blocked {
                        remediation: remediation.clone(),
                    });
                    return Err(EnvUpError::Blocked {
                        app: app.to_string(),
                        env: env.to_string(),
                        remediation,
                    });
                }
                report.decision = Some(UpgradeDecision::Upgrade);
                tracing::debug!(app, env, from = %deployed, to = latest, "environment needs upgrade");

                let schedule = self.scheduler.upgrade(app, env, latest, cancel).await?;
                report.schedule = Some(schedule);
                report.outcome = EnvironmentOutcome::Upgraded;
                Ok(())
            }
        }
    }
}
