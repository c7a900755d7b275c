//! Issues an upgrade once an environment's stack is free to take it.
//!
//! The scheduler reads the stack status and, while the stack is busy, waits
//! with capped exponential backoff before reading again. It issues at most
//! one upgrade invocation per call, never against a failed stack, and gives
//! up on timeout or cancellation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::backend::{EnvironmentStatusReader, UpgradeInvoker};
use crate::cancel::Cancellation;
use crate::error::{EnvUpError, ReadStage, Result};
use crate::types::StackStatus;

// ---------------------------------------------------------------------------
// PollSettings
// ---------------------------------------------------------------------------

/// Backoff parameters for waiting on a busy stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Upper bound on the total time spent waiting.
    pub timeout: Duration,
}

impl PollSettings {
    /// Wait before re-reading after the `attempt`-th busy read (0-indexed).
    pub fn interval(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_interval
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleReport
// ---------------------------------------------------------------------------

/// What it took to get the upgrade issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleReport {
    /// Number of status reads, including the final idle one.
    pub polls: u32,
    #[serde(rename = "waited_ms", serialize_with = "serialize_millis")]
    pub waited: Duration,
}

fn serialize_millis<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// UpgradeScheduler
// ---------------------------------------------------------------------------

pub struct UpgradeScheduler {
    status: Arc<dyn EnvironmentStatusReader>,
    invoker: Arc<dyn UpgradeInvoker>,
    settings: PollSettings,
}

impl UpgradeScheduler {
    pub fn new(
        status: Arc<dyn EnvironmentStatusReader>,
        invoker: Arc<dyn UpgradeInvoker>,
        settings: PollSettings,
    ) -> Self {
        Self {
            status,
            invoker,
            settings,
        }
    }

    /// Wait for the stack of `app`/`env` to be idle, then upgrade it to
    /// `target_version`.
    pub async fn upgrade(
        &self,
        app: &str,
        env: &str,
        target_version: &str,
        cancel: &Cancellation,
    ) -> Result<ScheduleReport> {
        let mut cancel = cancel.clone();
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(app, env));
            }

            let status = self
                .status
                .stack_status(app, env)
                .await
                .map_err(|source| EnvUpError::Read {
                    stage: ReadStage::StackStatus,
                    app: app.to_string(),
                    env: Some(env.to_string()),
                    source,
                })?;
            polls += 1;

            match status {
                StackStatus::Idle => {
                    tracing::info!(app, env, target_version, polls, "upgrading environment stack");
                    self.invoker
                        .upgrade(app, env, target_version)
                        .await
                        .map_err(|source| EnvUpError::UpgradeInvocation {
                            app: app.to_string(),
                            env: env.to_string(),
                            source,
                        })?;
                    return Ok(ScheduleReport {
                        polls,
                        waited: started.elapsed(),
                    });
                }
                StackStatus::Failed => {
                    return Err(EnvUpError::StackInFailedState {
                        app: app.to_string(),
                        env: env.to_string(),
                    });
                }
                StackStatus::Busy | StackStatus::Unknown => {
                    let waited = started.elapsed();
                    if waited >= self.settings.timeout {
                        return Err(EnvUpError::UpgradeTimedOut {
                            app: app.to_string(),
                            env: env.to_string(),
                            waited,
                        });
                    }
                    // The last sleep is cut short so the final read lands on the deadline.
                    let delay = self
                        .settings
                        .interval(polls - 1)
                        .min(self.settings.timeout - waited);
                    tracing::info!(
                        app,
                        env,
                        %status,
                        attempt = polls,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "stack is not idle, waiting before retrying"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return Err(cancelled(app, env)),
                    }
                }
            }
        }
    }
}

fn cancelled(app: &str, env: &str) -> EnvUpError {
    EnvUpError::Cancelled {
        app: app.to_string(),
        env: Some(env.to_string()),
    }
}
