//! Deterministic collaborator doubles shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{DiagnosticsSink, EnvironmentDirectory, EnvironmentStatusReader, UpgradeInvoker};
use crate::cancel::CancelHandle;
use crate::error::BackendError;
use crate::types::{EnvironmentRecord, StackStatus};

// ---------------------------------------------------------------------------
// FakeDirectory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDirectory {
    envs: Vec<EnvironmentRecord>,
    fail_list: bool,
    gets: AtomicU32,
    lists: AtomicU32,
}

impl FakeDirectory {
    pub fn new(envs: Vec<EnvironmentRecord>) -> Self {
        Self {
            envs,
            ..Default::default()
        }
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn reads(&self) -> u32 {
        self.gets.load(Ordering::SeqCst) + self.lists.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> u32 {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentDirectory for FakeDirectory {
    async fn get_environment(
        &self,
        app: &str,
        name: &str,
    ) -> Result<Option<EnvironmentRecord>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .envs
            .iter()
            .find(|e| e.app == app && e.name == name)
            .cloned())
    }

    async fn list_environments(&self, app: &str) -> Result<Vec<EnvironmentRecord>, BackendError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err("directory unavailable".into());
        }
        Ok(self.envs.iter().filter(|e| e.app == app).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// FakeStatusReader
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StackState {
    version: String,
    statuses: VecDeque<StackStatus>,
    last: Option<StackStatus>,
    fail_status: bool,
    fail_version: bool,
    status_reads: u32,
    version_reads: u32,
}

/// Stack statuses are served in order; the last one repeats. Environments
/// without scripted statuses are idle.
#[derive(Default)]
pub struct FakeStatusReader {
    stacks: Mutex<HashMap<String, StackState>>,
}

impl FakeStatusReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, env: &str, f: impl FnOnce(&mut StackState)) -> Self {
        {
            let mut stacks = self.stacks.lock().unwrap();
            f(stacks.entry(env.to_string()).or_default());
        }
        self
    }

    pub fn with_env(self, _app: &str, env: &str, version: &str) -> Self {
        let version = version.to_string();
        self.edit(env, |s| s.version = version)
    }

    pub fn with_statuses(self, env: &str, statuses: impl IntoIterator<Item = StackStatus>) -> Self {
        let statuses: VecDeque<_> = statuses.into_iter().collect();
        self.edit(env, |s| s.statuses = statuses)
    }

    pub fn failing_status(self, env: &str) -> Self {
        self.edit(env, |s| s.fail_status = true)
    }

    pub fn failing_version(self, env: &str) -> Self {
        self.edit(env, |s| s.fail_version = true)
    }

    pub fn status_reads(&self, env: &str) -> u32 {
        self.stacks
            .lock()
            .unwrap()
            .get(env)
            .map(|s| s.status_reads)
            .unwrap_or(0)
    }

    pub fn version_reads(&self, env: &str) -> u32 {
        self.stacks
            .lock()
            .unwrap()
            .get(env)
            .map(|s| s.version_reads)
            .unwrap_or(0)
    }

    pub fn total_reads(&self) -> u32 {
        self.stacks
            .lock()
            .unwrap()
            .values()
            .map(|s| s.status_reads + s.version_reads)
            .sum()
    }
}

#[async_trait]
impl EnvironmentStatusReader for FakeStatusReader {
    async fn current_version(&self, _app: &str, env: &str) -> Result<String, BackendError> {
        let mut stacks = self.stacks.lock().unwrap();
        let state = stacks
            .get_mut(env)
            .ok_or_else(|| BackendError::from(format!("no stack for {env}")))?;
        state.version_reads += 1;
        if state.fail_version {
            return Err("describe stack: throttled".into());
        }
        Ok(state.version.clone())
    }

    async fn stack_status(&self, _app: &str, env: &str) -> Result<StackStatus, BackendError> {
        let mut stacks = self.stacks.lock().unwrap();
        let state = stacks
            .get_mut(env)
            .ok_or_else(|| BackendError::from(format!("no stack for {env}")))?;
        state.status_reads += 1;
        if state.fail_status {
            return Err("describe stack: throttled".into());
        }
        let status = match state.statuses.pop_front() {
            Some(status) => status,
            None => state.last.unwrap_or(StackStatus::Idle),
        };
        state.last = Some(status);
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// FakeInvoker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInvoker {
    calls: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    cancel_on_upgrade: Option<CancelHandle>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, env: &str) -> Self {
        self.failing.insert(env.to_string());
        self
    }

    /// Fire `handle` from inside the first upgrade call.
    pub fn cancelling(mut self, handle: CancelHandle) -> Self {
        self.cancel_on_upgrade = Some(handle);
        self
    }

    /// `(env, target_version)` per invocation, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upgraded_envs(&self) -> Vec<String> {
        self.calls().into_iter().map(|(env, _)| env).collect()
    }
}

#[async_trait]
impl UpgradeInvoker for FakeInvoker {
    async fn upgrade(&self, _app: &str, env: &str, target_version: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((env.to_string(), target_version.to_string()));
        if let Some(handle) = &self.cancel_on_upgrade {
            handle.cancel();
        }
        if self.failing.contains(env) {
            return Err(format!("deploy stack {env}: template validation failed").into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingDiagnostics
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingDiagnostics {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingDiagnostics {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn advise(&self, _app: &str, env: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((env.to_string(), message.to_string()));
    }
}
