//! File-backed collaborators rooted at a project's `.envup/` directory.
//!
//! ```text
//! .envup/
//!   config.yaml
//!   apps/<app>.yaml            Application { name, environments }
//!   stacks/<app>/<env>.yaml    StackSnapshot { version, status }
//! ```
//!
//! Stack snapshots are written by whatever deploys the stacks (or by
//! [`LocalInvoker`]) and are re-read on every call.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{EnvironmentDirectory, EnvironmentStatusReader, UpgradeInvoker};
use crate::config::InvokerConfig;
use crate::error::{BackendError, EnvUpError, Result};
use crate::paths;
use crate::types::{Application, EnvironmentRecord, StackStatus};
use crate::version::LEGACY_TEMPLATE_VERSION;

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Blocking read, for callers outside the runtime.
    pub fn load_application(&self, app: &str) -> Result<Application> {
        paths::validate_name(app)?;
        let path = paths::app_manifest(&self.root, app);
        match std::fs::read_to_string(&path) {
            Ok(data) => parse_application(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EnvUpError::ApplicationNotFound(app.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_application(&self, app: &str) -> Result<Application> {
        paths::validate_name(app)?;
        let path = paths::app_manifest(&self.root, app);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => parse_application(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EnvUpError::ApplicationNotFound(app.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_application(&self, application: &Application) -> Result<()> {
        paths::validate_name(&application.name)?;
        let path = paths::app_manifest(&self.root, &application.name);
        let data = serde_yaml::to_string(application)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Application names, sorted.
    pub fn list_applications(&self) -> Result<Vec<String>> {
        let dir = paths::apps_dir(&self.root);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn parse_application(data: &str) -> Result<Application> {
    let mut application: Application = serde_yaml::from_str(data)?;
    for env in &mut application.environments {
        env.app = application.name.clone();
    }
    Ok(application)
}

#[async_trait]
impl EnvironmentDirectory for FileStore {
    async fn get_environment(
        &self,
        app: &str,
        name: &str,
    ) -> std::result::Result<Option<EnvironmentRecord>, BackendError> {
        let application = self.read_application(app).await?;
        Ok(application
            .environments
            .into_iter()
            .find(|e| e.name == name))
    }

    async fn list_environments(
        &self,
        app: &str,
    ) -> std::result::Result<Vec<EnvironmentRecord>, BackendError> {
        Ok(self.read_application(app).await?.environments)
    }
}

// ---------------------------------------------------------------------------
// StackSnapshot / LocalStackReader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSnapshot {
    #[serde(default = "legacy_version")]
    pub version: String,
    #[serde(default = "unknown_status")]
    pub status: StackStatus,
}

fn legacy_version() -> String {
    LEGACY_TEMPLATE_VERSION.to_string()
}

fn unknown_status() -> StackStatus {
    StackStatus::Unknown
}

impl StackSnapshot {
    pub fn new(version: impl Into<String>, status: StackStatus) -> Self {
        Self {
            version: version.into(),
            status,
        }
    }
}

/// Reads `.envup/stacks/<app>/<env>.yaml`. A missing snapshot reads as an
/// idle legacy stack: nothing is deploying it, and nothing will create the
/// file until it is upgraded.
#[derive(Debug, Clone)]
pub struct LocalStackReader {
    root: PathBuf,
}

impl LocalStackReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn snapshot(&self, app: &str, env: &str) -> Result<StackSnapshot> {
        paths::validate_name(app)?;
        paths::validate_name(env)?;
        let path = paths::stack_snapshot(&self.root, app, env);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(serde_yaml::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(StackSnapshot::new(LEGACY_TEMPLATE_VERSION, StackStatus::Idle))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_snapshot(&self, app: &str, env: &str, snapshot: &StackSnapshot) -> Result<()> {
        paths::validate_name(app)?;
        paths::validate_name(env)?;
        let path = paths::stack_snapshot(&self.root, app, env);
        let data = serde_yaml::to_string(snapshot)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

#[async_trait]
impl EnvironmentStatusReader for LocalStackReader {
    async fn current_version(&self, app: &str, env: &str) -> std::result::Result<String, BackendError> {
        Ok(self.snapshot(app, env).await?.version)
    }

    async fn stack_status(
        &self,
        app: &str,
        env: &str,
    ) -> std::result::Result<StackStatus, BackendError> {
        Ok(self.snapshot(app, env).await?.status)
    }
}

// ---------------------------------------------------------------------------
// Invokers
// ---------------------------------------------------------------------------

/// Records the upgrade by stamping the target version into the stack
/// snapshot.
#[derive(Debug, Clone)]
pub struct LocalInvoker {
    stacks: LocalStackReader,
}

impl LocalInvoker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            stacks: LocalStackReader::new(root),
        }
    }
}

#[async_trait]
impl UpgradeInvoker for LocalInvoker {
    async fn upgrade(
        &self,
        app: &str,
        env: &str,
        target_version: &str,
    ) -> std::result::Result<(), BackendError> {
        let snapshot = StackSnapshot::new(target_version, StackStatus::Idle);
        self.stacks.write_snapshot(app, env, &snapshot)?;
        tracing::debug!(app, env, target_version, "stamped local stack snapshot");
        Ok(())
    }
}

/// Runs an external deploy program once per upgrade.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl CommandInvoker {
    pub fn new(program: impl Into<String>, args: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl UpgradeInvoker for CommandInvoker {
    async fn upgrade(
        &self,
        app: &str,
        env: &str,
        target_version: &str,
    ) -> std::result::Result<(), BackendError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .env("ENVUP_APP", app)
            .env("ENVUP_ENV", env)
            .env("ENVUP_TARGET_VERSION", target_version)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("failed to run '{}': {e}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )
            .into());
        }
        Ok(())
    }
}

/// Build the invoker selected by `config`.
pub fn invoker_for(config: &InvokerConfig, root: &Path) -> Arc<dyn UpgradeInvoker> {
    match config {
        InvokerConfig::Local => Arc::new(LocalInvoker::new(root)),
        InvokerConfig::Command { program, args } => {
            Arc::new(CommandInvoker::new(program.clone(), args.clone(), root))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".envup/apps")).unwrap();
        std::fs::write(
            dir.path().join(".envup/apps/shop.yaml"),
            r#"
name: shop
environments:
  - name: test
    region: us-west-2
  - name: prod
    prod: true
    network:
      import_vpc:
        id: vpc-1
        public_subnet_ids: [subnet-a]
    customization_stored: false
"#,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn file_store_lists_and_gets_environments() {
        let dir = project();
        let store = FileStore::new(dir.path());

        let envs = store.list_environments("shop").await.unwrap();
        let names: Vec<_> = envs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["test", "prod"]);
        assert!(envs.iter().all(|e| e.app == "shop"));

        let prod = store.get_environment("shop", "prod").await.unwrap().unwrap();
        assert!(prod.is_network_customized());
        assert_eq!(prod.customization_stored, Some(false));
        assert!(store.get_environment("shop", "dev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_reports_unknown_application() {
        let dir = project();
        let store = FileStore::new(dir.path());
        let err = store.list_environments("blog").await.unwrap_err();
        assert!(err.to_string().contains("application not found: blog"));
        assert_eq!(store.list_applications().unwrap(), vec!["shop".to_string()]);
    }

    #[test]
    fn save_application_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .save_application(&Application {
                name: "blog".into(),
                environments: vec![EnvironmentRecord::new("blog", "dev")],
            })
            .unwrap();
        let loaded = store.load_application("blog").unwrap();
        assert_eq!(loaded.environments[0].name, "dev");
        assert!(store.save_application(&Application {
            name: "../escape".into(),
            environments: vec![],
        })
        .is_err());
    }

    #[tokio::test]
    async fn missing_snapshot_reads_as_idle_legacy() {
        let dir = project();
        let reader = LocalStackReader::new(dir.path());
        assert_eq!(
            reader.current_version("shop", "test").await.unwrap(),
            LEGACY_TEMPLATE_VERSION
        );
        assert_eq!(
            reader.stack_status("shop", "test").await.unwrap(),
            StackStatus::Idle
        );
    }

    #[tokio::test]
    async fn snapshot_without_status_reads_as_unknown() {
        let dir = project();
        std::fs::create_dir_all(dir.path().join(".envup/stacks/shop")).unwrap();
        std::fs::write(dir.path().join(".envup/stacks/shop/test.yaml"), "version: v0.9.0\n").unwrap();
        let reader = LocalStackReader::new(dir.path());
        assert_eq!(
            reader.stack_status("shop", "test").await.unwrap(),
            StackStatus::Unknown
        );
    }

    #[tokio::test]
    async fn environment_without_snapshot_is_upgraded_promptly() {
        use crate::cancel::Cancellation;
        use crate::scheduler::{PollSettings, UpgradeScheduler};
        use std::time::Duration;

        let dir = project();
        let scheduler = UpgradeScheduler::new(
            Arc::new(LocalStackReader::new(dir.path())),
            Arc::new(LocalInvoker::new(dir.path())),
            PollSettings {
                timeout: Duration::from_secs(60),
                ..PollSettings::default()
            },
        );

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.upgrade("shop", "test", "v1.0.0", &Cancellation::never()),
        )
        .await
        .expect("missing snapshot must not be waited on")
        .unwrap();

        assert_eq!(report.polls, 1);
        let snapshot = LocalStackReader::new(dir.path())
            .snapshot("shop", "test")
            .await
            .unwrap();
        assert_eq!(snapshot, StackSnapshot::new("v1.0.0", StackStatus::Idle));
    }

    #[tokio::test]
    async fn snapshot_is_reread_on_every_call() {
        let dir = project();
        let reader = LocalStackReader::new(dir.path());
        reader
            .write_snapshot("shop", "test", &StackSnapshot::new("v0.9.0", StackStatus::Busy))
            .unwrap();
        assert_eq!(reader.stack_status("shop", "test").await.unwrap(), StackStatus::Busy);

        std::fs::write(
            dir.path().join(".envup/stacks/shop/test.yaml"),
            "version: v0.9.0\nstatus: idle\n",
        )
        .unwrap();
        assert_eq!(reader.stack_status("shop", "test").await.unwrap(), StackStatus::Idle);
    }

    #[tokio::test]
    async fn local_invoker_stamps_target_version() {
        let dir = project();
        let invoker = LocalInvoker::new(dir.path());
        invoker.upgrade("shop", "test", "v1.0.0").await.unwrap();

        let snapshot = LocalStackReader::new(dir.path())
            .snapshot("shop", "test")
            .await
            .unwrap();
        assert_eq!(snapshot, StackSnapshot::new("v1.0.0", StackStatus::Idle));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_invoker_passes_context_and_reports_failure() {
        let dir = project();
        let ok = CommandInvoker::new(
            "sh",
            vec![
                "-c".into(),
                "echo \"$ENVUP_APP/$ENVUP_ENV@$ENVUP_TARGET_VERSION\" > out.txt".into(),
            ],
            dir.path(),
        );
        ok.upgrade("shop", "test", "v1.0.0").await.unwrap();
        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "shop/test@v1.0.0");

        let failing = CommandInvoker::new(
            "sh",
            vec!["-c".into(), "echo boom >&2; exit 3".into()],
            dir.path(),
        );
        let err = failing.upgrade("shop", "test", "v1.0.0").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
