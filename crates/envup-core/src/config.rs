use crate::error::{EnvUpError, Result};
use crate::paths;
use crate::scheduler::PollSettings;
use crate::version::{self, InvalidVersionPolicy, LATEST_TEMPLATE_VERSION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_initial_interval_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            multiplier: self.multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// InvokerConfig
// ---------------------------------------------------------------------------

/// How upgrades are carried out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvokerConfig {
    /// Record the new version in the local stack snapshot.
    #[default]
    Local,
    /// Run an external deploy program. It receives `ENVUP_APP`, `ENVUP_ENV`
    /// and `ENVUP_TARGET_VERSION` in its environment.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_latest_version")]
    pub latest_template_version: String,
    #[serde(default)]
    pub invalid_versions: InvalidVersionPolicy,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub invoker: InvokerConfig,
}

fn default_latest_version() -> String {
    LATEST_TEMPLATE_VERSION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latest_template_version: default_latest_version(),
            invalid_versions: InvalidVersionPolicy::default(),
            poll: PollConfig::default(),
            invoker: InvokerConfig::default(),
        }
    }
}

impl Config {
    /// Load `.envup/config.yaml`. A project without the file uses defaults;
    /// a directory without `.envup/` is not initialized.
    pub fn load(root: &Path) -> Result<Self> {
        if !paths::envup_dir(root).is_dir() {
            return Err(EnvUpError::NotInitialized);
        }
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = version::parse(&self.latest_template_version) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("latest_template_version: {e}"),
            });
        }

        let poll = &self.poll;
        if !poll.multiplier.is_finite() || poll.multiplier < 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("poll.multiplier must be >= 1.0, got {}", poll.multiplier),
            });
        }
        if poll.initial_interval_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "poll.initial_interval_ms is 0; busy stacks will be polled without pause"
                    .into(),
            });
        }
        if poll.initial_interval_ms > poll.max_interval_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "poll.initial_interval_ms ({}) exceeds poll.max_interval_ms ({})",
                    poll.initial_interval_ms, poll.max_interval_ms
                ),
            });
        }
        if poll.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "poll.timeout_secs is 0; busy stacks will time out immediately".into(),
            });
        }

        if let InvokerConfig::Command { program, .. } = &self.invoker {
            if program.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "invoker.program is empty".into(),
                });
            }
        }

        warnings
    }

    /// Fail on the first error-level finding.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(EnvUpError::Config(w.message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_envup_dir_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(EnvUpError::NotInitialized)
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".envup")).unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.latest_template_version, LATEST_TEMPLATE_VERSION);
        assert_eq!(cfg.invalid_versions, InvalidVersionPolicy::Reject);
        assert_eq!(cfg.invoker, InvokerConfig::Local);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".envup")).unwrap();
        std::fs::write(
            dir.path().join(".envup/config.yaml"),
            "latest_template_version: v1.2.0\npoll:\n  initial_interval_ms: 10\ninvoker:\n  type: command\n  program: ./deploy.sh\n",
        )
        .unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.latest_template_version, "v1.2.0");
        assert_eq!(cfg.poll.initial_interval_ms, 10);
        assert_eq!(cfg.poll.max_interval_ms, 30_000);
        assert_eq!(
            cfg.invoker,
            InvokerConfig::Command {
                program: "./deploy.sh".into(),
                args: vec![]
            }
        );
        let settings = cfg.poll.settings();
        assert_eq!(settings.initial_interval, Duration::from_millis(10));
    }

    #[test]
    fn save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.invalid_versions = InvalidVersionPolicy::Upgrade;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.invalid_versions, InvalidVersionPolicy::Upgrade);
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.latest_template_version = "latest".into();
        cfg.poll.multiplier = 0.5;
        cfg.poll.initial_interval_ms = 60_000;
        cfg.invoker = InvokerConfig::Command {
            program: " ".into(),
            args: vec![],
        };

        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("exceeds poll.max_interval_ms")));
        assert!(matches!(cfg.ensure_valid(), Err(EnvUpError::Config(_))));
    }
}
