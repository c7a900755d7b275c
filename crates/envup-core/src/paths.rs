use crate::error::{EnvUpError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ENVUP_DIR: &str = ".envup";
pub const APPS_DIR: &str = ".envup/apps";
pub const STACKS_DIR: &str = ".envup/stacks";

pub const CONFIG_FILE: &str = ".envup/config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn envup_dir(root: &Path) -> PathBuf {
    root.join(ENVUP_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn apps_dir(root: &Path) -> PathBuf {
    root.join(APPS_DIR)
}

pub fn app_manifest(root: &Path, app: &str) -> PathBuf {
    apps_dir(root).join(format!("{app}.yaml"))
}

pub fn stack_snapshot(root: &Path, app: &str, env: &str) -> PathBuf {
    root.join(STACKS_DIR).join(app).join(format!("{env}.yaml"))
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

/// Application and environment names double as file names, so they are
/// restricted to lowercase alphanumerics and hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(EnvUpError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
