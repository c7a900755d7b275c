//! Template version comparison.
//!
//! Template versions are semantic versions tagged with an optional leading
//! `v` (`v1.2.0`, `v1.3.0-rc.1`). Precedence follows semver: major, minor,
//! patch, then pre-release, with build metadata ignored.

use std::cmp::Ordering;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel reported by stacks deployed before templates carried a version.
pub const LEGACY_TEMPLATE_VERSION: &str = "v0.0.0";

/// Latest environment template version this build knows how to deploy.
pub const LATEST_TEMPLATE_VERSION: &str = "v1.0.0";

/// Position of a deployed version relative to the latest known version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrdering {
    Older,
    Equal,
    Newer,
}

impl From<Ordering> for VersionOrdering {
    fn from(ord: Ordering) -> Self {
        match ord {
            Ordering::Less => VersionOrdering::Older,
            Ordering::Equal => VersionOrdering::Equal,
            Ordering::Greater => VersionOrdering::Newer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version '{version}': {reason}")]
    InvalidFormat { version: String, reason: String },
}

/// What to do with a deployed version that is neither valid semver nor the
/// legacy sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidVersionPolicy {
    /// Fail the run with `InvalidVersionFormat`.
    #[default]
    Reject,
    /// Treat the environment as older than the latest version.
    Upgrade,
}

pub fn parse(version: &str) -> Result<Version, VersionError> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|e| VersionError::InvalidFormat {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// Compare `deployed` against `latest`.
pub fn compare(deployed: &str, latest: &str) -> Result<VersionOrdering, VersionError> {
    let deployed = parse(deployed)?;
    let latest = parse(latest)?;
    Ok(deployed.cmp_precedence(&latest).into())
}

/// True for stacks that predate versioned templates: a blank version or any
/// spelling of the `0.0.0` release (`v0.0.0`, `0.0.0`, `v0.0.0+meta`).
pub fn is_legacy(version: &str) -> bool {
    if version.trim().is_empty() {
        return true;
    }
    parse(version).is_ok_and(|v| v.major == 0 && v.minor == 0 && v.patch == 0 && v.pre.is_empty())
}

/// Compare under an explicit policy. Legacy versions are always older; other
/// unparseable versions follow `policy`. An invalid `latest` is always an
/// error.
pub fn compare_with_policy(
    deployed: &str,
    latest: &str,
    policy: InvalidVersionPolicy,
) -> Result<VersionOrdering, VersionError> {
    parse(latest)?;
    if is_legacy(deployed) {
        return Ok(VersionOrdering::Older);
    }
    match compare(deployed, latest) {
        Ok(ord) => Ok(ord),
        Err(e) => match policy {
            InvalidVersionPolicy::Reject => Err(e),
            InvalidVersionPolicy::Upgrade => Ok(VersionOrdering::Older),
        },
    }
}
