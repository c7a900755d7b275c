use crate::error::{EnvUpError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Application / EnvironmentRecord
// ---------------------------------------------------------------------------

/// A named collection of environments. Read-only to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub environments: Vec<EnvironmentRecord>,
}

/// An environment registered under an application.
///
/// Deployed template version and stack status are not kept here: they
/// belong to the live stack and are read fresh through
/// [`EnvironmentStatusReader`](crate::backend::EnvironmentStatusReader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    #[serde(default)]
    pub app: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub prod: bool,
    /// Network settings the environment was created with, if customized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkCustomization>,
    /// Whether `network` is durably stored in the parameter store.
    /// `None` means the record predates the flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_stored: Option<bool>,
}

impl EnvironmentRecord {
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
            region: None,
            account_id: None,
            prod: false,
            network: None,
            customization_stored: None,
        }
    }

    pub fn is_network_customized(&self) -> bool {
        self.network.as_ref().is_some_and(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_vpc: Option<ImportVpc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjust_vpc: Option<AdjustVpc>,
}

impl NetworkCustomization {
    pub fn is_empty(&self) -> bool {
        self.import_vpc.is_none() && self.adjust_vpc.is_none()
    }
}

/// An existing VPC the environment was deployed into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportVpc {
    pub id: String,
    #[serde(default)]
    pub public_subnet_ids: Vec<String>,
    #[serde(default)]
    pub private_subnet_ids: Vec<String>,
}

/// Overrides of the default VPC layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustVpc {
    pub cidr: String,
    #[serde(default)]
    pub public_subnet_cidrs: Vec<String>,
    #[serde(default)]
    pub private_subnet_cidrs: Vec<String>,
}

// ---------------------------------------------------------------------------
// StackStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Idle,
    Busy,
    Failed,
    Unknown,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Idle => "idle",
            StackStatus::Busy => "busy",
            StackStatus::Failed => "failed",
            StackStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UpgradeDecision
// ---------------------------------------------------------------------------

/// Per-environment verdict of one run. Recomputed every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeDecision {
    Upgrade,
    SkipUpToDate,
    /// Deployed version is newer than the latest this tool knows about.
    SkipAheadOfKnown,
    Blocked { remediation: String },
}

impl UpgradeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeDecision::Upgrade => "upgrade",
            UpgradeDecision::SkipUpToDate => "skip_up_to_date",
            UpgradeDecision::SkipAheadOfKnown => "skip_ahead_of_known",
            UpgradeDecision::Blocked { .. } => "blocked",
        }
    }
}

// ---------------------------------------------------------------------------
// Target / UpgradeRequest
// ---------------------------------------------------------------------------

/// Which environments of the application a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Single(String),
    All,
}

impl Target {
    /// Build a target from the raw `--name` / `--all` inputs. Exactly one of
    /// them must be set.
    pub fn from_flags(name: Option<String>, all: bool) -> Result<Self> {
        let name = name.filter(|n| !n.is_empty());
        match (name, all) {
            (Some(_), true) => Err(EnvUpError::Validation(
                "cannot specify both --name and --all".into(),
            )),
            (Some(name), false) => Ok(Target::Single(name)),
            (None, true) => Ok(Target::All),
            (None, false) => Err(EnvUpError::Validation(
                "an environment name or --all is required".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub app: String,
    pub target: Target,
}

impl UpgradeRequest {
    pub fn new(app: impl Into<String>, target: Target) -> Self {
        Self {
            app: app.into(),
            target,
        }
    }

    /// Check that the request names an application and, for a single
    /// target, an environment. Performs no reads.
    pub fn validate(&self) -> Result<()> {
        if self.app.trim().is_empty() {
            return Err(EnvUpError::Validation("an application name is required".into()));
        }
        if let Target::Single(name) = &self.target {
            if name.trim().is_empty() {
                return Err(EnvUpError::Validation(
                    "an environment name is required".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_rejects_name_with_all() {
        let err = Target::from_flags(Some("test".into()), true).unwrap_err();
        assert!(matches!(err, EnvUpError::Validation(_)));
    }

    #[test]
    fn target_requires_one_of_name_or_all() {
        assert!(matches!(
            Target::from_flags(None, false),
            Err(EnvUpError::Validation(_))
        ));
        assert!(matches!(
            Target::from_flags(Some(String::new()), false),
            Err(EnvUpError::Validation(_))
        ));
        assert_eq!(Target::from_flags(None, true).unwrap(), Target::All);
        assert_eq!(
            Target::from_flags(Some("prod".into()), false).unwrap(),
            Target::Single("prod".into())
        );
    }

    #[test]
    fn empty_network_block_is_not_a_customization() {
        let mut env = EnvironmentRecord::new("shop", "test");
        assert!(!env.is_network_customized());
        env.network = Some(NetworkCustomization::default());
        assert!(!env.is_network_customized());
        env.network = Some(NetworkCustomization {
            adjust_vpc: Some(AdjustVpc {
                cidr: "10.1.0.0/16".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(env.is_network_customized());
    }

    #[test]
    fn decision_serializes_with_type_tag() {
        let json = serde_json::to_string(&UpgradeDecision::Blocked {
            remediation: "re-run env init".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"blocked","remediation":"re-run env init"}"#);
    }
}
