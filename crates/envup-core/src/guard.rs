//! Compatibility guard for legacy environments with customized networking.
//!
//! Legacy environment templates accepted VPC customization only as inline
//! deploy-time parameters. Unless those parameters were later stored in the
//! parameter store, regenerating the template would silently fall back to
//! the default network layout. The guard refuses such upgrades and says what
//! the operator must re-supply.

use crate::types::{EnvironmentRecord, NetworkCustomization};
use crate::version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Pass,
    Blocked { remediation: String },
}

impl GuardVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GuardVerdict::Blocked { .. })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CompatibilityGuard;

impl CompatibilityGuard {
    pub fn new() -> Self {
        Self
    }

    /// Blocks iff the deployed version is legacy, the environment carries a
    /// network customization, and that customization is not known to be
    /// stored. Never mutates or prompts.
    pub fn check(&self, deployed_version: &str, env: &EnvironmentRecord) -> GuardVerdict {
        if !version::is_legacy(deployed_version) {
            return GuardVerdict::Pass;
        }
        let Some(network) = env.network.as_ref().filter(|n| !n.is_empty()) else {
            return GuardVerdict::Pass;
        };
        if env.customization_stored == Some(true) {
            return GuardVerdict::Pass;
        }
        GuardVerdict::Blocked {
            remediation: remediation(&env.app, &env.name, network),
        }
    }
}

fn remediation(app: &str, env: &str, network: &NetworkCustomization) -> String {
    let mut inputs = Vec::new();
    if let Some(import) = &network.import_vpc {
        let mut item = format!("the imported VPC ID ({})", import.id);
        if !import.public_subnet_ids.is_empty() || !import.private_subnet_ids.is_empty() {
            item.push_str(" with its public and private subnet IDs");
        }
        inputs.push(item);
    }
    if let Some(adjust) = &network.adjust_vpc {
        let mut item = format!("the VPC CIDR ({})", adjust.cidr);
        if !adjust.public_subnet_cidrs.is_empty() || !adjust.private_subnet_cidrs.is_empty() {
            item.push_str(" with its public and private subnet CIDRs");
        }
        inputs.push(item);
    }
    format!(
        "environment {env} was deployed with a legacy template and a customized network \
         that is not stored in the parameter store; upgrading would discard it. \
         Re-supply {} by re-running `env init --name {env} --app {app}` with the \
         same network flags, then retry the upgrade",
        inputs.join(" and ")
    )
}
