//! Filling in missing upgrade inputs before a run starts.

use crate::error::{EnvUpError, Result};
use crate::types::{Target, UpgradeRequest};

pub const APP_PROMPT: &str = "In which application is your environment?";
pub const ENV_PROMPT: &str = "Which environment do you want to upgrade?";
pub const ENV_HELP: &str = "Upgrades the infrastructure template for your environment\n\
                            to support the latest features.";

/// Interactive source of application and environment names.
pub trait Selector {
    fn choose_application(&self, prompt: &str) -> Result<String>;
    fn choose_environment(&self, prompt: &str, help: &str, app: &str) -> Result<String>;
}

/// Raw inputs as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeInputs {
    pub app: Option<String>,
    pub name: Option<String>,
    pub all: bool,
}

impl UpgradeInputs {
    /// Reject conflicting inputs. Runs before any prompt or read.
    pub fn validate(&self) -> Result<()> {
        if self.all && self.name.as_deref().is_some_and(|n| !n.is_empty()) {
            return Err(EnvUpError::Validation(
                "cannot specify both --name and --all".into(),
            ));
        }
        Ok(())
    }

    /// Prompt for whatever is missing, then build the request.
    pub fn resolve(mut self, selector: &dyn Selector) -> Result<UpgradeRequest> {
        self.validate()?;
        let app = match self.app.take().filter(|a| !a.is_empty()) {
            Some(app) => app,
            None => selector
                .choose_application(APP_PROMPT)
                .map_err(|e| EnvUpError::Validation(format!("select application: {e}")))?,
        };
        let name = self.name.take().filter(|n| !n.is_empty());
        let name = match (name, self.all) {
            (None, false) => Some(
                selector
                    .choose_environment(ENV_PROMPT, ENV_HELP, &app)
                    .map_err(|e| EnvUpError::Validation(format!("select environment: {e}")))?,
            ),
            (name, _) => name,
        };
        Ok(UpgradeRequest::new(app, Target::from_flags(name, self.all)?))
    }
}
