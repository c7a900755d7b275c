use crate::output::{print_json, print_run_report, print_table};
use crate::prompt::PromptSelector;
use anyhow::Context;
use clap::Subcommand;
use envup_core::cancel;
use envup_core::config::{Config, WarnLevel};
use envup_core::local::{invoker_for, FileStore, LocalStackReader};
use envup_core::select::{Selector, UpgradeInputs, APP_PROMPT};
use envup_core::{Orchestrator, UpgradeSettings};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum EnvSubcommand {
    /// Upgrade the template of an environment to the latest version
    Upgrade {
        /// Name of the application
        #[arg(long, short = 'a', env = "ENVUP_APP")]
        app: Option<String>,
        /// Name of the environment
        #[arg(long, short = 'n')]
        name: Option<String>,
        /// Upgrade all environments of the application
        #[arg(long)]
        all: bool,
        /// Cancel the run after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
    },

    /// List environments with their deployed template version and stack status
    Ls {
        /// Name of the application
        #[arg(long, short = 'a', env = "ENVUP_APP")]
        app: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: EnvSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        EnvSubcommand::Upgrade {
            app,
            name,
            all,
            deadline,
        } => upgrade(
            root,
            UpgradeInputs { app, name, all },
            deadline.map(Duration::from_secs),
            json,
        ),
        EnvSubcommand::Ls { app } => list(root, app, json),
    }
}

// ---------------------------------------------------------------------------
// upgrade
// ---------------------------------------------------------------------------

fn upgrade(
    root: &Path,
    inputs: UpgradeInputs,
    deadline: Option<Duration>,
    json: bool,
) -> anyhow::Result<()> {
    inputs.validate()?;

    let config = Config::load(root).context("failed to load .envup/config.yaml")?;
    for warning in config.validate() {
        if warning.level == WarnLevel::Warning {
            tracing::warn!("config: {}", warning.message);
        }
    }
    let settings = UpgradeSettings::from_config(&config)?;

    let store = FileStore::new(root);
    let request = inputs.resolve(&PromptSelector::new(&store))?;

    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(LocalStackReader::new(root)),
        invoker_for(&config.invoker, root),
        settings,
    );

    let rt = tokio::runtime::Runtime::new()?;
    let mut report = rt.block_on(async {
        let (handle, cancellation) = cancel::channel();
        if let Some(deadline) = deadline {
            handle.cancel_after(deadline);
        }
        let interrupt = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current step");
                interrupt.cancel();
            }
        });
        orchestrator.execute(&request, &cancellation).await
    });

    if json {
        print_json(&report)?;
    } else {
        print_run_report(&report);
    }

    match report.take_error() {
        Some(e) => Err(anyhow::Error::new(e)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// ls
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EnvironmentRow {
    name: String,
    version: String,
    status: String,
    prod: bool,
    network_customized: bool,
}

fn list(root: &Path, app: Option<String>, json: bool) -> anyhow::Result<()> {
    Config::load(root).context("failed to load .envup/config.yaml")?;
    let store = FileStore::new(root);
    let app = match app.filter(|a| !a.is_empty()) {
        Some(app) => app,
        None => PromptSelector::new(&store).choose_application(APP_PROMPT)?,
    };
    let application = store
        .load_application(&app)
        .with_context(|| format!("failed to load application {app}"))?;

    let reader = LocalStackReader::new(root);
    let rt = tokio::runtime::Runtime::new()?;
    let rows = rt.block_on(async {
        let mut rows = Vec::new();
        for env in &application.environments {
            let snapshot = reader.snapshot(&app, &env.name).await?;
            rows.push(EnvironmentRow {
                name: env.name.clone(),
                version: snapshot.version,
                status: snapshot.status.to_string(),
                prod: env.prod,
                network_customized: env.is_network_customized(),
            });
        }
        Ok::<_, envup_core::EnvUpError>(rows)
    })?;

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No environments in application {app}.");
        return Ok(());
    }
    print_table(
        &["NAME", "VERSION", "STATUS", "PROD", "CUSTOM NETWORK"],
        rows.into_iter()
            .map(|r| {
                vec![
                    r.name,
                    r.version,
                    r.status,
                    yes_no(r.prod),
                    yes_no(r.network_customized),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn yes_no(value: bool) -> String {
    let label = if value { "yes" } else { "no" };
    label.to_string()
}
