use envup_core::orchestrator::{EnvironmentOutcome, RunReport, RunState};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

pub fn print_run_report(report: &RunReport) {
    let rows = report
        .environments
        .iter()
        .map(|env| {
            vec![
                env.name.clone(),
                env.deployed_version.clone().unwrap_or_else(|| "-".into()),
                env.decision
                    .as_ref()
                    .map(|d| d.as_str().to_string())
                    .unwrap_or_else(|| "-".into()),
                outcome_label(env.outcome).to_string(),
            ]
        })
        .collect();
    print_table(&["ENVIRONMENT", "DEPLOYED", "DECISION", "OUTCOME"], rows);

    let upgraded = report.upgraded().count();
    match report.state {
        RunState::Completed => println!(
            "\n{} of {} environment(s) in '{}' upgraded to {}.",
            upgraded,
            report.environments.len(),
            report.app,
            report.latest_version
        ),
        RunState::Failed => println!(
            "\nStopped at environment '{}' after upgrading {} environment(s).",
            report.halted_at.as_deref().unwrap_or("-"),
            upgraded
        ),
        RunState::Cancelled => println!("\nCancelled after upgrading {} environment(s).", upgraded),
    }
}

fn outcome_label(outcome: EnvironmentOutcome) -> &'static str {
    match outcome {
        EnvironmentOutcome::NotEvaluated => "not evaluated",
        EnvironmentOutcome::Skipped => "skipped",
        EnvironmentOutcome::Upgraded => "upgraded",
        EnvironmentOutcome::Blocked => "blocked",
        EnvironmentOutcome::Failed => "failed",
        EnvironmentOutcome::Cancelled => "cancelled",
    }
}
