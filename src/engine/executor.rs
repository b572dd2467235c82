//! Execution - confirmation, progress and the final report

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{ExecuteOptions, ResourceGraph, RunReport, compute_diffs, converge};
use std::time::Duration;

use super::differ::display_diff;
use crate::progress::{self, ConvergeProgress};

/// Options for `apply` (adds prompting and output format to [`ExecuteOptions`])
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Number of parallel jobs
    pub jobs: usize,
    /// Wall-clock limit per Exec command
    pub exec_timeout: Option<Duration>,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Print the report as JSON instead of text
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            exec_timeout: None,
            yes: false,
            json: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl ApplyOptions {
    fn engine(&self) -> ExecuteOptions {
        ExecuteOptions {
            jobs: self.jobs,
            exec_timeout: self.exec_timeout,
            verbose: self.verbose,
        }
    }
}

/// Preview, confirm and converge
///
/// Returns `None` when the user declines.
pub fn execute(graph: &ResourceGraph, opts: &ApplyOptions) -> Result<Option<RunReport>> {
    let text = !opts.json && !opts.quiet;

    if !opts.yes {
        let diffs = compute_diffs(graph);
        if text {
            display_diff(&diffs);
        }
        if !diffs.is_empty() && !confirm_proceed()? {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(None);
        }
    }

    if text {
        println!();
        println!(
            "  {} Converging {} resources...",
            "→".cyan(),
            graph.len()
        );
    }

    let mut progress = if text {
        ConvergeProgress::new(opts.verbose)
    } else {
        ConvergeProgress::hidden()
    };
    let report = converge(graph, &opts.engine(), &mut progress)?;

    if opts.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else if !opts.quiet {
        print_report(&report);
    }

    Ok(Some(report))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}

/// Print every outcome and the summary
pub fn print_report(report: &RunReport) {
    println!();
    for entry in &report.entries {
        let detail = match entry.outcome.error_line() {
            Some(err) => err.red().to_string(),
            None => entry.outcome.label().dimmed().to_string(),
        };
        println!(
            "  {} {:<34} {}",
            progress::symbol(&entry.outcome),
            entry.key.to_string(),
            detail
        );
    }

    let summary = report.summary();
    println!();
    if summary.is_success() {
        println!("  {} Host converged", "✓".green().bold());
    } else {
        println!("  {} Host did not converge", "⚠".yellow().bold());
    }

    if summary.applied > 0 {
        println!("    • {} resources applied", summary.applied);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources unchanged", summary.unchanged);
    }
    if summary.blocked > 0 {
        println!("    • {} resources skipped", summary.blocked);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
    let millis = report.duration().num_milliseconds();
    println!(
        "    {}",
        format!("finished in {:.1}s", millis as f64 / 1000.0).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::SimulatedHost;
    use crate::manifest;
    use crate::schema::ProvisionConfig;

    #[test]
    fn test_execute_with_yes_converges_without_prompting() {
        let config = ProvisionConfig::default();
        let sim = SimulatedHost::new();
        sim.on_command("make && make install", config.nginx_binary());
        let graph = ResourceGraph::build(manifest::openresty(&config, &sim.host())).unwrap();

        let opts = ApplyOptions {
            yes: true,
            quiet: true,
            ..ApplyOptions::default()
        };
        let report = execute(&graph, &opts).unwrap().unwrap();
        assert_eq!(report.entries.len(), 13);
        assert!(report.is_success());
    }
}
