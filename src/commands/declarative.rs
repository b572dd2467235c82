//! Provisioning commands
//!
//! - `plan` - Show the convergence order
//! - `diff` - Preview what apply would change
//! - `apply` - Make current state match desired state
//! - `show` - Inspect one declared resource
//! - `config` - Print the effective configuration

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ResourceGraph, ResourceKey, compute_diffs};
use serde::Serialize;
use std::process::ExitCode;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{self, ApplyOptions};
use crate::host::Host;
use crate::manifest;
use crate::schema::ProvisionConfig;
use crate::ui;

/// Effective configuration: file (or defaults) plus command-line overrides
fn load_config(ctx: &Context) -> Result<ProvisionConfig> {
    ProvisionConfig::load(ctx.config.as_deref())?
        .with_overrides(ctx.user.as_deref(), ctx.group.as_deref())
        .context("Invalid command-line override")
}

fn build_graph(config: &ProvisionConfig, host: &Host) -> Result<ResourceGraph> {
    ResourceGraph::build(manifest::openresty(config, host))
        .context("Invalid resource declarations")
}

fn join(keys: &[ResourceKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Plan Command
// ============================================================================

#[derive(Serialize)]
struct PlanStep {
    key: ResourceKey,
    description: String,
    requires: Vec<ResourceKey>,
    notifies: Vec<ResourceKey>,
}

fn plan_steps(graph: &ResourceGraph) -> Vec<PlanStep> {
    graph
        .iter()
        .map(|resource| {
            let key = resource.key();
            PlanStep {
                description: resource.description(),
                requires: graph.requires_of(&key),
                notifies: graph.notifies_of(&key),
                key,
            }
        })
        .collect()
}

pub fn plan(ctx: &Context, json: bool) -> Result<()> {
    let config = load_config(ctx)?;
    let graph = build_graph(&config, &Host::linux())?;
    let steps = plan_steps(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    ui::header("Convergence Plan");
    println!();
    for (i, step) in steps.iter().enumerate() {
        ui::step(i + 1, steps.len(), &step.key.to_string());
        if !ctx.quiet {
            ui::dim(&format!("  {}", step.description));
        }
        if !step.requires.is_empty() {
            ui::kv("    requires", &join(&step.requires));
        }
        if !step.notifies.is_empty() {
            ui::kv("    notifies", &join(&step.notifies));
        }
    }

    if ctx.verbose > 0 {
        ui::section("Parallel waves");
        for (i, wave) in graph.waves().iter().enumerate() {
            ui::kv(&format!("  wave {}", i + 1), &join(wave));
        }
    }

    Ok(())
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, json: bool) -> Result<()> {
    let config = load_config(ctx)?;
    let graph = build_graph(&config, &Host::linux())?;
    let diffs = compute_diffs(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&diffs)?);
        return Ok(());
    }

    ui::header("Provisioning Diff");
    engine::display_diff(&diffs);
    if !diffs.is_empty() && !ctx.quiet {
        println!();
        ui::dim("Later resources may change once earlier ones converge.");
    }

    Ok(())
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let graph = build_graph(&config, &Host::linux())?;

    let opts = ApplyOptions {
        jobs: usize::from(args.jobs),
        exec_timeout: args
            .exec_timeout
            .map(Duration::from_secs)
            .or_else(|| config.exec_timeout()),
        yes: args.yes,
        json: args.json,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };

    if !args.json && !ctx.quiet {
        ui::header("Applying OpenResty");
        ui::kv("user", &config.user);
        ui::kv("group", &config.group);
        ui::kv("version", &config.version);
    }

    let Some(report) = engine::execute(&graph, &opts)? else {
        return Ok(ExitCode::FAILURE);
    };

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        for (key, error) in report.failures() {
            log::error!("{key}: {error}");
        }
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// Show Command
// ============================================================================

pub fn show(ctx: &Context, target: &ResourceKey) -> Result<()> {
    let config = load_config(ctx)?;
    let graph = build_graph(&config, &Host::linux())?;

    let Some(resource) = graph.get(target) else {
        let known = join(&graph.plan());
        bail!("No resource {target} is declared (known: {known})");
    };

    ui::header(&target.to_string());
    ui::dim(&resource.description());
    println!();
    for (name, value) in resource.attributes() {
        ui::kv(&name, &value);
    }

    let requires = graph.requires_of(target);
    let notifies = graph.notifies_of(target);
    if !requires.is_empty() || !notifies.is_empty() {
        println!();
    }
    if !requires.is_empty() {
        ui::kv("requires", &join(&requires).cyan().to_string());
    }
    if !notifies.is_empty() {
        ui::kv("notifies", &join(&notifies).cyan().to_string());
    }
    if let Some(pos) = graph.position(target) {
        ui::kv("plan position", &format!("{}/{}", pos + 1, graph.len()));
    }

    Ok(())
}

// ============================================================================
// Config Command
// ============================================================================

pub fn config(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    if !ctx.quiet {
        let source = match &ctx.config {
            Some(path) => path.clone(),
            None => crate::paths::config_file()?,
        };
        let note = if source.exists() { "" } else { " (not found, using defaults)" };
        ui::dim(&format!("# {}{}", source.display(), note));
    }
    print!("{text}");

    Ok(())
}
