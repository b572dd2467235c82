mod cli;
mod commands;
mod engine;
mod host;
mod manifest;
mod paths;
mod progress;
mod resource;
mod runner;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit config file, if given
    pub config: Option<PathBuf>,
    pub user: Option<String>,
    pub group: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        user: cli.user,
        group: cli.group,
    };

    match cli.command {
        Command::Plan { json } => commands::declarative::plan(&ctx, json)?,
        Command::Diff { json } => commands::declarative::diff(&ctx, json)?,
        Command::Apply(args) => return commands::declarative::apply(&ctx, &args),
        Command::Show { target } => commands::declarative::show(&ctx, &target)?,
        Command::Config => commands::declarative::config(&ctx)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "openresty-provision", &mut io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}
