use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use declarative::ResourceKey;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openresty-provision")]
#[command(version)]
#[command(about = "Converge a host to a built and running OpenResty", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/config.toml)
    #[arg(short, long, global = true, env = "OPENRESTY_PROVISION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Account the server runs as (overrides the config file)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Group the server runs as (overrides the config file)
    #[arg(long, global = true)]
    pub group: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the convergence plan in order, with its edges
    Plan {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe the host and show what apply would change
    Diff {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Converge the host to the declared state
    Apply(ApplyArgs),

    /// Show the attributes and edges of one resource
    Show {
        /// Resource key, e.g. 'Exec[install openresty]'
        target: ResourceKey,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Parallel jobs for independent resources (1 = strict plan order)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Kill a build command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub exec_timeout: Option<u64>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_with_overrides() {
        let cli = Cli::try_parse_from([
            "openresty-provision",
            "--user",
            "openresty",
            "apply",
            "--jobs",
            "4",
            "--exec-timeout",
            "600",
            "-y",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("openresty"));
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.jobs, 4);
        assert_eq!(args.exec_timeout, Some(600));
        assert!(args.yes);
        assert!(!args.json);
    }

    #[test]
    fn test_show_parses_resource_key() {
        let cli = Cli::try_parse_from(["openresty-provision", "show", "Exec[untar openresty]"])
            .unwrap();
        let Command::Show { target } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(target, ResourceKey::exec("untar openresty"));
    }

    #[test]
    fn test_zero_jobs_is_rejected() {
        assert!(Cli::try_parse_from(["openresty-provision", "apply", "--jobs", "0"]).is_err());
    }
}
