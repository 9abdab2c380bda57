use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Top-level CLI parser for the `qmsd` binary.
#[derive(Debug, Parser)]
#[command(name = "qmsd", version, about = "QMS backend - non-conformities, audits, and compliance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra TOML config file, layered above the project config
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the REST server
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run the reminder sweep once and exit
    Sweep {
        /// Day to evaluate reminders for (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the effective configuration
    Check,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, ConfigCommands};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["qmsd", "serve", "--bind", "0.0.0.0:9000", "--verbose"])
            .expect("cli should parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { bind: Some(ref b) } if b == "0.0.0.0:9000"));
    }

    #[test]
    fn sweep_accepts_an_explicit_date() {
        let cli = Cli::try_parse_from(["qmsd", "sweep", "--date", "2026-10-16"])
            .expect("cli should parse");
        let Commands::Sweep { date } = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2026, 10, 16));
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["qmsd", "config", "check"]).expect("cli should parse");
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigCommands::Check
            }
        ));
    }
}
