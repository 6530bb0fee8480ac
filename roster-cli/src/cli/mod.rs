//! Command-line interface definition

pub mod commands;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Config;
use commands::roster::{ConfigArgs, DeleteArgs, EditArgs, ImportArgs, ListArgs};

#[derive(Parser, Debug)]
#[command(name = "roster-cli")]
#[command(about = "Keep a remote student roster in sync with spreadsheets")]
#[command(version)]
pub struct Cli {
    /// Roster store base URL (overrides config and ROSTER_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Collection holding the records
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Name of the identifier field in store records
    #[arg(long, global = true, value_name = "FIELD")]
    pub id_field: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and print the roster
    List(ListArgs),
    /// Create records from the first sheet of a spreadsheet
    Import(ImportArgs),
    /// Change fields of one record
    Edit(EditArgs),
    /// Delete records by identifier
    Delete(DeleteArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command is meaningless without a loaded roster.
    /// Import only writes, so it still runs when the initial fetch fails.
    pub fn needs_snapshot(&self) -> bool {
        match self {
            Commands::List(_) | Commands::Edit(_) | Commands::Delete(_) => true,
            Commands::Import(_) | Commands::Config(_) => false,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if let Some(collection) = &self.collection {
            config.api.collection = collection.clone();
        }
        if let Some(id_field) = &self.id_field {
            config.api.id_field = id_field.clone();
        }
        match self.verbose {
            0 => {}
            1 => config.log_level = "debug".to_string(),
            _ => config.log_level = "trace".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "roster-cli",
            "--base-url",
            "http://10.0.0.2:4000",
            "-v",
            "list",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.api.base_url, "http://10.0.0.2:4000");
        assert_eq!(config.api.collection, "students");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["roster-cli", "delete", "a", "b", "--collection", "pupils"]);
        assert_eq!(cli.collection.as_deref(), Some("pupils"));
        match cli.command {
            Commands::Delete(args) => assert_eq!(args.ids, vec!["a", "b"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_only_import_runs_without_snapshot() {
        let import = Cli::parse_from(["roster-cli", "import", "students.xlsx"]);
        assert!(!import.command.needs_snapshot());

        let edit = Cli::parse_from(["roster-cli", "edit", "7", "--set", "name=Ada"]);
        assert!(edit.command.needs_snapshot());

        let list = Cli::parse_from(["roster-cli", "list", "--format", "json"]);
        assert!(list.command.needs_snapshot());
    }

    #[test]
    fn test_config_command() {
        let cli = Cli::parse_from(["roster-cli", "config", "--save"]);
        match cli.command {
            Commands::Config(args) => assert!(args.save),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
