//! Roster commands

pub mod handler;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

pub use handler::handle_command;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Spreadsheet file (xlsx, xls, xlsb or ods)
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Identifier of the record to edit
    pub id: String,

    /// Field assignment, repeatable
    #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment, required = true)]
    pub assignments: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Identifiers of the records to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write it to the user config file
    #[arg(long)]
    pub save: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns
    Table,
    /// Pretty-printed JSON array
    Json,
    Csv,
}

/// Split `field=value`; the value may itself contain `=`
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", s))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((field.to_string(), value.to_string()))
}
