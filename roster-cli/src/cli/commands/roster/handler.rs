//! Roster command handlers

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use log::warn;
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use super::{ConfigArgs, DeleteArgs, EditArgs, ImportArgs, ListArgs, OutputFormat};
use crate::api::{HttpRosterClient, RecordId, Snapshot};
use crate::cli::Commands;
use crate::config::Config;
use crate::roster::{DeleteOutcome, Roster, RosterView};

pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    if let Commands::Config(args) = command {
        return show_config(config, args);
    }

    let client = HttpRosterClient::from_config(config).context("Failed to build HTTP client")?;
    let mut roster = Roster::connect(Arc::new(client), config.api.hidden_fields.clone())?;

    let view = roster.settled().await.context("Roster cache stopped")?;
    let loaded = loaded_snapshot(&view).with_context(|| {
        format!(
            "Failed to load roster from {}/{}",
            config.api.base_url, config.api.collection
        )
    });
    let snapshot = match loaded {
        Ok(snapshot) => Some(snapshot),
        Err(err) if !command.needs_snapshot() => {
            warn!("{:#}", err);
            None
        }
        Err(err) => {
            roster.shutdown().await;
            return Err(err);
        }
    };

    let result = match (command, snapshot) {
        (Commands::List(args), Some(snapshot)) => list(&snapshot, &config.api.id_field, args),
        (Commands::Import(args), _) => import(&mut roster, args).await,
        (Commands::Edit(args), _) => edit(&mut roster, args).await,
        (Commands::Delete(args), _) => delete(&mut roster, args).await,
        (Commands::List(_), None) | (Commands::Config(_), _) => Ok(()),
    };

    roster.shutdown().await;
    result
}

fn show_config(config: &Config, args: ConfigArgs) -> Result<()> {
    print!("{}", config.to_toml()?);
    if args.save {
        let path = Config::default_path().context("No user config directory on this platform")?;
        config.save(&path)?;
        println!("{} {}", "Saved".bright_green().bold(), path.display());
    }
    Ok(())
}

fn loaded_snapshot(view: &RosterView) -> Result<Arc<Snapshot>> {
    match (&view.snapshot, &view.last_error) {
        (Some(snapshot), _) => Ok(Arc::clone(snapshot)),
        (None, Some(err)) => anyhow::bail!("{}", err),
        (None, None) => anyhow::bail!("no snapshot was published"),
    }
}

fn list(snapshot: &Snapshot, id_field: &str, args: ListArgs) -> Result<()> {
    let output = format_output(snapshot, id_field, args.format)?;
    print!("{}", output);
    if args.format == OutputFormat::Table {
        println!("{}", format!("{} records", snapshot.len()).dimmed());
    }
    Ok(())
}

async fn import(roster: &mut Roster, args: ImportArgs) -> Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read spreadsheet: {}", args.file.display()))?;

    let report = roster
        .submit_import(&bytes)
        .await
        .with_context(|| format!("Failed to import {}", args.file.display()))?;

    if report.parsed == 0 {
        println!("{}", "Spreadsheet has no data rows, nothing imported".yellow());
        return Ok(());
    }

    println!(
        "{} {} of {} rows",
        "Imported".bright_green().bold(),
        report.created,
        report.parsed
    );
    print_refreshed(roster).await
}

async fn edit(roster: &mut Roster, args: EditArgs) -> Result<()> {
    let id = RecordId::from(args.id);
    roster.open_editor(&id)?;

    for (field, value) in &args.assignments {
        roster
            .set_field_text(field, value)
            .with_context(|| format!("Cannot set '{}'", field))?;
    }

    if !roster.editor().is_dirty() {
        roster.close_editor();
        println!("{}", "No changes to save".yellow());
        return Ok(());
    }

    let commit = roster
        .commit_edit()
        .await
        .with_context(|| format!("Failed to update record {}", id))?;

    println!(
        "{} record {} ({})",
        "Updated".bright_green().bold(),
        commit.id.to_string().cyan(),
        commit.changed.join(", ")
    );
    print_refreshed(roster).await
}

async fn delete(roster: &mut Roster, args: DeleteArgs) -> Result<()> {
    for raw in &args.ids {
        let id = RecordId::from(raw.as_str());
        if !roster.select(&id) {
            println!("{} {} is not in the roster", "Skipping".yellow(), id);
        }
    }

    let report = roster
        .delete_selected()
        .await
        .context("None of the given records can be deleted")?;

    for (id, outcome) in &report.outcomes {
        match outcome {
            DeleteOutcome::Deleted => {
                println!("  {} {}", "deleted".green(), id)
            }
            DeleteOutcome::Failed(err) => {
                println!("  {} {}: {}", "failed".red(), id, err)
            }
        }
    }
    print_refreshed(roster).await?;

    if !report.all_deleted() {
        anyhow::bail!(
            "{} of {} deletes failed",
            report.failed_count(),
            report.len()
        );
    }
    Ok(())
}

/// Wait for the refetch triggered by a mutation and report the result
async fn print_refreshed(roster: &mut Roster) -> Result<()> {
    let view = roster.settled().await?;
    match (&view.snapshot, view.stale) {
        (Some(snapshot), false) => println!("Roster now has {} records", snapshot.len()),
        _ => println!(
            "{} {}",
            "Roster may be out of date:".yellow(),
            view.last_error.as_deref().unwrap_or("refresh failed")
        ),
    }
    Ok(())
}

/// Format a snapshot according to the requested output format
fn format_output(snapshot: &Snapshot, id_field: &str, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let records: Vec<Value> = snapshot
                .records()
                .iter()
                .map(|r| r.to_json(id_field))
                .collect();
            let mut out =
                serde_json::to_string_pretty(&records).context("Failed to format JSON output")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Csv => snapshot_to_csv(snapshot, id_field),
        OutputFormat::Table => Ok(snapshot_to_table(snapshot, id_field)),
    }
}

fn snapshot_to_csv(snapshot: &Snapshot, id_field: &str) -> Result<String> {
    let columns = snapshot.columns();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(std::iter::once(id_field).chain(columns.iter().map(String::as_str)))
        .context("Failed to write CSV header")?;
    for record in snapshot.records() {
        let row = std::iter::once(record.id().to_string()).chain(
            columns
                .iter()
                .map(|c| record.get(c).map(value_to_cell).unwrap_or_default()),
        );
        writer
            .write_record(row)
            .context("Failed to write CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

fn snapshot_to_table(snapshot: &Snapshot, id_field: &str) -> String {
    if snapshot.is_empty() {
        return "No records\n".to_string();
    }

    let mut header = vec![id_field.to_string()];
    header.extend(snapshot.columns());

    let rows: Vec<Vec<String>> = snapshot
        .records()
        .iter()
        .map(|record| {
            std::iter::once(record.id().to_string())
                .chain(
                    header[1..]
                        .iter()
                        .map(|c| record.get(c).map(value_to_cell).unwrap_or_default()),
                )
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].width())
                .chain(std::iter::once(header[i].width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header_line = render_row(&header, &widths);
    out.push_str(&format!("{}\n", header_line.trim_end().bold()));
    for row in &rows {
        out.push_str(render_row(row, &widths).trim_end());
        out.push('\n');
    }
    out
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (cell, width) in cells.iter().zip(widths) {
        line.push_str(cell);
        line.push_str(&" ".repeat(width - cell.width() + 2));
    }
    line
}

/// Display text for a field value; null renders empty
fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
