//! Rendering of a [`ResultTable`] for the caller: either as a CSV table or as
//! a JSON list of records.

use crate::models::ResultTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Header row plus one CSV line per row.
    #[default]
    Table,
    /// JSON array of `{column: value}` objects.
    Records,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" | "csv" => Ok(OutputFormat::Table),
            "records" | "json" => Ok(OutputFormat::Records),
            other => Err(format!("unknown output format {:?} (table|records)", other)),
        }
    }
}

pub fn render<W: Write>(table: &ResultTable, format: OutputFormat, out: W) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(table, out),
        OutputFormat::Records => write_records(table, out),
    }
}

fn write_table<W: Write>(table: &ResultTable, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(table.columns().names())
        .context("Failed to write header row")?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))
            .context("Failed to write row")?;
    }
    wtr.flush().context("Failed to flush table output")?;
    Ok(())
}

fn write_records<W: Write>(table: &ResultTable, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, table).context("Failed to serialise records")?;
    writeln!(out)?;
    Ok(())
}
