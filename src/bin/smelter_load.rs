//! smelter-load: Flatten one nested JSON document into existing relational tables
//!
//! Usage:
//!   # Everything from flags
//!   smelter-load --source doc.json --database dest.db --root-table Entity
//!
//!   # Config file, with an override and JSON summary output
//!   smelter-load --config load.json --schema staging --json
//!
//!   # Read the document from stdin
//!   cat doc.json | smelter-load --source - --database dest.db

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use smelter::LoadConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "smelter-load")]
#[command(about = "Flatten nested JSON into existing relational tables", long_about = None)]
struct Args {
    /// JSON configuration file; flags and environment variables override it
    #[arg(long, short = 'c', env = "SMELTER_CONFIG")]
    config: Option<PathBuf>,

    /// Source document location (path, file:// URI, or - for stdin)
    #[arg(long, short = 's', env = "SMELTER_SOURCE")]
    source: Option<String>,

    /// Destination SQLite database
    #[arg(long, short = 'd', env = "SMELTER_DATABASE")]
    database: Option<String>,

    /// Attach another database as SCHEMA=PATH (repeatable)
    #[arg(long, value_name = "SCHEMA=PATH")]
    attach: Vec<String>,

    /// Destination schema name (default: "main")
    #[arg(long, env = "SMELTER_SCHEMA")]
    schema: Option<String>,

    /// Table receiving the document's top-level fields (default: "Entity")
    #[arg(long, env = "SMELTER_ROOT_TABLE")]
    root_table: Option<String>,

    /// Separator for lineage names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Emit a position column with this suffix for every exploded array
    #[arg(long, value_name = "SUFFIX")]
    array_index: Option<String>,

    /// Comma-separated fields to never explode or descend into
    #[arg(long)]
    scalar_fields: Option<String>,

    /// Comma-separated columns copied into every descendant table
    #[arg(long)]
    carry_columns: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Exit with a failure status when any table was skipped because of an error
    #[arg(long)]
    strict: bool,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn build_config(args: &Args) -> Result<LoadConfig> {
    let mut config = match &args.config {
        Some(path) => LoadConfig::from_file(path)?,
        None => LoadConfig::default(),
    };

    if let Some(source) = &args.source {
        config.source_path = source.clone();
    }
    if let Some(database) = &args.database {
        config.connection.endpoint = database.clone();
    }
    for attachment in &args.attach {
        let (schema, path) = attachment
            .split_once('=')
            .with_context(|| format!("--attach expects SCHEMA=PATH, got {:?}", attachment))?;
        config
            .connection
            .attach
            .insert(schema.trim().to_string(), path.trim().to_string());
    }
    if let Some(schema) = &args.schema {
        config.schema_name = schema.clone();
    }
    if let Some(root_table) = &args.root_table {
        config.root_table = root_table.clone();
    }
    if let Some(sep) = &args.separator {
        config.melt.separator = sep.clone();
    }
    if let Some(suffix) = &args.array_index {
        config.melt.array_index = Some(suffix.clone());
    }
    if let Some(fields) = &args.scalar_fields {
        config.melt.scalar_fields = split_list(fields);
    }
    if let Some(columns) = &args.carry_columns {
        config.melt.carry_columns = split_list(columns);
    }

    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args)?;
    tracing::info!(
        schema = %config.schema_name,
        root_table = %config.root_table,
        source = %config.source_path,
        "starting load"
    );

    let summary = smelter::run_load(&config).context("load pass failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary);
    }

    if args.strict && summary.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "smelter-load",
            "--source",
            "doc.json",
            "--database",
            "dest.db",
            "--attach",
            "staging=staging.db",
            "--schema",
            "staging",
            "--scalar-fields",
            "meta, raw,",
            "--array-index",
            "idx",
        ]);

        let config = build_config(&args).unwrap();

        assert_eq!(config.source_path, "doc.json");
        assert_eq!(config.connection.endpoint, "dest.db");
        assert_eq!(config.connection.attach["staging"], "staging.db");
        assert_eq!(config.schema_name, "staging");
        assert_eq!(config.root_table, "Entity");
        assert_eq!(config.melt.scalar_fields, vec!["meta", "raw"]);
        assert_eq!(config.melt.array_index.as_deref(), Some("idx"));
    }

    #[test]
    fn test_bad_attach_is_rejected() {
        let args = Args::parse_from(["smelter-load", "--attach", "staging"]);
        assert!(build_config(&args).is_err());
    }
}
