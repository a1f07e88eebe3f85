//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//! - `--config <file>`: TOML config (defaults apply when omitted)
//! - `--db <file>`: database path, overrides the config value

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Kazi - excavation catalog for main codes and artifacts
#[derive(Parser, Debug)]
#[command(name = "kazi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the catalog database, overrides the config
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Main code operations
    #[command(subcommand)]
    Code(CodeCommand),

    /// Artifact operations
    #[command(subcommand)]
    Artifact(ArtifactCommand),

    /// Check that the core library is linked
    Ping,

    /// Print the core library version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum CodeCommand {
    /// Allocate the next free code and create a main code with it
    New(MainCodeFields),

    /// Insert a main code under an explicit code without moving the cursor
    Seed {
        /// Three-letter code, e.g. AAB
        code: String,
        #[command(flatten)]
        fields: MainCodeFields,
    },

    /// List main codes
    List {
        /// Substring of the code
        #[arg(long)]
        code: Option<String>,
        /// Substring of the finding place
        #[arg(long)]
        finding_place: Option<String>,
        /// Free-text search over every field
        #[arg(long)]
        q: Option<String>,
        /// created_at | -created_at | code | -code
        #[arg(long, default_value = "-created_at")]
        ordering: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one main code
    Show { code: String },

    /// Delete a main code and all of its artifacts
    Delete { code: String },

    /// Show the allocation cursor
    Cursor,
}

#[derive(Args, Debug)]
pub struct MainCodeFields {
    #[arg(long)]
    pub finding_place: String,
    #[arg(long)]
    pub plan_square: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub layer: Option<String>,
    #[arg(long)]
    pub level: Option<String>,
    #[arg(long)]
    pub grave_no: Option<String>,
    #[arg(long)]
    pub gis: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ArtifactCommand {
    /// Register an artifact under a main code
    Add {
        /// Parent main code, e.g. AAB
        code: String,
        /// Artifact number within the main code
        artifact_no: u32,
        /// Artifact date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// GENEL | SIKKE | SERAMIK | MEZAR
        #[arg(long, default_value = "GENEL")]
        form_type: String,
        #[arg(long)]
        production_material: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        piece_date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        source_and_reference: Option<String>,
        /// Mark as an inventory piece
        #[arg(long)]
        inventory: bool,
        /// Form-specific fields as a JSON object
        #[arg(long, value_name = "JSON")]
        details: Option<String>,
        /// Measurements as a JSON object
        #[arg(long, value_name = "JSON")]
        measurements: Option<String>,
    },

    /// List artifacts
    List {
        /// Substring of the parent code
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        finding_place: Option<String>,
        #[arg(long)]
        form_type: Option<String>,
        #[arg(long)]
        artifact_no: Option<u32>,
        #[arg(long)]
        production_material: Option<String>,
        #[arg(long)]
        period: Option<String>,
        /// Inclusive lower date bound (YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<NaiveDate>,
        /// Inclusive upper date bound (YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<NaiveDate>,
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value = "-created_at")]
        ordering: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Report whether an artifact number is still free under a main code
    Check { code: String, artifact_no: u32 },

    /// Write one artifact as csv, html or json
    Export {
        /// Full artifact number, e.g. AAB0007
        full_no: String,
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output directory; prints to stdout when omitted
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::{ArtifactCommand, Cli, CodeCommand, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_db_after_subcommand() {
        let cli = Cli::parse_from(["kazi", "code", "new", "--finding-place", "Trench 4", "--db", "x.db"]);
        assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("x.db")));
        match cli.command {
            Command::Code(CodeCommand::New(fields)) => assert_eq!(fields.finding_place, "Trench 4"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_artifact_date() {
        let cli = Cli::parse_from(["kazi", "artifact", "add", "AAB", "7", "--date", "2024-07-14"]);
        match cli.command {
            Command::Artifact(ArtifactCommand::Add { date, artifact_no, .. }) => {
                assert_eq!(artifact_no, 7);
                assert_eq!(date.to_string(), "2024-07-14");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["kazi", "artifact", "add", "AAB", "7", "--date", "14/07/2024"]).is_err());
    }
}
