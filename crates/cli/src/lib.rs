//! # Strata CLI
//!
//! Command-line interface for Strata.
//!
//! ## Commands
//!
//! - `validate` - Validate a schema file and report errors and warnings
//! - `relations` - Print the relation table inferred from a schema
//! - `run` - Run a JSON script of operations against an in-memory store
//!

pub mod config;

pub use config::{CliConfig, DEFAULT_CONFIG_FILE, LoggingConfig, OutputConfig, SchemaConfig};

// For `Cli::parse` in the binary
pub use clap::Parser;

use anyhow::{Context, bail};
use clap::Subcommand;
use colored::Colorize;
use serde_json::{Value as Json, json};
use std::path::{Path, PathBuf};
use strata_engine::{DataApi, MemoryStore, Operation};
use strata_schema::{
    RelationTable, Schema, ValidationResult, Validator, compute_relations, load_schema,
    read_schema, relation_warnings,
};
use tracing::info;

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Arguments
// ============================================================================

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Schema-driven data API with relation inference and nested mutations"
)]
pub struct Cli {
    /// Configuration file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "STRATA_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Log filter, e.g. `debug` or `strata_engine=trace`
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a schema file
    Validate {
        #[arg(long, short, value_name = "FILE")]
        schema: Option<PathBuf>,
    },

    /// Print the inferred relation table
    Relations {
        #[arg(long, short, value_name = "FILE")]
        schema: Option<PathBuf>,
    },

    /// Run a script of operations against a fresh in-memory store
    Run {
        #[arg(long, short, value_name = "FILE")]
        schema: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        script: PathBuf,
    },
}

impl Cli {
    /// Log filter from the flag, falling back to the config file
    pub fn log_level(&self, config: &CliConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Run a parsed command line
pub async fn run(cli: Cli, config: CliConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Validate { schema } => {
            let path = schema_path(schema, &config)?;
            info!(path = %path.display(), "Validating schema");
            validate(&path)
        }
        Commands::Relations { schema } => {
            let path = schema_path(schema, &config)?;
            let schema = load_schema(&path)?;
            print_relations(&compute_relations(&schema));
            Ok(())
        }
        Commands::Run { schema, script } => {
            let path = schema_path(schema, &config)?;
            info!(schema = %path.display(), script = %script.display(), "Running script");
            let api = DataApi::in_memory(load_schema(&path)?)?;
            let operations = read_script(&script)?;
            for result in run_script(&api, &operations).await {
                println!("{}", render(&result, config.output.pretty)?);
            }
            Ok(())
        }
    }
}

fn schema_path(flag: Option<PathBuf>, config: &CliConfig) -> anyhow::Result<PathBuf> {
    match flag.or_else(|| config.schema.path.clone()) {
        Some(path) => Ok(path),
        None => bail!("no schema file given; pass --schema or set [schema] path in the config"),
    }
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let schema = read_schema(&json)?;
    let report = validation_report(&schema);

    for error in &report.errors {
        println!("{} {}", "error:".red().bold(), error);
    }
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    if report.has_errors() {
        bail!("{} has {} error(s)", path.display(), report.errors.len());
    }
    println!(
        "{} {} ({} types)",
        "✓".green().bold(),
        path.display(),
        schema.len()
    );
    Ok(())
}

/// Schema rule results plus relation inference warnings
pub fn validation_report(schema: &Schema) -> ValidationResult {
    let mut report = Validator::with_default_rules().validate(schema);
    report.merge(relation_warnings(&compute_relations(schema)));
    report
}

/// One line per relation: `name: A.field <-> B.field`
pub fn relation_lines(relations: &RelationTable) -> Vec<String> {
    relations
        .iter()
        .map(|(name, relation)| match &relation.second {
            Some(second) if relation.is_self() => format!("{}: {} (self)", name, second),
            Some(second) => format!("{}: {} <-> {}", name, relation.first, second),
            None => format!("{}: {} (one-sided)", name, relation.first),
        })
        .collect()
}

fn print_relations(relations: &RelationTable) {
    for line in relation_lines(relations) {
        println!("{}", line);
    }
    for warning in relations.warnings() {
        println!("{} {}", "warning:".yellow().bold(), warning.message);
    }
}

/// Read a JSON array of operations
pub fn read_script(path: &Path) -> anyhow::Result<Vec<Operation>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid script {}", path.display()))
}

/// Run operations in order; a failed operation is reported in place and
/// does not stop the script
pub async fn run_script(api: &DataApi<MemoryStore>, operations: &[Operation]) -> Vec<Json> {
    let mut results = Vec::with_capacity(operations.len());
    for operation in operations {
        let result = match api.execute(operation).await {
            Ok(json) => json,
            Err(e) => json!({"errors": [{"message": e.to_string()}]}),
        };
        results.push(result);
    }
    results
}

fn render(json: &Json, pretty: bool) -> anyhow::Result<String> {
    Ok(match pretty {
        true => serde_json::to_string_pretty(json)?,
        false => serde_json::to_string(json)?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_engine::OperationKind;
    use strata_schema::{FieldDescriptor, TypeDescriptor};
    use tempfile::TempDir;

    fn blog() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("User")
                    .with_field(FieldDescriptor::new("email", "String").unique())
                    .with_field(FieldDescriptor::list("posts", "Post")),
            )
            .with_type(
                TypeDescriptor::object("Post")
                    .with_field(FieldDescriptor::new("title", "String"))
                    .with_field(FieldDescriptor::new("author", "User")),
            )
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["strata", "run", "--schema", "blog.json", "--script", "ops.json"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        match cli.command {
            Commands::Run { schema, script } => {
                assert_eq!(schema, Some(PathBuf::from("blog.json")));
                assert_eq!(script, PathBuf::from("ops.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["strata", "validate", "--log-level", "debug"]);
        assert_eq!(cli.log_level(&CliConfig::default()), "debug");
        assert!(matches!(cli.command, Commands::Validate { schema: None }));
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let cli = Cli::parse_from(["strata", "relations"]);
        let config =
            CliConfig::default().with_logging(LoggingConfig::default().with_level("warn"));
        assert_eq!(cli.log_level(&config), "warn");
    }

    #[test]
    fn test_schema_path_prefers_flag() {
        let config = CliConfig::default().with_schema(SchemaConfig::default().with_path("a.json"));
        assert_eq!(
            schema_path(Some(PathBuf::from("b.json")), &config).unwrap(),
            PathBuf::from("b.json")
        );
        assert_eq!(schema_path(None, &config).unwrap(), PathBuf::from("a.json"));
        assert!(schema_path(None, &CliConfig::default()).is_err());
    }

    #[test]
    fn test_relation_lines() {
        let lines = relation_lines(&compute_relations(&blog()));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Post.author"));
        assert!(lines[0].contains("User.posts[]"));
        assert!(lines[0].contains("<->"));
    }

    #[test]
    fn test_validation_report_collects_errors() {
        let schema = blog().with_type(
            TypeDescriptor::object("Tag").with_field(FieldDescriptor::list("labels", "String").unique()),
        );
        let report = validation_report(&schema);
        assert!(report.has_errors());
        assert!(!validation_report(&blog()).has_errors());
    }

    #[tokio::test]
    async fn test_run_script_reports_failures_in_place() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("ops.json");
        std::fs::write(
            &script,
            serde_json::to_string(&json!([
                {"op": "create", "type": "User", "input": {"data": {"email": "a@x"}}},
                {"op": "create", "type": "User", "input": {"data": {"email": "a@x"}}},
                {"op": "query", "type": "User"}
            ]))
            .unwrap(),
        )
        .unwrap();

        let operations = read_script(&script).unwrap();
        assert_eq!(operations[2].op, OperationKind::Query);

        let api = DataApi::in_memory(blog()).unwrap();
        let results = run_script(&api, &operations).await;
        assert_eq!(results[0]["data"]["email"], json!("a@x"));
        assert!(results[1]["errors"][0]["message"].is_string());
        assert_eq!(results[2]["aggregate"]["count"], json!(1));
    }

    #[test]
    fn test_render_compact() {
        assert_eq!(render(&json!({"a": 1}), false).unwrap(), r#"{"a":1}"#);
    }
}
