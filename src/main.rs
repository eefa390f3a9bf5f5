use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Map, Value};

use rulesql::collection_catalog::{CatalogError, CatalogStore};
use rulesql::config::{CliConfig, ResolverConfig};
use rulesql::filter::{apply_filter, FilterExpr};
use rulesql::request_info::RequestInfo;
use rulesql::resolver::RecordFieldResolver;
use rulesql::sql::{SelectQuery, ToSql};

/// rulesql - compile collection filters to PostgreSQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Collection catalog YAML file (defaults to RULESQL_CATALOG_PATH)
    #[arg(long)]
    catalog: Option<String>,

    /// Collection the filter is evaluated against
    #[arg(long)]
    collection: String,

    /// Filter AST as a JSON file
    #[arg(long)]
    filter: PathBuf,

    /// Request info as a JSON file, used by `@request.*` paths
    #[arg(long)]
    request: Option<PathBuf>,

    /// Maximum relation hops in one field path (1-6)
    #[arg(long)]
    max_relation_depth: Option<usize>,

    /// Allow filtering on hidden fields
    #[arg(long)]
    allow_hidden_fields: bool,

    /// Print `$n` placeholders and an ordered value list
    #[arg(long)]
    positional: bool,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            catalog_path: cli.catalog.clone(),
            max_relation_depth: cli.max_relation_depth,
            allow_hidden_fields: cli.allow_hidden_fields,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger - defaults to WARN level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = ResolverConfig::from_env().context("Invalid RULESQL_* environment")?;
    config
        .merge_cli(CliConfig::from(&cli))
        .context("Invalid command line arguments")?;

    let Some(catalog_path) = config.catalog_path.as_deref() else {
        bail!("No collection catalog given (use --catalog or RULESQL_CATALOG_PATH)");
    };

    let store = CatalogStore::from_yaml_file(catalog_path).map_err(|e| {
        CatalogError::config_error_with_context(catalog_path, e.to_string())
    })?;
    let catalog = store.snapshot();

    let collection = catalog.get(&cli.collection).map_err(|_| {
        CatalogError::collection_error_with_context(&cli.collection, "Resolving --collection")
    })?;

    let filter: FilterExpr = serde_json::from_str(
        &fs::read_to_string(&cli.filter)
            .with_context(|| format!("Failed to read {}", cli.filter.display()))?,
    )
    .context("Failed to parse filter JSON")?;

    let request_info = match &cli.request {
        Some(path) => Some(
            RequestInfo::from_json_str(
                &fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
            )
            .context("Failed to parse request info JSON")?,
        ),
        None => None,
    };

    let mut resolver = RecordFieldResolver::new(
        catalog.as_ref(),
        collection,
        request_info.as_ref(),
        false,
    )
    .with_config(&config);

    let mut query = SelectQuery::for_table(&collection.name);
    apply_filter(&mut query, &filter, &mut resolver)?;

    log::debug!(
        "Compiled filter for '{}' with {} join(s)",
        collection.name,
        query.joins().len()
    );

    let output = if cli.positional {
        let (sql, values) = query.to_positional()?;
        json!({ "sql": sql, "params": values })
    } else {
        let params: Map<String, Value> = query
            .params()
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        json!({ "sql": query.to_sql(), "params": params })
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
