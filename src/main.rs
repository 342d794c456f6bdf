use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use odata_engine::config::{self, SearchTokenization};
use odata_engine::entity_set::sql::dialect::SqlDialect;
use odata_engine::entity_set::sql::explain;
use odata_engine::model::ModelDocument;
use odata_engine::{EngineConfig, RawQueryOptions, Transaction};

/// odata-engine - run OData v4 queries against a YAML-declared model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML model document (enumerations, entity types, entity sets)
    #[arg(long)]
    model: PathBuf,

    /// YAML engine configuration; overrides the flags below and the model's own section
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entity set to query
    #[arg(long)]
    entity_set: String,

    #[arg(long)]
    filter: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    orderby: Option<String>,

    #[arg(long)]
    skip: Option<String>,

    #[arg(long)]
    top: Option<String>,

    #[arg(long)]
    select: Option<String>,

    #[arg(long)]
    expand: Option<String>,

    /// Include the total number of matching entities
    #[arg(long)]
    count: bool,

    /// Print the parsed filter and the SQL the pushdown layer would emit instead of running the query
    #[arg(long)]
    explain: bool,

    /// Maximum nesting depth of filter expressions
    #[arg(long, default_value_t = 64)]
    max_expression_depth: u32,

    /// Match $search terms case-sensitively
    #[arg(long)]
    search_case_sensitive: bool,

    /// How $search input is split into terms (words, phrase)
    #[arg(long, default_value = "words")]
    search_tokenization: SearchTokenization,

    /// SQL dialect for --explain (sqlite, postgres, mysql)
    #[arg(long, default_value = "sqlite")]
    sql_dialect: SqlDialect,

    /// Fail instead of evaluating untranslatable filters in memory
    #[arg(long)]
    no_sql_fallback: bool,
}

impl Cli {
    fn raw_options(&self) -> RawQueryOptions {
        RawQueryOptions {
            filter: self.filter.clone(),
            search: self.search.clone(),
            orderby: self.orderby.clone(),
            skip: self.skip.clone(),
            top: self.top.clone(),
            count: self.count.then(|| "true".to_string()),
            select: self.select.clone(),
            expand: self.expand.clone(),
        }
    }
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            max_expression_depth: cli.max_expression_depth,
            search_case_sensitive: cli.search_case_sensitive,
            search_tokenization: cli.search_tokenization,
            sql_dialect: cli.sql_dialect,
            no_sql_fallback: cli.no_sql_fallback,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?,
        None => EngineConfig::from_cli((&cli).into()).context("Configuration error")?,
    };

    let model = ModelDocument::from_yaml_file(&cli.model)?
        .build(Some(config))
        .with_context(|| format!("Invalid model {}", cli.model.display()))?;
    info!("Loaded model from {}", cli.model.display());

    let tx = Transaction::new(&model, &cli.entity_set, &cli.raw_options())?;

    if cli.explain {
        if let Some(filter) = &tx.options().filter {
            println!("filter: {}", filter);
        }
        let statement = explain(&model, &cli.entity_set, tx.options())?;
        println!("sql: {}", statement.sql);
        let params: Vec<String> = statement.params.iter().map(ToString::to_string).collect();
        println!("params: [{}]", params.join(", "));
        return Ok(());
    }

    let mut response = serde_json::Map::new();
    if tx.options().count {
        response.insert("@odata.count".to_string(), tx.count()?.into());
    }
    let entities = tx.collect()?;
    response.insert("value".to_string(), serde_json::to_value(&entities)?);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
