//! Command-line interface of the `viewfind` binary.
//!
//! ```text
//! viewfind find  --type Comment --where name=xyz --where 'position=1..3' --order position
//! viewfind count --type Comment --where 'color=red|blue'
//! ```
//!
//! Condition values are read as JSON when they parse, otherwise as strings.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use viewfind_core::{ConditionValue, Conditions, EntityType, QueryError, ViewOptions};

use crate::config::{LogConfig, StoreConfig};
use crate::finder::Finder;

/// Error parsing a `--where` argument.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConditionParseError {
    #[error("expected FIELD=VALUE, got {input:?}")]
    MissingEquals { input: String },

    #[error("empty field name in {input:?}")]
    EmptyField { input: String },
}

/// Find documents in a view-indexed document store by attribute.
#[derive(Debug, Parser)]
#[command(name = "viewfind", version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log output as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            filter: self.log_filter.clone(),
            json: self.log_json,
        }
    }
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Store server URL
    #[arg(long, global = true, env = "COUCHDB_URL", default_value = "http://127.0.0.1:5984")]
    pub url: String,

    /// Database name
    #[arg(long, global = true, env = "COUCHDB_DATABASE", default_value = "viewfind")]
    pub database: String,

    /// Basic-auth user
    #[arg(long, global = true, env = "COUCHDB_USER")]
    pub user: Option<String>,

    /// Basic-auth password
    #[arg(long, global = true, env = "COUCHDB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl StoreArgs {
    #[must_use]
    pub fn to_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.url.clone(),
            database: self.database.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print matching documents, one JSON object per line
    Find(FindArgs),
    /// Print the number of matching documents
    Count(QueryArgs),
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Entity type name stored in each document's `type` field
    #[arg(long = "type")]
    pub type_name: String,

    /// Condition: FIELD=VALUE, FIELD=LOW..HIGH, or FIELD=A|B|C
    #[arg(long = "where", value_parser = parse_condition)]
    pub conditions: Vec<(String, ConditionValue)>,
}

impl QueryArgs {
    #[must_use]
    pub fn conditions(&self) -> Conditions {
        self.conditions.iter().cloned().collect()
    }
}

#[derive(Debug, Args)]
pub struct FindArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Sort fields, comma separated
    #[arg(long, value_delimiter = ',')]
    pub order: Vec<String>,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub skip: Option<u64>,

    /// Scan from the end of the view
    #[arg(long)]
    pub descending: bool,
}

impl FindArgs {
    #[must_use]
    pub fn options(&self) -> ViewOptions {
        let mut options = ViewOptions::new();
        if !self.order.is_empty() {
            options = options.order(self.order.iter().cloned());
        }
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        if let Some(skip) = self.skip {
            options = options.skip(skip);
        }
        if self.descending {
            options = options.descending(true);
        }
        options
    }
}

fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Parses one `--where` argument.
///
/// `|` takes precedence over `..`, so `a..b|c` is an any-of of `a..b` and
/// `c`.
///
/// # Errors
///
/// [`ConditionParseError`] when there is no `=` or the field name is empty.
pub fn parse_condition(input: &str) -> Result<(String, ConditionValue), ConditionParseError> {
    let (field, raw) = input
        .split_once('=')
        .ok_or_else(|| ConditionParseError::MissingEquals {
            input: input.to_string(),
        })?;
    let field = field.trim();
    if field.is_empty() {
        return Err(ConditionParseError::EmptyField {
            input: input.to_string(),
        });
    }
    let value = if raw.contains('|') {
        ConditionValue::any_of(raw.split('|').map(parse_value))
    } else if let Some((start, end)) = raw.split_once("..") {
        ConditionValue::range(parse_value(start), parse_value(end))
    } else {
        ConditionValue::scalar(parse_value(raw))
    };
    Ok((field.to_string(), value))
}

/// Runs `command` and returns the lines to print.
///
/// # Errors
///
/// Propagates the finder's [`QueryError`].
pub async fn run(command: &Command, finder: &Finder) -> Result<Vec<String>, QueryError> {
    match command {
        Command::Find(args) => {
            let kind = EntityType::new(args.query.type_name.clone());
            let documents = finder
                .find_documents(&kind, &args.query.conditions(), args.options())
                .await?;
            Ok(documents.iter().map(Value::to_string).collect())
        }
        Command::Count(args) => {
            let kind = EntityType::new(args.type_name.clone());
            let count = finder.count_documents(&kind, &args.conditions()).await?;
            Ok(vec![count.to_string()])
        }
    }
}
