//! Command dispatch and the select clause grammar
//!
//! The `select` tail keeps its free-form token grammar instead of flag
//! syntax, so queries read the way they are written elsewhere:
//!
//! ```text
//! relaydb select users where age > 30 and city = berlin orderby age asc limit 10
//! ```

use std::collections::BTreeMap;

use clap::Parser;
use tokio::runtime::Runtime;

use crate::backend::HttpStore;
use crate::config::Config;
use crate::query::{
    ascending, descending, equals, greater_than, less_than, part_of, select, Condition, OrderSpec,
    Query,
};
use crate::schema::{CellValue, ColumnType, TableSchema};
use crate::table::DbClient;

use super::args::{Cli, Command, CreateTarget, GetTarget};
use super::errors::{CliError, CliResult};

/// Entry point: parse argv, resolve config, run the command to
/// completion on a fresh runtime
pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    let runtime = Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime.block_on(run_command(cli.command, config))
}

async fn run_command(command: Command, config: Config) -> CliResult<()> {
    let client = DbClient::new(HttpStore::new(&config));
    match command {
        Command::Create { target } => match target {
            CreateTarget::Table { name } => {
                client.create_table(&name).await?;
                println!("table '{}' created", name);
            }
            CreateTarget::Schema { table, pairs } => {
                let schema = schema_from_pairs(&pairs)?;
                client.create_schema(&table, &schema).await?;
                println!("schema for '{}' created", table);
            }
            CreateTarget::Index { table, column } => {
                let shards = client.create_index(&table, &column).await?;
                println!("index on '{}.{}' built ({} shards)", table, column, shards);
            }
        },
        Command::Get { target } => match target {
            GetTarget::Schema { table } => {
                let schema = client.get_schema(&table).await?;
                println!("{}", serde_json::to_string(&schema).unwrap_or_default());
            }
        },
        Command::Insert { table, pairs } => {
            let values = pairs_to_map(&pairs)?;
            let record = client.insert(&table, &values).await?;
            println!("{}", record.to_output_json()?);
        }
        Command::Select { table, clauses } => {
            let query = parse_select_clauses(&table, &clauses)?;
            let records = client.read(&query).await?;
            for record in &records {
                println!("{}", record.to_output_json()?);
            }
        }
        Command::Update {
            table,
            record_id,
            pairs,
        } => {
            let values = pairs_to_map(&pairs)?;
            let record = client.update(&table, &record_id, &values).await?;
            println!("{}", record.to_output_json()?);
        }
        Command::Delete { table, record_id } => {
            client.delete(&table, &record_id).await?;
            println!("record '{}' deleted", record_id);
        }
    }
    Ok(())
}

/// Turns alternating column/value tokens into a map
fn pairs_to_map(pairs: &[String]) -> CliResult<BTreeMap<String, String>> {
    if pairs.len() % 2 != 0 {
        return Err(CliError::InvalidArguments(
            "expected alternating column/value pairs".to_string(),
        ));
    }
    let mut map = BTreeMap::new();
    for pair in pairs.chunks(2) {
        if map.insert(pair[0].clone(), pair[1].clone()).is_some() {
            return Err(CliError::InvalidArguments(format!(
                "column '{}' given twice",
                pair[0]
            )));
        }
    }
    Ok(map)
}

/// Turns alternating column/type tokens into a schema
fn schema_from_pairs(pairs: &[String]) -> CliResult<TableSchema> {
    if pairs.len() % 2 != 0 {
        return Err(CliError::InvalidArguments(
            "expected alternating column/type pairs".to_string(),
        ));
    }
    let mut schema = TableSchema::new();
    for pair in pairs.chunks(2) {
        let column_type = ColumnType::parse(&pair[1]).ok_or_else(|| {
            CliError::InvalidArguments(format!(
                "unknown type '{}' for column '{}'",
                pair[1], pair[0]
            ))
        })?;
        schema.define(&pair[0], column_type)?;
    }
    Ok(schema)
}

/// A value token: number-looking tokens become numeric cells
fn parse_cell(raw: &str) -> CellValue {
    match raw.parse::<f64>() {
        Ok(number) => CellValue::Numeric(number),
        Err(_) => CellValue::Text(raw.to_string()),
    }
}

fn parse_numeric(raw: &str, operator: &str) -> CliResult<f64> {
    raw.parse().map_err(|_| {
        CliError::InvalidQuery(format!(
            "operator '{}' needs a numeric value, got '{}'",
            operator, raw
        ))
    })
}

/// Parses one `COL OP VAL` triplet
fn parse_condition(column: &str, operator: &str, value: &str) -> CliResult<Condition> {
    match operator {
        "=" => Ok(equals(column, parse_cell(value))),
        ">" => Ok(greater_than(column, parse_numeric(value, ">")?)),
        "<" => Ok(less_than(column, parse_numeric(value, "<")?)),
        "in" => {
            let parsed: Vec<serde_json::Value> = serde_json::from_str(value).map_err(|_| {
                CliError::InvalidQuery(format!(
                    "operator 'in' needs a JSON array, got '{}'",
                    value
                ))
            })?;
            let values = parsed
                .iter()
                .map(|v| match v {
                    serde_json::Value::Number(n) => {
                        Ok(CellValue::Numeric(n.as_f64().unwrap_or(0.0)))
                    }
                    serde_json::Value::String(s) => Ok(CellValue::Text(s.clone())),
                    other => Err(CliError::InvalidQuery(format!(
                        "unsupported 'in' element: {}",
                        other
                    ))),
                })
                .collect::<CliResult<Vec<CellValue>>>()?;
            Ok(part_of(column, values))
        }
        other => Err(CliError::InvalidQuery(format!(
            "unknown operator '{}'",
            other
        ))),
    }
}

fn parse_order(column: &str, direction: &str) -> CliResult<OrderSpec> {
    match direction {
        "asc" => Ok(ascending(column)),
        "dsc" | "desc" => Ok(descending(column)),
        other => Err(CliError::InvalidQuery(format!(
            "unknown sort direction '{}' (expected asc or dsc)",
            other
        ))),
    }
}

/// Parses the free-form tail of a `select` command
fn parse_select_clauses(table: &str, tokens: &[String]) -> CliResult<Query> {
    let mut query = select(table);
    let mut i = 0;

    let take = |i: &mut usize, what: &str| -> CliResult<String> {
        let token = tokens
            .get(*i)
            .ok_or_else(|| CliError::InvalidQuery(format!("expected {}", what)))?;
        *i += 1;
        Ok(token.clone())
    };

    while i < tokens.len() {
        match tokens[i].as_str() {
            "where" => {
                i += 1;
                loop {
                    let column = take(&mut i, "a column after 'where'")?;
                    let operator = take(&mut i, "an operator")?;
                    let value = take(&mut i, "a value")?;
                    query = query.filter(parse_condition(&column, &operator, &value)?);
                    if tokens.get(i).map(String::as_str) == Some("and") {
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            "orderby" => {
                i += 1;
                let column = take(&mut i, "a column after 'orderby'")?;
                let direction = take(&mut i, "a sort direction")?;
                query = query.order_by(parse_order(&column, &direction)?);
            }
            "limit" => {
                i += 1;
                let raw = take(&mut i, "a count after 'limit'")?;
                let limit: usize = raw.parse().map_err(|_| {
                    CliError::InvalidQuery(format!("invalid limit '{}'", raw))
                })?;
                query = query.limit_by(limit)?;
            }
            other => {
                return Err(CliError::InvalidQuery(format!(
                    "unexpected token '{}'",
                    other
                )))
            }
        }
    }
    Ok(query)
}
