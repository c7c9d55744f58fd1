//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Schema-lite tables on a remote blob store
#[derive(Debug, Parser)]
#[command(name = "relaydb", version, about)]
pub struct Cli {
    /// Path to a JSON config file (environment variables override it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a table, schema, or index
    Create {
        #[command(subcommand)]
        target: CreateTarget,
    },

    /// Inspect stored definitions
    Get {
        #[command(subcommand)]
        target: GetTarget,
    },

    /// Insert a record: alternating column/value pairs covering the
    /// whole schema
    Insert {
        table: String,
        #[arg(num_args = 2.., value_names = ["COLUMN", "VALUE"])]
        pairs: Vec<String>,
    },

    /// Query records: `[where COL OP VAL [and …]] [orderby COL asc|dsc]
    /// [limit N]`
    Select {
        table: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        clauses: Vec<String>,
    },

    /// Rewrite a record's values
    Update {
        table: String,
        record_id: String,
        #[arg(num_args = 2.., value_names = ["COLUMN", "VALUE"])]
        pairs: Vec<String>,
    },

    /// Delete a record
    Delete { table: String, record_id: String },
}

#[derive(Debug, Subcommand)]
pub enum CreateTarget {
    /// Create an empty table (and its metadata container)
    Table { name: String },

    /// Define the table's schema: alternating column/type pairs
    /// (`num|numeric` or `str|text`)
    Schema {
        table: String,
        #[arg(num_args = 2.., value_names = ["COLUMN", "TYPE"])]
        pairs: Vec<String>,
    },

    /// Build the first index for a column
    Index { table: String, column: String },
}

#[derive(Debug, Subcommand)]
pub enum GetTarget {
    /// Print the table's schema
    Schema { table: String },
}
