//! relaydb: schema-lite tables on a remote, rate-limited blob store
//!
//! Records live as items in a table container; the paired `<table>_idx`
//! metadata container holds the schema and the secondary index shards.
//! Queries resolve conditions against the shards first and fetch only
//! the surviving records, so the table is scanned only when no filter is
//! given.
//!
//! ```no_run
//! use relaydb::backend::HttpStore;
//! use relaydb::config::Config;
//! use relaydb::query::{greater_than, select};
//! use relaydb::table::DbClient;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::resolve(None)?;
//! let client = DbClient::new(HttpStore::new(&config));
//! let adults = client
//!     .read(&select("users").filter(greater_than("age", 17.0)))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod index;
pub mod observability;
pub mod query;
pub mod schema;
pub mod table;
