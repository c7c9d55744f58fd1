//! Query model and execution

pub mod builder;
pub mod errors;
pub mod executor;
pub mod sorter;

pub use builder::{
    ascending, descending, equals, greater_than, less_than, part_of, select, Condition, Direction,
    OrderSpec, Predicate, Query,
};
pub use errors::{QueryError, QueryResult};
pub use executor::QueryExecutor;
