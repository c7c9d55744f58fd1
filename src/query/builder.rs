//! Fluent query construction
//!
//! ```
//! use relaydb::query::{ascending, equals, greater_than, select};
//!
//! let query = select("users")
//!     .filter(greater_than("age", 30.0))
//!     .filter(equals("city", "berlin"))
//!     .order_by(ascending("age"))
//!     .limit_by(10)
//!     .unwrap();
//! assert_eq!(query.table(), "users");
//! ```

use crate::schema::CellValue;

use super::errors::{QueryError, QueryResult};

/// What a condition demands of a column's value
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match
    Equals(CellValue),
    /// Strictly greater than the bound (numeric columns only)
    GreaterThan(f64),
    /// Strictly less than the bound (numeric columns only)
    LessThan(f64),
    /// Match any of the listed values
    In(Vec<CellValue>),
}

impl Predicate {
    /// Operator spelling for diagnostics
    pub fn operator(&self) -> &'static str {
        match self {
            Predicate::Equals(_) => "=",
            Predicate::GreaterThan(_) => ">",
            Predicate::LessThan(_) => "<",
            Predicate::In(_) => "in",
        }
    }
}

/// One filter over one column
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    predicate: Predicate,
}

impl Condition {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

/// `column = value`
pub fn equals(column: &str, value: impl Into<CellValue>) -> Condition {
    Condition {
        column: column.to_string(),
        predicate: Predicate::Equals(value.into()),
    }
}

/// `column > bound`, strict
pub fn greater_than(column: &str, bound: f64) -> Condition {
    Condition {
        column: column.to_string(),
        predicate: Predicate::GreaterThan(bound),
    }
}

/// `column < bound`, strict
pub fn less_than(column: &str, bound: f64) -> Condition {
    Condition {
        column: column.to_string(),
        predicate: Predicate::LessThan(bound),
    }
}

/// `column in (values…)`
pub fn part_of(column: &str, values: Vec<CellValue>) -> Condition {
    Condition {
        column: column.to_string(),
        predicate: Predicate::In(values),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// How results are ordered
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    column: String,
    direction: Direction,
}

impl OrderSpec {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Sort ascending by `column`
pub fn ascending(column: &str) -> OrderSpec {
    OrderSpec {
        column: column.to_string(),
        direction: Direction::Ascending,
    }
}

/// Sort descending by `column`
pub fn descending(column: &str) -> OrderSpec {
    OrderSpec {
        column: column.to_string(),
        direction: Direction::Descending,
    }
}

/// A complete query over one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    conditions: Vec<Condition>,
    order: Option<OrderSpec>,
    /// Zero means unlimited
    limit: usize,
}

/// Starts a query over `table`
pub fn select(table: &str) -> Query {
    Query {
        table: table.to_string(),
        conditions: Vec::new(),
        order: None,
        limit: 0,
    }
}

impl Query {
    /// Adds a condition; all conditions must hold (conjunction)
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds several conditions at once
    pub fn filters(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Sets the result order
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    /// Caps the result count. Rejects zero at construction.
    pub fn limit_by(mut self, limit: usize) -> QueryResult<Self> {
        if limit == 0 {
            return Err(QueryError::InvalidLimit);
        }
        self.limit = limit;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&OrderSpec> {
        self.order.as_ref()
    }

    /// Result cap; zero means unlimited
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_clauses() {
        let query = select("users")
            .filter(greater_than("age", 30.0))
            .filter(equals("city", "berlin"))
            .order_by(descending("age"))
            .limit_by(5)
            .unwrap();

        assert_eq!(query.table(), "users");
        assert_eq!(query.conditions().len(), 2);
        assert_eq!(query.conditions()[0].column(), "age");
        assert_eq!(query.conditions()[0].predicate().operator(), ">");
        assert_eq!(query.order().unwrap().direction(), Direction::Descending);
        assert_eq!(query.limit(), 5);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let err = select("users").limit_by(0).unwrap_err();
        assert!(matches!(err, QueryError::InvalidLimit));
    }

    #[test]
    fn test_default_query_is_unbounded_scan() {
        let query = select("users");
        assert!(query.conditions().is_empty());
        assert!(query.order().is_none());
        assert_eq!(query.limit(), 0);
    }

    #[test]
    fn test_part_of_keeps_value_order() {
        let condition = part_of("age", vec![31.0.into(), 29.0.into()]);
        match condition.predicate() {
            Predicate::In(values) => {
                assert_eq!(values[0].as_numeric(), Some(31.0));
                assert_eq!(values[1].as_numeric(), Some(29.0));
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }
}
