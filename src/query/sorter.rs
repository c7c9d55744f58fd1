//! Result ordering
//!
//! Records are sorted fully materialized, by the order column's declared
//! type: numeric columns compare as floats, text columns lexically. The
//! sort is stable, so ties keep their encounter order.

use crate::schema::ColumnType;
use crate::table::Record;

use super::builder::Direction;

/// Sorts records in place by `column`
pub fn sort_records(
    records: &mut [Record],
    column: &str,
    column_type: ColumnType,
    direction: Direction,
) {
    records.sort_by(|a, b| {
        let ordering = match column_type {
            ColumnType::Numeric => {
                let left = a.value(column).and_then(|v| v.as_numeric()).unwrap_or(0.0);
                let right = b.value(column).and_then(|v| v.as_numeric()).unwrap_or(0.0);
                left.total_cmp(&right)
            }
            ColumnType::Text => {
                let left = a.value(column).and_then(|v| v.as_text()).unwrap_or("");
                let right = b.value(column).and_then(|v| v.as_text()).unwrap_or("");
                left.cmp(right)
            }
        };
        match direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });
}
