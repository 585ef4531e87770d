//! Stable multi-key sorting.
//!
//! Adjacency formulas compare each row with the one before it, so the order
//! must be fully deterministic: `Vec::sort_by` is stable, which keeps rows
//! with equal keys in their current relative order. Nulls sort after every
//! real value in both directions.

use std::cmp::Ordering;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    data::{Cell, ComparableCell},
    dataset::{ColumnRef, Row, TabularDataset},
    error::PipelineError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(column: &str) -> Self {
        SortKey {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        SortKey {
            column: column.to_string(),
            ascending: false,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{}:{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct SortInstruction {
    column: ColumnRef,
    ascending: bool,
}

/// Converts the listed columns to numbers; cells that fail to parse become
/// null so they take the null sort position instead of raising.
pub fn coerce_numeric_columns<S: AsRef<str>>(dataset: &mut TabularDataset, columns: &[S]) {
    for name in columns {
        let Some(column) = dataset.column(name.as_ref()) else {
            continue;
        };
        let mut coerced_to_null = 0usize;
        for row in dataset.rows_mut().iter_mut() {
            let cell = row.get_mut(column);
            let was_null = cell.is_null();
            cell.coerce_numeric();
            if !was_null && cell.is_null() {
                coerced_to_null += 1;
            }
        }
        if coerced_to_null > 0 {
            debug!(
                "{coerced_to_null} value(s) in column '{}' are not numeric and sort as missing",
                name.as_ref()
            );
        }
    }
}

/// Orders two cells for one sort key. Nulls come last in either direction.
pub fn compare_cells(left: &Cell, right: &Cell, ascending: bool) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = ComparableCell(left).cmp(&ComparableCell(right));
            if ascending { ord } else { ord.reverse() }
        }
    }
}

fn compare_rows(a: &Row, b: &Row, plan: &[SortInstruction]) -> Ordering {
    for directive in plan {
        let ord = compare_cells(a.get(directive.column), b.get(directive.column), directive.ascending);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Sorts the dataset in place by `keys`, in order of precedence.
pub fn sort_dataset(dataset: &mut TabularDataset, keys: &[SortKey]) -> Result<(), PipelineError> {
    if keys.is_empty() {
        return Ok(());
    }
    let names = keys.iter().map(|k| k.column.as_str()).collect_vec();
    let columns = dataset.require_columns(&names)?;
    let plan = columns
        .into_iter()
        .zip(keys)
        .map(|(column, key)| SortInstruction {
            column,
            ascending: key.ascending,
        })
        .collect_vec();
    info!(
        "Sorting {} row(s) by {}",
        dataset.len(),
        keys.iter().map(SortKey::describe).join(", ")
    );
    dataset.rows_mut().sort_by(|a, b| compare_rows(a, b, &plan));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: &[(&str, &str, usize)]) -> TabularDataset {
        TabularDataset::from_cells(
            &["VIN", "PRICE", "TAG"],
            rows.iter()
                .map(|(vin, price, tag)| {
                    vec![Cell::from(*vin), Cell::from(*price), Cell::Number(*tag as f64)]
                })
                .collect(),
        )
    }

    fn tags(dataset: &TabularDataset) -> Vec<String> {
        let tag = dataset.column("TAG").unwrap();
        dataset
            .rows()
            .iter()
            .map(|row| row.get(tag).as_display())
            .collect()
    }

    #[test]
    fn multi_key_sort_mixes_directions() {
        let mut data = dataset(&[
            ("B", "1.6", 0),
            ("A", "2", 1),
            ("A", "10", 2),
            ("B", "5", 3),
        ]);
        coerce_numeric_columns(&mut data, &["PRICE"]);
        sort_dataset(&mut data, &[SortKey::asc("VIN"), SortKey::desc("PRICE")]).unwrap();
        assert_eq!(tags(&data), vec!["2", "1", "3", "0"]);
    }

    #[test]
    fn equal_keys_keep_their_relative_order() {
        let mut data = dataset(&[("A", "1", 0), ("B", "1", 1), ("A", "1", 2), ("A", "1", 3)]);
        sort_dataset(&mut data, &[SortKey::asc("VIN")]).unwrap();
        assert_eq!(tags(&data), vec!["0", "2", "3", "1"]);
    }

    #[test]
    fn unparseable_numbers_sort_last_in_both_directions() {
        let mut data = dataset(&[("A", "oops", 0), ("A", "3", 1), ("A", "7", 2)]);
        coerce_numeric_columns(&mut data, &["PRICE"]);
        sort_dataset(&mut data, &[SortKey::desc("PRICE")]).unwrap();
        assert_eq!(tags(&data), vec!["2", "1", "0"]);
        sort_dataset(&mut data, &[SortKey::asc("PRICE")]).unwrap();
        assert_eq!(tags(&data), vec!["1", "2", "0"]);
    }

    #[test]
    fn unknown_sort_column_is_a_missing_column() {
        let mut data = dataset(&[("A", "1", 0)]);
        let err = sort_dataset(&mut data, &[SortKey::asc("TERM")]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumns(_)));
    }
}
