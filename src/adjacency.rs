//! Row-adjacency classification.
//!
//! After the deterministic sort, each row is compared with its immediate
//! predecessor. A row scores 1 when all match fields are equal to the previous
//! row's (value and type; null never matches) and the formula's trigger holds,
//! and 0 otherwise. The first row always scores 0.

use itertools::Itertools;
use log::info;

use crate::{
    data::Cell,
    dataset::{ColumnRef, Row, TabularDataset},
    error::PipelineError,
};

/// Name of the derived 0/1 column.
pub const DERIVED_COLUMN: &str = "COUNT";

#[derive(Debug, Clone, PartialEq)]
pub enum AdjacencyFormulaKind {
    /// Match fields equal the previous row and a numeric field on the current
    /// row equals a fixed value.
    ExactMatchWithTrigger {
        match_fields: Vec<String>,
        trigger_field: String,
        trigger_value: f64,
    },
    /// Match fields equal the previous row and a categorical field (compared
    /// case-insensitively) moves from `previous` to `current`.
    CategoryTransition {
        match_fields: Vec<String>,
        category_field: String,
        previous: String,
        current: String,
    },
}

impl AdjacencyFormulaKind {
    pub fn match_fields(&self) -> &[String] {
        match self {
            AdjacencyFormulaKind::ExactMatchWithTrigger { match_fields, .. }
            | AdjacencyFormulaKind::CategoryTransition { match_fields, .. } => match_fields,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AdjacencyFormulaKind::ExactMatchWithTrigger {
                match_fields,
                trigger_field,
                trigger_value,
            } => format!(
                "same {} as previous row and {trigger_field} = {trigger_value}",
                match_fields.join(" + ")
            ),
            AdjacencyFormulaKind::CategoryTransition {
                match_fields,
                category_field,
                previous,
                current,
            } => format!(
                "same {} as previous row and {category_field} goes {previous} -> {current}",
                match_fields.join(" + ")
            ),
        }
    }

    fn resolve(&self, dataset: &TabularDataset) -> Result<ResolvedFormula, PipelineError> {
        let match_columns = dataset.require_columns(self.match_fields())?;
        let trigger = match self {
            AdjacencyFormulaKind::ExactMatchWithTrigger {
                trigger_field,
                trigger_value,
                ..
            } => Trigger::NumberEquals {
                column: dataset.require_columns(&[trigger_field])?[0],
                value: *trigger_value,
            },
            AdjacencyFormulaKind::CategoryTransition {
                category_field,
                previous,
                current,
                ..
            } => Trigger::CategoryTransition {
                column: dataset.require_columns(&[category_field])?[0],
                previous: previous.to_uppercase(),
                current: current.to_uppercase(),
            },
        };
        Ok(ResolvedFormula {
            match_columns,
            trigger,
        })
    }
}

#[derive(Debug)]
enum Trigger {
    NumberEquals {
        column: ColumnRef,
        value: f64,
    },
    CategoryTransition {
        column: ColumnRef,
        previous: String,
        current: String,
    },
}

fn folded(cell: &Cell) -> Option<String> {
    cell.as_text().map(str::to_uppercase)
}

impl Trigger {
    fn holds(&self, current: &Row, previous: &Row) -> bool {
        match self {
            Trigger::NumberEquals { column, value } => {
                current.get(*column).as_number() == Some(*value)
            }
            Trigger::CategoryTransition {
                column,
                previous: from,
                current: to,
            } => {
                folded(previous.get(*column)).as_deref() == Some(from.as_str())
                    && folded(current.get(*column)).as_deref() == Some(to.as_str())
            }
        }
    }
}

#[derive(Debug)]
struct ResolvedFormula {
    match_columns: Vec<ColumnRef>,
    trigger: Trigger,
}

impl ResolvedFormula {
    fn evaluate(&self, current: &Row, previous: Option<&Row>) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        self.match_columns
            .iter()
            .all(|column| current.get(*column).matches(previous.get(*column)))
            && self.trigger.holds(current, previous)
    }
}

/// Computes the derived flag for every row without touching the dataset.
pub fn derive_flags(
    dataset: &TabularDataset,
    formula: &AdjacencyFormulaKind,
) -> Result<Vec<bool>, PipelineError> {
    let resolved = formula.resolve(dataset)?;
    let rows = dataset.rows();
    let mut flags = Vec::with_capacity(rows.len());
    if let Some(first) = rows.first() {
        flags.push(resolved.evaluate(first, None));
    }
    flags.extend(
        rows.iter()
            .tuple_windows()
            .map(|(previous, current)| resolved.evaluate(current, Some(previous))),
    );
    Ok(flags)
}

/// Writes the derived [`DERIVED_COLUMN`] (0/1) onto the dataset, replacing a
/// previous run's values. Returns the number of rows flagged.
pub fn classify(
    dataset: &mut TabularDataset,
    formula: &AdjacencyFormulaKind,
) -> Result<usize, PipelineError> {
    let flags = derive_flags(dataset, formula)?;
    let flagged = flags.iter().filter(|flag| **flag).count();
    let values = flags
        .into_iter()
        .map(|flag| Cell::Number(if flag { 1.0 } else { 0.0 }))
        .collect();
    dataset.set_column(DERIVED_COLUMN, values);
    info!(
        "Flagged {flagged} of {} row(s) where {}",
        dataset.len(),
        formula.describe()
    );
    Ok(flagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{roadside_after_key_formula, vin_duplicate_formula};

    fn counts(dataset: &TabularDataset) -> Vec<String> {
        let count = dataset.column(DERIVED_COLUMN).unwrap();
        dataset
            .rows()
            .iter()
            .map(|row| row.get(count).as_display())
            .collect()
    }

    fn vin_rows(rows: &[[&str; 4]]) -> TabularDataset {
        let mut dataset = TabularDataset::from_cells(
            &["VIN", "TERM", "START DATE", "PRICE"],
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        );
        crate::sort::coerce_numeric_columns(&mut dataset, &["PRICE"]);
        dataset
    }

    #[test]
    fn identical_pair_flags_second_row() {
        let mut dataset = vin_rows(&[
            ["A1", "12", "2024-01-01", "1.6"],
            ["A1", "12", "2024-01-01", "1.6"],
        ]);
        assert_eq!(classify(&mut dataset, &vin_duplicate_formula()).unwrap(), 1);
        assert_eq!(counts(&dataset), vec!["0", "1"]);
    }

    #[test]
    fn trigger_price_must_match() {
        let mut dataset = vin_rows(&[
            ["A1", "12", "2024-01-01", "1.6"],
            ["A1", "12", "2024-01-01", "2.5"],
        ]);
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        assert_eq!(counts(&dataset), vec!["0", "0"]);
    }

    #[test]
    fn null_match_fields_never_match() {
        let mut dataset = vin_rows(&[["A1", "", "", "1.6"], ["A1", "", "", "1.6"]]);
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        assert_eq!(counts(&dataset), vec!["0", "0"]);
    }

    #[test]
    fn first_row_is_never_flagged() {
        let mut dataset = vin_rows(&[["A1", "12", "2024-01-01", "1.6"]]);
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        assert_eq!(counts(&dataset), vec!["0"]);
    }

    #[test]
    fn roadside_after_key_is_case_folded() {
        let mut dataset = TabularDataset::from_cells(
            &["Form", "VIN", "Pure Risk Type"],
            vec![
                vec![Cell::from("F1"), Cell::from("V1"), Cell::from("Key")],
                vec![Cell::from("F1"), Cell::from("V1"), Cell::from("roadside")],
                vec![Cell::from("F1"), Cell::from("V1"), Cell::from("Roadside")],
                vec![Cell::from("F1"), Cell::from("V2"), Cell::from("Key")],
                vec![Cell::from("F2"), Cell::from("V2"), Cell::from("Roadside")],
            ],
        );
        classify(&mut dataset, &roadside_after_key_formula()).unwrap();
        assert_eq!(counts(&dataset), vec!["0", "1", "0", "0", "0"]);
    }

    #[test]
    fn reclassifying_is_idempotent() {
        let mut dataset = vin_rows(&[
            ["A1", "12", "2024-01-01", "1.6"],
            ["A1", "12", "2024-01-01", "1.6"],
            ["A1", "12", "2024-01-01", "1.6"],
        ]);
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        let first = counts(&dataset);
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        assert_eq!(counts(&dataset), first);
        assert_eq!(dataset.headers().len(), 5);
    }

    #[test]
    fn empty_dataset_yields_no_flags() {
        let dataset = TabularDataset::from_cells(&["VIN", "TERM", "START DATE", "PRICE"], Vec::new());
        assert!(derive_flags(&dataset, &vin_duplicate_formula()).unwrap().is_empty());
    }
}
