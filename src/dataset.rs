//! In-memory tabular dataset with canonical column keys.
//!
//! Column lookups use the *canonical* form of a header (trimmed, uppercase).
//! The [`HeaderMap`] keeps the first-seen original spelling of each column so
//! exports can restore it; canonical keys are an internal detail.

use std::collections::HashMap;

use crate::{data::Cell, error::PipelineError};

/// Canonical lookup form of a header name.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Bidirectional mapping between canonical column keys and the header
/// spelling observed in the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    canonical: Vec<String>,
    original: Vec<String>,
    index: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut map = HeaderMap::default();
        for header in headers {
            map.push(header.as_ref().trim());
        }
        map
    }

    fn push(&mut self, original: &str) -> usize {
        let canonical = canonical_name(original);
        let position = self.canonical.len();
        // Duplicate canonical names keep their slot, but lookups resolve to
        // the first one.
        self.index.entry(canonical.clone()).or_insert(position);
        self.canonical.push(canonical);
        self.original.push(original.to_string());
        position
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn canonical(&self) -> &[String] {
        &self.canonical
    }

    pub fn original(&self) -> &[String] {
        &self.original
    }

    pub fn lookup(&self, name: &str) -> Option<ColumnRef> {
        self.index.get(&canonical_name(name)).copied().map(ColumnRef)
    }

    pub fn original_at(&self, column: ColumnRef) -> &str {
        &self.original[column.0]
    }
}

/// Position of a column whose presence has already been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef(usize);

impl ColumnRef {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based line in the source file where the row starts. For workbooks
    /// this is the sheet row, so it follows any blank rows above the header.
    pub line: usize,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<Cell>) -> Self {
        Row { line, cells }
    }

    pub fn get(&self, column: ColumnRef) -> &Cell {
        &self.cells[column.0]
    }

    pub fn get_mut(&mut self, column: ColumnRef) -> &mut Cell {
        &mut self.cells[column.0]
    }

    /// Cell for an optional column; absent columns read as null.
    pub fn get_or_null(&self, column: Option<ColumnRef>) -> &Cell {
        const NULL: &Cell = &Cell::Null;
        column.map(|c| self.get(c)).unwrap_or(NULL)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularDataset {
    headers: HeaderMap,
    rows: Vec<Row>,
}

impl TabularDataset {
    /// Builds a dataset, padding short rows with nulls so every row covers
    /// the full column set.
    pub fn new(headers: HeaderMap, rows: Vec<Row>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.cells.resize(width, Cell::Null);
                row
            })
            .collect();
        TabularDataset { headers, rows }
    }

    /// Convenience constructor with lines numbered from 2.
    pub fn from_cells<S: AsRef<str>>(headers: &[S], rows: Vec<Vec<Cell>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| Row::new(idx + 2, cells))
            .collect();
        TabularDataset::new(HeaderMap::from_headers(headers), rows)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<ColumnRef> {
        self.headers.lookup(name)
    }

    /// Resolves every name or reports all of the missing ones at once.
    pub fn require_columns<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ColumnRef>, PipelineError> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column(name.as_ref()) {
                Some(column) => resolved.push(column),
                None => missing.push(canonical_name(name.as_ref())),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(PipelineError::MissingColumns(missing))
        }
    }

    /// Adds a derived column (or reuses an existing one with the same
    /// canonical name) and fills it from `values`.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> ColumnRef {
        debug_assert_eq!(values.len(), self.rows.len());
        let column = match self.headers.lookup(name) {
            Some(column) => column,
            None => {
                let idx = self.headers.push(name);
                for row in &mut self.rows {
                    row.cells.push(Cell::Null);
                }
                ColumnRef(idx)
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            *row.get_mut(column) = value;
        }
        column
    }

    /// Keeps only the listed columns, in the listed order.
    pub fn project(&self, columns: &[ColumnRef]) -> TabularDataset {
        let mut headers = HeaderMap::default();
        for column in columns {
            headers.push(self.headers.original_at(*column));
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Row::new(
                    row.line,
                    columns.iter().map(|c| row.get(*c).clone()).collect(),
                )
            })
            .collect();
        TabularDataset { headers, rows }
    }

    /// Rows for which `keep` returns true, with the same header map.
    pub fn filter_rows<F>(&self, mut keep: F) -> TabularDataset
    where
        F: FnMut(&Row) -> bool,
    {
        TabularDataset {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Rows keyed by canonical column name, for comparisons in tests and
    /// round-trip checks.
    pub fn canonical_rows(&self) -> Vec<Vec<(String, Cell)>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .canonical()
                    .iter()
                    .cloned()
                    .zip(row.cells.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_map_keeps_first_original_spelling() {
        let headers = HeaderMap::from_headers(&[" Vin ", "Start Date", "VIN"]);
        assert_eq!(headers.canonical(), &["VIN", "START DATE", "VIN"]);
        let vin = headers.lookup("VIN").unwrap();
        assert_eq!(headers.original_at(vin), "Vin");
        assert_eq!(headers.lookup("start date").map(ColumnRef::index), Some(1));
        assert_eq!(headers.lookup("vin").map(ColumnRef::index), Some(0));
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let dataset = TabularDataset::from_cells(&["A", "B"], vec![vec![Cell::from("x")]]);
        let b = dataset.column("b").expect("column b");
        assert_eq!(dataset.rows()[0].get(b), &Cell::Null);
        assert_eq!(dataset.rows()[0].line, 2);
    }

    #[test]
    fn require_columns_reports_every_gap() {
        let dataset = TabularDataset::from_cells(&["VIN"], Vec::new());
        let err = dataset
            .require_columns(&["VIN", "term", "Price"])
            .expect_err("missing columns");
        match err {
            PipelineError::MissingColumns(missing) => assert_eq!(missing, vec!["TERM", "PRICE"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn set_column_overwrites_existing_derived_column() {
        let mut dataset =
            TabularDataset::from_cells(&["A"], vec![vec![Cell::from("1")], vec![Cell::from("2")]]);
        dataset.set_column("COUNT", vec![Cell::Number(0.0), Cell::Number(1.0)]);
        dataset.set_column("count", vec![Cell::Number(1.0), Cell::Number(1.0)]);
        assert_eq!(dataset.headers().len(), 2);
        let count = dataset.column("COUNT").expect("count column");
        assert_eq!(dataset.rows()[0].get(count), &Cell::Number(1.0));
    }
}
