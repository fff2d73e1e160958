//! The row/cell data model shared by the tabular pipeline stages.
//!
//! Readers emit [`Row`]s of [`Cell::Raw`] values; the encode stage replaces
//! them with typed cells; the structure stage splits each row into a
//! [`LabeledRow`]. Header names are shared across all rows of a stream via
//! `Arc`, so per-row storage is just the dense cell vector.

use std::sync::Arc;

use crate::error::{BenchError, BenchResult};

/// One value inside a row.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// An unencoded token exactly as read from the source.
    Raw(String),
    /// A numeric value produced by the numeric encoder.
    Num(f64),
    /// A string value (string pass-through or categorical-as-string).
    Str(String),
    /// A one-hot vector produced by the nominal encoder.
    Hot(Vec<f64>),
}

impl Cell {
    /// `true` for the tokens the pipeline treats as missing data:
    /// the empty string and `"?"`.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Raw(s) | Cell::Str(s) => s.is_empty() || s == "?",
            _ => false,
        }
    }

    /// The textual content of a raw or string cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Raw(s) | Cell::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A row: shared headers plus one dense cell per header.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    headers: Arc<Vec<String>>,
    cells: Vec<Cell>,
}

impl Row {
    /// Build a row, checking that the cell count matches the header count.
    pub fn new(headers: Arc<Vec<String>>, cells: Vec<Cell>) -> BenchResult<Row> {
        if headers.len() != cells.len() {
            return Err(BenchError::environment(format!(
                "row has {} values but {} columns were declared",
                cells.len(),
                headers.len()
            )));
        }
        Ok(Row { headers, cells })
    }

    pub fn headers(&self) -> &Arc<Vec<String>> {
        &self.headers
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Index of a named column, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// The cell under a named column, if present.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.index_of(name).map(|i| &self.cells[i])
    }

    /// Replace the cell under a named column. Returns `false` when the
    /// column does not exist.
    pub fn set(&mut self, name: &str, cell: Cell) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Replace the cell at a positional index.
    pub fn set_at(&mut self, index: usize, cell: Cell) {
        self.cells[index] = cell;
    }

    /// Project the row onto `keep` (column indexes into the current headers),
    /// attaching the pre-computed projected header set.
    ///
    /// Filters compute `keep` and `new_headers` once per stream so the per-row
    /// cost is a plain gather.
    pub fn project(&self, keep: &[usize], new_headers: Arc<Vec<String>>) -> Row {
        let cells = keep.iter().map(|&i| self.cells[i].clone()).collect();
        Row { headers: new_headers, cells }
    }
}

/// A row reshaped into `[features, label]` by the structure stage.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledRow {
    /// Every non-label column, in the original order.
    pub features: Row,
    /// The extracted target cell.
    pub label: Cell,
}

/// The item type flowing through tabular pipeline stages.
pub type RowItem = BenchResult<Row>;

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Arc<Vec<String>> {
        Arc::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_new_checks_arity() {
        let h = headers(&["a", "b"]);
        assert!(Row::new(Arc::clone(&h), vec![Cell::Raw("1".into())]).is_err());
        assert!(Row::new(h, vec![Cell::Raw("1".into()), Cell::Raw("2".into())]).is_ok());
    }

    #[test]
    fn test_get_and_set_by_name() {
        let h = headers(&["a", "b"]);
        let mut row =
            Row::new(h, vec![Cell::Raw("1".into()), Cell::Raw("2".into())]).expect("row");
        assert_eq!(row.get("b"), Some(&Cell::Raw("2".into())));
        assert!(row.set("b", Cell::Num(2.0)));
        assert_eq!(row.get("b"), Some(&Cell::Num(2.0)));
        assert!(!row.set("missing", Cell::Num(0.0)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_project_keeps_selected_columns() {
        let h = headers(&["a", "b", "c"]);
        let row = Row::new(
            h,
            vec![Cell::Raw("1".into()), Cell::Raw("2".into()), Cell::Raw("3".into())],
        )
        .expect("row");
        let new_h = headers(&["a", "c"]);
        let projected = row.project(&[0, 2], new_h);
        assert_eq!(projected.cells(), &[Cell::Raw("1".into()), Cell::Raw("3".into())]);
        assert_eq!(projected.headers().as_slice(), &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_missing_tokens() {
        assert!(Cell::Raw("".into()).is_missing());
        assert!(Cell::Raw("?".into()).is_missing());
        assert!(Cell::Str("?".into()).is_missing());
        assert!(!Cell::Raw("0".into()).is_missing());
        assert!(!Cell::Num(0.0).is_missing());
        assert!(!Cell::Hot(vec![1.0]).is_missing());
    }
}
