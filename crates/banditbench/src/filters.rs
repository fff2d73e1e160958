//! Row-level pipeline stages: drop, reservoir, default, encode, structure.
//!
//! These are the five stages the tabular environment pipeline composes, in
//! that order. Drop, default and structure are fully streaming; reservoir
//! materializes by definition and encode materializes only when a one-hot
//! column must be fitted against the observed data.
//!
//! Error items short-circuit: a stage that must materialize stops at the
//! first error and yields only that error, which ultimately fails the one
//! environment being read.

use std::sync::Arc;

use crate::encoders::ColumnEncoder;
use crate::error::{BenchError, BenchResult};
use crate::pipes::{BoxIter, Filter};
use crate::random::LcgRandom;
use crate::rows::{Cell, LabeledRow, Row, RowItem};

/// A shared row predicate used by [`DropFilter`] to discard rows.
pub type RowPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

// ── Drop ─────────────────────────────────────────────────────────────────────

/// Removes named columns and optionally discards whole rows by predicate.
///
/// The predicate sees the row after column removal, so a missing value in a
/// dropped column does not discard the row.
pub struct DropFilter {
    drop_cols: Vec<String>,
    drop_row: Option<RowPredicate>,
}

impl DropFilter {
    pub fn new(drop_cols: Vec<String>) -> Self {
        DropFilter { drop_cols, drop_row: None }
    }

    pub fn with_row_predicate(mut self, predicate: RowPredicate) -> Self {
        self.drop_row = Some(predicate);
        self
    }

    /// The standard missing-data predicate: discard any row containing an
    /// empty string or `"?"`.
    pub fn missing_values() -> RowPredicate {
        Arc::new(|row: &Row| row.cells().iter().any(Cell::is_missing))
    }
}

impl Filter<RowItem, RowItem> for DropFilter {
    fn filter(&self, items: BoxIter<RowItem>) -> BoxIter<RowItem> {
        let drop_cols = self.drop_cols.clone();
        let drop_row = self.drop_row.clone();
        let mut plan: Option<(Vec<usize>, Arc<Vec<String>>)> = None;

        Box::new(items.filter_map(move |item| {
            let row = match item {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let (keep, new_headers) = plan.get_or_insert_with(|| {
                let keep: Vec<usize> = row
                    .headers()
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| !drop_cols.contains(h))
                    .map(|(i, _)| i)
                    .collect();
                let names = keep.iter().map(|&i| row.headers()[i].clone()).collect();
                (keep, Arc::new(names))
            });
            let projected = row.project(keep, Arc::clone(new_headers));
            if let Some(pred) = &drop_row {
                if pred(&projected) {
                    return None;
                }
            }
            Some(Ok(projected))
        }))
    }
}

// ── Reservoir ────────────────────────────────────────────────────────────────

/// Algorithm R reservoir sampling: at most `take` items drawn uniformly from
/// an unknown-length stream, deterministic under `seed`.
///
/// With `keep_first` the first element is pinned into slot 0 and the rest of
/// the stream is sampled into the remaining slots, for callers that need a
/// stable canonical exemplar. `take = None` passes the stream through.
pub struct Reservoir {
    take: Option<usize>,
    seed: u64,
    keep_first: bool,
}

impl Reservoir {
    pub fn new(take: Option<usize>, seed: u64) -> Self {
        Reservoir { take, seed, keep_first: false }
    }

    pub fn keep_first(mut self) -> Self {
        self.keep_first = true;
        self
    }
}

impl<T: Send + 'static> Filter<BenchResult<T>, BenchResult<T>> for Reservoir {
    fn filter(&self, items: BoxIter<BenchResult<T>>) -> BoxIter<BenchResult<T>> {
        let take = match self.take {
            Some(take) => take,
            None => return items,
        };
        if take == 0 {
            return Box::new(std::iter::empty());
        }

        let mut rng = LcgRandom::from_seed(self.seed);
        let mut items = items;

        let mut pinned: Option<T> = None;
        if self.keep_first {
            match items.next() {
                Some(Ok(first)) => pinned = Some(first),
                Some(Err(e)) => return Box::new(std::iter::once(Err(e))),
                None => return Box::new(std::iter::empty()),
            }
        }

        let slots = take - usize::from(pinned.is_some());
        let mut reservoir: Vec<T> = Vec::with_capacity(slots);
        for (i, item) in items.enumerate() {
            let value = match item {
                Ok(value) => value,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            if reservoir.len() < slots {
                reservoir.push(value);
            } else {
                let j = rng.randint(0, i as i64) as usize;
                if j < slots {
                    reservoir[j] = value;
                }
            }
        }

        Box::new(pinned.into_iter().chain(reservoir).map(Ok))
    }
}

// ── Default ──────────────────────────────────────────────────────────────────

/// Fills listed columns with a default token when their value is missing.
pub struct DefaultFilter {
    defaults: Vec<(String, String)>,
}

impl DefaultFilter {
    pub fn new(defaults: Vec<(String, String)>) -> Self {
        DefaultFilter { defaults }
    }
}

impl Filter<RowItem, RowItem> for DefaultFilter {
    fn filter(&self, items: BoxIter<RowItem>) -> BoxIter<RowItem> {
        let defaults = self.defaults.clone();
        Box::new(items.map(move |item| {
            let mut row = item?;
            for (name, value) in &defaults {
                let missing = row.get(name).map(Cell::is_missing).unwrap_or(false);
                if missing {
                    row.set(name, Cell::Raw(value.clone()));
                }
            }
            Ok(row)
        }))
    }
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Applies one [`ColumnEncoder`] per column; columns without an assigned
/// encoder pass through as strings.
///
/// Streams unless a nominal column is present, in which case the stage
/// materializes once to fit the one-hot alphabets (declared values first,
/// then observed novel values in first-appearance order).
pub struct EncodeFilter {
    encoders: Vec<(String, ColumnEncoder)>,
}

impl EncodeFilter {
    pub fn new(encoders: Vec<(String, ColumnEncoder)>) -> Self {
        EncodeFilter { encoders }
    }

    fn encoder_for(&self, name: &str) -> &ColumnEncoder {
        self.encoders
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
            .unwrap_or(&ColumnEncoder::Text)
    }
}

fn encode_row(
    row: Row,
    encoders: &[(ColumnEncoder, Option<Vec<String>>)],
) -> BenchResult<Row> {
    let headers = Arc::clone(row.headers());
    let mut cells = Vec::with_capacity(row.cells().len());
    for (i, cell) in row.cells().iter().enumerate() {
        let (encoder, alphabet) = &encoders[i];
        match cell {
            Cell::Raw(token) => cells.push(encoder.encode(token, alphabet.as_deref())?),
            already_typed => cells.push(already_typed.clone()),
        }
    }
    Row::new(headers, cells)
}

impl Filter<RowItem, RowItem> for EncodeFilter {
    fn filter(&self, items: BoxIter<RowItem>) -> BoxIter<RowItem> {
        // Materialize to fit alphabets; the first error wins.
        let rows: Vec<Row> = match items.collect::<BenchResult<Vec<Row>>>() {
            Ok(rows) => rows,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        let Some(first) = rows.first() else {
            return Box::new(std::iter::empty());
        };

        // Resolve the per-column encoder plan once, fitting nominal columns
        // against the observed data.
        let plan: Vec<(ColumnEncoder, Option<Vec<String>>)> = first
            .headers()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let encoder = self.encoder_for(name).clone();
                let alphabet = encoder.needs_fit().then(|| {
                    encoder.fitted_alphabet(
                        rows.iter().filter_map(|r| r.cells()[i].as_text()),
                    )
                });
                (encoder, alphabet)
            })
            .collect();

        Box::new(rows.into_iter().map(move |row| encode_row(row, &plan)))
    }
}

// ── Structure ────────────────────────────────────────────────────────────────

/// Reshapes each row into `[features, label]` by extracting the named
/// target column.
pub struct StructureFilter {
    label: String,
}

impl StructureFilter {
    pub fn new(label: impl Into<String>) -> Self {
        StructureFilter { label: label.into() }
    }
}

impl Filter<RowItem, BenchResult<LabeledRow>> for StructureFilter {
    fn filter(&self, items: BoxIter<RowItem>) -> BoxIter<BenchResult<LabeledRow>> {
        let label = self.label.clone();
        let mut plan: Option<(usize, Vec<usize>, Arc<Vec<String>>)> = None;

        Box::new(items.map(move |item| {
            let row = item?;
            if plan.is_none() {
                let label_index = row.index_of(&label).ok_or_else(|| {
                    BenchError::environment(format!("target column '{label}' not found"))
                })?;
                let keep: Vec<usize> =
                    (0..row.headers().len()).filter(|&i| i != label_index).collect();
                let names = keep.iter().map(|&i| row.headers()[i].clone()).collect();
                plan = Some((label_index, keep, Arc::new(names)));
            }
            let (label_index, keep, new_headers) = plan.as_ref().expect("plan set above");
            let label_cell = row.cells()[*label_index].clone();
            let features = row.project(keep, Arc::clone(new_headers));
            Ok(LabeledRow { features, label: label_cell })
        }))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
