//! Per-column value encoders for the tabular pipeline.
//!
//! The encode stage assigns one [`ColumnEncoder`] per column:
//!
//! - `Numeric` — parses the token as `f64`; a parse failure poisons the row.
//! - `Nominal` — one-hot over an alphabet. Declared values (from an ARFF
//!   header or a dataset descriptor) come first; values observed in the data
//!   but absent from the declaration are appended in first-appearance order,
//!   because real datasets routinely disagree with their own headers.
//! - `NominalAsStr` — categorical kept as its string token.
//! - `Text` — plain string pass-through.

use crate::error::{BenchError, BenchResult};
use crate::rows::Cell;

/// A semantic column type applied by the encode stage.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnEncoder {
    /// Parse tokens as `f64`.
    Numeric,
    /// One-hot encode over `values` plus any observed novel values.
    Nominal {
        /// Declared alphabet; may be empty, may disagree with the data.
        values: Vec<String>,
    },
    /// Keep categorical tokens as strings.
    NominalAsStr,
    /// String pass-through.
    Text,
}

impl ColumnEncoder {
    /// `true` when the encoder needs a full pass over the column before it
    /// can encode (one-hot width depends on the observed alphabet).
    pub fn needs_fit(&self) -> bool {
        matches!(self, ColumnEncoder::Nominal { .. })
    }

    /// Extend the declared alphabet with `observed` tokens in
    /// first-appearance order, skipping missing-value tokens.
    pub fn fitted_alphabet<'a, I>(&self, observed: I) -> Vec<String>
    where
        I: Iterator<Item = &'a str>,
    {
        let declared = match self {
            ColumnEncoder::Nominal { values } => values.clone(),
            _ => Vec::new(),
        };
        let mut alphabet = declared;
        for token in observed {
            if token.is_empty() || token == "?" {
                continue;
            }
            if !alphabet.iter().any(|v| v == token) {
                alphabet.push(token.to_string());
            }
        }
        alphabet
    }

    /// Encode one raw token. `alphabet` is required for `Nominal` and
    /// ignored otherwise.
    pub fn encode(&self, raw: &str, alphabet: Option<&[String]>) -> BenchResult<Cell> {
        match self {
            ColumnEncoder::Numeric => {
                let parsed: f64 = raw.trim().parse().map_err(|_| {
                    BenchError::environment(format!("could not parse '{raw}' as numeric"))
                })?;
                Ok(Cell::Num(parsed))
            }
            ColumnEncoder::Nominal { .. } => {
                let alphabet = alphabet.unwrap_or(&[]);
                let index = alphabet.iter().position(|v| v == raw).ok_or_else(|| {
                    BenchError::environment(format!("nominal value '{raw}' not in alphabet"))
                })?;
                Ok(Cell::Hot(one_hot(index, alphabet.len())))
            }
            ColumnEncoder::NominalAsStr | ColumnEncoder::Text => Ok(Cell::Str(raw.to_string())),
        }
    }
}

/// A unit vector of `width` components with `1.0` at `index`.
pub fn one_hot(index: usize, width: usize) -> Vec<f64> {
    let mut v = vec![0.0; width];
    v[index] = 1.0;
    v
}
