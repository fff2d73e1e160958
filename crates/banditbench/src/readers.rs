//! Streaming CSV and ARFF tokenizers.
//!
//! Both readers are [`Filter`]s from text lines to [`Row`]s, so they compose
//! directly with the cache byte stream (decoded upstream) and the row
//! filters downstream. Rows are produced lazily, one per input line.
//!
//! The CSV dialect is configurable because the two wire formats this engine
//! consumes disagree: plain CSV uses `"` quotes with RFC-4180 doubled-quote
//! escaping, while ARFF payloads use `'` quotes with backslash escapes and
//! no doubling.

use std::sync::Arc;

use crate::error::{BenchError, BenchResult};
use crate::pipes::{BoxIter, Filter};
use crate::rows::{Cell, Row, RowItem};

// ── Dialect ──────────────────────────────────────────────────────────────────

/// Tokenizer configuration.
#[derive(Clone, Debug)]
pub struct CsvDialect {
    /// Field separator.
    pub delimiter: char,
    /// Quote character; `None` disables quoting entirely.
    pub quote: Option<char>,
    /// Escape character; the following character is taken literally.
    pub escape: Option<char>,
    /// When `true`, a doubled quote inside a quoted field is a literal quote.
    pub double_quote: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        CsvDialect { delimiter: ',', quote: Some('"'), escape: None, double_quote: true }
    }
}

impl CsvDialect {
    /// The dialect used by OpenML payloads: single-quote quoting, backslash
    /// escapes, no quote doubling.
    pub fn openml() -> Self {
        CsvDialect { delimiter: ',', quote: Some('\''), escape: Some('\\'), double_quote: false }
    }
}

/// Split one line into fields according to `dialect`.
///
/// Delimiters inside quotes are literal; quote characters are not part of
/// the field value. An unterminated quoted field is an error.
pub fn split_line(line: &str, dialect: &CsvDialect) -> BenchResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(esc) = dialect.escape {
            if ch == esc {
                match chars.next() {
                    Some(next) => field.push(next),
                    None => field.push(ch),
                }
                continue;
            }
        }
        if let Some(quote) = dialect.quote {
            if ch == quote {
                if in_quotes && dialect.double_quote && chars.peek() == Some(&quote) {
                    chars.next();
                    field.push(quote);
                } else {
                    in_quotes = !in_quotes;
                }
                continue;
            }
        }
        if ch == dialect.delimiter && !in_quotes {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(ch);
        }
    }

    if in_quotes {
        return Err(BenchError::environment(format!("unterminated quoted field in line: {line}")));
    }

    fields.push(field);
    Ok(fields)
}

/// Strip whitespace and one layer of surrounding quotes from a header name.
fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')).unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(trimmed);
    trimmed.to_string()
}

// ── CSV reader ───────────────────────────────────────────────────────────────

/// A streaming CSV tokenizer.
///
/// With `has_header` the first non-empty line provides column names;
/// without it, columns are named by their zero-based position.
pub struct CsvReader {
    pub has_header: bool,
    pub dialect: CsvDialect,
}

impl CsvReader {
    pub fn new(has_header: bool, dialect: CsvDialect) -> Self {
        CsvReader { has_header, dialect }
    }
}

impl Filter<BenchResult<String>, RowItem> for CsvReader {
    fn filter(&self, items: BoxIter<BenchResult<String>>) -> BoxIter<RowItem> {
        Box::new(CsvIter {
            inner: items,
            dialect: self.dialect.clone(),
            has_header: self.has_header,
            headers: None,
            poisoned: false,
        })
    }
}

struct CsvIter {
    inner: BoxIter<BenchResult<String>>,
    dialect: CsvDialect,
    has_header: bool,
    headers: Option<Arc<Vec<String>>>,
    poisoned: bool,
}

impl Iterator for CsvIter {
    type Item = RowItem;

    fn next(&mut self) -> Option<RowItem> {
        if self.poisoned {
            return None;
        }
        loop {
            let line = match self.inner.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(e));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let fields = match split_line(&line, &self.dialect) {
                Ok(fields) => fields,
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(e));
                }
            };
            match &self.headers {
                None if self.has_header => {
                    self.headers = Some(Arc::new(fields.iter().map(|f| clean_name(f)).collect()));
                    continue;
                }
                None => {
                    let names = (0..fields.len()).map(|i| i.to_string()).collect();
                    self.headers = Some(Arc::new(names));
                }
                Some(_) => {}
            }
            let headers = Arc::clone(self.headers.as_ref().expect("headers set above"));
            let cells = fields.into_iter().map(Cell::Raw).collect();
            return Some(match Row::new(headers, cells) {
                Ok(row) => Ok(row),
                Err(e) => {
                    self.poisoned = true;
                    Err(e)
                }
            });
        }
    }
}

// ── ARFF reader ──────────────────────────────────────────────────────────────

/// The declared type of one ARFF attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum ArffType {
    Numeric,
    /// Nominal with the values listed in the header. The listed values may
    /// disagree with the data; downstream encoding accepts observed values
    /// that are missing from this list.
    Nominal(Vec<String>),
    Text,
}

/// One `@attribute` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ArffAttribute {
    pub name: String,
    pub kind: ArffType,
}

/// A streaming ARFF parser.
///
/// Parses `@attribute` declarations and tokenizes `@data` rows with the
/// configured dialect. In `skip_encoding` mode every value stays a raw
/// string and the declared types are left for the downstream encode stage;
/// otherwise numeric attributes parse to numbers and everything else stays
/// a string (one-hot fitting is the encode stage's job either way).
pub struct ArffReader {
    pub skip_encoding: bool,
    pub dialect: CsvDialect,
}

impl ArffReader {
    pub fn new(skip_encoding: bool, dialect: CsvDialect) -> Self {
        ArffReader { skip_encoding, dialect }
    }
}

impl Filter<BenchResult<String>, RowItem> for ArffReader {
    fn filter(&self, items: BoxIter<BenchResult<String>>) -> BoxIter<RowItem> {
        Box::new(ArffIter {
            inner: items,
            dialect: self.dialect.clone(),
            skip_encoding: self.skip_encoding,
            attributes: Vec::new(),
            headers: None,
            in_data: false,
            poisoned: false,
        })
    }
}

/// Parse the remainder of an `@attribute` line into a declaration.
fn parse_attribute(rest: &str) -> BenchResult<ArffAttribute> {
    let rest = rest.trim();
    let (name, type_decl) = if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.chars().next().expect("non-empty checked above");
        let body = &rest[quote.len_utf8()..];
        let end = body.find(quote).ok_or_else(|| {
            BenchError::environment(format!("unterminated attribute name: {rest}"))
        })?;
        (body[..end].to_string(), body[end + quote.len_utf8()..].trim())
    } else {
        match rest.split_once(char::is_whitespace) {
            Some((name, decl)) => (name.to_string(), decl.trim()),
            None => {
                return Err(BenchError::environment(format!(
                    "attribute declaration without a type: {rest}"
                )))
            }
        }
    };

    let kind = if type_decl.starts_with('{') {
        let inner = type_decl
            .strip_prefix('{')
            .and_then(|s| s.trim_end().strip_suffix('}'))
            .ok_or_else(|| {
                BenchError::environment(format!("malformed nominal declaration: {type_decl}"))
            })?;
        let values = inner.split(',').map(clean_name).filter(|v| !v.is_empty()).collect();
        ArffType::Nominal(values)
    } else {
        match type_decl.to_ascii_lowercase().as_str() {
            "numeric" | "real" | "integer" => ArffType::Numeric,
            "string" | "date" => ArffType::Text,
            other => {
                return Err(BenchError::environment(format!(
                    "unsupported attribute type: {other}"
                )))
            }
        }
    };

    Ok(ArffAttribute { name: clean_name(&name), kind })
}

struct ArffIter {
    inner: BoxIter<BenchResult<String>>,
    dialect: CsvDialect,
    skip_encoding: bool,
    attributes: Vec<ArffAttribute>,
    headers: Option<Arc<Vec<String>>>,
    in_data: bool,
    poisoned: bool,
}

impl ArffIter {
    fn fail(&mut self, e: BenchError) -> Option<RowItem> {
        self.poisoned = true;
        Some(Err(e))
    }
}

impl Iterator for ArffIter {
    type Item = RowItem;

    fn next(&mut self) -> Option<RowItem> {
        if self.poisoned {
            return None;
        }
        loop {
            let line = match self.inner.next()? {
                Ok(line) => line,
                Err(e) => return self.fail(e),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }

            if !self.in_data {
                let lower = trimmed.to_ascii_lowercase();
                if lower.starts_with("@relation") {
                    continue;
                }
                if lower.starts_with("@attribute") {
                    match parse_attribute(&trimmed["@attribute".len()..]) {
                        Ok(attr) => self.attributes.push(attr),
                        Err(e) => return self.fail(e),
                    }
                    continue;
                }
                if lower.starts_with("@data") {
                    if self.attributes.is_empty() {
                        return self.fail(BenchError::environment(
                            "@data reached before any @attribute declaration",
                        ));
                    }
                    self.headers = Some(Arc::new(
                        self.attributes.iter().map(|a| a.name.clone()).collect(),
                    ));
                    self.in_data = true;
                    continue;
                }
                return self.fail(BenchError::environment(format!(
                    "unrecognized header line: {trimmed}"
                )));
            }

            if trimmed.starts_with('{') {
                return self.fail(BenchError::environment("sparse data rows are not supported"));
            }

            let fields = match split_line(trimmed, &self.dialect) {
                Ok(fields) => fields,
                Err(e) => return self.fail(e),
            };
            let headers = Arc::clone(self.headers.as_ref().expect("set when @data was seen"));

            let mut cells = Vec::with_capacity(fields.len());
            for (i, field) in fields.into_iter().enumerate() {
                let token = field.trim().to_string();
                if self.skip_encoding || token == "?" {
                    cells.push(Cell::Raw(token));
                    continue;
                }
                match self.attributes.get(i).map(|a| &a.kind) {
                    Some(ArffType::Numeric) => match token.parse::<f64>() {
                        Ok(v) => cells.push(Cell::Num(v)),
                        Err(_) => {
                            return self.fail(BenchError::environment(format!(
                                "could not parse '{token}' as numeric"
                            )))
                        }
                    },
                    _ => cells.push(Cell::Str(token)),
                }
            }

            return Some(match Row::new(headers, cells) {
                Ok(row) => Ok(row),
                Err(e) => return self.fail(e),
            });
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
