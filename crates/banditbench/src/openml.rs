//! Tabular environments fed from the OpenML dataset registry.
//!
//! The HTTP client itself is out of scope — fetching goes through the
//! [`UrlReader`] trait so integrators (and tests) supply their own — but
//! everything around it is here: descriptor parsing, per-dataset cache
//! keys, target resolution, the CSV/ARFF routing, md5 verification, and
//! the `[drop, reservoir, default, encode, structure]` pipeline that turns
//! raw payload lines into labeled rows.
//!
//! All fetches go through [`Cacher::get_or_put`], so a seeded disk cache
//! serves every request without touching the network.

use std::sync::Arc;

use md5::{Digest, Md5};
use serde::Deserialize;

use crate::cache::{CacheStream, Cacher};
use crate::encoders::ColumnEncoder;
use crate::environments::{
    classification_environment, regression_environment, Environment, MemoryEnvironment, Params,
};
use crate::error::{BenchError, BenchResult};
use crate::filters::{DefaultFilter, DropFilter, EncodeFilter, Reservoir, StructureFilter};
use crate::pipes::{BoxIter, Filter};
use crate::readers::{ArffReader, CsvDialect, CsvReader};
use crate::rows::LabeledRow;

// ── URL reading ──────────────────────────────────────────────────────────────

/// Reads the byte lines behind a URL. The production HTTP client lives
/// outside this crate; tests use canned responses.
pub trait UrlReader: Send + Sync {
    fn read_lines(&self, url: &str) -> BenchResult<Vec<Vec<u8>>>;
}

/// A [`UrlReader`] over the local filesystem: plain paths and `file://`
/// URLs, with transparent gzip for `.gz` files. Web URLs are refused —
/// pair this reader with a pre-seeded cache for offline runs.
pub struct FileUrlReader;

impl UrlReader for FileUrlReader {
    fn read_lines(&self, url: &str) -> BenchResult<Vec<Vec<u8>>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(BenchError::environment(format!(
                "no HTTP client is configured; cannot fetch '{url}'"
            )));
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        let raw = std::fs::read(path)
            .map_err(|e| BenchError::environment(format!("could not read '{path}': {e}")))?;
        let bytes = if path.ends_with(".gz") {
            use std::io::Read;
            let mut decoded = Vec::new();
            flate2::read::GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| {
                    BenchError::environment(format!("could not decompress '{path}': {e}"))
                })?;
            decoded
        } else {
            raw
        };
        Ok(split_payload_lines(&bytes))
    }
}

fn split_payload_lines(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut lines: Vec<Vec<u8>> = bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
        .collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

// ── Shared fetch context ─────────────────────────────────────────────────────

/// The collaborators every OpenML source shares: the URL reader, the cache
/// in front of it, and the optional API key appended to registry calls.
#[derive(Clone)]
pub struct OpenmlContext {
    pub http: Arc<dyn UrlReader>,
    pub cacher: Arc<dyn Cacher>,
    pub api_key: Option<String>,
}

impl OpenmlContext {
    pub fn new(http: Arc<dyn UrlReader>, cacher: Arc<dyn Cacher>) -> OpenmlContext {
        OpenmlContext { http, cacher, api_key: None }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> OpenmlContext {
        self.api_key = api_key;
        self
    }
}

// ── Response shapes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DataDescriptionResponse {
    data_set_description: DataDescription,
}

#[derive(Deserialize)]
struct DataDescription {
    status: String,
    file_id: String,
}

#[derive(Deserialize)]
struct FeaturesResponse {
    data_features: DataFeatures,
}

#[derive(Deserialize)]
struct DataFeatures {
    feature: Vec<FeatureDescription>,
}

#[derive(Deserialize)]
struct FeatureDescription {
    name: String,
    data_type: String,
    #[serde(default)]
    is_target: String,
    #[serde(default)]
    is_ignore: String,
    #[serde(default)]
    is_row_identifier: String,
}

#[derive(Deserialize, Default)]
struct TasksResponse {
    #[serde(default)]
    tasks: TaskList,
}

#[derive(Deserialize, Default)]
struct TaskList {
    #[serde(default)]
    task: Vec<TaskDescription>,
}

#[derive(Deserialize)]
struct TaskDescription {
    task_type_id: u64,
    #[serde(default)]
    input: Vec<TaskInput>,
}

#[derive(Deserialize)]
struct TaskInput {
    name: String,
    #[serde(default)]
    value: String,
}

// ── Problem type ─────────────────────────────────────────────────────────────

/// Which bandit problem a dataset is turned into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Classification => "classification",
            ProblemType::Regression => "regression",
        }
    }

    /// The OpenML task-type identifier for this problem type.
    fn task_type_id(self) -> u64 {
        match self {
            ProblemType::Classification => 1,
            ProblemType::Regression => 2,
        }
    }
}

// ── OpenmlSource ─────────────────────────────────────────────────────────────

/// Streams one OpenML dataset into labeled rows.
pub struct OpenmlSource {
    data_id: u64,
    problem_type: ProblemType,
    cat_as_str: bool,
    take: Option<usize>,
    md5_checksum: Option<String>,
    ctx: OpenmlContext,
}

impl OpenmlSource {
    pub fn new(data_id: u64, problem_type: ProblemType, ctx: OpenmlContext) -> OpenmlSource {
        OpenmlSource {
            data_id,
            problem_type,
            cat_as_str: false,
            take: None,
            md5_checksum: None,
            ctx,
        }
    }

    pub fn with_cat_as_str(mut self, cat_as_str: bool) -> OpenmlSource {
        self.cat_as_str = cat_as_str;
        self
    }

    pub fn with_take(mut self, take: Option<usize>) -> OpenmlSource {
        self.take = take;
        self
    }

    pub fn with_md5_checksum(mut self, md5_checksum: Option<String>) -> OpenmlSource {
        self.md5_checksum = md5_checksum;
        self
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn params(&self) -> Params {
        let params = Params::new()
            .with("openml", self.data_id)
            .with("cat_as_str", self.cat_as_str)
            .with("openml_type", self.problem_type.as_str());
        match self.take {
            Some(take) => params.with("openml_take", take as u64),
            None => params,
        }
    }

    fn cache_key(&self, kind: &str) -> String {
        format!("openml_{:0>6}_{kind}", self.data_id)
    }

    fn all_cache_keys(&self) -> [String; 5] {
        ["descr", "feats", "csv", "arff", "tasks"].map(|kind| self.cache_key(kind))
    }

    fn url(&self, path: &str) -> String {
        match &self.ctx.api_key {
            Some(key) => format!("https://www.openml.org{path}?api_key={key}"),
            None => format!("https://www.openml.org{path}"),
        }
    }

    /// Fetch `url` through the cache as raw byte lines.
    fn fetch_bytes(&self, url: &str, key: &str) -> BenchResult<Vec<Vec<u8>>> {
        let http = Arc::clone(&self.ctx.http);
        let url_owned = url.to_string();
        let stream = self.ctx.cacher.get_or_put(
            key,
            Box::new(move || Ok(CacheStream::from_lines(http.read_lines(&url_owned)?))),
        )?;
        stream.collect_lines()
    }

    /// Fetch `url` through the cache and return its text lines.
    fn fetch(&self, url: &str, key: &str) -> BenchResult<Vec<String>> {
        Ok(to_text_lines(self.fetch_bytes(url, key)?))
    }

    /// Verify the md5 of a payload (each line canonicalized with a single
    /// trailing newline, since the cache normalizes line endings). A
    /// mismatch removes the cache entry before surfacing.
    fn verify_checksum(&self, lines: &[Vec<u8>], key: &str, url: &str) -> BenchResult<()> {
        let Some(expected) = self.md5_checksum.as_deref() else {
            return Ok(());
        };
        let mut hasher = Md5::new();
        for line in lines {
            hasher.update(line);
            hasher.update(b"\n");
        }
        let actual: String = hasher.finalize().iter().map(|b| format!("{b:02x}")).collect();
        if actual != expected {
            self.ctx.cacher.remove(key)?;
            return Err(BenchError::environment(format!(
                "md5 mismatch for {url}: expected {expected}, got {actual}"
            )));
        }
        Ok(())
    }

    fn dataset_description(&self) -> BenchResult<DataDescription> {
        let text = self
            .fetch(
                &self.url(&format!("/api/v1/json/data/{}", self.data_id)),
                &self.cache_key("descr"),
            )?
            .join(" ");
        let response: DataDescriptionResponse = serde_json::from_str(&text).map_err(|e| {
            BenchError::environment(format!(
                "unparseable dataset description for {}: {e}",
                self.data_id
            ))
        })?;
        Ok(response.data_set_description)
    }

    fn feature_descriptions(&self) -> BenchResult<Vec<FeatureDescription>> {
        let text = self
            .fetch(
                &self.url(&format!("/api/v1/json/data/features/{}", self.data_id)),
                &self.cache_key("feats"),
            )?
            .join(" ");
        let response: FeaturesResponse = serde_json::from_str(&text).map_err(|e| {
            BenchError::environment(format!(
                "unparseable feature list for {}: {e}",
                self.data_id
            ))
        })?;
        Ok(response.data_features.feature)
    }

    /// Resolve the target column from the dataset's task list when the
    /// declared target is absent or mistyped for the problem type.
    fn target_for_problem_type(&self) -> BenchResult<String> {
        let text = self
            .fetch(
                &self.url(&format!("/api/v1/json/task/list/data_id/{}", self.data_id)),
                &self.cache_key("tasks"),
            )?
            .join(" ");
        let response: TasksResponse = serde_json::from_str(&text).unwrap_or_default();

        for task in &response.tasks.task {
            if task.task_type_id != self.problem_type.task_type_id() {
                continue;
            }
            for input in &task.input {
                if input.name == "target_feature" && !input.value.is_empty() {
                    return Ok(clean_token(&input.value));
                }
            }
        }

        Err(BenchError::environment(format!(
            "openml {} does not appear to be a {} dataset",
            self.data_id,
            self.problem_type.as_str()
        )))
    }

    /// Stream the dataset rows, preferring whichever payload is cached.
    ///
    /// The payload the pipeline actually consumes is checksum-verified; a
    /// mismatch surfaces rather than falling back to the other format.
    fn dataset_rows(&self, file_id: &str) -> BenchResult<BoxIter<crate::rows::RowItem>> {
        let csv_url = self.url(&format!("/data/v1/get_csv/{file_id}"));
        let arff_url = self.url(&format!("/data/v1/download/{file_id}"));
        let csv_key = self.cache_key("csv");
        let arff_key = self.cache_key("arff");

        let read_csv = |lines: Vec<Vec<u8>>| -> BoxIter<crate::rows::RowItem> {
            CsvReader::new(true, CsvDialect::openml())
                .filter(Box::new(to_text_lines(lines).into_iter().map(Ok)))
        };
        let read_arff = |lines: Vec<Vec<u8>>| -> BoxIter<crate::rows::RowItem> {
            ArffReader::new(true, CsvDialect::openml())
                .filter(Box::new(to_text_lines(lines).into_iter().map(Ok)))
        };

        if self.ctx.cacher.contains(&arff_key) {
            let lines = self.fetch_bytes(&arff_url, &arff_key)?;
            self.verify_checksum(&lines, &arff_key, &arff_url)?;
            return Ok(read_arff(lines));
        }
        if self.ctx.cacher.contains(&csv_key) {
            let lines = self.fetch_bytes(&csv_url, &csv_key)?;
            self.verify_checksum(&lines, &csv_key, &csv_url)?;
            return Ok(read_csv(lines));
        }
        match self.fetch_bytes(&csv_url, &csv_key) {
            Ok(lines) => {
                self.verify_checksum(&lines, &csv_key, &csv_url)?;
                Ok(read_csv(lines))
            }
            Err(_) => {
                let lines = self.fetch_bytes(&arff_url, &arff_key)?;
                self.verify_checksum(&lines, &arff_key, &arff_url)?;
                Ok(read_arff(lines))
            }
        }
    }

    /// Read the dataset into labeled rows through the full pipeline.
    ///
    /// A cache-level failure purges every key of this dataset before
    /// surfacing, in case the stored payloads are corrupt.
    pub fn read(&self) -> BenchResult<Vec<LabeledRow>> {
        match self.read_rows() {
            Ok(rows) => Ok(rows),
            Err(e @ BenchError::Cache { .. }) => {
                for key in self.all_cache_keys() {
                    let _ = self.ctx.cacher.remove(&key);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn read_rows(&self) -> BenchResult<Vec<LabeledRow>> {
        let description = self.dataset_description()?;
        if description.status == "deactivated" {
            return Err(BenchError::environment(format!(
                "openml {} has been deactivated, often due to flags on the data",
                self.data_id
            )));
        }

        let features = self.feature_descriptions()?;

        let mut ignored: Vec<String> = Vec::new();
        let mut target = String::new();
        let mut encoders: Vec<(String, ColumnEncoder)> = Vec::new();

        for feature in &features {
            let header = clean_token(&feature.name);

            let is_ignored = feature.is_ignore == "true"
                || feature.is_row_identifier == "true"
                || !matches!(feature.data_type.as_str(), "numeric" | "nominal");
            if is_ignored {
                ignored.push(header.clone());
            }
            if feature.is_target == "true" {
                target = header.clone();
            }

            let encoder = match feature.data_type.as_str() {
                "numeric" => ColumnEncoder::Numeric,
                "nominal" if self.cat_as_str => ColumnEncoder::NominalAsStr,
                // Declared nominal values are often wrong, so the alphabet
                // is fitted against the observed data instead.
                "nominal" => ColumnEncoder::Nominal { values: Vec::new() },
                _ => ColumnEncoder::Text,
            };
            encoders.push((header, encoder));
        }

        let target_fits = |encoders: &[(String, ColumnEncoder)], target: &str| {
            encoders.iter().any(|(name, encoder)| {
                name == target
                    && match self.problem_type {
                        ProblemType::Regression => matches!(encoder, ColumnEncoder::Numeric),
                        ProblemType::Classification => matches!(
                            encoder,
                            ColumnEncoder::Nominal { .. } | ColumnEncoder::NominalAsStr
                        ),
                    }
            })
        };

        if target.is_empty() || !target_fits(&encoders, &target) {
            target = self.target_for_problem_type()?;
        }
        ignored.retain(|name| name != &target);

        if self.problem_type == ProblemType::Classification {
            let target_encoder = if self.cat_as_str {
                ColumnEncoder::NominalAsStr
            } else {
                ColumnEncoder::Nominal { values: Vec::new() }
            };
            match encoders.iter_mut().find(|(name, _)| name == &target) {
                Some((_, encoder)) => *encoder = target_encoder,
                None => encoders.push((target.clone(), target_encoder)),
            }
        }

        let rows = self.dataset_rows(&description.file_id)?;

        let drops =
            DropFilter::new(ignored).with_row_predicate(DropFilter::missing_values());
        let takes = Reservoir::new(self.take, 1).keep_first();
        let defaults = DefaultFilter::new(vec![(target.clone(), "0".to_string())]);
        let encodes = EncodeFilter::new(encoders);
        let structures = StructureFilter::new(target);

        structures
            .filter(encodes.filter(defaults.filter(takes.filter(drops.filter(rows)))))
            .collect()
    }
}

fn to_text_lines(lines: Vec<Vec<u8>>) -> Vec<String> {
    lines.into_iter().map(|l| String::from_utf8_lossy(&l).into_owned()).collect()
}

fn clean_token(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

// ── OpenmlEnvironment ────────────────────────────────────────────────────────

/// An [`Environment`] over one OpenML dataset.
///
/// Classification turns the label set into the action set with reward 1
/// for matching the row's own label; regression uses the distinct observed
/// labels as actions with reward `1 - |y - a|` clipped to `[0, 1]` (the
/// choice is recorded in `params` so results stay comparable).
pub struct OpenmlEnvironment {
    source: OpenmlSource,
}

impl OpenmlEnvironment {
    pub fn new(source: OpenmlSource) -> OpenmlEnvironment {
        OpenmlEnvironment { source }
    }
}

impl Environment for OpenmlEnvironment {
    fn params(&self) -> Params {
        let params = self.source.params();
        match self.source.problem_type() {
            ProblemType::Regression => params.with("reward", "1-|y-a|"),
            ProblemType::Classification => params,
        }
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let rows = self.source.read()?;
        let environment = match self.source.problem_type() {
            ProblemType::Classification => classification_environment(&rows)?,
            ProblemType::Regression => regression_environment(&rows)?,
        };
        Ok(environment.with_params(self.params()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacher;
    use crate::environments::{Action, Context};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned responses keyed by URL, counting every fetch.
    struct CannedUrls {
        responses: HashMap<String, String>,
        fetches: AtomicUsize,
    }

    impl CannedUrls {
        fn new(responses: &[(&str, &str)]) -> CannedUrls {
            CannedUrls {
                responses: responses
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl UrlReader for CannedUrls {
        fn read_lines(&self, url: &str) -> BenchResult<Vec<Vec<u8>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(url) {
                Some(body) => {
                    Ok(body.lines().map(|l| l.as_bytes().to_vec()).collect())
                }
                None => Err(BenchError::environment(format!("404 for {url}"))),
            }
        }
    }

    const DESCR: &str =
        r#"{"data_set_description":{"status":"active","file_id":"77"}}"#;
    const FEATS: &str = r#"{"data_features":{"feature":[
        {"name":"age","data_type":"numeric","is_target":"false","is_ignore":"false","is_row_identifier":"false"},
        {"name":"rowid","data_type":"numeric","is_target":"false","is_ignore":"false","is_row_identifier":"true"},
        {"name":"class","data_type":"nominal","is_target":"true","is_ignore":"false","is_row_identifier":"false"}
    ]}}"#;
    const CSV: &str = "age,rowid,class\n30,0,yes\n40,1,no\n50,2,yes\n";

    fn canned() -> Arc<CannedUrls> {
        Arc::new(CannedUrls::new(&[
            ("https://www.openml.org/api/v1/json/data/9", DESCR),
            ("https://www.openml.org/api/v1/json/data/features/9", FEATS),
            ("https://www.openml.org/data/v1/get_csv/77", CSV),
        ]))
    }

    fn context(http: Arc<CannedUrls>) -> OpenmlContext {
        OpenmlContext::new(http, Arc::new(MemoryCacher::new()))
    }

    #[test]
    fn test_classification_end_to_end() {
        let env = OpenmlEnvironment::new(OpenmlSource::new(
            9,
            ProblemType::Classification,
            context(canned()),
        ));
        let loaded = env.read().expect("read");

        assert_eq!(loaded.interactions().len(), 3);
        // rowid is ignored; age is the single context feature.
        assert_eq!(loaded.interactions()[0].context(), &Context::nums(vec![30.0]));
        // Two one-hot actions: yes first (first appearance), then no.
        assert_eq!(
            loaded.interactions()[0].actions(),
            &[Action::nums(vec![1.0, 0.0]), Action::nums(vec![0.0, 1.0])]
        );
        // Row 0 is labeled yes.
        assert_eq!(loaded.rewards(&[(0, 0), (0, 1)]).expect("rewards"), vec![1.0, 0.0]);
        assert_eq!(loaded.rewards(&[(1, 0), (1, 1)]).expect("rewards"), vec![0.0, 1.0]);
    }

    #[test]
    fn test_cat_as_str_uses_string_actions() {
        let env = OpenmlEnvironment::new(
            OpenmlSource::new(9, ProblemType::Classification, context(canned()))
                .with_cat_as_str(true),
        );
        let loaded = env.read().expect("read");
        assert_eq!(
            loaded.interactions()[0].actions(),
            &[Action::str("yes"), Action::str("no")]
        );
    }

    #[test]
    fn test_second_read_is_served_from_cache() {
        let http = canned();
        let env = OpenmlEnvironment::new(OpenmlSource::new(
            9,
            ProblemType::Classification,
            context(Arc::clone(&http)),
        ));

        env.read().expect("first read");
        let after_first = http.fetches.load(Ordering::SeqCst);
        env.read().expect("second read");
        assert_eq!(
            http.fetches.load(Ordering::SeqCst),
            after_first,
            "the second read must not refetch"
        );
    }

    #[test]
    fn test_deactivated_dataset_is_rejected() {
        let http = Arc::new(CannedUrls::new(&[(
            "https://www.openml.org/api/v1/json/data/9",
            r#"{"data_set_description":{"status":"deactivated","file_id":"77"}}"#,
        )]));
        let source = OpenmlSource::new(9, ProblemType::Classification, context(http));
        let err = source.read().unwrap_err();
        assert_eq!(err.tag(), "environment");
        assert!(err.to_string().contains("deactivated"));
    }

    #[test]
    fn test_md5_mismatch_removes_entry_and_errors() {
        let source = OpenmlSource::new(9, ProblemType::Classification, context(canned()))
            .with_md5_checksum(Some("0".repeat(32)));
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("md5 mismatch"), "got: {err}");
        assert!(
            !source.ctx.cacher.contains("openml_000009_csv"),
            "the mismatched payload must be removed"
        );
    }

    #[test]
    fn test_md5_match_accepts_payload() {
        // The canonical digest covers each payload line plus one newline.
        let mut hasher = Md5::new();
        for line in CSV.lines() {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        let checksum: String =
            hasher.finalize().iter().map(|b| format!("{b:02x}")).collect();

        let source = OpenmlSource::new(9, ProblemType::Classification, context(canned()))
            .with_md5_checksum(Some(checksum));
        assert_eq!(source.read().expect("read").len(), 3);
    }

    #[test]
    fn test_target_resolved_from_task_list() {
        // No declared target; the task list nominates "class".
        let feats = r#"{"data_features":{"feature":[
            {"name":"age","data_type":"numeric","is_target":"false","is_ignore":"false","is_row_identifier":"false"},
            {"name":"class","data_type":"nominal","is_target":"false","is_ignore":"false","is_row_identifier":"false"}
        ]}}"#;
        let tasks = r#"{"tasks":{"task":[
            {"task_type_id":1,"input":[{"name":"target_feature","value":"class"}]}
        ]}}"#;
        let http = Arc::new(CannedUrls::new(&[
            ("https://www.openml.org/api/v1/json/data/9", DESCR),
            ("https://www.openml.org/api/v1/json/data/features/9", feats),
            ("https://www.openml.org/api/v1/json/task/list/data_id/9", tasks),
            ("https://www.openml.org/data/v1/get_csv/77", "age,class\n30,yes\n40,no\n"),
        ]));

        let source = OpenmlSource::new(9, ProblemType::Classification, context(http));
        let rows = source.read().expect("read");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].features.headers().as_slice(), &["age".to_string()]);
    }

    #[test]
    fn test_missing_rows_are_dropped() {
        let http = Arc::new(CannedUrls::new(&[
            ("https://www.openml.org/api/v1/json/data/9", DESCR),
            ("https://www.openml.org/api/v1/json/data/features/9", FEATS),
            (
                "https://www.openml.org/data/v1/get_csv/77",
                "age,rowid,class\n30,0,yes\n?,1,no\n50,2,yes\n",
            ),
        ]));
        let source = OpenmlSource::new(9, ProblemType::Classification, context(http));
        let rows = source.read().expect("read");
        assert_eq!(rows.len(), 2, "the row with a missing age must be dropped");
    }

    #[test]
    fn test_regression_environment_params_document_reward() {
        let env = OpenmlEnvironment::new(OpenmlSource::new(
            9,
            ProblemType::Regression,
            context(canned()),
        ));
        let params = env.params();
        assert_eq!(params.get("openml_type"), Some(&serde_json::json!("regression")));
        assert_eq!(params.get("reward"), Some(&serde_json::json!("1-|y-a|")));
    }

    #[test]
    fn test_api_key_appended_to_urls() {
        let source = OpenmlSource::new(
            9,
            ProblemType::Classification,
            context(canned()).with_api_key(Some("sekrit".to_string())),
        );
        assert_eq!(
            source.url("/api/v1/json/data/9"),
            "https://www.openml.org/api/v1/json/data/9?api_key=sekrit"
        );
    }

    #[test]
    fn test_take_limits_rows_and_pins_first() {
        let mut csv = String::from("age,rowid,class\n");
        for i in 0..50 {
            csv.push_str(&format!("{},{},{}\n", 20 + i, i, if i % 2 == 0 { "yes" } else { "no" }));
        }
        let http = Arc::new(CannedUrls::new(&[
            ("https://www.openml.org/api/v1/json/data/9", DESCR),
            ("https://www.openml.org/api/v1/json/data/features/9", FEATS),
            ("https://www.openml.org/data/v1/get_csv/77", &csv),
        ]));
        let source = OpenmlSource::new(9, ProblemType::Classification, context(http))
            .with_take(Some(5));
        let rows = source.read().expect("read");
        assert_eq!(rows.len(), 5);
        // keep_first pins the first data row.
        assert_eq!(rows[0].features.get("age"), Some(&crate::rows::Cell::Num(20.0)));
    }

    #[test]
    fn test_file_url_reader_reads_local_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.csv");
        std::fs::write(&path, "a,b\r\n1,2\n").expect("write");

        let lines = FileUrlReader
            .read_lines(&format!("file://{}", path.display()))
            .expect("read");
        assert_eq!(lines, vec![b"a,b".to_vec(), b"1,2".to_vec()]);

        let err = FileUrlReader.read_lines("https://example.com/x").unwrap_err();
        assert_eq!(err.tag(), "environment");
    }
}
