//! Benchmark configuration JSON and the user config file.
//!
//! The benchmark input is a JSON object with a `"batches"` policy and one
//! or more `"simulations"`:
//!
//! ```json
//! {
//!   "batches": { "count": 2 },
//!   "simulations": [
//!     { "type": "classification",
//!       "from": { "format": "openml", "id": 150, "md5_checksum": "…" },
//!       "seed": 10, "lazy": true }
//!   ]
//! }
//! ```
//!
//! Malformed input is a fatal [`BenchError::Config`]. The user config file
//! carries API keys and the cache directory and is consumed only by the
//! fetch layer.

use serde::Deserialize;

use crate::benchmark::{Batching, UniversalBenchmark};
use crate::environments::{Environment, ShuffledEnvironment};
use crate::error::{BenchError, BenchResult};
use crate::openml::{OpenmlContext, OpenmlEnvironment, OpenmlSource, ProblemType};

// ── Raw JSON shapes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    batches: RawBatches,
    simulations: OneOrMany<RawSimulation>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatches {
    Count { count: usize },
    Size { size: RawSize },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Fixed(usize),
    Schedule(Vec<usize>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
struct RawSimulation {
    #[serde(rename = "type")]
    kind: String,
    from: RawFrom,
    seed: Option<u64>,
    #[serde(default = "default_lazy")]
    lazy: bool,
    take: Option<usize>,
    #[serde(default)]
    cat_as_str: bool,
}

fn default_lazy() -> bool {
    true
}

#[derive(Deserialize)]
struct RawFrom {
    format: String,
    id: u64,
    md5_checksum: Option<String>,
}

// ── Parsed configuration ─────────────────────────────────────────────────────

/// A parsed benchmark configuration, ready to be built into a
/// [`UniversalBenchmark`] once the fetch collaborators are known.
#[derive(Debug)]
pub struct BenchmarkConfig {
    batching: Batching,
    simulations: Vec<SimulationConfig>,
}

/// One parsed simulation entry.
#[derive(Debug)]
pub struct SimulationConfig {
    pub problem_type: ProblemType,
    pub data_id: u64,
    pub md5_checksum: Option<String>,
    pub seed: Option<u64>,
    pub lazy: bool,
    pub take: Option<usize>,
    pub cat_as_str: bool,
}

impl BenchmarkConfig {
    /// Parse a benchmark configuration from JSON text.
    pub fn from_json(json: &str) -> BenchResult<BenchmarkConfig> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| BenchError::config(format!("malformed benchmark JSON: {e}")))?;

        let batching = match raw.batches {
            RawBatches::Count { count } => Batching::Count(count),
            RawBatches::Size { size: RawSize::Fixed(size) } => Batching::Size(size),
            RawBatches::Size { size: RawSize::Schedule(sizes) } => Batching::Sizes(sizes),
        };

        let simulations = raw
            .simulations
            .into_vec()
            .into_iter()
            .map(|sim| {
                let problem_type = match sim.kind.as_str() {
                    "classification" => ProblemType::Classification,
                    "regression" => ProblemType::Regression,
                    other => {
                        return Err(BenchError::config(format!(
                            "unknown simulation type '{other}'"
                        )))
                    }
                };
                if sim.from.format != "openml" {
                    return Err(BenchError::config(format!(
                        "unknown simulation format '{}'",
                        sim.from.format
                    )));
                }
                Ok(SimulationConfig {
                    problem_type,
                    data_id: sim.from.id,
                    md5_checksum: sim.from.md5_checksum,
                    seed: sim.seed,
                    lazy: sim.lazy,
                    take: sim.take,
                    cat_as_str: sim.cat_as_str,
                })
            })
            .collect::<BenchResult<Vec<_>>>()?;

        Ok(BenchmarkConfig { batching, simulations })
    }

    pub fn simulations(&self) -> &[SimulationConfig] {
        &self.simulations
    }

    /// Build the benchmark, wiring every simulation to the given fetch
    /// context. Non-lazy simulations are materialized right here, so a bad
    /// dataset fails at build time rather than mid-run.
    pub fn build(self, ctx: &OpenmlContext) -> BenchResult<UniversalBenchmark> {
        let mut environments: Vec<Box<dyn Environment>> = Vec::new();

        for sim in self.simulations {
            let source = OpenmlSource::new(sim.data_id, sim.problem_type, ctx.clone())
                .with_cat_as_str(sim.cat_as_str)
                .with_take(sim.take)
                .with_md5_checksum(sim.md5_checksum);

            let mut environment: Box<dyn Environment> =
                Box::new(OpenmlEnvironment::new(source));
            if let Some(seed) = sim.seed {
                environment = Box::new(ShuffledEnvironment::new(environment, seed));
            }
            if !sim.lazy {
                environment = Box::new(environment.read()?);
            }
            environments.push(environment);
        }

        Ok(UniversalBenchmark::new(environments, self.batching))
    }
}

impl UniversalBenchmark {
    /// Parse and build a benchmark in one step.
    pub fn from_json(json: &str, ctx: &OpenmlContext) -> BenchResult<UniversalBenchmark> {
        BenchmarkConfig::from_json(json)?.build(ctx)
    }
}

// ── User configuration file ──────────────────────────────────────────────────

/// The optional user config file (API keys and cache location).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UserConfig {
    #[serde(default)]
    pub api_keys: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
}

impl UserConfig {
    pub fn from_json(json: &str) -> BenchResult<UserConfig> {
        serde_json::from_str(json)
            .map_err(|e| BenchError::config(format!("malformed user config: {e}")))
    }

    /// The OpenML API key, when configured.
    pub fn openml_api_key(&self) -> Option<&str> {
        self.api_keys.get("openml").map(String::as_str)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
