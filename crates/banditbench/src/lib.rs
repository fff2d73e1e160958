// banditbench: a contextual-bandit benchmarking engine with deterministic
// on-policy evaluation.

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod encoders;
pub mod environments;
pub mod error;
pub mod filters;
pub mod learners;
pub mod logging;
pub mod openml;
pub mod pipes;
pub mod random;
pub mod readers;
pub mod rows;
pub mod runner;
pub mod stats;
pub mod synthetics;

pub use benchmark::{Batching, BenchmarkResult, UniversalBenchmark};
pub use cache::{CacheStream, Cacher, ConcurrentCacher, DiskCacher, MemoryCacher, NullCacher};
pub use config::{BenchmarkConfig, UserConfig};
pub use environments::{
    Action, Context, Environment, Feature, Interaction, LambdaEnvironment, MemoryEnvironment,
    Params,
};
pub use error::{BenchError, BenchResult};
pub use learners::{
    EpsilonAverageLearner, LambdaLearner, Learner, LearnerFactory, RandomLearner,
};
pub use logging::{Logger, MemoryLogger, NullLogger, StdLogger};
pub use openml::{
    FileUrlReader, OpenmlContext, OpenmlEnvironment, OpenmlSource, ProblemType, UrlReader,
};
pub use random::LcgRandom;
pub use runner::TaskRunner;
pub use stats::SummaryStats;
pub use synthetics::{LinearSynthetic, LocalSynthetic};
