use std::io::{self, Read};
use std::sync::Arc;

use clap::Parser;

use banditbench::{
    Cacher, ConcurrentCacher, DiskCacher, EpsilonAverageLearner, FileUrlReader, LearnerFactory,
    OpenmlContext, RandomLearner, StdLogger, TaskRunner, UniversalBenchmark, UserConfig,
};

/// Run a contextual-bandit benchmark and emit one JSON result per line.
#[derive(Parser, Debug)]
#[command(name = "banditbench-cli", about = "Run a contextual-bandit benchmark")]
struct Args {
    /// Read the benchmark JSON from a file instead of stdin
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// User config file carrying api_keys and cache_dir
    #[arg(long)]
    user_config: Option<std::path::PathBuf>,

    /// Cache directory for dataset payloads (overrides the user config)
    #[arg(long)]
    cache_dir: Option<std::path::PathBuf>,

    /// Worker threads; environments are fanned out across them
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Environments per worker chunk
    #[arg(long, default_value_t = 1)]
    chunk_size: usize,

    /// Seed for the baseline learners
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let benchmark_json = match &args.config {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading config file: {e}");
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("Error reading stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };

    let user_config = match &args.user_config {
        Some(path) => {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading user config: {e}");
                std::process::exit(1);
            });
            UserConfig::from_json(&text).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(1);
            })
        }
        None => UserConfig::default(),
    };

    let cache_dir = args
        .cache_dir
        .clone()
        .or_else(|| user_config.cache_dir.as_ref().map(std::path::PathBuf::from));

    let disk = DiskCacher::new(cache_dir).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let cacher: Arc<dyn Cacher> = Arc::new(ConcurrentCacher::new(Arc::new(disk)));
    let ctx = OpenmlContext::new(Arc::new(FileUrlReader), cacher)
        .with_api_key(user_config.openml_api_key().map(str::to_string));

    // A config error is fatal; everything downstream is isolated per
    // environment or per (environment, learner) pair and exits 0.
    let benchmark = UniversalBenchmark::from_json(&benchmark_json, &ctx).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let seed = args.seed;
    let factories: Vec<LearnerFactory> = vec![
        Box::new(move || Box::new(RandomLearner::new(seed))),
        Box::new(move || Box::new(EpsilonAverageLearner::new(0.1, 0.0, seed))),
    ];

    let runner = TaskRunner::new(args.workers, args.chunk_size);
    let results = runner.run(&benchmark, &factories, &StdLogger);

    for record in results {
        let json =
            serde_json::to_string(&record).expect("BenchmarkResult is always serializable");
        println!("{json}");
    }
}
