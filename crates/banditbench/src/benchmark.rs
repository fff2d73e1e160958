//! The benchmark evaluation loop.
//!
//! [`UniversalBenchmark`] drives every (environment, learner-factory) pair
//! through a deterministic on-policy loop: interactions are assigned to
//! batches by the [`Batching`] policy; within a batch the learner chooses
//! for every interaction, the environment scores the chosen actions in
//! bulk, a [`SummaryStats`] is folded over the rewards, the learner then
//! learns from every observation in order, and exactly one
//! [`BenchmarkResult`] is emitted. Learning for batch `b` always precedes
//! any choice in batch `b + 1` — that is the on-policy guarantee.
//!
//! Failure is isolated: an environment that fails to read is dropped with
//! one tagged log line and the remaining environments continue; a learner
//! that fails abandons only the remaining batches of its own
//! (environment, learner) pair. Cancellation is cooperative, checked
//! between batches, and never clears any cache.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::environments::{Choice, Environment, Key, MemoryEnvironment};
use crate::error::{BenchError, BenchResult};
use crate::learners::LearnerFactory;
use crate::logging::Logger;
use crate::stats::SummaryStats;

// ── Result record ────────────────────────────────────────────────────────────

/// One record per (learner, environment, batch) triple. Immutable after
/// emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub learner_name: String,
    pub env_index: u32,
    pub batch_index: u32,
    /// Total interactions of the environment, identical on every batch
    /// record of that environment.
    pub interaction_count: u32,
    pub median_feature_count: u32,
    pub median_action_count: u32,
    pub stats: SummaryStats,
}

// ── Batching policy ──────────────────────────────────────────────────────────

/// How interactions are partitioned into batches. Exactly one policy is
/// chosen per run.
pub enum Batching {
    /// Partition into `K` near-equal batches; the remainder is spread by
    /// adding one interaction at evenly spaced slots, earliest first.
    Count(usize),
    /// Constant-size batches; the remainder that cannot fill a batch is
    /// dropped.
    Size(usize),
    /// A literal schedule; zero entries are skipped, excess interactions
    /// are ignored, and the schedule is cut off at the first batch the
    /// remaining interactions cannot fund.
    Sizes(Vec<usize>),
    /// A generator called as `f(0), f(1), …` until the remaining budget can
    /// no longer fund the next batch.
    SizeFn(Box<dyn Fn(usize) -> usize + Send + Sync>),
}

impl std::fmt::Debug for Batching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Batching::Count(count) => f.debug_tuple("Count").field(count).finish(),
            Batching::Size(size) => f.debug_tuple("Size").field(size).finish(),
            Batching::Sizes(sizes) => f.debug_tuple("Sizes").field(sizes).finish(),
            Batching::SizeFn(_) => f.debug_tuple("SizeFn").field(&"<fn>").finish(),
        }
    }
}

impl Batching {
    /// Resolve the policy against `n` interactions.
    pub fn batch_sizes(&self, n: usize) -> Vec<usize> {
        match self {
            Batching::Count(count) => {
                if *count == 0 {
                    return Vec::new();
                }
                let mut sizes = vec![n / count; *count];
                let remainder = n % count;
                if remainder > 0 {
                    // Evenly spaced distinct slots: consecutive values of
                    // i*count/remainder differ by more than one whenever
                    // remainder < count, so no slot is incremented twice.
                    for i in 0..remainder {
                        sizes[i * count / remainder] += 1;
                    }
                }
                sizes
            }
            Batching::Size(size) => {
                if *size == 0 {
                    Vec::new()
                } else {
                    vec![*size; n / size]
                }
            }
            Batching::Sizes(sizes) => sizes
                .iter()
                .copied()
                .filter(|&s| s > 0)
                .scan(n, |remaining, size| {
                    if size > *remaining {
                        return None;
                    }
                    *remaining -= size;
                    Some(size)
                })
                .collect(),
            Batching::SizeFn(next_size) => {
                let mut sizes = Vec::new();
                let mut remaining = n;
                for i in 0.. {
                    let size = next_size(i);
                    if size == 0 || size > remaining {
                        break;
                    }
                    sizes.push(size);
                    remaining -= size;
                }
                sizes
            }
        }
    }
}

// ── The benchmark ────────────────────────────────────────────────────────────

/// An on-policy benchmark over a fixed set of environments.
pub struct UniversalBenchmark {
    environments: Vec<Box<dyn Environment>>,
    batching: Batching,
}

impl UniversalBenchmark {
    pub fn new(environments: Vec<Box<dyn Environment>>, batching: Batching) -> Self {
        UniversalBenchmark { environments, batching }
    }

    pub fn environments(&self) -> &[Box<dyn Environment>] {
        &self.environments
    }

    pub fn batching(&self) -> &Batching {
        &self.batching
    }

    /// Evaluate every (environment, learner-factory) pair and collect the
    /// result records.
    pub fn evaluate(
        &self,
        factories: &[LearnerFactory],
        logger: &dyn Logger,
    ) -> Vec<BenchmarkResult> {
        let cancel = AtomicBool::new(false);
        self.evaluate_with_cancel(factories, logger, &cancel)
    }

    /// [`evaluate`](Self::evaluate) with a cooperative cancellation token,
    /// checked between batches. Cancelling exits cleanly after the current
    /// batch and logs one `[cancel]` line; caches are left untouched.
    pub fn evaluate_with_cancel(
        &self,
        factories: &[LearnerFactory],
        logger: &dyn Logger,
        cancel: &AtomicBool,
    ) -> Vec<BenchmarkResult> {
        let mut results = Vec::new();
        for (env_index, env) in self.environments.iter().enumerate() {
            let completed = evaluate_environment(
                env_index,
                env.as_ref(),
                &self.batching,
                factories,
                logger,
                cancel,
                &mut |record| results.push(record),
            );
            if !completed {
                logger.log(&BenchError::Cancelled.log_line());
                break;
            }
        }
        results
    }
}

/// Median of a count vector: middle element, or the floor of the mean of
/// the two middles when the count is even. Zero when empty.
fn median_count(mut values: Vec<usize>) -> u32 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2] as u32
    } else {
        ((values[n / 2 - 1] + values[n / 2]) / 2) as u32
    }
}

/// Run one environment against every factory. Returns `false` when the
/// cancellation token fired (the caller logs the cancel line).
pub(crate) fn evaluate_environment(
    env_index: usize,
    env: &dyn Environment,
    batching: &Batching,
    factories: &[LearnerFactory],
    logger: &dyn Logger,
    cancel: &AtomicBool,
    emit: &mut dyn FnMut(BenchmarkResult),
) -> bool {
    // The read is the lazy environment's load hook; dropping `loaded` at
    // the end of this function is the unload hook.
    let loaded = match env.read() {
        Ok(loaded) => loaded,
        Err(e) => {
            logger.log(&e.log_line());
            return true;
        }
    };

    let interaction_count = loaded.interactions().len();
    let median_feature_count = median_count(
        loaded.interactions().iter().map(|i| i.context().feature_count()).collect(),
    );
    let median_action_count =
        median_count(loaded.interactions().iter().map(|i| i.actions().len()).collect());
    let batch_sizes = batching.batch_sizes(interaction_count);

    for (learner_index, factory) in factories.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let outcome = evaluate_pair(
            PairSetup {
                env_index,
                loaded: &loaded,
                batch_sizes: &batch_sizes,
                learner_index,
                interaction_count,
                median_feature_count,
                median_action_count,
            },
            factory,
            cancel,
            emit,
        );
        match outcome {
            Ok(true) => {}
            Ok(false) => return false,
            // One line per failed pair; the other pairs continue.
            Err(e) => logger.log(&e.log_line()),
        }
    }
    true
}

struct PairSetup<'a> {
    env_index: usize,
    loaded: &'a MemoryEnvironment,
    batch_sizes: &'a [usize],
    learner_index: usize,
    interaction_count: usize,
    median_feature_count: u32,
    median_action_count: u32,
}

/// Run one (environment, learner) pair. `Ok(false)` means cancelled; an
/// error abandons the remaining batches of this pair only.
fn evaluate_pair(
    setup: PairSetup<'_>,
    factory: &LearnerFactory,
    cancel: &AtomicBool,
    emit: &mut dyn FnMut(BenchmarkResult),
) -> BenchResult<bool> {
    let mut learner = factory();
    let learner_name =
        learner.name().unwrap_or_else(|| setup.learner_index.to_string());

    let interactions = setup.loaded.interactions();
    let mut offset = 0;

    for (batch_index, &batch_size) in setup.batch_sizes.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let batch = &interactions[offset..offset + batch_size];
        offset += batch_size;

        // Choose for every member of the batch before any learning.
        let mut choices: Vec<(Key, Choice)> = Vec::with_capacity(batch.len());
        for interaction in batch {
            let choice =
                learner.choose(interaction.key(), interaction.context(), interaction.actions())?;
            if choice >= interaction.actions().len() {
                return Err(BenchError::learner(format!(
                    "choose returned index {choice} for an action set of {}",
                    interaction.actions().len()
                )));
            }
            choices.push((interaction.key(), choice));
        }

        let rewards = setup.loaded.rewards(&choices)?;
        let stats = SummaryStats::from_observations(&rewards);

        // Learn from every observation, in interaction order.
        for ((interaction, &(_, choice)), &reward) in
            batch.iter().zip(&choices).zip(&rewards)
        {
            learner.learn(
                interaction.key(),
                interaction.context(),
                &interaction.actions()[choice],
                reward,
            )?;
        }

        emit(BenchmarkResult {
            learner_name: learner_name.clone(),
            env_index: setup.env_index as u32,
            batch_index: batch_index as u32,
            interaction_count: setup.interaction_count as u32,
            median_feature_count: setup.median_feature_count,
            median_action_count: setup.median_action_count,
            stats,
        });
    }

    Ok(true)
}

// ── Tests ────────────────────────────────────────────────────────────────────
