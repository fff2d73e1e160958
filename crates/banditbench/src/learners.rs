//! The learner contract consumed by the benchmark loop, plus baseline
//! learners for testing and comparison.
//!
//! A learner sees interactions one at a time: the loop calls
//! [`Learner::choose`] for every member of a batch, fetches the rewards in
//! bulk, then calls [`Learner::learn`] for every observation in order. A
//! learner instance is never shared: the loop builds one per
//! (environment, factory) pair via a [`LearnerFactory`].

use std::collections::HashMap;

use crate::environments::{Action, Context, Key, Reward};
use crate::error::{BenchError, BenchResult};
use crate::random::LcgRandom;

/// The contract the benchmark loop invokes.
pub trait Learner: Send {
    /// A display name for reporting. `None` makes the loop substitute the
    /// learner's positional index; there is no silent fallback on error.
    fn name(&self) -> Option<String> {
        None
    }

    /// Choose an action by returning a valid index into `actions`.
    fn choose(&mut self, key: Key, context: &Context, actions: &[Action]) -> BenchResult<usize>;

    /// Observe the reward of a previously chosen action. May be a no-op.
    fn learn(
        &mut self,
        key: Key,
        context: &Context,
        action: &Action,
        reward: Reward,
    ) -> BenchResult<()>;
}

/// Builds one fresh learner per (environment, factory) pair.
pub type LearnerFactory = Box<dyn Fn() -> Box<dyn Learner> + Send + Sync>;

// ── LambdaLearner ────────────────────────────────────────────────────────────

/// Chooser signature for [`LambdaLearner`].
pub type ChooseFn = dyn FnMut(Key, &Context, &[Action]) -> usize + Send;
/// Learn signature for [`LambdaLearner`].
pub type LearnFn = dyn FnMut(Key, &Context, &Action, Reward) + Send;

/// A learner driven by caller-supplied closures; learning is optional.
pub struct LambdaLearner {
    chooser: Box<ChooseFn>,
    learner: Option<Box<LearnFn>>,
    name: Option<String>,
}

impl LambdaLearner {
    pub fn new(chooser: Box<ChooseFn>) -> LambdaLearner {
        LambdaLearner { chooser, learner: None, name: None }
    }

    pub fn with_learn(mut self, learner: Box<LearnFn>) -> LambdaLearner {
        self.learner = Some(learner);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> LambdaLearner {
        self.name = Some(name.into());
        self
    }
}

impl Learner for LambdaLearner {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn choose(&mut self, key: Key, context: &Context, actions: &[Action]) -> BenchResult<usize> {
        let choice = (self.chooser)(key, context, actions);
        if choice >= actions.len() {
            return Err(BenchError::learner(format!(
                "choose returned index {choice} for an action set of {}",
                actions.len()
            )));
        }
        Ok(choice)
    }

    fn learn(
        &mut self,
        key: Key,
        context: &Context,
        action: &Action,
        reward: Reward,
    ) -> BenchResult<()> {
        if let Some(learner) = &mut self.learner {
            learner(key, context, action, reward);
        }
        Ok(())
    }
}

// ── RandomLearner ────────────────────────────────────────────────────────────

/// Selects uniformly at random and learns nothing.
pub struct RandomLearner {
    rng: LcgRandom,
}

impl RandomLearner {
    pub fn new(seed: u64) -> RandomLearner {
        RandomLearner { rng: LcgRandom::from_seed(seed) }
    }
}

impl Learner for RandomLearner {
    fn name(&self) -> Option<String> {
        Some("random".to_string())
    }

    fn choose(&mut self, _key: Key, _context: &Context, actions: &[Action]) -> BenchResult<usize> {
        Ok(self.rng.randint(0, actions.len() as i64 - 1) as usize)
    }

    fn learn(
        &mut self,
        _key: Key,
        _context: &Context,
        _action: &Action,
        _reward: Reward,
    ) -> BenchResult<()> {
        Ok(())
    }
}

// ── EpsilonAverageLearner ────────────────────────────────────────────────────

/// ε-greedy over per-action running reward means.
///
/// With probability ε a uniform action is explored; otherwise the learner
/// exploits a uniformly chosen maximizer of the running means, scoring
/// unseen actions with `initial`.
pub struct EpsilonAverageLearner {
    epsilon: f64,
    initial: f64,
    counts: HashMap<Action, u64>,
    means: HashMap<Action, f64>,
    rng: LcgRandom,
}

impl EpsilonAverageLearner {
    pub fn new(epsilon: f64, initial: f64, seed: u64) -> EpsilonAverageLearner {
        EpsilonAverageLearner {
            epsilon,
            initial,
            counts: HashMap::new(),
            means: HashMap::new(),
            rng: LcgRandom::from_seed(seed),
        }
    }
}

impl Learner for EpsilonAverageLearner {
    fn name(&self) -> Option<String> {
        Some(format!("epsilon-average({})", self.epsilon))
    }

    fn choose(&mut self, _key: Key, _context: &Context, actions: &[Action]) -> BenchResult<usize> {
        if self.rng.uniform() <= self.epsilon {
            return Ok(self.rng.randint(0, actions.len() as i64 - 1) as usize);
        }

        let values: Vec<f64> = actions
            .iter()
            .map(|a| self.means.get(a).copied().unwrap_or(self.initial))
            .collect();
        let best = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let maximizers: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == best)
            .map(|(i, _)| i)
            .collect();
        Ok(*self.rng.choice(&maximizers))
    }

    fn learn(
        &mut self,
        _key: Key,
        _context: &Context,
        action: &Action,
        reward: Reward,
    ) -> BenchResult<()> {
        let count = self.counts.entry(action.clone()).or_insert(0);
        let mean = self.means.entry(action.clone()).or_insert(0.0);
        // Running mean with step size 1 / (n + 1).
        let alpha = 1.0 / (*count + 1) as f64;
        *mean = (1.0 - alpha) * *mean + alpha * reward;
        *count += 1;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
