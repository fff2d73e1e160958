//! Core environment model: contexts, actions, interactions and the
//! [`Environment`] contract.
//!
//! A context is one of {absent, scalar, string, tuple, keyed mapping}; an
//! action is the same set minus "absent". Both are structurally hashable —
//! numeric components hash by their bit pattern — because synthetic reward
//! tables and learners key on them.
//!
//! An [`Environment`] is a reusable source of [`Interaction`]s: `read()` may
//! be called any number of times and always yields an equivalent sequence,
//! because every stochastic environment re-seeds a fresh generator per read.
//! `read()` doubles as the load hook of a lazy environment; dropping the
//! returned [`MemoryEnvironment`] is the unload hook.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use serde::ser::SerializeMap;
use serde::Serialize;

use crate::error::{BenchError, BenchResult};
use crate::random::LcgRandom;
use crate::rows::{Cell, LabeledRow};

/// Interaction identifier, unique and dense within one environment read.
pub type Key = u64;
/// An index into an interaction's action set.
pub type Choice = usize;
/// A scalar reward, finite and (by convention) in `[0, 1]` unless the
/// environment declares otherwise.
pub type Reward = f64;

// ── Features, contexts, actions ──────────────────────────────────────────────

/// One scalar feature: a number or a string.
#[derive(Clone, Debug)]
pub enum Feature {
    Num(f64),
    Str(String),
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Feature::Num(a), Feature::Num(b)) => a.to_bits() == b.to_bits(),
            (Feature::Str(a), Feature::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Feature {}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Feature::Num(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            Feature::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl From<f64> for Feature {
    fn from(v: f64) -> Self {
        Feature::Num(v)
    }
}

impl From<&str> for Feature {
    fn from(s: &str) -> Self {
        Feature::Str(s.to_string())
    }
}

/// The situation presented to a learner alongside an action set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Context {
    /// No context: the multi-armed bandit case.
    #[default]
    None,
    Single(Feature),
    Tuple(Vec<Feature>),
    Map(BTreeMap<String, Feature>),
}

impl Context {
    /// Number of features for reporting purposes: a tuple counts its
    /// members, absence counts zero, anything else counts one.
    pub fn feature_count(&self) -> usize {
        match self {
            Context::None => 0,
            Context::Tuple(features) => features.len(),
            _ => 1,
        }
    }

    /// A tuple context over numeric features.
    pub fn nums(values: Vec<f64>) -> Context {
        Context::Tuple(values.into_iter().map(Feature::Num).collect())
    }
}

impl From<f64> for Context {
    fn from(v: f64) -> Self {
        Context::Single(Feature::Num(v))
    }
}

impl From<&str> for Context {
    fn from(s: &str) -> Self {
        Context::Single(Feature::Str(s.to_string()))
    }
}

/// One selectable action: the same closed set as [`Context`] minus absence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Single(Feature),
    Tuple(Vec<Feature>),
    Map(BTreeMap<String, Feature>),
}

impl Action {
    pub fn num(v: f64) -> Action {
        Action::Single(Feature::Num(v))
    }

    pub fn str(s: impl Into<String>) -> Action {
        Action::Single(Feature::Str(s.into()))
    }

    /// A tuple action over numeric features.
    pub fn nums(values: Vec<f64>) -> Action {
        Action::Tuple(values.into_iter().map(Feature::Num).collect())
    }

    /// The `index`-th unit vector of `width` components.
    pub fn one_hot(index: usize, width: usize) -> Action {
        Action::nums(crate::encoders::one_hot(index, width))
    }
}

// ── Interaction ──────────────────────────────────────────────────────────────

/// A single step presented to a learner: a context and its action set.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    key: Key,
    context: Context,
    actions: Vec<Action>,
}

impl Interaction {
    /// Build an interaction.
    ///
    /// # Panics
    ///
    /// Panics when `actions` is empty; every interaction must offer at
    /// least one action.
    pub fn new(key: Key, context: Context, actions: Vec<Action>) -> Interaction {
        assert!(!actions.is_empty(), "an interaction requires at least one action");
        Interaction { key, context, actions }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

// ── Params ───────────────────────────────────────────────────────────────────

/// An ordered mapping of environment descriptors, rendered verbatim into
/// result output for identity and reporting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(String, serde_json::Value)>);

impl Params {
    pub fn new() -> Params {
        Params(Vec::new())
    }

    /// Append a descriptor, preserving insertion order.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Params {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, serde_json::Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Params {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ── Environment contract ─────────────────────────────────────────────────────

/// A reusable, deterministic source of interactions.
pub trait Environment: Send + Sync {
    /// Descriptors for result tagging; order is preserved in output.
    fn params(&self) -> Params;

    /// Materialize this environment's interactions and reward oracle.
    ///
    /// Repeated reads yield equivalent environments. This is the load hook
    /// of a lazy environment; dropping the result is the unload hook.
    fn read(&self) -> BenchResult<MemoryEnvironment>;
}

/// A fully materialized environment: interactions plus the
/// `(key, choice) → reward` table.
#[derive(Clone, Debug)]
pub struct MemoryEnvironment {
    interactions: Vec<Interaction>,
    rewards: HashMap<(Key, Choice), Reward>,
    params: Params,
}

impl MemoryEnvironment {
    /// Build from interactions and one reward per action per interaction.
    pub fn new(
        interactions: Vec<Interaction>,
        reward_sets: Vec<Vec<Reward>>,
    ) -> BenchResult<MemoryEnvironment> {
        if interactions.len() != reward_sets.len() {
            return Err(BenchError::environment(format!(
                "{} interactions but {} reward sets",
                interactions.len(),
                reward_sets.len()
            )));
        }

        let mut rewards = HashMap::new();
        for (interaction, rewards_for) in interactions.iter().zip(&reward_sets) {
            if interaction.actions().len() != rewards_for.len() {
                return Err(BenchError::environment(format!(
                    "interaction {} offers {} actions but has {} rewards",
                    interaction.key(),
                    interaction.actions().len(),
                    rewards_for.len()
                )));
            }
            for (choice, &reward) in rewards_for.iter().enumerate() {
                if reward.is_nan() {
                    return Err(BenchError::environment(format!(
                        "NaN reward at interaction {}, action {}",
                        interaction.key(),
                        choice
                    )));
                }
                rewards.insert((interaction.key(), choice), reward);
            }
        }

        Ok(MemoryEnvironment { interactions, rewards, params: Params::new() })
    }

    pub fn with_params(mut self, params: Params) -> MemoryEnvironment {
        self.params = params;
        self
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Bulk reward lookup for `(key, choice)` pairs, aligned with the input.
    pub fn rewards(&self, choices: &[(Key, Choice)]) -> BenchResult<Vec<Reward>> {
        choices
            .iter()
            .map(|pair| {
                self.rewards.get(pair).copied().ok_or_else(|| {
                    BenchError::environment(format!(
                        "no reward recorded for interaction {} action {}",
                        pair.0, pair.1
                    ))
                })
            })
            .collect()
    }
}

impl Environment for MemoryEnvironment {
    fn params(&self) -> Params {
        self.params.clone()
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        Ok(self.clone())
    }
}

// ── Lambda environment ───────────────────────────────────────────────────────

/// Generator for the context of interaction `i`.
pub type ContextFn = dyn Fn(usize, &mut LcgRandom) -> Context + Send + Sync;
/// Generator for the action set of interaction `i`.
pub type ActionsFn = dyn Fn(usize, &Context, &mut LcgRandom) -> Vec<Action> + Send + Sync;
/// Generator for the reward of one action of interaction `i`.
pub type RewardFn = dyn Fn(usize, &Context, &Action, &mut LcgRandom) -> Reward + Send + Sync;

/// An environment defined by generator functions over an interaction index.
///
/// Every read seeds a fresh generator identically, so repeated reads are
/// bit-identical. Rewards for all actions are pre-computed at read time.
pub struct LambdaEnvironment {
    n_interactions: usize,
    context: Box<ContextFn>,
    actions: Box<ActionsFn>,
    reward: Box<RewardFn>,
    seed: u64,
    params: Params,
}

impl LambdaEnvironment {
    pub fn new(
        n_interactions: usize,
        context: Box<ContextFn>,
        actions: Box<ActionsFn>,
        reward: Box<RewardFn>,
        seed: u64,
    ) -> LambdaEnvironment {
        let params = Params::new()
            .with("type", "lambda")
            .with("n_interactions", n_interactions as u64)
            .with("seed", seed);
        LambdaEnvironment { n_interactions, context, actions, reward, seed, params }
    }

    pub fn with_params(mut self, params: Params) -> LambdaEnvironment {
        self.params = params;
        self
    }
}

impl Environment for LambdaEnvironment {
    fn params(&self) -> Params {
        self.params.clone()
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let mut rng = LcgRandom::from_seed(self.seed);
        let mut interactions = Vec::with_capacity(self.n_interactions);
        let mut reward_sets = Vec::with_capacity(self.n_interactions);

        for i in 0..self.n_interactions {
            let context = (self.context)(i, &mut rng);
            let actions = (self.actions)(i, &context, &mut rng);
            if actions.is_empty() {
                return Err(BenchError::environment(format!(
                    "interaction {i} produced an empty action set"
                )));
            }
            let rewards: Vec<Reward> = actions
                .iter()
                .map(|action| (self.reward)(i, &context, action, &mut rng))
                .collect();
            interactions.push(Interaction::new(i as Key, context, actions));
            reward_sets.push(rewards);
        }

        Ok(MemoryEnvironment::new(interactions, reward_sets)?.with_params(self.params.clone()))
    }
}

// ── Shuffle / take wrappers ──────────────────────────────────────────────────

/// Presents another environment's interactions in a seeded shuffled order.
///
/// Keys are preserved, so the reward table of the inner read stays valid.
pub struct ShuffledEnvironment {
    inner: Box<dyn Environment>,
    seed: u64,
}

impl ShuffledEnvironment {
    pub fn new(inner: Box<dyn Environment>, seed: u64) -> ShuffledEnvironment {
        ShuffledEnvironment { inner, seed }
    }
}

impl Environment for ShuffledEnvironment {
    fn params(&self) -> Params {
        let mut params = Params::new();
        for (k, v) in self.inner.params().iter() {
            params = params.with(k.clone(), v.clone());
        }
        params.with("shuffle", self.seed)
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let inner = self.inner.read()?;
        let mut interactions = inner.interactions.clone();
        LcgRandom::from_seed(self.seed).shuffle(&mut interactions);
        Ok(MemoryEnvironment {
            interactions,
            rewards: inner.rewards,
            params: self.params(),
        })
    }
}

/// Truncates another environment to its first `count` interactions.
pub struct TakeEnvironment {
    inner: Box<dyn Environment>,
    count: usize,
}

impl TakeEnvironment {
    pub fn new(inner: Box<dyn Environment>, count: usize) -> TakeEnvironment {
        TakeEnvironment { inner, count }
    }
}

impl Environment for TakeEnvironment {
    fn params(&self) -> Params {
        let mut params = Params::new();
        for (k, v) in self.inner.params().iter() {
            params = params.with(k.clone(), v.clone());
        }
        params.with("take", self.count as u64)
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let inner = self.inner.read()?;
        let mut interactions = inner.interactions.clone();
        interactions.truncate(self.count);
        Ok(MemoryEnvironment {
            interactions,
            rewards: inner.rewards,
            params: self.params(),
        })
    }
}

// ── Tabular environment builders ─────────────────────────────────────────────

/// Flatten an encoded feature row into a context tuple; one-hot cells expand
/// into their components.
pub fn row_to_context(row: &crate::rows::Row) -> Context {
    let mut features = Vec::new();
    for cell in row.cells() {
        match cell {
            Cell::Num(v) => features.push(Feature::Num(*v)),
            Cell::Str(s) | Cell::Raw(s) => features.push(Feature::Str(s.clone())),
            Cell::Hot(bits) => features.extend(bits.iter().map(|&b| Feature::Num(b))),
        }
    }
    if features.is_empty() {
        Context::None
    } else {
        Context::Tuple(features)
    }
}

fn label_to_action(label: &Cell) -> BenchResult<Action> {
    match label {
        Cell::Hot(bits) => Ok(Action::nums(bits.clone())),
        Cell::Str(s) | Cell::Raw(s) => Ok(Action::str(s.clone())),
        Cell::Num(v) => Ok(Action::num(*v)),
    }
}

/// Build a classification environment from labeled rows.
///
/// The action set is the distinct labels in first-appearance order; each
/// interaction's reward is 1 for the action matching its own label and 0
/// otherwise.
pub fn classification_environment(rows: &[LabeledRow]) -> BenchResult<MemoryEnvironment> {
    if rows.is_empty() {
        return Err(BenchError::environment("no rows survived the pipeline"));
    }

    let mut action_set: Vec<Action> = Vec::new();
    let labels: Vec<Action> =
        rows.iter().map(|row| label_to_action(&row.label)).collect::<BenchResult<_>>()?;
    for label in &labels {
        if !action_set.contains(label) {
            action_set.push(label.clone());
        }
    }

    let mut interactions = Vec::with_capacity(rows.len());
    let mut reward_sets = Vec::with_capacity(rows.len());
    for (i, (row, label)) in rows.iter().zip(&labels).enumerate() {
        let context = row_to_context(&row.features);
        let rewards: Vec<Reward> =
            action_set.iter().map(|a| if a == label { 1.0 } else { 0.0 }).collect();
        interactions.push(Interaction::new(i as Key, context, action_set.clone()));
        reward_sets.push(rewards);
    }

    MemoryEnvironment::new(interactions, reward_sets)
}

/// Build a regression environment from labeled rows.
///
/// The action set is the distinct observed label values in first-appearance
/// order; the reward for action `a` on a row labeled `y` is `1 - |y - a|`
/// clipped to `[0, 1]`.
pub fn regression_environment(rows: &[LabeledRow]) -> BenchResult<MemoryEnvironment> {
    if rows.is_empty() {
        return Err(BenchError::environment("no rows survived the pipeline"));
    }

    let labels: Vec<f64> = rows
        .iter()
        .map(|row| match &row.label {
            Cell::Num(v) => Ok(*v),
            other => Err(BenchError::environment(format!(
                "regression target must be numeric, got {other:?}"
            ))),
        })
        .collect::<BenchResult<_>>()?;

    let mut action_values: Vec<f64> = Vec::new();
    for &y in &labels {
        if !action_values.iter().any(|&v| v.to_bits() == y.to_bits()) {
            action_values.push(y);
        }
    }
    let action_set: Vec<Action> = action_values.iter().map(|&v| Action::num(v)).collect();

    let mut interactions = Vec::with_capacity(rows.len());
    let mut reward_sets = Vec::with_capacity(rows.len());
    for (i, (row, &y)) in rows.iter().zip(&labels).enumerate() {
        let context = row_to_context(&row.features);
        let rewards: Vec<Reward> =
            action_values.iter().map(|&a| (1.0 - (y - a).abs()).clamp(0.0, 1.0)).collect();
        interactions.push(Interaction::new(i as Key, context, action_set.clone()));
        reward_sets.push(rewards);
    }

    MemoryEnvironment::new(interactions, reward_sets)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn int_actions(values: &[i64]) -> Vec<Action> {
        values.iter().map(|&v| Action::num(v as f64)).collect()
    }

    fn counting_env(n: usize, action_values: &'static [i64]) -> LambdaEnvironment {
        LambdaEnvironment::new(
            n,
            Box::new(|i, _| Context::from(i as f64)),
            Box::new(move |_, _, _| int_actions(action_values)),
            Box::new(|_, _, action, _| match action {
                Action::Single(Feature::Num(v)) => *v,
                _ => 0.0,
            }),
            1,
        )
    }

    // ── Feature hashing / equality ───────────────────────────────────────────

    #[test]
    fn test_feature_equality_is_structural() {
        assert_eq!(Feature::Num(1.0), Feature::Num(1.0));
        assert_ne!(Feature::Num(1.0), Feature::Num(2.0));
        assert_ne!(Feature::Num(1.0), Feature::Str("1.0".into()));
        assert_eq!(Feature::Str("a".into()), Feature::Str("a".into()));
    }

    #[test]
    fn test_context_and_action_are_hashable() {
        let mut table: HashMap<(Context, Action), f64> = HashMap::new();
        let ctx = Context::nums(vec![0.1, 0.2]);
        let act = Action::one_hot(1, 3);
        table.insert((ctx.clone(), act.clone()), 0.5);
        assert_eq!(table.get(&(ctx, act)), Some(&0.5));
    }

    #[test]
    fn test_feature_count() {
        assert_eq!(Context::None.feature_count(), 0);
        assert_eq!(Context::from(3.0).feature_count(), 1);
        assert_eq!(Context::from("hot").feature_count(), 1);
        assert_eq!(Context::nums(vec![1.0, 2.0, 3.0]).feature_count(), 3);
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Feature::Num(1.0));
        assert_eq!(Context::Map(map).feature_count(), 1);
    }

    // ── Interaction ──────────────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "at least one action")]
    fn test_interaction_requires_actions() {
        let _ = Interaction::new(0, Context::None, vec![]);
    }

    // ── Params ───────────────────────────────────────────────────────────────

    #[test]
    fn test_params_preserve_order_in_json() {
        let params = Params::new().with("zeta", 1).with("alpha", 2).with("mid", "x");
        let json = serde_json::to_string(&params).expect("serialize");
        assert_eq!(json, r#"{"zeta":1,"alpha":2,"mid":"x"}"#);
    }

    // ── MemoryEnvironment ────────────────────────────────────────────────────

    #[test]
    fn test_memory_environment_reward_lookup() {
        let env = counting_env(3, &[0, 1, 2]).read().expect("read");
        let rewards = env.rewards(&[(0, 2), (1, 0), (2, 1)]).expect("rewards");
        assert_eq!(rewards, vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_memory_environment_unknown_choice_errors() {
        let env = counting_env(2, &[0, 1]).read().expect("read");
        assert!(env.rewards(&[(0, 5)]).is_err());
        assert!(env.rewards(&[(99, 0)]).is_err());
    }

    #[test]
    fn test_memory_environment_rejects_nan_rewards() {
        let result = MemoryEnvironment::new(
            vec![Interaction::new(0, Context::None, int_actions(&[1]))],
            vec![vec![f64::NAN]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_environment_rejects_mismatched_rewards() {
        let result = MemoryEnvironment::new(
            vec![Interaction::new(0, Context::None, int_actions(&[1, 2]))],
            vec![vec![0.5]],
        );
        assert!(result.is_err());
    }

    // ── LambdaEnvironment ────────────────────────────────────────────────────

    #[test]
    fn test_lambda_environment_keys_are_dense() {
        let env = counting_env(5, &[0, 1, 2]).read().expect("read");
        let keys: Vec<Key> = env.interactions().iter().map(|i| i.key()).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_lambda_environment_rereads_identically() {
        let env = LambdaEnvironment::new(
            20,
            Box::new(|_, rng| Context::nums(rng.uniforms(3))),
            Box::new(|_, _, rng| {
                (0..4).map(|_| Action::nums(rng.uniforms(2))).collect()
            }),
            Box::new(|_, _, _, rng| rng.uniform()),
            77,
        );
        let first = env.read().expect("read");
        let second = env.read().expect("read");
        assert_eq!(first.interactions(), second.interactions());

        let pairs: Vec<(Key, Choice)> =
            first.interactions().iter().map(|i| (i.key(), 0)).collect();
        assert_eq!(
            first.rewards(&pairs).expect("rewards"),
            second.rewards(&pairs).expect("rewards")
        );
    }

    #[test]
    fn test_lambda_environment_empty_action_set_errors() {
        let env = LambdaEnvironment::new(
            1,
            Box::new(|_, _| Context::None),
            Box::new(|_, _, _| vec![]),
            Box::new(|_, _, _, _| 0.0),
            1,
        );
        assert!(env.read().is_err());
    }

    // ── Shuffle / take ───────────────────────────────────────────────────────

    #[test]
    fn test_shuffled_environment_is_a_permutation() {
        let base = counting_env(10, &[0, 1, 2]);
        let shuffled = ShuffledEnvironment::new(Box::new(base), 3);
        let env = shuffled.read().expect("read");

        let mut keys: Vec<Key> = env.interactions().iter().map(|i| i.key()).collect();
        assert_ne!(keys, (0..10).collect::<Vec<Key>>(), "order should change");
        keys.sort_unstable();
        assert_eq!(keys, (0..10).collect::<Vec<Key>>(), "same interactions");

        // Rewards still resolve through the original keys.
        let rewards = env.rewards(&[(7, 1)]).expect("rewards");
        assert_eq!(rewards, vec![1.0]);
    }

    #[test]
    fn test_take_environment_truncates() {
        let env = TakeEnvironment::new(Box::new(counting_env(10, &[0, 1])), 4)
            .read()
            .expect("read");
        assert_eq!(env.interactions().len(), 4);
    }

    // ── Tabular builders ─────────────────────────────────────────────────────

    fn labeled(features: &[Cell], label: Cell) -> LabeledRow {
        let headers =
            Arc::new((0..features.len()).map(|i| format!("f{i}")).collect::<Vec<_>>());
        LabeledRow {
            features: crate::rows::Row::new(headers, features.to_vec()).expect("row"),
            label,
        }
    }

    #[test]
    fn test_classification_rewards_match_labels() {
        let rows = vec![
            labeled(&[Cell::Num(0.1)], Cell::Str("a".into())),
            labeled(&[Cell::Num(0.2)], Cell::Str("b".into())),
            labeled(&[Cell::Num(0.3)], Cell::Str("a".into())),
        ];
        let env = classification_environment(&rows).expect("env");

        assert_eq!(env.interactions().len(), 3);
        // Action set: distinct labels in first-appearance order.
        assert_eq!(
            env.interactions()[0].actions(),
            &[Action::str("a"), Action::str("b")]
        );
        // Row 0 is labeled "a" (action 0), row 1 "b" (action 1).
        assert_eq!(env.rewards(&[(0, 0), (0, 1)]).expect("rewards"), vec![1.0, 0.0]);
        assert_eq!(env.rewards(&[(1, 0), (1, 1)]).expect("rewards"), vec![0.0, 1.0]);
    }

    #[test]
    fn test_classification_one_hot_labels() {
        let rows = vec![
            labeled(&[Cell::Num(1.0)], Cell::Hot(vec![1.0, 0.0])),
            labeled(&[Cell::Num(2.0)], Cell::Hot(vec![0.0, 1.0])),
        ];
        let env = classification_environment(&rows).expect("env");
        assert_eq!(
            env.interactions()[0].actions(),
            &[Action::nums(vec![1.0, 0.0]), Action::nums(vec![0.0, 1.0])]
        );
        assert_eq!(env.rewards(&[(0, 0)]).expect("rewards"), vec![1.0]);
    }

    #[test]
    fn test_classification_context_expands_one_hot_features() {
        let rows = vec![labeled(
            &[Cell::Num(3.0), Cell::Hot(vec![0.0, 1.0])],
            Cell::Str("y".into()),
        )];
        let env = classification_environment(&rows).expect("env");
        assert_eq!(
            env.interactions()[0].context(),
            &Context::nums(vec![3.0, 0.0, 1.0])
        );
    }

    #[test]
    fn test_regression_reward_is_clipped_distance() {
        let rows = vec![
            labeled(&[Cell::Num(0.0)], Cell::Num(0.2)),
            labeled(&[Cell::Num(1.0)], Cell::Num(0.9)),
        ];
        let env = regression_environment(&rows).expect("env");
        // Actions are the observed labels [0.2, 0.9].
        let rewards = env.rewards(&[(0, 0), (0, 1)]).expect("rewards");
        assert!((rewards[0] - 1.0).abs() < 1e-12);
        assert!((rewards[1] - (1.0 - 0.7)).abs() < 1e-12);
    }

    #[test]
    fn test_regression_rejects_non_numeric_labels() {
        let rows = vec![labeled(&[Cell::Num(0.0)], Cell::Str("oops".into()))];
        assert!(regression_environment(&rows).is_err());
    }

    #[test]
    fn test_empty_rows_error() {
        assert!(classification_environment(&[]).is_err());
        assert!(regression_environment(&[]).is_err());
    }
}
