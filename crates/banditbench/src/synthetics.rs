//! Synthetic environments with closed-form reward structure.
//!
//! [`LinearSynthetic`] draws context and action feature vectors from
//! `U[0,1]` and scores them with a fixed normalized weight vector over
//! interaction terms; [`LocalSynthetic`] fixes a finite context set and a
//! `(context, action) → U[0,1]` reward table at construction. Both re-seed
//! a fresh generator on every read, so repeated reads are identical.

use std::collections::HashMap;

use crate::environments::{
    Action, Context, Environment, Feature, Interaction, Key, MemoryEnvironment, Params, Reward,
};
use crate::error::{BenchError, BenchResult};
use crate::random::LcgRandom;

// ── Interaction-term encoding ────────────────────────────────────────────────

/// Products over all combinations-with-replacement of `values`, `k` at a
/// time, in lexicographic index order. `k = 0` yields the single product 1.
fn term_products(values: &[f64], k: usize) -> Vec<f64> {
    fn recurse(values: &[f64], k: usize, start: usize, acc: f64, out: &mut Vec<f64>) {
        if k == 0 {
            out.push(acc);
            return;
        }
        for i in start..values.len() {
            recurse(values, k - 1, i, acc * values[i], out);
        }
    }
    let mut out = Vec::new();
    recurse(values, k, 0, 1.0, &mut out);
    out
}

/// Encode `(x, a)` under a list of term shapes.
///
/// A term is a string over the alphabet `{x, a}`: `"a"` contributes the
/// action features, `"x"` the context features, `"xa"` all pairwise
/// products, `"xxa"` all degree-two context terms times each action
/// feature, and so on.
pub fn interaction_features(terms: &[String], x: &[f64], a: &[f64]) -> BenchResult<Vec<f64>> {
    let mut features = Vec::new();
    for term in terms {
        let n_x = term.chars().filter(|&c| c == 'x').count();
        let n_a = term.chars().filter(|&c| c == 'a').count();
        if n_x + n_a != term.len() {
            return Err(BenchError::config(format!(
                "interaction term '{term}' may only contain 'x' and 'a'"
            )));
        }
        for px in term_products(x, n_x) {
            for pa in term_products(a, n_a) {
                features.push(px * pa);
            }
        }
    }
    Ok(features)
}

// ── LinearSynthetic ──────────────────────────────────────────────────────────

/// A synthetic environment whose expected reward is linear in the
/// interaction-term features of `(context, action)`.
///
/// A weight vector is drawn once per read and normalized to sum to one, so
/// with features in `[0,1]` the noiseless reward stays in `[0,1]`. Noise is
/// uniform with variance `r_noise_var`; the final reward is clamped to
/// `[0,1]`.
pub struct LinearSynthetic {
    n_interactions: usize,
    n_actions: usize,
    n_context_features: usize,
    n_action_features: usize,
    r_noise_var: f64,
    terms: Vec<String>,
    seed: u64,
}

impl LinearSynthetic {
    /// # Panics
    ///
    /// Panics when `n_actions` is zero; an interaction needs actions.
    pub fn new(
        n_interactions: usize,
        n_actions: usize,
        n_context_features: usize,
        n_action_features: usize,
        r_noise_var: f64,
        terms: Vec<String>,
        seed: u64,
    ) -> LinearSynthetic {
        assert!(n_actions > 0, "LinearSynthetic requires at least one action");
        LinearSynthetic {
            n_interactions,
            n_actions,
            n_context_features,
            n_action_features,
            r_noise_var,
            terms,
            seed,
        }
    }

    fn feature_width(&self) -> BenchResult<usize> {
        let dummy_x = vec![0.0; self.n_context_features.max(1)];
        let dummy_a = vec![
            0.0;
            if self.n_action_features > 0 {
                self.n_action_features
            } else {
                self.n_actions
            }
        ];
        Ok(interaction_features(&self.terms, &dummy_x, &dummy_a)?.len())
    }
}

impl Default for LinearSynthetic {
    fn default() -> Self {
        LinearSynthetic::new(
            500,
            10,
            10,
            10,
            1.0 / 1000.0,
            vec!["a".to_string(), "xa".to_string()],
            1,
        )
    }
}

fn action_components(action: &Action) -> Vec<f64> {
    match action {
        Action::Single(Feature::Num(v)) => vec![*v],
        Action::Tuple(features) => features
            .iter()
            .map(|f| match f {
                Feature::Num(v) => *v,
                Feature::Str(_) => 0.0,
            })
            .collect(),
        _ => vec![],
    }
}

fn context_components(context: &Context) -> Vec<f64> {
    match context {
        Context::Tuple(features) => features
            .iter()
            .map(|f| match f {
                Feature::Num(v) => *v,
                Feature::Str(_) => 0.0,
            })
            .collect(),
        Context::Single(Feature::Num(v)) => vec![*v],
        // The constant feature stands in when no context exists.
        _ => vec![1.0],
    }
}

impl Environment for LinearSynthetic {
    fn params(&self) -> Params {
        Params::new()
            .with("n_A", self.n_actions as u64)
            .with("n_C_phi", self.n_context_features as u64)
            .with("n_A_phi", self.n_action_features as u64)
            .with("r_noise", self.r_noise_var)
            .with("X", serde_json::Value::from(self.terms.clone()))
            .with("seed", self.seed)
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let mut rng = LcgRandom::from_seed(self.seed);

        let width = self.feature_width()?;
        let raw = rng.uniforms(width);
        let sum: f64 = raw.iter().sum();
        let weights: Vec<f64> = if sum > 0.0 {
            raw.iter().map(|x| x / sum).collect()
        } else {
            vec![1.0 / width as f64; width]
        };

        let noise_scale = (12.0 * self.r_noise_var).sqrt();

        let mut interactions = Vec::with_capacity(self.n_interactions);
        let mut reward_sets = Vec::with_capacity(self.n_interactions);

        for i in 0..self.n_interactions {
            let context = if self.n_context_features > 0 {
                Context::nums(rng.uniforms(self.n_context_features))
            } else {
                Context::None
            };

            let actions: Vec<Action> = if self.n_action_features > 0 {
                (0..self.n_actions)
                    .map(|_| Action::nums(rng.uniforms(self.n_action_features)))
                    .collect()
            } else {
                (0..self.n_actions).map(|j| Action::one_hot(j, self.n_actions)).collect()
            };

            let x = context_components(&context);
            let mut rewards = Vec::with_capacity(actions.len());
            for action in &actions {
                let a = action_components(action);
                let features = interaction_features(&self.terms, &x, &a)?;
                let signal: f64 =
                    weights.iter().zip(&features).map(|(w, f)| w * f).sum();
                let noise = (rng.uniform() - 0.5) * noise_scale;
                rewards.push((signal + noise).clamp(0.0, 1.0));
            }

            interactions.push(Interaction::new(i as Key, context, actions));
            reward_sets.push(rewards);
        }

        Ok(MemoryEnvironment::new(interactions, reward_sets)?.with_params(self.params()))
    }
}

// ── LocalSynthetic ───────────────────────────────────────────────────────────

/// A synthetic environment over a finite context set with a fixed reward
/// table.
///
/// `n_contexts` contexts are drawn once, the action set is the one-hot
/// identity over `n_actions`, and every `(context, action)` pair gets an
/// independent `U[0,1]` reward fixed at read time. Contexts are then drawn
/// with replacement per interaction.
pub struct LocalSynthetic {
    n_interactions: usize,
    n_contexts: usize,
    n_context_features: usize,
    n_actions: usize,
    seed: u64,
}

impl LocalSynthetic {
    /// # Panics
    ///
    /// Panics when `n_actions` or `n_contexts` is zero.
    pub fn new(
        n_interactions: usize,
        n_contexts: usize,
        n_context_features: usize,
        n_actions: usize,
        seed: u64,
    ) -> LocalSynthetic {
        assert!(n_actions > 0, "LocalSynthetic requires at least one action");
        assert!(n_contexts > 0, "LocalSynthetic requires at least one context");
        LocalSynthetic { n_interactions, n_contexts, n_context_features, n_actions, seed }
    }
}

impl Default for LocalSynthetic {
    fn default() -> Self {
        LocalSynthetic::new(500, 200, 2, 10, 1)
    }
}

impl Environment for LocalSynthetic {
    fn params(&self) -> Params {
        Params::new()
            .with("n_A", self.n_actions as u64)
            .with("n_C", self.n_contexts as u64)
            .with("n_C_phi", self.n_context_features as u64)
            .with("seed", self.seed)
    }

    fn read(&self) -> BenchResult<MemoryEnvironment> {
        let mut rng = LcgRandom::from_seed(self.seed);

        let contexts: Vec<Context> = (0..self.n_contexts)
            .map(|_| Context::nums(rng.uniforms(self.n_context_features)))
            .collect();
        let actions: Vec<Action> =
            (0..self.n_actions).map(|j| Action::one_hot(j, self.n_actions)).collect();

        let mut table: HashMap<(Context, Action), Reward> = HashMap::new();
        for context in &contexts {
            for action in &actions {
                table.insert((context.clone(), action.clone()), rng.uniform());
            }
        }

        let mut interactions = Vec::with_capacity(self.n_interactions);
        let mut reward_sets = Vec::with_capacity(self.n_interactions);
        for i in 0..self.n_interactions {
            let context = rng.choice(&contexts).clone();
            let rewards: Vec<Reward> = actions
                .iter()
                .map(|action| {
                    *table
                        .get(&(context.clone(), action.clone()))
                        .expect("table covers every drawn context and action")
                })
                .collect();
            interactions.push(Interaction::new(i as Key, context, actions.clone()));
            reward_sets.push(rewards);
        }

        Ok(MemoryEnvironment::new(interactions, reward_sets)?.with_params(self.params()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
