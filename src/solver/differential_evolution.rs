//! Differential evolution solver
//!
//! Population-based global minimizer in the style of Storn and Price.
//! Mutation builds a donor vector from scaled population differences, binomial
//! crossover mixes it with the target, and greedy selection keeps whichever of
//! the two scores better. Seedable for reproducible fits.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{clip_to_bounds, random_point, Objective, SolveResult, Solver};
use crate::error::Result;

/// Mutation strategy for donor vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeStrategy {
    /// `x_r1 + F * (x_r2 - x_r3)` with random distinct members.
    Rand1,
    /// `x_best + F * (x_r1 - x_r2)`, pulls toward the current best.
    Best1,
    /// `x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`.
    CurrentToBest1,
}

/// Differential evolution with binomial crossover.
///
/// # Examples
///
/// ```
/// use fomfit::{DifferentialEvolution, Solver};
/// use ndarray::Array1;
///
/// let solver = DifferentialEvolution::new().with_seed(42);
/// let mut sphere =
///     |x: &Array1<f64>| -> fomfit::Result<f64> { Ok(x.iter().map(|v| v * v).sum()) };
/// let result = solver.solve(&mut sphere, &[(-5.0, 5.0), (-5.0, 5.0)]).unwrap();
/// assert!(result.fom < 1e-6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialEvolution {
    /// Population size per dimension (population = multiplier * n_params,
    /// floored at 4 members).
    pop_size_multiplier: usize,
    /// Mutation scale factor F, typically in `[0.4, 1.0]`.
    differential_weight: f64,
    /// Binomial crossover probability CR.
    crossover_prob: f64,
    strategy: DeStrategy,
    max_iterations: usize,
    /// Generations without improvement before giving up.
    max_stall: usize,
    /// Absolute objective improvement below which a generation counts as
    /// stalled.
    tol: f64,
    /// RNG seed; `None` draws from entropy.
    seed: Option<u64>,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            pop_size_multiplier: 10,
            differential_weight: 0.8,
            crossover_prob: 0.9,
            strategy: DeStrategy::Best1,
            max_iterations: 1000,
            max_stall: 100,
            tol: 1e-10,
            seed: None,
        }
    }
}

impl DifferentialEvolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: DeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_population_multiplier(mut self, multiplier: usize) -> Self {
        self.pop_size_multiplier = multiplier.max(1);
        self
    }

    pub fn with_differential_weight(mut self, weight: f64) -> Self {
        self.differential_weight = weight;
        self
    }

    pub fn with_crossover_probability(mut self, prob: f64) -> Self {
        self.crossover_prob = prob.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_max_stall(mut self, stall: usize) -> Self {
        self.max_stall = stall.max(1);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the trial vector for population member `target_idx`.
    fn create_trial(
        &self,
        target_idx: usize,
        best_idx: usize,
        population: &[Array1<f64>],
        bounds: &[(f64, f64)],
        rng: &mut StdRng,
    ) -> Array1<f64> {
        let n_params = bounds.len();
        let f = self.differential_weight;

        let mut others: Vec<usize> = (0..population.len()).filter(|&i| i != target_idx).collect();
        others.shuffle(rng);

        let mut trial = match self.strategy {
            DeStrategy::Rand1 => {
                let (r1, r2, r3) = (others[0], others[1], others[2]);
                let mut trial = population[r1].clone();
                for j in 0..n_params {
                    trial[j] += f * (population[r2][j] - population[r3][j]);
                }
                trial
            }
            DeStrategy::Best1 => {
                let (r1, r2) = (others[0], others[1]);
                let mut trial = population[best_idx].clone();
                for j in 0..n_params {
                    trial[j] += f * (population[r1][j] - population[r2][j]);
                }
                trial
            }
            DeStrategy::CurrentToBest1 => {
                let (r1, r2) = (others[0], others[1]);
                let mut trial = population[target_idx].clone();
                for j in 0..n_params {
                    trial[j] += f * (population[best_idx][j] - population[target_idx][j]);
                    trial[j] += f * (population[r1][j] - population[r2][j]);
                }
                trial
            }
        };

        // Binomial crossover; j_rand guarantees at least one donor component.
        let target = &population[target_idx];
        let j_rand = rng.gen_range(0..n_params);
        for j in 0..n_params {
            if rng.gen::<f64>() > self.crossover_prob && j != j_rand {
                trial[j] = target[j];
            }
        }

        clip_to_bounds(&mut trial, bounds);
        trial
    }
}

impl Solver for DifferentialEvolution {
    fn solve(&self, objective: &mut Objective<'_>, bounds: &[(f64, f64)]) -> Result<SolveResult> {
        let n_params = bounds.len();
        let pop_size = (self.pop_size_multiplier * n_params).max(4);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut population: Vec<Array1<f64>> =
            (0..pop_size).map(|_| random_point(&mut rng, bounds)).collect();
        let mut costs = Vec::with_capacity(pop_size);
        let mut nfev = 0;
        for member in &population {
            costs.push(objective(member)?);
            nfev += 1;
        }

        let mut best_idx = argmin(&costs);
        let mut best_cost = costs[best_idx];
        let mut stall = 0;
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..self.max_iterations {
            iterations += 1;
            let prev_best = best_cost;

            for i in 0..pop_size {
                let trial = self.create_trial(i, best_idx, &population, bounds, &mut rng);
                let trial_cost = objective(&trial)?;
                nfev += 1;
                if trial_cost < costs[i] {
                    population[i] = trial;
                    costs[i] = trial_cost;
                    if trial_cost < best_cost {
                        best_idx = i;
                        best_cost = trial_cost;
                    }
                }
            }

            if prev_best - best_cost < self.tol {
                stall += 1;
                if stall >= self.max_stall {
                    converged = true;
                    break;
                }
            } else {
                stall = 0;
            }
        }

        let message = if converged {
            format!("converged after {} stalled generations", self.max_stall)
        } else {
            format!("reached iteration limit ({})", self.max_iterations)
        };

        Ok(SolveResult {
            x: population[best_idx].clone(),
            fom: best_cost,
            success: converged,
            nfev,
            iterations,
            message,
        })
    }
}

fn argmin(costs: &[f64]) -> usize {
    let mut best = 0;
    for (i, &c) in costs.iter().enumerate() {
        if c < costs[best] {
            best = i;
        }
    }
    best
}
