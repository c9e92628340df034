//! Solver contract and bundled global optimizer
//!
//! A [`Solver`] minimizes a scalar objective over a box-bounded parameter
//! vector. The fitter supplies the objective (parameter write-back plus FOM
//! evaluation) and the bounds; solvers see nothing but the vector-to-scalar
//! mapping, so any box-constrained minimizer can be plugged in.

pub mod differential_evolution;

pub use differential_evolution::{DeStrategy, DifferentialEvolution};

use std::fmt;

use ndarray::Array1;
use rand::Rng;

use crate::error::Result;

/// Objective function handed to a solver: candidate vector in, FOM out.
///
/// Errors from the objective (failed simulation, bad parameter name) abort
/// the solve and propagate unchanged.
pub type Objective<'a> = dyn FnMut(&Array1<f64>) -> Result<f64> + 'a;

/// Outcome of a solve.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Best parameter vector found, in the bounds' order.
    pub x: Array1<f64>,
    /// Objective value at `x`.
    pub fom: f64,
    /// Whether the solver's own convergence criterion was met (as opposed to
    /// hitting an iteration limit).
    pub success: bool,
    /// Number of objective evaluations.
    pub nfev: usize,
    /// Number of iterations (generations, for population solvers).
    pub iterations: usize,
    /// Human-readable termination reason.
    pub message: String,
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solve result:")?;
        writeln!(f, "  fom:        {:e}", self.fom)?;
        writeln!(f, "  success:    {}", self.success)?;
        writeln!(f, "  nfev:       {}", self.nfev)?;
        writeln!(f, "  iterations: {}", self.iterations)?;
        write!(f, "  message:    {}", self.message)
    }
}

/// A box-constrained scalar minimizer.
pub trait Solver {
    /// Minimize `objective` within `bounds` (one `(low, high)` pair per
    /// dimension, `low <= high` guaranteed by the caller).
    fn solve(&self, objective: &mut Objective<'_>, bounds: &[(f64, f64)]) -> Result<SolveResult>;
}

/// Sample a uniform random point inside the bounds box.
pub(crate) fn random_point(rng: &mut impl Rng, bounds: &[(f64, f64)]) -> Array1<f64> {
    Array1::from_iter(bounds.iter().map(|&(low, high)| rng.gen_range(low..=high)))
}

/// Clip each component into its bounds interval.
pub(crate) fn clip_to_bounds(point: &mut Array1<f64>, bounds: &[(f64, f64)]) {
    for (value, &(low, high)) in point.iter_mut().zip(bounds.iter()) {
        *value = value.clamp(low, high);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_point_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = [(-1.0, 1.0), (0.0, 10.0), (5.0, 5.0)];
        for _ in 0..100 {
            let p = random_point(&mut rng, &bounds);
            for (v, &(low, high)) in p.iter().zip(bounds.iter()) {
                assert!(*v >= low && *v <= high);
            }
        }
    }

    #[test]
    fn test_clip_to_bounds() {
        let mut p = array![-2.0, 0.5, 99.0];
        clip_to_bounds(&mut p, &[(-1.0, 1.0), (0.0, 1.0), (0.0, 10.0)]);
        assert_eq!(p, array![-1.0, 0.5, 10.0]);
    }

    #[test]
    fn test_solve_result_display_mentions_termination() {
        let result = SolveResult {
            x: array![1.0],
            fom: 0.5,
            success: true,
            nfev: 42,
            iterations: 3,
            message: "converged".to_string(),
        };
        let text = format!("{}", result);
        assert!(text.contains("converged"));
        assert!(text.contains("42"));
    }
}
