//! Fit orchestration
//!
//! [`Fitter`] wires the three halves together: a [`ParameterController`]
//! holding the model parameters, a [`FomHandler`] holding the datasets, and a
//! [`Solver`] minimizing the composite FOM. The fitter builds the objective
//! closure the solver sees: write the candidate vector into the free
//! parameters, run the handler, return the composite.

use crate::dataset::Dataset;
use crate::error::{FitError, Result};
use crate::fom::{FomHandler, FomMetric};
use crate::parameters::{Key, ParameterController};
use crate::solver::{SolveResult, Solver};

/// Drives a solver against the datasets' composite figure of merit.
///
/// Free parameters are the controller's fitted ones, in the controller's
/// insertion order. After a successful [`optimize`](Fitter::optimize) the best
/// vector is written back into the controller and the handler holds the FOM
/// state for that vector, so simulated curves and per-dataset FOMs can be read
/// off directly.
pub struct Fitter<S: Solver> {
    controller: ParameterController,
    handler: FomHandler,
    solver: S,
}

impl<S: Solver> Fitter<S> {
    pub fn new(controller: ParameterController, solver: S) -> Self {
        Self {
            controller,
            handler: FomHandler::new(),
            solver,
        }
    }

    /// Add a dataset for the fit; `fit = false` tracks it without letting it
    /// influence the solver.
    pub fn add_dataset(&mut self, dataset: Dataset, metric: FomMetric, fit: bool) -> &mut Self {
        self.handler.add_dataset(dataset, metric, fit);
        self
    }

    /// Register a hook run before every objective evaluation.
    pub fn add_preprocessor(&mut self, hook: impl FnMut() + 'static) -> &mut Self {
        self.handler.add_preprocessor(hook);
        self
    }

    pub fn controller(&self) -> &ParameterController {
        &self.controller
    }

    pub fn fom_handler(&self) -> &FomHandler {
        &self.handler
    }

    pub fn fom_handler_mut(&mut self) -> &mut FomHandler {
        &mut self.handler
    }

    /// Keys of the free parameters, in the order the solve vector uses.
    pub fn fit_keys(&self) -> Vec<Key> {
        self.controller.keys(true)
    }

    /// Evaluate the composite FOM at the controller's current values.
    pub fn evaluate(&mut self) -> Result<f64> {
        self.handler.calc()
    }

    /// Run the solver over the free parameters.
    ///
    /// On return the controller holds the best vector found and the handler's
    /// FOM state matches it. Fails up front if no parameter is marked for
    /// fitting; solver and simulation errors propagate.
    pub fn optimize(&mut self) -> Result<SolveResult> {
        let keys = self.controller.keys(true);
        if keys.is_empty() {
            return Err(FitError::NoFreeParameters {
                controller: self.controller.name().to_string(),
            });
        }
        let bounds = self.controller.fit_bounds()?;

        let result = {
            let controller = &self.controller;
            let handler = &mut self.handler;
            let mut objective = |x: &ndarray::Array1<f64>| -> Result<f64> {
                for (key, &value) in keys.iter().zip(x.iter()) {
                    controller
                        .get_scoped(&key.scope, &key.name)?
                        .set_value(value)?;
                }
                handler.calc()
            };
            self.solver.solve(&mut objective, &bounds)?
        };

        // Leave the controller and handler at the optimum, not at whatever
        // candidate the solver evaluated last.
        for (key, &value) in keys.iter().zip(result.x.iter()) {
            self.controller
                .get_scoped(&key.scope, &key.name)?
                .set_value(value)?;
        }
        self.handler.calc()?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameter;
    use crate::solver::DifferentialEvolution;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn fitter_with_linear_model() -> Fitter<DifferentialEvolution> {
        // y = a * x + b sampled at x = 0, 1, 2 with a = 2, b = 1
        let a = Parameter::fitted("a", 0.5, 0.0, 5.0).unwrap();
        let b = Parameter::fitted("b", 0.5, 0.0, 5.0).unwrap();
        let mut controller = ParameterController::new("model");
        controller.add(&a).unwrap();
        controller.add(&b).unwrap();

        let sim_a = a.clone();
        let sim_b = b.clone();
        let dataset = Dataset::new(array![0.0, 1.0, 2.0], array![1.0, 3.0, 5.0], move || {
            let a = sim_a.scalar()?;
            let b = sim_b.scalar()?;
            let x = array![0.0, 1.0, 2.0];
            let y = x.mapv(|xi| a * xi + b);
            Ok((x, y))
        })
        .unwrap();

        let solver = DifferentialEvolution::new()
            .with_seed(11)
            .with_max_iterations(400)
            .with_max_stall(50);
        let mut fitter = Fitter::new(controller, solver);
        fitter.add_dataset(dataset, FomMetric::Diff, true);
        fitter
    }

    #[test]
    fn test_optimize_recovers_linear_coefficients() {
        let mut fitter = fitter_with_linear_model();
        let result = fitter.optimize().unwrap();
        assert!(result.fom < 1e-6, "fom = {}", result.fom);
        assert_relative_eq!(fitter.controller().scalar("a").unwrap(), 2.0, epsilon = 1e-3);
        assert_relative_eq!(fitter.controller().scalar("b").unwrap(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_controller_matches_result_vector_after_optimize() {
        let mut fitter = fitter_with_linear_model();
        let result = fitter.optimize().unwrap();
        let keys = fitter.fit_keys();
        assert_eq!(keys.len(), result.x.len());
        for (key, &value) in keys.iter().zip(result.x.iter()) {
            let stored = fitter
                .controller()
                .get_scoped(&key.scope, &key.name)
                .unwrap()
                .scalar()
                .unwrap();
            assert_relative_eq!(stored, value);
        }
        // handler state corresponds to the optimum too
        assert_relative_eq!(
            fitter.fom_handler().composite().unwrap(),
            result.fom,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_optimize_without_free_parameters_fails() {
        let fixed = Parameter::new("c", 1.0);
        let mut controller = ParameterController::new("rigid");
        controller.add(&fixed).unwrap();
        let mut fitter = Fitter::new(controller, DifferentialEvolution::new().with_seed(1));
        fitter.add_dataset(
            Dataset::new(array![0.0], array![1.0], || Ok((array![0.0], array![1.0]))).unwrap(),
            FomMetric::Diff,
            true,
        );
        assert!(matches!(
            fitter.optimize(),
            Err(FitError::NoFreeParameters { .. })
        ));
    }

    #[test]
    fn test_evaluate_uses_current_parameter_values() {
        let mut fitter = fitter_with_linear_model();
        fitter.controller().set_value("a", 2.0).unwrap();
        fitter.controller().set_value("b", 1.0).unwrap();
        let fom = fitter.evaluate().unwrap();
        assert_relative_eq!(fom, 0.0, epsilon = 1e-12);
    }
}
