//! Figure-of-merit calculation and multi-dataset aggregation
//!
//! [`FomCalculator`] couples one dataset with one metric and produces the
//! per-point array plus its scalar reduction. [`FomHandler`] owns a list of
//! datasets, runs registered preprocessing hooks, evaluates each active
//! dataset, and combines the per-dataset scalars into the composite value a
//! solver minimizes.

pub mod metrics;

pub use metrics::FomMetric;

use ndarray::Array1;

use crate::dataset::Dataset;
use crate::error::{FitError, Result};

/// One dataset evaluated against one metric.
///
/// Construction simulates the dataset and computes both the array and the
/// scalar immediately, so a freshly built calculator is always consistent
/// with the current parameter state.
#[derive(Debug)]
pub struct FomCalculator {
    x_sim: Array1<f64>,
    y_sim: Array1<f64>,
    fom_array: Array1<f64>,
    fom: f64,
}

impl FomCalculator {
    /// Simulate `dataset` and evaluate `metric` against the result.
    ///
    /// Simulation may re-grid the dataset (see [`Dataset::simulate`]), which
    /// is why the dataset is taken mutably.
    pub fn new(dataset: &mut Dataset, metric: FomMetric) -> Result<Self> {
        let (x_sim, y_sim) = dataset.simulate()?;
        let fom_array = metric.array(&y_sim, dataset)?;
        let fom = metric.reduce(&fom_array, dataset);
        Ok(Self {
            x_sim,
            y_sim,
            fom_array,
            fom,
        })
    }

    pub fn x_sim(&self) -> &Array1<f64> {
        &self.x_sim
    }

    pub fn y_sim(&self) -> &Array1<f64> {
        &self.y_sim
    }

    /// Per-point discrepancy array, masked points zeroed.
    pub fn fom_array(&self) -> &Array1<f64> {
        &self.fom_array
    }

    /// The scalar figure of merit.
    pub fn fom(&self) -> f64 {
        self.fom
    }
}

struct DatasetEntry {
    dataset: Dataset,
    metric: FomMetric,
    fit: bool,
}

/// Multi-dataset FOM aggregator.
///
/// Datasets keep the order they were added in; that order is also the order
/// of the [`foms`](FomHandler::foms) and [`fom_arrays`](FomHandler::fom_arrays)
/// vectors after a [`calc`](FomHandler::calc). Datasets added with
/// `fit = false` are still simulated on every pass (their simulated curves
/// stay current for inspection) but contribute a zero FOM and are excluded
/// from the composite.
#[derive(Default)]
pub struct FomHandler {
    preprocessors: Vec<Box<dyn FnMut()>>,
    entries: Vec<DatasetEntry>,
    foms: Vec<f64>,
    fom_arrays: Vec<Option<Array1<f64>>>,
    composite: Option<f64>,
}

impl FomHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run before every evaluation pass, in registration
    /// order. Hooks typically push derived parameter state into whatever the
    /// simulation closures read.
    pub fn add_preprocessor(&mut self, hook: impl FnMut() + 'static) -> &mut Self {
        self.preprocessors.push(Box::new(hook));
        self
    }

    /// Add a dataset with its metric. `fit = false` keeps the dataset
    /// simulated but out of the composite.
    pub fn add_dataset(&mut self, dataset: Dataset, metric: FomMetric, fit: bool) -> &mut Self {
        self.entries.push(DatasetEntry { dataset, metric, fit });
        self.foms.push(0.0);
        self.fom_arrays.push(None);
        self
    }

    /// Number of datasets contributing to the composite.
    pub fn num_active(&self) -> usize {
        self.entries.iter().filter(|e| e.fit).count()
    }

    pub fn num_datasets(&self) -> usize {
        self.entries.len()
    }

    pub fn dataset(&self, index: usize) -> Option<&Dataset> {
        self.entries.get(index).map(|e| &e.dataset)
    }

    pub fn dataset_mut(&mut self, index: usize) -> Option<&mut Dataset> {
        self.entries.get_mut(index).map(|e| &mut e.dataset)
    }

    /// Per-dataset scalars from the last [`calc`](FomHandler::calc); zero for
    /// non-fit datasets.
    pub fn foms(&self) -> &[f64] {
        &self.foms
    }

    /// Per-dataset arrays from the last [`calc`](FomHandler::calc); `None`
    /// for non-fit datasets.
    pub fn fom_arrays(&self) -> &[Option<Array1<f64>>] {
        &self.fom_arrays
    }

    /// Composite value from the last [`calc`](FomHandler::calc), if any.
    pub fn composite(&self) -> Option<f64> {
        self.composite
    }

    /// Run all hooks, simulate every dataset, and return the composite FOM
    /// (the mean of the active datasets' scalars).
    pub fn calc(&mut self) -> Result<f64> {
        for hook in &mut self.preprocessors {
            hook();
        }
        if self.num_active() == 0 {
            return Err(FitError::NoActiveDatasets);
        }
        let mut total = 0.0;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            let calc = FomCalculator::new(&mut entry.dataset, entry.metric)?;
            if entry.fit {
                total += calc.fom();
                self.foms[i] = calc.fom();
                self.fom_arrays[i] = Some(calc.fom_array().clone());
            } else {
                self.foms[i] = 0.0;
                self.fom_arrays[i] = None;
            }
        }
        let composite = total / self.num_active() as f64;
        self.composite = Some(composite);
        Ok(composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::cell::Cell;
    use std::rc::Rc;

    fn constant_dataset(y: Array1<f64>, y_sim: Array1<f64>) -> Dataset {
        let x = Array1::from_iter((0..y.len()).map(|i| i as f64));
        let x_sim = x.clone();
        Dataset::new(x, y, move || Ok((x_sim.clone(), y_sim.clone()))).unwrap()
    }

    #[test]
    fn test_calculator_matches_manual_evaluation() {
        let mut ds = constant_dataset(array![1.0, 8.0, 27.0], array![1.0, 4.0, 9.0]);
        let calc = FomCalculator::new(&mut ds, FomMetric::Diff).unwrap();
        assert_eq!(calc.fom_array(), &array![0.0, 4.0, 18.0]);
        assert_relative_eq!(calc.fom(), 22.0 / 3.0);
        assert_eq!(calc.y_sim(), &array![1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_composite_is_mean_of_active_foms() {
        let mut handler = FomHandler::new();
        // foms: 0.0, 22/3, and a masked dataset giving 4/2
        handler.add_dataset(
            constant_dataset(array![1.0, 2.0, 3.0], array![1.0, 2.0, 3.0]),
            FomMetric::Diff,
            true,
        );
        handler.add_dataset(
            constant_dataset(array![1.0, 8.0, 27.0], array![1.0, 4.0, 9.0]),
            FomMetric::Diff,
            true,
        );
        let mut masked = constant_dataset(array![1.0, 8.0, 27.0], array![1.0, 4.0, 9.0]);
        masked.mask_above(1.5);
        handler.add_dataset(masked, FomMetric::Diff, true);

        let composite = handler.calc().unwrap();
        let expected = (0.0 + 22.0 / 3.0 + 4.0 / 2.0) / 3.0;
        assert_relative_eq!(composite, expected);
        assert_relative_eq!(handler.foms()[1], 22.0 / 3.0);
        assert_eq!(handler.composite(), Some(composite));
    }

    #[test]
    fn test_non_fit_dataset_is_simulated_but_excluded() {
        let mut handler = FomHandler::new();
        handler.add_dataset(
            constant_dataset(array![1.0, 2.0], array![1.0, 2.0]),
            FomMetric::Diff,
            true,
        );
        handler.add_dataset(
            constant_dataset(array![5.0, 5.0], array![1.0, 1.0]),
            FomMetric::Diff,
            false,
        );
        let composite = handler.calc().unwrap();
        assert_relative_eq!(composite, 0.0);
        assert_eq!(handler.foms()[1], 0.0);
        assert!(handler.fom_arrays()[1].is_none());
        // still simulated
        assert!(handler.dataset(1).unwrap().y_sim().is_some());
    }

    #[test]
    fn test_no_active_datasets_is_an_error() {
        let mut handler = FomHandler::new();
        assert!(matches!(handler.calc(), Err(FitError::NoActiveDatasets)));
        handler.add_dataset(
            constant_dataset(array![1.0], array![1.0]),
            FomMetric::Diff,
            false,
        );
        assert!(matches!(handler.calc(), Err(FitError::NoActiveDatasets)));
    }

    #[test]
    fn test_preprocessors_run_in_order_before_evaluation() {
        let log = Rc::new(Cell::new(0u32));
        let first = Rc::clone(&log);
        let second = Rc::clone(&log);
        let seen = Rc::clone(&log);

        let mut handler = FomHandler::new();
        handler.add_preprocessor(move || first.set(first.get() * 10 + 1));
        handler.add_preprocessor(move || second.set(second.get() * 10 + 2));
        handler.add_dataset(
            Dataset::new(array![0.0], array![1.0], move || {
                // both hooks must have run by simulation time
                assert_eq!(seen.get() % 100, 12);
                Ok((array![0.0], array![1.0]))
            })
            .unwrap(),
            FomMetric::Diff,
            true,
        );

        handler.calc().unwrap();
        handler.calc().unwrap();
        assert_eq!(log.get(), 1212);
    }
}
