//! # fomfit
//!
//! `fomfit` is a multi-dataset curve-fitting engine built around a parameter
//! dependency graph and a pluggable figure-of-merit (FOM) pipeline.
//!
//! The library provides:
//! - A shared-handle parameter system with bounds, arithmetic couplings,
//!   references, groups, complex pairs, and scattering-factor composites
//! - A named-parameter controller that exposes the fitted subset as an
//!   ordered vector for solvers
//! - Datasets that pair experimental points with a simulation closure,
//!   including grid alignment, masking, and background addition
//! - Eleven discrepancy metrics with their paired reductions, aggregated
//!   across datasets into one composite FOM
//! - A solver contract with a bundled seedable differential-evolution
//!   implementation
//!
//! ## Basic Usage
//!
//! ```
//! use fomfit::{
//!     Dataset, DifferentialEvolution, Fitter, FomMetric, Parameter,
//!     ParameterController,
//! };
//! use ndarray::array;
//!
//! # fn main() -> fomfit::Result<()> {
//! let slope = Parameter::fitted("slope", 0.5, 0.0, 5.0)?;
//! let mut controller = ParameterController::new("line");
//! controller.add(&slope)?;
//!
//! let sim_slope = slope.clone();
//! let data = Dataset::new(array![0.0, 1.0, 2.0], array![0.0, 2.0, 4.0], move || {
//!     let a = sim_slope.scalar()?;
//!     let x = array![0.0, 1.0, 2.0];
//!     Ok((x.clone(), x.mapv(|xi| a * xi)))
//! })?;
//!
//! let solver = DifferentialEvolution::new().with_seed(7);
//! let mut fitter = Fitter::new(controller, solver);
//! fitter.add_dataset(data, FomMetric::Diff, true);
//! let result = fitter.optimize()?;
//! assert!((fitter.controller().scalar("slope")? - 2.0).abs() < 1e-3);
//! assert!(result.fom < 1e-6);
//! # Ok(())
//! # }
//! ```
//!
//! The crate is single-threaded by design: parameters are cheap shared
//! handles (`Rc<RefCell>`), so simulation closures observe controller writes
//! without any plumbing. None of the core types are `Send` or `Sync`.

pub mod dataset;
pub mod error;
pub mod fitter;
pub mod fom;
pub mod parameters;
pub mod solver;

// Re-exports for convenience
pub use dataset::{Dataset, SimFn};
pub use error::{FitError, Result};
pub use fitter::Fitter;
pub use fom::{FomCalculator, FomHandler, FomMetric};
pub use parameters::{
    Coupling, CouplingOp, Key, Parameter, ParameterController, ParameterError, ReturnMode, Value,
};
pub use solver::{DeStrategy, DifferentialEvolution, SolveResult, Solver};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
