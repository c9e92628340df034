//! # Parameter System
//!
//! Named parameters with bounds, fit flags and live coupling relations, plus
//! the controller that registers them for the optimizer.
//!
//! ## Core components
//!
//! - [`Parameter`]: shared-handle parameter with a closed set of variants
//!   (plain, reference, group, complex, scattering-factor)
//! - [`Coupling`]/[`CouplingOp`]: derived-value relations between parameters,
//!   validated acyclic at attachment time
//! - [`ParameterController`]: scoped, insertion-ordered registry; the unit of
//!   bulk update, bounds extraction and fit-flag filtering
//!
//! ## Example
//!
//! ```
//! use fomfit::parameters::{CouplingOp, Parameter, ParameterController};
//!
//! let substrate = Parameter::fitted("substrate", 4.0, 0.0, 5.0).unwrap();
//! let film = Parameter::coupled("film", 2.0, CouplingOp::Additive, &substrate);
//!
//! let mut controller = ParameterController::new("master");
//! controller.add_all([&substrate, &film]).unwrap();
//!
//! // The coupled value tracks its base through the controller as well.
//! controller.set_value("substrate", 4.5).unwrap();
//! assert_eq!(controller.scalar("film").unwrap(), 6.5);
//!
//! // Only the bounded, fit-enabled parameter enters the fit subset.
//! assert_eq!(controller.num_params(true), 1);
//! ```

pub mod controller;
pub mod coupling;
pub mod parameter;

pub use controller::{Key, ParameterController};
pub use coupling::{Coupling, CouplingOp};
pub use parameter::{Parameter, ParameterError, ReturnMode, Value};
