//! Coupling relations between parameters
//!
//! A coupling derives a parameter's effective value from a base parameter's
//! value combined with the parameter's own raw value. Edges point from the
//! modifier to its base; the resulting graph must stay acyclic, which is
//! enforced when a coupling is attached (see [`Parameter::set_coupling`]).
//!
//! [`Parameter::set_coupling`]: crate::parameters::Parameter::set_coupling

use std::fmt;

use crate::parameters::parameter::Parameter;

/// Arithmetic operation applied by a coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouplingOp {
    /// `base.value + raw`
    Additive,
    /// `base.value - raw`
    Subtractive,
    /// `base.value * raw`
    Multiplicative,
}

impl CouplingOp {
    /// Combine the base parameter's effective value with the modifier's raw value.
    pub fn apply(&self, base: f64, raw: f64) -> f64 {
        match self {
            CouplingOp::Additive => base + raw,
            CouplingOp::Subtractive => base - raw,
            CouplingOp::Multiplicative => base * raw,
        }
    }

    /// The operator symbol, used in diagnostics.
    pub fn symbol(&self) -> &'static str {
        match self {
            CouplingOp::Additive => "+",
            CouplingOp::Subtractive => "-",
            CouplingOp::Multiplicative => "*",
        }
    }
}

impl fmt::Display for CouplingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Coupling state of a plain parameter.
///
/// `Identity` means the effective value is the raw value itself; `Arithmetic`
/// holds a non-owning handle to the base parameter whose effective value the
/// modifier combines with.
#[derive(Debug, Clone)]
pub enum Coupling {
    Identity,
    Arithmetic { op: CouplingOp, base: Parameter },
}

impl Coupling {
    /// Evaluate the coupling for the given raw value.
    pub(crate) fn evaluate(&self, raw: f64) -> Result<f64, crate::parameters::parameter::ParameterError> {
        match self {
            Coupling::Identity => Ok(raw),
            Coupling::Arithmetic { op, base } => Ok(op.apply(base.scalar()?, raw)),
        }
    }

    /// The base parameter this coupling depends on, if any.
    pub fn base(&self) -> Option<&Parameter> {
        match self {
            Coupling::Identity => None,
            Coupling::Arithmetic { base, .. } => Some(base),
        }
    }
}
