//! Parameter definition and implementation
//!
//! This module provides the [`Parameter`] type, the fundamental building block
//! of the parameter system. A `Parameter` is a cheaply clonable shared handle:
//! cloning it shares identity, so a simulation closure, a controller and user
//! code can all observe the same underlying value. The dependency graph formed
//! by couplings, references and aggregates is evaluated live on every read.
//!
//! Parameters come in a closed set of variants behind one capability
//! interface (`value`, `raw_value`, `set_value`, `bounds`, `fit`):
//!
//! - plain scalar parameters, optionally coupled to a base parameter,
//! - references (aliases to another parameter under a different name),
//! - ordered groups exposing a list of member values,
//! - complex aggregates (real + imaginary part),
//! - scattering-factor aggregates (charge/magnetic x real/imaginary) with a
//!   selectable return mode.
//!
//! Operations a variant does not support fail with
//! [`ParameterError::Unsupported`] rather than panicking, directing the caller
//! to the object that owns the state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use num_complex::Complex64;
use thiserror::Error;

use crate::parameters::coupling::{Coupling, CouplingOp};

/// Errors that can occur when working with parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Invalid bounds for parameter '{name}': low ({low}) must not exceed high ({high})")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("Cannot enable fit on parameter '{name}' without bounds; set bounds first")]
    FitWithoutBounds { name: String },

    #[error("'{operation}' is not supported on {variant} parameter '{name}'; {hint}")]
    Unsupported {
        name: String,
        variant: &'static str,
        operation: &'static str,
        hint: &'static str,
    },

    #[error("Coupling parameter '{name}' to base '{base}' would close a dependency cycle")]
    CircularCoupling { name: String, base: String },

    #[error("Parameter '{name}' does not evaluate to a scalar")]
    NotScalar { name: String },

    #[error("Unknown return mode: '{0}'")]
    UnknownReturnMode(String),

    #[error("Parameter '{name}' is already bound to a different object in controller '{controller}'")]
    DuplicateName { name: String, controller: String },

    #[error("Parameter '{name}' not found in controller '{controller}'")]
    NotFound { name: String, controller: String },
}

/// Effective value of a parameter.
///
/// Plain and reference parameters evaluate to scalars, complex aggregates to
/// complex numbers, groups to ordered lists of their members' values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Complex(Complex64),
    List(Vec<f64>),
}

impl Value {
    /// The scalar payload, or `None` for non-scalar values.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a complex number; scalars are promoted with zero
    /// imaginary part.
    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Value::Scalar(v) => Some(Complex64::new(*v, 0.0)),
            Value::Complex(c) => Some(*c),
            Value::List(_) => None,
        }
    }

    /// The list payload, or `None` for non-list values.
    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v}"),
            Value::Complex(c) => write!(f, "{c}"),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Return mode of a scattering-factor aggregate, selecting which combination
/// of its charge and magnetic components is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    /// Charge + magnetic, both parts.
    Full,
    /// Charge contribution only.
    Charge,
    /// Magnetic contribution only.
    Magnetic,
    /// Charge + magnetic (alias of `Full`, kept for the `+` identifier).
    Sum,
    /// Charge - magnetic.
    Difference,
}

impl FromStr for ReturnMode {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ReturnMode::Full),
            "charge" | "c" => Ok(ReturnMode::Charge),
            "magn" | "mag" | "magnetic" | "m" => Ok(ReturnMode::Magnetic),
            "+" | "plus" => Ok(ReturnMode::Sum),
            "-" | "minus" => Ok(ReturnMode::Difference),
            other => Err(ParameterError::UnknownReturnMode(other.to_string())),
        }
    }
}

struct PlainState {
    raw: f64,
    bounds: Option<(f64, f64)>,
    bounds_are_relative: bool,
    fit: bool,
    coupling: Coupling,
}

struct ScatteringState {
    charge_re: Parameter,
    charge_im: Parameter,
    magn_re: Parameter,
    magn_im: Parameter,
    mode: ReturnMode,
}

enum ParamKind {
    Plain(PlainState),
    Reference { target: Parameter },
    Group { members: Vec<Parameter> },
    Complex { real: Parameter, imag: Parameter },
    Scattering(ScatteringState),
}

impl ParamKind {
    fn variant_name(&self) -> &'static str {
        match self {
            ParamKind::Plain(_) => "plain",
            ParamKind::Reference { .. } => "reference",
            ParamKind::Group { .. } => "group",
            ParamKind::Complex { .. } => "complex",
            ParamKind::Scattering(_) => "scattering-factor",
        }
    }
}

struct ParamInner {
    name: String,
    kind: ParamKind,
}

/// A named parameter of the dependency graph.
///
/// `Parameter` is a shared handle: `clone` produces a second handle to the
/// same underlying state, and [`Parameter::ptr_eq`] compares identity. The
/// graph is single-threaded by design; handles are neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```
/// use fomfit::parameters::{CouplingOp, Parameter};
///
/// let base = Parameter::new("thickness", 10.0);
/// let offset = Parameter::coupled("interlayer", 2.5, CouplingOp::Additive, &base);
///
/// assert_eq!(offset.scalar().unwrap(), 12.5);
/// base.set_value(11.0).unwrap();
/// assert_eq!(offset.scalar().unwrap(), 13.5);
/// ```
#[derive(Clone)]
pub struct Parameter {
    inner: Rc<RefCell<ParamInner>>,
}

impl Parameter {
    fn from_kind(name: &str, kind: ParamKind) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ParamInner {
                name: name.to_string(),
                kind,
            })),
        }
    }

    /// Create a plain parameter with no bounds and fit disabled.
    pub fn new(name: &str, value: f64) -> Self {
        Self::from_kind(
            name,
            ParamKind::Plain(PlainState {
                raw: value,
                bounds: None,
                bounds_are_relative: false,
                fit: false,
                coupling: Coupling::Identity,
            }),
        )
    }

    /// Create a plain parameter with absolute bounds.
    pub fn with_bounds(name: &str, value: f64, low: f64, high: f64) -> Result<Self, ParameterError> {
        check_bounds(name, low, high)?;
        let param = Self::new(name, value);
        param.plain_mut("set_bounds", |p| p.bounds = Some((low, high)))?;
        Ok(param)
    }

    /// Create a plain parameter whose bounds are factors on its current
    /// effective value, resolved live on every [`Parameter::bounds`] call.
    pub fn with_relative_bounds(
        name: &str,
        value: f64,
        low: f64,
        high: f64,
    ) -> Result<Self, ParameterError> {
        let param = Self::with_bounds(name, value, low, high)?;
        param.plain_mut("set_bounds", |p| p.bounds_are_relative = true)?;
        Ok(param)
    }

    /// Create a bounded plain parameter with the fit flag already enabled.
    pub fn fitted(name: &str, value: f64, low: f64, high: f64) -> Result<Self, ParameterError> {
        let param = Self::with_bounds(name, value, low, high)?;
        param.set_fit(true)?;
        Ok(param)
    }

    /// Create a plain parameter coupled to `base`.
    ///
    /// The effective value is `op.apply(base.value, value)`; `value` is the
    /// parameter's own raw contribution. Construction cannot close a cycle
    /// because no parameter can yet depend on the one being created.
    pub fn coupled(name: &str, value: f64, op: CouplingOp, base: &Parameter) -> Self {
        Self::from_kind(
            name,
            ParamKind::Plain(PlainState {
                raw: value,
                bounds: None,
                bounds_are_relative: false,
                fit: false,
                coupling: Coupling::Arithmetic {
                    op,
                    base: base.clone(),
                },
            }),
        )
    }

    /// Create a reference parameter: an alias to `target` under a new name.
    ///
    /// Value and bounds delegate to the target; value, bounds and fit cannot
    /// be assigned through the reference.
    pub fn reference(name: &str, target: &Parameter) -> Self {
        Self::from_kind(
            name,
            ParamKind::Reference {
                target: target.clone(),
            },
        )
    }

    /// Create an ordered group of parameters; its value is the ordered list
    /// of the members' values.
    pub fn group(name: &str, members: &[Parameter]) -> Self {
        Self::from_kind(
            name,
            ParamKind::Group {
                members: members.to_vec(),
            },
        )
    }

    /// Create a complex aggregate of a real and an imaginary parameter.
    ///
    /// A missing imaginary part defaults to a zero-valued parameter.
    pub fn complex(name: &str, real: &Parameter, imag: Option<&Parameter>) -> Self {
        let imag = imag
            .cloned()
            .unwrap_or_else(|| Parameter::new("imag", 0.0));
        Self::from_kind(
            name,
            ParamKind::Complex {
                real: real.clone(),
                imag,
            },
        )
    }

    /// Create a scattering-factor aggregate from charge and (optional)
    /// magnetic components.
    pub fn scattering_factor(
        name: &str,
        charge_re: &Parameter,
        charge_im: &Parameter,
        magn_re: Option<&Parameter>,
        magn_im: Option<&Parameter>,
        mode: ReturnMode,
    ) -> Self {
        let zero = |n: &str| Parameter::new(n, 0.0);
        Self::from_kind(
            name,
            ParamKind::Scattering(ScatteringState {
                charge_re: charge_re.clone(),
                charge_im: charge_im.clone(),
                magn_re: magn_re.cloned().unwrap_or_else(|| zero("f_magn_re")),
                magn_im: magn_im.cloned().unwrap_or_else(|| zero("f_magn_im")),
                mode,
            }),
        )
    }

    /// The parameter's name.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Rename the parameter.
    pub fn set_name(&self, name: &str) {
        self.inner.borrow_mut().name = name.to_string();
    }

    /// Whether two handles point at the same underlying parameter.
    pub fn ptr_eq(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn unsupported(
        &self,
        operation: &'static str,
        hint: &'static str,
    ) -> ParameterError {
        let inner = self.inner.borrow();
        ParameterError::Unsupported {
            name: inner.name.clone(),
            variant: inner.kind.variant_name(),
            operation,
            hint,
        }
    }

    fn plain_mut<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut PlainState) -> R,
    ) -> Result<R, ParameterError> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            ParamKind::Plain(state) => Ok(f(state)),
            _ => {
                drop(inner);
                Err(self.unsupported(operation, "mutate the constituent parameters instead"))
            }
        }
    }

    /// The effective (coupling-resolved) value.
    ///
    /// Plain parameters resolve their coupling recursively through the
    /// dependency chain; aggregates compose their members' current values.
    pub fn value(&self) -> Result<Value, ParameterError> {
        let inner = self.inner.borrow();
        match &inner.kind {
            ParamKind::Plain(state) => Ok(Value::Scalar(state.coupling.evaluate(state.raw)?)),
            ParamKind::Reference { target } => target.value(),
            ParamKind::Group { members } => {
                let values = members
                    .iter()
                    .map(|m| m.scalar())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            ParamKind::Complex { real, imag } => Ok(Value::Complex(Complex64::new(
                real.scalar()?,
                imag.scalar()?,
            ))),
            ParamKind::Scattering(state) => {
                let (cr, ci) = (state.charge_re.scalar()?, state.charge_im.scalar()?);
                let (mr, mi) = (state.magn_re.scalar()?, state.magn_im.scalar()?);
                let value = match state.mode {
                    ReturnMode::Full | ReturnMode::Sum => Complex64::new(cr + mr, ci + mi),
                    ReturnMode::Charge => Complex64::new(cr, ci),
                    ReturnMode::Magnetic => Complex64::new(mr, mi),
                    ReturnMode::Difference => Complex64::new(cr - mr, ci - mi),
                };
                Ok(Value::Complex(value))
            }
        }
    }

    /// The effective value as a scalar.
    pub fn scalar(&self) -> Result<f64, ParameterError> {
        self.value()?
            .as_scalar()
            .ok_or_else(|| ParameterError::NotScalar { name: self.name() })
    }

    /// The raw (uncoupled) value: the parameter's own contribution, ignoring
    /// any coupling. References report their target's raw value.
    pub fn raw_value(&self) -> Result<Value, ParameterError> {
        let inner = self.inner.borrow();
        match &inner.kind {
            ParamKind::Plain(state) => Ok(Value::Scalar(state.raw)),
            ParamKind::Reference { target } => target.raw_value(),
            ParamKind::Group { members } => {
                let values = members
                    .iter()
                    .map(|m| {
                        m.raw_value()?
                            .as_scalar()
                            .ok_or_else(|| ParameterError::NotScalar { name: m.name() })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            ParamKind::Complex { real, imag } => {
                let re = real
                    .raw_value()?
                    .as_scalar()
                    .ok_or_else(|| ParameterError::NotScalar { name: real.name() })?;
                let im = imag
                    .raw_value()?
                    .as_scalar()
                    .ok_or_else(|| ParameterError::NotScalar { name: imag.name() })?;
                Ok(Value::Complex(Complex64::new(re, im)))
            }
            ParamKind::Scattering(_) => {
                drop(inner);
                self.value()
            }
        }
    }

    /// Set the raw value.
    ///
    /// On a coupled parameter this assigns the modifier contribution only;
    /// the base parameter is never touched. Fails on references, groups and
    /// aggregates, whose state lives in their constituent parameters.
    pub fn set_value(&self, value: f64) -> Result<(), ParameterError> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            ParamKind::Plain(state) => {
                state.raw = value;
                Ok(())
            }
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "set_value",
                    "assign the value on the constituent parameter instead",
                ))
            }
        }
    }

    /// The fit bounds, resolved at call time.
    ///
    /// Relative bounds are factors on the current effective value and move
    /// with it. References delegate to their target; groups and aggregates
    /// have no bounds of their own.
    pub fn bounds(&self) -> Result<Option<(f64, f64)>, ParameterError> {
        let inner = self.inner.borrow();
        match &inner.kind {
            ParamKind::Plain(state) => match state.bounds {
                None => Ok(None),
                Some((low, high)) => {
                    if state.bounds_are_relative {
                        // Scaling by a negative value swaps the interval ends;
                        // reorder so callers always see low <= high.
                        let value = state.coupling.evaluate(state.raw)?;
                        let (a, b) = (low * value, high * value);
                        Ok(Some((a.min(b), a.max(b))))
                    } else {
                        Ok(Some((low, high)))
                    }
                }
            },
            ParamKind::Reference { target } => target.bounds(),
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "bounds",
                    "read bounds on the constituent parameters instead",
                ))
            }
        }
    }

    /// Set absolute bounds on a plain parameter.
    pub fn set_bounds(&self, low: f64, high: f64) -> Result<(), ParameterError> {
        check_bounds(&self.name(), low, high)?;
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            ParamKind::Plain(state) => {
                state.bounds = Some((low, high));
                state.bounds_are_relative = false;
                Ok(())
            }
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "set_bounds",
                    "assign bounds on the constituent parameter instead",
                ))
            }
        }
    }

    /// Whether this parameter is a free variable of the optimization.
    ///
    /// References, groups and aggregates always report `false`: only the
    /// plain parameters that own the underlying values enter the fit subset.
    pub fn fit(&self) -> bool {
        match &self.inner.borrow().kind {
            ParamKind::Plain(state) => state.fit,
            _ => false,
        }
    }

    /// Set the fit flag.
    ///
    /// Enabling fit requires bounds to be set; fit and bounds are jointly
    /// constrained so the solver always receives a finite box.
    pub fn set_fit(&self, fit: bool) -> Result<(), ParameterError> {
        let mut inner = self.inner.borrow_mut();
        let name = inner.name.clone();
        match &mut inner.kind {
            ParamKind::Plain(state) => {
                if fit && state.bounds.is_none() {
                    return Err(ParameterError::FitWithoutBounds { name });
                }
                state.fit = fit;
                Ok(())
            }
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "set_fit",
                    "set the fit flag on the constituent parameter instead",
                ))
            }
        }
    }

    /// Attach or replace a coupling on a plain parameter.
    ///
    /// Fails with [`ParameterError::CircularCoupling`] if `base` already
    /// depends on this parameter: the dependency graph must stay acyclic, and
    /// the check happens here, at attachment time, not during evaluation.
    pub fn set_coupling(&self, op: CouplingOp, base: &Parameter) -> Result<(), ParameterError> {
        if base.depends_on(self) {
            return Err(ParameterError::CircularCoupling {
                name: self.name(),
                base: base.name(),
            });
        }
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            ParamKind::Plain(state) => {
                state.coupling = Coupling::Arithmetic {
                    op,
                    base: base.clone(),
                };
                Ok(())
            }
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "set_coupling",
                    "couplings attach to plain parameters only",
                ))
            }
        }
    }

    /// Remove any coupling, making the effective value the raw value again.
    pub fn clear_coupling(&self) -> Result<(), ParameterError> {
        self.plain_mut("clear_coupling", |state| state.coupling = Coupling::Identity)
    }

    /// Switch the active combination of a scattering-factor aggregate.
    ///
    /// This mutates only the aggregate's own state, never its members.
    pub fn set_return_mode(&self, mode: ReturnMode) -> Result<(), ParameterError> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            ParamKind::Scattering(state) => {
                state.mode = mode;
                Ok(())
            }
            _ => {
                drop(inner);
                Err(self.unsupported(
                    "set_return_mode",
                    "return modes exist on scattering-factor parameters only",
                ))
            }
        }
    }

    /// Whether this parameter (transitively) depends on `other` through
    /// couplings, references or aggregate membership.
    pub fn depends_on(&self, other: &Parameter) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let inner = self.inner.borrow();
        match &inner.kind {
            ParamKind::Plain(state) => state
                .coupling
                .base()
                .map_or(false, |base| base.depends_on(other)),
            ParamKind::Reference { target } => target.depends_on(other),
            ParamKind::Group { members } => members.iter().any(|m| m.depends_on(other)),
            ParamKind::Complex { real, imag } => real.depends_on(other) || imag.depends_on(other),
            ParamKind::Scattering(state) => {
                state.charge_re.depends_on(other)
                    || state.charge_im.depends_on(other)
                    || state.magn_re.depends_on(other)
                    || state.magn_im.depends_on(other)
            }
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Parameter")
            .field("name", &inner.name)
            .field("variant", &inner.kind.variant_name())
            .finish()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Ok(value) => write!(f, "{}: {}", self.name(), value),
            Err(_) => write!(f, "{}: <unresolved>", self.name()),
        }
    }
}

fn check_bounds(name: &str, low: f64, high: f64) -> Result<(), ParameterError> {
    if low > high {
        return Err(ParameterError::InvalidBounds {
            name: name.to_string(),
            low,
            high,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plain_parameter() {
        let p = Parameter::new("thickness", 10.0);
        assert_eq!(p.name(), "thickness");
        assert_eq!(p.scalar().unwrap(), 10.0);
        assert_eq!(p.raw_value().unwrap(), Value::Scalar(10.0));
        assert!(!p.fit());
        assert_eq!(p.bounds().unwrap(), None);

        p.set_value(12.0).unwrap();
        assert_eq!(p.scalar().unwrap(), 12.0);
    }

    #[test]
    fn test_additive_coupling() {
        let base = Parameter::new("base", 3.0);
        let p = Parameter::coupled("mod", 2.0, CouplingOp::Additive, &base);

        assert_eq!(p.scalar().unwrap(), 5.0);
        assert_eq!(p.raw_value().unwrap(), Value::Scalar(2.0));

        // Mutating the base changes the coupled value but not the raw one.
        base.set_value(10.0).unwrap();
        assert_eq!(p.scalar().unwrap(), 12.0);
        assert_eq!(p.raw_value().unwrap(), Value::Scalar(2.0));

        // Setting a coupled parameter touches only its raw contribution.
        p.set_value(1.0).unwrap();
        assert_eq!(p.scalar().unwrap(), 11.0);
        assert_eq!(base.scalar().unwrap(), 10.0);
    }

    #[test]
    fn test_coupling_chain() {
        let a = Parameter::new("a", 1.0);
        let b = Parameter::coupled("b", 2.0, CouplingOp::Additive, &a);
        let c = Parameter::coupled("c", 3.0, CouplingOp::Multiplicative, &b);
        // c = (a + 2) * 3 = 9
        assert_eq!(c.scalar().unwrap(), 9.0);

        a.set_value(2.0).unwrap();
        assert_eq!(c.scalar().unwrap(), 12.0);
    }

    #[test]
    fn test_subtractive_coupling() {
        let base = Parameter::new("base", 3.0);
        let p = Parameter::coupled("mod", 2.0, CouplingOp::Subtractive, &base);
        assert_eq!(p.scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_cycle_rejected_at_attachment() {
        let a = Parameter::new("a", 1.0);
        let b = Parameter::coupled("b", 2.0, CouplingOp::Additive, &a);
        let c = Parameter::coupled("c", 3.0, CouplingOp::Additive, &b);

        let err = a.set_coupling(CouplingOp::Additive, &c).unwrap_err();
        match err {
            ParameterError::CircularCoupling { name, base } => {
                assert_eq!(name, "a");
                assert_eq!(base, "c");
            }
            other => panic!("expected CircularCoupling, got {other:?}"),
        }
        // Self-coupling is a one-edge cycle.
        assert!(a.set_coupling(CouplingOp::Additive, &a).is_err());
        // The graph is still evaluable.
        assert_eq!(c.scalar().unwrap(), 6.0);
    }

    #[test]
    fn test_fit_requires_bounds() {
        let p = Parameter::new("p", 1.0);
        let err = p.set_fit(true).unwrap_err();
        assert!(matches!(err, ParameterError::FitWithoutBounds { .. }));

        p.set_bounds(0.0, 2.0).unwrap();
        p.set_fit(true).unwrap();
        assert!(p.fit());

        // Disabling fit is always allowed.
        p.set_fit(false).unwrap();
        assert!(!p.fit());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(Parameter::with_bounds("p", 1.0, 5.0, 0.0).is_err());
        let p = Parameter::new("p", 1.0);
        assert!(p.set_bounds(2.0, 1.0).is_err());
    }

    #[test]
    fn test_relative_bounds_track_value() {
        let base = Parameter::new("base", 4.0);
        let p = Parameter::coupled("p", 2.0, CouplingOp::Additive, &base);
        p.set_bounds(0.5, 2.0).unwrap();
        assert_eq!(p.bounds().unwrap(), Some((0.5, 2.0)));

        let rel = Parameter::with_relative_bounds("rel", 10.0, 0.5, 2.0).unwrap();
        assert_eq!(rel.bounds().unwrap(), Some((5.0, 20.0)));
        rel.set_value(20.0).unwrap();
        assert_eq!(rel.bounds().unwrap(), Some((10.0, 40.0)));
    }

    #[test]
    fn test_relative_bounds_ordered_for_negative_values() {
        // Scaling (0.5, 2.0) by -4 gives (-2, -8); the resolved box must come
        // back ordered, never inverted.
        let rel = Parameter::with_relative_bounds("rel", -4.0, 0.5, 2.0).unwrap();
        assert_eq!(rel.bounds().unwrap(), Some((-8.0, -2.0)));

        // Crossing zero keeps the invariant as the value moves.
        rel.set_value(4.0).unwrap();
        assert_eq!(rel.bounds().unwrap(), Some((2.0, 8.0)));
        rel.set_value(0.0).unwrap();
        assert_eq!(rel.bounds().unwrap(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_reference_delegates_and_rejects_mutation() {
        let target = Parameter::fitted("p3", 15.0, 5.0, 32.0).unwrap();
        let alias = Parameter::reference("same_as_p3", &target);

        assert_eq!(alias.scalar().unwrap(), 15.0);
        assert_eq!(alias.bounds().unwrap(), Some((5.0, 32.0)));
        target.set_value(16.0).unwrap();
        assert_eq!(alias.scalar().unwrap(), 16.0);

        // References never enter the fit subset themselves.
        assert!(!alias.fit());
        assert!(target.fit());

        assert!(matches!(
            alias.set_value(1.0),
            Err(ParameterError::Unsupported { .. })
        ));
        assert!(alias.set_bounds(0.0, 1.0).is_err());
        assert!(alias.set_fit(true).is_err());
    }

    #[test]
    fn test_group_values_keep_order() {
        let a = Parameter::new("a", 1.0);
        let b = Parameter::coupled("b", 2.0, CouplingOp::Additive, &a);
        let c = Parameter::new("c", 7.0);
        let group = Parameter::group("layers", &[a.clone(), b.clone(), c.clone()]);

        assert_eq!(
            group.value().unwrap(),
            Value::List(vec![1.0, 3.0, 7.0])
        );
        assert_eq!(
            group.raw_value().unwrap(),
            Value::List(vec![1.0, 2.0, 7.0])
        );
        assert!(group.set_value(0.0).is_err());
        assert!(group.bounds().is_err());
        assert!(group.scalar().is_err());
    }

    #[test]
    fn test_complex_parameter() {
        let re = Parameter::new("re", 1.5);
        let im = Parameter::new("im", -0.5);
        let z = Parameter::complex("z", &re, Some(&im));
        assert_eq!(
            z.value().unwrap().as_complex().unwrap(),
            Complex64::new(1.5, -0.5)
        );

        // Default imaginary part is zero.
        let z0 = Parameter::complex("z0", &re, None);
        assert_eq!(
            z0.value().unwrap().as_complex().unwrap(),
            Complex64::new(1.5, 0.0)
        );
        assert!(z.set_value(1.0).is_err());
    }

    #[test]
    fn test_scattering_factor_modes() {
        let cr = Parameter::new("cr", 1.0);
        let ci = Parameter::new("ci", 2.0);
        let mr = Parameter::new("mr", 0.25);
        let mi = Parameter::new("mi", 0.5);
        let f = Parameter::scattering_factor("f", &cr, &ci, Some(&mr), Some(&mi), ReturnMode::Full);

        let get = |p: &Parameter| p.value().unwrap().as_complex().unwrap();
        assert_eq!(get(&f), Complex64::new(1.25, 2.5));

        f.set_return_mode(ReturnMode::Charge).unwrap();
        assert_eq!(get(&f), Complex64::new(1.0, 2.0));

        f.set_return_mode(ReturnMode::Magnetic).unwrap();
        assert_eq!(get(&f), Complex64::new(0.25, 0.5));

        f.set_return_mode(ReturnMode::Sum).unwrap();
        assert_eq!(get(&f), Complex64::new(1.25, 2.5));

        f.set_return_mode(ReturnMode::Difference).unwrap();
        assert_eq!(get(&f), Complex64::new(0.75, 1.5));

        // Members are untouched by mode switches.
        assert_relative_eq!(cr.scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_return_mode_parsing() {
        assert_eq!("full".parse::<ReturnMode>().unwrap(), ReturnMode::Full);
        assert_eq!("c".parse::<ReturnMode>().unwrap(), ReturnMode::Charge);
        assert_eq!("magnetic".parse::<ReturnMode>().unwrap(), ReturnMode::Magnetic);
        assert_eq!("+".parse::<ReturnMode>().unwrap(), ReturnMode::Sum);
        assert_eq!("minus".parse::<ReturnMode>().unwrap(), ReturnMode::Difference);
        assert!(matches!(
            "sideways".parse::<ReturnMode>(),
            Err(ParameterError::UnknownReturnMode(_))
        ));
    }

    #[test]
    fn test_shared_handle_identity() {
        let p = Parameter::new("p", 1.0);
        let q = p.clone();
        assert!(p.ptr_eq(&q));
        q.set_value(2.0).unwrap();
        assert_eq!(p.scalar().unwrap(), 2.0);

        let r = Parameter::new("p", 1.0);
        assert!(!p.ptr_eq(&r));
    }
}
