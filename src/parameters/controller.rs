//! Named parameter registry
//!
//! A [`ParameterController`] is the unit the optimizer operates on: it holds
//! parameters in insertion order, filters them by fit flag, extracts the
//! bounds vector for the fit subset and applies bulk value updates.
//!
//! Entries are addressed by a two-level [`Key`] of controller scope and
//! logical name rather than by suffixed name strings, so controllers with
//! overlapping logical names can be merged without collisions and without
//! renaming any parameter in place.

use std::collections::HashMap;
use std::fmt;

use crate::parameters::parameter::{Parameter, ParameterError, Value};

/// Two-level addressing key: the controller scope a parameter was registered
/// under plus its logical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub scope: String,
    pub name: String,
}

impl Key {
    pub fn new(scope: &str, name: &str) -> Self {
        Self {
            scope: scope.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.scope, self.name)
        }
    }
}

/// A named, optionally scoped registry of [`Parameter`] handles.
///
/// The controller shares ownership of its parameters: `add` and `merge` store
/// handles, never copies, so a value written through the controller is
/// observed by every other holder of the same handle (simulation closures in
/// particular). Cloning a controller clones the handle map, yielding a second
/// view onto the same parameters.
///
/// Insertion order is preserved and significant: `keys`, `values` and
/// `fit_bounds` iterate in it, which is what lets a positional candidate
/// vector be zipped back onto the fit subset.
#[derive(Debug, Clone, Default)]
pub struct ParameterController {
    name: String,
    scope: String,
    order: Vec<Key>,
    params: HashMap<Key, Parameter>,
}

impl ParameterController {
    /// Create an empty controller with an empty scope.
    pub fn new(name: &str) -> Self {
        Self::with_scope(name, "")
    }

    /// Create an empty controller whose parameters register under `scope`.
    pub fn with_scope(name: &str, scope: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            order: Vec::new(),
            params: HashMap::new(),
        }
    }

    /// The controller's name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope new parameters are registered under.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Register a parameter under the controller's own scope.
    ///
    /// Re-adding the identical object is a no-op; adding a *different* object
    /// under an already-bound name fails with
    /// [`ParameterError::DuplicateName`]. Parameters are never removed for
    /// the lifetime of the controller.
    pub fn add(&mut self, param: &Parameter) -> Result<(), ParameterError> {
        let key = Key::new(&self.scope, &param.name());
        match self.params.get(&key) {
            Some(existing) if existing.ptr_eq(param) => Ok(()),
            Some(_) => Err(ParameterError::DuplicateName {
                name: param.name(),
                controller: self.name.clone(),
            }),
            None => {
                self.order.push(key.clone());
                self.params.insert(key, param.clone());
                Ok(())
            }
        }
    }

    /// Register several parameters in order.
    pub fn add_all<'a>(
        &mut self,
        params: impl IntoIterator<Item = &'a Parameter>,
    ) -> Result<(), ParameterError> {
        for param in params {
            self.add(param)?;
        }
        Ok(())
    }

    /// Look up a parameter by logical name in the controller's own scope.
    pub fn get(&self, name: &str) -> Result<Parameter, ParameterError> {
        self.get_scoped(&self.scope, name)
    }

    /// Look up a parameter by explicit scope and logical name; needed to
    /// address entries imported from a controller with a different scope.
    pub fn get_scoped(&self, scope: &str, name: &str) -> Result<Parameter, ParameterError> {
        self.params
            .get(&Key::new(scope, name))
            .cloned()
            .ok_or_else(|| ParameterError::NotFound {
                name: name.to_string(),
                controller: self.name.clone(),
            })
    }

    /// Whether a parameter is registered under `name` in the own scope.
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(&Key::new(&self.scope, name))
    }

    /// Effective value of the named parameter.
    pub fn value(&self, name: &str) -> Result<Value, ParameterError> {
        self.get(name)?.value()
    }

    /// Effective value of the named parameter as a scalar.
    pub fn scalar(&self, name: &str) -> Result<f64, ParameterError> {
        self.get(name)?.scalar()
    }

    /// Raw (uncoupled) value of the named parameter.
    pub fn raw_value(&self, name: &str) -> Result<Value, ParameterError> {
        self.get(name)?.raw_value()
    }

    /// Set the raw value of the named parameter.
    pub fn set_value(&self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.get(name)?.set_value(value)
    }

    /// Bulk-set raw values by logical name, all-or-nothing.
    ///
    /// Every name is resolved before any value is written, so an unknown name
    /// aborts the whole update with the controller untouched.
    pub fn update(&self, pairs: &[(&str, f64)]) -> Result<(), ParameterError> {
        let resolved = pairs
            .iter()
            .map(|(name, value)| Ok((self.get(name)?, *value)))
            .collect::<Result<Vec<_>, ParameterError>>()?;
        for (param, value) in resolved {
            param.set_value(value)?;
        }
        Ok(())
    }

    /// Keys in insertion order, optionally restricted to fitted parameters.
    pub fn keys(&self, only_fitted: bool) -> Vec<Key> {
        self.order
            .iter()
            .filter(|key| !only_fitted || self.params[key].fit())
            .cloned()
            .collect()
    }

    /// Parameter handles in insertion order.
    pub fn params(&self, only_fitted: bool) -> Vec<Parameter> {
        self.keys(only_fitted)
            .iter()
            .map(|key| self.params[key].clone())
            .collect()
    }

    /// Effective values in insertion order.
    pub fn values(&self, only_fitted: bool) -> Result<Vec<Value>, ParameterError> {
        self.params(only_fitted).iter().map(|p| p.value()).collect()
    }

    /// Bounds in insertion order, resolved at call time.
    pub fn bounds(&self, only_fitted: bool) -> Result<Vec<Option<(f64, f64)>>, ParameterError> {
        self.params(only_fitted)
            .iter()
            .map(|p| p.bounds())
            .collect()
    }

    /// The concrete `(low, high)` box for every fitted parameter, in exactly
    /// the order of `keys(true)`.
    ///
    /// Fit and bounds are jointly constrained on the parameter, so every
    /// fitted entry has bounds; relative bounds are resolved against the
    /// current effective value here, at call time.
    pub fn fit_bounds(&self) -> Result<Vec<(f64, f64)>, ParameterError> {
        self.params(true)
            .iter()
            .map(|p| {
                p.bounds()?.ok_or_else(|| ParameterError::FitWithoutBounds {
                    name: p.name(),
                })
            })
            .collect()
    }

    /// Number of registered parameters, optionally only fitted ones.
    pub fn num_params(&self, only_fitted: bool) -> usize {
        self.keys(only_fitted).len()
    }

    /// Import every entry of `other` by shared handle, in `other`'s insertion
    /// order and under `other`'s keys.
    ///
    /// No parameter is copied: after a merge both controllers address the
    /// same underlying objects. Duplicate rules match `add`: the identical
    /// object under an existing key is a no-op, a different one is an error.
    pub fn merge(&mut self, other: &ParameterController) -> Result<(), ParameterError> {
        for key in &other.order {
            let param = &other.params[key];
            match self.params.get(key) {
                Some(existing) if existing.ptr_eq(param) => {}
                Some(_) => {
                    return Err(ParameterError::DuplicateName {
                        name: key.name.clone(),
                        controller: self.name.clone(),
                    })
                }
                None => {
                    self.order.push(key.clone());
                    self.params.insert(key.clone(), param.clone());
                }
            }
        }
        Ok(())
    }
}
