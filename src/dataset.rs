//! Experimental datasets and forward-model simulation
//!
//! A [`Dataset`] couples one set of experimental `(x, y)` samples, with
//! optional per-point uncertainties and additive background, to a zero-argument
//! simulation callable. [`Dataset::simulate`] reconciles differing sample
//! grids by linear interpolation so simulated and experimental series are
//! always compared point by point, and a boolean mask excludes points from
//! fitting without removing them from the data.

use ndarray::Array1;

use crate::error::{FitError, Result};

/// Zero-argument forward model returning simulated `(x, y)` series.
///
/// The callable reads current parameter state through whatever [`Parameter`]
/// handles it captured at construction; this module treats it as a black box.
///
/// [`Parameter`]: crate::parameters::Parameter
pub type SimFn = Box<dyn Fn() -> Result<(Array1<f64>, Array1<f64>)>>;

/// Container for experimental data and its simulation callable.
pub struct Dataset {
    x: Array1<f64>,
    y: Array1<f64>,
    error: Option<Array1<f64>>,
    bkg: Option<Array1<f64>>,
    mask: Vec<bool>,
    sim_fn: SimFn,
    x_sim: Option<Array1<f64>>,
    y_sim: Option<Array1<f64>>,
    x_label: String,
    y_label: String,
}

impl Dataset {
    /// Create a dataset from experimental samples and a simulation callable.
    ///
    /// `x` and `y` must have equal length; the mask starts all-false
    /// (no point excluded).
    pub fn new(
        x: Array1<f64>,
        y: Array1<f64>,
        sim_fn: impl Fn() -> Result<(Array1<f64>, Array1<f64>)> + 'static,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                what: "experimental x/y arrays",
                expected: x.len(),
                actual: y.len(),
            });
        }
        let mask = vec![false; x.len()];
        Ok(Self {
            x,
            y,
            error: None,
            bkg: None,
            mask,
            sim_fn: Box::new(sim_fn),
            x_sim: None,
            y_sim: None,
            x_label: "x".to_string(),
            y_label: "y".to_string(),
        })
    }

    /// Attach per-point uncertainties (required by the chi metrics).
    pub fn with_error(mut self, error: Array1<f64>) -> Result<Self> {
        if error.len() != self.y.len() {
            return Err(FitError::LengthMismatch {
                what: "error array",
                expected: self.y.len(),
                actual: error.len(),
            });
        }
        self.error = Some(error);
        Ok(self)
    }

    /// Attach an additive background, applied to every simulated series.
    pub fn with_background(mut self, bkg: Array1<f64>) -> Result<Self> {
        if bkg.len() != self.y.len() {
            return Err(FitError::LengthMismatch {
                what: "background array",
                expected: self.y.len(),
                actual: bkg.len(),
            });
        }
        self.bkg = Some(bkg);
        Ok(self)
    }

    /// Set axis labels for this dataset.
    pub fn with_labels(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn error(&self) -> Option<&Array1<f64>> {
        self.error.as_ref()
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Last-simulated abscissa, if [`Dataset::simulate`] has run.
    pub fn x_sim(&self) -> Option<&Array1<f64>> {
        self.x_sim.as_ref()
    }

    /// Last-simulated ordinate, if [`Dataset::simulate`] has run.
    pub fn y_sim(&self) -> Option<&Array1<f64>> {
        self.y_sim.as_ref()
    }

    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    /// Number of excluded points.
    pub fn num_masked(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Invoke the forward model and align its output with the experimental
    /// grid.
    ///
    /// If the simulated series is at least as long as the experimental one,
    /// the simulated values are interpolated onto the experimental grid.
    /// Otherwise the experimental arrays themselves are re-gridded onto the
    /// simulated grid: `y`, `error` and `bkg` are interpolated along, and the
    /// mask is re-initialized to all-false at the new length, since point
    /// identity does not survive re-gridding. The background, if set, is
    /// added element-wise after alignment.
    pub fn simulate(&mut self) -> Result<(Array1<f64>, Array1<f64>)> {
        let (x_sim, y_sim) = (self.sim_fn)()?;
        if x_sim.len() != y_sim.len() {
            return Err(FitError::LengthMismatch {
                what: "simulated x/y arrays",
                expected: x_sim.len(),
                actual: y_sim.len(),
            });
        }

        let (x_sim, mut y_sim) = if y_sim.len() == self.y.len() {
            (x_sim, y_sim)
        } else if y_sim.len() > self.y.len() {
            let y_on_exp = interp(&self.x, &x_sim, &y_sim);
            (self.x.clone(), y_on_exp)
        } else {
            self.y = interp(&x_sim, &self.x, &self.y);
            if let Some(error) = self.error.take() {
                self.error = Some(interp(&x_sim, &self.x, &error));
            }
            if let Some(bkg) = self.bkg.take() {
                self.bkg = Some(interp(&x_sim, &self.x, &bkg));
            }
            self.x = x_sim.clone();
            self.mask = vec![false; self.x.len()];
            (x_sim, y_sim)
        };

        if let Some(bkg) = &self.bkg {
            y_sim = y_sim + bkg;
        }

        self.x_sim = Some(x_sim.clone());
        self.y_sim = Some(y_sim.clone());
        Ok((x_sim, y_sim))
    }

    /// Exclude all points with `x > limit`, keeping prior exclusions.
    pub fn mask_above(&mut self, limit: f64) -> &mut Self {
        for (m, &x) in self.mask.iter_mut().zip(self.x.iter()) {
            *m |= x > limit;
        }
        self
    }

    /// Exclude all points with `x < limit`, keeping prior exclusions.
    pub fn mask_below(&mut self, limit: f64) -> &mut Self {
        for (m, &x) in self.mask.iter_mut().zip(self.x.iter()) {
            *m |= x < limit;
        }
        self
    }

    /// Remove every exclusion.
    pub fn clear_mask(&mut self) -> &mut Self {
        self.mask.iter_mut().for_each(|m| *m = false);
        self
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("points", &self.x.len())
            .field("num_masked", &self.num_masked())
            .field("x_label", &self.x_label)
            .field("y_label", &self.y_label)
            .finish()
    }
}

/// Piecewise-linear interpolation of `(xp, fp)` onto `x_new`, clamping to the
/// end values outside the `xp` range. `xp` must be ascending.
fn interp(x_new: &Array1<f64>, xp: &Array1<f64>, fp: &Array1<f64>) -> Array1<f64> {
    let n = xp.len();
    x_new.mapv(|x| {
        // Binary search by index; works on any memory layout.
        let (mut lo, mut hi) = (0, n);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if xp[mid] < x {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            fp[0]
        } else if lo == n {
            fp[n - 1]
        } else {
            let (x0, x1) = (xp[lo - 1], xp[lo]);
            let (f0, f1) = (fp[lo - 1], fp[lo]);
            f0 + (f1 - f0) * (x - x0) / (x1 - x0)
        }
    })
}
