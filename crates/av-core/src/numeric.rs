use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Floating point type used throughout the system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Closed interval on one chart axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: Real,
    pub max: Real,
}

impl AxisRange {
    /// Builds a range, rejecting non-finite or inverted bounds.
    pub fn new(min: Real, max: Real, what: &'static str) -> Result<Self, CoreError> {
        let min = ensure_finite(min, what)?;
        let max = ensure_finite(max, what)?;
        if min > max {
            return Err(CoreError::InvalidRange { what, min, max });
        }
        Ok(Self { min, max })
    }

    pub fn as_array(self) -> [Real; 2] {
        [self.min, self.max]
    }
}
