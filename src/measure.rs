//! First-order propagation of measurement uncertainty.
//!
//! Every derived scalar in the pipeline carries a standard deviation
//! propagated through the usual linear rules for independent inputs:
//! sum-of-squares for addition/subtraction, the relative-variance rule for
//! division. A missing or undefined sd stays undefined rather than being
//! coerced to zero, and dividing by zero yields no value at all instead of a
//! NaN that would leak into downstream tables.

use serde::Serialize;

/// Monoisotopic proton mass in Da, used to strip the charge contribution
/// from centroid m/z values.
pub const PROTON_MASS: f64 = 1.007276466621;

// ---------------------------------------------------------------------------
// Measured – a value with an (optional) standard deviation
// ---------------------------------------------------------------------------

/// A measured or derived quantity with its standard deviation.
///
/// `sd == None` means the dispersion is undefined — a single observation, or
/// a derivation from inputs whose own sd was undefined. This is distinct
/// from `Some(0.0)`, which means "measured, with zero spread".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measured {
    pub value: f64,
    pub sd: Option<f64>,
}

impl Measured {
    pub fn new(value: f64, sd: Option<f64>) -> Self {
        Measured { value, sd }
    }

    /// A value with no associated uncertainty estimate.
    pub fn bare(value: f64) -> Self {
        Measured { value, sd: None }
    }

    /// Unweighted mean and sample standard deviation (ddof = 1) of a slice.
    ///
    /// Returns `None` for an empty slice. A single observation yields a
    /// defined mean with an undefined sd, never sd = 0.
    pub fn from_samples(values: &[f64]) -> Option<Measured> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sd = if values.len() >= 2 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (n - 1.0)).sqrt())
        } else {
            None
        };
        Some(Measured { value: mean, sd })
    }

    /// `self + other`, sd by sum-of-squares.
    pub fn add(self, other: Measured) -> Measured {
        Measured {
            value: self.value + other.value,
            sd: combine_sd(self.sd, other.sd),
        }
    }

    /// `self - other`, sd by sum-of-squares.
    pub fn sub(self, other: Measured) -> Measured {
        Measured {
            value: self.value - other.value,
            sd: combine_sd(self.sd, other.sd),
        }
    }

    /// `self / other` for two independent measured quantities.
    ///
    /// Uses sd² = sa²/b² + (sb²·a²)/b⁴, which stays finite for a = 0.
    /// A zero denominator makes the quotient undefined.
    pub fn div(self, other: Measured) -> Option<Measured> {
        if other.value == 0.0 {
            return None;
        }
        let (a, b) = (self.value, other.value);
        let sd = match (self.sd, other.sd) {
            (Some(sa), Some(sb)) => {
                Some((sa.powi(2) / b.powi(2) + sb.powi(2) * a.powi(2) / b.powi(4)).sqrt())
            }
            _ => None,
        };
        Some(Measured { value: a / b, sd })
    }

    /// `self / denom` for an exact (uncertainty-free) denominator.
    pub fn div_exact(self, denom: f64) -> Option<Measured> {
        if denom == 0.0 {
            return None;
        }
        Some(Measured {
            value: self.value / denom,
            sd: self.sd.map(|s| s / denom.abs()),
        })
    }
}

/// Sum-of-squares combination; undefined if either input sd is undefined.
fn combine_sd(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a * a + b * b).sqrt()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn sample_stats() {
        let m = Measured::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!(close(m.value, 5.0, 1e-12));
        // sample sd of the classic example is ~2.138
        assert!(close(m.sd.unwrap(), 2.13809, 1e-4));
    }

    #[test]
    fn single_sample_has_undefined_sd() {
        let m = Measured::from_samples(&[3.25]).unwrap();
        assert_eq!(m.value, 3.25);
        assert_eq!(m.sd, None);
        assert_eq!(Measured::from_samples(&[]), None);
    }

    #[test]
    fn subtraction_propagates_sum_of_squares() {
        // mass = 100 ± 1, mass_ref = 10 ± 0.5 → uptake = 90 ± √1.25
        let mass = Measured::new(100.0, Some(1.0));
        let reference = Measured::new(10.0, Some(0.5));
        let uptake = mass.sub(reference);
        assert!(close(uptake.value, 90.0, 1e-12));
        assert!(close(uptake.sd.unwrap(), 1.118, 1e-3));
    }

    #[test]
    fn undefined_sd_stays_undefined() {
        let a = Measured::new(5.0, Some(0.1));
        let b = Measured::bare(2.0);
        assert_eq!(a.sub(b).sd, None);
        assert_eq!(a.div(b).unwrap().sd, None);
    }

    #[test]
    fn quotient_rule() {
        let p = Measured::new(3.0, Some(0.3));
        let f = Measured::new(6.0, Some(0.6));
        let q = p.div(f).unwrap();
        assert!(close(q.value, 0.5, 1e-12));
        // sd² = 0.09/36 + 0.36*9/1296 = 0.0025 + 0.0025
        assert!(close(q.sd.unwrap(), 0.0707106, 1e-5));
    }

    #[test]
    fn division_by_zero_is_undefined() {
        let p = Measured::new(3.0, Some(0.3));
        assert_eq!(p.div(Measured::new(0.0, Some(0.1))), None);
        assert_eq!(p.div_exact(0.0), None);
    }

    #[test]
    fn exact_denominator_scales_sd() {
        let u = Measured::new(4.0, Some(0.8));
        let f = u.div_exact(8.0).unwrap();
        assert!(close(f.value, 0.5, 1e-12));
        assert!(close(f.sd.unwrap(), 0.1, 1e-12));
    }
}
