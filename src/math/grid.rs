//! Q grid generation.

use crate::error::{FitError, FitResultOf};

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> FitResultOf<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::invalid_dataset(format!(
            "Invalid log grid range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(FitError::invalid_dataset("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the endpoints exactly.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> FitResultOf<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(FitError::invalid_dataset(format!(
            "Invalid grid range: min={min}, max={max}."
        )));
    }
    if steps < 2 {
        return Err(FitError::invalid_dataset("Grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
    out[steps - 1] = max;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.005, 0.3, 5).unwrap();
        assert_eq!(v[0], 0.005);
        assert_eq!(v[v.len() - 1], 0.3);
        assert!(v.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn lin_space_is_even() {
        let v = lin_space(0.0, 1.0, 5).unwrap();
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn grids_reject_bad_ranges() {
        assert!(log_space(0.0, 1.0, 10).is_err());
        assert!(lin_space(1.0, 1.0, 10).is_err());
        assert!(lin_space(0.0, 1.0, 1).is_err());
    }
}
