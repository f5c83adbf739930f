//! Circular statistics for wind direction
//!
//! Directions are accumulated as unit vectors. An arithmetic mean of the
//! angles themselves is wrong across north (350° and 10° would average to 180°).

/// Running sums of `sin`/`cos` over a set of bearings in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CircularAccumulator {
    sum_sin: f64,
    sum_cos: f64,
    count: usize,
}

impl CircularAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one bearing; non-finite values are ignored
    pub fn add(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            return;
        }
        let rad = degrees.to_radians();
        self.sum_sin += rad.sin();
        self.sum_cos += rad.cos();
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of `sin(direction)` and mean of `cos(direction)`
    pub fn mean_components(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some((self.sum_sin / n, self.sum_cos / n))
    }

    /// Mean direction in `[0, 360)`
    pub fn mean_direction(&self) -> Option<f64> {
        let (sin, cos) = self.mean_components()?;
        direction_from_components(sin, cos)
    }

    /// Mean resultant length `r`, clamped to `[0, 1]`
    pub fn resultant_length(&self) -> Option<f64> {
        let (sin, cos) = self.mean_components()?;
        let r = sin.hypot(cos);
        r.is_finite().then(|| r.clamp(0.0, 1.0))
    }

    /// Circular standard deviation in degrees, capped at 180
    ///
    /// Needs at least two samples.
    pub fn std_dev_degrees(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let r = self.resultant_length()?;
        if r >= 1.0 {
            return Some(0.0);
        }
        if r <= 0.0 {
            return Some(180.0);
        }
        let std_rad = (-2.0 * r.ln()).sqrt();
        Some(std_rad.to_degrees().min(180.0))
    }
}

impl Extend<f64> for CircularAccumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for degrees in iter {
            self.add(degrees);
        }
    }
}

/// `atan2(sin, cos)` in degrees, normalized into `[0, 360)`
pub fn direction_from_components(sin_mean: f64, cos_mean: f64) -> Option<f64> {
    if !sin_mean.is_finite() || !cos_mean.is_finite() {
        return None;
    }
    Some(normalize_degrees(sin_mean.atan2(cos_mean).to_degrees()))
}

pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative rounds up to exactly 360
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Smallest angle between two bearings, in degrees
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(directions: &[f64]) -> CircularAccumulator {
        let mut acc = CircularAccumulator::new();
        acc.extend(directions.iter().copied());
        acc
    }

    #[test]
    fn test_mean_across_north() {
        let mean = acc(&[350.0, 10.0]).mean_direction().unwrap();
        assert!(angular_distance(mean, 0.0) < 1e-9, "got {mean}");
    }

    #[test]
    fn test_mean_simple() {
        let mean = acc(&[80.0, 100.0]).mean_direction().unwrap();
        assert!((mean - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev_no_dispersion() {
        assert_eq!(acc(&[0.0, 0.0]).std_dev_degrees(), Some(0.0));
    }

    #[test]
    fn test_std_dev_uniform() {
        assert_eq!(
            acc(&[0.0, 90.0, 180.0, 270.0]).std_dev_degrees(),
            Some(180.0)
        );
    }

    #[test]
    fn test_std_dev_needs_two_samples() {
        assert_eq!(acc(&[45.0]).std_dev_degrees(), None);
        assert_eq!(acc(&[]).std_dev_degrees(), None);
    }

    #[test]
    fn test_std_dev_moderate_spread() {
        let std = acc(&[30.0, 60.0]).std_dev_degrees().unwrap();
        assert!(std > 10.0 && std < 20.0, "got {std}");
    }

    #[test]
    fn test_ignores_non_finite() {
        let a = acc(&[f64::NAN, 90.0]);
        assert_eq!(a.count(), 1);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-1e-20), 0.0);
        assert!((normalize_degrees(725.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_angular_distance() {
        assert!((angular_distance(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angular_distance(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angular_distance(0.0, 180.0) - 180.0).abs() < 1e-9);
    }
}
