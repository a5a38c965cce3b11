/// Streaming count/mean/variance/skewness/kurtosis using the fourth-order
/// incremental update, so no raw values are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunningMoments {
    n: f64,
    m1: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

impl RunningMoments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        let n1 = self.n;
        self.n += 1.0;
        let n = self.n;
        let delta = x - self.m1;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
        self.m1 += delta_n;
    }

    pub fn count(&self) -> u64 {
        self.n as u64
    }

    pub fn mean(&self) -> f64 {
        self.m1
    }

    /// Sample variance (n - 1 denominator).
    pub fn variance(&self) -> f64 {
        if self.n < 2.0 {
            return 0.0;
        }
        self.m2 / (self.n - 1.0)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn stderr(&self) -> f64 {
        if self.n < 2.0 {
            return 0.0;
        }
        (self.variance() / self.n).sqrt()
    }

    pub fn skewness(&self) -> f64 {
        if self.n < 2.0 || self.m2 == 0.0 {
            return 0.0;
        }
        self.n.sqrt() * self.m3 / self.m2.powf(1.5)
    }

    pub fn kurtosis(&self) -> f64 {
        if self.n < 2.0 || self.m2 == 0.0 {
            return 0.0;
        }
        self.n * self.m4 / (self.m2 * self.m2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * (1.0 + a.abs().max(b.abs()))
    }

    fn moments_of(values: &[f64]) -> RunningMoments {
        let mut m = RunningMoments::new();
        for &v in values {
            m.push(v);
        }
        m
    }

    #[test]
    fn mean_matches_direct_computation() {
        let values = [3.0, 7.5, 1.25, 9.0, 4.0, 4.0, 12.5];
        let m = moments_of(&values);
        let direct = values.iter().sum::<f64>() / values.len() as f64;
        assert!(close(m.mean(), direct));
        assert_eq!(m.count(), 7);
    }

    #[test]
    fn moments_do_not_depend_on_order() {
        let a = moments_of(&[1.0, 2.0, 3.0, 10.0, 4.0]);
        let b = moments_of(&[10.0, 4.0, 3.0, 1.0, 2.0]);
        let c = moments_of(&[4.0, 3.0, 10.0, 2.0, 1.0]);
        for other in [b, c] {
            assert!(close(a.mean(), other.mean()));
            assert!(close(a.variance(), other.variance()));
            assert!(close(a.skewness(), other.skewness()));
            assert!(close(a.kurtosis(), other.kurtosis()));
        }
    }

    #[test]
    fn variance_uses_sample_denominator() {
        let m = moments_of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        // sum of squared deviations is 32
        assert!(close(m.variance(), 32.0 / 7.0));
        assert!(close(m.stddev(), (32.0f64 / 7.0).sqrt()));
        assert!(close(m.stderr(), (32.0f64 / 7.0 / 8.0).sqrt()));
    }

    #[test]
    fn higher_moments_match_direct_formulas() {
        let values = [1.0, 2.0, 2.0, 3.0, 9.0];
        let m = moments_of(&values);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let c2: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let c3: f64 = values.iter().map(|v| (v - mean).powi(3)).sum();
        let c4: f64 = values.iter().map(|v| (v - mean).powi(4)).sum();
        assert!(close(m.skewness(), n.sqrt() * c3 / c2.powf(1.5)));
        assert!(close(m.kurtosis(), n * c4 / (c2 * c2)));
        assert!(m.skewness() > 0.0);
    }

    #[test]
    fn undefined_moments_are_zero() {
        let empty = RunningMoments::new();
        assert_eq!(empty.variance(), 0.0);
        assert_eq!(empty.skewness(), 0.0);

        let one = moments_of(&[42.0]);
        assert_eq!(one.mean(), 42.0);
        assert_eq!(one.variance(), 0.0);
        assert_eq!(one.stderr(), 0.0);
        assert_eq!(one.kurtosis(), 0.0);

        let flat = moments_of(&[5.0, 5.0, 5.0]);
        assert_eq!(flat.skewness(), 0.0);
        assert_eq!(flat.kurtosis(), 0.0);
    }
}
