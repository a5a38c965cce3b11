/// An ascending sequence that can be indexed by rank.
///
/// Implemented for sorted slices and for [`super::RankHistogram`], so the
/// same interpolation serves both materialized and bucketed data.
pub trait Ranked {
    fn rank_len(&self) -> usize;
    fn value_at(&self, rank: usize) -> f64;
}

impl Ranked for [i64] {
    fn rank_len(&self) -> usize {
        self.len()
    }

    fn value_at(&self, rank: usize) -> f64 {
        self[rank] as f64
    }
}

impl Ranked for [f64] {
    fn rank_len(&self) -> usize {
        self.len()
    }

    fn value_at(&self, rank: usize) -> f64 {
        self[rank]
    }
}

/// R type-7 quantile. The caller guarantees `data` is sorted ascending.
pub fn quantile<R: Ranked + ?Sized>(data: &R, p: f64) -> f64 {
    let len = data.rank_len();
    if len == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let t = (len - 1) as f64 * p;
    let i = t.floor() as usize;
    let v = data.value_at(i);
    if t > i as f64 && i + 1 < len {
        v + (t - i as f64) * (data.value_at(i + 1) - v)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_of_one_to_five() {
        let v: Vec<i64> = vec![1, 2, 3, 4, 5];
        assert_eq!(quantile(v.as_slice(), 0.5), 3.0);
        assert_eq!(quantile(v.as_slice(), 0.25), 2.0);
        assert_eq!(quantile(v.as_slice(), 0.0), 1.0);
        assert_eq!(quantile(v.as_slice(), 1.0), 5.0);
    }

    #[test]
    fn interpolates_between_ranks() {
        let v = [10.0, 20.0, 30.0, 40.0];
        // t = 3 * 0.5 = 1.5
        assert_eq!(quantile(&v[..], 0.5), 25.0);
        // t = 3 * 0.1 = 0.3
        assert!((quantile(&v[..], 0.1) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn empty_is_zero() {
        let v: [i64; 0] = [];
        for p in [0.0, 0.3, 1.0] {
            assert_eq!(quantile(&v[..], p), 0.0);
        }
    }

    #[test]
    fn single_value() {
        let v = [7i64];
        assert_eq!(quantile(&v[..], 0.9), 7.0);
    }
}
