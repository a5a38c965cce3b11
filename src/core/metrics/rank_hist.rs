use super::quantile::Ranked;

/// Counting array over the integer domain `0..capacity`.
///
/// Rank queries scan the buckets, which is fine for small domains such as
/// mapping quality and for a handful of queries per report.
#[derive(Clone, Debug)]
pub struct RankHistogram {
    counts: Vec<u64>,
    total: u64,
}

impl RankHistogram {
    pub fn new(capacity: usize) -> Self {
        Self {
            counts: vec![0u64; capacity.max(1)],
            total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Values past the domain land in the last bucket.
    pub fn push(&mut self, v: usize) {
        let last = self.counts.len() - 1;
        self.counts[v.min(last)] += 1;
        self.total += 1;
    }

    /// Value of the `i`-th smallest observation (0-based).
    pub fn rank(&self, i: u64) -> Option<usize> {
        if i >= self.total {
            return None;
        }
        let mut remaining = i;
        for (value, &count) in self.counts.iter().enumerate() {
            if remaining < count {
                return Some(value);
            }
            remaining -= count;
        }
        None
    }
}

impl Ranked for RankHistogram {
    fn rank_len(&self) -> usize {
        self.total as usize
    }

    fn value_at(&self, rank: usize) -> f64 {
        self.rank(rank as u64).unwrap_or(0) as f64
    }
}
