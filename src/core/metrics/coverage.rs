use super::moments::RunningMoments;

/// Per-reference coverage accumulator.
///
/// Buckets hold `bins` positional slots plus one overflow slot for positions
/// that round past the end of the reference (or lie beyond a wrong `LN`).
#[derive(Clone, Debug)]
pub struct CoverageTrack {
    pub mapped_bases: u64,
    pub mapped_reads: u64,
    pub ref_len: u64,
    positions: RunningMoments,
    buckets: Vec<u64>,
}

/// Scores derived from a positional-mode track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverageScores {
    pub pct_covered: f64,
    pub skew: f64,
    pub cv: f64,
}

impl CoverageTrack {
    pub fn new(bins: usize, ref_len: u64) -> Self {
        Self {
            mapped_bases: 0,
            mapped_reads: 0,
            ref_len,
            positions: RunningMoments::new(),
            buckets: vec![0u64; bins + 1],
        }
    }

    pub fn bins(&self) -> usize {
        self.buckets.len() - 1
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn overflow(&self) -> u64 {
        self.buckets[self.bins()]
    }

    pub fn has_histogram(&self) -> bool {
        self.ref_len > 0 && self.bins() > 0
    }

    /// Records one alignment starting at 1-based `position` and spanning
    /// `len` bases.
    pub fn observe(&mut self, position: i64, len: u32, positional: bool) {
        self.mapped_bases += len as u64;
        self.mapped_reads += 1;
        let histogram = self.has_histogram();
        if positional {
            for k in 0..len as i64 {
                let pos = position + k;
                self.positions.push(pos as f64);
                if histogram {
                    let b = self.bucket_of(pos);
                    self.buckets[b] += 1;
                }
            }
        } else if histogram {
            let b = self.bucket_of(position);
            self.buckets[b] += len as u64;
        }
    }

    fn bucket_of(&self, position: i64) -> usize {
        let bins = self.bins();
        let offset = (position - 1).max(0) as f64;
        let x = (bins as f64 * (offset / self.ref_len as f64)).floor() as usize;
        x.min(bins)
    }

    fn log_buckets(&self) -> impl Iterator<Item = f64> + '_ {
        self.buckets[..self.bins()]
            .iter()
            .map(|&c| (1.0 + c as f64).log2())
    }

    /// ASCII log2 density string, one symbol per bucket.
    pub fn signature(&self) -> String {
        self.log_buckets()
            .map(|l| char::from(b'0'.saturating_add(l.floor().min(200.0) as u8)))
            .collect()
    }

    pub fn scores(&self, vfactor: f64) -> CoverageScores {
        let bins = self.bins();
        if !self.has_histogram() {
            return CoverageScores {
                pct_covered: 0.0,
                skew: 0.0,
                cv: 0.0,
            };
        }
        let n = bins as f64;

        let mut lsum = 0.0;
        let mut lssq = 0.0;
        for l in self.log_buckets() {
            lsum += l;
            lssq += l * l;
        }
        let cv = if lsum > 0.0 && bins > 1 {
            let var = (n * lssq - lsum * lsum) / (n * (n - 1.0));
            var.max(0.0).sqrt() / (lsum / n)
        } else {
            0.0
        };

        let full = vfactor * self.ref_len as f64 / n;
        let mut covered = 0.0;
        for &count in &self.buckets[..bins] {
            covered += (count as f64 / full).min(1.0);
        }
        let estimate = 100.0 * covered / n;
        let upper = 100.0 * self.mapped_bases as f64 / self.ref_len as f64;
        let pct_covered = estimate.min(upper);

        let mut anchored = self.positions;
        anchored.push(self.ref_len as f64);
        anchored.push(1.0);
        let skew = -anchored.skewness();

        CoverageScores {
            pct_covered,
            skew,
            cv,
        }
    }
}
