use crate::core::model::{AlignmentSink, AlignmentView, MAX_MAPQ, SAME_REFERENCE, StatsConfig};
use crate::simd;
use std::collections::HashMap;

mod coverage;
mod duplication;
mod moments;
mod quantile;
mod rank_hist;

pub use coverage::{CoverageScores, CoverageTrack};
pub use duplication::DuplicateTracker;
pub use moments::RunningMoments;
pub use quantile::quantile;
pub use rank_hist::RankHistogram;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BaseCounts {
    pub a: u64,
    pub c: u64,
    pub g: u64,
    pub t: u64,
    pub n: u64,
}

impl BaseCounts {
    fn add(&mut self, counts: [u64; 5]) {
        self.a += counts[0];
        self.c += counts[1];
        self.g += counts[2];
        self.t += counts[3];
        self.n += counts[4];
    }

    pub fn total(&self) -> u64 {
        self.a + self.c + self.g + self.t + self.n
    }
}

/// Single-stream alignment statistics. Feed records with [`Agg::update`] in
/// file order, then consume with [`Agg::finalize`].
#[derive(Clone, Debug)]
pub struct Agg {
    config: StatsConfig,
    pub total_reads: u64,
    pub mapped_reads: u64,
    pub mapped_bases: u64,
    len_min: u32,
    len_max: u32,
    len_sum: u64,
    len_ssq: f64,
    mapq: RunningMoments,
    mapq_hist: RankHistogram,
    mismatch_reads: u64,
    mismatch_sum: u64,
    inserted: u64,
    deleted: u64,
    qual_count: u64,
    qual_sum: u64,
    qual_ssq: u64,
    qual_min: u8,
    qual_max: u8,
    bases: BaseCounts,
    forward: u64,
    reverse: u64,
    paired: bool,
    discordant: u64,
    distant: u64,
    insert_sizes: Vec<i64>,
    coverage: HashMap<Vec<u8>, CoverageTrack>,
    dups: Option<DuplicateTracker>,
}

impl Agg {
    pub fn new(config: StatsConfig) -> Self {
        let dups = config.track_duplicates.then(DuplicateTracker::new);
        Self {
            config,
            total_reads: 0,
            mapped_reads: 0,
            mapped_bases: 0,
            len_min: u32::MAX,
            len_max: 0,
            len_sum: 0,
            len_ssq: 0.0,
            mapq: RunningMoments::new(),
            mapq_hist: RankHistogram::new(MAX_MAPQ + 1),
            mismatch_reads: 0,
            mismatch_sum: 0,
            inserted: 0,
            deleted: 0,
            qual_count: 0,
            qual_sum: 0,
            qual_ssq: 0,
            qual_min: u8::MAX,
            qual_max: 0,
            bases: BaseCounts::default(),
            forward: 0,
            reverse: 0,
            paired: false,
            discordant: 0,
            distant: 0,
            insert_sizes: Vec::new(),
            coverage: HashMap::new(),
            dups,
        }
    }

    /// Registers a header reference. A later declaration of the same name
    /// only updates its length.
    pub fn declare_reference(&mut self, name: &[u8], len: u64) {
        let bins = self.config.hist_bins;
        match self.coverage.get_mut(name) {
            Some(track) => track.ref_len = len,
            None => {
                self.coverage
                    .insert(name.to_vec(), CoverageTrack::new(bins, len));
            }
        }
    }

    pub fn update(&mut self, rec: &AlignmentView<'_>) {
        self.total_reads += 1;
        if !rec.is_mapped() {
            return;
        }
        self.mapped_reads += 1;

        let len = rec.len;
        self.len_max = self.len_max.max(len);
        self.len_min = self.len_min.min(len);
        self.len_sum += len as u64;
        self.len_ssq += len as f64 * len as f64;

        // first mate on the reverse strand, or a second/unpaired read on the
        // forward strand, counts as reverse
        if rec.is_reverse() == rec.is_first_mate() {
            self.reverse += 1;
        } else {
            self.forward += 1;
        }

        // only the histogram is bounded
        self.mapq.push(rec.mapq as f64);
        self.mapq_hist.push(rec.mapq as usize);

        if rec.mismatches > 0 {
            self.mismatch_reads += 1;
            self.mismatch_sum += rec.mismatches as u64;
        }
        self.inserted += rec.inserted as u64;
        self.deleted += rec.deleted as u64;

        if !rec.reference.is_empty() {
            let positional = self.config.positional;
            let bins = self.config.hist_bins;
            if !self.coverage.contains_key(rec.reference) {
                self.coverage
                    .insert(rec.reference.to_vec(), CoverageTrack::new(bins, 0));
            }
            if let Some(track) = self.coverage.get_mut(rec.reference) {
                track.observe(rec.position, len, positional);
            }
        }
        self.mapped_bases += len as u64;

        if rec.mate_distance != 0 {
            self.paired = true;
            if rec.mate_distance > 0 {
                self.insert_sizes.push(rec.mate_distance);
            }
        }

        let mate_ref = rec.mate_reference;
        if !mate_ref.is_empty() && mate_ref != SAME_REFERENCE && mate_ref != rec.reference {
            self.discordant += 1;
        } else if rec.mate_distance.abs() > self.config.distant_mate {
            self.distant += 1;
        }

        self.bases.add(simd::count_bases(rec.seq));
        let q = simd::qual_stats(rec.qual);
        if q.count > 0 {
            self.qual_count += q.count;
            self.qual_sum += q.sum;
            self.qual_ssq += q.ssq;
            self.qual_min = self.qual_min.min(q.min);
            self.qual_max = self.qual_max.max(q.max);
        }

        if let Some(dups) = self.dups.as_mut() {
            dups.observe(rec.id);
        }
    }

    fn template_size(&self) -> u64 {
        if self.paired { 2 } else { 1 }
    }

    pub fn finalize(mut self) -> FinalMetrics {
        self.insert_sizes.sort_unstable();
        let duplicates = self.duplicate_report();
        let mapped_reads = duplicates
            .as_ref()
            .map_or(self.mapped_reads, |d| d.mapped_reads);
        let mapping = (self.mapped_reads > 0).then(|| self.mapping_metrics());
        FinalMetrics {
            reads: self.total_reads,
            mapped_reads,
            duplicates,
            mapping,
        }
    }

    fn duplicate_report(&self) -> Option<DupReport> {
        let dups = self.dups.as_ref()?;
        let expected = self.template_size();
        if self.mapped_reads == 0 || (dups.max_count() as u64) <= expected {
            return None;
        }
        let s = dups.summarize(self.paired);
        let pct_ambiguous = if s.distinct > 0 {
            100.0 * s.ambiguous as f64 / s.distinct as f64
        } else {
            0.0
        };
        Some(DupReport {
            mapped_reads: (s.distinct * expected).saturating_sub(s.singletons),
            ambiguous: s.ambiguous * expected,
            pct_ambiguous,
            max_dup_align: s.max_count as u64 - (expected - 1),
            singletons: s.singletons,
            total_mappings: self.mapped_reads,
        })
    }

    fn mapping_metrics(&self) -> MappingMetrics {
        let n = self.mapped_reads;
        let phred = if self.qual_count > 0 && self.qual_min >= 64 {
            64
        } else {
            33
        };
        let pct_forward = (n > 100).then(|| {
            100.0 * self.forward as f64 / (self.forward + self.reverse) as f64
        });

        let len_spread = (self.len_max != self.len_min).then(|| LengthSpread {
            mean: self.len_sum as f64 / n as f64,
            stdev: stdev(n, self.len_sum as f64, self.len_ssq),
        });

        let mapq = MapqSummary {
            mean: self.mapq.mean(),
            stdev: self.mapq.stddev(),
            q1: quantile(&self.mapq_hist, 0.25),
            median: quantile(&self.mapq_hist, 0.50),
            q3: quantile(&self.mapq_hist, 0.75),
        };

        let error_rates = (self.len_sum > 0).then(|| {
            let bases = self.len_sum as f64;
            ErrorRates {
                snp: self.mismatch_sum as f64 / bases,
                ins: (self.inserted > 0).then(|| self.inserted as f64 / bases),
                del: (self.deleted > 0).then(|| self.deleted as f64 / bases),
                pct_mismatch: 100.0 * self.mismatch_reads as f64 / n as f64,
            }
        });

        let base_quality = (self.qual_count > 0).then(|| BaseQuality {
            mean: self.qual_sum as f64 / self.qual_count as f64 - phred as f64,
            stdev: stdev(
                self.qual_count,
                self.qual_sum as f64,
                self.qual_ssq as f64,
            ),
            min: self.qual_min,
            max: self.qual_max,
        });

        let nbase = self.bases.total();
        let composition = (nbase > 0).then(|| {
            let pct = |c: u64| 100.0 * c as f64 / nbase as f64;
            BaseComposition {
                a: pct(self.bases.a),
                c: pct(self.bases.c),
                g: pct(self.bases.g),
                t: pct(self.bases.t),
                n: (self.bases.n > 0).then(|| pct(self.bases.n)),
            }
        });

        let ref_counts = (self.coverage.len() > 1).then(|| RefCounts {
            known: self.coverage.len() as u64,
            aligned: self
                .coverage
                .values()
                .filter(|t| t.mapped_bases > 0)
                .count() as u64,
        });

        MappingMetrics {
            mapped_bases: self.mapped_bases,
            paired: self.paired,
            discordant: self.discordant,
            distant: self.distant,
            pct_forward,
            phred,
            forward: self.forward,
            reverse: self.reverse,
            len_max: self.len_max,
            len_spread,
            mapq,
            error_rates,
            insert: insert_summary(&self.insert_sizes),
            base_quality,
            composition,
            references: self.reference_table(),
            ref_counts,
        }
    }

    fn reference_table(&self) -> Option<ReferenceTable> {
        let mut mapped: Vec<(&Vec<u8>, &CoverageTrack)> = self
            .coverage
            .iter()
            .filter(|(_, t)| t.mapped_bases > 0)
            .collect();
        let have_len = mapped.iter().any(|(_, t)| t.ref_len > 0);
        if !(have_len || mapped.len() > 1) || mapped.len() > self.config.max_refs {
            return None;
        }
        mapped.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let denom = self.len_sum.max(1) as f64;
        let positional = self.config.positional;
        let mut rows = Vec::with_capacity(mapped.len());
        let mut skews = Vec::new();
        let mut cvs = Vec::new();
        let mut covered = Vec::new();
        for (name, track) in mapped {
            let name = String::from_utf8_lossy(name).into_owned();
            let signature = track.has_histogram().then(|| track.signature());
            match signature {
                Some(signature) if positional => {
                    let scores = track.scores(self.config.vfactor);
                    if track.mapped_reads > 0 {
                        skews.push(scores.skew);
                        cvs.push(scores.cv);
                        covered.push(scores.pct_covered);
                        rows.push(RefRow::Coverage {
                            name,
                            ref_len: track.ref_len,
                            reads: track.mapped_reads,
                            scores,
                            signature,
                        });
                    }
                }
                signature => rows.push(RefRow::Share {
                    name,
                    pct: 100.0 * track.mapped_bases as f64 / denom,
                    signature,
                }),
            }
        }

        let medians = positional.then(|| CoverageMedians {
            skew: sorted_median(&mut skews),
            cv: sorted_median(&mut cvs),
            covered: sorted_median(&mut covered),
        });
        Some(ReferenceTable {
            rows,
            medians,
            wide_precision: self.config.max_refs >= 100,
        })
    }
}

impl AlignmentSink for Agg {
    fn declare_reference(&mut self, name: &[u8], len: u64) {
        Agg::declare_reference(self, name, len);
    }

    fn push(&mut self, record: &AlignmentView<'_>) {
        self.update(record);
    }
}

/// Sample standard deviation from running sums; 0 below two values.
fn stdev(n: u64, sum: f64, ssq: f64) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    ((ssq - sum * sum / n) / (n - 1.0)).max(0.0).sqrt()
}

fn sorted_median(v: &mut [f64]) -> f64 {
    v.sort_unstable_by(f64::total_cmp);
    quantile(&*v, 0.5)
}

/// Mean and stdev over the p10..p90 band, quartiles over everything.
fn insert_summary(sorted: &[i64]) -> Option<InsertSummary> {
    if sorted.is_empty() {
        return None;
    }
    let p10 = quantile(sorted, 0.10);
    let p90 = quantile(sorted, 0.90);
    let mut count = 0u64;
    let mut sum = 0.0;
    let mut ssq = 0.0;
    for &v in sorted {
        let x = v as f64;
        if x >= p10 && x <= p90 {
            count += 1;
            sum += x;
            ssq += x * x;
        }
    }
    if count == 0 {
        // two-value samples can straddle the band entirely
        count = sorted.len() as u64;
        sum = sorted.iter().map(|&v| v as f64).sum();
        ssq = sorted.iter().map(|&v| v as f64 * v as f64).sum();
    }
    let spread = (count > 1).then(|| InsertSpread {
        stdev: stdev(count, sum, ssq),
        q1: quantile(sorted, 0.25),
        median: quantile(sorted, 0.50),
        q3: quantile(sorted, 0.75),
    });
    Some(InsertSummary {
        mean: sum / count as f64,
        spread,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinalMetrics {
    pub reads: u64,
    /// Duplicate-corrected when a duplicate report is present.
    pub mapped_reads: u64,
    pub duplicates: Option<DupReport>,
    pub mapping: Option<MappingMetrics>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DupReport {
    pub mapped_reads: u64,
    pub ambiguous: u64,
    pub pct_ambiguous: f64,
    pub max_dup_align: u64,
    pub singletons: u64,
    pub total_mappings: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappingMetrics {
    pub mapped_bases: u64,
    pub paired: bool,
    pub discordant: u64,
    pub distant: u64,
    pub pct_forward: Option<f64>,
    pub phred: u8,
    pub forward: u64,
    pub reverse: u64,
    pub len_max: u32,
    pub len_spread: Option<LengthSpread>,
    pub mapq: MapqSummary,
    pub error_rates: Option<ErrorRates>,
    pub insert: Option<InsertSummary>,
    pub base_quality: Option<BaseQuality>,
    pub composition: Option<BaseComposition>,
    pub references: Option<ReferenceTable>,
    pub ref_counts: Option<RefCounts>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LengthSpread {
    pub mean: f64,
    pub stdev: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapqSummary {
    pub mean: f64,
    pub stdev: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorRates {
    pub snp: f64,
    pub ins: Option<f64>,
    pub del: Option<f64>,
    pub pct_mismatch: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsertSummary {
    pub mean: f64,
    pub spread: Option<InsertSpread>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsertSpread {
    pub stdev: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseQuality {
    pub mean: f64,
    pub stdev: f64,
    pub min: u8,
    pub max: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseComposition {
    pub a: f64,
    pub c: f64,
    pub g: f64,
    pub t: f64,
    pub n: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceTable {
    pub rows: Vec<RefRow>,
    pub medians: Option<CoverageMedians>,
    /// Six decimals for share percentages when many references may print.
    pub wide_precision: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefRow {
    Share {
        name: String,
        pct: f64,
        signature: Option<String>,
    },
    Coverage {
        name: String,
        ref_len: u64,
        reads: u64,
        scores: CoverageScores,
        signature: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverageMedians {
    pub skew: f64,
    pub cv: f64,
    pub covered: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefCounts {
    pub known: u64,
    pub aligned: u64,
}
