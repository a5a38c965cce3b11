pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_FIRST_MATE: u16 = 0x40;
pub const FLAG_SECOND_MATE: u16 = 0x80;

pub const MAX_MAPQ: usize = 300;

/// Mate reference sentinel meaning "same reference as this record".
pub const SAME_REFERENCE: &[u8] = b"=";

pub const DEFAULT_HIST_BINS: usize = 30;
pub const DEFAULT_RNA_HIST_BINS: usize = 60;
pub const DEFAULT_MAX_REFS: usize = 1000;
pub const UNCAPPED_MAX_REFS: usize = 1_000_000;
pub const DEFAULT_DISTANT_MATE: i64 = 50_000;
// Empirical: a bucket counts as fully covered at 1.5x the uniform expectation.
pub const DEFAULT_VFACTOR: f64 = 1.5;

/// One normalized alignment, borrowed from whatever buffer the decoder
/// parsed it out of.
///
/// `position` is 1-based; anything `<= 0` means the record is unmapped and
/// no other field is consulted. Quality values are raw (the phred offset is
/// guessed once at finalize time).
#[derive(Clone, Copy, Debug)]
pub struct AlignmentView<'a> {
    pub id: &'a [u8],
    pub len: u32,
    pub flags: u16,
    pub reference: &'a [u8],
    pub position: i64,
    pub mapq: u32,
    pub mate_reference: &'a [u8],
    pub mate_distance: i64,
    pub seq: &'a [u8],
    pub qual: &'a [u8],
    pub mismatches: u32,
    pub inserted: u32,
    pub deleted: u32,
}

impl AlignmentView<'_> {
    pub fn is_mapped(&self) -> bool {
        self.position > 0
    }

    pub fn is_reverse(&self) -> bool {
        self.flags & FLAG_REVERSE != 0
    }

    pub fn is_first_mate(&self) -> bool {
        self.flags & FLAG_FIRST_MATE != 0
    }
}

/// Owned counterpart of [`AlignmentView`], reused across records by decoders
/// that have to materialize fields (BAM sequence unpacking).
#[derive(Clone, Debug, Default)]
pub struct OwnedAlignment {
    pub id: Vec<u8>,
    pub len: u32,
    pub flags: u16,
    pub reference: Vec<u8>,
    pub position: i64,
    pub mapq: u32,
    pub mate_reference: Vec<u8>,
    pub mate_distance: i64,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub mismatches: u32,
    pub inserted: u32,
    pub deleted: u32,
}

impl OwnedAlignment {
    pub fn clear(&mut self) {
        self.id.clear();
        self.reference.clear();
        self.mate_reference.clear();
        self.seq.clear();
        self.qual.clear();
        self.len = 0;
        self.flags = 0;
        self.position = 0;
        self.mapq = 0;
        self.mate_distance = 0;
        self.mismatches = 0;
        self.inserted = 0;
        self.deleted = 0;
    }

    pub fn as_view(&self) -> AlignmentView<'_> {
        AlignmentView {
            id: &self.id,
            len: self.len,
            flags: self.flags,
            reference: &self.reference,
            position: self.position,
            mapq: self.mapq,
            mate_reference: &self.mate_reference,
            mate_distance: self.mate_distance,
            seq: &self.seq,
            qual: &self.qual,
            mismatches: self.mismatches,
            inserted: self.inserted,
            deleted: self.deleted,
        }
    }
}

/// Knobs consumed by the aggregation engine. Every field is independent:
/// positional mode does not imply a reference cap and vice versa.
#[derive(Clone, Debug)]
pub struct StatsConfig {
    pub positional: bool,
    pub hist_bins: usize,
    pub track_duplicates: bool,
    pub max_refs: usize,
    pub distant_mate: i64,
    pub vfactor: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            positional: false,
            hist_bins: DEFAULT_HIST_BINS,
            track_duplicates: false,
            max_refs: DEFAULT_MAX_REFS,
            distant_mate: DEFAULT_DISTANT_MATE,
            vfactor: DEFAULT_VFACTOR,
        }
    }
}

impl StatsConfig {
    /// Defaults for RNA-seq style runs: positional coverage, finer
    /// signature, no reference cap.
    pub fn rna() -> Self {
        Self {
            positional: true,
            hist_bins: DEFAULT_RNA_HIST_BINS,
            max_refs: UNCAPPED_MAX_REFS,
            ..Self::default()
        }
    }
}

/// Receiver for decoded alignments. Decoders announce header references
/// first, then push records in file order.
pub trait AlignmentSink {
    fn declare_reference(&mut self, name: &[u8], len: u64);
    fn push(&mut self, record: &AlignmentView<'_>);
}
