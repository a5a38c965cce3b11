#[cfg(target_arch = "aarch64")]
mod aarch64_neon;
mod scalar;
#[cfg(target_arch = "x86_64")]
mod x86_avx2;

/// Raw quality accumulators for one read. `min`/`max` are only meaningful
/// when `count > 0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QualStats {
    pub count: u64,
    pub sum: u64,
    pub ssq: u64,
    pub min: u8,
    pub max: u8,
}

impl QualStats {
    pub const EMPTY: QualStats = QualStats {
        count: 0,
        sum: 0,
        ssq: 0,
        min: u8::MAX,
        max: 0,
    };
}

/// Counts of A, C, G, T and everything else (reported as N), case-insensitive.
pub fn count_bases(seq: &[u8]) -> [u64; 5] {
    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("avx2") {
        // SAFETY: AVX2 availability checked at runtime.
        let (a, c, g, t) = unsafe { x86_avx2::count_acgt_avx2(seq) };
        return with_other(seq.len(), a, c, g, t);
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is part of the aarch64 baseline.
        let (a, c, g, t) = unsafe { aarch64_neon::count_acgt_neon(seq) };
        return with_other(seq.len(), a, c, g, t);
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        let (a, c, g, t) = scalar::count_acgt(seq);
        return with_other(seq.len(), a, c, g, t);
    }
}

pub fn qual_stats(qual: &[u8]) -> QualStats {
    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("avx2") {
        // SAFETY: AVX2 availability checked at runtime.
        return unsafe { x86_avx2::qual_stats_avx2(qual) };
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is part of the aarch64 baseline.
        return unsafe { aarch64_neon::qual_stats_neon(qual) };
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        return scalar::qual_stats(qual);
    }
}

fn with_other(len: usize, a: u32, c: u32, g: u32, t: u32) -> [u64; 5] {
    let acgt = a as u64 + c as u64 + g as u64 + t as u64;
    [a as u64, c as u64, g as u64, t as u64, len as u64 - acgt]
}
