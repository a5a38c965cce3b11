use super::QualStats;

pub fn count_acgt(seq: &[u8]) -> (u32, u32, u32, u32) {
    let mut a = 0u32;
    let mut c = 0u32;
    let mut g = 0u32;
    let mut t = 0u32;
    for &b in seq {
        match b & 0xDF {
            b'A' => a += 1,
            b'C' => c += 1,
            b'G' => g += 1,
            b'T' => t += 1,
            _ => {}
        }
    }
    (a, c, g, t)
}

pub fn qual_stats(qual: &[u8]) -> QualStats {
    let mut s = QualStats::EMPTY;
    for &q in qual {
        s.sum += q as u64;
        s.ssq += q as u64 * q as u64;
        s.min = s.min.min(q);
        s.max = s.max.max(q);
    }
    s.count = qual.len() as u64;
    s
}
