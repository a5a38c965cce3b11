#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::QualStats;

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn count_acgt_avx2(seq: &[u8]) -> (u32, u32, u32, u32) {
    let mut a = 0u32;
    let mut c = 0u32;
    let mut g = 0u32;
    let mut t = 0u32;
    let mut i = 0usize;
    let len = seq.len();

    let upper_mask = _mm256_set1_epi8(0xDFu8 as i8);
    let va = _mm256_set1_epi8(b'A' as i8);
    let vc = _mm256_set1_epi8(b'C' as i8);
    let vg = _mm256_set1_epi8(b'G' as i8);
    let vt = _mm256_set1_epi8(b'T' as i8);

    while i + 32 <= len {
        let ptr = unsafe { seq.as_ptr().add(i) as *const __m256i };
        let mut v = unsafe { _mm256_loadu_si256(ptr) };
        v = _mm256_and_si256(v, upper_mask);
        let ma = _mm256_movemask_epi8(_mm256_cmpeq_epi8(v, va)) as u32;
        let mc = _mm256_movemask_epi8(_mm256_cmpeq_epi8(v, vc)) as u32;
        let mg = _mm256_movemask_epi8(_mm256_cmpeq_epi8(v, vg)) as u32;
        let mt = _mm256_movemask_epi8(_mm256_cmpeq_epi8(v, vt)) as u32;
        a += ma.count_ones();
        c += mc.count_ones();
        g += mg.count_ones();
        t += mt.count_ones();
        i += 32;
    }

    for &b in &seq[i..] {
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

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn qual_stats_avx2(qual: &[u8]) -> QualStats {
    let mut s = QualStats::EMPTY;
    let mut i = 0usize;
    let len = qual.len();

    let zero = _mm256_setzero_si256();
    let mut vmin = _mm256_set1_epi8(-1);
    let mut vmax = _mm256_setzero_si256();

    while i + 32 <= len {
        let ptr = unsafe { qual.as_ptr().add(i) as *const __m256i };
        let v = unsafe { _mm256_loadu_si256(ptr) };
        vmin = _mm256_min_epu8(vmin, v);
        vmax = _mm256_max_epu8(vmax, v);

        let sad = _mm256_sad_epu8(v, zero);
        // u8 -> i16 lanes, then pairwise q*q into i32 (max 2 * 255^2)
        let lo = _mm256_cvtepu8_epi16(_mm256_castsi256_si128(v));
        let hi = _mm256_cvtepu8_epi16(_mm256_extracti128_si256::<1>(v));
        let sq = _mm256_add_epi32(_mm256_madd_epi16(lo, lo), _mm256_madd_epi16(hi, hi));

        let mut sums = [0u64; 4];
        let mut squares = [0u32; 8];
        unsafe {
            _mm256_storeu_si256(sums.as_mut_ptr() as *mut __m256i, sad);
            _mm256_storeu_si256(squares.as_mut_ptr() as *mut __m256i, sq);
        }
        s.sum += sums.iter().sum::<u64>();
        s.ssq += squares.iter().map(|&x| x as u64).sum::<u64>();
        i += 32;
    }

    if i > 0 {
        let mut mins = [0u8; 32];
        let mut maxs = [0u8; 32];
        unsafe {
            _mm256_storeu_si256(mins.as_mut_ptr() as *mut __m256i, vmin);
            _mm256_storeu_si256(maxs.as_mut_ptr() as *mut __m256i, vmax);
        }
        s.min = mins.iter().copied().min().unwrap_or(u8::MAX);
        s.max = maxs.iter().copied().max().unwrap_or(0);
    }

    for &q in &qual[i..] {
        s.sum += q as u64;
        s.ssq += q as u64 * q as u64;
        s.min = s.min.min(q);
        s.max = s.max.max(q);
    }
    s.count = len as u64;
    s
}
