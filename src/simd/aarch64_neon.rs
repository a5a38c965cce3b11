#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

use super::QualStats;

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn count_acgt_neon(seq: &[u8]) -> (u32, u32, u32, u32) {
    let mut a = 0u32;
    let mut c = 0u32;
    let mut g = 0u32;
    let mut t = 0u32;
    let mut i = 0usize;
    let len = seq.len();

    let upper_mask = vdupq_n_u8(0xDF);
    let va = vdupq_n_u8(b'A');
    let vc = vdupq_n_u8(b'C');
    let vg = vdupq_n_u8(b'G');
    let vt = vdupq_n_u8(b'T');
    let ones = vdupq_n_u8(1);

    while i + 16 <= len {
        let v = unsafe { vld1q_u8(seq.as_ptr().add(i)) };
        let v = vandq_u8(v, upper_mask);

        a += vaddvq_u8(vandq_u8(vceqq_u8(v, va), ones)) as u32;
        c += vaddvq_u8(vandq_u8(vceqq_u8(v, vc), ones)) as u32;
        g += vaddvq_u8(vandq_u8(vceqq_u8(v, vg), ones)) as u32;
        t += vaddvq_u8(vandq_u8(vceqq_u8(v, vt), ones)) as u32;

        i += 16;
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

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn qual_stats_neon(qual: &[u8]) -> QualStats {
    let mut s = QualStats::EMPTY;
    let mut i = 0usize;
    let len = qual.len();

    let mut vmin = vdupq_n_u8(0xFF);
    let mut vmax = vdupq_n_u8(0);

    while i + 16 <= len {
        let v = unsafe { vld1q_u8(qual.as_ptr().add(i)) };
        vmin = vminq_u8(vmin, v);
        vmax = vmaxq_u8(vmax, v);
        s.sum += vaddlvq_u8(v) as u64;
        let lo = vmull_u8(vget_low_u8(v), vget_low_u8(v));
        let hi = vmull_high_u8(v, v);
        s.ssq += vaddlvq_u16(lo) as u64 + vaddlvq_u16(hi) as u64;
        i += 16;
    }

    if i > 0 {
        s.min = vminvq_u8(vmin);
        s.max = vmaxvq_u8(vmax);
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
