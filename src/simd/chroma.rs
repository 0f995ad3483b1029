//! Vector 4:4:4 -> 4:2:2 chroma fold
//!
//! Eight output samples per iteration. The left/center/right taps of the
//! center-weighted filter fall on alternating lanes of two unaligned loads,
//! so the deinterleave is a shift/sign-extend pair per register.

#[cfg(target_arch = "x86_64")]
use archmage::{arcane, Desktop64, SimdToken};

/// Fold a full-resolution chroma plane to half width.
///
/// `half.len()` must be `full.len().div_ceil(2)`. `enabled` comes from the
/// decoder's CPU mask.
pub fn downsample_chroma_422(full: &[i16], half: &mut [i16], enabled: bool) {
    #[cfg(target_arch = "x86_64")]
    if enabled && full.len() >= 34 {
        if let Some(token) = Desktop64::summon() {
            downsample_sse(token, full, half);
            return;
        }
    }
    let _ = enabled;
    crate::pack::downsample_chroma_422(full, half);
}

#[cfg(target_arch = "x86_64")]
#[arcane]
fn downsample_sse(_token: Desktop64, full: &[i16], half: &mut [i16]) {
    use core::arch::x86_64::*;

    let w = full.len();
    let out_len = half.len();

    // first output needs the replicated left edge; do it scalar
    half[0] = ((full[0] as i32 + 2 * full[0] as i32 + full[1.min(w - 1)] as i32 + 2) >> 2) as i16;

    let mut i = 1usize;
    // per iteration: outputs i..i+8 read full[2i-1 .. 2i+16]
    while 2 * i + 16 <= w && i + 8 <= out_len {
        let c = 2 * i;
        let l_lo: &[i16; 8] = full[c - 1..c + 7].try_into().unwrap();
        let l_hi: &[i16; 8] = full[c + 7..c + 15].try_into().unwrap();
        let c_lo: &[i16; 8] = full[c..c + 8].try_into().unwrap();
        let c_hi: &[i16; 8] = full[c + 8..c + 16].try_into().unwrap();
        unsafe {
            let lv0 = safe_unaligned_simd::x86_64::_mm_loadu_si128(l_lo);
            let lv1 = safe_unaligned_simd::x86_64::_mm_loadu_si128(l_hi);
            let cv0 = safe_unaligned_simd::x86_64::_mm_loadu_si128(c_lo);
            let cv1 = safe_unaligned_simd::x86_64::_mm_loadu_si128(c_hi);

            // even lanes sign-extend via shift up/down; odd lanes shift down
            let left0 = _mm_srai_epi32::<16>(_mm_slli_epi32::<16>(lv0));
            let left1 = _mm_srai_epi32::<16>(_mm_slli_epi32::<16>(lv1));
            let center0 = _mm_srai_epi32::<16>(_mm_slli_epi32::<16>(cv0));
            let center1 = _mm_srai_epi32::<16>(_mm_slli_epi32::<16>(cv1));
            let right0 = _mm_srai_epi32::<16>(cv0);
            let right1 = _mm_srai_epi32::<16>(cv1);

            let round = _mm_set1_epi32(2);
            let sum0 = _mm_add_epi32(
                _mm_add_epi32(left0, right0),
                _mm_add_epi32(_mm_slli_epi32::<1>(center0), round),
            );
            let sum1 = _mm_add_epi32(
                _mm_add_epi32(left1, right1),
                _mm_add_epi32(_mm_slli_epi32::<1>(center1), round),
            );
            let out = _mm_packs_epi32(_mm_srai_epi32::<2>(sum0), _mm_srai_epi32::<2>(sum1));

            let dst: &mut [i16; 8] = (&mut half[i..i + 8]).try_into().unwrap();
            safe_unaligned_simd::x86_64::_mm_storeu_si128(dst, out);
        }
        i += 8;
    }

    // scalar tail with edge replication
    while i < out_len {
        let c = 2 * i;
        let left = full[c - 1] as i32;
        let center = full[c] as i32;
        let right = full[(c + 1).min(w - 1)] as i32;
        half[i] = ((left + 2 * center + right + 2) >> 2) as i16;
        i += 1;
    }
}
