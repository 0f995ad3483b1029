//! WP13 saturation: clamp signed rows to the unsigned white range
//!
//! The vector form is the overflow-protection idiom from the packers'
//! contract: a saturating add against the int16 ceiling folds everything at
//! or above white into the top, the plain subtract restores the scale, and
//! the max clips the footroom.

#[cfg(target_arch = "x86_64")]
use archmage::{arcane, Desktop64, SimdToken};

/// Clamp every sample to `[0, 8191]` (the unsigned WP13 white range).
///
/// `enabled` comes from the decoder's CPU mask; scalar fallback otherwise.
pub fn saturate_unsigned_row(samples: &mut [i16], enabled: bool) {
    #[cfg(target_arch = "x86_64")]
    if enabled {
        if let Some(token) = Desktop64::summon() {
            saturate_sse(token, samples);
            return;
        }
    }
    let _ = enabled;
    saturate_scalar(samples);
}

fn saturate_scalar(samples: &mut [i16]) {
    for v in samples.iter_mut() {
        *v = (*v).clamp(0, 8191);
    }
}

#[cfg(target_arch = "x86_64")]
#[arcane]
fn saturate_sse(_token: Desktop64, samples: &mut [i16]) {
    use core::arch::x86_64::*;

    // 32767 - 8191: pushes anything >= white into int16 saturation
    const TOP: i16 = 24576;

    let mut chunks = samples.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let arr: &mut [i16; 8] = chunk.try_into().unwrap();
        unsafe {
            let v = safe_unaligned_simd::x86_64::_mm_loadu_si128(arr);
            let v = _mm_adds_epi16(v, _mm_set1_epi16(TOP));
            let v = _mm_sub_epi16(v, _mm_set1_epi16(TOP));
            let v = _mm_max_epi16(v, _mm_setzero_si128());
            safe_unaligned_simd::x86_64::_mm_storeu_si128(arr, v);
        }
    }
    saturate_scalar(chunks.into_remainder());
}
