//! SIMD kernels for the row-conversion hot paths
//!
//! Kernels use archmage tokens for runtime CPU feature detection, operate on
//! 128-bit lanes, and always sit behind a dispatch wrapper with a scalar
//! fallback. The `enabled` argument threads the decoder's CPU-feature mask
//! through so scalar-only operation can be forced for testing.

mod chroma;
mod wp13;

pub use chroma::downsample_chroma_422;
pub use wp13::saturate_unsigned_row;

/// CPU feature mask bits (matched against `DecoderConfig::cpu_flags_mask`)
pub const CPU_SSE2: u32 = 1 << 0;
pub const CPU_SSSE3: u32 = 1 << 1;
pub const CPU_SSE41: u32 = 1 << 2;
pub const CPU_AVX2: u32 = 1 << 3;

/// True when the mask leaves the 128-bit integer paths enabled
pub fn simd_allowed(cpu_flags_mask: u32) -> bool {
    cpu_flags_mask & CPU_SSE2 != 0
}
