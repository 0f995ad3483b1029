//! Output row packing: intermediate WP13/16-bit rows to external formats
//!
//! One [`PixelPacker`] is selected per frame so the per-pixel loops carry no
//! format branches. Packers are row-local: the dispatcher hands each work
//! item the output scanline slice it owns (for the bottom-up 8-bit RGB
//! formats the decoder passes the vertically mirrored slice; for 4:2:0 the
//! work item is a scanline pair plus its chroma rows).
//!
//! Rows arrive packed 4:4:4(:4). YUV packers convert through the plan's
//! fixed-point matrix unless the row is already flagged
//! `COLOR_FORMAT_DONE`, then fold chroma 4:4:4 -> 4:2:2 with the
//! center-weighted filter (or by decimation when the chroma was duplicated
//! up from real 4:2:2 samples, which is bit-exact).

mod dither;
mod downsample;
mod rgb8;
mod rgb10;
mod rgb16;
mod v210;
mod yuv16;
mod yuv8;

pub use dither::{dither_value, DITHER_2X8};
pub use downsample::downsample_chroma_422;
pub use rgb16::{unpack_rg48, unpack_wp13};
pub use rgb8::unpack_rgb24;

use crate::frame::{PixelFormat, WhitePoint};
use crate::plan::Plan;
use crate::row::{RowFlags, RowView};

/// Destination of one pack work item
pub enum PackDest<'a> {
    /// A single output scanline
    Row(&'a mut [u8]),
    /// A luma scanline pair plus the shared chroma row (4:2:0 planar)
    Pair {
        luma: [&'a mut [u8]; 2],
        chroma: ChromaRows<'a>,
    },
}

/// Chroma storage for the 4:2:0 planar formats
pub enum ChromaRows<'a> {
    /// NV12: one interleaved U,V row
    Interleaved(&'a mut [u8]),
    /// YV12: separate U and V rows
    Planar {
        u: &'a mut [u8],
        v: &'a mut [u8],
    },
}

/// Per-worker staging buffers for packers that stage YUV or chroma
pub struct PackScratch {
    pub yuv: Vec<i16>,
    pub chroma: Vec<i16>,
    /// Second chroma row for the 4:2:0 pair packers
    pub chroma2: Vec<i16>,
    /// Vector paths allowed (decoder CPU mask)
    pub use_simd: bool,
}

impl Default for PackScratch {
    fn default() -> Self {
        Self {
            yuv: Vec::new(),
            chroma: Vec::new(),
            chroma2: Vec::new(),
            use_simd: true,
        }
    }
}

/// Packs one intermediate row (or row pair) into the output format.
///
/// Selected once per frame; implementations are stateless and shared
/// across workers.
pub trait PixelPacker: Send + Sync {
    /// True for formats whose work item is a scanline pair
    fn packs_pairs(&self) -> bool {
        false
    }

    /// Pack `rows` (one view, or two for pair packers) into `dest`.
    /// `y` is the top scanline index, used by the ordered dither.
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, scratch: &mut PackScratch);
}

/// Build the packer for `format`, capturing what it needs from the plan.
pub fn packer_for(format: PixelFormat, plan: &Plan) -> Box<dyn PixelPacker> {
    let to_yuv = plan.rgb_to_yuv;
    match format {
        PixelFormat::Rgb24 => Box::new(rgb8::Rgb24Packer),
        PixelFormat::Rgb32 => Box::new(rgb8::Rgb32Packer { alpha: false }),
        PixelFormat::Bgra => Box::new(rgb8::Rgb32Packer { alpha: true }),
        PixelFormat::Rg48 => Box::new(rgb16::Rg48Packer),
        PixelFormat::Rg64 => Box::new(rgb16::Rg64Packer),
        PixelFormat::B64a => Box::new(rgb16::B64aPacker),
        PixelFormat::Wp13 => Box::new(rgb16::Wp13Packer { alpha: false }),
        PixelFormat::W13a => Box::new(rgb16::Wp13Packer { alpha: true }),
        PixelFormat::Rg30 => Box::new(rgb10::Packed10Packer::new(rgb10::Order10::Rg30)),
        PixelFormat::Ar10 => Box::new(rgb10::Packed10Packer::new(rgb10::Order10::Ar10)),
        PixelFormat::Ab10 => Box::new(rgb10::Packed10Packer::new(rgb10::Order10::Ab10)),
        PixelFormat::R210 => Box::new(rgb10::Packed10Packer::new(rgb10::Order10::R210)),
        PixelFormat::Dpx0 => Box::new(rgb10::Packed10Packer::new(rgb10::Order10::Dpx0)),
        PixelFormat::V210 => Box::new(v210::V210Packer { to_yuv }),
        PixelFormat::Yu64 => Box::new(yuv16::Yu64Packer { to_yuv }),
        PixelFormat::Yr16 => Box::new(yuv16::Yr16Packer { to_yuv }),
        PixelFormat::Yuyv => Box::new(yuv8::Packed422Packer::new(yuv8::Order422::Yuyv, to_yuv)),
        PixelFormat::Uyvy | PixelFormat::CbYCrY8 => {
            Box::new(yuv8::Packed422Packer::new(yuv8::Order422::Uyvy, to_yuv))
        }
        PixelFormat::Yvyu => Box::new(yuv8::Packed422Packer::new(yuv8::Order422::Yvyu, to_yuv)),
        PixelFormat::R408 => Box::new(yuv8::Packed4444Packer { v408: false, to_yuv }),
        PixelFormat::V408 => Box::new(yuv8::Packed4444Packer { v408: true, to_yuv }),
        PixelFormat::CbYCrY16 => Box::new(yuv16::CbYCrY16Packer {
            to_yuv,
            fraction_bits: 16,
        }),
        PixelFormat::CbYCrY2_14 => Box::new(yuv16::CbYCrY16Packer {
            to_yuv,
            fraction_bits: 14,
        }),
        PixelFormat::CbYCrY10_6 => Box::new(yuv16::CbYCrY16Packer {
            to_yuv,
            fraction_bits: 6,
        }),
        PixelFormat::CbYCrY2_8 => Box::new(yuv16::CbYCrY2_8Packer { to_yuv }),
        PixelFormat::Nv12 => Box::new(yuv8::Planar420Packer { nv12: true, to_yuv }),
        PixelFormat::Yv12 => Box::new(yuv8::Planar420Packer { nv12: false, to_yuv }),
    }
}

/// Raw row sample scaled to 8 bits, with ordered dither
#[inline]
pub(crate) fn sample8(s: i16, wp: WhitePoint, x: usize, y: usize) -> u8 {
    match wp {
        WhitePoint::W13 => to8_wp13(s as i32, x, y),
        _ => {
            let d = dither_value(x, y, 8);
            ((s as u16 as i32 + d) >> 8).clamp(0, 255) as u8
        }
    }
}

/// Raw row sample scaled to 10 bits, with ordered dither
#[inline]
pub(crate) fn sample10(s: i16, wp: WhitePoint, x: usize, y: usize) -> u32 {
    match wp {
        WhitePoint::W13 => to10_wp13(s as i32, x, y),
        _ => {
            let d = dither_value(x, y, 6);
            ((s as u16 as i32 + d) >> 6).clamp(0, 1023) as u32
        }
    }
}

/// Raw row sample scaled to unsigned 16 bits (exact for 16-bit rows)
#[inline]
pub(crate) fn sample16(s: i16, wp: WhitePoint) -> u16 {
    match wp {
        WhitePoint::W13 => to16_wp13(s as i32),
        _ => s as u16,
    }
}

/// Row sample folded to an 8-bit scope bin (no dither)
#[inline]
pub(crate) fn sample_bin(s: i16, wp: WhitePoint) -> usize {
    match wp {
        WhitePoint::W13 => ((s as i32) >> 5).clamp(0, 255) as usize,
        _ => ((s as u16) >> 8) as usize,
    }
}

/// Raw row sample in the signed WP13 domain
#[inline]
pub(crate) fn sample13(s: i16, wp: WhitePoint) -> i32 {
    match wp {
        WhitePoint::W13 => s as i32,
        _ => (s as u16 as i32) >> 3,
    }
}

/// WP13 value scaled to 8 bits, with ordered dither
#[inline]
pub(crate) fn to8_wp13(v: i32, x: usize, y: usize) -> u8 {
    let d = dither_value(x, y, 5);
    ((v + d) >> 5).clamp(0, 255) as u8
}

/// WP13 value scaled to 10 bits, with ordered dither
#[inline]
pub(crate) fn to10_wp13(v: i32, x: usize, y: usize) -> u32 {
    let d = dither_value(x, y, 3);
    ((v + d) >> 3).clamp(0, 1023) as u32
}

/// WP13 value scaled to unsigned 16 bits
#[inline]
pub(crate) fn to16_wp13(v: i32) -> u16 {
    (v << 3).clamp(0, 65535) as u16
}

/// Convert one pixel of a 4:4:4 row to WP13 YUV, honoring
/// `COLOR_FORMAT_DONE`.
#[inline]
pub(crate) fn pixel_yuv(
    row: &RowView<'_>,
    to_yuv: &crate::matrix::FixedRgbToYuv,
    x: usize,
) -> [i32; 3] {
    let base = x * row.channels;
    let wp13 = [
        sample13(row.samples[base], row.white_point),
        sample13(row.samples[base + 1], row.white_point),
        sample13(row.samples[base + 2], row.white_point),
    ];
    if row.flags.contains(RowFlags::COLOR_FORMAT_DONE) {
        wp13
    } else {
        to_yuv.convert(wp13)
    }
}

/// Stage a whole row as WP13 YUV into `scratch.yuv` (3 planes of `width`),
/// then fold chroma to 4:2:2 into `scratch.chroma` (2 planes of
/// `width/2`). Returns `(y_len, c_len)` for the planes.
pub(crate) fn stage_yuv422(
    row: &RowView<'_>,
    to_yuv: &crate::matrix::FixedRgbToYuv,
    scratch: &mut PackScratch,
) -> (usize, usize) {
    let width = row.width;
    let half = width.div_ceil(2);
    scratch.yuv.clear();
    scratch.yuv.resize(width * 3, 0);
    let (y_plane, uv) = scratch.yuv.split_at_mut(width);
    let (u_plane, v_plane) = uv.split_at_mut(width);
    for x in 0..width {
        let yuv = pixel_yuv(row, to_yuv, x);
        y_plane[x] = yuv[0].clamp(-16384, 32767) as i16;
        u_plane[x] = yuv[1].clamp(-16384, 32767) as i16;
        v_plane[x] = yuv[2].clamp(-16384, 32767) as i16;
    }
    scratch.chroma.clear();
    scratch.chroma.resize(half * 2, 0);
    let (u_half, v_half) = scratch.chroma.split_at_mut(half);
    if row.flags.contains(RowFlags::CHROMA_DUPLICATED) {
        // chroma was duplicated up from real 4:2:2 samples; decimation
        // reproduces them exactly, refiltering would not
        for i in 0..half {
            u_half[i] = u_plane[i * 2];
            v_half[i] = v_plane[i * 2];
        }
    } else {
        crate::simd::downsample_chroma_422(u_plane, u_half, scratch.use_simd);
        crate::simd::downsample_chroma_422(v_plane, v_half, scratch.use_simd);
    }
    (width, half)
}
