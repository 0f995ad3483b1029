//! 16-bit YUV outputs: YU64, YR16 and the CbYCrY fixed-point family
//!
//! YU64 packs Y0,U,Y1,V per pixel pair; YR16 lays the three 4:2:2 planes
//! out within each scanline (Y, then U, then V). The CbYCrY variants share
//! one packer parameterized by fractional precision: full 16-bit scale,
//! 2.14, or 10.6 (ten significant bits, low six zero). The two-plane 2.8
//! variant writes whole bytes followed by fraction bytes.

use super::{stage_yuv422, PackDest, PackScratch, PixelPacker};
use crate::matrix::FixedRgbToYuv;
use crate::row::RowView;

#[inline]
fn put_le(out: &mut [u8], i: usize, v: u16) {
    out[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
}

/// WP13 to unsigned 16-bit full scale
#[inline]
fn wide16(v: i16) -> u16 {
    ((v as i32) << 3).clamp(0, 65535) as u16
}

pub struct Yu64Packer {
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for Yu64Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);
        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);
        for i in 0..half {
            let x0 = 2 * i;
            let x1 = (x0 + 1).min(width - 1);
            put_le(out, i * 4, wide16(luma[x0]));
            put_le(out, i * 4 + 1, wide16(u_half[i]));
            put_le(out, i * 4 + 2, wide16(luma[x1]));
            put_le(out, i * 4 + 3, wide16(v_half[i]));
        }
    }
}

pub struct Yr16Packer {
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for Yr16Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);
        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);
        for (x, &s) in luma.iter().enumerate() {
            put_le(out, x, wide16(s));
        }
        for (i, &s) in u_half.iter().enumerate() {
            put_le(out, width + i, wide16(s));
        }
        for (i, &s) in v_half.iter().enumerate() {
            put_le(out, width + half + i, wide16(s));
        }
    }
}

pub struct CbYCrY16Packer {
    pub to_yuv: FixedRgbToYuv,
    /// 16 = full scale, 14 = 2.14, 6 = 10.6
    pub fraction_bits: u32,
}

impl CbYCrY16Packer {
    #[inline]
    fn scale(&self, v: i16) -> u16 {
        match self.fraction_bits {
            14 => ((v as i32) << 1).clamp(0, 65535) as u16,
            6 => {
                let ten = ((v as i32) >> 3).clamp(0, 1023) as u16;
                ten << 6
            }
            _ => wide16(v),
        }
    }
}

impl PixelPacker for CbYCrY16Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);
        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);
        for i in 0..half {
            let x0 = 2 * i;
            let x1 = (x0 + 1).min(width - 1);
            put_le(out, i * 4, self.scale(u_half[i]));
            put_le(out, i * 4 + 1, self.scale(luma[x0]));
            put_le(out, i * 4 + 2, self.scale(v_half[i]));
            put_le(out, i * 4 + 3, self.scale(luma[x1]));
        }
    }
}

/// Two-plane CbYCrY: whole bytes for the scanline, then fraction bytes.
/// Row layout: `2*width` MSB bytes followed by `2*width` fraction bytes;
/// callers allocate a 4-byte-per-pixel pitch.
#[allow(non_camel_case_types)]
pub struct CbYCrY2_8Packer {
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for CbYCrY2_8Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);
        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);
        let (whole, fraction) = out.split_at_mut(half * 4);
        for i in 0..half {
            let x0 = 2 * i;
            let x1 = (x0 + 1).min(width - 1);
            let unit = [
                wide16(u_half[i]),
                wide16(luma[x0]),
                wide16(v_half[i]),
                wide16(luma[x1]),
            ];
            for (k, v) in unit.iter().enumerate() {
                whole[i * 4 + k] = (v >> 8) as u8;
                fraction[i * 4 + k] = (v & 0xFF) as u8;
            }
        }
    }
}
