//! 8-bit packed RGB outputs: RGB24, RGB32, BGRA
//!
//! Windows DIB conventions: bytes are B,G,R(,A/X) and the frame is written
//! bottom-up — the decoder hands these packers the vertically mirrored
//! destination scanline.

use rgb::alt::{BGR8, BGRA8};

use super::{sample8, PackDest, PackScratch, PixelPacker};
use crate::row::RowView;

pub struct Rgb24Packer;

impl PixelPacker for Rgb24Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, _scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let out: &mut [BGR8] = bytemuck::cast_slice_mut(&mut out[..row.width * 3]);
        let wp = row.white_point;
        for (x, px) in out.iter_mut().enumerate() {
            let base = x * row.channels;
            px.r = sample8(row.samples[base], wp, x, y);
            px.g = sample8(row.samples[base + 1], wp, x, y);
            px.b = sample8(row.samples[base + 2], wp, x, y);
        }
    }
}

pub struct Rgb32Packer {
    /// Carry the row's alpha channel; otherwise the fourth byte is opaque
    pub alpha: bool,
}

impl PixelPacker for Rgb32Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, _scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let out: &mut [BGRA8] = bytemuck::cast_slice_mut(&mut out[..row.width * 4]);
        let wp = row.white_point;
        let has_alpha = self.alpha && row.channels == 4;
        for (x, px) in out.iter_mut().enumerate() {
            let base = x * row.channels;
            px.r = sample8(row.samples[base], wp, x, y);
            px.g = sample8(row.samples[base + 1], wp, x, y);
            px.b = sample8(row.samples[base + 2], wp, x, y);
            px.a = if has_alpha {
                sample8(row.samples[base + 3], wp, x, y)
            } else {
                255
            };
        }
    }
}

/// Reverse an RGB24 scanline into a WP13 row (test and repack support)
pub fn unpack_rgb24(bytes: &[u8], width: usize) -> Vec<i16> {
    let mut out = vec![0i16; width * 3];
    let pixels: &[BGR8] = bytemuck::cast_slice(&bytes[..width * 3]);
    for (x, px) in pixels.iter().enumerate() {
        out[x * 3] = (px.r as i16) << 5;
        out[x * 3 + 1] = (px.g as i16) << 5;
        out[x * 3 + 2] = (px.b as i16) << 5;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WhitePoint;
    use crate::row::{RowBuf, RowFlags, RowLayout};

    fn row_of(pixels: &[[i16; 3]]) -> RowBuf {
        let mut row = RowBuf::new(pixels.len(), 3, RowLayout::Packed, WhitePoint::W13);
        for (x, px) in pixels.iter().enumerate() {
            row.signed_mut()[x * 3..x * 3 + 3].copy_from_slice(px);
        }
        row.insert_flags(RowFlags::PRESATURATED);
        row
    }

    #[test]
    fn rgb24_writes_bgr_order() {
        let row = row_of(&[[8191, 0, 4096]]);
        let mut out = [0u8; 3];
        let mut scratch = PackScratch::default();
        Rgb24Packer.pack(&[row.view()], PackDest::Row(&mut out), 0, &mut scratch);
        assert_eq!(out, [128, 0, 255]); // B, G, R
    }

    #[test]
    fn rgb24_unpack_then_repack_is_idempotent() {
        // arbitrary bytes survive unpack -> pack for every dither phase
        let bytes: Vec<u8> = (0..24u8).map(|b| b.wrapping_mul(37)).collect();
        let width = bytes.len() / 3;
        let wp13 = unpack_rgb24(&bytes, width);
        let mut row = RowBuf::new(width, 3, RowLayout::Packed, WhitePoint::W13);
        row.signed_mut().copy_from_slice(&wp13);
        row.insert_flags(RowFlags::PRESATURATED);
        for y in 0..2 {
            let mut out = vec![0u8; width * 3];
            let mut scratch = PackScratch::default();
            Rgb24Packer.pack(&[row.view()], PackDest::Row(&mut out), y, &mut scratch);
            // unpack stores to WP13 and pack truncates back to the same bytes
            let rgb_in: Vec<u8> = bytes.clone();
            assert_eq!(out, rgb_in, "scanline {y}");
        }
    }

    #[test]
    fn rgb32_fills_opaque_alpha() {
        let row = row_of(&[[0, 0, 0]]);
        let mut out = [0u8; 4];
        let mut scratch = PackScratch::default();
        Rgb32Packer { alpha: false }.pack(&[row.view()], PackDest::Row(&mut out), 0, &mut scratch);
        assert_eq!(out[3], 255);
    }
}
