//! V210: 10-bit 4:2:2 YUV, six samples per four 32-bit words
//!
//! Word sequence per six-pixel group, little-endian, MSBs zero:
//! `Cr0<<20 | Y0<<10 | Cb0`, `Y2<<20 | Cb2<<10 | Y1`,
//! `Cb4<<20 | Y3<<10 | Cr2`, `Y5<<20 | Cr4<<10 | Y4`.
//! Short tail groups replicate the last samples.

use super::{stage_yuv422, to10_wp13, PackDest, PackScratch, PixelPacker};
use crate::matrix::FixedRgbToYuv;
use crate::row::RowView;

pub struct V210Packer {
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for V210Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);

        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);

        let y10 = |i: usize| to10_wp13(luma[i.min(width - 1)] as i32, i, y);
        let u10 = |i: usize| to10_wp13(u_half[i.min(half - 1)] as i32, i * 2, y);
        let v10 = |i: usize| to10_wp13(v_half[i.min(half - 1)] as i32, i * 2, y);

        let groups = width.div_ceil(6);
        for g in 0..groups {
            let p = g * 6;
            let c = g * 3; // chroma sample index of the group start
            let words = [
                (v10(c) << 20) | (y10(p) << 10) | u10(c),
                (y10(p + 2) << 20) | (u10(c + 1) << 10) | y10(p + 1),
                (u10(c + 2) << 20) | (y10(p + 3) << 10) | v10(c + 1),
                (y10(p + 5) << 20) | (v10(c + 2) << 10) | y10(p + 4),
            ];
            for (w, word) in words.iter().enumerate() {
                let o = g * 16 + w * 4;
                out[o..o + 4].copy_from_slice(&word.to_le_bytes());
            }
        }
    }
}
