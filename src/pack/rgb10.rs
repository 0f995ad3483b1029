//! 10-10-10-2 packed RGB outputs: RG30, AR10, AB10, R210, DPX0
//!
//! All five share one packer parameterized by word layout and endianness.
//! Little-endian words for RG30/AR10/AB10, big-endian for R210/DPX0; DPX
//! shifts the components up so the pad bits sit at the bottom.

use super::{sample10, PackDest, PackScratch, PixelPacker};
use crate::row::RowView;

/// Word layout of the 10-bit triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order10 {
    /// `b<<20 | g<<10 | r`, little-endian
    Rg30,
    /// `r<<20 | g<<10 | b`, little-endian
    Ar10,
    /// `b<<20 | g<<10 | r` with the alpha bits set, little-endian
    Ab10,
    /// `r<<20 | g<<10 | b`, big-endian
    R210,
    /// `r<<22 | g<<12 | b<<2`, big-endian
    Dpx0,
}

pub struct Packed10Packer {
    order: Order10,
}

impl Packed10Packer {
    pub fn new(order: Order10) -> Self {
        Self { order }
    }

    #[inline]
    fn word(&self, r: u32, g: u32, b: u32) -> u32 {
        match self.order {
            Order10::Rg30 => (b << 20) | (g << 10) | r,
            Order10::Ar10 => (r << 20) | (g << 10) | b,
            Order10::Ab10 => 0xC000_0000 | (b << 20) | (g << 10) | r,
            Order10::R210 => (r << 20) | (g << 10) | b,
            Order10::Dpx0 => (r << 22) | (g << 12) | (b << 2),
        }
    }

    #[inline]
    fn big_endian(&self) -> bool {
        matches!(self.order, Order10::R210 | Order10::Dpx0)
    }
}

impl PixelPacker for Packed10Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let wp = row.white_point;
        let be = self.big_endian();
        for x in 0..row.width {
            let base = x * row.channels;
            let r = sample10(row.samples[base], wp, x, y);
            let g = sample10(row.samples[base + 1], wp, x, y);
            let b = sample10(row.samples[base + 2], wp, x, y);
            let word = self.word(r, g, b);
            let bytes = if be {
                word.to_be_bytes()
            } else {
                word.to_le_bytes()
            };
            out[x * 4..x * 4 + 4].copy_from_slice(&bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WhitePoint;
    use crate::row::{RowBuf, RowFlags, RowLayout};

    /// Row whose WP13 samples land exactly on the given 10-bit values
    fn row_of_10bit(pixels: &[[u32; 3]]) -> RowBuf {
        let mut row = RowBuf::new(pixels.len(), 3, RowLayout::Packed, WhitePoint::W13);
        for (x, px) in pixels.iter().enumerate() {
            for ch in 0..3 {
                row.signed_mut()[x * 3 + ch] = (px[ch] << 3) as i16;
            }
        }
        row.insert_flags(RowFlags::PRESATURATED);
        row
    }

    fn pack_one(order: Order10, r: u32, g: u32, b: u32) -> [u8; 4] {
        let row = row_of_10bit(&[[r, g, b]]);
        let mut out = [0u8; 4];
        let mut s = PackScratch::default();
        Packed10Packer::new(order).pack(&[row.view()], PackDest::Row(&mut out), 0, &mut s);
        out
    }

    #[test]
    fn ar10_word_layout() {
        let out = pack_one(Order10::Ar10, 1023, 512, 0);
        let word = u32::from_le_bytes(out);
        assert_eq!(word, (1023 << 20) | (512 << 10));
        assert_eq!(word, 0x3FF80000);
    }

    #[test]
    fn rg30_keeps_red_low() {
        let out = pack_one(Order10::Rg30, 1, 0, 0);
        assert_eq!(u32::from_le_bytes(out), 1);
    }

    #[test]
    fn ab10_sets_alpha_bits() {
        let out = pack_one(Order10::Ab10, 0, 0, 0);
        assert_eq!(u32::from_le_bytes(out), 0xC000_0000);
    }

    #[test]
    fn r210_is_big_endian() {
        let out = pack_one(Order10::R210, 1023, 512, 0);
        assert_eq!(u32::from_be_bytes(out), (1023 << 20) | (512 << 10));
    }

    #[test]
    fn dpx0_pads_low_bits() {
        let out = pack_one(Order10::Dpx0, 1, 1, 1);
        assert_eq!(u32::from_be_bytes(out), (1 << 22) | (1 << 12) | (1 << 2));
    }

    #[test]
    fn dither_never_shifts_exact_levels() {
        // samples that are exact 10-bit levels survive every dither phase
        for y in 0..2 {
            let row = row_of_10bit(&[[640, 64, 960]; 8]);
            let mut out = [0u8; 32];
            let mut s = PackScratch::default();
            Packed10Packer::new(Order10::Ar10).pack(
                &[row.view()],
                PackDest::Row(&mut out),
                y,
                &mut s,
            );
            for x in 0..8 {
                let word = u32::from_le_bytes(out[x * 4..x * 4 + 4].try_into().unwrap());
                assert_eq!(word, (640 << 20) | (64 << 10) | 960);
            }
        }
    }
}
