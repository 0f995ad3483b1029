//! 16-bit packed RGB outputs (RG48, RG64, B64A) and the signed 13-bit
//! wire formats (WP13, W13A)
//!
//! 16-bit words are little-endian except B64A, which is big-endian ARGB.
//! WP13/W13A keep the signed 13-bit samples verbatim; they are the
//! intermediate wire contract, so packing must be lossless.

use super::{sample16, PackDest, PackScratch, PixelPacker};
use crate::row::RowView;

#[inline]
fn put_le(out: &mut [u8], i: usize, v: u16) {
    out[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn put_be(out: &mut [u8], i: usize, v: u16) {
    out[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
}

pub struct Rg48Packer;

impl PixelPacker for Rg48Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let wp = row.white_point;
        for x in 0..row.width {
            let base = x * row.channels;
            for ch in 0..3 {
                put_le(out, x * 3 + ch, sample16(row.samples[base + ch], wp));
            }
        }
    }
}

pub struct Rg64Packer;

impl PixelPacker for Rg64Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let wp = row.white_point;
        let has_alpha = row.channels == 4;
        for x in 0..row.width {
            let base = x * row.channels;
            for ch in 0..3 {
                put_le(out, x * 4 + ch, sample16(row.samples[base + ch], wp));
            }
            let a = if has_alpha {
                sample16(row.samples[base + 3], wp)
            } else {
                u16::MAX
            };
            put_le(out, x * 4 + 3, a);
        }
    }
}

pub struct B64aPacker;

impl PixelPacker for B64aPacker {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let wp = row.white_point;
        let has_alpha = row.channels == 4;
        for x in 0..row.width {
            let base = x * row.channels;
            let a = if has_alpha {
                sample16(row.samples[base + 3], wp)
            } else {
                u16::MAX
            };
            put_be(out, x * 4, a);
            put_be(out, x * 4 + 1, sample16(row.samples[base], wp));
            put_be(out, x * 4 + 2, sample16(row.samples[base + 1], wp));
            put_be(out, x * 4 + 3, sample16(row.samples[base + 2], wp));
        }
    }
}

pub struct Wp13Packer {
    pub alpha: bool,
}

impl PixelPacker for Wp13Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, _y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let out_channels = if self.alpha { 4 } else { 3 };
        let has_alpha = row.channels == 4;
        for x in 0..row.width {
            let base = x * row.channels;
            for ch in 0..3 {
                let v = wp13_sample(row, base + ch);
                put_le(out, x * out_channels + ch, v as u16);
            }
            if self.alpha {
                let a = if has_alpha {
                    wp13_sample(row, base + 3)
                } else {
                    8191
                };
                put_le(out, x * out_channels + 3, a as u16);
            }
        }
    }
}

#[inline]
fn wp13_sample(row: &RowView<'_>, i: usize) -> i16 {
    match row.white_point {
        crate::frame::WhitePoint::W13 => row.samples[i],
        _ => ((row.samples[i] as u16) >> 3) as i16,
    }
}

/// Reverse an RG48 scanline into unsigned 16-bit samples
pub fn unpack_rg48(bytes: &[u8], width: usize) -> Vec<u16> {
    let mut out = vec![0u16; width * 3];
    for (i, v) in out.iter_mut().enumerate() {
        *v = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
    }
    out
}

/// Reverse a WP13 scanline into signed 13-bit samples
pub fn unpack_wp13(bytes: &[u8], width: usize) -> Vec<i16> {
    let mut out = vec![0i16; width * 3];
    for (i, v) in out.iter_mut().enumerate() {
        *v = i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
    }
    out
}
