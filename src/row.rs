//! Intermediate scanline buffers
//!
//! Between the inverse wavelet stage and the output packer every scanline
//! lives in a [`RowBuf`]: 16-bit samples in one of three layouts, tagged with
//! the white point and a small flag word. The two numeric views (signed WP13
//! and unsigned 16-bit) are reinterpretations of the same storage; `bytemuck`
//! provides the casts so no pointer arithmetic leaks out of this module.

use bitflags::bitflags;

use crate::frame::WhitePoint;

/// Sample arrangement within a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// `width` R samples, then `width` G, then `width` B (, then A)
    Planar,
    /// Blocks of 8 R, 8 G, 8 B (, 8 A) repeated across the row
    Planar8,
    /// Interleaved R,G,B(,A) per pixel
    Packed,
}

bitflags! {
    /// Row state carried alongside the samples
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RowFlags: u32 {
        /// Samples already clipped to the legal range; do not clip again
        const PRESATURATED = 1 << 0;
        /// Row already converted to the output colorspace family;
        /// only packing remains
        const COLOR_FORMAT_DONE = 1 << 1;
        /// Alpha companding has been undone for this row
        const ALPHA_DECOMPANDED = 1 << 2;
        /// Chroma was expanded from 4:2:2 by sample repetition; packers
        /// fold it back by decimation instead of refiltering
        const CHROMA_DUPLICATED = 1 << 3;
    }
}

/// One intermediate scanline
#[derive(Debug, Clone)]
pub struct RowBuf {
    samples: Vec<i16>,
    width: usize,
    channels: usize,
    layout: RowLayout,
    white_point: WhitePoint,
    flags: RowFlags,
}

impl RowBuf {
    /// Zero-filled row
    pub fn new(width: usize, channels: usize, layout: RowLayout, white_point: WhitePoint) -> Self {
        Self {
            samples: vec![0; width * channels],
            width,
            channels,
            layout,
            white_point,
            flags: RowFlags::empty(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    pub fn white_point(&self) -> WhitePoint {
        self.white_point
    }

    pub fn flags(&self) -> RowFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: RowFlags) {
        self.flags = flags;
    }

    pub fn insert_flags(&mut self, flags: RowFlags) {
        self.flags |= flags;
    }

    pub fn set_white_point(&mut self, wp: WhitePoint) {
        self.white_point = wp;
    }

    /// Signed view of the samples
    pub fn signed(&self) -> &[i16] {
        &self.samples
    }

    /// Mutable signed view
    pub fn signed_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Unsigned 16-bit view of the same storage
    pub fn unsigned(&self) -> &[u16] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Mutable unsigned view
    pub fn unsigned_mut(&mut self) -> &mut [u16] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    /// Borrow as an immutable view
    pub fn view(&self) -> RowView<'_> {
        RowView {
            samples: &self.samples,
            width: self.width,
            channels: self.channels,
            layout: self.layout,
            white_point: self.white_point,
            flags: self.flags,
        }
    }

    /// Sample for pixel `x`, channel `ch`, regardless of layout
    pub fn sample(&self, x: usize, ch: usize) -> i16 {
        self.view().sample(x, ch)
    }

    /// Rewrite the row into `layout`, using `scratch` as the staging buffer.
    /// A no-op when the layout already matches. The 8-pixel planar layout
    /// requires the width to be a multiple of 8.
    pub fn convert_layout(&mut self, layout: RowLayout, scratch: &mut Vec<i16>) {
        if self.layout == layout {
            return;
        }
        debug_assert!(
            layout != RowLayout::Planar8 || self.width.is_multiple_of(8),
            "8-pixel planar rows need a width multiple of 8"
        );
        scratch.clear();
        scratch.resize(self.samples.len(), 0);
        {
            let view = self.view();
            for x in 0..self.width {
                for ch in 0..self.channels {
                    scratch[index_for(layout, self.width, self.channels, x, ch)] =
                        view.sample(x, ch);
                }
            }
        }
        self.samples.copy_from_slice(scratch);
        self.layout = layout;
    }
}

/// Non-owning view of a row, handed to the applicator and packers
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub samples: &'a [i16],
    pub width: usize,
    pub channels: usize,
    pub layout: RowLayout,
    pub white_point: WhitePoint,
    pub flags: RowFlags,
}

impl<'a> RowView<'a> {
    /// Unsigned view of the same samples
    pub fn unsigned(&self) -> &'a [u16] {
        bytemuck::cast_slice(self.samples)
    }

    /// Sample for pixel `x`, channel `ch`
    #[inline]
    pub fn sample(&self, x: usize, ch: usize) -> i16 {
        self.samples[index_for(self.layout, self.width, self.channels, x, ch)]
    }
}

#[inline]
fn index_for(layout: RowLayout, width: usize, channels: usize, x: usize, ch: usize) -> usize {
    match layout {
        RowLayout::Planar => ch * width + x,
        RowLayout::Planar8 => {
            let block = x / 8;
            block * channels * 8 + ch * 8 + (x & 7)
        }
        RowLayout::Packed => x * channels + ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_row(layout: RowLayout) -> RowBuf {
        // 16 pixels, value = x*4 + ch in packed order
        let mut row = RowBuf::new(16, 3, RowLayout::Packed, WhitePoint::W13);
        for x in 0..16 {
            for ch in 0..3 {
                row.samples[x * 3 + ch] = (x * 4 + ch) as i16;
            }
        }
        let mut scratch = Vec::new();
        row.convert_layout(layout, &mut scratch);
        row
    }

    #[test]
    fn layouts_agree_on_samples() {
        let packed = sequential_row(RowLayout::Packed);
        let planar = sequential_row(RowLayout::Planar);
        let planar8 = sequential_row(RowLayout::Planar8);
        for x in 0..16 {
            for ch in 0..3 {
                assert_eq!(packed.sample(x, ch), planar.sample(x, ch));
                assert_eq!(packed.sample(x, ch), planar8.sample(x, ch));
            }
        }
    }

    #[test]
    fn layout_conversion_roundtrips() {
        let mut row = sequential_row(RowLayout::Planar8);
        let mut scratch = Vec::new();
        row.convert_layout(RowLayout::Packed, &mut scratch);
        for x in 0..16 {
            for ch in 0..3 {
                assert_eq!(row.sample(x, ch), (x * 4 + ch) as i16);
            }
        }
    }

    #[test]
    fn unsigned_view_reinterprets() {
        let mut row = RowBuf::new(2, 3, RowLayout::Packed, WhitePoint::W16);
        row.signed_mut()[0] = -1;
        assert_eq!(row.unsigned()[0], 0xFFFF);
    }
}
