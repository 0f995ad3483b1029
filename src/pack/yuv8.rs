//! 8-bit YUV outputs: the packed 4:2:2 orderings (YUYV, UYVY, YVYU),
//! packed 4:4:4:4 (R408, V408), and planar 4:2:0 (NV12, YV12)
//!
//! The 4:2:0 packers consume scanline pairs so vertical chroma averaging
//! never crosses a work-item boundary.

use super::{
    pixel_yuv, sample8, stage_yuv422, to8_wp13, ChromaRows, PackDest, PackScratch, PixelPacker,
};
use crate::matrix::FixedRgbToYuv;
use crate::row::RowView;

/// Byte order of one two-pixel 4:2:2 unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order422 {
    /// Y0 U Y1 V
    Yuyv,
    /// U Y0 V Y1 (also CbYCrY)
    Uyvy,
    /// Y0 V Y1 U
    Yvyu,
}

pub struct Packed422Packer {
    order: Order422,
    to_yuv: FixedRgbToYuv,
}

impl Packed422Packer {
    pub fn new(order: Order422, to_yuv: FixedRgbToYuv) -> Self {
        Self { order, to_yuv }
    }
}

impl PixelPacker for Packed422Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, scratch: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let width = row.width;
        let (_, half) = stage_yuv422(row, &self.to_yuv, scratch);
        let luma = &scratch.yuv[..width];
        let (u_half, v_half) = scratch.chroma.split_at(half);

        for i in 0..half {
            let x0 = 2 * i;
            let x1 = (x0 + 1).min(width - 1);
            let y0 = to8_wp13(luma[x0] as i32, x0, y);
            let y1 = to8_wp13(luma[x1] as i32, x1, y);
            let u = to8_wp13(u_half[i] as i32, x0, y);
            let v = to8_wp13(v_half[i] as i32, x0, y);
            let unit = match self.order {
                Order422::Yuyv => [y0, u, y1, v],
                Order422::Uyvy => [u, y0, v, y1],
                Order422::Yvyu => [y0, v, y1, u],
            };
            out[i * 4..i * 4 + 4].copy_from_slice(&unit);
        }
    }
}

pub struct Packed4444Packer {
    /// V408 order (U Y V A); otherwise R408 (A Y U V)
    pub v408: bool,
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for Packed4444Packer {
    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, _s: &mut PackScratch) {
        let row = &rows[0];
        let PackDest::Row(out) = dest else { return };
        let has_alpha = row.channels == 4;
        for x in 0..row.width {
            let yuv = pixel_yuv(row, &self.to_yuv, x);
            let yb = to8_wp13(yuv[0], x, y);
            let ub = to8_wp13(yuv[1], x, y);
            let vb = to8_wp13(yuv[2], x, y);
            let ab = if has_alpha {
                sample8(row.samples[x * row.channels + 3], row.white_point, x, y)
            } else {
                255
            };
            let unit = if self.v408 {
                [ub, yb, vb, ab]
            } else {
                [ab, yb, ub, vb]
            };
            out[x * 4..x * 4 + 4].copy_from_slice(&unit);
        }
    }
}

pub struct Planar420Packer {
    /// NV12 interleaved chroma; otherwise YV12 split planes
    pub nv12: bool,
    pub to_yuv: FixedRgbToYuv,
}

impl PixelPacker for Planar420Packer {
    fn packs_pairs(&self) -> bool {
        true
    }

    fn pack(&self, rows: &[RowView<'_>], dest: PackDest<'_>, y: usize, scratch: &mut PackScratch) {
        let PackDest::Pair { luma, chroma } = dest else {
            return;
        };
        let top = &rows[0];
        let width = top.width;
        let half = width.div_ceil(2);

        // Stage the top row, park its folded chroma, stage the bottom row
        let (_, _) = stage_yuv422(top, &self.to_yuv, scratch);
        scratch.chroma2.clear();
        scratch.chroma2.extend_from_slice(&scratch.chroma);
        let [luma0, luma1] = luma;
        for (x, out) in luma0[..width].iter_mut().enumerate() {
            *out = to8_wp13(scratch.yuv[x] as i32, x, y);
        }

        let bottom = rows.get(1).unwrap_or(top);
        let (_, _) = stage_yuv422(bottom, &self.to_yuv, scratch);
        for (x, out) in luma1[..width].iter_mut().enumerate() {
            *out = to8_wp13(scratch.yuv[x] as i32, x, y + 1);
        }

        let (u_top, v_top) = scratch.chroma2.split_at(half);
        let (u_bot, v_bot) = scratch.chroma.split_at(half);
        match chroma {
            ChromaRows::Interleaved(uv) => {
                for i in 0..half {
                    let u = (u_top[i] as i32 + u_bot[i] as i32 + 1) >> 1;
                    let v = (v_top[i] as i32 + v_bot[i] as i32 + 1) >> 1;
                    uv[i * 2] = to8_wp13(u, i * 2, y);
                    uv[i * 2 + 1] = to8_wp13(v, i * 2, y);
                }
            }
            ChromaRows::Planar { u, v } => {
                for i in 0..half {
                    let uu = (u_top[i] as i32 + u_bot[i] as i32 + 1) >> 1;
                    let vv = (v_top[i] as i32 + v_bot[i] as i32 + 1) >> 1;
                    u[i] = to8_wp13(uu, i * 2, y);
                    v[i] = to8_wp13(vv, i * 2, y);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WhitePoint;
    use crate::row::{RowBuf, RowFlags, RowLayout};

    fn yuv_row(width: usize, y8: i32, u8v: i32, v8: i32) -> RowBuf {
        let mut row = RowBuf::new(width, 3, RowLayout::Packed, WhitePoint::W13);
        for x in 0..width {
            row.signed_mut()[x * 3] = (y8 << 5) as i16;
            row.signed_mut()[x * 3 + 1] = (u8v << 5) as i16;
            row.signed_mut()[x * 3 + 2] = (v8 << 5) as i16;
        }
        row.insert_flags(RowFlags::PRESATURATED | RowFlags::COLOR_FORMAT_DONE);
        row
    }

    fn to_yuv() -> FixedRgbToYuv {
        crate::matrix::RGB2YUV_709.to_fixed()
    }

    #[test]
    fn yuyv_orders_bytes() {
        let row = yuv_row(2, 100, 60, 200);
        let mut out = [0u8; 4];
        let mut s = PackScratch::default();
        Packed422Packer::new(Order422::Yuyv, to_yuv()).pack(
            &[row.view()],
            PackDest::Row(&mut out),
            0,
            &mut s,
        );
        assert_eq!(out, [100, 60, 100, 200]);
    }

    #[test]
    fn uyvy_and_yvyu_swap_positions() {
        let row = yuv_row(2, 100, 60, 200);
        let mut s = PackScratch::default();
        let mut uyvy = [0u8; 4];
        Packed422Packer::new(Order422::Uyvy, to_yuv()).pack(
            &[row.view()],
            PackDest::Row(&mut uyvy),
            0,
            &mut s,
        );
        assert_eq!(uyvy, [60, 100, 200, 100]);
        let mut yvyu = [0u8; 4];
        Packed422Packer::new(Order422::Yvyu, to_yuv()).pack(
            &[row.view()],
            PackDest::Row(&mut yvyu),
            0,
            &mut s,
        );
        assert_eq!(yvyu, [100, 200, 100, 60]);
    }

    #[test]
    fn v408_carries_alpha_last() {
        let mut row = RowBuf::new(1, 4, RowLayout::Packed, WhitePoint::W13);
        row.signed_mut().copy_from_slice(&[100 << 5, 60 << 5, 200 << 5, 8191]);
        row.insert_flags(RowFlags::PRESATURATED | RowFlags::COLOR_FORMAT_DONE);
        let mut out = [0u8; 4];
        let mut s = PackScratch::default();
        Packed4444Packer {
            v408: true,
            to_yuv: to_yuv(),
        }
        .pack(&[row.view()], PackDest::Row(&mut out), 0, &mut s);
        assert_eq!(out, [60, 100, 200, 255]);
    }

    #[test]
    fn nv12_averages_vertical_chroma() {
        let top = yuv_row(4, 100, 40, 208);
        let bot = yuv_row(4, 100, 60, 208);
        let mut y0 = [0u8; 4];
        let mut y1 = [0u8; 4];
        let mut uv = [0u8; 4];
        let mut s = PackScratch::default();
        Planar420Packer {
            nv12: true,
            to_yuv: to_yuv(),
        }
        .pack(
            &[top.view(), bot.view()],
            PackDest::Pair {
                luma: [&mut y0, &mut y1],
                chroma: ChromaRows::Interleaved(&mut uv),
            },
            0,
            &mut s,
        );
        assert_eq!(y0, [100; 4]);
        assert_eq!(y1, [100; 4]);
        assert_eq!(uv[0], 50); // (40 + 60) / 2
        assert_eq!(uv[1], 208);
    }

    #[test]
    fn yv12_splits_planes() {
        let top = yuv_row(2, 10, 20, 30);
        let mut y0 = [0u8; 2];
        let mut y1 = [0u8; 2];
        let mut u = [0u8; 1];
        let mut v = [0u8; 1];
        let mut s = PackScratch::default();
        Planar420Packer {
            nv12: false,
            to_yuv: to_yuv(),
        }
        .pack(
            &[top.view()],
            PackDest::Pair {
                luma: [&mut y0, &mut y1],
                chroma: ChromaRows::Planar {
                    u: &mut u,
                    v: &mut v,
                },
            },
            0,
            &mut s,
        );
        assert_eq!(u[0], 20);
        assert_eq!(v[0], 30);
        assert_eq!(y0, [10, 10]);
    }
}
