//! Intermediate row assembly
//!
//! Merges the per-channel band rows coming out of the inverse wavelet stage
//! into one packed intermediate row, expanding subsampled chroma to 4:4:4 and
//! optionally up-shifting narrow samples to the full 16-bit range. The
//! in-place colorspace transforms let the decoder land rows directly in the
//! output family when no correction runs, so the packers only repack
//! (`COLOR_FORMAT_DONE`).

use whereat::at;

use crate::error::{Error, Result};
use crate::frame::{EncodedFormat, FrameInfo, WhitePoint};
use crate::matrix::{FixedRgbToYuv, FixedYuvToRgb};
use crate::row::{RowBuf, RowFlags, RowLayout};

/// Merge one scanline's channel rows into a packed intermediate row.
///
/// For `Yuv422` sources the chroma channels are half width and are expanded
/// by sample repetition; everything else is full width per channel.
/// `upshift` expands 10/12-bit wavelet output to the row's nominal range.
pub fn assemble_row(
    frame: &FrameInfo,
    channel_rows: &[&[i16]],
    upshift: u32,
) -> Result<RowBuf> {
    let width = frame.width;
    let channels = frame.encoded_format.channels();
    if channel_rows.len() < channels {
        return Err(at(Error::ShortRow {
            channel: channel_rows.len(),
            got: 0,
            need: width,
        }));
    }

    let chroma_sub = frame.encoded_format == EncodedFormat::Yuv422;
    for (ch, band) in channel_rows.iter().enumerate().take(channels) {
        let need = if chroma_sub && ch > 0 {
            width.div_ceil(2)
        } else {
            width
        };
        if band.len() < need {
            return Err(at(Error::ShortRow {
                channel: ch,
                got: band.len(),
                need,
            }));
        }
    }

    let mut row = RowBuf::new(width, channels, RowLayout::Packed, frame.white_point);
    {
        let samples = row.signed_mut();
        for x in 0..width {
            for ch in 0..channels {
                let src = if chroma_sub && ch > 0 { x / 2 } else { x };
                let v = channel_rows[ch][src];
                samples[x * channels + ch] = if upshift > 0 { v << upshift } else { v };
            }
        }
    }
    if chroma_sub {
        row.insert_flags(RowFlags::CHROMA_DUPLICATED);
    }
    Ok(row)
}

/// Drop an unsigned 16-bit row into the signed WP13 domain
pub fn normalize_to_wp13(row: &mut RowBuf) {
    if row.white_point() == WhitePoint::W16 {
        for v in row.signed_mut() {
            *v = ((*v as u16) >> 3) as i16;
        }
        row.set_white_point(WhitePoint::W13);
    }
}

/// In-place packed YUV -> RGB transform (4:4:4, WP13)
pub fn yuv_row_to_rgb(row: &mut RowBuf, m: &FixedYuvToRgb) {
    let channels = row.channels();
    debug_assert_eq!(row.layout(), RowLayout::Packed);
    for px in row.signed_mut().chunks_exact_mut(channels) {
        let rgb = m.convert([px[0] as i32, px[1] as i32, px[2] as i32]);
        px[0] = rgb[0].clamp(-16384, 32767) as i16;
        px[1] = rgb[1].clamp(-16384, 32767) as i16;
        px[2] = rgb[2].clamp(-16384, 32767) as i16;
    }
}

/// In-place packed RGB -> YUV transform (4:4:4, WP13); tags the row as
/// already being in the output family.
pub fn rgb_row_to_yuv(row: &mut RowBuf, m: &FixedRgbToYuv) {
    let channels = row.channels();
    debug_assert_eq!(row.layout(), RowLayout::Packed);
    for px in row.signed_mut().chunks_exact_mut(channels) {
        let yuv = m.convert([px[0] as i32, px[1] as i32, px[2] as i32]);
        px[0] = yuv[0].clamp(-16384, 32767) as i16;
        px[1] = yuv[1].clamp(-16384, 32767) as i16;
        px[2] = yuv[2].clamp(-16384, 32767) as i16;
    }
    row.insert_flags(RowFlags::COLOR_FORMAT_DONE);
}

/// Clamp a row into the unsigned white range and mark it presaturated.
/// Used ahead of packers when the white point is below 16 bits.
pub fn presaturate_row(row: &mut RowBuf, use_simd: bool) {
    if row.white_point() == WhitePoint::W13
        && !row.flags().contains(RowFlags::PRESATURATED)
    {
        crate::simd::saturate_unsigned_row(row.signed_mut(), use_simd);
        row.insert_flags(RowFlags::PRESATURATED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Colorspace;
    use crate::matrix::YuvToRgb;

    #[test]
    fn short_band_is_detected() {
        let frame = FrameInfo::new(8, 1, EncodedFormat::Rgb444);
        let full = [0i16; 8];
        let short = [0i16; 7];
        let err = assemble_row(&frame, &[&full, &short, &full], 0);
        assert!(err.is_err());
    }

    #[test]
    fn chroma_expands_by_repetition() {
        let frame = FrameInfo::new(4, 1, EncodedFormat::Yuv422);
        let y = [10i16, 20, 30, 40];
        let u = [100i16, 200];
        let v = [-5i16, -6];
        let row = assemble_row(&frame, &[&y, &u, &v], 0).unwrap();
        assert_eq!(row.sample(0, 1), 100);
        assert_eq!(row.sample(1, 1), 100);
        assert_eq!(row.sample(2, 1), 200);
        assert_eq!(row.sample(3, 2), -6);
        assert_eq!(row.sample(2, 0), 30);
    }

    #[test]
    fn upshift_expands_narrow_samples() {
        let mut frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
        frame.white_point = WhitePoint::W16;
        let band = [256i16, 1023];
        let row = assemble_row(&frame, &[&band, &band, &band], 6).unwrap();
        assert_eq!(row.sample(0, 0), 256 << 6);
    }

    #[test]
    fn mid_gray_yuv_converts_to_mid_gray_rgb() {
        // 8-bit Y=U=V=128 in WP13 ticks, full-range 709: must stay gray
        let frame = FrameInfo::new(2, 1, EncodedFormat::Yuv422);
        let y = [128i16 << 5, 128 << 5];
        let u = [128i16 << 5];
        let v = [128i16 << 5];
        let mut row = assemble_row(&frame, &[&y, &u, &v], 0).unwrap();
        let m = YuvToRgb::for_colorspace(Colorspace::BT709).to_fixed();
        yuv_row_to_rgb(&mut row, &m);
        for x in 0..2 {
            for ch in 0..3 {
                assert_eq!(row.sample(x, ch), 128 << 5, "x {x} ch {ch}");
            }
        }
    }

    #[test]
    fn presaturate_clips_and_flags() {
        let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
        let band = [-100i16, 9000];
        let mut row = assemble_row(&frame, &[&band, &band, &band], 0).unwrap();
        presaturate_row(&mut row, false);
        assert!(row.flags().contains(RowFlags::PRESATURATED));
        assert_eq!(row.sample(0, 0), 0);
        assert_eq!(row.sample(1, 0), 8191);
    }
}
