//! Active-metadata application: one intermediate row through the plan
//!
//! The applicator takes a row in any layout and precision and leaves it as
//! packed signed WP13 with the plan's corrections applied. The three paths,
//! fastest first: bypass (layout fix only), separable cube (three axis
//! lookups), full cube (trilinear), and the 1D chain
//! (curve -> matrix -> curve -> matrix -> tone -> CDL saturation).
//!
//! Rows tagged [`RowFlags::COLOR_FORMAT_DONE`] were already converted to the
//! output family and only get layout/precision normalization here.

use crate::curve::WP13_ONE;
use crate::frame::WhitePoint;
use crate::matrix::LUMA_709;
use crate::plan::{self, Plan, ToneLut};
use crate::row::{RowBuf, RowFlags, RowLayout};

/// Legal WP13 sample range, clamped between correction steps
pub const WP13_MIN: i32 = -16384;
pub const WP13_MAX: i32 = 32767;

// Q13 renditions of the Rec.709 luma weights
const LUMA_Q13: [i32; 3] = [
    (LUMA_709[0] * 8192.0 + 0.5) as i32,
    (LUMA_709[1] * 8192.0 + 0.5) as i32,
    (LUMA_709[2] * 8192.0 + 0.5) as i32,
];

// CG -> VS range compression for RGB outputs, Q13
const CG2VS_SCALE: i32 = 7036; // 219/255
const CG2VS_OFFSET: i32 = 514; // 16/255

#[inline]
fn clamp_wp13(v: i32) -> i32 {
    v.clamp(WP13_MIN, WP13_MAX)
}

/// WP13 sample to the unsigned 16-bit cube input domain
#[inline]
fn wp13_to_u16(v: i32) -> u16 {
    (v << 3).clamp(0, 65535) as u16
}

/// Apply the plan to one row, leaving it packed signed WP13.
///
/// `scratch` is the worker's staging buffer; the source samples are copied
/// there first, so split-screen restoration and range conversion never
/// mutate shared input state.
pub fn apply_row(plan: &Plan, row: &mut RowBuf, scratch: &mut Vec<i16>) {
    let width = row.width();
    let channels = row.channels();

    // Normalize layout before any per-pixel work
    row.convert_layout(RowLayout::Packed, scratch);

    // Bypass keeps the source precision so 16-bit rows repack exactly
    if plan.is_bypass() || row.flags().contains(RowFlags::COLOR_FORMAT_DONE) {
        row.insert_flags(RowFlags::PRESATURATED);
        return;
    }

    // The correction path works in the signed WP13 domain
    if row.white_point() == WhitePoint::W16 {
        for v in row.signed_mut() {
            *v = ((*v as u16) >> 3) as i16;
        }
        row.set_white_point(WhitePoint::W13);
    }

    let needs_alpha = plan.alpha_decompand
        && channels == 4
        && !row.flags().contains(RowFlags::ALPHA_DECOMPANDED);
    if needs_alpha {
        for px in row.signed_mut().chunks_exact_mut(4) {
            px[3] = plan::decompand_alpha_wp13(px[3] as i32) as i16;
        }
        row.insert_flags(RowFlags::ALPHA_DECOMPANDED);
    }

    // Keep the uncorrected prefix for the split-screen preview
    let split_pixels = (plan.split_position * width as f32) as usize;
    if split_pixels > 0 {
        scratch.clear();
        scratch.extend_from_slice(&row.signed()[..split_pixels * channels]);
    }

    if let Some(cube) = &plan.cube {
        let samples = row.signed_mut();
        if plan.cube_separable {
            for px in samples.chunks_exact_mut(channels) {
                for ch in 0..3 {
                    px[ch] = cube.interpolate_axis(ch, wp13_to_u16(px[ch] as i32));
                }
            }
        } else {
            for px in samples.chunks_exact_mut(channels) {
                let out = cube.interpolate(
                    wp13_to_u16(px[0] as i32),
                    wp13_to_u16(px[1] as i32),
                    wp13_to_u16(px[2] as i32),
                );
                px[..3].copy_from_slice(&out);
            }
        }
    } else {
        apply_one_d(plan, row.signed_mut(), channels);
    }

    if plan.cg_to_vs {
        for px in row.signed_mut().chunks_exact_mut(channels) {
            for v in px[..3].iter_mut() {
                *v = clamp_wp13(((*v as i32 * CG2VS_SCALE) >> 13) + CG2VS_OFFSET) as i16;
            }
        }
    }

    if split_pixels > 0 {
        row.signed_mut()[..split_pixels * channels]
            .copy_from_slice(&scratch[..split_pixels * channels]);
    }

    row.insert_flags(RowFlags::PRESATURATED);
}

fn apply_one_d(plan: &Plan, samples: &mut [i16], channels: usize) {
    let use_float = plan.use_float_matrix;
    for px in samples.chunks_exact_mut(channels) {
        let mut rgb = [px[0] as i32, px[1] as i32, px[2] as i32];

        if plan.ops.curve_to_linear {
            if let Some(table) = &plan.curve_to_linear {
                for v in rgb.iter_mut() {
                    *v = plan::lut_lookup(table, *v);
                }
            }
        }

        if plan.ops.linear_matrix {
            rgb = if use_float {
                transform_float(&plan.linear_matrix.0, rgb)
            } else {
                plan.linear_fixed.transform_wp13(rgb)
            };
            for v in rgb.iter_mut() {
                *v = clamp_wp13(*v);
            }
        }

        if plan.ops.linear_to_curve {
            if let Some(table) = &plan.linear_to_curve {
                for (ch, v) in rgb.iter_mut().enumerate() {
                    *v = plan::lut_lookup(table.channel(ch), *v);
                }
            }
        }

        if plan.ops.curved_matrix {
            rgb = if use_float {
                transform_float(&plan.curved_matrix.0, rgb)
            } else {
                plan.curved_fixed.transform_wp13(rgb)
            };
            for v in rgb.iter_mut() {
                *v = clamp_wp13(*v);
            }
        }

        if plan.ops.gamma_contrast {
            if let Some(table) = &plan.gamma_contrast {
                for (ch, v) in rgb.iter_mut().enumerate() {
                    *v = plan::lut_lookup(table.channel(ch), *v);
                }
            }
        }

        if plan.ops.cdl_saturation {
            let luma =
                (LUMA_Q13[0] * rgb[0] + LUMA_Q13[1] * rgb[1] + LUMA_Q13[2] * rgb[2]) >> 13;
            for v in rgb.iter_mut() {
                *v = clamp_wp13(luma + (((*v - luma) * plan.cdl_saturation_q13) >> 13));
            }
        }

        px[0] = clamp_wp13(rgb[0]) as i16;
        px[1] = clamp_wp13(rgb[1]) as i16;
        px[2] = clamp_wp13(rgb[2]) as i16;
    }
}

#[inline]
fn transform_float(m: &[[f32; 4]; 3], rgb: [i32; 3]) -> [i32; 3] {
    let one = WP13_ONE as f32;
    let f = [
        rgb[0] as f32 / one,
        rgb[1] as f32 / one,
        rgb[2] as f32 / one,
    ];
    let mut out = [0i32; 3];
    for r in 0..3 {
        let v = m[r][0] * f[0] + m[r][1] * f[1] + m[r][2] * f[2] + m[r][3];
        out[r] = (v * one).round() as i32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorConfig;
    use crate::cube::CubeLut;
    use crate::external::LookFileLoader;
    use crate::frame::{EncodedFormat, FrameInfo, PixelFormat};
    use crate::plan::build_plan;

    struct NoLook;
    impl LookFileLoader for NoLook {
        fn load(&self, _: &std::path::Path) -> Option<CubeLut> {
            None
        }
    }

    fn wp13_row(pixels: &[[i16; 3]]) -> RowBuf {
        let mut row = RowBuf::new(pixels.len(), 3, RowLayout::Packed, WhitePoint::W13);
        for (x, px) in pixels.iter().enumerate() {
            row.signed_mut()[x * 3..x * 3 + 3].copy_from_slice(px);
        }
        row
    }

    #[test]
    fn identity_plan_passes_rows_through() {
        let frame = FrameInfo::new(4, 1, EncodedFormat::Rgb444);
        let plan = build_plan(&frame, &ColorConfig::identity(), PixelFormat::Rg48, &NoLook);
        let pixels = [
            [0, 0, 0],
            [8192, 8192, 8192],
            [32767, 32767, 32767],
            [-1, -1, -1],
        ];
        let mut row = wp13_row(&pixels);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        for (x, px) in pixels.iter().enumerate() {
            for ch in 0..3 {
                assert_eq!(row.sample(x, ch), px[ch]);
            }
        }
        assert!(row.flags().contains(RowFlags::PRESATURATED));
    }

    #[test]
    fn bypass_preserves_sixteen_bit_rows() {
        let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
        let plan = build_plan(&frame, &ColorConfig::identity(), PixelFormat::Rg48, &NoLook);
        let mut row = RowBuf::new(2, 3, RowLayout::Packed, WhitePoint::W16);
        row.unsigned_mut().copy_from_slice(&[65535, 32768, 0, 8, 16, 24]);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        assert_eq!(row.white_point(), WhitePoint::W16);
        assert_eq!(row.unsigned()[0], 65535);
    }

    #[test]
    fn correction_normalizes_sixteen_bit_rows_to_wp13() {
        let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
        let mut config = ColorConfig::identity();
        config.exposure = 2.0;
        config.encode_curve = Some(crate::curve::CurveSpec::packed(
            crate::curve::CurveKind::Linear,
            0,
        ));
        let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
        let mut row = RowBuf::new(2, 3, RowLayout::Packed, WhitePoint::W16);
        row.unsigned_mut().copy_from_slice(&[65535, 32768, 0, 8, 16, 24]);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        assert_eq!(row.white_point(), WhitePoint::W13);
        assert_eq!(row.sample(0, 0), 16382);
        assert_eq!(row.sample(0, 1), 8192);
        assert_eq!(row.sample(1, 0), 2);
    }

    #[test]
    fn exposure_scales_pixels() {
        let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
        let mut config = ColorConfig::identity();
        config.exposure = 2.0;
        // keep the chain to a pure linear matrix
        config.encode_curve = Some(crate::curve::CurveSpec::packed(
            crate::curve::CurveKind::Linear,
            0,
        ));
        let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
        let mut row = wp13_row(&[[1024, 2048, 4096], [0, 0, 0]]);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        assert_eq!(row.sample(0, 0), 2048);
        assert_eq!(row.sample(0, 1), 4096);
        assert_eq!(row.sample(0, 2), 8192);
    }

    #[test]
    fn split_screen_preserves_left_side() {
        let frame = FrameInfo::new(8, 1, EncodedFormat::Rgb444);
        let mut config = ColorConfig::identity();
        config.exposure = 2.0;
        config.split_cc_position = 0.5;
        config.encode_curve = Some(crate::curve::CurveSpec::packed(
            crate::curve::CurveKind::Linear,
            0,
        ));
        let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
        let pixels: Vec<[i16; 3]> = (0..8).map(|x| [x as i16 * 100; 3]).collect();
        let mut row = wp13_row(&pixels);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        for x in 0..4 {
            assert_eq!(row.sample(x, 0), pixels[x][0], "left side must pass through");
        }
        for x in 4..8 {
            assert_eq!(row.sample(x, 0), pixels[x][0] * 2, "right side corrected");
        }
    }

    #[test]
    fn alpha_decompands_exactly_once() {
        let mut frame = FrameInfo::new(2, 1, EncodedFormat::Rgba4444);
        frame.companded_alpha = true;
        let plan = build_plan(&frame, &ColorConfig::identity(), PixelFormat::Rg64, &NoLook);
        let mut row = RowBuf::new(2, 4, RowLayout::Packed, WhitePoint::W13);
        row.signed_mut().copy_from_slice(&[0, 0, 0, 4096, 0, 0, 0, 4096]);
        let mut scratch = Vec::new();
        apply_row(&plan, &mut row, &mut scratch);
        let once = row.sample(0, 3);
        assert_ne!(once, 4096);
        assert!(row.flags().contains(RowFlags::ALPHA_DECOMPANDED));
        // a second application must be a no-op on alpha
        apply_row(&plan, &mut row, &mut scratch);
        assert_eq!(row.sample(0, 3), once);
    }

    #[test]
    fn float_matrix_path_matches_fixed_for_small_coefs() {
        let frame = FrameInfo::new(4, 1, EncodedFormat::Rgb444);
        let mut config = ColorConfig::identity();
        config.exposure = 1.5;
        config.encode_curve = Some(crate::curve::CurveSpec::packed(
            crate::curve::CurveKind::Linear,
            0,
        ));
        let plan_fixed = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
        assert!(!plan_fixed.use_float_matrix);

        let pixels = [[100, 5000, -300], [8192, 0, 4096], [1, 2, 3], [0, 0, 0]];
        let mut fixed_row = wp13_row(&pixels);
        let mut scratch = Vec::new();
        apply_row(&plan_fixed, &mut fixed_row, &mut scratch);

        for (x, px) in pixels.iter().enumerate() {
            for ch in 0..3 {
                let expect = (px[ch] as f32 * 1.5).round() as i32;
                let got = fixed_row.sample(x, ch) as i32;
                assert!((got - expect).abs() <= 1, "pixel {x} ch {ch}: {got} vs {expect}");
            }
        }
    }
}
