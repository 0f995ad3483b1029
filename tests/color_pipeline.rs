//! Correction-path behavior: float-matrix escape, highlight roll-off,
//! CDL saturation, video-safe range compression, alpha companding

mod common;

use common::{rgb_bands, ReplayInverter};
use zenwave::pack;
use zenwave::plan::build_plan;
use zenwave::row::{RowBuf, RowLayout};
use zenwave::{
    apply, ColorConfig, Colorspace, CurveKind, CurveSpec, DecoderConfig, EncodedFormat,
    FrameDecoder, FrameInfo, FsLookLoader, PixelFormat, Unstoppable, WhitePoint,
};

struct NoLook;
impl zenwave::LookFileLoader for NoLook {
    fn load(&self, _: &std::path::Path) -> Option<zenwave::cube::CubeLut> {
        None
    }
}

fn linear_curve() -> CurveSpec {
    CurveSpec::packed(CurveKind::Linear, 0)
}

fn wp13_row(pixels: &[[i16; 3]]) -> RowBuf {
    let mut row = RowBuf::new(pixels.len(), 3, RowLayout::Packed, WhitePoint::W13);
    for (x, px) in pixels.iter().enumerate() {
        row.signed_mut()[x * 3..x * 3 + 3].copy_from_slice(px);
    }
    row
}

#[test]
fn out_of_range_coefficients_take_the_float_loop() {
    let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
    let mut config = ColorConfig::identity();
    config.exposure = 40.0; // past the int16-safe coefficient ceiling
    config.encode_curve = Some(linear_curve());
    let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
    assert!(plan.use_float_matrix);

    let mut row = wp13_row(&[[100, 50, 10], [0, 0, 0]]);
    let mut scratch = Vec::new();
    apply::apply_row(&plan, &mut row, &mut scratch);
    assert_eq!(row.sample(0, 0), 4000);
    assert_eq!(row.sample(0, 1), 2000);
    assert_eq!(row.sample(0, 2), 400);
}

#[test]
fn highlight_rolloff_pulls_the_bright_channel_down() {
    let frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
    let mut config = ColorConfig::identity();
    config.highlight_rolloff = Some(0.8);
    config.encode_curve = Some(linear_curve());
    let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);
    assert!(plan.cube.is_some());

    // near-white red with both companions above h*h; and a safe mid-gray
    let mut row = wp13_row(&[[8100, 7000, 7000], [4096, 4096, 4096]]);
    let mut scratch = Vec::new();
    apply::apply_row(&plan, &mut row, &mut scratch);

    let r = row.sample(0, 0);
    assert!(r < 7600, "bright channel must roll toward its companions: {r}");
    // the companions sit just above the roll-off point and move only a little
    for ch in [1, 2] {
        let v = row.sample(0, ch) as i32;
        assert!((6900..7500).contains(&v), "channel {ch}: {v}");
    }
    // below the roll-off point nothing moves beyond lattice quantization
    assert!((row.sample(1, 0) as i32 - 4096).abs() <= 32);
}

#[test]
fn zero_cdl_saturation_collapses_to_luma() {
    let frame = FrameInfo::new(1, 1, EncodedFormat::Rgb444);
    let mut config = ColorConfig::identity();
    config.cdl_saturation = 0.0;
    config.encode_curve = Some(linear_curve());
    let plan = build_plan(&frame, &config, PixelFormat::Rg48, &NoLook);

    let mut row = wp13_row(&[[8192, 0, 0]]);
    let mut scratch = Vec::new();
    apply::apply_row(&plan, &mut row, &mut scratch);
    // pure red collapses to its Rec.709 luma share
    let luma = (0.2126f32 * 8192.0) as i32;
    for ch in 0..3 {
        assert!(
            (row.sample(0, ch) as i32 - luma).abs() <= 2,
            "channel {ch}: {}",
            row.sample(0, ch)
        );
    }
}

#[test]
fn video_safe_rgb_compresses_the_range() {
    let mut frame = FrameInfo::new(2, 1, EncodedFormat::Rgb444);
    frame.colorspace = Colorspace::BT709 | Colorspace::VS_RGB;
    let pixels = [[8192i16, 8192, 8192], [0, 0, 0]];
    let inverter = ReplayInverter::new(rgb_bands(&pixels, 2), 2 * 3, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(1));
    let mut out = vec![0u8; 2 * 6];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &ColorConfig::identity(),
            &FsLookLoader,
            PixelFormat::Rg48,
            &mut out,
            2 * 6,
            &Unstoppable,
        )
        .unwrap();
    let samples = pack::unpack_rg48(&out, 2);
    // white lands at 219/255 + 16/255, black at the 16-level pedestal
    assert_eq!(samples[0], 7550 << 3);
    assert_eq!(samples[3], 514 << 3);
}

fn rgba_bands(pixels: &[[i16; 4]], width: usize) -> Vec<i16> {
    let height = pixels.len() / width;
    let mut bands = vec![0i16; height * width * 4];
    for y in 0..height {
        for x in 0..width {
            for ch in 0..4 {
                bands[y * width * 4 + ch * width + x] = pixels[y * width + x][ch];
            }
        }
    }
    bands
}

#[test]
fn companded_alpha_is_expanded_once_through_decode() {
    let mut frame = FrameInfo::new(2, 1, EncodedFormat::Rgba4444);
    frame.companded_alpha = true;
    let pixels = [[4096i16, 4096, 4096, 4096], [0, 0, 0, 8191]];
    let inverter = ReplayInverter::new(rgba_bands(&pixels, 2), 2 * 4, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(1));
    let mut out = vec![0u8; 2 * 8];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &ColorConfig::identity(),
            &FsLookLoader,
            PixelFormat::Rg64,
            &mut out,
            2 * 8,
            &Unstoppable,
        )
        .unwrap();
    let a0 = u16::from_le_bytes([out[6], out[7]]);
    // mid-scale companded alpha expands upward
    assert!(a0 > 4096 << 3, "alpha must decompand upward: {a0}");
    // full-scale alpha clips to full scale
    let a1 = u16::from_le_bytes([out[14], out[15]]);
    assert!(a1 >= 8190 << 3);
}

#[test]
fn w13a_keeps_signed_alpha_samples() {
    let frame = FrameInfo::new(1, 1, EncodedFormat::Rgba4444);
    let pixels = [[-100i16, 8192, 32767, 4096]];
    let inverter = ReplayInverter::new(rgba_bands(&pixels, 1), 4, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(1));
    let mut out = vec![0u8; 8];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &ColorConfig::identity(),
            &FsLookLoader,
            PixelFormat::W13a,
            &mut out,
            8,
            &Unstoppable,
        )
        .unwrap();
    let s = |i: usize| i16::from_le_bytes([out[i * 2], out[i * 2 + 1]]);
    assert_eq!(s(0), -100);
    assert_eq!(s(1), 8192);
    assert_eq!(s(2), 32767);
    assert_eq!(s(3), 4096);
}
