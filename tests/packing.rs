//! End-to-end packing contracts for the word-layout formats

mod common;

use common::{rgb_bands, ReplayInverter};
use zenwave::pack;
use zenwave::{
    ColorConfig, DecoderConfig, EncodedFormat, FrameDecoder, FrameInfo, FsLookLoader, PixelFormat,
    Unstoppable,
};

fn decode_rgb(
    pixels: &[[i16; 3]],
    width: usize,
    format: PixelFormat,
    pitch: usize,
    out_len: usize,
) -> Vec<u8> {
    let height = pixels.len() / width;
    let frame = FrameInfo::new(width, height, EncodedFormat::Rgb444);
    let inverter = ReplayInverter::new(rgb_bands(pixels, width), width * 3, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(2));
    let mut out = vec![0u8; out_len];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &ColorConfig::identity(),
            &FsLookLoader,
            format,
            &mut out,
            pitch,
            &Unstoppable,
        )
        .unwrap();
    out
}

#[test]
fn ar10_packs_the_reference_word() {
    // (1023, 512, 0) in the 10-bit domain: r<<20 | g<<10 | b
    let out = decode_rgb(&[[1023 << 3, 512 << 3, 0]], 1, PixelFormat::Ar10, 4, 4);
    assert_eq!(u32::from_le_bytes(out.try_into().unwrap()), 0x3FF80000);
}

#[test]
fn ab10_mirrors_ar10_with_alpha_bits() {
    let out = decode_rgb(&[[1023 << 3, 512 << 3, 0]], 1, PixelFormat::Ab10, 4, 4);
    let word = u32::from_le_bytes(out.try_into().unwrap());
    assert_eq!(word, 0xC000_0000 | (512 << 10) | 1023);
}

#[test]
fn r210_is_the_big_endian_ar10_word() {
    let out = decode_rgb(&[[1023 << 3, 512 << 3, 0]], 1, PixelFormat::R210, 4, 4);
    assert_eq!(u32::from_be_bytes(out.try_into().unwrap()), 0x3FF80000);
}

#[test]
fn rg48_roundtrips_the_wp13_domain() {
    let pixels = [[0i16, 1, 8191], [4096, 1234, 7777]];
    let out = decode_rgb(&pixels, 2, PixelFormat::Rg48, 12, 12);
    let samples = pack::unpack_rg48(&out, 2);
    for (i, px) in pixels.iter().enumerate() {
        for ch in 0..3 {
            assert_eq!(samples[i * 3 + ch], (px[ch] as u16) << 3);
        }
    }
}

#[test]
fn rg64_pads_opaque_alpha() {
    let out = decode_rgb(&[[100, 200, 300]], 1, PixelFormat::Rg64, 8, 8);
    assert_eq!(u16::from_le_bytes([out[6], out[7]]), u16::MAX);
}

#[test]
fn short_output_buffer_is_rejected() {
    let frame = FrameInfo::new(4, 4, EncodedFormat::Rgb444);
    let inverter = ReplayInverter::new(vec![0i16; 4 * 4 * 3], 4 * 3, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(1));
    let mut out = vec![0u8; 8];
    let err = decoder
        .decode_frame(
            &inverter,
            &frame,
            &ColorConfig::identity(),
            &FsLookLoader,
            PixelFormat::Rgb24,
            &mut out,
            4 * 3,
            &Unstoppable,
        )
        .unwrap_err();
    assert!(err.to_string().contains("too small"));
}

#[test]
fn nv12_planes_cover_luma_and_chroma() {
    // 4x4 mid-gray through the 709 matrix into NV12
    let pixels = vec![[4096i16, 4096, 4096]; 16];
    let height = 4;
    let pitch = 4;
    let out = decode_rgb(
        &pixels,
        4,
        PixelFormat::Nv12,
        pitch,
        height * pitch + (height / 2) * pitch,
    );
    let luma = out[0];
    assert!(out[..16].iter().all(|&v| v == luma));
    // chroma plane: centered values
    assert!(out[16..24].iter().all(|&v| (v as i32 - 128).abs() <= 2));
}
