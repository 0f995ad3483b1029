//! Look-file loading through the full decode path

mod common;

use std::io::Write;

use common::{rgb_bands, ReplayInverter};
use zenwave::pack;
use zenwave::{
    ColorConfig, DecoderConfig, EncodedFormat, FrameDecoder, FrameInfo, FsLookLoader, PixelFormat,
    Unstoppable,
};

/// Write a 33-lattice identity `.cube` file and return its path
fn identity_cube_file(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "TITLE \"identity\"").unwrap();
    writeln!(file, "LUT_3D_SIZE 33").unwrap();
    let n = 33;
    for bi in 0..n {
        for gi in 0..n {
            for ri in 0..n {
                let f = |i: usize| i as f32 / (n - 1) as f32;
                writeln!(file, "{:.6} {:.6} {:.6}", f(ri), f(gi), f(bi)).unwrap();
            }
        }
    }
    path
}

#[test]
fn identity_look_file_decodes_transparently() {
    let path = identity_cube_file("zenwave_identity_look.cube");
    let pixels = [[0i16, 0, 0], [4096, 4096, 4096], [8191, 8191, 8191], [2048, 1024, 512]];
    let frame = FrameInfo::new(4, 1, EncodedFormat::Rgb444);
    let mut config = ColorConfig::identity();
    config.look_file = Some(path.clone());
    let inverter = ReplayInverter::new(rgb_bands(&pixels, 4), 4 * 3, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(2));
    let mut out = vec![0u8; 4 * 6];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &config,
            &FsLookLoader,
            PixelFormat::Wp13,
            &mut out,
            4 * 6,
            &Unstoppable,
        )
        .unwrap();
    let _ = std::fs::remove_file(&path);

    // the cube path quantizes through the lattice: allow one lattice step
    // of error around each sample
    let got = pack::unpack_wp13(&out, 4);
    for (x, px) in pixels.iter().enumerate() {
        for ch in 0..3 {
            let diff = (got[x * 3 + ch] as i32 - px[ch] as i32).abs();
            assert!(diff <= 16, "pixel {x} ch {ch}: {} vs {}", got[x * 3 + ch], px[ch]);
        }
    }
}

#[test]
fn missing_look_file_falls_back_cleanly() {
    let pixels = [[4096i16, 4096, 4096]];
    let frame = FrameInfo::new(1, 1, EncodedFormat::Rgb444);
    let mut config = ColorConfig::identity();
    config.look_file = Some(std::path::PathBuf::from("/nonexistent/look.cube"));
    let inverter = ReplayInverter::new(rgb_bands(&pixels, 1), 3, 1);
    let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(1));
    let mut out = vec![0u8; 6];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &config,
            &FsLookLoader,
            PixelFormat::Wp13,
            &mut out,
            6,
            &Unstoppable,
        )
        .unwrap();
    assert_eq!(pack::unpack_wp13(&out, 1), vec![4096, 4096, 4096]);
}
