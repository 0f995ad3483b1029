//! Decode a synthetic gradient frame and print a few output pixels.
//!
//! There is no bitstream here; a stub wavelet inverter produces a
//! horizontal luma ramp, which then runs through the full color pipeline
//! (plan build, row conversion, packing) exactly as a real decode would.
//!
//! Run with: cargo run --example decode_gradient

use std::sync::Arc;

use zenwave::{
    ColorConfig, DecoderConfig, EncodedFormat, FrameDecoder, FrameInfo, FsLookLoader, PixelFormat,
    Result, Unstoppable, WaveletInverter,
};

const WIDTH: usize = 256;
const HEIGHT: usize = 64;

/// Stub inverter: horizontal WP13 ramp on Y, neutral chroma
struct GradientInverter;

impl WaveletInverter for GradientInverter {
    fn strip_height(&self) -> usize {
        8
    }

    fn invert_strip(&self, _thread: usize, strip: usize, out_rows: &mut [i16]) -> Result<()> {
        let stride = WIDTH * 3;
        let rows = out_rows.len() / stride;
        for row in 0..rows {
            let _y = strip * 8 + row;
            let line = &mut out_rows[row * stride..(row + 1) * stride];
            for x in 0..WIDTH {
                line[x] = (x * 8191 / (WIDTH - 1)) as i16;
            }
            let half = WIDTH.div_ceil(2);
            for c in 0..half {
                line[WIDTH + c] = 4096;
                line[2 * WIDTH + c] = 4096;
            }
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let inverter: Arc<dyn WaveletInverter> = Arc::new(GradientInverter);
    let frame = FrameInfo::new(WIDTH, HEIGHT, EncodedFormat::Yuv422);

    let mut config = ColorConfig::identity();
    config.exposure = 1.2;

    let mut decoder = FrameDecoder::new(&DecoderConfig::new());
    let pitch = WIDTH * 3;
    let mut out = vec![0u8; HEIGHT * pitch];
    decoder
        .decode_frame(
            &inverter,
            &frame,
            &config,
            &FsLookLoader,
            PixelFormat::Rgb24,
            &mut out,
            pitch,
            &Unstoppable,
        )
        .expect("decode failed");

    println!("decoded {WIDTH}x{HEIGHT} gradient with {} workers", decoder.threads());
    for x in [0, WIDTH / 4, WIDTH / 2, WIDTH - 1] {
        let px = &out[x * 3..x * 3 + 3];
        println!("x={x:3}  B={:3} G={:3} R={:3}", px[0], px[1], px[2]);
    }
}
