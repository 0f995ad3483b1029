//! Vertical sharpening finishing pass
//!
//! Unsharp mask against a 5-tap binomial blur, applied per byte so one
//! kernel serves every interleaved 8-bit layout. Runs row-parallel: each
//! work item reads five source scanlines and owns one output scanline.

use imgref::ImgRef;

/// Sharpen strength as Q8 fixed point (256 = 1.0)
pub fn strength_q8(strength: f32) -> i32 {
    (strength.clamp(0.0, 4.0) * 256.0).round() as i32
}

/// Sharpen one scanline. `src` is the unsharpened frame (byte-addressed),
/// `out` the owned output row.
pub fn sharpen_row(src: ImgRef<'_, u8>, out: &mut [u8], y: usize, strength_q8: i32) {
    let h = src.height() as i32;
    let yi = y as i32;
    let row = |dy: i32| {
        let yc = (yi + dy).clamp(0, h - 1) as usize;
        &src.buf()[yc * src.stride()..yc * src.stride() + src.width()]
    };
    let m2 = row(-2);
    let m1 = row(-1);
    let c0 = row(0);
    let p1 = row(1);
    let p2 = row(2);

    for (x, o) in out.iter_mut().enumerate() {
        let blur = (m2[x] as i32
            + 4 * m1[x] as i32
            + 6 * c0[x] as i32
            + 4 * p1[x] as i32
            + p2[x] as i32
            + 8)
            >> 4;
        let center = c0[x] as i32;
        let v = center + ((center - blur) * strength_q8 >> 8);
        *o = v.clamp(0, 255) as u8;
    }
}
