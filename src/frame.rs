//! Frame descriptors and pixel format tags
//!
//! A [`FrameInfo`] is created when a frame header is parsed and stays
//! immutable for the duration of that frame's decode. Everything downstream
//! (planner, applicator, packers) reads it; nothing mutates it.

use bitflags::bitflags;

/// Source encoding of the wavelet bands for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
    /// Three channels, luma + horizontally subsampled chroma
    Yuv422,
    /// Three full-resolution RGB channels
    Rgb444,
    /// Four full-resolution RGBA channels
    Rgba4444,
    /// Raw sensor data stored as color-difference channels
    Bayer,
}

impl EncodedFormat {
    /// Number of wavelet channels carried by this encoding
    pub fn channels(self) -> usize {
        match self {
            EncodedFormat::Yuv422 | EncodedFormat::Rgb444 => 3,
            EncodedFormat::Rgba4444 | EncodedFormat::Bayer => 4,
        }
    }

    /// True when the channel data is YUV rather than RGB
    pub fn is_yuv(self) -> bool {
        matches!(self, EncodedFormat::Yuv422)
    }
}

/// Decoded resolution relative to the encoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResolution {
    Full,
    HalfHorizontal,
    Half,
    Quarter,
    /// Quarter-size data returned without upscaling
    QuarterUnscaled,
    /// Full-size demosaic of a Bayer frame
    FullDebayer,
    /// Half-horizontal demosaic of a Bayer frame
    HalfHorizontalDebayer,
    /// Bayer channels passed through without demosaic
    HalfNoDebayer,
    /// Lowest wavelet band only
    LowpassOnly,
}

impl DecodeResolution {
    /// Bayer sources at these resolutions run the demosaic job levels
    pub fn wants_debayer(self) -> bool {
        matches!(
            self,
            DecodeResolution::FullDebayer | DecodeResolution::HalfHorizontalDebayer
        )
    }
}

bitflags! {
    /// Output colorspace selector: one of {601, 709} crossed with
    /// {computer-graphics range, video-safe range}.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Colorspace: u32 {
        /// ITU-R BT.601 matrix
        const BT601 = 1 << 0;
        /// ITU-R BT.709 matrix
        const BT709 = 1 << 1;
        /// RGB is video-safe range (16-235) rather than full range
        const VS_RGB = 1 << 2;
    }
}

impl Colorspace {
    /// 709 computer-graphics range, the common default
    pub fn standard() -> Self {
        Colorspace::BT709
    }

    /// True for BT.709 matrices, false for BT.601
    pub fn is_709(self) -> bool {
        self.contains(Colorspace::BT709)
    }

    /// True when RGB legs of the pipeline are video-safe range
    pub fn is_video_safe(self) -> bool {
        self.contains(Colorspace::VS_RGB)
    }
}

impl Default for Colorspace {
    fn default() -> Self {
        Colorspace::standard()
    }
}

/// White-point bit depth of the intermediate rows
///
/// 13-bit rows are signed with 8192 representing 1.0; 16-bit rows are
/// logically unsigned `[0, 65535]`. `Unset` means the stream predates the
/// white-point field and is treated as 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitePoint {
    #[default]
    Unset,
    W13,
    W16,
}

impl WhitePoint {
    /// True when samples are signed 13-bit
    pub fn is_wp13(self) -> bool {
        matches!(self, WhitePoint::W13)
    }
}

/// Output pixel format tag
///
/// Each tag is a distinct packer branch; see the `pack` module for the
/// byte-level contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Packed 8-bit BGR, bottom-up
    Rgb24,
    /// Packed 8-bit BGRx, bottom-up
    Rgb32,
    /// Packed 8-bit BGRA, bottom-up
    Bgra,
    /// Packed 16-bit RGB
    Rg48,
    /// Packed 16-bit RGBA, alpha forced to max when absent
    Rg64,
    /// Packed big-endian 16-bit ARGB
    B64a,
    /// Packed 13-bit signed RGB (intermediate wire format)
    Wp13,
    /// Packed 13-bit signed RGBA
    W13a,
    /// 10-10-10-2 little-endian, R in the low bits
    Rg30,
    /// 10-10-10-2 little-endian, `r<<20 | g<<10 | b`
    Ar10,
    /// 10-10-10-2 little-endian, `b<<20 | g<<10 | r`
    Ab10,
    /// 10-10-10-2 big-endian
    R210,
    /// 10-10-10-2 big-endian, DPX channel order
    Dpx0,
    /// 10-bit 4:2:2 YUV, six samples per 16 bytes
    V210,
    /// Packed 16-bit 4:2:2 YUV, Y then U then V per pair
    Yu64,
    /// Planar 16-bit 4:2:2 YUV
    Yr16,
    /// Packed 8-bit 4:2:2, Y0 U Y1 V
    Yuyv,
    /// Packed 8-bit 4:2:2, U Y0 V Y1
    Uyvy,
    /// Packed 8-bit 4:2:2, Y0 V Y1 U
    Yvyu,
    /// Packed 8-bit 4:4:4:4 AYUV variant, video-safe alpha
    R408,
    /// Packed 8-bit 4:4:4:4 UYVA
    V408,
    /// Packed 8-bit CbYCrY (alias ordering of UYVY)
    CbYCrY8,
    /// Packed 16-bit CbYCrY, full scale
    CbYCrY16,
    /// Two-plane CbYCrY: 8-bit whole plus 8-bit fraction rows
    CbYCrY2_8,
    /// Packed 16-bit CbYCrY, 2.14 fixed point
    CbYCrY2_14,
    /// Packed 16-bit CbYCrY, 10.6 fixed point
    CbYCrY10_6,
    /// Planar 8-bit 4:2:0, interleaved UV plane
    Nv12,
    /// Planar 8-bit 4:2:0, separate V then U planes
    Yv12,
}

impl PixelFormat {
    /// Bytes a packed scanline of `width` pixels occupies, excluding any
    /// secondary chroma planes (see [`PixelFormat::is_planar420`]).
    pub fn row_bytes(self, width: usize) -> usize {
        match self {
            PixelFormat::Rgb24 => width * 3,
            PixelFormat::Rgb32 | PixelFormat::Bgra => width * 4,
            PixelFormat::Rg48 | PixelFormat::Wp13 => width * 6,
            PixelFormat::Rg64 | PixelFormat::B64a | PixelFormat::W13a => width * 8,
            PixelFormat::Rg30
            | PixelFormat::Ar10
            | PixelFormat::Ab10
            | PixelFormat::R210
            | PixelFormat::Dpx0 => width * 4,
            // 6 pixels -> 4 words of 4 bytes, rounded up to a whole group
            PixelFormat::V210 => width.div_ceil(6) * 16,
            // 4:2:2 packers emit whole two-pixel units
            PixelFormat::Yu64 => width.div_ceil(2) * 8,
            // per-row planes: full-width luma, two half-width chroma runs
            PixelFormat::Yr16 => (width + width.div_ceil(2) * 2) * 2,
            PixelFormat::Yuyv | PixelFormat::Uyvy | PixelFormat::Yvyu | PixelFormat::CbYCrY8 => {
                width.div_ceil(2) * 4
            }
            PixelFormat::R408 | PixelFormat::V408 => width * 4,
            PixelFormat::CbYCrY16 | PixelFormat::CbYCrY2_14 | PixelFormat::CbYCrY10_6 => {
                width.div_ceil(2) * 8
            }
            // whole bytes then fraction bytes, both 4:2:2
            PixelFormat::CbYCrY2_8 => width.div_ceil(2) * 8,
            // luma plane only; chroma planes live past height*pitch
            PixelFormat::Nv12 | PixelFormat::Yv12 => width,
        }
    }

    /// True for formats whose output colorspace family is YUV
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            PixelFormat::V210
                | PixelFormat::Yu64
                | PixelFormat::Yr16
                | PixelFormat::Yuyv
                | PixelFormat::Uyvy
                | PixelFormat::Yvyu
                | PixelFormat::R408
                | PixelFormat::V408
                | PixelFormat::CbYCrY8
                | PixelFormat::CbYCrY16
                | PixelFormat::CbYCrY2_8
                | PixelFormat::CbYCrY2_14
                | PixelFormat::CbYCrY10_6
                | PixelFormat::Nv12
                | PixelFormat::Yv12
        )
    }

    /// True for 4:2:0 planar formats that pack scanlines in pairs
    pub fn is_planar420(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Yv12)
    }

    /// True for the 8-bit RGB formats that are written bottom-up
    pub fn is_inverted(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgb24 | PixelFormat::Rgb32 | PixelFormat::Bgra
        )
    }

    /// Significant bits per channel after packing
    pub fn bit_depth(self) -> u32 {
        match self {
            PixelFormat::Rgb24
            | PixelFormat::Rgb32
            | PixelFormat::Bgra
            | PixelFormat::Yuyv
            | PixelFormat::Uyvy
            | PixelFormat::Yvyu
            | PixelFormat::R408
            | PixelFormat::V408
            | PixelFormat::CbYCrY8
            | PixelFormat::Nv12
            | PixelFormat::Yv12 => 8,
            PixelFormat::Rg30
            | PixelFormat::Ar10
            | PixelFormat::Ab10
            | PixelFormat::R210
            | PixelFormat::Dpx0
            | PixelFormat::V210
            | PixelFormat::CbYCrY2_8
            | PixelFormat::CbYCrY10_6 => 10,
            PixelFormat::Wp13 | PixelFormat::W13a => 13,
            PixelFormat::CbYCrY2_14 => 14,
            PixelFormat::Rg48
            | PixelFormat::Rg64
            | PixelFormat::B64a
            | PixelFormat::Yu64
            | PixelFormat::Yr16
            | PixelFormat::CbYCrY16 => 16,
        }
    }

    /// Planner cube depth: 65-lattice for 16-bit outputs, 33 otherwise
    pub fn cube_depth(self) -> u32 {
        if self.bit_depth() >= 16 { 6 } else { 5 }
    }
}

/// Per-frame descriptor, parsed from the frame header
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Source encoding of the wavelet channels
    pub encoded_format: EncodedFormat,
    /// Requested decode resolution
    pub resolution: DecodeResolution,
    /// Output colorspace selection
    pub colorspace: Colorspace,
    /// White-point bit depth of intermediate rows
    pub white_point: WhitePoint,
    /// Samples are signed (WP13 streams)
    pub signed_pixels: bool,
    /// Alpha channel was companded at encode time
    pub companded_alpha: bool,
    /// Left shift applied while assembling rows, expanding 10/12-bit
    /// wavelet output to the nominal range
    pub band_shift: u32,
}

impl FrameInfo {
    /// Descriptor for a full-resolution frame with default colorimetry
    pub fn new(width: usize, height: usize, encoded_format: EncodedFormat) -> Self {
        Self {
            width,
            height,
            encoded_format,
            resolution: DecodeResolution::Full,
            colorspace: Colorspace::standard(),
            white_point: WhitePoint::W13,
            signed_pixels: true,
            companded_alpha: false,
            band_shift: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v210_rows_round_to_groups() {
        assert_eq!(PixelFormat::V210.row_bytes(6), 16);
        assert_eq!(PixelFormat::V210.row_bytes(7), 32);
        assert_eq!(PixelFormat::V210.row_bytes(1920), 1920 / 6 * 16);
    }

    #[test]
    fn cube_depth_tracks_output_depth() {
        assert_eq!(PixelFormat::Rg48.cube_depth(), 6);
        assert_eq!(PixelFormat::Rgb24.cube_depth(), 5);
        assert_eq!(PixelFormat::V210.cube_depth(), 5);
    }
}
