//! Color matrices and colorspace conversion constants
//!
//! The planner composes white balance, saturation, exposure, gain/lift and
//! the camera matrix into two 3x4 affine matrices (linear-space and
//! curved-space). The per-pixel loops consume the fixed-point rendition;
//! the float rendition stays on the plan for the escape path taken when a
//! coefficient leaves the fixed-point range.
//!
//! The RGB<->YUV matrices are genuine constants. The encoded coefficients are
//! part of the external format contract and are given to three decimals.

/// A 3x4 affine color matrix: three rows of `[r, g, b, offset]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [[f32; 4]; 3]);

/// Fixed-point denominator for matrix coefficients (Q13, 8192 = 1.0)
pub const MATRIX_ONE: i32 = 8192;

/// Coefficients outside this range cannot ride the int16 multiply chain
pub const FIXED_COEF_MIN: f32 = -16.0;
pub const FIXED_COEF_MAX: f32 = 31.0;

/// Row weights of the desaturation target matrix
pub const DESAT_ROW: [f32; 3] = [0.309, 0.609, 0.082];

/// Full-saturation target matrix
pub const FULLSAT: [[f32; 3]; 3] = [
    [4.042, -2.681, -0.361],
    [-1.358, 2.719, -0.361],
    [-1.358, -2.681, 5.039],
];

/// Rec.709 luma weights used by CDL saturation
pub const LUMA_709: [f32; 3] = [0.2126, 0.7152, 0.0722];

impl ColorMatrix {
    pub fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ])
    }

    pub fn from_rows(rows: [[f32; 4]; 3]) -> Self {
        Self(rows)
    }

    /// True when every coefficient matches the identity to within `eps`
    pub fn is_identity(&self, eps: f32) -> bool {
        let id = Self::identity();
        for r in 0..3 {
            for c in 0..4 {
                if (self.0[r][c] - id.0[r][c]).abs() > eps {
                    return false;
                }
            }
        }
        true
    }

    /// Affine composition: `self` applied after `other`
    pub fn compose(&self, other: &ColorMatrix) -> ColorMatrix {
        let a = &self.0;
        let b = &other.0;
        let mut out = [[0.0f32; 4]; 3];
        for r in 0..3 {
            for c in 0..3 {
                out[r][c] = a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];
            }
            out[r][3] = a[r][0] * b[0][3] + a[r][1] * b[1][3] + a[r][2] * b[2][3] + a[r][3];
        }
        ColorMatrix(out)
    }

    /// Apply to an RGB triple
    #[inline]
    pub fn transform(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2] + m[0][3],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2] + m[1][3],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2] + m[2][3],
        ]
    }

    /// Apply only the diagonal, ignoring cross terms; used by the
    /// highlight-protection blend in the cube fill.
    #[inline]
    pub fn transform_diagonal(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * rgb[0] + m[0][3],
            m[1][1] * rgb[1] + m[1][3],
            m[2][2] * rgb[2] + m[2][3],
        ]
    }

    /// Saturation adjustment folded into the matrix.
    ///
    /// Below 1.0 the matrix mixes linearly toward the desaturation target;
    /// above 1.0 it takes `(sat-1)/3` of the full-saturation target against
    /// `(4-sat)/3` of the base.
    pub fn saturate(&self, sat: f32) -> ColorMatrix {
        if sat == 1.0 {
            return *self;
        }
        let sat_matrix = if sat < 1.0 {
            let s = sat.max(0.0);
            let mut m = [[0.0f32; 3]; 3];
            for r in 0..3 {
                for c in 0..3 {
                    let id = if r == c { 1.0 } else { 0.0 };
                    m[r][c] = id * s + DESAT_ROW[c] * (1.0 - s);
                }
            }
            m
        } else {
            let s = sat.min(4.0);
            let wf = (s - 1.0) / 3.0;
            let wb = (4.0 - s) / 3.0;
            let mut m = [[0.0f32; 3]; 3];
            for r in 0..3 {
                for c in 0..3 {
                    let id = if r == c { 1.0 } else { 0.0 };
                    m[r][c] = id * wb + FULLSAT[r][c] * wf;
                }
            }
            m
        };
        ColorMatrix([
            [sat_matrix[0][0], sat_matrix[0][1], sat_matrix[0][2], 0.0],
            [sat_matrix[1][0], sat_matrix[1][1], sat_matrix[1][2], 0.0],
            [sat_matrix[2][0], sat_matrix[2][1], sat_matrix[2][2], 0.0],
        ])
        .compose(self)
    }

    /// Scale input channels by the white-balance gains (column-wise), and
    /// track the gains on the offset column so custom-matrix black levels
    /// follow white balance.
    pub fn white_balance(&self, gains: [f32; 3]) -> ColorMatrix {
        let mut out = self.0;
        for r in 0..3 {
            for c in 0..3 {
                out[r][c] *= gains[c];
            }
            out[r][3] *= gains[r];
        }
        ColorMatrix(out)
    }

    /// Exposure scales the whole matrix, black level included
    pub fn exposed(&self, exposure: f32) -> ColorMatrix {
        let mut out = self.0;
        for row in out.iter_mut() {
            for v in row.iter_mut() {
                *v *= exposure;
            }
        }
        ColorMatrix(out)
    }

    /// Per-output-channel gain and lift
    pub fn gain_lift(&self, gain: [f32; 3], lift: [f32; 3]) -> ColorMatrix {
        let mut out = self.0;
        for r in 0..3 {
            for c in 0..4 {
                out[r][c] *= gain[r];
            }
            out[r][3] += lift[r];
        }
        ColorMatrix(out)
    }

    /// True when any coefficient falls outside the int16-safe range;
    /// the plan then escalates to the float inner loop.
    pub fn needs_float(&self) -> bool {
        self.0
            .iter()
            .flatten()
            .any(|&v| !(FIXED_COEF_MIN..=FIXED_COEF_MAX).contains(&v))
    }

    /// True when any off-diagonal row sum drops below -1.0, meaning
    /// saturated highlights need the non-linear cube remap.
    pub fn forces_cube(&self) -> bool {
        let m = &self.0;
        let sums = [
            m[0][1] + m[0][2], // G+B on the R row
            m[1][0] + m[1][2], // R+B on the G row
            m[2][0] + m[2][1], // R+G on the B row
        ];
        sums.iter().any(|&s| s < -1.0)
    }

    /// Q13 fixed-point rendition for the int16 per-pixel loops
    pub fn to_fixed(&self) -> FixedMatrix {
        let mut out = [[0i32; 4]; 3];
        for r in 0..3 {
            for c in 0..4 {
                out[r][c] = (self.0[r][c] * MATRIX_ONE as f32).round() as i32;
            }
        }
        FixedMatrix(out)
    }
}

/// Q13 fixed-point 3x4 matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMatrix(pub [[i32; 4]; 3]);

impl FixedMatrix {
    pub fn identity() -> Self {
        Self([
            [MATRIX_ONE, 0, 0, 0],
            [0, MATRIX_ONE, 0, 0],
            [0, 0, MATRIX_ONE, 0],
        ])
    }

    /// Apply to a WP13 triple with Q13 rounding
    #[inline]
    pub fn transform_wp13(&self, rgb: [i32; 3]) -> [i32; 3] {
        let m = &self.0;
        let half = MATRIX_ONE / 2;
        [
            ((m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2] + half) >> 13) + m[0][3],
            ((m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2] + half) >> 13) + m[1][3],
            ((m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2] + half) >> 13) + m[2][3],
        ]
    }
}

/// One RGB->YUV conversion: three rows of `[r, g, b, offset]`, normalized
/// domain, offsets in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct RgbToYuv(pub [[f32; 4]; 3]);

/// BT.601, computer-graphics-range RGB in, video-safe YUV out
pub const RGB2YUV_601: RgbToYuv = RgbToYuv([
    [0.257, 0.504, 0.098, 0.063],
    [-0.148, -0.291, 0.439, 0.502],
    [0.439, -0.368, -0.071, 0.502],
]);

/// BT.709, computer-graphics-range RGB in, video-safe YUV out
pub const RGB2YUV_709: RgbToYuv = RgbToYuv([
    [0.183, 0.614, 0.062, 0.063],
    [-0.101, -0.338, 0.439, 0.502],
    [0.439, -0.399, -0.040, 0.502],
]);

/// BT.601, video-safe RGB in
pub const RGB2YUV_VS601: RgbToYuv = RgbToYuv([
    [0.299, 0.587, 0.114, 0.0],
    [-0.172, -0.339, 0.511, 0.5],
    [0.511, -0.428, -0.083, 0.5],
]);

/// BT.709, video-safe RGB in
pub const RGB2YUV_VS709: RgbToYuv = RgbToYuv([
    [0.213, 0.715, 0.072, 0.0],
    [-0.117, -0.394, 0.511, 0.5],
    [0.511, -0.464, -0.047, 0.5],
]);

impl RgbToYuv {
    /// Select the matrix for a colorspace selection
    pub fn for_colorspace(cs: crate::frame::Colorspace) -> &'static RgbToYuv {
        match (cs.is_709(), cs.is_video_safe()) {
            (false, false) => &RGB2YUV_601,
            (true, false) => &RGB2YUV_709,
            (false, true) => &RGB2YUV_VS601,
            (true, true) => &RGB2YUV_VS709,
        }
    }

    /// Q15 int16 rendition (`coef * 32768`), built once at plan time
    pub fn to_fixed(&self) -> FixedRgbToYuv {
        let mut coefs = [[0i16; 3]; 3];
        let mut offsets = [0i32; 3];
        for r in 0..3 {
            for c in 0..3 {
                coefs[r][c] = (self.0[r][c] * 32768.0).round() as i16;
            }
            // offsets land directly in the WP13 domain
            offsets[r] = (self.0[r][3] * MATRIX_ONE as f32).round() as i32;
        }
        FixedRgbToYuv { coefs, offsets }
    }
}

/// Fixed-point RGB->YUV, Q15 coefficients with WP13 offsets
#[derive(Debug, Clone, Copy)]
pub struct FixedRgbToYuv {
    pub coefs: [[i16; 3]; 3],
    pub offsets: [i32; 3],
}

impl FixedRgbToYuv {
    /// Convert one WP13 RGB triple to WP13 YUV
    #[inline]
    pub fn convert(&self, rgb: [i32; 3]) -> [i32; 3] {
        let mut out = [0i32; 3];
        for r in 0..3 {
            let acc = self.coefs[r][0] as i32 * rgb[0]
                + self.coefs[r][1] as i32 * rgb[1]
                + self.coefs[r][2] as i32 * rgb[2];
            out[r] = ((acc + (1 << 14)) >> 15) + self.offsets[r];
        }
        out
    }
}

/// YUV->RGB coefficients: `[y_scale, rv, gu, gv, bu]` plus bias handling.
/// Chroma is centered before use; luma offset applies only to video-safe.
#[derive(Debug, Clone, Copy)]
pub struct YuvToRgb {
    pub y_scale: f32,
    pub rv: f32,
    pub gu: f32,
    pub gv: f32,
    pub bu: f32,
    /// Luma black level in the normalized domain (16/255 for video-safe)
    pub y_offset: f32,
}

pub const YUV2RGB_601: YuvToRgb = YuvToRgb {
    y_scale: 1.0,
    rv: 1.402,
    gu: 0.344,
    gv: 0.714,
    bu: 1.772,
    y_offset: 0.0,
};

pub const YUV2RGB_709: YuvToRgb = YuvToRgb {
    y_scale: 1.0,
    rv: 1.575,
    gu: 0.187,
    gv: 0.468,
    bu: 1.856,
    y_offset: 0.0,
};

pub const YUV2RGB_VS601: YuvToRgb = YuvToRgb {
    y_scale: 1.164,
    rv: 1.596,
    gu: 0.391,
    gv: 0.813,
    bu: 2.018,
    y_offset: 0.063,
};

pub const YUV2RGB_VS709: YuvToRgb = YuvToRgb {
    y_scale: 1.164,
    rv: 1.793,
    gu: 0.213,
    gv: 0.533,
    bu: 2.112,
    y_offset: 0.063,
};

impl YuvToRgb {
    pub fn for_colorspace(cs: crate::frame::Colorspace) -> &'static YuvToRgb {
        match (cs.is_709(), cs.is_video_safe()) {
            (false, false) => &YUV2RGB_601,
            (true, false) => &YUV2RGB_709,
            (false, true) => &YUV2RGB_VS601,
            (true, true) => &YUV2RGB_VS709,
        }
    }

    /// Q13 fixed rendition for the row loops
    pub fn to_fixed(&self) -> FixedYuvToRgb {
        let q = |v: f32| (v * MATRIX_ONE as f32).round() as i32;
        FixedYuvToRgb {
            y_scale: q(self.y_scale),
            rv: q(self.rv),
            gu: q(self.gu),
            gv: q(self.gv),
            bu: q(self.bu),
            y_offset: q(self.y_offset),
        }
    }
}

/// Q13 fixed-point YUV->RGB
#[derive(Debug, Clone, Copy)]
pub struct FixedYuvToRgb {
    pub y_scale: i32,
    pub rv: i32,
    pub gu: i32,
    pub gv: i32,
    pub bu: i32,
    pub y_offset: i32,
}

impl FixedYuvToRgb {
    /// Convert one WP13 YUV triple (chroma centered on 0.5) to WP13 RGB
    #[inline]
    pub fn convert(&self, yuv: [i32; 3]) -> [i32; 3] {
        let half = MATRIX_ONE / 2;
        let y = ((yuv[0] - self.y_offset) * self.y_scale + half) >> 13;
        let u = yuv[1] - (MATRIX_ONE / 2);
        let v = yuv[2] - (MATRIX_ONE / 2);
        [
            y + ((self.rv * v + half) >> 13),
            y - ((self.gu * u + self.gv * v + half) >> 13),
            y + ((self.bu * u + half) >> 13),
        ]
    }
}
