//! Transfer curves: encode/decode gamma and log families
//!
//! Every stream carries an encode-curve descriptor chosen at capture time and
//! an optional decode-curve override. Descriptors pack the curve parameter
//! either as an 8.8 fraction or, when the extended bit is set, as a direct
//! 16-bit value. Evaluation is sign-mirrored so the WP13 negative footroom
//! stays monotone through every curve family.

use log::warn;

use crate::frame::EncodedFormat;

/// Curve families recognized in stream metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveKind {
    Linear,
    Log,
    Gamma,
    Cineon,
    Cine985,
    Parametric,
    CStyle,
    SLog,
    LogC,
}

/// A curve descriptor as carried in stream/user metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurveSpec {
    pub kind: CurveKind,
    /// Curve parameter: 8.8 fraction, or a direct value when `extended`
    pub value: u16,
    /// Direct 16-bit parameter encoding
    pub extended: bool,
}

// Metadata tags for the curve families. Unknown tags fall back to the
// format default per the error policy.
const TAG_LINEAR: u16 = 1;
const TAG_LOG: u16 = 2;
const TAG_GAMMA: u16 = 3;
const TAG_CINEON: u16 = 4;
const TAG_CINE985: u16 = 5;
const TAG_PARAMETRIC: u16 = 6;
const TAG_CSTYLE: u16 = 7;
const TAG_SLOG: u16 = 8;
const TAG_LOGC: u16 = 9;
const TAG_EXTENDED_BIT: u16 = 0x8000;

impl CurveSpec {
    /// Descriptor with an 8.8 packed parameter
    pub fn packed(kind: CurveKind, value: u16) -> Self {
        Self {
            kind,
            value,
            extended: false,
        }
    }

    /// Descriptor with a direct 16-bit parameter
    pub fn extended(kind: CurveKind, value: u16) -> Self {
        Self {
            kind,
            value,
            extended: true,
        }
    }

    /// Default encode curve when the stream does not configure one:
    /// Log base 90 for subsampled sources, Gamma 2.2 for 4:4:4 content.
    pub fn default_for(format: EncodedFormat) -> Self {
        match format {
            EncodedFormat::Yuv422 | EncodedFormat::Bayer => Self::extended(CurveKind::Log, 90),
            EncodedFormat::Rgb444 | EncodedFormat::Rgba4444 => {
                Self::packed(CurveKind::Gamma, (2 << 8) | 51) // 2.2 as 8.8
            }
        }
    }

    /// Parse a metadata tag/value pair. Unknown tags substitute the
    /// format-default curve and continue.
    pub fn from_metadata(tag: u16, value: u16, format: EncodedFormat) -> Self {
        let extended = tag & TAG_EXTENDED_BIT != 0;
        let kind = match tag & !TAG_EXTENDED_BIT {
            TAG_LINEAR => CurveKind::Linear,
            TAG_LOG => CurveKind::Log,
            TAG_GAMMA => CurveKind::Gamma,
            TAG_CINEON => CurveKind::Cineon,
            TAG_CINE985 => CurveKind::Cine985,
            TAG_PARAMETRIC => CurveKind::Parametric,
            TAG_CSTYLE => CurveKind::CStyle,
            TAG_SLOG => CurveKind::SLog,
            TAG_LOGC => CurveKind::LogC,
            other => {
                warn!("unknown curve tag {other:#x}, substituting default");
                return Self::default_for(format);
            }
        };
        Self {
            kind,
            value,
            extended,
        }
    }

    /// Curve parameter as a float
    pub fn parameter(&self) -> f32 {
        if self.extended {
            f32::from(self.value)
        } else {
            f32::from(self.value >> 8) + f32::from(self.value & 0xFF) / 256.0
        }
    }

    /// Resolve the descriptor into an evaluatable curve
    pub fn resolve(&self) -> Curve {
        let p = self.parameter();
        match self.kind {
            CurveKind::Linear => Curve::Linear,
            CurveKind::Log => Curve::Log {
                base: if p > 1.0 { p } else { 90.0 },
            },
            CurveKind::Gamma => Curve::Gamma {
                power: if p > 0.0 { p } else { 2.2 },
            },
            CurveKind::Cineon => Curve::Cineon { white_code: 685.0 },
            CurveKind::Cine985 => Curve::Cineon { white_code: 985.0 },
            CurveKind::Parametric => {
                // 8.8 splits into gamma (high byte) and linear-mix (low byte)
                let gamma = f32::from(self.value >> 8).max(1.0);
                let mix = f32::from(self.value & 0xFF) / 256.0;
                Curve::Parametric { gamma, mix }
            }
            CurveKind::CStyle => Curve::CStyle {
                c: if p > 0.0 { p } else { 9.0 },
            },
            CurveKind::SLog => Curve::SLog,
            CurveKind::LogC => Curve::LogC,
        }
    }
}

/// An evaluatable transfer curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Linear,
    /// `encoded = ln(1 + (base-1) x) / ln(base)`
    Log { base: f32 },
    /// `encoded = x^(1/power)`
    Gamma { power: f32 },
    /// Film density log, 95 black code, 0.6 density gamma
    Cineon { white_code: f32 },
    /// Mix of a pure gamma and a linear segment
    Parametric { gamma: f32, mix: f32 },
    /// Rational roll-off `(1+c) x / (x + c)`
    CStyle { c: f32 },
    SLog,
    LogC,
}

const CINEON_BLACK_CODE: f32 = 95.0;
const CINEON_DENSITY: f32 = 0.6;

// Arri LogC (EI 800) segment constants
const LOGC_CUT: f32 = 0.010_591;
const LOGC_A: f32 = 5.555_556;
const LOGC_B: f32 = 0.052_272;
const LOGC_C: f32 = 0.247_190;
const LOGC_D: f32 = 0.385_537;
const LOGC_E: f32 = 5.367_655;
const LOGC_F: f32 = 0.092_809;

// Sony S-Log constants
const SLOG_A: f32 = 0.432_699;
const SLOG_B: f32 = 0.037_584;
const SLOG_C: f32 = 0.616_596;
const SLOG_OFFSET: f32 = 0.03;

impl Curve {
    /// True when both directions are the identity
    pub fn is_linear(&self) -> bool {
        matches!(self, Curve::Linear)
    }

    /// Linear light to encoded value, sign-mirrored for negative footroom
    pub fn encode(&self, linear: f32) -> f32 {
        if linear < 0.0 {
            -self.encode_pos(-linear)
        } else {
            self.encode_pos(linear)
        }
    }

    /// Encoded value to linear light, sign-mirrored for negative footroom
    pub fn decode(&self, encoded: f32) -> f32 {
        if encoded < 0.0 {
            -self.decode_pos(-encoded)
        } else {
            self.decode_pos(encoded)
        }
    }

    fn encode_pos(&self, x: f32) -> f32 {
        match *self {
            Curve::Linear => x,
            Curve::Log { base } => (1.0 + (base - 1.0) * x).ln() / base.ln(),
            Curve::Gamma { power } => x.powf(1.0 / power),
            Curve::Cineon { white_code } => {
                let black = 10f32.powf((CINEON_BLACK_CODE - white_code) * 0.002 / CINEON_DENSITY);
                let v = x * (1.0 - black) + black;
                (white_code + v.log10() * CINEON_DENSITY * 500.0) / 1023.0
            }
            Curve::Parametric { gamma, mix } => (1.0 - mix) * x.powf(1.0 / gamma) + mix * x,
            Curve::CStyle { c } => (1.0 + c) * x / (x + c),
            Curve::SLog => SLOG_A * (x + SLOG_B).log10() + SLOG_C + SLOG_OFFSET,
            Curve::LogC => {
                if x > LOGC_CUT {
                    LOGC_C * (LOGC_A * x + LOGC_B).log10() + LOGC_D
                } else {
                    LOGC_E * x + LOGC_F
                }
            }
        }
    }

    fn decode_pos(&self, e: f32) -> f32 {
        match *self {
            Curve::Linear => e,
            Curve::Log { base } => (base.powf(e) - 1.0) / (base - 1.0),
            Curve::Gamma { power } => e.powf(power),
            Curve::Cineon { white_code } => {
                let black = 10f32.powf((CINEON_BLACK_CODE - white_code) * 0.002 / CINEON_DENSITY);
                let v = 10f32.powf((e * 1023.0 - white_code) / (CINEON_DENSITY * 500.0));
                (v - black) / (1.0 - black)
            }
            Curve::Parametric { .. } => self.invert_monotone(e),
            Curve::CStyle { c } => c * e / ((1.0 + c) - e.min(1.0 + c - 1e-6)),
            Curve::SLog => 10f32.powf((e - SLOG_C - SLOG_OFFSET) / SLOG_A) - SLOG_B,
            Curve::LogC => {
                if e > LOGC_E * LOGC_CUT + LOGC_F {
                    (10f32.powf((e - LOGC_D) / LOGC_C) - LOGC_B) / LOGC_A
                } else {
                    (e - LOGC_F) / LOGC_E
                }
            }
        }
    }

    // Bisection inverse for families without a closed-form decode.
    // All curves are strictly monotone on [0, +inf).
    fn invert_monotone(&self, e: f32) -> f32 {
        let mut lo = 0.0f32;
        let mut hi = 64.0f32;
        if self.encode_pos(hi) < e {
            return e; // beyond representable range, fall back to identity
        }
        for _ in 0..40 {
            let mid = 0.5 * (lo + hi);
            if self.encode_pos(mid) < e {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

/// Ticks per unit in the WP13 fixed-point domain
pub const WP13_ONE: i32 = 8192;
/// Offset mapping WP13 values onto non-negative table indices
pub const LUT_INDEX_OFFSET: i32 = 16384;
/// `curve -> linear` table length: encoded domain [-2.0, +4.0)
pub const CURVE_TO_LINEAR_LEN: usize = 49_152;
/// `linear -> curve` table length: linear domain [-2.0, +6.0)
pub const LINEAR_TO_CURVE_LEN: usize = 65_536;

/// Clamp and round a float in WP13 units into an i16 table entry
#[inline]
pub fn to_wp13_entry(v: f32) -> i16 {
    (v * WP13_ONE as f32).round().clamp(-32768.0, 32767.0) as i16
}

/// Fill `out[range]` of the encoded->linear table.
///
/// Index `i` maps to the encoded value `(i - 16384) / 8192`; entries are the
/// linear result in WP13 units. The range split lets pool workers fill
/// disjoint chunks.
pub fn fill_curve_to_linear(curve: &Curve, out: &mut [i16], start: usize) {
    for (k, slot) in out.iter_mut().enumerate() {
        let i = (start + k) as i32;
        let encoded = (i - LUT_INDEX_OFFSET) as f32 / WP13_ONE as f32;
        *slot = to_wp13_entry(curve.decode(encoded));
    }
}

/// Fill `out[range]` of the linear->encoded table (same indexing, linear
/// domain extends to +6.0 for post-matrix overshoot).
pub fn fill_linear_to_curve(curve: &Curve, out: &mut [i16], start: usize) {
    for (k, slot) in out.iter_mut().enumerate() {
        let i = (start + k) as i32;
        let linear = (i - LUT_INDEX_OFFSET) as f32 / WP13_ONE as f32;
        *slot = to_wp13_entry(curve.encode(linear));
    }
}

/// Contrast pivots around mid-gray: `(x - 0.5) k + 0.5`
#[inline]
pub fn apply_contrast(x: f32, k: f32) -> f32 {
    (x - 0.5) * k + 0.5
}

/// Fill `out[range]` of one channel of the gamma/contrast table.
///
/// `gamma` is the user per-channel gamma tweak (1.0 = untouched), `contrast`
/// the pivot slope.
pub fn fill_gamma_contrast(gamma: f32, contrast: f32, out: &mut [i16], start: usize) {
    let curve = Curve::Gamma {
        power: gamma.max(0.01),
    };
    for (k, slot) in out.iter_mut().enumerate() {
        let i = (start + k) as i32;
        let x = (i - LUT_INDEX_OFFSET) as f32 / WP13_ONE as f32;
        let shaped = if gamma == 1.0 { x } else { curve.encode(x) };
        *slot = to_wp13_entry(apply_contrast(shaped, contrast));
    }
}
