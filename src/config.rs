//! Decoder and color-correction configuration

use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use bitflags::bitflags;

use crate::curve::CurveSpec;
use crate::frame::{Colorspace, PixelFormat};

/// Configuration for the decoder itself (threading, CPU dispatch)
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Number of worker threads (0 = one per core)
    pub(crate) threads: usize,
    /// CPU feature flags mask (bitwise AND with detected features).
    /// Use to disable SIMD paths for testing. Default: all enabled.
    pub(crate) cpu_flags_mask: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            cpu_flags_mask: u32::MAX,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads (0 = one per core)
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set CPU feature flags mask.
    ///
    /// Setting to `0` forces scalar-only conversion paths.
    pub fn cpu_flags_mask(mut self, mask: u32) -> Self {
        self.cpu_flags_mask = mask;
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

bitflags! {
    /// Which optional pipeline sub-steps are honored for this decode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcessPath: u32 {
        const WHITE_BALANCE     = 1 << 0;
        const COLOR_MATRIX      = 1 << 1;
        const GAMMA_TWEAKS      = 1 << 2;
        const LOOK_FILE         = 1 << 3;
        const CDL_SATURATION    = 1 << 4;
        const HIGHLIGHT_ROLLOFF = 1 << 5;
    }
}

impl Default for ProcessPath {
    fn default() -> Self {
        ProcessPath::all()
    }
}

/// Where the linear-space matrix is seeded from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatrixSource {
    /// No base matrix
    Identity,
    /// The camera matrix recorded at capture time
    Camera([[f32; 4]; 3]),
    /// A user-supplied override matrix
    Custom([[f32; 4]; 3]),
}

impl MatrixSource {
    /// Base 3x4 coefficients
    pub fn coefficients(&self) -> [[f32; 4]; 3] {
        match *self {
            MatrixSource::Identity => [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            MatrixSource::Camera(m) | MatrixSource::Custom(m) => m,
        }
    }
}

/// User-adjustable color processing settings for one decode session
///
/// This is the "active metadata" the planner folds into a per-frame plan.
/// All fields default to the values that make the pipeline a no-op.
#[derive(Debug, Clone)]
pub struct ColorConfig {
    /// Per-channel white balance gains, clamped to [0.4, 10.0] at plan time
    pub white_balance: [f32; 3],
    /// Exposure multiplier in linear light
    pub exposure: f32,
    /// User saturation (1.0 = unchanged)
    pub saturation: f32,
    /// CDL-style saturation applied in encoded space
    pub cdl_saturation: f32,
    /// Contrast pivot slope (1.0 = unchanged)
    pub contrast: f32,
    /// Per-channel gamma tweaks (1.0 = unchanged)
    pub gamma_tweaks: [f32; 3],
    /// Per-channel gain applied to the primaries
    pub rgb_gain: [f32; 3],
    /// Per-channel lift (black offset) applied to the primaries
    pub rgb_lift: [f32; 3],
    /// Base color matrix
    pub matrix: MatrixSource,
    /// Apply gain/lift in decode-curve space rather than linear space
    pub primaries_use_decode_curve: bool,
    /// Encode curve override (None = take the stream default)
    pub encode_curve: Option<CurveSpec>,
    /// Decode curve override (None = same as encode curve)
    pub decode_curve: Option<CurveSpec>,
    /// Highlight roll-off point h in (0, 1]; None disables roll-off
    pub highlight_rolloff: Option<f32>,
    /// Desaturate highlights above the roll-off point
    pub highlight_desaturate: bool,
    /// 3D look file to load into the cube
    pub look_file: Option<PathBuf>,
    /// Split-screen preview position in [0, 1]; 0 disables the preview
    pub split_cc_position: f32,
    /// Vertical sharpen strength for the finishing pass (0 = off)
    pub sharpen: f32,
    /// Which optional sub-steps run at all
    pub process_path: ProcessPath,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            white_balance: [1.0; 3],
            exposure: 1.0,
            saturation: 1.0,
            cdl_saturation: 1.0,
            contrast: 1.0,
            gamma_tweaks: [1.0; 3],
            rgb_gain: [1.0; 3],
            rgb_lift: [0.0; 3],
            matrix: MatrixSource::Identity,
            primaries_use_decode_curve: false,
            encode_curve: None,
            decode_curve: None,
            highlight_rolloff: None,
            highlight_desaturate: false,
            look_file: None,
            split_cc_position: 0.0,
            sharpen: 0.0,
            process_path: ProcessPath::default(),
        }
    }
}

impl ColorConfig {
    /// Settings that leave every pixel untouched
    pub fn identity() -> Self {
        Self::default()
    }

    /// True when white balance departs from unit gains
    pub fn has_white_balance(&self) -> bool {
        self.process_path.contains(ProcessPath::WHITE_BALANCE)
            && self.white_balance.iter().any(|&g| g != 1.0)
    }

    /// True when gain/lift/saturation/exposure/matrix change any coefficient
    pub fn has_matrix_work(&self) -> bool {
        !matches!(self.matrix, MatrixSource::Identity)
            || self.exposure != 1.0
            || self.saturation != 1.0
            || self.rgb_gain.iter().any(|&g| g != 1.0)
            || self.rgb_lift.iter().any(|&l| l != 0.0)
    }

    /// True when gamma tweaks or contrast are non-unit
    pub fn has_tonal_work(&self) -> bool {
        self.process_path.contains(ProcessPath::GAMMA_TWEAKS)
            && (self.contrast != 1.0 || self.gamma_tweaks.iter().any(|&g| g != 1.0))
    }

    /// Cache key for the plan built from these settings
    pub fn plan_key(&self, format: PixelFormat, colorspace: Colorspace) -> PlanKey {
        let mut hasher = std::hash::DefaultHasher::new();
        for g in self.white_balance {
            g.to_bits().hash(&mut hasher);
        }
        self.exposure.to_bits().hash(&mut hasher);
        self.saturation.to_bits().hash(&mut hasher);
        self.cdl_saturation.to_bits().hash(&mut hasher);
        self.contrast.to_bits().hash(&mut hasher);
        for g in self.gamma_tweaks.iter().chain(&self.rgb_gain).chain(&self.rgb_lift) {
            g.to_bits().hash(&mut hasher);
        }
        for row in self.matrix.coefficients() {
            for c in row {
                c.to_bits().hash(&mut hasher);
            }
        }
        matches!(self.matrix, MatrixSource::Identity).hash(&mut hasher);
        self.primaries_use_decode_curve.hash(&mut hasher);
        self.encode_curve.hash(&mut hasher);
        self.decode_curve.hash(&mut hasher);
        self.highlight_rolloff.map(f32::to_bits).hash(&mut hasher);
        self.highlight_desaturate.hash(&mut hasher);
        self.look_file.hash(&mut hasher);
        self.split_cc_position.to_bits().hash(&mut hasher);
        self.process_path.bits().hash(&mut hasher);
        PlanKey {
            settings_digest: hasher.finish(),
            format,
            colorspace,
        }
    }
}

/// Identity of a built plan: settings digest plus output format/colorspace.
/// The planner skips the rebuild when the key is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanKey {
    settings_digest: u64,
    format: PixelFormat,
    colorspace: Colorspace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_config_reports_no_work() {
        let c = ColorConfig::identity();
        assert!(!c.has_white_balance());
        assert!(!c.has_matrix_work());
        assert!(!c.has_tonal_work());
    }

    #[test]
    fn plan_key_tracks_settings() {
        let a = ColorConfig::identity();
        let mut b = ColorConfig::identity();
        let key_a = a.plan_key(PixelFormat::Rg48, Colorspace::standard());
        assert_eq!(key_a, a.plan_key(PixelFormat::Rg48, Colorspace::standard()));
        b.exposure = 1.5;
        assert_ne!(key_a, b.plan_key(PixelFormat::Rg48, Colorspace::standard()));
        assert_ne!(key_a, a.plan_key(PixelFormat::Rgb24, Colorspace::standard()));
    }

    #[test]
    fn process_path_gates_white_balance() {
        let mut c = ColorConfig::identity();
        c.white_balance = [1.2, 1.0, 0.9];
        assert!(c.has_white_balance());
        c.process_path.remove(ProcessPath::WHITE_BALANCE);
        assert!(!c.has_white_balance());
    }
}
