//! The color-pipeline planner
//!
//! Once per frame (and only when the settings changed) the planner folds the
//! user's color adjustments into a [`Plan`]: two affine matrices, up to three
//! 1D tone tables, and optionally a 3D cube. Workers read the plan, never
//! write it. The expensive table fills are expressed as chunk functions so
//! the worker pool can split them; `build_plan` fills serially and is the
//! reference path.

use std::sync::Arc;

use log::{debug, trace};

use crate::config::{ColorConfig, PlanKey, ProcessPath};
use crate::cube::CubeLut;
use crate::curve::{
    self, Curve, CurveSpec, CURVE_TO_LINEAR_LEN, LINEAR_TO_CURVE_LEN, LUT_INDEX_OFFSET, WP13_ONE,
};
use crate::external::LookFileLoader;
use crate::frame::{Colorspace, DecodeResolution, FrameInfo, PixelFormat};
use crate::matrix::{ColorMatrix, FixedMatrix, FixedRgbToYuv, FixedYuvToRgb, LUMA_709, RgbToYuv,
    YuvToRgb};

/// Alpha companding DC offset in the 12-bit domain
pub const ALPHA_COMPAND_DC_OFFSET: i32 = 256;
/// Alpha companding gain, Q16 against the shifted 15-bit value
pub const ALPHA_COMPAND_GAIN: i32 = 9400;

/// Which correction steps the applicator must run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOps {
    pub curve_to_linear: bool,
    pub linear_matrix: bool,
    pub linear_to_curve: bool,
    pub curved_matrix: bool,
    pub gamma_contrast: bool,
    pub cdl_saturation: bool,
}

impl PlanOps {
    fn none() -> Self {
        Self {
            curve_to_linear: false,
            linear_matrix: false,
            linear_to_curve: false,
            curved_matrix: false,
            gamma_contrast: false,
            cdl_saturation: false,
        }
    }

    pub fn any(&self) -> bool {
        self.curve_to_linear
            || self.linear_matrix
            || self.linear_to_curve
            || self.curved_matrix
            || self.gamma_contrast
            || self.cdl_saturation
    }
}

/// A tone table, shared across channels or split per channel
#[derive(Debug, Clone)]
pub enum ToneLut {
    Shared(Vec<i16>),
    PerChannel(Box<[Vec<i16>; 3]>),
}

impl ToneLut {
    /// Table for channel `ch`
    #[inline]
    pub fn channel(&self, ch: usize) -> &[i16] {
        match self {
            ToneLut::Shared(t) => t,
            ToneLut::PerChannel(t) => &t[ch],
        }
    }
}

/// The per-frame color-correction plan. Immutable once built; shared
/// read-only by every worker for the duration of the frame.
#[derive(Debug)]
pub struct Plan {
    /// Steps the 1D path must run
    pub ops: PlanOps,
    /// Linear-space matrix (float master copy)
    pub linear_matrix: ColorMatrix,
    /// Curved-space matrix
    pub curved_matrix: ColorMatrix,
    /// Q13 renditions for the int16 inner loops
    pub linear_fixed: FixedMatrix,
    pub curved_fixed: FixedMatrix,
    /// A coefficient left the int16-safe range; use the float loop
    pub use_float_matrix: bool,
    /// Resolved curves
    pub encode_curve: Curve,
    pub decode_curve: Curve,
    /// encoded -> linear, 49 152 entries
    pub curve_to_linear: Option<Vec<i16>>,
    /// linear -> encoded, 65 536 entries
    pub linear_to_curve: Option<ToneLut>,
    /// gamma/contrast shaping, 65 536 entries
    pub gamma_contrast: Option<ToneLut>,
    /// 3D cube, when the correction cannot factor through 1D tables
    pub cube: Option<CubeLut>,
    /// The cube is separable; the applicator may take the 1D fast path
    pub cube_separable: bool,
    /// CDL saturation in Q13
    pub cdl_saturation_q13: i32,
    /// Decompand the alpha channel exactly once
    pub alpha_decompand: bool,
    /// Compress computer-graphics RGB into the video-safe range after
    /// correction (RGB outputs only; YUV matrices handle range themselves)
    pub cg_to_vs: bool,
    /// Split-screen preview position in [0, 1]
    pub split_position: f32,
    /// RGB->YUV for the output colorspace, Q15
    pub rgb_to_yuv: FixedRgbToYuv,
    /// YUV->RGB for the source colorspace, Q13
    pub yuv_to_rgb: FixedYuvToRgb,
}

impl Plan {
    /// A plan that passes pixels through untouched
    pub fn bypass(colorspace: Colorspace) -> Self {
        Self {
            ops: PlanOps::none(),
            linear_matrix: ColorMatrix::identity(),
            curved_matrix: ColorMatrix::identity(),
            linear_fixed: FixedMatrix::identity(),
            curved_fixed: FixedMatrix::identity(),
            use_float_matrix: false,
            encode_curve: Curve::Linear,
            decode_curve: Curve::Linear,
            curve_to_linear: None,
            linear_to_curve: None,
            gamma_contrast: None,
            cube: None,
            cube_separable: false,
            cdl_saturation_q13: WP13_ONE,
            alpha_decompand: false,
            cg_to_vs: false,
            split_position: 0.0,
            rgb_to_yuv: RgbToYuv::for_colorspace(colorspace).to_fixed(),
            yuv_to_rgb: YuvToRgb::for_colorspace(colorspace).to_fixed(),
        }
    }

    /// True when the applicator can be bypassed entirely
    pub fn is_bypass(&self) -> bool {
        self.cube.is_none() && !self.ops.any() && !self.alpha_decompand && !self.cg_to_vs
    }
}

/// Lattice evaluation context for the cube fill.
///
/// Owns everything needed to compute one lattice entry so pool workers can
/// fill disjoint index ranges.
pub struct CubeFill {
    edge: usize,
    encode_curve: Curve,
    decode_curve: Curve,
    linear_matrix: ColorMatrix,
    curved_matrix: ColorMatrix,
    primaries_use_decode_curve: bool,
    gamma_tweaks: [f32; 3],
    contrast: f32,
    cdl_saturation: f32,
    highlight_rolloff: Option<f32>,
    highlight_desaturate: bool,
    wb_max: f32,
    look: Option<CubeLut>,
    protect_rows: [f32; 3],
}

// Highlight roll-off mixture weights for the two companion channels of
// R, G and B respectively.
const ROLLOFF_WEIGHTS: [[f32; 2]; 3] = [[0.85, 0.15], [0.65, 0.35], [0.2, 0.8]];

impl CubeFill {
    /// Lattice edge
    pub fn edge(&self) -> usize {
        self.edge
    }

    /// Total number of lattice points
    pub fn lattice_len(&self) -> usize {
        self.edge * self.edge * self.edge
    }

    /// Evaluate the lattice entry for flat index `idx`
    /// (blue fastest-varying, matching [`CubeLut`] storage).
    pub fn eval(&self, idx: usize) -> [i16; 3] {
        let n = self.edge;
        let bi = idx % n;
        let gi = (idx / n) % n;
        let ri = idx / (n * n);
        let top = (n - 1) as f32;
        let encoded = [ri as f32 / top, gi as f32 / top, bi as f32 / top];

        // a. decode to linear through the encode curve
        let mut rgb = [
            self.encode_curve.decode(encoded[0]),
            self.encode_curve.decode(encoded[1]),
            self.encode_curve.decode(encoded[2]),
        ];

        // b. highlight roll-off near white
        if let Some(h) = self.highlight_rolloff {
            rgb = rolloff(rgb, h);
        }

        // c/d. linear matrix, with per-row protection of saturated pixels
        rgb = self.apply_linear_protected(rgb);

        if self.highlight_desaturate {
            rgb = desaturate_highlights(rgb, self.wb_max);
        }

        // e. primaries in decode space encode early
        let mut encoded_space = false;
        if self.primaries_use_decode_curve {
            for v in rgb.iter_mut() {
                *v = self.decode_curve.encode(*v);
            }
            encoded_space = true;
        }

        // f. curved matrix
        rgb = self.curved_matrix.transform(rgb);

        // g. per-channel gamma and contrast
        for (ch, v) in rgb.iter_mut().enumerate() {
            let g = self.gamma_tweaks[ch];
            if g != 1.0 {
                let sign = v.signum();
                *v = sign * v.abs().powf(1.0 / g);
            }
            *v = curve::apply_contrast(*v, self.contrast);
        }

        // h. re-encode unless already done in step e
        if !encoded_space {
            for v in rgb.iter_mut() {
                *v = self.decode_curve.encode(*v);
            }
        }

        // i. CDL saturation around Rec.709 luma
        if self.cdl_saturation != 1.0 {
            let luma = LUMA_709[0] * rgb[0] + LUMA_709[1] * rgb[1] + LUMA_709[2] * rgb[2];
            for v in rgb.iter_mut() {
                *v = luma + (*v - luma) * self.cdl_saturation;
            }
        }

        // j. imported look
        if let Some(look) = &self.look {
            let q = |v: f32| (v.clamp(0.0, 1.0) * 65535.0) as u16;
            let out = look.interpolate(q(rgb[0]), q(rgb[1]), q(rgb[2]));
            rgb = [
                out[0] as f32 / WP13_ONE as f32,
                out[1] as f32 / WP13_ONE as f32,
                out[2] as f32 / WP13_ONE as f32,
            ];
        }

        // k. scale to WP13 and clamp
        [
            curve::to_wp13_entry(rgb[0]),
            curve::to_wp13_entry(rgb[1]),
            curve::to_wp13_entry(rgb[2]),
        ]
    }

    /// Fill the 3-sample lattice entries for indices `start..start+out.len()/3`
    pub fn fill_chunk(&self, out: &mut [i16], start: usize) {
        debug_assert_eq!(out.len() % 3, 0);
        for (k, entry) in out.chunks_exact_mut(3).enumerate() {
            let v = self.eval(start + k);
            entry.copy_from_slice(&v);
        }
    }

    // Blend between the full matrix and the pure diagonal when a row would
    // drive a saturated channel below -1.0, weighted by the row's negativity
    // and the channel's excess over 0.8.
    fn apply_linear_protected(&self, rgb: [f32; 3]) -> [f32; 3] {
        let full = self.linear_matrix.transform(rgb);
        let max_c = rgb[0].max(rgb[1]).max(rgb[2]);
        if max_c <= 0.8 {
            return full;
        }
        let excess = ((max_c - 0.8) / 0.2).clamp(0.0, 1.0);
        let diag = self.linear_matrix.transform_diagonal(rgb);
        let mut out = full;
        for r in 0..3 {
            let neg = self.protect_rows[r];
            if neg < -1.0 {
                let w = ((-1.0 - neg).min(1.0)) * excess;
                out[r] = full[r] * (1.0 - w) + diag[r] * w;
            }
        }
        out
    }
}

fn rolloff(rgb: [f32; 3], h: f32) -> [f32; 3] {
    let hh = h * h;
    let span = (1.0 - h).max(1e-6);
    let mut out = rgb;
    for i in 0..3 {
        let j = (i + 1) % 3;
        let k = (i + 2) % 3;
        if rgb[i] > h && rgb[j] > hh && rgb[k] > hh {
            let mix = ROLLOFF_WEIGHTS[i][0] * rgb[j] + ROLLOFF_WEIGHTS[i][1] * rgb[k];
            let t = ((rgb[i] - h) / span).clamp(0.0, 1.0);
            out[i] = rgb[i] * (1.0 - t) + mix * t;
        }
    }
    out
}

// Pull over-range highlights toward luma; stronger white-balance gains get
// a wider ramp so balanced highlights converge to white instead of a cast.
fn desaturate_highlights(rgb: [f32; 3], wb_max: f32) -> [f32; 3] {
    let m = rgb[0].max(rgb[1]).max(rgb[2]);
    if m <= 1.0 {
        return rgb;
    }
    let span = (wb_max.max(1.01) - 1.0).max(0.01);
    let t = ((m - 1.0) / span).clamp(0.0, 1.0);
    let luma = LUMA_709[0] * rgb[0] + LUMA_709[1] * rgb[1] + LUMA_709[2] * rgb[2];
    [
        rgb[0] + (luma - rgb[0]) * t,
        rgb[1] + (luma - rgb[1]) * t,
        rgb[2] + (luma - rgb[2]) * t,
    ]
}

/// Chunk descriptor for a parallel 1D table fill
pub enum TableFill<'a> {
    CurveToLinear(&'a Curve),
    LinearToCurve(&'a Curve),
    GammaContrast { gamma: f32, contrast: f32 },
}

impl TableFill<'_> {
    /// Fill `out` starting at table index `start`
    pub fn fill_chunk(&self, out: &mut [i16], start: usize) {
        match self {
            TableFill::CurveToLinear(c) => curve::fill_curve_to_linear(c, out, start),
            TableFill::LinearToCurve(c) => curve::fill_linear_to_curve(c, out, start),
            TableFill::GammaContrast { gamma, contrast } => {
                curve::fill_gamma_contrast(*gamma, *contrast, out, start)
            }
        }
    }
}

/// Builds and caches plans
#[derive(Default)]
pub struct Planner {
    cache: Option<(PlanKey, Arc<Plan>)>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap pre-check: does this frame/config combination require any
    /// color correction at all?
    pub fn needs_correction(frame: &FrameInfo, config: &ColorConfig) -> bool {
        let curves_differ = match (&config.encode_curve, &config.decode_curve) {
            (_, None) => false,
            (Some(e), Some(d)) => e != d,
            (None, Some(d)) => *d != CurveSpec::default_for(frame.encoded_format),
        };
        config.has_matrix_work()
            || config.has_white_balance()
            || config.has_tonal_work()
            || curves_differ
            || (config.process_path.contains(ProcessPath::LOOK_FILE) && config.look_file.is_some())
            || (config.process_path.contains(ProcessPath::HIGHLIGHT_ROLLOFF)
                && config.highlight_rolloff.is_some())
            || frame.resolution == DecodeResolution::HalfHorizontalDebayer
            || config.cdl_saturation != 1.0
            || frame.companded_alpha
            || config.split_cc_position > 0.0
    }

    /// Plan for the frame, rebuilt only when the cache key changed.
    pub fn plan_for(
        &mut self,
        frame: &FrameInfo,
        config: &ColorConfig,
        format: PixelFormat,
        look_loader: &dyn LookFileLoader,
    ) -> Arc<Plan> {
        let key = config.plan_key(format, frame.colorspace);
        if let Some((cached_key, plan)) = &self.cache {
            if *cached_key == key {
                trace!("plan cache hit");
                return Arc::clone(plan);
            }
        }
        let plan = Arc::new(build_plan(frame, config, format, look_loader));
        self.cache = Some((key, Arc::clone(&plan)));
        plan
    }

    /// Cache-aware variant with a caller-supplied build (the decoder uses
    /// this to split the table fills across the worker pool).
    pub fn plan_for_with(
        &mut self,
        frame: &FrameInfo,
        config: &ColorConfig,
        format: PixelFormat,
        build: impl FnOnce() -> crate::error::Result<Plan>,
    ) -> crate::error::Result<Arc<Plan>> {
        let key = config.plan_key(format, frame.colorspace);
        if let Some((cached_key, plan)) = &self.cache {
            if *cached_key == key {
                trace!("plan cache hit");
                return Ok(Arc::clone(plan));
            }
        }
        let plan = Arc::new(build()?);
        self.cache = Some((key, Arc::clone(&plan)));
        Ok(plan)
    }
}

/// Decisions made before any table is filled
pub struct PlanLayout {
    pub plan: Plan,
    /// Cube fill context when a cube is required
    pub cube_fill: Option<CubeFill>,
    /// Per-channel gamma/contrast split needed
    pub gamma_per_channel: bool,
    pub gamma_tweaks: [f32; 3],
    pub contrast: f32,
}

/// Resolve curves and matrices and decide the plan shape. Tables are
/// allocated but unfilled; the caller runs the fills (serially via
/// [`build_plan`], or split across the worker pool).
pub fn plan_layout(
    frame: &FrameInfo,
    config: &ColorConfig,
    format: PixelFormat,
    look_loader: &dyn LookFileLoader,
) -> PlanLayout {
    // 1. curves
    let encode_spec = config
        .encode_curve
        .unwrap_or_else(|| CurveSpec::default_for(frame.encoded_format));
    let decode_spec = config.decode_curve.unwrap_or(encode_spec);
    let encode_curve = encode_spec.resolve();
    let decode_curve = decode_spec.resolve();
    let curves_differ = encode_curve != decode_curve;

    // 2. seed matrices
    let mut linear = ColorMatrix::from_rows(config.matrix.coefficients());
    let mut curved = ColorMatrix::identity();

    // 3. saturation
    if config.saturation != 1.0 {
        linear = linear.saturate(config.saturation);
    }

    // 4. gain and lift, in linear or curved space
    let has_gain_lift =
        config.rgb_gain.iter().any(|&g| g != 1.0) || config.rgb_lift.iter().any(|&l| l != 0.0);
    if has_gain_lift {
        if config.primaries_use_decode_curve {
            curved = curved.gain_lift(config.rgb_gain, config.rgb_lift);
        } else {
            linear = linear.gain_lift(config.rgb_gain, config.rgb_lift);
        }
    }

    // 5. exposure
    if config.exposure != 1.0 {
        linear = linear.exposed(config.exposure);
    }

    // 6/7. white balance, clamped
    let mut wb = config.white_balance;
    let wb_active = config.has_white_balance();
    if wb_active {
        for g in wb.iter_mut() {
            *g = g.clamp(0.4, 10.0);
        }
        linear = linear.white_balance(wb);
    }
    let wb_max = wb[0].max(wb[1]).max(wb[2]);

    // 8. fixed-point escape
    let use_float_matrix = linear.needs_float() || curved.needs_float();
    if use_float_matrix {
        debug!("matrix coefficient outside int16 range, using float loop");
    }

    // 9/10/11. cube decisions
    let rolloff_active = config.process_path.contains(ProcessPath::HIGHLIGHT_ROLLOFF)
        && config.highlight_rolloff.is_some();
    let desat_active = config.highlight_desaturate && wb_max > 1.0;
    let force_cube = linear.forces_cube() || desat_active;
    let look = if config.process_path.contains(ProcessPath::LOOK_FILE) {
        config
            .look_file
            .as_deref()
            .and_then(|p| look_loader.load(p))
    } else {
        None
    };

    let gamma_active = config.has_tonal_work();
    let cdl_active = config.process_path.contains(ProcessPath::CDL_SATURATION)
        && config.cdl_saturation != 1.0;

    let wants_cube = look.is_some() || force_cube || rolloff_active;
    let depth = format.cube_depth();

    let mut plan = Plan {
        ops: PlanOps {
            curve_to_linear: curves_differ
                || (!linear.is_identity(0.0) && !encode_curve.is_linear()),
            linear_matrix: !linear.is_identity(0.0),
            linear_to_curve: curves_differ
                || (!linear.is_identity(0.0) && !decode_curve.is_linear()),
            curved_matrix: !curved.is_identity(0.0),
            gamma_contrast: gamma_active,
            cdl_saturation: cdl_active,
        },
        linear_fixed: linear.to_fixed(),
        curved_fixed: curved.to_fixed(),
        linear_matrix: linear,
        curved_matrix: curved,
        use_float_matrix,
        encode_curve,
        decode_curve,
        curve_to_linear: None,
        linear_to_curve: None,
        gamma_contrast: None,
        cube: None,
        cube_separable: false,
        cdl_saturation_q13: (config.cdl_saturation * WP13_ONE as f32).round() as i32,
        alpha_decompand: frame.companded_alpha,
        cg_to_vs: frame.colorspace.is_video_safe() && !format.is_yuv(),
        split_position: config.split_cc_position.clamp(0.0, 1.0),
        rgb_to_yuv: RgbToYuv::for_colorspace(frame.colorspace).to_fixed(),
        yuv_to_rgb: YuvToRgb::for_colorspace(frame.colorspace).to_fixed(),
    };

    let cube_fill = if wants_cube {
        match CubeLut::try_new(depth) {
            Some(cube) => {
                plan.cube = Some(cube);
                let protect = {
                    let m = &linear.0;
                    [m[0][1] + m[0][2], m[1][0] + m[1][2], m[2][0] + m[2][1]]
                };
                Some(CubeFill {
                    edge: (1usize << depth) + 1,
                    encode_curve,
                    decode_curve,
                    linear_matrix: linear,
                    curved_matrix: curved,
                    primaries_use_decode_curve: config.primaries_use_decode_curve,
                    gamma_tweaks: if gamma_active {
                        config.gamma_tweaks
                    } else {
                        [1.0; 3]
                    },
                    contrast: if gamma_active { config.contrast } else { 1.0 },
                    cdl_saturation: if cdl_active { config.cdl_saturation } else { 1.0 },
                    highlight_rolloff: if rolloff_active {
                        config.highlight_rolloff
                    } else {
                        None
                    },
                    highlight_desaturate: desat_active,
                    wb_max,
                    look,
                    protect_rows: protect,
                })
            }
            None => {
                debug!("cube allocation failed, falling back to 1D tables");
                None
            }
        }
    } else {
        None
    };

    if cube_fill.is_some() {
        // the cube subsumes every 1D step
        plan.ops = PlanOps::none();
    } else {
        if plan.ops.curve_to_linear {
            plan.curve_to_linear = Some(vec![0; CURVE_TO_LINEAR_LEN]);
        }
        if plan.ops.linear_to_curve {
            plan.linear_to_curve = Some(ToneLut::Shared(vec![0; LINEAR_TO_CURVE_LEN]));
        }
        if gamma_active {
            let per_channel = config.gamma_tweaks[0] != config.gamma_tweaks[1]
                || config.gamma_tweaks[1] != config.gamma_tweaks[2];
            plan.gamma_contrast = Some(if per_channel {
                ToneLut::PerChannel(Box::new([
                    vec![0; LINEAR_TO_CURVE_LEN],
                    vec![0; LINEAR_TO_CURVE_LEN],
                    vec![0; LINEAR_TO_CURVE_LEN],
                ]))
            } else {
                ToneLut::Shared(vec![0; LINEAR_TO_CURVE_LEN])
            });
        }
    }

    let gamma_per_channel = matches!(plan.gamma_contrast, Some(ToneLut::PerChannel(_)));
    PlanLayout {
        plan,
        cube_fill,
        gamma_per_channel,
        gamma_tweaks: config.gamma_tweaks,
        contrast: config.contrast,
    }
}

/// Build a complete plan, filling all tables on the calling thread.
pub fn build_plan(
    frame: &FrameInfo,
    config: &ColorConfig,
    format: PixelFormat,
    look_loader: &dyn LookFileLoader,
) -> Plan {
    let mut layout = plan_layout(frame, config, format, look_loader);

    if let (Some(fill), Some(cube)) = (&layout.cube_fill, layout.plan.cube.as_mut()) {
        fill.fill_chunk(cube.data_mut(), 0);
        layout.plan.cube_separable = cube.is_separable();
        if layout.plan.cube_separable {
            debug!("cube degenerates to 1D curves, fast path enabled");
        }
    } else {
        if let Some(table) = layout.plan.curve_to_linear.as_mut() {
            TableFill::CurveToLinear(&layout.plan.encode_curve).fill_chunk(table, 0);
        }
        if let Some(ToneLut::Shared(table)) = layout.plan.linear_to_curve.as_mut() {
            TableFill::LinearToCurve(&layout.plan.decode_curve).fill_chunk(table, 0);
        }
        match layout.plan.gamma_contrast.as_mut() {
            Some(ToneLut::Shared(table)) => {
                TableFill::GammaContrast {
                    gamma: layout.gamma_tweaks[0],
                    contrast: layout.contrast,
                }
                .fill_chunk(table, 0);
            }
            Some(ToneLut::PerChannel(tables)) => {
                for (ch, table) in tables.iter_mut().enumerate() {
                    TableFill::GammaContrast {
                        gamma: layout.gamma_tweaks[ch],
                        contrast: layout.contrast,
                    }
                    .fill_chunk(table, 0);
                }
            }
            None => {}
        }
    }
    layout.plan
}


/// Alpha decompanding in the 12-bit domain: remove the DC offset, expand
/// to 15 bits, scale by the compand gain. Input and output are WP13.
#[inline]
pub fn decompand_alpha_wp13(a: i32) -> i32 {
    // WP13 -> 12-bit
    let a12 = (a.clamp(0, WP13_ONE) * 4095 + WP13_ONE / 2) / WP13_ONE;
    let v = (((a12 - ALPHA_COMPAND_DC_OFFSET) << 3) * ALPHA_COMPAND_GAIN) >> 16;
    let v = v.clamp(0, 4095);
    // back to WP13
    (v * WP13_ONE + 2048) / 4095
}

/// Table lookup with WP13 index offset and clamping
#[inline]
pub fn lut_lookup(table: &[i16], v: i32) -> i32 {
    let idx = (v + LUT_INDEX_OFFSET).clamp(0, table.len() as i32 - 1) as usize;
    table[idx] as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedFormat;

    struct NoLook;
    impl LookFileLoader for NoLook {
        fn load(&self, _: &std::path::Path) -> Option<CubeLut> {
            None
        }
    }

    fn frame() -> FrameInfo {
        FrameInfo::new(64, 8, EncodedFormat::Rgb444)
    }

    #[test]
    fn identity_config_needs_no_correction() {
        assert!(!Planner::needs_correction(&frame(), &ColorConfig::identity()));
    }

    #[test]
    fn exposure_needs_correction() {
        let mut c = ColorConfig::identity();
        c.exposure = 1.3;
        assert!(Planner::needs_correction(&frame(), &c));
    }

    #[test]
    fn identity_plan_is_bypass() {
        let plan = build_plan(
            &frame(),
            &ColorConfig::identity(),
            PixelFormat::Rg48,
            &NoLook,
        );
        assert!(plan.is_bypass());
        assert!(!plan.use_float_matrix);
    }

    #[test]
    fn saturation_builds_one_d_plan() {
        let mut c = ColorConfig::identity();
        c.saturation = 0.5;
        let plan = build_plan(&frame(), &c, PixelFormat::Rg48, &NoLook);
        assert!(plan.cube.is_none());
        assert!(plan.ops.linear_matrix);
        assert!(!plan.is_bypass());
    }

    #[test]
    fn rolloff_forces_cube() {
        let mut c = ColorConfig::identity();
        c.highlight_rolloff = Some(0.9);
        let plan = build_plan(&frame(), &c, PixelFormat::Rgb24, &NoLook);
        let cube = plan.cube.as_ref().expect("cube expected");
        assert_eq!(cube.edge(), 33);
    }

    #[test]
    fn sixteen_bit_outputs_get_deep_cube() {
        let mut c = ColorConfig::identity();
        c.highlight_rolloff = Some(0.9);
        let plan = build_plan(&frame(), &c, PixelFormat::Rg48, &NoLook);
        assert_eq!(plan.cube.as_ref().unwrap().edge(), 65);
    }

    #[test]
    fn neutral_cube_is_separable() {
        // A pure gamma change through the cube path must be detected as 1D
        let mut c = ColorConfig::identity();
        c.highlight_rolloff = Some(2.0); // never triggers inside [0,1]
        c.gamma_tweaks = [1.2, 1.2, 1.2];
        let plan = build_plan(&frame(), &c, PixelFormat::Rgb24, &NoLook);
        assert!(plan.cube.is_some());
        assert!(plan.cube_separable);
    }

    #[test]
    fn strong_negative_matrix_forces_cube() {
        let mut c = ColorConfig::identity();
        c.saturation = 3.5; // off-diagonal sums drop far below -1
        let plan = build_plan(&frame(), &c, PixelFormat::Rgb24, &NoLook);
        assert!(plan.cube.is_some());
    }

    #[test]
    fn planner_cache_returns_same_plan() {
        let mut planner = Planner::new();
        let f = frame();
        let c = ColorConfig::identity();
        let a = planner.plan_for(&f, &c, PixelFormat::Rg48, &NoLook);
        let b = planner.plan_for(&f, &c, PixelFormat::Rg48, &NoLook);
        assert!(Arc::ptr_eq(&a, &b));
        let mut c2 = c.clone();
        c2.exposure = 2.0;
        let d = planner.plan_for(&f, &c2, PixelFormat::Rg48, &NoLook);
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[test]
    fn alpha_decompand_is_monotone_and_bounded() {
        let mut prev = 0;
        for a in (0..=WP13_ONE).step_by(64) {
            let v = decompand_alpha_wp13(a);
            assert!(v >= 0 && v <= WP13_ONE);
            assert!(v >= prev, "not monotone at {a}");
            prev = v;
        }
    }
}
