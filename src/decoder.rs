//! Frame decoding orchestration
//!
//! [`FrameDecoder`] owns the worker pool and the plan cache and drives every
//! stage through pool barriers: plan-table fills, wavelet inversion per
//! strip, row-parallel assemble -> correct -> pack, and the finishing passes
//! (sharpen, stereo composition, lens warp, scopes). Cancellation is checked
//! between barriers only; workers always run their claimed items to
//! completion.

use std::sync::{Arc, Mutex};

use enough::Stop;
use imgref::ImgRef;
use log::debug;
use whereat::at;

use crate::apply;
use crate::assemble;
use crate::config::{ColorConfig, DecoderConfig};
use crate::curve::{CURVE_TO_LINEAR_LEN, LINEAR_TO_CURVE_LEN};
use crate::demosaic::{self, BayerCells};
use crate::error::{Error, Result};
use crate::external::{GeomeshEngine, LookFileLoader, WaveletInverter};
use crate::frame::{DecodeResolution, EncodedFormat, FrameInfo, PixelFormat, WhitePoint};
use crate::histogram::Scopes;
use crate::pack::{self, ChromaRows, PackDest, PixelPacker};
use crate::plan::{Plan, Planner, TableFill, ToneLut};
use crate::pool::{JobKind, PoolJob, WorkerPool, WorkerScratch};
use crate::row::{RowBuf, RowFlags, RowLayout};
use crate::shared::SharedSlice;
use crate::sharpen;
use crate::view3d::{self, View3dParams};

/// Entries per work item when filling 1D plan tables
const TABLE_FILL_CHUNK: usize = 8192;

/// The decoder: worker pool, plan cache, and the per-frame drive logic
pub struct FrameDecoder {
    pool: WorkerPool,
    planner: Planner,
}

impl FrameDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        let use_simd = crate::simd::simd_allowed(config.cpu_flags_mask);
        Self {
            pool: WorkerPool::new(config.worker_count(), use_simd),
            planner: Planner::new(),
        }
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// Decode one frame: invert the wavelet bands, run the color pipeline,
    /// and pack into `out` (`pitch` bytes per scanline).
    pub fn decode_frame(
        &mut self,
        inverter: &Arc<dyn WaveletInverter>,
        frame: &FrameInfo,
        color: &ColorConfig,
        look: &dyn LookFileLoader,
        format: PixelFormat,
        out: &mut [u8],
        pitch: usize,
        stop: &(impl Stop + ?Sized),
    ) -> Result<()> {
        validate_output(frame, format, out.len(), pitch)?;
        stop.check().map_err(|e| at(Error::from(e)))?;
        let plan = self.build_plan(frame, color, format, look)?;
        stop.check().map_err(|e| at(Error::from(e)))?;

        match frame.encoded_format {
            EncodedFormat::Bayer => {
                self.decode_bayer(inverter, frame, &plan, color, format, out, pitch, stop)
            }
            _ => self.decode_standard(inverter, frame, &plan, color, format, out, pitch, stop),
        }
    }

    /// Repack an already-decoded uncompressed frame: `src_rows` holds one
    /// scanline per row of `channels * width` samples (the same layout the
    /// wavelet inverter produces), skipping the wavelet stage entirely.
    pub fn repack_frame(
        &mut self,
        frame: &FrameInfo,
        color: &ColorConfig,
        look: &dyn LookFileLoader,
        format: PixelFormat,
        src_rows: &[i16],
        out: &mut [u8],
        pitch: usize,
        stop: &(impl Stop + ?Sized),
    ) -> Result<()> {
        validate_output(frame, format, out.len(), pitch)?;
        let row_stride = frame.encoded_format.channels() * frame.width;
        if src_rows.len() < frame.height * row_stride {
            return Err(at(Error::ShortRow {
                channel: 0,
                got: src_rows.len(),
                need: frame.height * row_stride,
            }));
        }
        stop.check().map_err(|e| at(Error::from(e)))?;
        let plan = self.build_plan(frame, color, format, look)?;
        let packer = pack::packer_for(format, &plan);
        let job = OutputJob {
            kind: JobKind::OutputUncompressed,
            frame: frame.clone(),
            plan: Arc::clone(&plan),
            packer,
            format,
            bands: src_rows,
            row_stride,
            out: SharedSlice::new(out),
            pitch,
        };
        self.pool.run_scoped(Arc::new(job))
    }

    /// Decode the frame's bands and accumulate histogram/waveform scopes
    /// without producing pixels.
    pub fn measure_scopes(
        &mut self,
        inverter: &Arc<dyn WaveletInverter>,
        frame: &FrameInfo,
        stop: &(impl Stop + ?Sized),
    ) -> Result<Scopes> {
        let row_stride = frame.encoded_format.channels() * frame.width;
        let mut bands = vec![0i16; frame.height * row_stride];
        self.run_wavelet(inverter, frame.height, row_stride, &mut bands)?;
        stop.check().map_err(|e| at(Error::from(e)))?;
        let job = HistogramJob {
            frame: frame.clone(),
            bands: &bands,
            row_stride,
            partials: Mutex::new(Scopes::new(frame.width)),
        };
        let job: Arc<HistogramJob<'_>> = Arc::new(job);
        let job_dyn: Arc<dyn PoolJob + '_> = job.clone();
        self.pool.run_scoped(job_dyn)?;
        let scopes = job.partials.lock().unwrap().clone();
        Ok(scopes)
    }

    /// Compose a stereo pair into `out`. `vertical` selects the
    /// vertical-shift job kind; the blend itself comes from `params`.
    pub fn compose_3d(
        &self,
        params: &View3dParams,
        vertical: bool,
        left: ImgRef<'_, u8>,
        right: ImgRef<'_, u8>,
        out: &mut [u8],
        pitch: usize,
        row_bytes: usize,
        height: usize,
    ) -> Result<()> {
        if out.len() < height * pitch {
            return Err(at(Error::ShortOutput {
                got: out.len(),
                need: height * pitch,
            }));
        }
        let job = ComposeJob {
            kind: if vertical {
                JobKind::Vertical3d
            } else {
                JobKind::Horizontal3d
            },
            params: *params,
            left,
            right,
            out: SharedSlice::new(out),
            pitch,
            row_bytes,
            height,
        };
        self.pool.run_scoped(Arc::new(job))
    }

    /// Vertical sharpening pass from `src` into `out`
    pub fn sharpen_frame(
        &self,
        src: ImgRef<'_, u8>,
        out: &mut [u8],
        pitch: usize,
        row_bytes: usize,
        height: usize,
        strength: f32,
    ) -> Result<()> {
        let job = SharpenJob {
            src,
            out: SharedSlice::new(out),
            pitch,
            row_bytes,
            height,
            strength_q8: sharpen::strength_q8(strength),
        };
        self.pool.run_scoped(Arc::new(job))
    }

    /// Apply the lens-warp mesh: optional cache rebuild, the warp itself,
    /// then the optional vertical blur, each as its own barrier.
    pub fn warp_frame(
        &self,
        engine: &Arc<dyn GeomeshEngine>,
        src: &[u8],
        out: &mut [u8],
        pitch: usize,
        height: usize,
        rebuild_chunks: usize,
        blur: bool,
    ) -> Result<()> {
        if rebuild_chunks > 0 {
            let job = WarpCacheJob {
                engine: Arc::clone(engine),
                chunks: rebuild_chunks,
            };
            self.pool.run(Arc::new(job))?;
        }
        let rows_per = height.div_ceil(self.pool.threads().max(1)).max(1);
        {
            let job = WarpJob {
                engine: Arc::clone(engine),
                src,
                out: SharedSlice::new(out),
                pitch,
                height,
                rows_per,
            };
            self.pool.run_scoped(Arc::new(job))?;
        }
        if blur {
            let job = WarpBlurJob {
                engine: Arc::clone(engine),
                out: SharedSlice::new(out),
                pitch,
                height,
                rows_per,
            };
            self.pool.run_scoped(Arc::new(job))?;
        }
        Ok(())
    }

    // Build (or fetch from cache) the plan, splitting the heavy table
    // fills across the pool.
    fn build_plan(
        &mut self,
        frame: &FrameInfo,
        color: &ColorConfig,
        format: PixelFormat,
        look: &dyn LookFileLoader,
    ) -> Result<Arc<Plan>> {
        let pool = &self.pool;
        self.planner.plan_for_with(frame, color, format, || {
            let mut layout = crate::plan::plan_layout(frame, color, format, look);

            if let Some(fill) = layout.cube_fill.take() {
                let mut cube = layout.plan.cube.take().expect("cube fill without cube");
                {
                    let edge = cube.edge();
                    let shared = SharedSlice::new(cube.data_mut());
                    let job = CubeFillJob {
                        fill: &fill,
                        shared,
                        edge,
                    };
                    pool.run_scoped(Arc::new(job))?;
                }
                layout.plan.cube_separable = cube.is_separable();
                if layout.plan.cube_separable {
                    debug!("cube degenerates to 1D curves, fast path enabled");
                }
                layout.plan.cube = Some(cube);
            } else {
                let encode_curve = layout.plan.encode_curve;
                let decode_curve = layout.plan.decode_curve;
                if let Some(table) = layout.plan.curve_to_linear.as_mut() {
                    fill_table_parallel(
                        pool,
                        JobKind::Build1dToLinear,
                        TableFill::CurveToLinear(&encode_curve),
                        table,
                    )?;
                }
                if let Some(ToneLut::Shared(table)) = layout.plan.linear_to_curve.as_mut() {
                    fill_table_parallel(
                        pool,
                        JobKind::Build1dToCurve,
                        TableFill::LinearToCurve(&decode_curve),
                        table,
                    )?;
                }
                match layout.plan.gamma_contrast.as_mut() {
                    Some(ToneLut::Shared(table)) => {
                        fill_table_parallel(
                            pool,
                            JobKind::BuildLutCurves,
                            TableFill::GammaContrast {
                                gamma: layout.gamma_tweaks[0],
                                contrast: layout.contrast,
                            },
                            table,
                        )?;
                    }
                    Some(ToneLut::PerChannel(tables)) => {
                        for (ch, table) in tables.iter_mut().enumerate() {
                            fill_table_parallel(
                                pool,
                                JobKind::BuildLutCurves,
                                TableFill::GammaContrast {
                                    gamma: layout.gamma_tweaks[ch],
                                    contrast: layout.contrast,
                                },
                                table,
                            )?;
                        }
                    }
                    None => {}
                }
            }
            Ok(layout.plan)
        })
    }

    fn run_wavelet(
        &self,
        inverter: &Arc<dyn WaveletInverter>,
        rows: usize,
        row_stride: usize,
        bands: &mut [i16],
    ) -> Result<()> {
        let strip_h = inverter.strip_height().max(1);
        let job = WaveletJob {
            inverter: Arc::clone(inverter),
            bands: SharedSlice::new(bands),
            strip_h,
            row_stride,
            rows,
        };
        self.pool.run_scoped(Arc::new(job))
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_standard(
        &mut self,
        inverter: &Arc<dyn WaveletInverter>,
        frame: &FrameInfo,
        plan: &Arc<Plan>,
        color: &ColorConfig,
        format: PixelFormat,
        out: &mut [u8],
        pitch: usize,
        stop: &(impl Stop + ?Sized),
    ) -> Result<()> {
        let row_stride = frame.encoded_format.channels() * frame.width;
        let mut bands = vec![0i16; frame.height * row_stride];
        self.run_wavelet(inverter, frame.height, row_stride, &mut bands)?;
        stop.check().map_err(|e| at(Error::from(e)))?;

        let sharpen_pass = sharpenable(format) && color.sharpen > 0.0;
        if sharpen_pass {
            let mut staging = vec![0u8; frame.height * pitch];
            self.pack_rows(frame, plan, format, &bands, row_stride, &mut staging, pitch)?;
            stop.check().map_err(|e| at(Error::from(e)))?;
            let src = imgref::Img::new_stride(
                staging.as_slice(),
                format.row_bytes(frame.width),
                frame.height,
                pitch,
            );
            self.sharpen_frame(
                src,
                out,
                pitch,
                format.row_bytes(frame.width),
                frame.height,
                color.sharpen,
            )
        } else {
            self.pack_rows(frame, plan, format, &bands, row_stride, out, pitch)
        }
    }

    fn pack_rows(
        &self,
        frame: &FrameInfo,
        plan: &Arc<Plan>,
        format: PixelFormat,
        bands: &[i16],
        row_stride: usize,
        out: &mut [u8],
        pitch: usize,
    ) -> Result<()> {
        let packer = pack::packer_for(format, plan);
        let job = OutputJob {
            kind: JobKind::Output,
            frame: frame.clone(),
            plan: Arc::clone(plan),
            packer,
            format,
            bands,
            row_stride,
            out: SharedSlice::new(out),
            pitch,
        };
        self.pool.run_scoped(Arc::new(job))
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_bayer(
        &mut self,
        inverter: &Arc<dyn WaveletInverter>,
        frame: &FrameInfo,
        plan: &Arc<Plan>,
        color: &ColorConfig,
        format: PixelFormat,
        out: &mut [u8],
        pitch: usize,
        stop: &(impl Stop + ?Sized),
    ) -> Result<()> {
        let full = frame.resolution == DecodeResolution::FullDebayer;
        let unsupported = (!frame.resolution.wants_debayer()
            && frame.resolution != DecodeResolution::HalfNoDebayer)
            || (format.is_planar420() && !full)
            || (full && (frame.width % 2 != 0 || frame.height % 2 != 0));
        if unsupported {
            return Err(at(Error::UnsupportedOutput {
                format,
                width: frame.width,
                height: frame.height,
            }));
        }

        let cell_w = if full { frame.width / 2 } else { frame.width };
        let cell_rows = if full { frame.height / 2 } else { frame.height };
        let row_stride = 4 * cell_w;

        let mut bands = vec![0i16; cell_rows * row_stride];
        self.run_wavelet(inverter, cell_rows, row_stride, &mut bands)?;
        stop.check().map_err(|e| at(Error::from(e)))?;

        let sharpen_pass = sharpenable(format) && color.sharpen > 0.0;
        let mut planes = vec![0i16; cell_rows * row_stride];
        let mut staging = if sharpen_pass {
            vec![0u8; frame.height * pitch]
        } else {
            Vec::new()
        };

        {
            let target: &mut [u8] = if sharpen_pass { &mut staging } else { out };
            let job = BayerJob {
                frame: frame.clone(),
                plan: Arc::clone(plan),
                packer: pack::packer_for(format, plan),
                format,
                bands: &bands,
                planes: SharedSlice::new(&mut planes),
                cell_w,
                cell_rows,
                full,
                ripple: frame.resolution == DecodeResolution::FullDebayer,
                out: SharedSlice::new(target),
                pitch,
            };
            self.pool.run_scoped(Arc::new(job))?;
        }

        if sharpen_pass {
            stop.check().map_err(|e| at(Error::from(e)))?;
            let src = imgref::Img::new_stride(
                staging.as_slice(),
                format.row_bytes(frame.width),
                frame.height,
                pitch,
            );
            self.sharpen_frame(
                src,
                out,
                pitch,
                format.row_bytes(frame.width),
                frame.height,
                color.sharpen,
            )?;
        }
        Ok(())
    }
}

/// Sharpening runs only on the byte-granularity packed RGB outputs
fn sharpenable(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Rgb24 | PixelFormat::Rgb32 | PixelFormat::Bgra
    )
}

fn validate_output(
    frame: &FrameInfo,
    format: PixelFormat,
    out_len: usize,
    pitch: usize,
) -> Result<()> {
    let row_bytes = format.row_bytes(frame.width);
    if format.is_planar420() {
        if frame.width % 2 != 0 || frame.height % 2 != 0 || pitch % 2 != 0 {
            return Err(at(Error::UnsupportedOutput {
                format,
                width: frame.width,
                height: frame.height,
            }));
        }
        let need = planar420_size(format, frame.height, pitch);
        if pitch < row_bytes || out_len < need {
            return Err(at(Error::ShortOutput {
                got: out_len,
                need,
            }));
        }
        return Ok(());
    }
    if pitch < row_bytes || out_len < frame.height * pitch {
        return Err(at(Error::ShortOutput {
            got: out_len,
            need: frame.height * pitch,
        }));
    }
    Ok(())
}

fn rgb_rowbuf(samples: &[i16], width: usize) -> RowBuf {
    let mut row = RowBuf::new(width, 3, RowLayout::Packed, WhitePoint::W13);
    row.signed_mut().copy_from_slice(&samples[..width * 3]);
    row
}

fn planar420_size(format: PixelFormat, height: usize, pitch: usize) -> usize {
    match format {
        // luma plane + interleaved UV plane at full pitch
        PixelFormat::Nv12 => height * pitch + (height / 2) * pitch,
        // luma plane + two half-pitch chroma planes
        _ => height * pitch + 2 * ((height / 2) * (pitch / 2)),
    }
}

// Assemble one band scanline into channel slices
fn band_channels<'a>(
    frame: &FrameInfo,
    bands: &'a [i16],
    row_stride: usize,
    y: usize,
) -> [&'a [i16]; 4] {
    let width = frame.width;
    let channels = frame.encoded_format.channels();
    let base = y * row_stride;
    let row = &bands[base..base + row_stride];
    let empty: &[i16] = &[];
    let mut out = [empty; 4];
    let chroma_sub = frame.encoded_format == EncodedFormat::Yuv422;
    for (ch, slot) in out.iter_mut().enumerate().take(channels) {
        let need = if chroma_sub && ch > 0 {
            width.div_ceil(2)
        } else {
            width
        };
        *slot = &row[ch * width..ch * width + need];
    }
    out
}

// Normalize a fresh row into the family the packer expects, then run the
// plan. Bypass decodes land directly in the output family so the packers
// only repack.
fn correct_row(
    frame: &FrameInfo,
    plan: &Plan,
    format: PixelFormat,
    row: &mut RowBuf,
    scratch: &mut Vec<i16>,
) {
    if frame.encoded_format.is_yuv() {
        if plan.is_bypass() && format.is_yuv() {
            row.insert_flags(RowFlags::COLOR_FORMAT_DONE);
        } else {
            // the conversion matrices work in the signed WP13 domain
            assemble::normalize_to_wp13(row);
            assemble::yuv_row_to_rgb(row, &plan.yuv_to_rgb);
        }
    } else if plan.is_bypass() && format.is_yuv() {
        assemble::normalize_to_wp13(row);
        assemble::rgb_row_to_yuv(row, &plan.rgb_to_yuv);
    }
    apply::apply_row(plan, row, scratch);
}

// Destination scanline index: the 8-bit RGB formats are bottom-up
#[inline]
fn dest_row(frame: &FrameInfo, format: PixelFormat, y: usize) -> usize {
    if format.is_inverted() {
        frame.height - 1 - y
    } else {
        y
    }
}

struct OutputJob<'a> {
    kind: JobKind,
    frame: FrameInfo,
    plan: Arc<Plan>,
    packer: Box<dyn PixelPacker>,
    format: PixelFormat,
    bands: &'a [i16],
    row_stride: usize,
    out: SharedSlice<'a, u8>,
    pitch: usize,
}

impl OutputJob<'_> {
    fn assemble_one(&self, y: usize, scratch: &mut WorkerScratch) -> Result<RowBuf> {
        let chans = band_channels(&self.frame, self.bands, self.row_stride, y);
        let channels = self.frame.encoded_format.channels();
        let mut row = assemble::assemble_row(&self.frame, &chans[..channels], self.frame.band_shift)?;
        correct_row(&self.frame, &self.plan, self.format, &mut row, &mut scratch.rows);
        Ok(row)
    }
}

impl PoolJob for OutputJob<'_> {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn work_count(&self) -> usize {
        if self.packer.packs_pairs() {
            self.frame.height / 2
        } else {
            self.frame.height
        }
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let row_bytes = self.format.row_bytes(self.frame.width);
        if self.packer.packs_pairs() {
            let y = index * 2;
            let top = self.assemble_one(y, scratch)?;
            let bottom = self.assemble_one(y + 1, scratch)?;
            // SAFETY: scanlines y, y+1 and chroma row index belong to this
            // item alone
            let dest = unsafe { pair_dest(&self.out, self.format, &self.frame, self.pitch, y) };
            self.packer
                .pack(&[top.view(), bottom.view()], dest, y, &mut scratch.pack);
        } else {
            let row = self.assemble_one(index, scratch)?;
            let dy = dest_row(&self.frame, self.format, index);
            // SAFETY: each item owns its scanline
            let dest = unsafe { self.out.range_mut(dy * self.pitch, row_bytes) };
            self.packer
                .pack(&[row.view()], PackDest::Row(dest), index, &mut scratch.pack);
        }
        Ok(())
    }
}

// Carve the 4:2:0 plane layout into one pair item's destination.
//
// # Safety
// The caller must own scanlines `y` and `y+1` and chroma row `y/2`.
unsafe fn pair_dest<'s>(
    out: &SharedSlice<'s, u8>,
    format: PixelFormat,
    frame: &FrameInfo,
    pitch: usize,
    y: usize,
) -> PackDest<'s> {
    let width = frame.width;
    let height = frame.height;
    let luma0 = unsafe { out.range_mut(y * pitch, width) };
    let luma1 = unsafe { out.range_mut((y + 1) * pitch, width) };
    let chroma_row = y / 2;
    let chroma = match format {
        PixelFormat::Nv12 => {
            let base = height * pitch + chroma_row * pitch;
            ChromaRows::Interleaved(unsafe { out.range_mut(base, width) })
        }
        _ => {
            let chroma_pitch = pitch / 2;
            let v_base = height * pitch + chroma_row * chroma_pitch;
            let u_base = height * pitch + (height / 2) * chroma_pitch + chroma_row * chroma_pitch;
            ChromaRows::Planar {
                u: unsafe { out.range_mut(u_base, width / 2) },
                v: unsafe { out.range_mut(v_base, width / 2) },
            }
        }
    };
    PackDest::Pair {
        luma: [luma0, luma1],
        chroma,
    }
}

struct WaveletJob<'a> {
    inverter: Arc<dyn WaveletInverter>,
    bands: SharedSlice<'a, i16>,
    strip_h: usize,
    row_stride: usize,
    rows: usize,
}

impl PoolJob for WaveletJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::Wavelet
    }

    fn work_count(&self) -> usize {
        self.rows.div_ceil(self.strip_h)
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let y0 = index * self.strip_h;
        let rows = self.strip_h.min(self.rows - y0);
        // SAFETY: strips partition the band buffer by construction
        let out = unsafe {
            self.bands
                .range_mut(y0 * self.row_stride, rows * self.row_stride)
        };
        self.inverter.invert_strip(worker, index, out)
    }
}

struct BayerJob<'a> {
    frame: FrameInfo,
    plan: Arc<Plan>,
    packer: Box<dyn PixelPacker>,
    format: PixelFormat,
    bands: &'a [i16],
    planes: SharedSlice<'a, i16>,
    cell_w: usize,
    cell_rows: usize,
    full: bool,
    ripple: bool,
    out: SharedSlice<'a, u8>,
    pitch: usize,
}

impl BayerJob<'_> {
    fn cells_row(&self, y: usize) -> BayerCells<'_> {
        let stride = 4 * self.cell_w;
        // SAFETY: level 2 reads rows only after levels 0/1 fully completed
        let row = unsafe { self.planes.range(y * stride, stride) };
        BayerCells {
            r: &row[..self.cell_w],
            g1: &row[self.cell_w..2 * self.cell_w],
            g2: &row[2 * self.cell_w..3 * self.cell_w],
            b: &row[3 * self.cell_w..4 * self.cell_w],
        }
    }

    fn pack_rgb_row(
        &self,
        samples: &[i16],
        width: usize,
        y: usize,
        scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let mut row = RowBuf::new(width, 3, RowLayout::Packed, WhitePoint::W13);
        row.signed_mut().copy_from_slice(&samples[..width * 3]);
        correct_row(&self.frame, &self.plan, self.format, &mut row, &mut scratch.rows);
        let row_bytes = self.format.row_bytes(width);
        let dy = dest_row(&self.frame, self.format, y);
        // SAFETY: each output scanline belongs to exactly one item
        let dest = unsafe { self.out.range_mut(dy * self.pitch, row_bytes) };
        self.packer
            .pack(&[row.view()], PackDest::Row(dest), y, &mut scratch.pack);
        Ok(())
    }
}

impl PoolJob for BayerJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::Output
    }

    fn work_count(&self) -> usize {
        self.cell_rows
    }

    fn levels(&self) -> usize {
        if self.ripple { 3 } else { 2 }
    }

    fn level_count(&self, _level: usize) -> usize {
        self.cell_rows
    }

    fn run_item(
        &self,
        level: usize,
        index: usize,
        _worker: usize,
        scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let stride = 4 * self.cell_w;
        let expand_level = 0;
        let ripple_level = if self.ripple { Some(1) } else { None };
        let output_level = self.levels() - 1;

        if level == expand_level {
            let base = index * stride;
            let band_row = &self.bands[base..base + stride];
            // SAFETY: each item owns its plane row at this level
            let planes = unsafe { self.planes.range_mut(base, stride) };
            let (r, rest) = planes.split_at_mut(self.cell_w);
            let (g1, rest) = rest.split_at_mut(self.cell_w);
            let (g2, b) = rest.split_at_mut(self.cell_w);
            demosaic::expand_color_difference(
                &band_row[..self.cell_w],
                &band_row[self.cell_w..2 * self.cell_w],
                &band_row[2 * self.cell_w..3 * self.cell_w],
                &band_row[3 * self.cell_w..4 * self.cell_w],
                r,
                g1,
                g2,
                b,
            );
            return Ok(());
        }

        if Some(level) == ripple_level {
            let base = index * stride;
            // SAFETY: each item owns its plane row at this level
            let planes = unsafe { self.planes.range_mut(base, stride) };
            let (r, rest) = planes.split_at_mut(self.cell_w);
            let (_g, rest) = rest.split_at_mut(2 * self.cell_w);
            demosaic::ripple_filter(r);
            demosaic::ripple_filter(rest);
            return Ok(());
        }

        debug_assert_eq!(level, output_level);
        let cur = self.cells_row(index);
        if self.full {
            let next = self.cells_row((index + 1).min(self.cell_rows - 1));
            let full_w = self.cell_w * 2;
            let mut even = vec![0i16; full_w * 3];
            let mut odd = vec![0i16; full_w * 3];
            demosaic::debayer_rows(&cur, &next, &mut even, &mut odd);
            if self.packer.packs_pairs() {
                let y = index * 2;
                let mut top = rgb_rowbuf(&even, full_w);
                let mut bottom = rgb_rowbuf(&odd, full_w);
                correct_row(&self.frame, &self.plan, self.format, &mut top, &mut scratch.rows);
                correct_row(
                    &self.frame,
                    &self.plan,
                    self.format,
                    &mut bottom,
                    &mut scratch.rows,
                );
                // SAFETY: scanlines y, y+1 and chroma row y/2 belong to this item
                let dest =
                    unsafe { pair_dest(&self.out, self.format, &self.frame, self.pitch, y) };
                self.packer
                    .pack(&[top.view(), bottom.view()], dest, y, &mut scratch.pack);
            } else {
                self.pack_rgb_row(&even, full_w, index * 2, scratch)?;
                self.pack_rgb_row(&odd, full_w, index * 2 + 1, scratch)?;
            }
        } else {
            let mut rgb = vec![0i16; self.cell_w * 3];
            demosaic::half_rgb_row(&cur, &mut rgb);
            self.pack_rgb_row(&rgb, self.cell_w, index, scratch)?;
        }
        Ok(())
    }
}

struct HistogramJob<'a> {
    frame: FrameInfo,
    bands: &'a [i16],
    row_stride: usize,
    partials: Mutex<Scopes>,
}

impl PoolJob for HistogramJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::Histogram
    }

    fn work_count(&self) -> usize {
        self.frame.height
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let chans = band_channels(&self.frame, self.bands, self.row_stride, index);
        let channels = self.frame.encoded_format.channels();
        let row = assemble::assemble_row(&self.frame, &chans[..channels], self.frame.band_shift)?;
        let mut local = Scopes::new(self.frame.width);
        local.accumulate_row(&row.view());
        self.partials.lock().unwrap().merge(&local);
        Ok(())
    }
}

struct ComposeJob<'a> {
    kind: JobKind,
    params: View3dParams,
    left: ImgRef<'a, u8>,
    right: ImgRef<'a, u8>,
    out: SharedSlice<'a, u8>,
    pitch: usize,
    row_bytes: usize,
    height: usize,
}

impl PoolJob for ComposeJob<'_> {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn work_count(&self) -> usize {
        self.height
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        // SAFETY: one scanline per item
        let dest = unsafe { self.out.range_mut(index * self.pitch, self.row_bytes) };
        view3d::compose_row(&self.params, self.left, self.right, dest, index);
        Ok(())
    }
}

struct SharpenJob<'a> {
    src: ImgRef<'a, u8>,
    out: SharedSlice<'a, u8>,
    pitch: usize,
    row_bytes: usize,
    height: usize,
    strength_q8: i32,
}

impl PoolJob for SharpenJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::Sharpen
    }

    fn work_count(&self) -> usize {
        self.height
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        // SAFETY: one scanline per item
        let dest = unsafe { self.out.range_mut(index * self.pitch, self.row_bytes) };
        sharpen::sharpen_row(self.src, dest, index, self.strength_q8);
        Ok(())
    }
}

struct CubeFillJob<'a> {
    fill: &'a crate::plan::CubeFill,
    shared: SharedSlice<'a, i16>,
    edge: usize,
}

impl PoolJob for CubeFillJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::BuildCube
    }

    fn work_count(&self) -> usize {
        self.edge
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let pts = self.edge * self.edge;
        let start = index * pts;
        // SAFETY: one red-slab of the lattice per item
        let out = unsafe { self.shared.range_mut(start * 3, pts * 3) };
        self.fill.fill_chunk(out, start);
        Ok(())
    }
}

struct TableFillJob<'a> {
    kind: JobKind,
    fill: TableFill<'a>,
    shared: SharedSlice<'a, i16>,
    total: usize,
}

impl PoolJob for TableFillJob<'_> {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn work_count(&self) -> usize {
        self.total.div_ceil(TABLE_FILL_CHUNK)
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let start = index * TABLE_FILL_CHUNK;
        let len = TABLE_FILL_CHUNK.min(self.total - start);
        // SAFETY: chunks partition the table
        let out = unsafe { self.shared.range_mut(start, len) };
        self.fill.fill_chunk(out, start);
        Ok(())
    }
}

fn fill_table_parallel(
    pool: &WorkerPool,
    kind: JobKind,
    fill: TableFill<'_>,
    table: &mut [i16],
) -> Result<()> {
    debug_assert!(table.len() == CURVE_TO_LINEAR_LEN || table.len() == LINEAR_TO_CURVE_LEN);
    let total = table.len();
    let job = TableFillJob {
        kind,
        fill,
        shared: SharedSlice::new(table),
        total,
    };
    pool.run_scoped(Arc::new(job))
}

struct WarpCacheJob {
    engine: Arc<dyn GeomeshEngine>,
    chunks: usize,
}

impl PoolJob for WarpCacheJob {
    fn kind(&self) -> JobKind {
        JobKind::WarpCache
    }

    fn work_count(&self) -> usize {
        self.chunks
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        self.engine.rebuild_cache(index)
    }
}

struct WarpJob<'a> {
    engine: Arc<dyn GeomeshEngine>,
    src: &'a [u8],
    out: SharedSlice<'a, u8>,
    pitch: usize,
    height: usize,
    rows_per: usize,
}

impl PoolJob for WarpJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::Warp
    }

    fn work_count(&self) -> usize {
        self.height.div_ceil(self.rows_per)
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let y0 = index * self.rows_per;
        let y1 = (y0 + self.rows_per).min(self.height);
        // SAFETY: row ranges partition the frame
        let dest = unsafe { self.out.range_mut(y0 * self.pitch, (y1 - y0) * self.pitch) };
        self.engine.apply_bilinear(y0, y1, self.src, dest)
    }
}

struct WarpBlurJob<'a> {
    engine: Arc<dyn GeomeshEngine>,
    out: SharedSlice<'a, u8>,
    pitch: usize,
    height: usize,
    rows_per: usize,
}

impl PoolJob for WarpBlurJob<'_> {
    fn kind(&self) -> JobKind {
        JobKind::WarpBlurv
    }

    fn work_count(&self) -> usize {
        self.height.div_ceil(self.rows_per)
    }

    fn run_item(
        &self,
        _level: usize,
        index: usize,
        _worker: usize,
        _scratch: &mut WorkerScratch,
    ) -> Result<()> {
        let y0 = index * self.rows_per;
        let y1 = (y0 + self.rows_per).min(self.height);
        // SAFETY: row ranges partition the frame
        let dest = unsafe { self.out.range_mut(y0 * self.pitch, (y1 - y0) * self.pitch) };
        self.engine.blur_vertical(y0, y1, dest)
    }
}
