//! # zenwave
//!
//! Color-pipeline core of a wavelet video codec decoder: per-scanline
//! conversion of 16-bit signed wavelet coefficients into packed output
//! pixels, with composable color correction in between.
//!
//! The pipeline per frame:
//!
//! 1. a [`Planner`](plan::Planner) folds the user's color settings into an
//!    immutable [`Plan`](plan::Plan) (matrices, tone tables, optionally a
//!    3D cube), cached on the settings identity;
//! 2. the worker pool inverts wavelet strips through the external
//!    [`WaveletInverter`];
//! 3. each scanline is assembled into a WP13 intermediate row, corrected
//!    through the plan, and packed into one of the roughly twenty supported
//!    output formats;
//! 4. optional finishing passes: vertical sharpen, stereo composition,
//!    lens warp, scopes.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use zenwave::{
//!     ColorConfig, DecoderConfig, EncodedFormat, FrameDecoder, FrameInfo, FsLookLoader,
//!     PixelFormat, WaveletInverter,
//! };
//! use enough::Unstoppable;
//!
//! # fn inverter() -> Arc<dyn WaveletInverter> { unimplemented!() }
//! let mut decoder = FrameDecoder::new(&DecoderConfig::new().threads(4));
//! let frame = FrameInfo::new(1920, 1080, EncodedFormat::Yuv422);
//! let mut out = vec![0u8; 1920 * 1080 * 3];
//! decoder
//!     .decode_frame(
//!         &inverter(),
//!         &frame,
//!         &ColorConfig::identity(),
//!         &FsLookLoader,
//!         PixelFormat::Rgb24,
//!         &mut out,
//!         1920 * 3,
//!         &Unstoppable,
//!     )
//!     .unwrap();
//! ```
//!
//! Everything outside the color core — entropy decoding, the inverse
//! wavelet transform itself, container demuxing, file I/O — is reached
//! through the traits in [`external`].

pub mod apply;
pub mod assemble;
mod config;
pub mod cube;
pub mod curve;
mod decoder;
pub mod demosaic;
mod error;
mod external;
mod frame;
pub mod histogram;
pub mod matrix;
pub mod pack;
pub mod plan;
pub mod pool;
pub mod row;
mod shared;
pub mod sharpen;
pub mod simd;
pub mod view3d;

pub use config::{ColorConfig, DecoderConfig, MatrixSource, ProcessPath};
pub use curve::{Curve, CurveKind, CurveSpec};
pub use decoder::FrameDecoder;
pub use enough::{Stop, StopReason, Unstoppable};
pub use error::{Error, Result};
pub use external::{FsLookLoader, GeomeshEngine, LookFileLoader, WaveletInverter};
pub use frame::{
    Colorspace, DecodeResolution, EncodedFormat, FrameInfo, PixelFormat, WhitePoint,
};
pub use histogram::Scopes;
pub use plan::{Plan, Planner};
pub use pool::{JobKind, PoolJob, WorkerPool, WorkerScratch};
pub use row::{RowBuf, RowFlags, RowLayout, RowView};
pub use view3d::{BlendMode, View3dParams};
