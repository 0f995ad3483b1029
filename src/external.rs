//! Collaborator interfaces consumed by the color core
//!
//! The entropy decoder, inverse wavelet transform, look-file storage and the
//! optional lens-warp mesh live outside this crate; the decoder talks to them
//! through these traits.

use std::path::Path;

use crate::cube::CubeLut;
use crate::error::Result;

/// The inverse spatial wavelet stage.
///
/// `invert_strip` reconstructs the coefficient rows of one horizontal strip
/// into `out_rows`: `channels` consecutive runs of `width` i16 samples per
/// scanline, scanlines stacked in strip order. Called from pool workers, one
/// strip per work item; `thread_index` selects any per-thread state the
/// inverter keeps.
pub trait WaveletInverter: Send + Sync {
    /// Number of scanlines per strip
    fn strip_height(&self) -> usize;

    /// Reconstruct `strip` into `out_rows`
    fn invert_strip(&self, thread_index: usize, strip: usize, out_rows: &mut [i16]) -> Result<()>;
}

/// Loads a 3D look file into a cube lattice
pub trait LookFileLoader: Send + Sync {
    /// Load the look at `path`, or `None` when it does not exist
    fn load(&self, path: &Path) -> Option<CubeLut>;
}

/// Default loader: `.cube` text files from the filesystem
#[derive(Debug, Default)]
pub struct FsLookLoader;

impl LookFileLoader for FsLookLoader {
    fn load(&self, path: &Path) -> Option<CubeLut> {
        let text = std::fs::read_to_string(path).ok()?;
        match crate::cube::parse_cube_text(&text) {
            Ok(cube) => Some(cube),
            Err(e) => {
                log::warn!("ignoring unreadable look file {}: {e}", path.display());
                None
            }
        }
    }
}

/// Optional lens-warp mesh engine
pub trait GeomeshEngine: Send + Sync {
    /// Warp scanlines `y0..y1` from `src` into `dst` with bilinear sampling
    fn apply_bilinear(&self, y0: usize, y1: usize, src: &[u8], dst: &mut [u8]) -> Result<()>;

    /// Rebuild the cached mesh for the current frame geometry
    fn rebuild_cache(&self, chunk: usize) -> Result<()>;

    /// Vertical blur pass over warped output
    fn blur_vertical(&self, y0: usize, y1: usize, dst: &mut [u8]) -> Result<()>;
}
