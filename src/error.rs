//! Error types for zenwave

use enough::StopReason;

use crate::frame::PixelFormat;

/// Error type for zenwave decoding operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Output format cannot be produced at the requested resolution
    #[error("unsupported output: {format:?} at {width}x{height}")]
    UnsupportedOutput {
        /// Requested output format
        format: PixelFormat,
        /// Frame width
        width: usize,
        /// Frame height
        height: usize,
    },

    /// A wavelet band row was shorter than the frame descriptor requires
    #[error("short coefficient buffer: channel {channel} has {got} samples, need {need}")]
    ShortRow {
        /// Channel index
        channel: usize,
        /// Samples present
        got: usize,
        /// Samples required
        need: usize,
    },

    /// Output buffer too small for the frame at the given pitch
    #[error("output buffer too small: {got} bytes, need {need}")]
    ShortOutput {
        /// Bytes present
        got: usize,
        /// Bytes required
        need: usize,
    },

    /// Look file could not be parsed
    #[error("look file error: {0}")]
    LookFile(&'static str),

    /// A worker thread failed; the frame was aborted
    #[error("worker failure: {0}")]
    Worker(&'static str),

    /// Configuration value outside its legal range
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// Operation was cancelled via Stop trait
    #[error("operation cancelled: {0:?}")]
    Cancelled(StopReason),
}

impl From<StopReason> for Error {
    fn from(reason: StopReason) -> Self {
        Error::Cancelled(reason)
    }
}

/// Result type for zenwave operations with location tracking
pub type Result<T, E = whereat::At<Error>> = core::result::Result<T, E>;
