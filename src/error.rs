// ============================================================================
// ERRORS — failure taxonomy for the stroke compositor
// ============================================================================

use std::path::PathBuf;

pub type PainterResult<T> = Result<T, PainterError>;

#[derive(thiserror::Error, Debug)]
pub enum PainterError {
    /// Target allocation failed (device limit or driver out-of-memory).
    /// The operation is aborted; previously committed state is untouched.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Zero-sized target requested. Rejected before any GPU call.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A GPU program failed validation at startup. Not retried.
    #[error("program compile failure in {program}: {message}")]
    ProgramCompileFailure { program: &'static str, message: String },

    #[error("no gpu adapter available")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(String),

    /// A target id that was never created or has already been destroyed.
    #[error("unknown render target #{0}")]
    UnknownTarget(u32),

    #[error("dimension mismatch: {src_w}x{src_h} vs {dst_w}x{dst_h}")]
    DimensionMismatch {
        src_w: u32,
        src_h: u32,
        dst_w: u32,
        dst_h: u32,
    },

    #[error("readback failed: {0}")]
    Readback(String),

    #[error("config error in {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PainterError {
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    pub fn readback(msg: impl Into<String>) -> Self {
        Self::Readback(msg.into())
    }

    pub fn compile(program: &'static str, msg: impl Into<String>) -> Self {
        Self::ProgramCompileFailure {
            program,
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            PainterError::exhausted("x")
                .to_string()
                .starts_with("resource exhausted:")
        );
        assert!(
            PainterError::compile("brush", "bad entry point")
                .to_string()
                .contains("brush")
        );
        assert_eq!(
            PainterError::InvalidDimensions {
                width: 0,
                height: 7
            }
            .to_string(),
            "invalid dimensions 0x7"
        );
    }

    #[test]
    fn io_preserves_source() {
        let err: PainterError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
