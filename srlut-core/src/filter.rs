//! # Filter Trait
//!
//! The seam between a video pipeline and its per-frame filters. A filter
//! never takes a frame away from the caller: `process` works in place and
//! reports through [`Outcome`] whether the frame was enhanced or passed
//! through, and why. Rejections and resource failures are data here, not
//! panics; the worst effect of any failure is one frame skipping
//! enhancement.

use crate::context::ContextError;
use crate::frame::VideoFrame;
use thiserror::Error;

/// Why a frame passed through unenhanced.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Input resolution outside the supported set. Not a fault; resolution
    /// can change call to call.
    #[error("unsupported frame shape {width}x{height}")]
    ShapeRejected { width: u32, height: u32 },

    /// Input planes are not GPU resident.
    #[error("frame buffer is not GPU resident")]
    ResidencyRejected,

    /// Context binding or one-time resource setup failed. The filter stays
    /// uninitialized and retries on the next frame.
    #[error("gpu resource initialization failed: {0}")]
    ResourceInit(#[from] ContextError),

    /// A required plane handle is absent.
    #[error("source luma handle is missing")]
    InvalidSourceHandle,
}

/// Result of processing one frame.
#[derive(Debug)]
pub enum Outcome {
    /// The frame was upscaled in place.
    Enhanced,
    /// The frame is untouched; the reason rode along.
    Passthrough(FilterError),
}

impl Outcome {
    pub fn is_enhanced(&self) -> bool {
        matches!(self, Outcome::Enhanced)
    }
}

/// A per-frame video filter.
pub trait VideoFilter {
    /// Stable name for logs and pipeline listings.
    fn name(&self) -> &str;

    /// Pure admission predicate: no side effects, no GPU work. Evaluated
    /// every frame.
    fn accepts(&self, frame: &VideoFrame) -> bool;

    /// Process one frame in place.
    fn process(&mut self, frame: &mut VideoFrame) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reports_enhancement() {
        assert!(Outcome::Enhanced.is_enhanced());
        let skipped = Outcome::Passthrough(FilterError::ResidencyRejected);
        assert!(!skipped.is_enhanced());
    }

    #[test]
    fn errors_render_readable_messages() {
        let shape = FilterError::ShapeRejected {
            width: 641,
            height: 360,
        };
        assert_eq!(shape.to_string(), "unsupported frame shape 641x360");
        assert_eq!(
            FilterError::InvalidSourceHandle.to_string(),
            "source luma handle is missing"
        );
    }
}
