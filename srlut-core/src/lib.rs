//! # SRLUT Core
//!
//! Realtime 2x luma upscaling for live video pipelines, driven by a
//! pre-trained lookup table instead of a runtime network:
//! - **LUT atlas**: 289x289 RGBA table holding quantized kernel deltas
//! - **GPU kernel**: wgpu compute pass, one thread per destination pixel
//! - **CPU reference**: byte-exact mirror of the kernel for tests and
//!   machines without an adapter
//! - **Filter surface**: passthrough on any failure, built for call
//!   pipelines where a dropped enhancement must never drop the frame
//!
//! ## Quick Start
//!
//! ```no_run
//! use srlut_core::{LutUpscaler, VideoFilter};
//!
//! let mut filter = LutUpscaler::new();
//! // frames arrive from the capture pipeline
//! # let mut frame = srlut_core::VideoFrame::cpu(640, 360, Default::default());
//! let outcome = filter.process(&mut frame);
//! assert!(outcome.is_enhanced() || frame.width() == 640);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod filter;
pub mod frame;
pub mod lut;
pub mod reference;
pub mod upscaler;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{ContextError, ContextProvider, GlobalProvider, GpuContext, StaticProvider};
pub use filter::{FilterError, Outcome, VideoFilter};
pub use frame::{CpuBuffer, FrameBuffer, NativeBuffer, Residency, VideoFrame};
pub use lut::{LutError, LutTable};
pub use upscaler::{LifecycleState, LutUpscaler, UpscalerStats, SUPPORTED_SHAPES};

/// Crate version, from Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed upscale ratio of the kernel.
pub const SCALE_FACTOR: u32 = 2;
