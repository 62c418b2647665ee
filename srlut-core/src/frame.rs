//! # Video Frames
//!
//! The frame model shared by the upscaler and its callers: dimensions plus
//! a three-plane (Y/U/V) buffer that is either GPU resident or CPU
//! resident. Filters only ever process GPU-resident frames; a CPU buffer is
//! carried so rejected frames can round-trip a pipeline untouched.

use std::sync::Arc;

/// Where a frame's pixel data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Planes are GPU textures, processable by the kernel.
    Native,
    /// Planes are CPU byte buffers.
    Cpu,
}

/// GPU-resident planes. A plane handle is `None` until the producer
/// attaches it.
#[derive(Debug, Clone, Default)]
pub struct NativeBuffer {
    pub y: Option<Arc<wgpu::Texture>>,
    pub u: Option<Arc<wgpu::Texture>>,
    pub v: Option<Arc<wgpu::Texture>>,
}

/// CPU-resident planes.
#[derive(Debug, Clone, Default)]
pub struct CpuBuffer {
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

/// Plane storage of one frame.
#[derive(Debug, Clone)]
pub enum FrameBuffer {
    Native(NativeBuffer),
    Cpu(CpuBuffer),
}

/// One video frame.
///
/// Owned by the caller. A filter reads the luma plane and, on success,
/// writes a new luma handle and the upscaled dimensions back in place.
/// Chroma handles are never touched.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    buffer: FrameBuffer,
}

impl VideoFrame {
    /// Frame backed by GPU textures.
    pub fn native(width: u32, height: u32, buffer: NativeBuffer) -> Self {
        Self {
            width,
            height,
            buffer: FrameBuffer::Native(buffer),
        }
    }

    /// Frame backed by CPU plane buffers.
    pub fn cpu(width: u32, height: u32, buffer: CpuBuffer) -> Self {
        Self {
            width,
            height,
            buffer: FrameBuffer::Cpu(buffer),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn residency(&self) -> Residency {
        match self.buffer {
            FrameBuffer::Native(_) => Residency::Native,
            FrameBuffer::Cpu(_) => Residency::Cpu,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// GPU plane handles, if this frame is GPU resident.
    pub fn native_buffer(&self) -> Option<&NativeBuffer> {
        match &self.buffer {
            FrameBuffer::Native(native) => Some(native),
            FrameBuffer::Cpu(_) => None,
        }
    }

    /// The luma texture handle, if present.
    pub fn native_luma(&self) -> Option<&Arc<wgpu::Texture>> {
        self.native_buffer().and_then(|native| native.y.as_ref())
    }

    /// Replace the luma handle and reported dimensions in place.
    ///
    /// Chroma handles are left as they are. No effect on CPU frames; the
    /// admission gate rejects those before any filter reaches this point.
    pub(crate) fn splice_luma(&mut self, luma: Arc<wgpu::Texture>, width: u32, height: u32) {
        if let FrameBuffer::Native(native) = &mut self.buffer {
            native.y = Some(luma);
            self.width = width;
            self.height = height;
        }
    }
}
