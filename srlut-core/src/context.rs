//! # GPU Context
//!
//! Context acquisition and plane transfer for the upscaler.
//!
//! The filter never owns context creation policy: it asks a
//! [`ContextProvider`] for the current context at the top of every
//! processing call. The crate ships two providers: [`GlobalProvider`]
//! (process-wide lazily created context, the default) and
//! [`StaticProvider`] (a context the embedder created and wants pinned).

use once_cell::sync::OnceCell;
use std::sync::Arc;
use thiserror::Error;

/// Errors acquiring a context or moving plane data across it.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("plane readback failed")]
    Readback,
}

/// A ready GPU execution context: one device and its submission queue.
#[derive(Debug)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Create a fresh context on the best available adapter.
    pub async fn create() -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ContextError::NoAdapter)?;

        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("srlut"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        tracing::info!(
            "GPU context ready: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Blocking wrapper around [`GpuContext::create`].
    pub fn create_blocking() -> Result<Self, ContextError> {
        pollster::block_on(Self::create())
    }

    /// The process-wide shared context, created on first use.
    ///
    /// A failed attempt leaves the slot empty, so the next call retries
    /// from scratch.
    pub fn global() -> Result<Arc<GpuContext>, ContextError> {
        static GLOBAL: OnceCell<Arc<GpuContext>> = OnceCell::new();
        GLOBAL
            .get_or_try_init(|| Self::create_blocking().map(Arc::new))
            .cloned()
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Upload a single-channel plane into a new `R8Unorm` texture.
    pub fn upload_plane(&self, data: &[u8], width: u32, height: u32) -> Arc<wgpu::Texture> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("plane"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Arc::new(texture)
    }

    /// Read the luma channel back from an `Rgba8Unorm` texture.
    ///
    /// Copy rows must be 256-byte aligned, so the staging buffer is padded
    /// and compacted after mapping.
    pub fn download_luma(
        &self,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ContextError> {
        let padded = padded_bytes_per_row(width);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("luma_readback"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            _ => return Err(ContextError::Readback),
        }

        let data = slice.get_mapped_range();
        let mut luma = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            let start = (row * padded) as usize;
            for col in 0..width {
                luma.push(data[start + (col * 4) as usize]);
            }
        }
        drop(data);
        staging.unmap();

        Ok(luma)
    }
}

/// Row stride for copying a `width`-texel RGBA texture into a buffer,
/// rounded up to the copy alignment.
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

/// Source of the current GPU execution context.
///
/// Acquisition happens once per processed frame; providers must hand back
/// the same underlying context across calls for the lifetime of a filter,
/// since compiled pipelines and uploaded tables are tied to its device.
pub trait ContextProvider: Send + Sync {
    fn acquire(&self) -> Result<Arc<GpuContext>, ContextError>;
}

/// Provider backed by [`GpuContext::global`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalProvider;

impl ContextProvider for GlobalProvider {
    fn acquire(&self) -> Result<Arc<GpuContext>, ContextError> {
        GpuContext::global()
    }
}

/// Provider pinned to one externally created context.
pub struct StaticProvider {
    context: Arc<GpuContext>,
}

impl StaticProvider {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self { context }
    }
}

impl ContextProvider for StaticProvider {
    fn acquire(&self) -> Result<Arc<GpuContext>, ContextError> {
        Ok(self.context.clone())
    }
}

/// Shared context for GPU tests; `None` skips the test on machines without
/// an adapter.
#[cfg(test)]
pub(crate) fn test_context() -> Option<Arc<GpuContext>> {
    match GpuContext::global() {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_is_shared() {
        let Some(first) = test_context() else {
            return;
        };
        let second = GpuContext::global().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn static_provider_pins_its_context() {
        let Some(context) = test_context() else {
            return;
        };
        let provider = StaticProvider::new(context.clone());
        let acquired = provider.acquire().unwrap();
        assert!(Arc::ptr_eq(&context, &acquired));
    }

    #[test]
    fn readback_rows_are_copy_aligned() {
        // 1280 RGBA texels are already aligned, 720 are not.
        assert_eq!(padded_bytes_per_row(1280), 5120);
        assert_eq!(padded_bytes_per_row(720), 3072);
        for width in [1u32, 63, 64, 65, 360, 640, 719] {
            let padded = padded_bytes_per_row(width);
            assert_eq!(padded % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
            assert!(padded >= 4 * width);
        }
    }
}
