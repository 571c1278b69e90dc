//! GPU texture ownership for the two presentation slots.
//!
//! The manager is the only owner of texture handles. Handles release their
//! GPU resource on drop, so replacing or clearing a slot's source is enough
//! to guarantee release on every path.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::ResourceError;
use crate::events::Side;
use crate::processing::normalize::{DesignImage, NormalizedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampling metadata applied to every design texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSettings {
    pub color_space: ColorSpace,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub max_anisotropy: u16,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            max_anisotropy: 16,
        }
    }
}

/// Creates GPU resources for design images. Dropping a handle must release it.
pub trait TextureBackend {
    type Handle;

    fn create(
        &mut self,
        image: &NormalizedImage,
        settings: &TextureSettings,
    ) -> Result<Self::Handle, ResourceError>;
}

struct Bound<H> {
    source: DesignImage,
    handle: H,
}

pub struct TextureManager<B: TextureBackend> {
    backend: B,
    settings: TextureSettings,
    slots: [Option<Bound<B::Handle>>; 2],
    /// Source whose creation last failed, per side; not retried until it changes.
    failed: [Option<DesignImage>; 2],
}

impl<B: TextureBackend> TextureManager<B> {
    pub fn new(backend: B, settings: TextureSettings) -> Self {
        Self {
            backend,
            settings,
            slots: [None, None],
            failed: [None, None],
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Makes `source` the slot's texture. Binding the image that is already
    /// bound keeps the existing handle. `None` or a creation failure leaves
    /// the slot presenting nothing; a failed source is not retried until the
    /// slot is given a different one.
    pub fn bind(&mut self, side: Side, source: Option<&DesignImage>) -> Option<&B::Handle> {
        let idx = side.index();
        let Some(source) = source else {
            self.failed[idx] = None;
            if self.slots[idx].take().is_some() {
                debug!(%side, "released design texture");
            }
            return None;
        };

        let unchanged = self.slots[idx]
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(&bound.source, source));
        let known_bad = self.failed[idx]
            .as_ref()
            .is_some_and(|failed| Arc::ptr_eq(failed, source));
        if !unchanged && !known_bad {
            match self.backend.create(source, &self.settings) {
                Ok(handle) => {
                    self.failed[idx] = None;
                    // The old handle drops here, after its replacement exists.
                    self.slots[idx] = Some(Bound {
                        source: Arc::clone(source),
                        handle,
                    });
                    debug!(
                        %side,
                        name = source.name(),
                        width = source.width(),
                        height = source.height(),
                        "bound design texture"
                    );
                }
                Err(err) => {
                    warn!(%side, name = source.name(), error = %err, "design texture unavailable");
                    self.slots[idx] = None;
                    self.failed[idx] = Some(Arc::clone(source));
                }
            }
        }
        self.handle(side)
    }

    pub fn handle(&self, side: Side) -> Option<&B::Handle> {
        self.slots[side.index()].as_ref().map(|bound| &bound.handle)
    }

    /// The image the slot's texture was created from.
    pub fn source(&self, side: Side) -> Option<&DesignImage> {
        self.slots[side.index()].as_ref().map(|bound| &bound.source)
    }

    pub fn release_all(&mut self) {
        self.slots = [None, None];
        self.failed = [None, None];
    }
}

/// A design texture resident on a wgpu device.
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

pub struct WgpuTextureBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuTextureBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Acquires a device without a presentation surface.
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("garment-preview-device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;
        info!(adapter = ?adapter.get_info().name, "gpu device ready");
        Ok(Self::new(device, queue))
    }
}

impl TextureBackend for WgpuTextureBackend {
    type Handle = GpuTexture;

    fn create(
        &mut self,
        image: &NormalizedImage,
        settings: &TextureSettings,
    ) -> Result<GpuTexture, ResourceError> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(ResourceError::EmptyImage);
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if w > limit || h > limit {
            return Err(ResourceError::TooLarge {
                width: w,
                height: h,
                limit,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let size = wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("design"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(settings.color_space),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            image.pixels().as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(h),
            },
            size,
        );
        let sampler = self.device.create_sampler(&sampler_descriptor(settings));
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            texture.destroy();
            return Err(ResourceError::Gpu(err.to_string()));
        }

        Ok(GpuTexture {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            sampler,
        })
    }
}

fn texture_format(color_space: ColorSpace) -> wgpu::TextureFormat {
    match color_space {
        ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn sampler_descriptor(settings: &TextureSettings) -> wgpu::SamplerDescriptor<'static> {
    // wgpu only accepts anisotropy with all-linear filtering.
    let all_linear = settings.min_filter == Filter::Linear && settings.mag_filter == Filter::Linear;
    let anisotropy_clamp = if all_linear {
        settings.max_anisotropy.clamp(1, 16)
    } else {
        1
    };
    wgpu::SamplerDescriptor {
        label: Some("design-sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(settings.mag_filter),
        min_filter: filter_mode(settings.min_filter),
        mipmap_filter: if all_linear {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        },
        anisotropy_clamp,
        ..Default::default()
    }
}
