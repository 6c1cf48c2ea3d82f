// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The graphics device seam.
//!
//! [GraphicsDevice] is the narrow slice of a native graphics API the texture wrapper needs.
//! Calls follow bind-to-edit rules: storage, upload, sampler and mip calls expect the texture
//! to be bound to its target on the calling thread (see
//! [crate::texture::GpuTexture::with_preserved_texture]).  Binding slots are per thread, the
//! way each thread of a GL application owns its own context.

use crate::error::Error;
use crate::pixel_formats::TextureFormat;
use crate::sampler::SamplerDescription;
use crate::target::{FaceTarget, TextureTarget};
use std::fmt::{Debug, Display};

mod headless;
#[cfg(feature = "backend_wgpu")]
mod wgpu;

pub use self::headless::HeadlessDevice;
#[cfg(feature = "backend_wgpu")]
pub use self::wgpu::WgpuDevice;

/// Native texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Display for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything a device needs to allocate storage for a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub target: TextureTarget,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub min_mip: u16,
    pub max_mip: u16,
    /// Mips will be generated from the lowest level, so a device that builds them on the CPU
    /// should keep that level's pixels until then.
    pub retain_base_level: bool,
    pub debug_name: String,
}

impl StorageDescriptor {
    pub fn mip_dimensions(&self, mip: u16) -> (u32, u32) {
        let shrink = |v: u32| (v >> mip.min(31)).max(1);
        (shrink(self.width), shrink(self.height))
    }

    pub fn mip_face_size(&self, mip: u16) -> usize {
        let (w, h) = self.mip_dimensions(mip);
        w as usize * h as usize * self.format.bytes_per_pixel()
    }

    pub fn num_faces(&self) -> u8 {
        self.target.num_faces()
    }
}

pub trait GraphicsDevice: Send + Sync + Debug {
    fn create_texture_handle(&self) -> Result<TextureHandle, Error>;

    /// Texture currently bound to `target` on the calling thread.
    fn bound_texture(&self, target: TextureTarget) -> Option<TextureHandle>;

    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>);

    /// Allocates every face and mip of `descriptor`, returning the bytes allocated.
    fn allocate_storage(
        &self,
        handle: TextureHandle,
        descriptor: &StorageDescriptor,
    ) -> Result<u64, Error>;

    fn upload_mip_face(
        &self,
        handle: TextureHandle,
        face: FaceTarget,
        mip: u16,
        data: &[u8],
    ) -> Result<(), Error>;

    fn apply_sampler(
        &self,
        handle: TextureHandle,
        sampler: &SamplerDescription,
    ) -> Result<(), Error>;

    /// Fills levels above the lowest allocated one from the lowest allocated one.
    fn generate_mips(&self, handle: TextureHandle) -> Result<(), Error>;

    fn destroy_texture(&self, handle: TextureHandle);

    /// Dedicated video memory in bytes, or 0 when the device cannot tell.
    fn dedicated_memory(&self) -> u64;
}
