// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu-backed device.

wgpu has no binding state for textures, so binding slots are emulated per thread to keep the
bind-to-edit rules identical across devices.  Cube maps are 2D textures with six array layers,
addressed by [FaceTarget::layer].

wgpu does not generate mips either.  The device retains the lowest allocated level of every
face as it is uploaded and builds the chain on the CPU in [GraphicsDevice::generate_mips].
*/

use crate::error::Error;
use crate::imp::{GraphicsDevice, StorageDescriptor, TextureHandle};
use crate::mips;
use crate::pixel_formats::TextureFormat;
use crate::sampler::{AddressMode, ComparisonFunction, FilterMode, SamplerDescription};
use crate::sys::lock;
use crate::target::{FaceTarget, TextureTarget};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;
use wgpu::{Extent3d, TexelCopyBufferLayout, TexelCopyTextureInfo};

impl TextureFormat {
    pub const fn wgpu_format(&self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::R32Sint => wgpu::TextureFormat::R32Sint,
            TextureFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
            TextureFormat::Rgba16Unorm => wgpu::TextureFormat::Rgba16Unorm,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }
}

const fn wgpu_filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

const fn wgpu_compare(function: ComparisonFunction) -> wgpu::CompareFunction {
    match function {
        ComparisonFunction::Never => wgpu::CompareFunction::Never,
        ComparisonFunction::Less => wgpu::CompareFunction::Less,
        ComparisonFunction::Equal => wgpu::CompareFunction::Equal,
        ComparisonFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        ComparisonFunction::Greater => wgpu::CompareFunction::Greater,
        ComparisonFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        ComparisonFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        ComparisonFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn wgpu_address(mode: AddressMode, clamp_to_border: bool) -> wgpu::AddressMode {
    match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::ClampToBorder if clamp_to_border => wgpu::AddressMode::ClampToBorder,
        AddressMode::ClampToBorder => wgpu::AddressMode::ClampToEdge,
        //no mirror-once in wgpu; agrees with mirror-once for coordinates in [-1,1]
        AddressMode::MirrorClampToEdge => wgpu::AddressMode::MirrorRepeat,
    }
}

fn wgpu_border_color(color: [f32; 4]) -> wgpu::SamplerBorderColor {
    if color == [0.0, 0.0, 0.0, 1.0] {
        wgpu::SamplerBorderColor::OpaqueBlack
    } else if color == [1.0, 1.0, 1.0, 1.0] {
        wgpu::SamplerBorderColor::OpaqueWhite
    } else {
        wgpu::SamplerBorderColor::TransparentBlack
    }
}

/// Copy of `data` when it is the level CPU mip generation will start from.
fn base_level_to_retain(descriptor: &StorageDescriptor, mip: u16, data: &[u8]) -> Option<Vec<u8>> {
    (descriptor.retain_base_level && mip == descriptor.min_mip).then(|| data.to_vec())
}

#[derive(Debug, Default)]
struct WgpuTexture {
    texture: Option<wgpu::Texture>,
    descriptor: Option<StorageDescriptor>,
    sampler: Option<wgpu::Sampler>,
    //lowest allocated level of each face, kept until mips are generated
    base_levels: Vec<Option<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u32,
    textures: HashMap<TextureHandle, WgpuTexture>,
    bindings: HashMap<(ThreadId, TextureTarget), TextureHandle>,
}

#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: Mutex<State>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuDevice {
            device,
            queue,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// The wgpu texture backing `handle`, once storage is allocated.
    pub fn texture(&self, handle: TextureHandle) -> Option<wgpu::Texture> {
        self.state()
            .textures
            .get(&handle)
            .and_then(|t| t.texture.clone())
    }

    pub fn sampler(&self, handle: TextureHandle) -> Option<wgpu::Sampler> {
        self.state()
            .textures
            .get(&handle)
            .and_then(|t| t.sampler.clone())
    }

    /// A view over the allocated mip range, as a cube for cube maps.
    pub fn view(&self, handle: TextureHandle) -> Option<wgpu::TextureView> {
        let state = self.state();
        let texture = state.textures.get(&handle)?;
        let descriptor = texture.descriptor.as_ref()?;
        let dimension = match descriptor.target {
            TextureTarget::Texture2D => wgpu::TextureViewDimension::D2,
            TextureTarget::CubeMap => wgpu::TextureViewDimension::Cube,
        };
        Some(
            texture
                .texture
                .as_ref()?
                .create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&descriptor.debug_name),
                    dimension: Some(dimension),
                    base_mip_level: descriptor.min_mip as u32,
                    mip_level_count: Some((descriptor.max_mip - descriptor.min_mip) as u32 + 1),
                    ..Default::default()
                }),
        )
    }

    fn bound_texture_mut<'s>(
        state: &'s mut State,
        handle: TextureHandle,
        target: Option<TextureTarget>,
    ) -> Result<&'s mut WgpuTexture, Error> {
        let thread = std::thread::current().id();
        let target = match target {
            Some(target) => target,
            None => state
                .textures
                .get(&handle)
                .ok_or(Error::UnknownHandle(handle))?
                .descriptor
                .as_ref()
                .ok_or(Error::NoStorage(handle))?
                .target,
        };
        if state.bindings.get(&(thread, target)) != Some(&handle) {
            return Err(Error::NotBound { handle, target });
        }
        state
            .textures
            .get_mut(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    fn write_level(
        &self,
        texture: &wgpu::Texture,
        descriptor: &StorageDescriptor,
        layer: u32,
        mip: u16,
        data: &[u8],
    ) {
        let (width, height) = descriptor.mip_dimensions(mip);
        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * descriptor.format.bytes_per_pixel() as u32),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_texture_handle(&self) -> Result<TextureHandle, Error> {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = TextureHandle(state.next_handle);
        state.textures.insert(handle, WgpuTexture::default());
        Ok(handle)
    }

    fn bound_texture(&self, target: TextureTarget) -> Option<TextureHandle> {
        let thread = std::thread::current().id();
        self.state().bindings.get(&(thread, target)).copied()
    }

    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>) {
        let thread = std::thread::current().id();
        let mut state = self.state();
        match handle {
            Some(handle) => {
                state.bindings.insert((thread, target), handle);
            }
            None => {
                state.bindings.remove(&(thread, target));
            }
        }
    }

    fn allocate_storage(
        &self,
        handle: TextureHandle,
        descriptor: &StorageDescriptor,
    ) -> Result<u64, Error> {
        let mut state = self.state();
        let entry = Self::bound_texture_mut(&mut state, handle, Some(descriptor.target))?;
        let layers = descriptor.num_faces() as u32;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&descriptor.debug_name),
            size: Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: layers,
            },
            //wgpu cannot leave levels below min_mip unallocated
            mip_level_count: descriptor.max_mip as u32 + 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.wgpu_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        if let Some(previous) = entry.texture.replace(texture) {
            previous.destroy();
        }
        entry.descriptor = Some(descriptor.clone());
        entry.base_levels = vec![None; layers as usize];
        let bytes: u64 = (0..=descriptor.max_mip)
            .map(|mip| descriptor.mip_face_size(mip) as u64)
            .sum();
        Ok(bytes * layers as u64)
    }

    fn upload_mip_face(
        &self,
        handle: TextureHandle,
        face: FaceTarget,
        mip: u16,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut state = self.state();
        let entry = Self::bound_texture_mut(&mut state, handle, Some(face.target()))?;
        let (Some(texture), Some(descriptor)) = (entry.texture.as_ref(), entry.descriptor.as_ref())
        else {
            return Err(Error::NoStorage(handle));
        };
        let layer = face.layer();
        if mip < descriptor.min_mip || mip > descriptor.max_mip || layer >= descriptor.num_faces() as u32 {
            return Err(Error::InvalidMipFace {
                mip,
                face: layer as u8,
            });
        }
        let expected = descriptor.mip_face_size(mip);
        if data.len() != expected {
            return Err(Error::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        self.write_level(texture, descriptor, layer, mip, data);
        if let Some(base) = base_level_to_retain(descriptor, mip, data) {
            entry.base_levels[layer as usize] = Some(base);
        }
        Ok(())
    }

    fn apply_sampler(
        &self,
        handle: TextureHandle,
        sampler: &SamplerDescription,
    ) -> Result<(), Error> {
        let mut state = self.state();
        let entry = Self::bound_texture_mut(&mut state, handle, None)?;
        let clamp_to_border = self
            .device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let [u, v, w] = sampler.address_modes();
        let pair = sampler.filter_pair();
        let uses_border = clamp_to_border && sampler.address_modes().contains(&AddressMode::ClampToBorder);
        if sampler.mip_offset != 0.0 {
            //no LOD bias in wgpu samplers
            logwise::warn_sync!(
                "Ignoring mip offset {offset} on texture {handle}",
                offset = logwise::privacy::LogIt(&sampler.mip_offset),
                handle = handle.raw()
            );
        }
        //non-mip filters sample the base level only
        let lod_max_clamp = match pair.mipmap {
            Some(_) => sampler.max_lod.max(sampler.min_lod),
            None => sampler.min_lod,
        };
        let label = entry
            .descriptor
            .as_ref()
            .map(|d| format!("{}_sampler", d.debug_name));
        let descriptor = wgpu::SamplerDescriptor {
            label: label.as_deref(),
            address_mode_u: wgpu_address(u, clamp_to_border),
            address_mode_v: wgpu_address(v, clamp_to_border),
            address_mode_w: wgpu_address(w, clamp_to_border),
            mag_filter: wgpu_filter(pair.mag),
            min_filter: wgpu_filter(pair.min),
            mipmap_filter: wgpu_filter(pair.mipmap.unwrap_or(FilterMode::Nearest)),
            lod_min_clamp: sampler.min_lod,
            lod_max_clamp,
            compare: sampler.comparison.map(wgpu_compare),
            anisotropy_clamp: sampler.effective_anisotropy() as u16,
            border_color: uses_border.then(|| wgpu_border_color(sampler.border_color)),
        };
        entry.sampler = Some(self.device.create_sampler(&descriptor));
        Ok(())
    }

    fn generate_mips(&self, handle: TextureHandle) -> Result<(), Error> {
        let mut state = self.state();
        let entry = Self::bound_texture_mut(&mut state, handle, None)?;
        let (Some(texture), Some(descriptor)) = (entry.texture.as_ref(), entry.descriptor.as_ref())
        else {
            return Err(Error::NoStorage(handle));
        };
        if !descriptor.format.supports_box_filter() {
            return Err(Error::MipGenerationUnsupported(descriptor.format));
        }
        let (width, height) = descriptor.mip_dimensions(descriptor.min_mip);
        let levels = descriptor.max_mip - descriptor.min_mip;
        //generation consumes the retained levels
        let layers = entry.base_levels.len();
        let base_levels = std::mem::replace(&mut entry.base_levels, vec![None; layers]);
        for (layer, base) in base_levels.into_iter().enumerate() {
            let Some(base) = base else {
                continue;
            };
            let chain = mips::build_chain(
                &base,
                width,
                height,
                descriptor.format.bytes_per_pixel(),
                levels,
            );
            for (offset, level) in chain.iter().enumerate() {
                let mip = descriptor.min_mip + 1 + offset as u16;
                self.write_level(texture, descriptor, layer as u32, mip, level);
            }
        }
        Ok(())
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = self.state();
        if let Some(entry) = state.textures.remove(&handle) {
            if let Some(texture) = entry.texture {
                texture.destroy();
            }
        }
        state.bindings.retain(|_, bound| *bound != handle);
    }

    fn dedicated_memory(&self) -> u64 {
        //not exposed by wgpu
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_level_retained_only_for_generated_mips() {
        let mut descriptor = StorageDescriptor {
            target: TextureTarget::Texture2D,
            format: TextureFormat::R8Unorm,
            width: 2,
            height: 2,
            min_mip: 0,
            max_mip: 1,
            retain_base_level: false,
            debug_name: "retain".to_string(),
        };
        assert_eq!(base_level_to_retain(&descriptor, 0, &[1, 2, 3, 4]), None);
        descriptor.retain_base_level = true;
        assert_eq!(
            base_level_to_retain(&descriptor, 0, &[1, 2, 3, 4]),
            Some(vec![1, 2, 3, 4])
        );
        assert_eq!(base_level_to_retain(&descriptor, 1, &[9]), None);
    }

    #[test]
    fn address_fallbacks() {
        assert_eq!(
            wgpu_address(AddressMode::ClampToBorder, false),
            wgpu::AddressMode::ClampToEdge
        );
        assert_eq!(
            wgpu_address(AddressMode::ClampToBorder, true),
            wgpu::AddressMode::ClampToBorder
        );
        assert_eq!(
            wgpu_address(AddressMode::MirrorClampToEdge, false),
            wgpu::AddressMode::MirrorRepeat
        );
    }

    #[test]
    fn border_colors() {
        assert_eq!(
            wgpu_border_color([1.0, 1.0, 1.0, 1.0]),
            wgpu::SamplerBorderColor::OpaqueWhite
        );
        assert_eq!(
            wgpu_border_color([0.2, 0.0, 0.0, 1.0]),
            wgpu::SamplerBorderColor::TransparentBlack
        );
    }

    #[test]
    fn formats_agree_on_size() {
        for format in [
            TextureFormat::R8Unorm,
            TextureFormat::Rg8Unorm,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::R32Float,
            TextureFormat::Rgba32Float,
        ] {
            assert_eq!(
                format.wgpu_format().block_copy_size(None),
                Some(format.bytes_per_pixel() as u32),
                "{format:?}"
            );
        }
    }
}
