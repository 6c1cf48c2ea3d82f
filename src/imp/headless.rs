// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A device that keeps texture storage in memory.

It enforces the same rules a GL driver would (bind before edit, exact upload sizes, storage
before upload) and exposes what it holds, which makes it the device of choice for tests and
for tools that run without a GPU.
*/

use crate::error::Error;
use crate::imp::{GraphicsDevice, StorageDescriptor, TextureHandle};
use crate::mips;
use crate::sampler::SamplerDescription;
use crate::sys::lock;
use crate::target::{FaceTarget, TextureTarget};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;

#[derive(Debug)]
struct Storage {
    descriptor: StorageDescriptor,
    //[face][mip - min_mip]
    levels: Vec<Vec<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct HeadlessTexture {
    storage: Option<Storage>,
    sampler: Option<SamplerDescription>,
    mip_generations: u32,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u32,
    textures: HashMap<TextureHandle, HeadlessTexture>,
    bindings: HashMap<(ThreadId, TextureTarget), TextureHandle>,
    uploads: u64,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Mutex<State>,
    dedicated_memory: u64,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that reports `bytes` of dedicated memory.
    pub fn with_dedicated_memory(bytes: u64) -> Self {
        HeadlessDevice {
            state: Mutex::new(State::default()),
            dedicated_memory: bytes,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Number of live texture names.
    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    /// Total successful [GraphicsDevice::upload_mip_face] calls.
    pub fn upload_count(&self) -> u64 {
        self.state().uploads
    }

    /// Bytes held by the storage of `handle`.
    pub fn allocated_bytes(&self, handle: TextureHandle) -> Option<u64> {
        self.state()
            .textures
            .get(&handle)
            .and_then(|t| t.storage.as_ref())
            .map(|s| s.levels.iter().flatten().map(|l| l.len() as u64).sum())
    }

    /// Pixels of one level; `face` indexes [TextureTarget::face_targets].
    pub fn level_data(&self, handle: TextureHandle, face: u8, mip: u16) -> Option<Vec<u8>> {
        let state = self.state();
        let storage = state.textures.get(&handle)?.storage.as_ref()?;
        let level = mip.checked_sub(storage.descriptor.min_mip)?;
        storage
            .levels
            .get(face as usize)?
            .get(level as usize)
            .cloned()
    }

    pub fn sampler(&self, handle: TextureHandle) -> Option<SamplerDescription> {
        self.state().textures.get(&handle).and_then(|t| t.sampler)
    }

    pub fn mip_generations(&self, handle: TextureHandle) -> u32 {
        self.state()
            .textures
            .get(&handle)
            .map(|t| t.mip_generations)
            .unwrap_or(0)
    }

    fn bound_texture_mut<'s>(
        state: &'s mut State,
        handle: TextureHandle,
        target: Option<TextureTarget>,
    ) -> Result<&'s mut HeadlessTexture, Error> {
        let thread = std::thread::current().id();
        let target = match target {
            Some(target) => target,
            None => state
                .textures
                .get(&handle)
                .ok_or(Error::UnknownHandle(handle))?
                .storage
                .as_ref()
                .ok_or(Error::NoStorage(handle))?
                .descriptor
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
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture_handle(&self) -> Result<TextureHandle, Error> {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = TextureHandle(state.next_handle);
        state.textures.insert(handle, HeadlessTexture::default());
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
        let texture = Self::bound_texture_mut(&mut state, handle, Some(descriptor.target))?;
        let levels: Vec<Vec<Vec<u8>>> = (0..descriptor.num_faces())
            .map(|_| {
                (descriptor.min_mip..=descriptor.max_mip)
                    .map(|mip| vec![0u8; descriptor.mip_face_size(mip)])
                    .collect()
            })
            .collect();
        let bytes = levels.iter().flatten().map(|l| l.len() as u64).sum();
        texture.storage = Some(Storage {
            descriptor: descriptor.clone(),
            levels,
        });
        Ok(bytes)
    }

    fn upload_mip_face(
        &self,
        handle: TextureHandle,
        face: FaceTarget,
        mip: u16,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut state = self.state();
        let texture = Self::bound_texture_mut(&mut state, handle, Some(face.target()))?;
        let storage = texture.storage.as_mut().ok_or(Error::NoStorage(handle))?;
        let invalid = Error::InvalidMipFace {
            mip,
            face: face.layer() as u8,
        };
        let level = mip
            .checked_sub(storage.descriptor.min_mip)
            .ok_or(invalid.clone())?;
        let slot = storage
            .levels
            .get_mut(face.layer() as usize)
            .and_then(|mips| mips.get_mut(level as usize))
            .ok_or(invalid)?;
        if slot.len() != data.len() {
            return Err(Error::DataLengthMismatch {
                expected: slot.len(),
                actual: data.len(),
            });
        }
        slot.copy_from_slice(data);
        state.uploads += 1;
        Ok(())
    }

    fn apply_sampler(
        &self,
        handle: TextureHandle,
        sampler: &SamplerDescription,
    ) -> Result<(), Error> {
        let mut state = self.state();
        let texture = Self::bound_texture_mut(&mut state, handle, None)?;
        texture.sampler = Some(*sampler);
        Ok(())
    }

    fn generate_mips(&self, handle: TextureHandle) -> Result<(), Error> {
        let mut state = self.state();
        let texture = Self::bound_texture_mut(&mut state, handle, None)?;
        let storage = texture.storage.as_mut().ok_or(Error::NoStorage(handle))?;
        let descriptor = &storage.descriptor;
        if !descriptor.format.supports_box_filter() {
            return Err(Error::MipGenerationUnsupported(descriptor.format));
        }
        let (width, height) = descriptor.mip_dimensions(descriptor.min_mip);
        let bytes_per_pixel = descriptor.format.bytes_per_pixel();
        let levels = descriptor.max_mip - descriptor.min_mip;
        for face in storage.levels.iter_mut() {
            let chain = mips::build_chain(&face[0], width, height, bytes_per_pixel, levels);
            for (slot, generated) in face.iter_mut().skip(1).zip(chain) {
                *slot = generated;
            }
        }
        texture.mip_generations += 1;
        Ok(())
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = self.state();
        state.textures.remove(&handle);
        state.bindings.retain(|_, bound| *bound != handle);
    }

    fn dedicated_memory(&self) -> u64 {
        self.dedicated_memory
    }
}
