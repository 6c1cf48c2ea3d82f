// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The render-thread entry point.

A [Backend] keeps one [GpuTexture] per [TextureDescription] and brings it up to date on
[Backend::sync_texture].  Textures released by drop are queued and destroyed on the next
[Backend::recycle], so a texture dropped on the transfer worker never destroys device
objects there.

```
use std::sync::Arc;
use texture_sync::{Backend, BackendConfig, HeadlessDevice, TextureDescription};
use texture_sync::description::TextureType;
use texture_sync::pixel_formats::TextureFormat;

let backend = Backend::new(
    Arc::new(HeadlessDevice::new()),
    BackendConfig::builder().transfer_on_worker(false).build(),
);
let description = TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 2, 2)
    .mip_range(0, 0)
    .build()
    .unwrap();
description.assign_stored_mip_face(0, 0, vec![1, 2, 3, 4]).unwrap();
let texture = backend.sync_texture(&description).unwrap();
assert!(texture.is_ready());
```
*/

use crate::config::BackendConfig;
use crate::description::TextureDescription;
use crate::error::Error;
use crate::imp::{GraphicsDevice, TextureHandle};
use crate::memory::MemoryAccounting;
use crate::sync_state::SyncState;
use crate::sys::lock;
use crate::texture::GpuTexture;
use crate::transfer::TextureTransferHelper;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Backend {
    //declared first so the worker stops before the registry drops
    transfer: Option<TextureTransferHelper>,
    device: Arc<dyn GraphicsDevice>,
    memory: Arc<MemoryAccounting>,
    config: BackendConfig,
    textures: Mutex<HashMap<u64, Arc<GpuTexture>>>,
    release_queue: Mutex<Vec<(TextureHandle, u64)>>,
}

impl Backend {
    pub fn new(device: Arc<dyn GraphicsDevice>, config: BackendConfig) -> Arc<Self> {
        let memory = Arc::new(MemoryAccounting::with_allowed_gpu_memory_usage(
            config.allowed_gpu_memory(),
        ));
        let transfer = if config.transfer_on_worker() {
            Some(TextureTransferHelper::new(config.worker_thread_name()))
        } else {
            None
        };
        logwise::info_sync!(
            "Texture backend on {device} (worker: {worker})",
            device = logwise::privacy::LogIt(&device),
            worker = logwise::privacy::LogIt(&transfer.is_some())
        );
        Arc::new(Backend {
            transfer,
            device,
            memory,
            config,
            textures: Mutex::new(HashMap::new()),
            release_queue: Mutex::new(Vec::new()),
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn memory(&self) -> &Arc<MemoryAccounting> {
        &self.memory
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn memory_pressure(&self) -> f32 {
        self.memory
            .memory_pressure(self.device.dedicated_memory())
    }

    /// The texture currently registered for `description`, if any.
    pub fn texture_for(&self, description: &TextureDescription) -> Option<Arc<GpuTexture>> {
        lock(&self.textures).get(&description.id()).cloned()
    }

    /// Unregisters the texture of `description`.  It is released once the last reference drops.
    pub fn forget_texture(&self, description: &TextureDescription) -> Option<Arc<GpuTexture>> {
        lock(&self.textures).remove(&description.id())
    }

    /**
    Brings the GPU texture of `description` up to date and returns it.

    * A missing or invalid texture is (re)created.
    * Outdated content is uploaded: on the transfer worker when the backend has one, otherwise
      right here.  Check [GpuTexture::is_ready] before sampling from it.
    * Every background upload that finished, for this texture or any other, gets its
      render-thread work done here too, so a caller that syncs every frame does not depend on
      [Self::process_transfers].
    */
    pub fn sync_texture(
        self: &Arc<Self>,
        description: &Arc<TextureDescription>,
    ) -> Result<Arc<GpuTexture>, Error> {
        //the completed list holds strong references until drained
        self.process_transfers();
        let (texture, replaced) = {
            let mut textures = lock(&self.textures);
            match textures.get(&description.id()) {
                Some(texture) if !texture.is_invalid() => (texture.clone(), None),
                _ => {
                    let texture = Arc::new(GpuTexture::new(
                        self,
                        description,
                        self.transfer.is_some(),
                    )?);
                    let replaced = textures.insert(description.id(), texture.clone());
                    (texture, replaced)
                }
            }
        };
        if let Some(replaced) = replaced {
            logwise::trace_sync!(
                "Replacing invalid texture {handle}",
                handle = replaced.handle().raw()
            );
        }

        match &self.transfer {
            Some(helper) if texture.is_transferrable() => match texture.sync_state() {
                SyncState::Transferred => {
                    //finished after the drain above; it is in the completed list by now
                    self.process_transfers();
                    texture.sync_sampler()?;
                }
                SyncState::Idle if texture.is_outdated() => {
                    //the waiter is only registered when polled
                    drop(helper.transfer_texture(texture.clone()));
                }
                SyncState::Idle => texture.sync_sampler()?,
                SyncState::Pending => {}
            },
            _ => {
                if texture.is_outdated() {
                    texture.transfer_synchronously()?;
                }
                texture.sync_sampler()?;
            }
        }
        Ok(texture)
    }

    /**
    Runs the render-thread half of every finished background transfer.

    Returns how many transfers were finalized.  Failures are logged; the affected texture is
    still returned to `Idle`.
    */
    pub fn process_transfers(&self) -> usize {
        let Some(helper) = &self.transfer else {
            return 0;
        };
        let mut finalized = 0;
        for texture in helper.take_completed() {
            match texture.complete_transfer() {
                Ok(true) => finalized += 1,
                Ok(false) => {}
                Err(err) => {
                    logwise::error_sync!(
                        "Finishing transfer of texture {handle} failed: {err}",
                        handle = texture.handle().raw(),
                        err = logwise::privacy::LogIt(&err)
                    );
                    finalized += 1;
                }
            }
        }
        if finalized > 0 {
            logwise::trace_sync!("Finalized {count} transfers", count = finalized);
        }
        finalized
    }

    /// Queues `handle` for destruction on the next [Self::recycle].
    pub fn release_texture(&self, handle: TextureHandle, size: u64) {
        lock(&self.release_queue).push((handle, size));
    }

    /// Destroys released textures and removes them from the accounting.
    pub fn recycle(&self) {
        let released = std::mem::take(&mut *lock(&self.release_queue));
        if released.is_empty() {
            return;
        }
        let mut bytes = 0;
        for (handle, size) in &released {
            self.device.destroy_texture(*handle);
            self.memory.update_texture_gpu_memory_usage(*size, 0);
            self.memory.decrement_texture_gpu_count();
            bytes += size;
        }
        logwise::info_sync!(
            "Recycled {count} textures ({bytes} bytes)",
            count = released.len(),
            bytes = bytes
        );
    }

    /**
    Drops registered textures nobody else uses.

    A texture is unused when the registry holds its only reference and it holds the only
    reference to its description.  Returns how many were dropped.
    */
    pub fn collect_unused(&self) -> usize {
        let unused: Vec<Arc<GpuTexture>> = {
            let mut textures = lock(&self.textures);
            let ids: Vec<u64> = textures
                .iter()
                .filter(|(_, texture)| {
                    Arc::strong_count(texture) == 1
                        && Arc::strong_count(texture.description()) == 1
                })
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| textures.remove(id)).collect()
        };
        let count = unused.len();
        drop(unused);
        count
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.recycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::TextureType;
    use crate::imp::HeadlessDevice;
    use crate::pixel_formats::TextureFormat;
    use crate::sampler::{Filter, SamplerDescription, WrapMode};

    fn synchronous() -> (Arc<HeadlessDevice>, Arc<Backend>) {
        let device = Arc::new(HeadlessDevice::new());
        let backend = Backend::new(
            device.clone(),
            BackendConfig::builder().transfer_on_worker(false).build(),
        );
        (device, backend)
    }

    #[test]
    fn sync_reuses_valid_texture() {
        let (_device, backend) = synchronous();
        let d = TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 2, 2)
            .build()
            .unwrap();
        let first = backend.sync_texture(&d).unwrap();
        let second = backend.sync_texture(&d).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.transfer_count(), 1);
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let (device, backend) = synchronous();
        let d = TextureDescription::builder(TextureType::Tex3D, TextureFormat::R8Unorm, 2, 2)
            .depth(2)
            .build()
            .unwrap();
        assert_eq!(
            backend.sync_texture(&d).unwrap_err(),
            Error::UnsupportedTextureType(TextureType::Tex3D)
        );
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn collect_unused_releases_orphans() {
        let (device, backend) = synchronous();
        let d = TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 2, 2)
            .build()
            .unwrap();
        backend.sync_texture(&d).unwrap();
        assert_eq!(backend.collect_unused(), 0);
        drop(d);
        assert_eq!(backend.collect_unused(), 1);
        backend.recycle();
        assert_eq!(device.live_textures(), 0);
        assert_eq!(backend.memory().texture_gpu_count(), 0);
    }

    #[test]
    fn sampler_changes_reach_the_device() {
        let (device, backend) = synchronous();
        let d = TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 1, 1)
            .build()
            .unwrap();
        let texture = backend.sync_texture(&d).unwrap();
        let sampler = SamplerDescription::with_filter(Filter::MinMagPoint)
            .with_wrap(WrapMode::Clamp);
        d.set_sampler(sampler);
        backend.sync_texture(&d).unwrap();
        assert_eq!(device.sampler(texture.handle()), Some(sampler));
    }
}
