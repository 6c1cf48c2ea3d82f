// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU-side mirror of a [TextureDescription].

A [GpuTexture] owns one native texture handle.  It remembers which version of its description
it reflects:

* the *storage stamp* is the description's [TextureDescription::stamp] at creation.  Storage
  never changes shape, so a newer description stamp makes the texture [GpuTexture::is_invalid]
  and the backend replaces it.
* the *content stamp* is the [TextureDescription::data_stamp] of the last upload.  A newer data
  stamp makes the texture [GpuTexture::is_outdated], which schedules another transfer.

# Transfer lifecycle

```text
Idle --(queued)--> Pending --(start_transfer on worker)--> Transferred
  ^                                                             |
  +------(finish_transfer + post_transfer on render thread)-----+
```

Textures that are not transferrable run the same steps synchronously on the caller.
*/

use crate::backend::Backend;
use crate::description::{Shape, TextureDescription};
use crate::error::Error;
use crate::imp::{GraphicsDevice, StorageDescriptor, TextureHandle};
use crate::memory::MemoryAccounting;
use crate::sync_state::{AtomicSyncState, SyncState};
use crate::sys::lock;
use crate::sys::time::Instant;
use crate::target::TextureTarget;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug)]
struct UploadedFace {
    mip: u16,
    face: u8,
    data: Arc<[u8]>,
}

pub struct GpuTexture {
    backend: Weak<Backend>,
    device: Arc<dyn GraphicsDevice>,
    memory: Arc<MemoryAccounting>,
    description: Arc<TextureDescription>,
    handle: TextureHandle,
    target: TextureTarget,
    shape: Shape,
    content_stamp: AtomicU32,
    sampler_stamp: AtomicU32,
    virtual_size: u64,
    size: AtomicU64,
    transferrable: bool,
    sync_state: AtomicSyncState,
    transfer_count: AtomicU32,
    //held by whoever runs the render-thread half
    finishing: AtomicBool,
    uploaded: Mutex<Vec<UploadedFace>>,
    transfer_waiters: Mutex<Vec<r#continue::Sender<()>>>,
}

/// Rebinds whatever was bound before, including when the closure panics.
struct PreservedBinding<'a> {
    device: &'a dyn GraphicsDevice,
    target: TextureTarget,
    previous: Option<TextureHandle>,
}

impl Drop for PreservedBinding<'_> {
    fn drop(&mut self) {
        self.device.bind_texture(self.target, self.previous);
    }
}

impl GpuTexture {
    /**
    Creates the native texture for `description`.

    No storage is allocated yet; that happens in [Self::create_texture] as part of a transfer.
    Fails with [Error::UnsupportedTextureType] for anything but 2D and cube textures.
    */
    pub fn new(
        backend: &Arc<Backend>,
        description: &Arc<TextureDescription>,
        transferrable: bool,
    ) -> Result<Self, Error> {
        let target = TextureTarget::for_type(description.texture_type())?;
        let shape = description.shape();
        let device = backend.device().clone();
        let handle = device.create_texture_handle()?;
        backend.recycle();

        let memory = backend.memory().clone();
        let virtual_size = shape.total_size(target.num_faces());
        memory.increment_texture_gpu_count();
        memory.update_texture_gpu_virtual_memory_usage(0, virtual_size);
        logwise::info_sync!(
            "Created texture {name} handle {handle} ({width}x{height}, mips {min_mip}..={max_mip})",
            name = logwise::privacy::LogIt(description.debug_name()),
            handle = handle.raw(),
            width = shape.width,
            height = shape.height,
            min_mip = shape.min_mip,
            max_mip = shape.max_mip
        );

        Ok(GpuTexture {
            backend: Arc::downgrade(backend),
            device,
            memory,
            description: description.clone(),
            handle,
            target,
            shape,
            content_stamp: AtomicU32::new(0),
            sampler_stamp: AtomicU32::new(0),
            virtual_size,
            size: AtomicU64::new(0),
            transferrable,
            sync_state: AtomicSyncState::new(SyncState::Idle),
            transfer_count: AtomicU32::new(0),
            finishing: AtomicBool::new(false),
            uploaded: Mutex::new(Vec::new()),
            transfer_waiters: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }
    pub fn target(&self) -> TextureTarget {
        self.target
    }
    pub fn description(&self) -> &Arc<TextureDescription> {
        &self.description
    }
    pub fn min_mip(&self) -> u16 {
        self.shape.min_mip
    }
    pub fn max_mip(&self) -> u16 {
        self.shape.max_mip
    }
    pub fn storage_stamp(&self) -> u32 {
        self.shape.stamp
    }
    pub fn content_stamp(&self) -> u32 {
        self.content_stamp.load(Ordering::Acquire)
    }
    /// Bytes the description needs with every level resident.
    pub fn virtual_size(&self) -> u64 {
        self.virtual_size
    }
    /// Bytes allocated on the device.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }
    pub fn is_transferrable(&self) -> bool {
        self.transferrable
    }
    pub fn sync_state(&self) -> SyncState {
        self.sync_state.load()
    }
    /// Completed transfers, counted at post-transfer.
    pub fn transfer_count(&self) -> u32 {
        self.transfer_count.load(Ordering::Acquire)
    }

    pub fn set_size(&self, size: u64) {
        let previous = self.size.swap(size, Ordering::AcqRel);
        self.memory.update_texture_gpu_memory_usage(previous, size);
    }

    /// The description's storage changed shape since this texture was created.
    pub fn is_invalid(&self) -> bool {
        self.shape.stamp < self.description.stamp()
    }

    /// No transfer is in flight and the description holds newer pixels than the last upload.
    pub fn is_outdated(&self) -> bool {
        self.sync_state.load() == SyncState::Idle
            && self.content_stamp() < self.description.data_stamp()
    }

    pub fn is_ready(&self) -> bool {
        if self.is_invalid() {
            return false;
        }
        let sync_state = self.sync_state.load();
        !(self.is_outdated() || sync_state != SyncState::Idle)
    }

    /**
    Runs `f` with this texture bound to its target, then restores the previous binding.
    */
    pub fn with_preserved_texture<R>(
        &self,
        f: impl FnOnce() -> Result<R, Error>,
    ) -> Result<R, Error> {
        let _preserved = PreservedBinding {
            device: self.device.as_ref(),
            target: self.target,
            previous: self.device.bound_texture(self.target),
        };
        self.device.bind_texture(self.target, Some(self.handle));
        f()
    }

    fn storage_descriptor(&self) -> StorageDescriptor {
        StorageDescriptor {
            target: self.target,
            format: self.shape.format,
            width: self.shape.width,
            height: self.shape.height,
            min_mip: self.shape.min_mip,
            max_mip: self.shape.max_mip,
            retain_base_level: self.description.is_autogenerate_mips(),
            debug_name: self.description.debug_name().to_string(),
        }
    }

    /// Allocates storage for every face and mip, then applies the sampler.
    pub fn create_texture(&self) -> Result<(), Error> {
        self.with_preserved_texture(|| {
            let size = self
                .device
                .allocate_storage(self.handle, &self.storage_descriptor())?;
            self.set_size(size);
            self.apply_sampler()
        })
    }

    //expects the texture to be bound
    fn apply_sampler(&self) -> Result<(), Error> {
        let stamp = self.description.sampler_stamp();
        self.device
            .apply_sampler(self.handle, &self.description.sampler())?;
        self.sampler_stamp.store(stamp, Ordering::Release);
        Ok(())
    }

    /// Re-applies the sampler if the description replaced it.
    pub fn sync_sampler(&self) -> Result<(), Error> {
        if self.size() == 0
            || self.sampler_stamp.load(Ordering::Acquire) >= self.description.sampler_stamp()
        {
            return Ok(());
        }
        self.with_preserved_texture(|| self.apply_sampler())
    }

    /**
    Background half of a transfer: (re)allocates storage and uploads every mip face the
    description holds.

    Safe to call from the transfer worker.  Records the data stamp that was uploaded.
    */
    pub fn start_transfer(&self) -> Result<(), Error> {
        if self.is_invalid() {
            //about to be replaced; nothing we upload would be used
            logwise::trace_sync!(
                "Skipping transfer of invalid texture {handle}",
                handle = self.handle.raw()
            );
            return Ok(());
        }
        let started = Instant::now();
        let data_stamp = self.description.data_stamp();
        self.create_texture()?;
        let uploaded = self.with_preserved_texture(|| {
            let mut uploaded = Vec::new();
            for (face_index, face) in self.target.face_targets().iter().enumerate() {
                let face_index = face_index as u8;
                for mip in self.shape.min_mip..=self.shape.max_mip {
                    let Some(data) = self.description.stored_mip_face(mip, face_index) else {
                        continue;
                    };
                    //pixels for a newer shape; this texture is invalid now
                    if data.len() != self.shape.mip_face_size(mip) {
                        continue;
                    }
                    self.device.upload_mip_face(self.handle, *face, mip, &data)?;
                    uploaded.push(UploadedFace {
                        mip,
                        face: face_index,
                        data,
                    });
                }
            }
            Ok(uploaded)
        })?;
        logwise::trace_sync!(
            "Uploaded {count} mip faces to texture {handle} in {elapsed}",
            count = uploaded.len(),
            handle = self.handle.raw(),
            elapsed = logwise::privacy::LogIt(&started.elapsed())
        );
        *lock(&self.uploaded) = uploaded;
        self.content_stamp.store(data_stamp, Ordering::Release);
        Ok(())
    }

    /// Render-thread half of a transfer: generates mips when the description asks for them.
    pub fn finish_transfer(&self) -> Result<(), Error> {
        if self.description.is_autogenerate_mips() && self.size() > 0 {
            self.with_preserved_texture(|| self.device.generate_mips(self.handle))?;
        }
        Ok(())
    }

    /**
    Post-transfer work on the render thread.

    Returns the texture to `Idle`, counts the transfer, and tells the description which mip
    faces now live on the GPU so it can release the CPU copies.
    */
    pub fn post_transfer(&self) {
        //take the list before Idle lets a new transfer refill it
        let uploaded = std::mem::take(&mut *lock(&self.uploaded));
        self.transfer_count.fetch_add(1, Ordering::AcqRel);
        self.sync_state.store(SyncState::Idle);
        if self.is_invalid() {
            //the replacement still needs those pixels
            return;
        }
        for face in uploaded {
            self.description
                .notify_uploaded_mip_face(face.mip, face.face, &face.data);
        }
    }

    /**
    Runs finish and post-transfer if the background stage is done.

    Returns whether this call completed the transfer.  Concurrent callers race for it and
    exactly one wins.  Post-transfer runs even when mip generation fails, so the texture does
    not stay stuck in `Transferred`.
    */
    pub fn complete_transfer(&self) -> Result<bool, Error> {
        if self.sync_state.load() != SyncState::Transferred {
            return Ok(false);
        }
        if self
            .finishing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        //the previous holder may have completed it while we waited for the gate
        if self.sync_state.load() != SyncState::Transferred {
            self.finishing.store(false, Ordering::Release);
            return Ok(false);
        }
        let finished = self.finish_transfer();
        self.post_transfer();
        self.finishing.store(false, Ordering::Release);
        finished.map(|_| true)
    }

    /// Runs the whole transfer on the calling thread.
    pub fn transfer_synchronously(&self) -> Result<(), Error> {
        if self.sync_state.transition(SyncState::Idle, SyncState::Pending).is_err() {
            //already in flight
            return Ok(());
        }
        match self.start_transfer() {
            Ok(()) => {
                self.mark_transferred();
                self.complete_transfer().map(|_| ())
            }
            Err(e) => {
                self.abandon_transfer();
                Err(e)
            }
        }
    }

    /// Waits until the background stage of the current transfer is over.
    ///
    /// Resolves immediately when no transfer is pending.
    pub async fn transferred(&self) {
        let receiver = {
            let mut waiters = lock(&self.transfer_waiters);
            if self.sync_state.load() != SyncState::Pending {
                return;
            }
            let (sender, receiver) = r#continue::continuation();
            waiters.push(sender);
            receiver
        };
        receiver.await
    }

    pub(crate) fn begin_transfer(&self) -> bool {
        self.sync_state
            .transition(SyncState::Idle, SyncState::Pending)
            .is_ok()
    }

    pub(crate) fn mark_transferred(&self) {
        if let Err(e) = self
            .sync_state
            .transition(SyncState::Pending, SyncState::Transferred)
        {
            logwise::warn_sync!(
                "Transfer finished in unexpected state: {err}",
                err = logwise::privacy::LogIt(&e)
            );
        }
        self.wake_transfer_waiters();
    }

    /// Drops back to `Idle` without counting a transfer; content stays outdated.
    pub(crate) fn abandon_transfer(&self) {
        self.sync_state.store(SyncState::Idle);
        lock(&self.uploaded).clear();
        self.wake_transfer_waiters();
    }

    fn wake_transfer_waiters(&self) {
        let waiters = std::mem::take(&mut *lock(&self.transfer_waiters));
        for sender in waiters {
            sender.send(());
        }
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.wake_transfer_waiters();
        let size = self.size();
        match self.backend.upgrade() {
            Some(backend) => backend.release_texture(self.handle, size),
            None => {
                self.device.destroy_texture(self.handle);
                self.memory.update_texture_gpu_memory_usage(size, 0);
                self.memory.decrement_texture_gpu_count();
            }
        }
        self.memory
            .update_texture_gpu_virtual_memory_usage(self.virtual_size, 0);
    }
}

impl Debug for GpuTexture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("handle", &self.handle)
            .field("target", &self.target)
            .field("description", &self.description.debug_name())
            .field("storage_stamp", &self.shape.stamp)
            .field("content_stamp", &self.content_stamp)
            .field("size", &self.size)
            .field("sync_state", &self.sync_state)
            .finish()
    }
}
