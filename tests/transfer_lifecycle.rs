// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Transfer lifecycle of textures driven through the public [Backend] API.
//!
//! Uses the headless device so pixel contents can be checked after upload.
#![cfg(not(target_arch = "wasm32"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use texture_sync::description::TextureType;
use texture_sync::pixel_formats::TextureFormat;
use texture_sync::sampler::SamplerDescription;
use texture_sync::sync_state::SyncState;
use texture_sync::target::{FaceTarget, TextureTarget};
use texture_sync::{
    Backend, BackendConfig, Error, GraphicsDevice, HeadlessDevice, StorageDescriptor,
    TextureDescription, TextureHandle,
};

fn worker_backend() -> (Arc<HeadlessDevice>, Arc<Backend>) {
    let device = Arc::new(HeadlessDevice::new());
    let backend = Backend::new(device.clone(), BackendConfig::default());
    (device, backend)
}

fn synchronous_backend() -> (Arc<HeadlessDevice>, Arc<Backend>) {
    let device = Arc::new(HeadlessDevice::new());
    let backend = Backend::new(
        device.clone(),
        BackendConfig::builder().transfer_on_worker(false).build(),
    );
    (device, backend)
}

fn rgba(width: u32, height: u32) -> Arc<TextureDescription> {
    TextureDescription::builder(TextureType::Tex2D, TextureFormat::Rgba8Unorm, width, height)
        .debug_name("lifecycle")
        .build()
        .unwrap()
}

#[test]
fn async_transfer_needs_render_thread() {
    let (device, backend) = worker_backend();
    let description = rgba(2, 2);
    description
        .assign_stored_mip_face(0, 0, vec![9u8; 16])
        .unwrap();

    let texture = backend.sync_texture(&description).unwrap();
    assert!(texture.is_transferrable());
    assert!(!texture.is_ready());

    test_executors::spin_on(texture.transferred());
    assert_eq!(texture.sync_state(), SyncState::Transferred);
    //background stage done, render thread has not run yet
    assert!(!texture.is_ready());
    assert_eq!(texture.transfer_count(), 0);
    assert!(description.is_stored_mip_face_available(0, 0));

    assert_eq!(backend.process_transfers(), 1);
    assert!(texture.is_ready());
    assert_eq!(texture.transfer_count(), 1);
    assert!(!description.is_stored_mip_face_available(0, 0));
    assert_eq!(
        device.level_data(texture.handle(), 0, 0),
        Some(vec![9u8; 16])
    );
    assert_eq!(backend.process_transfers(), 0);
}

#[test]
fn sync_finishes_completed_transfers() {
    let (_device, backend) = worker_backend();
    let description = rgba(1, 1);
    let texture = backend.sync_texture(&description).unwrap();
    test_executors::spin_on(texture.transferred());

    let again = backend.sync_texture(&description).unwrap();
    assert!(Arc::ptr_eq(&texture, &again));
    assert!(texture.is_ready());
    //already finalized by sync_texture
    assert_eq!(backend.process_transfers(), 0);
}

#[test]
fn new_data_makes_texture_outdated() {
    let (device, backend) = synchronous_backend();
    let description = rgba(1, 1);
    let texture = backend.sync_texture(&description).unwrap();
    assert!(texture.is_ready());
    assert!(!texture.is_transferrable());

    description
        .assign_stored_mip_face(0, 0, vec![1, 2, 3, 4])
        .unwrap();
    assert!(texture.is_outdated());
    assert!(!texture.is_invalid());
    assert!(!texture.is_ready());

    let same = backend.sync_texture(&description).unwrap();
    assert!(Arc::ptr_eq(&texture, &same));
    assert!(texture.is_ready());
    assert_eq!(texture.transfer_count(), 2);
    assert_eq!(
        device.level_data(texture.handle(), 0, 0),
        Some(vec![1, 2, 3, 4])
    );
}

#[test]
fn resize_replaces_texture() {
    let (device, backend) = synchronous_backend();
    let description = rgba(4, 4);
    let old = backend.sync_texture(&description).unwrap();
    let old_handle = old.handle();

    description.resize(8, 8, 1).unwrap();
    assert!(old.is_invalid());
    assert!(!old.is_ready());

    let new = backend.sync_texture(&description).unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.is_ready());
    assert_eq!(new.max_mip(), 3);
    assert_eq!(device.allocated_bytes(new.handle()), Some(new.size()));

    //still referenced here, so still alive
    assert!(device.allocated_bytes(old_handle).is_some());
    drop(old);
    backend.recycle();
    assert_eq!(device.allocated_bytes(old_handle), None);
    assert_eq!(device.live_textures(), 1);
}

#[test]
fn kept_cpu_copy_survives_upload() {
    let (_device, backend) = synchronous_backend();
    let description =
        TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 2, 2)
            .keep_cpu_copy()
            .build()
            .unwrap();
    description
        .assign_stored_mip_face(0, 0, vec![1, 2, 3, 4])
        .unwrap();
    let texture = backend.sync_texture(&description).unwrap();
    assert!(texture.is_ready());
    assert!(description.is_stored_mip_face_available(0, 0));
}

#[test]
fn autogenerated_mips() {
    let (device, backend) = synchronous_backend();
    let description =
        TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 4, 4)
            .autogenerate_mips(true)
            .build()
            .unwrap();
    description
        .assign_stored_mip_face(0, 0, vec![200u8; 16])
        .unwrap();
    let texture = backend.sync_texture(&description).unwrap();
    assert_eq!(device.mip_generations(texture.handle()), 1);
    assert_eq!(device.level_data(texture.handle(), 0, 1), Some(vec![200u8; 4]));
    assert_eq!(device.level_data(texture.handle(), 0, 2), Some(vec![200u8]));
}

#[test]
fn mip_generation_failure_still_settles() {
    let (_device, backend) = synchronous_backend();
    let description =
        TextureDescription::builder(TextureType::Tex2D, TextureFormat::R32Float, 2, 2)
            .autogenerate_mips(true)
            .build()
            .unwrap();
    assert_eq!(
        backend.sync_texture(&description).unwrap_err(),
        Error::MipGenerationUnsupported(TextureFormat::R32Float)
    );
    let texture = backend.texture_for(&description).unwrap();
    assert_eq!(texture.sync_state(), SyncState::Idle);
    assert_eq!(texture.transfer_count(), 1);
}

#[test]
fn dropped_backend_releases_waiters() {
    let (_device, backend) = worker_backend();
    let description = rgba(16, 16);
    let texture = backend.sync_texture(&description).unwrap();
    drop(backend);
    //the worker is joined; the transfer either finished or was abandoned
    test_executors::spin_on(texture.transferred());
    assert_ne!(texture.sync_state(), SyncState::Pending);
}

#[test]
fn syncing_alone_releases_forgotten_textures() {
    let (device, backend) = worker_backend();
    let description = rgba(2, 2);
    let texture = backend.sync_texture(&description).unwrap();
    test_executors::spin_on(texture.transferred());

    //no process_transfers anywhere in this test
    let again = backend.sync_texture(&description).unwrap();
    assert!(again.is_ready());
    drop(again);

    backend.forget_texture(&description);
    assert_eq!(Arc::strong_count(&texture), 1);
    drop(texture);
    backend.recycle();
    assert_eq!(device.live_textures(), 0);
    assert_eq!(backend.memory().texture_gpu_memory_usage(), 0);
    assert_eq!(backend.memory().texture_gpu_count(), 0);
}

#[test]
fn syncing_one_texture_finalizes_others() {
    let (_device, backend) = worker_backend();
    let first = rgba(1, 1);
    let second = rgba(1, 1);
    let texture = backend.sync_texture(&first).unwrap();
    test_executors::spin_on(texture.transferred());

    backend.sync_texture(&second).unwrap();
    assert!(texture.is_ready());
    assert_eq!(backend.process_transfers(), 0);
}

/// Headless device whose next uploads fail.
#[derive(Debug, Default)]
struct FlakyDevice {
    inner: HeadlessDevice,
    failing_uploads: AtomicU32,
}

impl GraphicsDevice for FlakyDevice {
    fn create_texture_handle(&self) -> Result<TextureHandle, Error> {
        self.inner.create_texture_handle()
    }
    fn bound_texture(&self, target: TextureTarget) -> Option<TextureHandle> {
        self.inner.bound_texture(target)
    }
    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>) {
        self.inner.bind_texture(target, handle)
    }
    fn allocate_storage(
        &self,
        handle: TextureHandle,
        descriptor: &StorageDescriptor,
    ) -> Result<u64, Error> {
        self.inner.allocate_storage(handle, descriptor)
    }
    fn upload_mip_face(
        &self,
        handle: TextureHandle,
        face: FaceTarget,
        mip: u16,
        data: &[u8],
    ) -> Result<(), Error> {
        let failing = self
            .failing_uploads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::NoStorage(handle));
        }
        self.inner.upload_mip_face(handle, face, mip, data)
    }
    fn apply_sampler(
        &self,
        handle: TextureHandle,
        sampler: &SamplerDescription,
    ) -> Result<(), Error> {
        self.inner.apply_sampler(handle, sampler)
    }
    fn generate_mips(&self, handle: TextureHandle) -> Result<(), Error> {
        self.inner.generate_mips(handle)
    }
    fn destroy_texture(&self, handle: TextureHandle) {
        self.inner.destroy_texture(handle)
    }
    fn dedicated_memory(&self) -> u64 {
        self.inner.dedicated_memory()
    }
}

#[test]
fn failed_worker_transfer_is_retried() {
    let device = Arc::new(FlakyDevice::default());
    device.failing_uploads.store(1, Ordering::Release);
    let backend = Backend::new(device.clone(), BackendConfig::default());
    let description = rgba(1, 1);
    description
        .assign_stored_mip_face(0, 0, vec![5, 6, 7, 8])
        .unwrap();

    let texture = backend.sync_texture(&description).unwrap();
    test_executors::spin_on(texture.transferred());
    assert_eq!(texture.sync_state(), SyncState::Idle);
    assert!(texture.is_outdated());
    assert!(!texture.is_ready());
    assert_eq!(texture.transfer_count(), 0);
    assert!(description.is_stored_mip_face_available(0, 0));
    assert_eq!(backend.process_transfers(), 0);

    let retried = backend.sync_texture(&description).unwrap();
    assert!(Arc::ptr_eq(&texture, &retried));
    test_executors::spin_on(texture.transferred());
    assert_eq!(backend.process_transfers(), 1);
    assert!(texture.is_ready());
    assert_eq!(
        device.inner.level_data(texture.handle(), 0, 0),
        Some(vec![5, 6, 7, 8])
    );
}
