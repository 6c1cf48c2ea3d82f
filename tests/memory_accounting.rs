// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Memory accounting as textures are created, uploaded and released.

use std::sync::Arc;
use texture_sync::description::TextureType;
use texture_sync::pixel_formats::TextureFormat;
use texture_sync::{Backend, BackendConfig, HeadlessDevice, TextureDescription};

const MIB: u64 = 1024 * 1024;

fn backend_with(device: HeadlessDevice, allowed: u64) -> Arc<Backend> {
    Backend::new(
        Arc::new(device),
        BackendConfig::builder()
            .transfer_on_worker(false)
            .allowed_gpu_memory(allowed)
            .build(),
    )
}

fn square(size: u32) -> Arc<TextureDescription> {
    TextureDescription::builder(TextureType::Tex2D, TextureFormat::Rgba8Unorm, size, size)
        .mip_range(0, 0)
        .build()
        .unwrap()
}

#[test]
fn drop_releases_after_recycle() {
    let backend = backend_with(HeadlessDevice::new(), 0);
    let description = square(16);
    let texture = backend.sync_texture(&description).unwrap();
    let memory = backend.memory().clone();
    assert_eq!(memory.texture_gpu_count(), 1);
    assert_eq!(memory.texture_gpu_memory_usage(), 16 * 16 * 4);
    assert_eq!(memory.texture_gpu_virtual_memory_usage(), 16 * 16 * 4);

    backend.forget_texture(&description);
    drop(texture);
    //virtual size goes immediately, the allocation waits for recycle
    assert_eq!(memory.texture_gpu_virtual_memory_usage(), 0);
    assert_eq!(memory.texture_gpu_memory_usage(), 16 * 16 * 4);
    assert_eq!(memory.texture_gpu_count(), 1);

    backend.recycle();
    assert_eq!(memory.texture_gpu_memory_usage(), 0);
    assert_eq!(memory.texture_gpu_count(), 0);
}

#[test]
fn creating_a_texture_recycles_released_ones() {
    let device = Arc::new(HeadlessDevice::new());
    let backend = Backend::new(
        device.clone(),
        BackendConfig::builder().transfer_on_worker(false).build(),
    );
    let first = square(4);
    backend.sync_texture(&first).unwrap();
    backend.forget_texture(&first);
    assert_eq!(device.live_textures(), 1);

    backend.sync_texture(&square(4)).unwrap();
    assert_eq!(device.live_textures(), 1);
    assert_eq!(backend.memory().texture_gpu_count(), 1);
}

#[test]
fn pressure_with_explicit_budget() {
    let budget = 4 * 64 * 64 * 4;
    let backend = backend_with(HeadlessDevice::new(), budget);
    let description = square(64);
    backend.sync_texture(&description).unwrap();
    assert_eq!(backend.memory_pressure(), 0.25);
}

#[test]
fn pressure_from_dedicated_memory() {
    let backend = backend_with(HeadlessDevice::with_dedicated_memory(4 * MIB), 0);
    //3 MiB available; one 512x512 RGBA8 level is 1 MiB
    let description = square(512);
    backend.sync_texture(&description).unwrap();
    assert!((backend.memory_pressure() - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn pressure_without_device_information() {
    let backend = backend_with(HeadlessDevice::new(), 0);
    assert_eq!(backend.memory_pressure(), 0.0);
    //192 MiB available
    let description = square(1024);
    backend.sync_texture(&description).unwrap();
    assert!((backend.memory_pressure() - 4.0 / 192.0).abs() < 1e-6);
}
