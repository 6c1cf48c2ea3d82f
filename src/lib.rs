// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! texture_sync keeps GPU textures in step with the engine's description of them.

The engine edits [TextureDescription]s: shape, format, sampler and CPU pixels for each mip face.
A [Backend] mirrors each description as a [GpuTexture] on a [GraphicsDevice] and decides, on
every [Backend::sync_texture], what the GPU copy needs:

| Description changed   | Texture is      | Backend does                                   |
|-----------------------|-----------------|------------------------------------------------|
| size, format, mips    | invalid         | creates a replacement, releases the old one    |
| pixels                | outdated        | uploads, on the transfer worker when available |
| sampler               | ready           | re-applies the sampler                         |

# Transfers

Uploads are split in two.  A worker thread allocates storage and copies pixels; the render
thread then generates mips, releases the CPU pixels that reached the GPU, and marks the
texture ready.  Call [Backend::process_transfers] once per frame to run the render-thread half.

```
use std::sync::Arc;
use texture_sync::{Backend, BackendConfig, HeadlessDevice, TextureDescription};
use texture_sync::description::TextureType;
use texture_sync::pixel_formats::TextureFormat;

let backend = Backend::new(Arc::new(HeadlessDevice::new()), BackendConfig::default());
let description = TextureDescription::builder(TextureType::Tex2D, TextureFormat::Rgba8Unorm, 2, 2)
    .autogenerate_mips(true)
    .build()
    .unwrap();
description.assign_stored_mip_face(0, 0, vec![255u8; 16]).unwrap();

let texture = backend.sync_texture(&description).unwrap();
test_executors::spin_on(texture.transferred());
backend.process_transfers();
assert!(texture.is_ready());
```

# Memory

Every texture reports what it allocates to a shared [memory::MemoryAccounting].  Released
textures are destroyed in batches by [Backend::recycle], and [Backend::memory_pressure]
compares what is in use against the configured or device-derived budget.

# Devices

[HeadlessDevice] keeps storage in memory and runs everywhere.  With the default
`backend_wgpu` feature, [WgpuDevice] drives a `wgpu::Device`.
*/

logwise::declare_logging_domain!();

pub mod backend;
pub mod config;
pub mod description;
mod error;
mod imp;
pub mod memory;
pub mod mips;
pub mod pixel_formats;
pub mod sampler;
pub mod sync_state;
mod sys;
pub mod target;
pub mod texture;
pub mod transfer;

pub use backend::Backend;
pub use config::{BackendConfig, BackendConfigBuilder};
pub use description::TextureDescription;
pub use error::Error;
pub use imp::{GraphicsDevice, HeadlessDevice, StorageDescriptor, TextureHandle};
#[cfg(feature = "backend_wgpu")]
pub use imp::WgpuDevice;
pub use sampler::SamplerDescription;
pub use texture::GpuTexture;
