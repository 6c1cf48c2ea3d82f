// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU memory accounting for textures.

Counters are updated from the render thread, the transfer worker, and whichever thread drops
the last reference to a texture, so they are plain atomics.  Updates are expressed as
`(previous, new)` pairs: callers report the size they accounted before and the size they
account now, and the counter moves by the difference.
*/

use std::sync::atomic::{AtomicU64, Ordering};

/// Assumed device memory when neither a limit nor the dedicated memory is known.
pub const DEFAULT_MAX_MEMORY_MB: u64 = 256;

const fn mb_to_bytes(mb: u64) -> u64 {
    mb * 1024 * 1024
}

#[derive(Debug, Default)]
pub struct MemoryAccounting {
    texture_gpu_count: AtomicU64,
    texture_gpu_memory_usage: AtomicU64,
    texture_gpu_virtual_memory_usage: AtomicU64,
    allowed_gpu_memory_usage: AtomicU64,
}

fn apply_delta(counter: &AtomicU64, prev: u64, new: u64) {
    if new > prev {
        counter.fetch_add(new - prev, Ordering::AcqRel);
    } else if prev > new {
        let delta = prev - new;
        //saturate rather than wrap if a release is reported twice
        let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            Some(current.saturating_sub(delta))
        });
    }
}

impl MemoryAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_gpu_memory_usage(allowed: u64) -> Self {
        let accounting = Self::default();
        accounting.set_allowed_gpu_memory_usage(allowed);
        accounting
    }

    pub fn increment_texture_gpu_count(&self) {
        self.texture_gpu_count.fetch_add(1, Ordering::AcqRel);
    }
    pub fn decrement_texture_gpu_count(&self) {
        apply_delta(&self.texture_gpu_count, 1, 0);
    }
    pub fn texture_gpu_count(&self) -> u64 {
        self.texture_gpu_count.load(Ordering::Acquire)
    }

    /// Bytes actually allocated on the device.
    pub fn update_texture_gpu_memory_usage(&self, prev: u64, new: u64) {
        apply_delta(&self.texture_gpu_memory_usage, prev, new);
    }
    pub fn texture_gpu_memory_usage(&self) -> u64 {
        self.texture_gpu_memory_usage.load(Ordering::Acquire)
    }

    /// Bytes the live textures would need with every level resident.
    pub fn update_texture_gpu_virtual_memory_usage(&self, prev: u64, new: u64) {
        apply_delta(&self.texture_gpu_virtual_memory_usage, prev, new);
    }
    pub fn texture_gpu_virtual_memory_usage(&self) -> u64 {
        self.texture_gpu_virtual_memory_usage.load(Ordering::Acquire)
    }

    /// Explicit texture memory budget in bytes; 0 means "derive from the device".
    pub fn set_allowed_gpu_memory_usage(&self, allowed: u64) {
        self.allowed_gpu_memory_usage.store(allowed, Ordering::Release);
    }
    pub fn allowed_gpu_memory_usage(&self) -> u64 {
        self.allowed_gpu_memory_usage.load(Ordering::Acquire)
    }

    /**
    Consumed texture memory divided by the memory textures may use.

    Without an explicit budget, textures may use 75% of `dedicated_memory`, or of
    [DEFAULT_MAX_MEMORY_MB] when the device does not report it (passes 0).
    */
    pub fn memory_pressure(&self, dedicated_memory: u64) -> f32 {
        let mut available = self.allowed_gpu_memory_usage();
        if available == 0 {
            let total = if dedicated_memory == 0 {
                mb_to_bytes(DEFAULT_MAX_MEMORY_MB)
            } else {
                dedicated_memory
            };
            available = (total >> 2) * 3;
        }
        self.texture_gpu_memory_usage() as f32 / available as f32
    }
}
