// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims.

pub mod time {
    //! `std::time` on native targets, `web_time` on wasm32 where `std::time::Instant` panics.

    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::Instant;

    #[cfg(target_arch = "wasm32")]
    pub use web_time::Instant;
}

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, taking the guard even if a panicking thread poisoned it.
///
/// Every lock in this crate guards data that is consistent between statements, so poisoning
/// carries no information.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
