// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Transfer state of a GPU texture.
//!
//! The state is read by the render thread and the transfer worker, so it lives in an atomic.
//!
//! Textures move through:
//! - `IDLE`: no transfer in flight.  Content may still be outdated.
//! - `PENDING`: queued for the transfer worker, or being uploaded by it.
//! - `TRANSFERRED`: the worker finished uploading; the render thread still has to run
//!   post-transfer work before the texture is ready.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const TRANSFERRED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    Pending,
    Transferred,
}

impl SyncState {
    const fn to_raw(self) -> u8 {
        match self {
            SyncState::Idle => IDLE,
            SyncState::Pending => PENDING,
            SyncState::Transferred => TRANSFERRED,
        }
    }
    fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => SyncState::Idle,
            PENDING => SyncState::Pending,
            TRANSFERRED => SyncState::Transferred,
            _ => panic!("Invalid sync state: {raw}"),
        }
    }
}

/// Returned when a transition finds the state somewhere else.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotInState {
    pub expected: SyncState,
    pub actual: SyncState,
}

impl Debug for NotInState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NotInState {{ expected: {:?}, actual: {:?} }}",
            self.expected, self.actual
        )
    }
}

impl std::fmt::Display for NotInState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "texture sync state is {:?}, expected {:?}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for NotInState {}

pub struct AtomicSyncState(AtomicU8);

impl AtomicSyncState {
    pub const fn new(state: SyncState) -> Self {
        AtomicSyncState(AtomicU8::new(state.to_raw()))
    }

    pub fn load(&self) -> SyncState {
        SyncState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: SyncState) {
        self.0.store(state.to_raw(), Ordering::Release);
    }

    /// Moves from `from` to `to`, failing without side effects if the state is not `from`.
    pub fn transition(&self, from: SyncState, to: SyncState) -> Result<(), NotInState> {
        self.0
            .compare_exchange(from.to_raw(), to.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| NotInState {
                expected: from,
                actual: SyncState::from_raw(actual),
            })
    }
}

impl Debug for AtomicSyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicSyncState").field(&self.load()).finish()
    }
}
