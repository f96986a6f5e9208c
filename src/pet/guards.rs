//! Busy flags for the pet session operations.
//!
//! All flags live in one atomic bitmask. Acquiring an operation is a single
//! compare-and-swap that checks the operation's conflict set, so a re-entrant
//! call between an acquire and the next published snapshot still sees the
//! flag. Permits release on drop, including when the owning future is
//! dropped mid-flight.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Guarded pet session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Refresh,
    Decrypt,
    Interact,
    Create,
    LevelUp,
}

const REFRESH: u8 = 1 << 0;
const DECRYPT: u8 = 1 << 1;
const INTERACT: u8 = 1 << 2;
const CREATE: u8 = 1 << 3;
const LEVEL_UP: u8 = 1 << 4;

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Refresh,
        Self::Decrypt,
        Self::Interact,
        Self::Create,
        Self::LevelUp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Decrypt => "decrypt",
            Self::Interact => "interact",
            Self::Create => "create",
            Self::LevelUp => "level_up",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Refresh => REFRESH,
            Self::Decrypt => DECRYPT,
            Self::Interact => INTERACT,
            Self::Create => CREATE,
            Self::LevelUp => LEVEL_UP,
        }
    }

    /// Flags that must all be clear for this operation to start.
    const fn conflicts(self) -> u8 {
        match self {
            Self::Refresh => REFRESH,
            Self::Decrypt | Self::Create => REFRESH | DECRYPT | INTERACT | CREATE,
            Self::Interact => REFRESH | DECRYPT | INTERACT | CREATE | LEVEL_UP,
            Self::LevelUp => INTERACT | LEVEL_UP,
        }
    }
}

/// Observable copy of the busy flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyFlags {
    pub refreshing: bool,
    pub decrypting: bool,
    pub interacting: bool,
    pub creating: bool,
    pub leveling_up: bool,
}

#[derive(Debug, Default)]
pub struct OperationGuards {
    busy: AtomicU8,
}

impl OperationGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `operation` busy if nothing it conflicts with is running.
    pub fn try_acquire(&self, operation: Operation) -> Option<BusyPermit<'_>> {
        self.busy
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current & operation.conflicts() == 0).then_some(current | operation.bit())
            })
            .ok()
            .map(|_| BusyPermit {
                guards: self,
                operation,
            })
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.busy.load(Ordering::Acquire) & operation.bit() != 0
    }

    /// Whether `operation` could be acquired right now.
    pub fn can_start(&self, operation: Operation) -> bool {
        self.busy.load(Ordering::Acquire) & operation.conflicts() == 0
    }

    pub fn flags(&self) -> BusyFlags {
        let busy = self.busy.load(Ordering::Acquire);
        BusyFlags {
            refreshing: busy & REFRESH != 0,
            decrypting: busy & DECRYPT != 0,
            interacting: busy & INTERACT != 0,
            creating: busy & CREATE != 0,
            leveling_up: busy & LEVEL_UP != 0,
        }
    }

    fn release(&self, operation: Operation) {
        self.busy.fetch_and(!operation.bit(), Ordering::AcqRel);
    }
}

/// Held while an operation runs.
#[must_use = "the operation is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct BusyPermit<'a> {
    guards: &'a OperationGuards,
    operation: Operation,
}

impl Drop for BusyPermit<'_> {
    fn drop(&mut self) {
        self.guards.release(self.operation);
    }
}
