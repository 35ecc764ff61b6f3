//! Request identifier allocation.
//!
//! Identifiers are drawn at random and only need to be unique among the
//! requests currently pending on one session. Allocation gives up after a
//! fixed number of collisions instead of spinning on a full table.

use crate::error::{Error, Result};
use crate::util::random_u32;

/// Draws attempted before allocation fails with
/// [`Error::ResourceExhausted`].
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 16;

/// Range of identifiers to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdWidth {
    /// `0..=0xFFFF`, used for notifications.
    Bits16,
    /// `0..=i32::MAX`, used for request/response exchanges.
    Bits32,
}

impl IdWidth {
    const fn mask(self) -> u32 {
        match self {
            IdWidth::Bits16 => 0xFFFF,
            IdWidth::Bits32 => 0x7FFF_FFFF,
        }
    }
}

type Source = Box<dyn FnMut() -> Result<u32> + Send>;

pub(crate) struct IdAllocator {
    source: Source,
}

impl IdAllocator {
    /// Allocator backed by the OS entropy source.
    pub(crate) fn new() -> Self {
        Self::with_source(random_u32)
    }

    pub(crate) fn with_source<F>(source: F) -> Self
    where
        F: FnMut() -> Result<u32> + Send + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }

    /// Draw an identifier for which `in_use` returns false.
    pub(crate) fn allocate(
        &mut self,
        width: IdWidth,
        mut in_use: impl FnMut(i32) -> bool,
    ) -> Result<i32> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = ((self.source)()? & width.mask()) as i32;
            if !in_use(id) {
                return Ok(id);
            }
        }
        Err(Error::ResourceExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }
}
