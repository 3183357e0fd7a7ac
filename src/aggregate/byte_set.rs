/// Deduplicated set of owned byte strings.
///
/// Each element is a `Box<[u8]>` copied out of a host argument buffer, so the
/// set never aliases memory the host reuses between calls. Equality is
/// bytewise and length-sensitive (`b"ab"` and `b"ab\0"` are distinct).
///
/// Inserts are fallible: the table slot is reserved with `try_reserve` and the
/// element copy is allocated at its exact size with a checked allocation, so
/// an allocation failure leaves the set exactly as it was.
use std::alloc::{self, Layout};
use std::collections::HashSet;
use std::ptr;

use crate::error::{Result, UdfError};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteSet {
    entries: HashSet<Box<[u8]>>,
}

impl ByteSet {
    /// Create an empty set without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with room for `capacity` elements.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut entries = HashSet::new();
        if injected_failure() || entries.try_reserve(capacity).is_err() {
            return Err(UdfError::StateAlloc);
        }
        Ok(Self { entries })
    }

    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.entries.contains(bytes)
    }

    /// Insert an owned copy of `bytes`.
    ///
    /// Returns `Ok(false)` if an equal element was already present.
    pub fn try_insert(&mut self, bytes: &[u8]) -> Result<bool> {
        if self.entries.contains(bytes) {
            return Ok(false);
        }

        if injected_failure() || self.entries.try_reserve(1).is_err() {
            return Err(UdfError::SetGrowth);
        }
        let owned = try_copy(bytes).ok_or(UdfError::StringAlloc)?;

        Ok(self.entries.insert(owned))
    }

    /// Remove the element equal to `bytes`, releasing its storage.
    pub fn remove(&mut self, bytes: &[u8]) -> bool {
        self.entries.remove(bytes)
    }

    /// Release every element. Table capacity is kept for the next group.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.entries.iter().map(|b| &b[..])
    }

    /// Elements in ascending bytewise order.
    pub fn sorted(&self) -> Vec<&[u8]> {
        let mut out: Vec<&[u8]> = self.iter().collect();
        out.sort_unstable();
        out
    }
}

/// Copy `bytes` into a box of exactly `bytes.len()` bytes, or `None` if the
/// allocator refuses. `Vec::into_boxed_slice` may reallocate to shrink, and
/// that reallocation aborts instead of failing.
fn try_copy(bytes: &[u8]) -> Option<Box<[u8]>> {
    if injected_failure() {
        return None;
    }
    if bytes.is_empty() {
        return Some(Box::default());
    }
    let layout = Layout::array::<u8>(bytes.len()).ok()?;
    unsafe {
        let data = alloc::alloc(layout);
        if data.is_null() {
            return None;
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
        // Same layout `Box<[u8]>` deallocates with: size `len`, align 1.
        Some(Box::from_raw(ptr::slice_from_raw_parts_mut(data, bytes.len())))
    }
}

#[cfg(not(test))]
#[inline(always)]
fn injected_failure() -> bool {
    false
}

#[cfg(test)]
fn injected_failure() -> bool {
    fault::take()
}
