//! Bounded, fixed-capacity names.
//!
//! Process filenames and semaphore names live inside fixed table slots,
//! so they are stored inline with a hard capacity instead of on the
//! heap. Longer names are truncated on copy, like the bounded string
//! copies they replace.

use core::fmt;

/// A fixed-capacity byte string holding at most `N` bytes of UTF-8.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedName<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FixedName<N> {
    /// The empty name.
    pub const EMPTY: Self = Self {
        buf: [0; N],
        len: 0,
    };

    /// Copies `s` into a new name, truncating to the capacity at a
    /// character boundary.
    pub fn from_str(s: &str) -> Self {
        let mut len = s.len().min(N);
        while len > 0 && !s.is_char_boundary(len) {
            len -= 1;
        }
        let mut buf = [0; N];
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { buf, len }
    }

    /// The stored name.
    pub fn as_str(&self) -> &str {
        // Truncation only happens on a char boundary, so the stored
        // bytes are always valid UTF-8.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// Returns `true` if no bytes are stored.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> fmt::Debug for FixedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
