//! The move strategies the dispatcher chooses between.
//!
//! Implementations work on raw byte extents. [`PortablePrimitives`] builds every strategy on
//! `core::ptr::copy`, so it is correct for any overlap and any claimed capability.
//! `RepMovs` (x86-64 only) uses the string-move instructions for the two fast strategies.

use core::ptr;

/// Chunk size of [`MovePrimitives::word_move`].
pub const WORD: usize = 8;

/// Outcome of a [`MovePrimitives::word_move`], in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMove {
    /// Bytes at the end of the extent that were not copied.
    pub remaining: usize,
    /// Bytes at the start of the extent that were copied.
    pub copied: usize,
}

/// One implementation per target of the three move strategies.
pub trait MovePrimitives {
    /// Copies `len` bytes from `src` to `dst` in ascending address order.
    ///
    /// # Safety
    /// `src` must be valid for reads and `dst` for writes of `len` bytes, and
    /// [`can_use_forward_move`](crate::can_use_forward_move) must hold for the two addresses.
    unsafe fn byte_move(&self, dst: *mut u8, src: *const u8, len: usize);

    /// Copies the leading whole [`WORD`]s of `len` bytes in ascending address order and reports
    /// how much is left. `copied + remaining == len` always holds and `copied` is a multiple of
    /// [`WORD`].
    ///
    /// # Safety
    /// Same as [`MovePrimitives::byte_move`].
    unsafe fn word_move(&self, dst: *mut u8, src: *const u8, len: usize) -> WordMove;

    /// Copies `len` bytes from `src` to `dst`, correct for any overlap.
    ///
    /// # Safety
    /// `src` must be valid for reads and `dst` for writes of `len` bytes.
    unsafe fn fallback_move(&self, dst: *mut u8, src: *const u8, len: usize);
}

/// Strategies built on `core::ptr::copy`, for targets without the fast instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortablePrimitives;

impl MovePrimitives for PortablePrimitives {
    #[inline]
    unsafe fn byte_move(&self, dst: *mut u8, src: *const u8, len: usize) {
        ptr::copy(src, dst, len);
    }

    #[inline]
    unsafe fn word_move(&self, dst: *mut u8, src: *const u8, len: usize) -> WordMove {
        let copied = len & !(WORD - 1);
        ptr::copy(src, dst, copied);
        WordMove {
            remaining: len - copied,
            copied,
        }
    }

    #[inline]
    unsafe fn fallback_move(&self, dst: *mut u8, src: *const u8, len: usize) {
        ptr::copy(src, dst, len);
    }
}

/// The primitives for the compilation target.
#[cfg(all(target_arch = "x86_64", not(miri), not(feature = "portable")))]
pub type NativePrimitives = crate::x86::RepMovs;

/// The primitives for the compilation target.
#[cfg(not(all(target_arch = "x86_64", not(miri), not(feature = "portable"))))]
pub type NativePrimitives = PortablePrimitives;
