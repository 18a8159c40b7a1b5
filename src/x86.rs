//! `rep movsb` / `rep movsq` strategies for x86-64.

use core::arch::asm;
use core::ptr;

use crate::primitives::{MovePrimitives, WordMove, WORD};

/// String-move instructions for the fast strategies, `core::ptr::copy` for the fallback.
///
/// `rep movsb` and `rep movsq` exist on every x86-64 processor. The capability flags only say
/// whether they are fast, so claiming a capability the CPU lacks costs throughput, never
/// correctness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepMovs;

impl MovePrimitives for RepMovs {
    #[inline]
    unsafe fn byte_move(&self, dst: *mut u8, src: *const u8, len: usize) {
        // The direction flag is clear on function entry in both the SysV and Windows ABIs.
        asm!(
            "rep movsb",
            inout("rcx") len => _,
            inout("rdi") dst as usize => _,
            inout("rsi") src as usize => _,
            options(nostack, preserves_flags),
        );
    }

    #[inline]
    unsafe fn word_move(&self, dst: *mut u8, src: *const u8, len: usize) -> WordMove {
        let words = len / WORD;
        asm!(
            "rep movsq",
            inout("rcx") words => _,
            inout("rdi") dst as usize => _,
            inout("rsi") src as usize => _,
            options(nostack, preserves_flags),
        );
        let copied = words * WORD;
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
