//! Strategy selection for bulk moves.
//!
//! A move of `n = min(dst.len(), src.len())` elements is
//!   - skipped when `n == 0` or both spans start at the same address,
//!   - done with a fast forward strategy when it is larger than [`THRESHOLD`] bytes, the CPU
//!     has a fast instruction and an ascending copy cannot clobber unread source data,
//!   - done with the fallback otherwise.
//!
//! The word strategy may leave a tail, which is finished with the fallback.

use core::mem;
use core::ops::Range;

use crate::caps::Capabilities;
use crate::overlap::can_use_forward_move;
use crate::primitives::{MovePrimitives, NativePrimitives, WordMove};
use crate::span::{overlapping_spans, Extent, Span, SpanMut};

/// Moves of at most this many bytes always use the fallback.
pub const THRESHOLD: usize = 15500;

/// Fixed-width values that can be moved bytewise: no destructor, no self references.
///
/// Implemented for every `Copy` type, e.g. integers, floats, `usize`, raw pointers,
/// `&'static str` and arrays or `Copy` structs of those.
pub trait Movable: Copy {}

impl<T: Copy> Movable for T {}

/// What a move does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Nothing to copy: empty move or same base address.
    Skip,
    /// Ascending `rep movsb` over the whole extent.
    ByteMove,
    /// Ascending `rep movsq`, tail through the fallback.
    WordMove,
    /// The overlap-safe fallback.
    Fallback,
}

/// Chooses and runs a [`Strategy`] for each move.
///
/// The capabilities are passed in rather than read from a global, so tests and benchmarks can
/// force a path. [`Dispatcher::native`] uses the process wide [`Capabilities::get`].
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<P = NativePrimitives> {
    caps: Capabilities,
    primitives: P,
}

impl Dispatcher<NativePrimitives> {
    /// The dispatcher for the running processor.
    #[inline]
    pub fn native() -> Self {
        Dispatcher::with_capabilities(Capabilities::get(), NativePrimitives::default())
    }
}

impl Default for Dispatcher<NativePrimitives> {
    fn default() -> Self {
        Dispatcher::native()
    }
}

impl<P: MovePrimitives> Dispatcher<P> {
    /// A dispatcher using `primitives` and trusting `caps`.
    pub const fn with_capabilities(caps: Capabilities, primitives: P) -> Self {
        Dispatcher { caps, primitives }
    }

    /// The capabilities the dispatcher trusts.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Picks the strategy for moving `n` elements of `width` bytes from address `src` to
    /// address `dst`. Pure, no memory is touched.
    ///
    /// # Panics
    /// Panics if `n * width` overflows `usize`.
    #[inline]
    #[track_caller]
    pub fn plan(&self, dst: usize, src: usize, n: usize, width: usize) -> Strategy {
        if n == 0 || dst == src {
            return Strategy::Skip;
        }
        let byte_len = byte_len(n, width);
        if byte_len > THRESHOLD && self.caps.any() && can_use_forward_move(dst, src, n, width) {
            if self.caps.fast_byte_move {
                Strategy::ByteMove
            } else {
                Strategy::WordMove
            }
        } else {
            Strategy::Fallback
        }
    }

    /// Moves `min(dst.len(), src.len())` elements from `src` to `dst`.
    ///
    /// Returns the number of elements moved, `0` if the spans start at the same address.
    #[inline]
    pub fn move_span<T: Movable>(&self, dst: SpanMut<'_, T>, src: Span<'_, T>) -> usize {
        let n = dst.len().min(src.len());
        let strategy = self.plan(
            dst.as_ptr() as usize,
            src.as_ptr() as usize,
            n,
            mem::size_of::<T>(),
        );
        self.run(strategy, dst, src, n)
    }

    /// Like [`Dispatcher::move_span`], but uses [`Strategy::ByteMove`] for every non-empty move
    /// an ascending copy is safe for, no matter the size.
    ///
    /// # Panics
    /// Panics if the dispatcher's capabilities lack `fast_byte_move`.
    #[inline]
    #[track_caller]
    pub fn move_span_bytewise<T: Movable>(&self, dst: SpanMut<'_, T>, src: Span<'_, T>) -> usize {
        if !self.caps.fast_byte_move {
            missing_capability_fail("fast_byte_move");
        }
        self.move_span_forced(Strategy::ByteMove, dst, src)
    }

    /// Like [`Dispatcher::move_span`], but uses [`Strategy::WordMove`] for every non-empty move
    /// an ascending copy is safe for, no matter the size.
    ///
    /// # Panics
    /// Panics if the dispatcher's capabilities lack `fast_word_arch`.
    #[inline]
    #[track_caller]
    pub fn move_span_wordwise<T: Movable>(&self, dst: SpanMut<'_, T>, src: Span<'_, T>) -> usize {
        if !self.caps.fast_word_arch {
            missing_capability_fail("fast_word_arch");
        }
        self.move_span_forced(Strategy::WordMove, dst, src)
    }

    /// [`Dispatcher::move_span`] over two slices.
    #[inline]
    pub fn move_slice<T: Movable>(&self, dst: &mut [T], src: &[T]) -> usize {
        self.move_span(dst.into(), src.into())
    }

    /// Moves `buf[src]` to `buf[dest..]`, like [`slice::copy_within`].
    ///
    /// Returns the number of elements moved, `0` if `src.start == dest`.
    ///
    /// # Panics
    /// Panics if `src` is inverted or either range exceeds `buf.len()`.
    #[inline]
    #[track_caller]
    pub fn move_within<T: Movable>(&self, buf: &mut [T], src: Range<usize>, dest: usize) -> usize {
        let (dst, src) = overlapping_spans(buf, src, dest);
        self.move_span(dst, src)
    }

    fn move_span_forced<T: Movable>(
        &self,
        forced: Strategy,
        dst: SpanMut<'_, T>,
        src: Span<'_, T>,
    ) -> usize {
        let n = dst.len().min(src.len());
        let (dst_addr, src_addr) = (dst.as_ptr() as usize, src.as_ptr() as usize);
        let strategy = if n == 0 || dst_addr == src_addr {
            Strategy::Skip
        } else if can_use_forward_move(dst_addr, src_addr, n, mem::size_of::<T>()) {
            forced
        } else {
            Strategy::Fallback
        };
        self.run(strategy, dst, src, n)
    }

    #[inline]
    fn run<T: Movable>(
        &self,
        strategy: Strategy,
        mut dst: SpanMut<'_, T>,
        src: Span<'_, T>,
        n: usize,
    ) -> usize {
        if strategy == Strategy::Skip {
            return 0;
        }
        // Cannot overflow: spans never cover more than isize::MAX bytes.
        let len = n * mem::size_of::<T>();
        // SAFETY: both spans are valid for at least `n` elements.
        unsafe {
            let extent = Extent::new(dst.as_mut_ptr() as *mut u8, src.as_ptr() as *const u8, len);
            self.execute(strategy, extent);
        }
        n
    }

    /// # Safety
    /// `extent` must be valid, and for the forward strategies an ascending copy must be safe.
    unsafe fn execute(&self, strategy: Strategy, extent: Extent) {
        match strategy {
            Strategy::Skip => {}
            Strategy::ByteMove => {
                tracing::trace!(bytes = extent.len, "byte move");
                self.primitives.byte_move(extent.dst, extent.src, extent.len);
            }
            Strategy::WordMove => {
                tracing::trace!(bytes = extent.len, "word move");
                let WordMove { remaining, copied } =
                    self.primitives.word_move(extent.dst, extent.src, extent.len);
                debug_assert_eq!(remaining + copied, extent.len);
                if remaining > 0 {
                    let tail = extent.advance(copied);
                    self.primitives.fallback_move(tail.dst, tail.src, tail.len);
                }
            }
            Strategy::Fallback => {
                self.primitives.fallback_move(extent.dst, extent.src, extent.len);
            }
        }
    }
}

#[inline]
#[track_caller]
fn byte_len(n: usize, width: usize) -> usize {
    match n.checked_mul(width) {
        Some(len) => len,
        None => byte_len_overflow_fail(n, width),
    }
}

#[inline(never)]
#[cold]
#[track_caller]
fn byte_len_overflow_fail(n: usize, width: usize) -> ! {
    panic!(
        "moving {} elements of {} bytes overflows the address space",
        n, width,
    );
}

#[inline(never)]
#[cold]
#[track_caller]
fn missing_capability_fail(capability: &str) -> ! {
    panic!(
        "forced move requires the {} capability, which is not available",
        capability,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::PortablePrimitives;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use proptest::{prop_assert, prop_assert_eq, proptest};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Byte(usize),
        Word(usize),
        Fallback(usize),
    }

    /// Portable primitives that record every call. `word_move` leaves `word_tail` words to the
    /// caller on top of the partial word.
    #[derive(Default)]
    struct Recording {
        calls: RefCell<Vec<Call>>,
        word_tail: usize,
    }

    impl Recording {
        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl MovePrimitives for &Recording {
        unsafe fn byte_move(&self, dst: *mut u8, src: *const u8, len: usize) {
            self.calls.borrow_mut().push(Call::Byte(len));
            PortablePrimitives.byte_move(dst, src, len)
        }

        unsafe fn word_move(&self, dst: *mut u8, src: *const u8, len: usize) -> WordMove {
            self.calls.borrow_mut().push(Call::Word(len));
            let full = len & !7;
            let copied = full.saturating_sub(self.word_tail * 8);
            PortablePrimitives.byte_move(dst, src, copied);
            WordMove {
                remaining: len - copied,
                copied,
            }
        }

        unsafe fn fallback_move(&self, dst: *mut u8, src: *const u8, len: usize) {
            self.calls.borrow_mut().push(Call::Fallback(len));
            PortablePrimitives.fallback_move(dst, src, len)
        }
    }

    const BYTE: Capabilities = Capabilities::new(true, false);
    const WORD: Capabilities = Capabilities::new(false, true);

    fn portable(caps: Capabilities) -> Dispatcher<PortablePrimitives> {
        Dispatcher::with_capabilities(caps, PortablePrimitives)
    }

    #[test]
    fn plan_degenerate() {
        let all = portable(Capabilities::all());
        assert_eq!(all.plan(0x1000, 0x9000, 0, 8), Strategy::Skip);
        assert_eq!(all.plan(0x9000, 0x9000, 1 << 20, 1), Strategy::Skip);
    }

    #[test]
    fn plan_threshold() {
        let all = portable(Capabilities::all());
        let (dst, src) = (0x10_0000, 0x20_0000);
        assert_eq!(all.plan(dst, src, THRESHOLD, 1), Strategy::Fallback);
        assert_eq!(all.plan(dst, src, THRESHOLD + 1, 1), Strategy::ByteMove);
        assert_eq!(all.plan(dst, src, THRESHOLD / 4, 4), Strategy::Fallback);
        assert_eq!(all.plan(dst, src, THRESHOLD / 4 + 1, 4), Strategy::ByteMove);
        assert_eq!(all.plan(dst, src, 1938, 8), Strategy::ByteMove);
        assert_eq!(all.plan(dst, src, 1937, 8), Strategy::Fallback);
    }

    #[test]
    fn plan_capabilities() {
        let (dst, src, n) = (0x10_0000, 0x20_0000, 1 << 16);
        assert_eq!(portable(Capabilities::all()).plan(dst, src, n, 1), Strategy::ByteMove);
        assert_eq!(portable(BYTE).plan(dst, src, n, 1), Strategy::ByteMove);
        assert_eq!(portable(WORD).plan(dst, src, n, 1), Strategy::WordMove);
        assert_eq!(portable(Capabilities::none()).plan(dst, src, n, 1), Strategy::Fallback);
    }

    #[test]
    fn plan_overlap() {
        let all = portable(Capabilities::all());
        let n = 1 << 16;
        // dst below src: ascending is fine.
        assert_eq!(all.plan(0x10_0000, 0x10_0001, n, 1), Strategy::ByteMove);
        // dst inside src: must fall back.
        assert_eq!(all.plan(0x10_0001, 0x10_0000, n, 1), Strategy::Fallback);
        assert_eq!(all.plan(0x10_0000 + n - 1, 0x10_0000, n, 1), Strategy::Fallback);
        assert_eq!(all.plan(0x10_0000 + n, 0x10_0000, n, 1), Strategy::ByteMove);
    }

    #[test]
    #[should_panic(expected = "overflows the address space")]
    fn plan_overflow() {
        portable(Capabilities::all()).plan(0, 8, usize::MAX / 2, 4);
    }

    #[test]
    fn word_move_finishes_tail_with_fallback() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(WORD, &recording);
        let src = (0..THRESHOLD + 13).map(|i| i as u8).collect::<Vec<_>>();
        let mut dst = vec![0u8; src.len()];
        assert_eq!(dispatcher.move_slice(&mut dst, &src), src.len());
        assert_eq!(dst, src);
        let full = src.len() & !7;
        assert_eq!(
            recording.calls(),
            vec![Call::Word(src.len()), Call::Fallback(src.len() - full)]
        );
    }

    #[test]
    fn word_move_partial_progress() {
        let recording = Recording {
            word_tail: 100,
            ..Recording::default()
        };
        let dispatcher = Dispatcher::with_capabilities(WORD, &recording);
        let src = (0..4000u32).collect::<Vec<_>>();
        let mut dst = vec![0u32; 4000];
        assert_eq!(dispatcher.move_slice(&mut dst, &src), 4000);
        assert_eq!(dst, src);
        assert_eq!(
            recording.calls(),
            vec![Call::Word(16000), Call::Fallback(800)]
        );
    }

    #[test]
    fn word_move_without_tail() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(WORD, &recording);
        let src = vec![7u64; 2000];
        let mut dst = vec![0u64; 2000];
        dispatcher.move_slice(&mut dst, &src);
        assert_eq!(dst, src);
        assert_eq!(recording.calls(), vec![Call::Word(16000)]);
    }

    #[test]
    fn small_moves_use_fallback() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(Capabilities::all(), &recording);
        let src = [1u8; 100];
        let mut dst = [0u8; 200];
        assert_eq!(dispatcher.move_slice(&mut dst, &src), 100);
        assert_eq!(recording.calls(), vec![Call::Fallback(100)]);
        assert_eq!(&dst[..100], &src[..]);
        assert_eq!(&dst[100..], &[0u8; 100][..]);
    }

    #[test]
    fn forced_paths_ignore_threshold() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(Capabilities::all(), &recording);
        let src = [3u16; 10];
        let mut dst = [0u16; 10];
        let moved = dispatcher.move_span_bytewise::<u16>((&mut dst[..]).into(), (&src[..]).into());
        assert_eq!(moved, 10);
        let moved = dispatcher.move_span_wordwise::<u16>((&mut dst[..]).into(), (&src[..]).into());
        assert_eq!(moved, 10);
        assert_eq!(
            recording.calls(),
            vec![Call::Byte(20), Call::Word(20), Call::Fallback(4)]
        );
    }

    #[test]
    fn forced_paths_keep_overlap_check() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(Capabilities::all(), &recording);
        let mut buf = (0..64u8).collect::<Vec<_>>();
        let mut expected = buf.clone();
        expected.copy_within(0..60, 4);

        let (dst, src) = overlapping_spans(&mut buf, 0..60, 4);
        assert_eq!(dispatcher.move_span_bytewise(dst, src), 60);
        assert_eq!(buf, expected);
        assert_eq!(recording.calls(), vec![Call::Fallback(60)]);
    }

    #[test]
    fn forced_paths_skip_self_moves() {
        let recording = Recording::default();
        let dispatcher = Dispatcher::with_capabilities(Capabilities::all(), &recording);
        let mut buf = [1u8; 32];
        let (dst, src) = overlapping_spans(&mut buf, 0..32, 0);
        assert_eq!(dispatcher.move_span_wordwise(dst, src), 0);
        assert!(recording.calls().is_empty());
    }

    #[test]
    #[should_panic(expected = "fast_byte_move")]
    fn bytewise_requires_capability() {
        let src = [0u8; 4];
        let mut dst = [0u8; 4];
        portable(WORD).move_span_bytewise::<u8>((&mut dst[..]).into(), (&src[..]).into());
    }

    #[test]
    #[should_panic(expected = "fast_word_arch")]
    fn wordwise_requires_capability() {
        let src = [0u8; 4];
        let mut dst = [0u8; 4];
        portable(BYTE).move_span_wordwise::<u8>((&mut dst[..]).into(), (&src[..]).into());
    }

    #[test]
    fn self_move_returns_zero() {
        let mut buf = (0..100u32).collect::<Vec<_>>();
        let dispatcher = Dispatcher::native();
        assert_eq!(dispatcher.move_within(&mut buf, 0..100, 0), 0);
        assert_eq!(dispatcher.move_within(&mut buf, 10..20, 10), 0);
        assert_eq!(buf, (0..100u32).collect::<Vec<_>>());
    }

    #[test]
    fn string_handles() {
        let src = ["a", "bc", "def"];
        let mut dst = [""; 3];
        assert_eq!(Dispatcher::native().move_slice(&mut dst, &src), 3);
        assert_eq!(dst, src);
    }

    fn capability_sets() -> [Capabilities; 4] {
        [Capabilities::none(), BYTE, WORD, Capabilities::all()]
    }

    proptest! {
        #[test]
        fn matches_copy_within(
            len in 0usize..40_000,
            src_start in 0usize..40_000,
            dest in 0usize..40_000,
            count in 0usize..40_000,
        ) {
            let src_start = src_start.min(len);
            let count = count.min(len - src_start);
            let dest = dest.min(len - count);
            let original = (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>();
            let mut expected = original.clone();
            expected.copy_within(src_start..src_start + count, dest);

            for caps in capability_sets() {
                let dispatcher = Dispatcher::with_capabilities(caps, NativePrimitives::default());
                let mut buf = original.clone();
                let moved = dispatcher.move_within(&mut buf, src_start..src_start + count, dest);
                prop_assert_eq!(&buf, &expected);
                if src_start == dest {
                    prop_assert_eq!(moved, 0);
                } else {
                    prop_assert_eq!(moved, count);
                }
            }
        }

        #[test]
        fn disjoint_u64(len_dst in 0usize..5000, len_src in 0usize..5000) {
            let src = (0..len_src as u64).collect::<Vec<_>>();
            let mut dst = vec![u64::MAX; len_dst];
            let n = len_dst.min(len_src);
            for caps in capability_sets() {
                dst.fill(u64::MAX);
                let dispatcher = Dispatcher::with_capabilities(caps, NativePrimitives::default());
                prop_assert_eq!(dispatcher.move_slice(&mut dst, &src), n);
                prop_assert_eq!(&dst[..n], &src[..n]);
                prop_assert!(dst[n..].iter().all(|&v| v == u64::MAX));
            }
            assert_le!(n, len_dst);
        }
    }
}
