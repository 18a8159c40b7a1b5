/*! Bulk memory moves with `rep movsb` / `rep movsq` fast paths.

Copies the elements two same-typed spans have in common (`min(dst.len(), src.len())`)
with exact `memmove` semantics, no matter how the spans overlap. Large moves
(more than [`THRESHOLD`] bytes) use the CPU's accelerated string-move instructions when
the processor supports them and an ascending copy cannot clobber unread source data.
Everything else goes through `core::ptr::copy`.

# Examples
```
use fastmove::{fast_move, fast_move_within};

let src = [1u32, 2, 3, 4];
let mut dst = [0u32; 3];
assert_eq!(fast_move(&mut dst, &src), 3);
assert_eq!(dst, [1, 2, 3]);

let mut buf = *b"hello world";
assert_eq!(fast_move_within(&mut buf, 0..5, 6), 5);
assert_eq!(&buf, b"hello hello");
```

# Feature Flags
- `std` (default): caches the detected capabilities in a `OnceLock`, honours the
  `FASTMOVE_CAPS` environment variable and implements `std::error::Error`.
- `portable`: never emits inline assembly, every strategy is built on `core::ptr::copy`.

The environment variable `FASTMOVE_CAPS` masks the detected capabilities, e.g.
`FASTMOVE_CAPS=none` forces the fallback path on capable hardware.
*/

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg_attr(test, macro_use)]
extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate more_asserts;

pub mod caps;
pub mod dispatch;
pub mod overlap;
pub mod primitives;
pub mod span;
#[cfg(all(target_arch = "x86_64", not(miri), not(feature = "portable")))]
pub mod x86;

use core::ops::Range;

pub use caps::{Capabilities, ParseCapabilitiesError, CAPS_ENV_VAR};
pub use dispatch::{Dispatcher, Movable, Strategy, THRESHOLD};
pub use overlap::can_use_forward_move;
pub use primitives::{MovePrimitives, NativePrimitives, PortablePrimitives, WordMove};
pub use span::{overlapping_spans, Span, SpanMut};

/// Moves `min(dst.len(), src.len())` elements from `src` to `dst`.
///
/// Returns the number of elements moved.
#[inline]
pub fn fast_move<T: Movable>(dst: &mut [T], src: &[T]) -> usize {
    Dispatcher::native().move_slice(dst, src)
}

/// Moves the elements of `buf[src]` to `buf[dest..]`, like [`slice::copy_within`].
///
/// Returns the number of elements moved, which is `0` when `src.start == dest`.
///
/// # Panics
/// Panics if `src` is inverted or either range exceeds `buf.len()`.
#[inline]
pub fn fast_move_within<T: Movable>(buf: &mut [T], src: Range<usize>, dest: usize) -> usize {
    Dispatcher::native().move_within(buf, src, dest)
}

/// Like [`fast_move`], but always takes the `rep movsb` path when an ascending copy is safe,
/// regardless of the move size.
///
/// # Panics
/// Panics if the running CPU does not report fast byte moves.
#[inline]
pub fn fast_move_bytewise<T: Movable>(dst: &mut [T], src: &[T]) -> usize {
    Dispatcher::native().move_span_bytewise(dst.into(), src.into())
}

/// Like [`fast_move`], but always takes the `rep movsq` path when an ascending copy is safe,
/// regardless of the move size.
///
/// # Panics
/// Panics if the running CPU does not report the x86-64 word-move baseline.
#[inline]
pub fn fast_move_wordwise<T: Movable>(dst: &mut [T], src: &[T]) -> usize {
    Dispatcher::native().move_span_wordwise(dst.into(), src.into())
}
