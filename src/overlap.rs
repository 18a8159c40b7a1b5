//! Overlap check for ascending (forward) bulk moves.

/// Returns `true` when moving `n` elements of `width` bytes from address `src` to address `dst`
/// in ascending address order produces the same result as a `memmove`.
///
/// An ascending move only reads source data it has already overwritten when `dst` lands
/// strictly inside `(src, src + n * width)`. Disjoint regions, `dst <= src` and empty moves
/// are all safe.
#[inline]
pub fn can_use_forward_move(dst: usize, src: usize, n: usize, width: usize) -> bool {
    dst <= src || dst - src >= n.saturating_mul(width)
}
