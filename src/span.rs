//! Borrowed views over the source and destination of a move.
//!
//! `Span` and `SpanMut` never hand out references to their elements. That is what allows a
//! `SpanMut` and a `Span` into the same buffer to exist at the same time, see
//! [`overlapping_spans`].

use core::marker::PhantomData;
use core::mem;
use core::ops::Range;

/// A read-only view of `len` contiguous elements, the source of a move.
///
/// # Invariants
///   - `ptr` is non-null, aligned and valid for reads of `len` elements for `'a`.
///   - `len * size_of::<T>()` does not exceed `isize::MAX`.
pub struct Span<'a, T> {
    ptr: *const T,
    len: usize,
    _marker: PhantomData<&'a [T]>,
}

/// A writable view of `len` contiguous elements, the destination of a move.
///
/// # Invariants
///   - `ptr` is non-null, aligned and valid for reads and writes of `len` elements for `'a`.
///   - `len * size_of::<T>()` does not exceed `isize::MAX`.
pub struct SpanMut<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: a `Span` is a shared borrow and a `SpanMut` an exclusive one, same as slices.
unsafe impl<T: Sync> Send for Span<'_, T> {}
unsafe impl<T: Sync> Sync for Span<'_, T> {}
unsafe impl<T: Send> Send for SpanMut<'_, T> {}
unsafe impl<T: Sync> Sync for SpanMut<'_, T> {}

impl<T> Clone for Span<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<'_, T> {}

impl<'a, T> Span<'a, T> {
    /// Creates a span from a pointer and an element count.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` elements for the lifetime `'a`, and the memory
    /// must not be written through anything but a [`SpanMut`] during that time.
    ///
    /// # Panics
    /// Panics if `ptr` is null or misaligned, or if the span covers more than `isize::MAX` bytes.
    #[track_caller]
    pub unsafe fn from_raw_parts(ptr: *const T, len: usize) -> Self {
        check_raw_parts(ptr, len);
        Span {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the span has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base location of the span.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }
}

impl<'a, T> SpanMut<'a, T> {
    /// Creates a writable span from a pointer and an element count.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` elements for the lifetime `'a`, and the
    /// memory must not be accessed through anything but a [`Span`] during that time.
    ///
    /// # Panics
    /// Panics if `ptr` is null or misaligned, or if the span covers more than `isize::MAX` bytes.
    #[track_caller]
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        check_raw_parts(ptr as *const T, len);
        SpanMut {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the span has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base location of the span.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// Base location of the span, for address comparisons.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }
}

impl<'a, T> From<&'a [T]> for Span<'a, T> {
    #[inline]
    fn from(slice: &'a [T]) -> Self {
        Span {
            ptr: slice.as_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T> From<&'a mut [T]> for Span<'a, T> {
    #[inline]
    fn from(slice: &'a mut [T]) -> Self {
        Span::from(&*slice)
    }
}

impl<'a, T> From<&'a mut [T]> for SpanMut<'a, T> {
    #[inline]
    fn from(slice: &'a mut [T]) -> Self {
        SpanMut {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }
}

/// Splits `buf` into a destination view at `dest` and a source view over `src`, both
/// `src.len()` elements long. The two views may overlap, the shape of [`slice::copy_within`].
///
/// # Panics
/// Panics if `src` is inverted, or if `src` or `dest..dest + src.len()` exceeds `buf.len()`.
#[track_caller]
pub fn overlapping_spans<T>(
    buf: &mut [T],
    src: Range<usize>,
    dest: usize,
) -> (SpanMut<'_, T>, Span<'_, T>) {
    if src.start > src.end {
        range_order_fail(src.start, src.end);
    }
    if src.end > buf.len() {
        range_end_fail(src.end, buf.len());
    }
    let count = src.end - src.start;
    if dest > buf.len() - count {
        dest_out_of_bounds_fail(dest, count, buf.len());
    }

    let base = buf.as_mut_ptr();
    // SAFETY: both ranges were checked against `buf.len()` above.
    let (dst_ptr, src_ptr) = unsafe { (base.add(dest), base.add(src.start) as *const T) };
    (
        SpanMut {
            ptr: dst_ptr,
            len: count,
            _marker: PhantomData,
        },
        Span {
            ptr: src_ptr,
            len: count,
            _marker: PhantomData,
        },
    )
}

/// The unchecked byte extent the move primitives work on.
///
/// # Invariants
///   - `src` is valid for reads and `dst` for writes of `len` bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Extent {
    pub(crate) dst: *mut u8,
    pub(crate) src: *const u8,
    pub(crate) len: usize,
}

impl Extent {
    /// # Safety
    /// `src` must be valid for reads and `dst` for writes of `len` bytes.
    #[inline]
    pub(crate) unsafe fn new(dst: *mut u8, src: *const u8, len: usize) -> Self {
        Extent { dst, src, len }
    }

    /// The extent left after the first `copied` bytes.
    ///
    /// # Safety
    /// `copied` must not exceed `self.len`.
    #[inline]
    pub(crate) unsafe fn advance(self, copied: usize) -> Self {
        debug_assert!(copied <= self.len);
        Extent {
            dst: self.dst.add(copied),
            src: self.src.add(copied),
            len: self.len - copied,
        }
    }
}

#[track_caller]
fn check_raw_parts<T>(ptr: *const T, len: usize) {
    if ptr.is_null() {
        null_span_fail();
    }
    if (ptr as usize) % mem::align_of::<T>() != 0 {
        misaligned_span_fail(ptr as usize, mem::align_of::<T>());
    }
    let fits = len
        .checked_mul(mem::size_of::<T>())
        .map_or(false, |bytes| bytes <= isize::MAX as usize);
    if !fits {
        span_too_large_fail(len, mem::size_of::<T>());
    }
}

#[inline(never)]
#[cold]
#[track_caller]
fn null_span_fail() -> ! {
    panic!("span base pointer is null");
}

#[inline(never)]
#[cold]
#[track_caller]
fn misaligned_span_fail(addr: usize, align: usize) -> ! {
    panic!(
        "span base pointer ({:#x}) is not aligned to {} bytes",
        addr, align,
    );
}

#[inline(never)]
#[cold]
#[track_caller]
fn span_too_large_fail(len: usize, width: usize) -> ! {
    panic!(
        "span of {} elements of {} bytes exceeds isize::MAX bytes",
        len, width,
    );
}

#[inline(never)]
#[cold]
#[track_caller]
fn range_order_fail(start: usize, end: usize) -> ! {
    panic!("source range starts at {} but ends at {}", start, end);
}

#[inline(never)]
#[cold]
#[track_caller]
fn range_end_fail(end: usize, len: usize) -> ! {
    panic!(
        "source range end ({}) is out of range for buffer of length {}",
        end, len,
    );
}

#[inline(never)]
#[cold]
#[track_caller]
fn dest_out_of_bounds_fail(dest: usize, count: usize, len: usize) -> ! {
    panic!(
        "destination ({}..{}) is out of range for buffer of length {}",
        dest,
        dest.saturating_add(count),
        len,
    );
}
