//! Static partitioning of scan lines over rayon worker threads.
//!
//! Lines are split into contiguous ranges before any line filter runs; each
//! range is processed by one worker, which owns its staging buffers for the
//! duration of the call.

use std::ops::Range;

use crate::Result;

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data outlives the parallel
/// operation and that different threads only write to disjoint samples.
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub(crate) fn from_const(ptr: *const T) -> Self {
        SendPtr(ptr as *mut T)
    }

    pub(crate) fn as_ptr(self) -> *mut T {
        self.0
    }

    pub(crate) fn as_const(self) -> *const T {
        self.0 as *const T
    }
}

/// Minimum number of operations to justify multi-threaded execution.
pub(crate) const MIN_THREAD_OPERATIONS: usize = 1 << 15;

/// Number of worker threads available to a strategy.
pub fn max_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Choose how many threads process `lines` lines totalling `operations`.
pub(crate) fn thread_count(lines: usize, operations: usize, allow: bool) -> usize {
    if !allow || operations < MIN_THREAD_OPERATIONS {
        return 1;
    }
    max_threads().min(lines).max(1)
}

/// Split `0..n` into `parts` contiguous ranges of nearly equal length.
pub(crate) fn partition(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1).min(n.max(1));
    let base = n / parts;
    let extra = n % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for p in 0..parts {
        let len = base + usize::from(p < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Run `f(thread, range)` for every range, in parallel when more than one.
///
/// Returns the first error after all workers have stopped.
pub(crate) fn run_partitioned<F>(ranges: &[Range<usize>], f: F) -> Result<()>
where
    F: Fn(usize, Range<usize>) -> Result<()> + Sync,
{
    #[cfg(feature = "parallel")]
    if ranges.len() > 1 {
        use rayon::prelude::*;
        return ranges
            .par_iter()
            .enumerate()
            .try_for_each(|(thread, range)| f(thread, range.clone()));
    }
    for (thread, range) in ranges.iter().enumerate() {
        f(thread, range.clone())?;
    }
    Ok(())
}
