//! Heap tracking for the timed invocation window.
//!
//! [`TrackingAllocator`] wraps the system allocator and keeps a running count
//! of live heap bytes plus a high-water mark. It has to be installed as the
//! `#[global_allocator]` of the final binary; without it every window reports
//! zero and [`MemoryProfiler::is_tracking`] is false.
//!
//! Only one [`MemoryWindow`] can be open at a time. Opening a window resets
//! the high-water mark to the current live size, so the delta it reports
//! covers allocations made inside the window only.

use crate::error::ProfilerError;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);
static WINDOW_OPEN: AtomicBool = AtomicBool::new(false);

/// Counting wrapper around [`System`].
pub struct TrackingAllocator;

impl TrackingAllocator {
    #[inline]
    fn record_alloc(size: usize) {
        let live = LIVE_BYTES.fetch_add(size, Ordering::Relaxed) + size;
        PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
        if !INSTALLED.load(Ordering::Relaxed) {
            INSTALLED.store(true, Ordering::Relaxed);
        }
    }

    #[inline]
    fn record_dealloc(size: usize) {
        LIVE_BYTES.fetch_sub(size, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        Self::record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old_size = layout.size();
            if new_size > old_size {
                Self::record_alloc(new_size - old_size);
            } else {
                Self::record_dealloc(old_size - new_size);
            }
        }
        new_ptr
    }
}

/// Entry point for opening memory windows.
pub struct MemoryProfiler;

impl MemoryProfiler {
    /// Whether allocations are being counted in this process.
    pub fn is_tracking() -> bool {
        INSTALLED.load(Ordering::Relaxed)
    }

    /// Open the process-wide window. Fails if one is already open.
    pub fn start() -> Result<MemoryWindow, ProfilerError> {
        WINDOW_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProfilerError::AlreadyActive)?;

        let baseline = LIVE_BYTES.load(Ordering::Relaxed);
        PEAK_BYTES.store(baseline, Ordering::Relaxed);
        tracing::trace!(baseline, "memory window opened");
        Ok(MemoryWindow { baseline })
    }
}

/// An open measurement window. Dropping it closes the window.
#[derive(Debug)]
pub struct MemoryWindow {
    baseline: usize,
}

impl MemoryWindow {
    /// Peak bytes above the baseline observed so far.
    pub fn peak_delta(&self) -> u64 {
        PEAK_BYTES
            .load(Ordering::Relaxed)
            .saturating_sub(self.baseline) as u64
    }

    /// Close the window and return the peak delta in bytes.
    pub fn finish(self) -> u64 {
        self.peak_delta()
    }
}

impl Drop for MemoryWindow {
    fn drop(&mut self) {
        WINDOW_OPEN.store(false, Ordering::Release);
        tracing::trace!("memory window closed");
    }
}

/// Serializes tests that open the process-wide window.
#[cfg(test)]
pub(crate) static TEST_WINDOW_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        TEST_WINDOW_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn allocator_is_installed_for_tests() {
        let _v = black_box(vec![0u8; 64]);
        assert!(MemoryProfiler::is_tracking());
    }

    #[test]
    fn window_sees_allocations_inside_it() {
        let _guard = lock();
        let window = MemoryProfiler::start().unwrap();
        let buf = black_box(vec![1u8; 8 << 20]);
        drop(buf);
        let delta = window.finish();
        assert!(delta >= 4 << 20, "delta was {delta}");
    }

    #[test]
    fn allocations_before_the_window_do_not_count() {
        let _guard = lock();
        let before = black_box(vec![1u8; 16 << 20]);
        let window = MemoryProfiler::start().unwrap();
        let delta = window.finish();
        drop(before);
        assert!(delta < 16 << 20, "delta was {delta}");
    }

    #[test]
    fn only_one_window_at_a_time() {
        let _guard = lock();
        let first = MemoryProfiler::start().unwrap();
        assert_eq!(
            MemoryProfiler::start().unwrap_err(),
            ProfilerError::AlreadyActive
        );
        drop(first);
        let second = MemoryProfiler::start().unwrap();
        drop(second);
    }

    #[test]
    fn window_closes_on_panic() {
        let _guard = lock();
        let result = std::panic::catch_unwind(|| {
            let _window = MemoryProfiler::start().unwrap();
            panic!("invoke blew up");
        });
        assert!(result.is_err());
        assert!(MemoryProfiler::start().is_ok());
    }
}
