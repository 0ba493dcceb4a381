//! Bounded pool of view buffers.
//!
//! One pool exists per pyramid level, pre-allocating
//! `min(num_parallel_views, num_tiles)` buffers sized for that level's
//! views. Acquisition blocks until a buffer is released; the pool bounds
//! the engine's in-flight memory no matter how fast requests arrive.

use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Condvar, Mutex};

use crate::pixel::Pixel;
use crate::view::request::ViewRequest;
use crate::view::View;

pub(crate) struct PoolShared<P> {
    state: Mutex<PoolState<P>>,
    available: Condvar,
}

struct PoolState<P> {
    buffers: Vec<Vec<P>>,
    closed: bool,
}

impl<P: Pixel> PoolShared<P> {
    /// Return a buffer to the pool and wake one waiting acquirer.
    pub(crate) fn put_back(&self, buffer: Vec<P>) {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            state.buffers.push(buffer);
            self.available.notify_one();
        }
    }
}

/// Fixed pool of pre-allocated view buffers for one level.
///
/// Clones share the same buffers; the engine keeps one handle to close the
/// pool at shutdown while the view-loader stage owns another.
pub struct ViewPool<P: Pixel> {
    shared: Arc<PoolShared<P>>,
    size: usize,
}

impl<P: Pixel> Clone for ViewPool<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            size: self.size,
        }
    }
}

impl<P: Pixel> ViewPool<P> {
    /// Pre-allocate `size` buffers of `buffer_len` samples each.
    pub fn new(size: usize, buffer_len: usize) -> Self {
        let buffers = (0..size).map(|_| vec![P::default(); buffer_len]).collect();
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    buffers,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
            size,
        }
    }

    /// Number of buffers the pool was created with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of buffers currently available.
    pub fn available(&self) -> usize {
        self.shared.state.lock().unwrap().buffers.len()
    }

    /// Block until a buffer is free, then wrap it into a view for `request`.
    ///
    /// The view must be released `release_count` times before its buffer
    /// returns to the pool. Returns `None` once the pool has been closed,
    /// which is how shutdown cancels blocked acquirers.
    pub fn acquire(&self, request: ViewRequest, release_count: u32) -> Option<Arc<View<P>>> {
        let mut state = self.shared.state.lock().unwrap();
        let buffer = loop {
            if state.closed {
                return None;
            }
            if let Some(buffer) = state.buffers.pop() {
                break buffer;
            }
            state = self.shared.available.wait(state).unwrap();
        };
        drop(state);

        Some(Arc::new(View::new(
            request,
            buffer,
            AtomicU32::new(release_count),
            Arc::clone(&self.shared),
        )))
    }

    /// Close the pool: blocked and future acquisitions return `None`.
    pub fn close(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        self.shared.available.notify_all();
    }
}
