//! View-counter stage.
//!
//! Last stage of the pipeline: counts tile arrivals per view, fills the
//! ghost border once a view is complete, and emits it: immediately in
//! unordered mode, or gated by the user's traversal order otherwise.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::request::TileRequest;
use crate::pixel::Pixel;
use crate::view::{FillKind, ViewHandle};

/// Queue of traversal queues registered by the request calls.
///
/// Each `request_*` call pushes the sequence of tile coordinates it
/// enumerated; the counter consumes them front to back to decide which
/// completed view may be emitted next.
pub(crate) type TraversalQueue = Arc<Mutex<VecDeque<VecDeque<(u32, u32)>>>>;

pub(crate) fn run<P: Pixel>(
    loaded: Receiver<TileRequest<P>>,
    output: Sender<ViewHandle<P>>,
    fill: FillKind,
    ordered: bool,
    traversals: TraversalQueue,
) {
    let mut counter = ViewCounter {
        output,
        fill,
        ordered,
        traversals,
        pending: HashMap::new(),
        waiting: Vec::new(),
        current: VecDeque::new(),
    };

    for request in loaded.iter() {
        counter.on_tile(request);
    }
}

struct ViewCounter<P: Pixel> {
    output: Sender<ViewHandle<P>>,
    fill: FillKind,
    ordered: bool,
    traversals: TraversalQueue,
    /// Tiles still expected per in-flight view, keyed by view identity.
    pending: HashMap<usize, u32>,
    /// Completed views parked until the traversal order admits them.
    waiting: Vec<ViewHandle<P>>,
    /// Remainder of the traversal currently being emitted.
    current: VecDeque<(u32, u32)>,
}

impl<P: Pixel> ViewCounter<P> {
    fn on_tile(&mut self, request: TileRequest<P>) {
        let view = request.view;
        let expected = view.request().tiles_to_load;

        let complete = if expected == 1 {
            true
        } else {
            let key = Arc::as_ptr(&view) as usize;
            match self.pending.get_mut(&key) {
                None => {
                    // First arrival: this tile itself is already accounted.
                    self.pending.insert(key, expected - 1);
                    false
                }
                Some(remaining) => {
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.pending.remove(&key);
                        true
                    } else {
                        false
                    }
                }
            }
        };

        if complete {
            view.fill_ghost(self.fill);
            self.ready(view);
        }
    }

    fn ready(&mut self, view: ViewHandle<P>) {
        if !self.ordered {
            let _ = self.output.send(view);
            return;
        }

        self.advance_traversal();
        if self.is_next(&view) {
            let _ = self.output.send(view);
            self.current.pop_front();
            self.drain_waiting();
        } else {
            self.waiting.push(view);
        }
    }

    /// Move to the next registered traversal when the current one is spent.
    fn advance_traversal(&mut self) {
        if self.current.is_empty() {
            if let Some(next) = self.traversals.lock().unwrap().pop_front() {
                self.current = next;
            }
        }
    }

    fn is_next(&self, view: &ViewHandle<P>) -> bool {
        self.current
            .front()
            .is_some_and(|&(row, col)| view.row() == row && view.col() == col)
    }

    /// Emit every parked view the new traversal head unblocks.
    fn drain_waiting(&mut self) {
        loop {
            self.advance_traversal();
            let Some(&(row, col)) = self.current.front() else {
                return;
            };
            let Some(index) = self
                .waiting
                .iter()
                .position(|view| view.row() == row && view.col() == col)
            else {
                return;
            };
            let view = self.waiting.swap_remove(index);
            let _ = self.output.send(view);
            self.current.pop_front();
        }
    }
}
