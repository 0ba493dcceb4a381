//! The view-serving pipeline.
//!
//! ```text
//! ViewRequest ──▶ view loader ──▶ tile loaders (xN, shared cache) ──▶ view counter ──▶ views
//! ```
//!
//! Stages are thread groups joined by unbounded channels; backpressure comes
//! from the view pool (bounding in-flight views) and the tile cache
//! (bounding resident tiles), not from the queues. Shutdown is quiescent:
//! closing the request channel drains each stage in turn, and dropping the
//! last sender of an edge terminates its consumer.

mod request;
mod tile_loader;
mod view_counter;
mod view_loader;

pub use request::TileRequest;
pub(crate) use view_counter::TraversalQueue;

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use tracing::{debug, error};

use crate::cache::TileCache;
use crate::error::Error;
use crate::pixel::Pixel;
use crate::reader::TileReader;
use crate::view::{FillKind, ViewHandle, ViewPool, ViewRequest};

/// First-error latch shared by every worker.
///
/// Streaming errors do not abort the threads (they keep draining so nothing
/// deadlocks); the engine reports the latched error from
/// `next_view_blocking`. Latching also pings a notification channel so a
/// consumer blocked on the output queue wakes up.
#[derive(Clone)]
pub(crate) struct FailureFlag {
    slot: Arc<Mutex<Option<Error>>>,
    notify: Sender<()>,
}

impl FailureFlag {
    fn new() -> (Self, Receiver<()>) {
        let (notify, notified) = bounded(1);
        (
            Self {
                slot: Arc::new(Mutex::new(None)),
                notify,
            },
            notified,
        )
    }

    /// Latch `err` unless an earlier failure is already recorded.
    pub(crate) fn set(&self, err: Error) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            error!(error = %err, "pipeline failed");
            *slot = Some(err);
            let _ = self.notify.try_send(());
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    pub(crate) fn get(&self) -> Option<Error> {
        self.slot.lock().unwrap().clone()
    }
}

pub(crate) struct PipelineConfig {
    pub num_tile_loaders: u32,
    pub fill: FillKind,
    pub ordered: bool,
    pub release_counts: Vec<u32>,
}

/// Running pipeline: channel endpoints plus the worker handles.
pub(crate) struct Pipeline<P: Pixel> {
    requests: Option<Sender<ViewRequest>>,
    output: Receiver<ViewHandle<P>>,
    workers: Vec<JoinHandle<()>>,
    failure: FailureFlag,
    failed: Receiver<()>,
}

impl<P: Pixel> Pipeline<P> {
    /// Spawn all stage workers.
    pub(crate) fn start(
        reader: Arc<dyn TileReader<P>>,
        caches: Vec<Arc<TileCache<P>>>,
        pools: Vec<ViewPool<P>>,
        traversals: TraversalQueue,
        config: PipelineConfig,
    ) -> Self {
        let (request_tx, request_rx) = unbounded::<ViewRequest>();
        let (tile_tx, tile_rx) = unbounded::<TileRequest<P>>();
        let (loaded_tx, loaded_rx) = unbounded::<TileRequest<P>>();
        let (output_tx, output_rx) = unbounded::<ViewHandle<P>>();

        let (failure, failed) = FailureFlag::new();
        let mut workers = Vec::new();

        debug!(
            tile_loaders = config.num_tile_loaders,
            ordered = config.ordered,
            "starting pipeline"
        );

        {
            let release_counts = config.release_counts.clone();
            workers.push(std::thread::spawn(move || {
                view_loader::run(request_rx, tile_tx, pools, release_counts);
            }));
        }

        for _ in 0..config.num_tile_loaders {
            let tile_rx = tile_rx.clone();
            let loaded_tx = loaded_tx.clone();
            let caches = caches.clone();
            let reader = Arc::clone(&reader);
            let failure = failure.clone();
            workers.push(std::thread::spawn(move || {
                tile_loader::run(tile_rx, loaded_tx, caches, reader, failure);
            }));
        }
        drop(tile_rx);
        drop(loaded_tx);

        {
            let fill = config.fill;
            let ordered = config.ordered;
            workers.push(std::thread::spawn(move || {
                view_counter::run(loaded_rx, output_tx, fill, ordered, traversals);
            }));
        }

        Self {
            requests: Some(request_tx),
            output: output_rx,
            workers,
            failure,
            failed,
        }
    }

    /// Enqueue one view request; ignored after the input was closed.
    pub(crate) fn send(&self, request: ViewRequest) {
        if let Some(sender) = &self.requests {
            let _ = sender.send(request);
        }
    }

    /// Close the request channel; stages drain and exit in order.
    pub(crate) fn close_input(&mut self) {
        self.requests = None;
    }

    /// Block for the next completed view.
    ///
    /// Returns `Ok(None)` once the pipeline has drained, or the latched
    /// error if any worker failed.
    pub(crate) fn next_view_blocking(&self) -> crate::error::Result<Option<ViewHandle<P>>> {
        if let Some(err) = self.failure.get() {
            return Err(err);
        }
        select! {
            recv(self.output) -> view => match view {
                Ok(view) => Ok(Some(view)),
                Err(_) => match self.failure.get() {
                    Some(err) => Err(err),
                    None => Ok(None),
                },
            },
            recv(self.failed) -> _ => Err(self
                .failure
                .get()
                .unwrap_or_else(|| Error::Io("pipeline failed".into()))),
        }
    }

    /// Join every worker thread.
    pub(crate) fn join(&mut self) {
        self.close_input();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl<P: Pixel> Drop for Pipeline<P> {
    fn drop(&mut self) {
        self.join();
    }
}
