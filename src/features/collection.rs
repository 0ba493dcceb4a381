//! Feature collections: the user-visible result of mask analysis.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::thread;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::features::analyzer::{Connectivity, ViewAnalyzer};
use crate::features::bounding_box::BoundingBox;
use crate::features::feature::{bitmask_words, Feature};
use crate::features::merger::BlobMerger;
use crate::options::EngineOptions;
use crate::pixel::Pixel;
use crate::reader::TileReader;

/// A set of labeled regions extracted from a mask image.
///
/// Features are stored with their image dimensions; point queries scan the
/// feature list, filtering on the bounding box before testing the bitmask.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeatureCollection {
    image_height: u32,
    image_width: u32,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the collection by streaming a mask image through the engine.
    ///
    /// Uses one analyzer thread per available core and a view pool of four
    /// views per thread, the defaults of the reference implementation.
    pub fn from_reader<P: Pixel>(
        reader: impl TileReader<P> + 'static,
        connectivity: Connectivity,
        background: P,
    ) -> Result<Self> {
        let threads = thread::available_parallelism().map_or(8, |n| n.get());
        Self::from_reader_with(reader, connectivity, background, threads, 4 * threads as u32)
    }

    /// [`from_reader`](Self::from_reader) with explicit worker and view
    /// pool sizes.
    pub fn from_reader_with<P: Pixel>(
        reader: impl TileReader<P> + 'static,
        connectivity: Connectivity,
        background: P,
        num_threads: usize,
        num_parallel_views: u32,
    ) -> Result<Self> {
        let num_threads = num_threads.max(1);

        // Radius 1 gives every view one pixel of its neighbors, which is
        // what links components across tile boundaries.
        let mut engine = Engine::open(reader, 1)?;
        engine.configure(EngineOptions::default().with_num_parallel_views(num_parallel_views));
        engine.run()?;

        let image_height = engine.image_height(0);
        let image_width = engine.image_width(0);
        let analyzer = ViewAnalyzer::new(
            connectivity,
            background,
            image_height,
            image_width,
            Arc::new(AtomicU32::new(0)),
        );

        info!(
            image_height,
            image_width,
            rank = connectivity.rank(),
            threads = num_threads,
            "building feature collection"
        );

        let (view_tx, view_rx) = crossbeam_channel::unbounded::<crate::view::ViewHandle<P>>();
        let (analysis_tx, analysis_rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let view_rx = view_rx.clone();
            let analysis_tx = analysis_tx.clone();
            let analyzer = analyzer.clone();
            workers.push(thread::spawn(move || {
                for view in view_rx.iter() {
                    let analysis = analyzer.analyze(&view);
                    view.release();
                    if analysis_tx.send(analysis).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(view_rx);
        drop(analysis_tx);

        engine.request_all_tiles(true, 0)?;
        let mut feed_result = Ok(());
        loop {
            match engine.next_view_blocking() {
                Ok(Some(view)) => {
                    if view_tx.send(view).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    feed_result = Err(err);
                    break;
                }
            }
        }
        drop(view_tx);

        let mut merger = BlobMerger::new();
        for analysis in analysis_rx.iter() {
            merger.absorb(analysis);
        }
        for worker in workers {
            let _ = worker.join();
        }
        engine.wait_for_complete();
        feed_result?;

        let blobs = merger.finish();
        debug!(components = blobs.len(), "packing features");
        let features: Vec<Feature> = blobs
            .par_iter()
            .enumerate()
            .map(|(index, blob)| Feature::from_blob(index as u32, blob))
            .collect();

        Ok(Self {
            image_height,
            image_width,
            features,
        })
    }

    /// Image height the collection was built for.
    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    /// Image width the collection was built for.
    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    /// Set the image dimensions (required before adding features by hand).
    pub fn set_image_dimensions(&mut self, height: u32, width: u32) {
        self.image_height = height;
        self.image_width = width;
    }

    /// All features.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Append a feature built from an external bitmask.
    pub fn add_feature(&mut self, id: u32, bounding_box: BoundingBox, bitmask: &[u32]) -> Result<()> {
        let feature = Feature::new(id, bounding_box, bitmask.to_vec())?;
        self.features.push(feature);
        Ok(())
    }

    /// The feature whose bitmask covers pixel `(row, col)`, if any.
    pub fn feature_from_pixel(&self, row: u32, col: u32) -> Option<&Feature> {
        self.features
            .iter()
            .find(|feature| feature.is_in_bitmask(row, col))
    }

    /// The feature with identifier `id`, if any.
    pub fn feature_from_id(&self, id: u32) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.id() == id)
    }

    /// Serialize to the whitespace-separated ASCII format.
    ///
    /// Layout: `image_height image_width num_features`, then per feature
    /// `id num_words ul_row ul_col br_row br_col word...`. The bitmask
    /// word layout is normative; see [`Feature`].
    pub fn serialize(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        write!(
            out,
            "{} {} {} ",
            self.image_height,
            self.image_width,
            self.features.len()
        )
        .expect("writing to a String cannot fail");
        for feature in &self.features {
            feature.serialize_into(&mut out);
        }
        out
    }

    /// Parse a collection from the ASCII format.
    pub fn deserialize(input: &str) -> Result<Self> {
        let mut tokens = input.split_whitespace();
        let mut next = |what: &str| -> Result<u32> {
            tokens
                .next()
                .ok_or_else(|| Error::Format(format!("feature stream truncated at {what}")))?
                .parse::<u32>()
                .map_err(|_| Error::Format(format!("feature stream: invalid {what}")))
        };

        let image_height = next("image height")?;
        let image_width = next("image width")?;
        let num_features = next("feature count")?;

        let mut features = Vec::with_capacity(num_features as usize);
        for _ in 0..num_features {
            features.push(Feature::deserialize_from(&mut tokens)?);
        }
        Ok(Self {
            image_height,
            image_width,
            features,
        })
    }

    /// Serialize to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.serialize())?;
        Ok(())
    }

    /// Load a collection from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let input = fs::read_to_string(path)?;
        Self::deserialize(&input)
    }

    /// Total number of bitmask words across all features (diagnostics).
    pub fn bitmask_words(&self) -> usize {
        self.features
            .iter()
            .map(|feature| bitmask_words(feature.bounding_box()))
            .sum()
    }
}
