//! Connected-component extraction and the resulting feature collections.
//!
//! The flow mirrors the streaming engine it sits on: views (radius 1) are
//! flood-filled into per-tile [`Blob`]s with cross-tile merge edges, a
//! single [`BlobMerger`] consolidates them with union-find, and the result
//! is packed into [`Feature`]s (bounding box + bitmask) collected in a
//! [`FeatureCollection`] that can be queried, serialized and rasterized
//! back into a mask.

mod analyzer;
mod blob;
mod bounding_box;
mod collection;
mod feature;
mod mask;
mod merger;
mod union_find;

pub use analyzer::{Connectivity, ViewAnalysis, ViewAnalyzer};
pub use blob::Blob;
pub use bounding_box::BoundingBox;
pub use collection::FeatureCollection;
pub use feature::Feature;
pub use mask::{rasterize_binary, rasterize_labeled, MaskSink};
pub use merger::BlobMerger;
pub use union_find::UnionFind;
