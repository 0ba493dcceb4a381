//! Cross-view blob merging.

use std::collections::HashMap;

use tracing::debug;

use crate::features::analyzer::ViewAnalysis;
use crate::features::blob::Blob;
use crate::features::union_find::UnionFind;

/// Collects every view's analysis and consolidates blobs that span tiles.
///
/// Merge edges recorded by the analyzer name a blob and a global
/// coordinate in a neighboring tile; once all views are in, each edge is
/// resolved to the blob owning that coordinate and the equivalence classes
/// are collapsed with union-find. Every class is merged into its member
/// with the largest pixel count.
#[derive(Debug, Default)]
pub struct BlobMerger {
    blobs: Vec<Blob>,
    edges: HashMap<u32, Vec<(u32, u32)>>,
    views_received: u32,
}

impl BlobMerger {
    /// Create an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of view analyses absorbed so far.
    pub fn views_received(&self) -> u32 {
        self.views_received
    }

    /// Fold one view's analysis into the merger.
    pub fn absorb(&mut self, analysis: ViewAnalysis) {
        for (tag, coord) in analysis.merges {
            self.edges.entry(tag).or_default().push(coord);
        }
        self.blobs.extend(analysis.blobs);
        self.views_received += 1;
    }

    /// Resolve all merge edges and return one blob per global component,
    /// sorted by tag for deterministic output.
    pub fn finish(self) -> Vec<Blob> {
        let BlobMerger { blobs, edges, .. } = self;

        let mut union_find = UnionFind::new();
        for (tag, coords) in &edges {
            for &(row, col) in coords {
                // The edge target lies in a neighboring tile; find the blob
                // that claimed it there.
                if let Some(other) = blobs.iter().find(|blob| blob.contains(row, col)) {
                    union_find.union(*tag, other.tag());
                }
            }
        }

        // Group members per class root.
        let mut classes: HashMap<u32, Vec<Blob>> = HashMap::new();
        for blob in blobs {
            classes.entry(union_find.find(blob.tag())).or_default().push(blob);
        }

        let mut merged = Vec::with_capacity(classes.len());
        for (_, mut members) in classes {
            // Merge into the member with the largest pixel count (smallest
            // tag breaks ties so output is deterministic).
            let mut best = 0;
            for index in 1..members.len() {
                let candidate = &members[index];
                if candidate.count() > members[best].count()
                    || (candidate.count() == members[best].count()
                        && candidate.tag() < members[best].tag())
                {
                    best = index;
                }
            }
            let mut destination = members.swap_remove(best);
            for member in members {
                destination.merge_from(member);
            }
            merged.push(destination);
        }
        merged.sort_by_key(Blob::tag);
        debug!(components = merged.len(), "blob merge complete");
        merged
    }
}
