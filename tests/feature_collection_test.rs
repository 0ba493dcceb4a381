//! Feature-collection tests: hand-built collections, serialization, and
//! end-to-end extraction through the streaming engine.

use std::sync::Arc;

use tilestream::{
    rasterize_binary, rasterize_labeled, BoundingBox, Connectivity, Engine, EngineOptions, Error,
    Feature, FeatureCollection, InMemoryTileReader,
};

/// The five hand-built regions of the reference serialization test.
fn five_region_collection() -> FeatureCollection {
    let regions: [(u32, u32, u32, u32, u32, u32); 5] = [
        (1, 0, 0, 10, 3, 0xAAAA_AAAA),
        (2, 2, 3, 5, 7, 0x5555_5555),
        (3, 6, 10, 13, 13, 0xFFFF_FFFF),
        (4, 10, 5, 13, 8, 0xCCCC_CCCC),
        (5, 6, 5, 10, 10, 0x3333_3333),
    ];

    let mut collection = FeatureCollection::new();
    collection.set_image_dimensions(13, 13);
    for (id, ul_row, ul_col, br_row, br_col, word) in regions {
        collection
            .add_feature(id, BoundingBox::new(ul_row, ul_col, br_row, br_col), &[word])
            .unwrap();
    }
    collection
}

#[test]
fn test_point_queries_on_hand_built_collection() {
    let collection = five_region_collection();

    assert_eq!(collection.feature_from_pixel(0, 0).unwrap().id(), 1);
    assert_eq!(collection.feature_from_pixel(4, 4).unwrap().id(), 2);
    assert_eq!(collection.feature_from_pixel(8, 10).unwrap().id(), 3);
    assert_eq!(collection.feature_from_pixel(11, 6).unwrap().id(), 4);
    assert_eq!(collection.feature_from_pixel(9, 8).unwrap().id(), 5);
    assert!(collection.feature_from_pixel(0, 12).is_none());

    let second = collection.feature_from_id(2).unwrap();
    assert!(second.contains(2, 3));
    assert!(second.contains(2, 4));
    assert!(!second.is_in_bitmask(2, 3));
    assert!(second.is_in_bitmask(2, 4));
}

#[test]
fn test_serialize_round_trip_through_file() {
    let collection = five_region_collection();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.serial");
    collection.save(&path).unwrap();

    let restored = FeatureCollection::load(&path).unwrap();
    assert_eq!(collection, restored);
    assert_eq!(restored.feature_from_pixel(9, 8).unwrap().id(), 5);
}

/// Stripe mask fixture: every tile carries 255 on odd rows, 0 on even
/// rows, so the 48x50 image holds one full-width component per odd row.
fn stripe_reader() -> InMemoryTileReader<u8> {
    InMemoryTileReader::from_fn(48, 50, 16, 16, |row, _| if row % 2 == 1 { 255 } else { 0 })
}

#[test]
fn test_stripe_mask_has_one_component_per_odd_row() {
    let collection =
        FeatureCollection::from_reader(stripe_reader(), Connectivity::Eight, 0u8).unwrap();

    assert_eq!(collection.features().len(), 24);
    for feature in collection.features() {
        let bbox = feature.bounding_box();
        assert_eq!(bbox.height(), 1);
        assert_eq!(bbox.width(), 50, "stripes span the full image width");
        assert_eq!(bbox.ul_row() % 2, 1);
    }
    // Every odd row is covered by some feature, even rows by none.
    for row in 0..48 {
        let hit = collection.feature_from_pixel(row, 25).is_some();
        assert_eq!(hit, row % 2 == 1, "row {row}");
    }
}

#[test]
fn test_stripe_mask_rank_four_matches_rank_eight() {
    // Stripes never touch diagonally, so rank 4 finds the same regions.
    let collection =
        FeatureCollection::from_reader_with(stripe_reader(), Connectivity::Four, 0u8, 2, 8)
            .unwrap();
    assert_eq!(collection.features().len(), 24);
}

/// The connectivity regression of the reference implementation: twenty
/// small shapes placed on the 16-pixel tile seams of a 48x48 mask. Eight
/// of them are 2x2 diagonal pairs, which split under 4-connectivity.
fn seam_shape_collection() -> FeatureCollection {
    let regions: [(u32, u32, u32, u32, u32, u32); 20] = [
        (0, 15, 15, 17, 17, 0xF000_0000),
        (11, 18, 15, 19, 17, 0xC000_0000),
        (12, 20, 15, 22, 17, 0x6000_0000),
        (1, 15, 18, 17, 19, 0xC000_0000),
        (2, 15, 20, 17, 22, 0x6000_0000),
        (13, 23, 15, 25, 17, 0x9000_0000),
        (18, 26, 15, 29, 17, 0xB800_0000),
        (14, 31, 15, 33, 17, 0xF000_0000),
        (15, 31, 18, 33, 19, 0xC000_0000),
        (16, 31, 20, 33, 22, 0x9000_0000),
        (3, 15, 23, 17, 25, 0x9000_0000),
        (4, 15, 26, 17, 29, 0xE800_0000),
        (5, 15, 31, 17, 33, 0xF000_0000),
        (6, 18, 31, 19, 33, 0xC000_0000),
        (7, 20, 31, 22, 33, 0x9000_0000),
        (17, 31, 23, 33, 25, 0x6000_0000),
        (19, 31, 26, 33, 29, 0x5C00_0000),
        (8, 23, 31, 25, 33, 0x6000_0000),
        (9, 26, 31, 29, 33, 0x7400_0000),
        (10, 31, 31, 33, 33, 0xF000_0000),
    ];

    let mut collection = FeatureCollection::new();
    collection.set_image_dimensions(48, 48);
    for (id, ul_row, ul_col, br_row, br_col, word) in regions {
        collection
            .add_feature(id, BoundingBox::new(ul_row, ul_col, br_row, br_col), &[word])
            .unwrap();
    }
    collection
}

/// Rasterize a collection into a full in-memory image.
fn rasterize_to_image(collection: &FeatureCollection, tile_size: u32) -> Vec<u8> {
    let height = collection.image_height();
    let width = collection.image_width();
    let mut image = vec![0u8; height as usize * width as usize];
    let mut sink = |tile_row: u32, tile_col: u32, pixels: &[u8]| {
        for r in 0..tile_size {
            for c in 0..tile_size {
                let row = tile_row * tile_size + r;
                let col = tile_col * tile_size + c;
                if row < height && col < width {
                    image[(row * width + col) as usize] =
                        pixels[(r * tile_size + c) as usize];
                }
            }
        }
        Ok(())
    };
    rasterize_binary(collection, tile_size, &mut sink).unwrap();
    image
}

#[test]
fn test_seam_shapes_connectivity_counts() {
    let base = seam_shape_collection();
    let image = rasterize_to_image(&base, 16);
    let reader = |image: &Vec<u8>| {
        InMemoryTileReader::from_pixels(48, 48, 16, 16, image.clone()).unwrap()
    };

    let rank8 =
        FeatureCollection::from_reader(reader(&image), Connectivity::Eight, 0u8).unwrap();
    assert_eq!(rank8.features().len(), 20);

    let rank4 = FeatureCollection::from_reader(reader(&image), Connectivity::Four, 0u8).unwrap();
    assert_eq!(rank4.features().len(), 28);
}

#[test]
fn test_extracted_features_cover_the_mask_exactly() {
    let base = seam_shape_collection();
    let image = rasterize_to_image(&base, 16);
    let reader = InMemoryTileReader::from_pixels(48, 48, 16, 16, image.clone()).unwrap();
    let extracted = FeatureCollection::from_reader(reader, Connectivity::Eight, 0u8).unwrap();

    // Connected-component soundness: foreground pixels are claimed by
    // exactly one feature, background pixels by none.
    for row in 0..48u32 {
        for col in 0..48u32 {
            let foreground = image[(row * 48 + col) as usize] != 0;
            let claimed: Vec<u32> = extracted
                .features()
                .iter()
                .filter(|f| f.is_in_bitmask(row, col))
                .map(Feature::id)
                .collect();
            assert_eq!(claimed.len(), usize::from(foreground), "pixel ({row}, {col})");
        }
    }
}

#[test]
fn test_labeled_rasterization_uses_id_plus_one() {
    let collection = five_region_collection();
    let mut seen_values = std::collections::HashSet::new();
    let mut sink = |_: u32, _: u32, pixels: &[u32]| {
        seen_values.extend(pixels.iter().copied());
        Ok(())
    };
    rasterize_labeled(&collection, 16, &mut sink).unwrap();
    // Ids 1..=5 appear as labels 2..=6 plus background 0.
    for id in [2u32, 3, 4, 5, 6] {
        assert!(seen_values.contains(&id), "label {id} missing");
    }
    assert!(seen_values.contains(&0));
}

#[test]
fn test_rasterize_rejects_non_power_of_two_tiles() {
    let collection = five_region_collection();
    let mut sink = |_: u32, _: u32, _: &[u8]| Ok(());
    assert!(matches!(
        rasterize_binary(&collection, 12, &mut sink),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_request_feature_loads_its_bounding_tiles() {
    let reader = Arc::new(stripe_reader());
    let mut engine = Engine::open(Arc::clone(&reader), 0).unwrap();
    engine.configure(EngineOptions::default().with_num_parallel_views(4));
    engine.run().unwrap();

    // A full-width one-row feature on row 1 overlaps the four top tiles.
    let feature = Feature::new(
        9,
        BoundingBox::new(1, 0, 2, 50),
        vec![u32::MAX, u32::MAX],
    )
    .unwrap();
    engine.request_feature(&feature, 0).unwrap();
    engine.finished_requesting();

    let mut tiles = Vec::new();
    while let Some(view) = engine.next_view_blocking().unwrap() {
        tiles.push((view.row(), view.col()));
        view.release();
    }
    engine.wait_for_complete();

    tiles.sort_unstable();
    assert_eq!(tiles, vec![(0, 0), (0, 1), (0, 2), (0, 3)]);
}

#[test]
fn test_extraction_is_deterministic_per_run() {
    let image = rasterize_to_image(&seam_shape_collection(), 16);
    let build = || {
        let reader = InMemoryTileReader::from_pixels(48, 48, 16, 16, image.clone()).unwrap();
        FeatureCollection::from_reader_with(reader, Connectivity::Eight, 0u8, 1, 4).unwrap()
    };
    let first = build();
    let second = build();
    // Single-threaded analysis assigns tags in view emission order, so two
    // runs produce identical collections.
    assert_eq!(first, second);
}
