//! Store behavior over stub backends and real slide files.

use std::sync::Arc;

use serde_json::{json, Value};

use wsi_zarr::{BackendKind, LookupError, SlideStore, StoreOptions};

use super::test_utils::{
    file_name, pattern, raw_pyramid, write_slide, AfterClose, RecordingSlide, RegionRequest,
    SharedSlide, TiffBuilder,
};

fn shared_store(slide: RecordingSlide, tile_size: u32) -> (SlideStore, Arc<RecordingSlide>) {
    let slide = Arc::new(slide);
    let store =
        SlideStore::from_backend(Box::new(SharedSlide(Arc::clone(&slide))), tile_size).unwrap();
    (store, slide)
}

fn json_doc(store: &SlideStore, key: &str) -> Value {
    serde_json::from_slice(&store.metadata()[key]).unwrap()
}

// =============================================================================
// Keys and Metadata
// =============================================================================

#[tokio::test]
async fn test_keys_match_metadata() {
    let (store, _) = shared_store(RecordingSlide::two_level(), 256);

    let keys: Vec<&str> = store.keys().collect();
    assert_eq!(keys, vec![".zattrs", ".zgroup", "0/.zarray", "1/.zarray"]);

    let metadata_keys: Vec<&str> = store.metadata().keys().map(String::as_str).collect();
    assert_eq!(keys, metadata_keys);
    assert_eq!(store.len(), store.metadata().len());
}

#[tokio::test]
async fn test_array_shapes_follow_level_dimensions() {
    let slide = RecordingSlide::direct(&[(1000, 600), (500, 300), (250, 150)], &[1.0, 2.0, 4.0]);
    let (store, _) = shared_store(slide, 256);

    for (level, (w, h)) in [(1000, 600), (500, 300), (250, 150)].into_iter().enumerate() {
        let doc = json_doc(&store, &format!("{level}/.zarray"));
        assert_eq!(doc["shape"], json!([h, w, 4]));
        assert_eq!(doc["chunks"], json!([256, 256, 4]));
        assert_eq!(doc["dtype"], "|u1");
        assert_eq!(doc["compressor"], Value::Null);
        assert_eq!(doc["filters"], Value::Null);
        assert_eq!(doc["fill_value"], 0);
        assert_eq!(doc["order"], "C");
        assert_eq!(doc["zarr_format"], 2);
    }
}

#[tokio::test]
async fn test_nested_levels_use_three_channels() {
    let slide = RecordingSlide::nested(&[(1024, 1024), (512, 512)], &[1.0, 2.0]);
    let (store, _) = shared_store(slide, 128);

    let doc = json_doc(&store, "1/.zarray");
    assert_eq!(doc["shape"], json!([512, 512, 3]));
    assert_eq!(doc["chunks"], json!([128, 128, 3]));
}

#[tokio::test]
async fn test_group_and_attributes() {
    let slide = RecordingSlide::two_level().with_filename("/data/slides/CMU-1.svs");
    let (store, _) = shared_store(slide, 256);

    assert_eq!(json_doc(&store, ".zgroup"), json!({ "zarr_format": 2 }));
    assert_eq!(
        json_doc(&store, ".zattrs"),
        json!({
            "multiscales": [{
                "name": "CMU-1.svs",
                "datasets": [{ "path": "0" }, { "path": "1" }],
                "version": "0.1"
            }]
        })
    );
}

#[tokio::test]
async fn test_metadata_lookups_are_verbatim() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    for key in [".zgroup", ".zattrs", "0/.zarray", "1/.zarray"] {
        let first = store.get(key).await.unwrap();
        let second = store.get(key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, store.metadata()[key]);
    }
    assert!(slide.requests().is_empty());
}

#[tokio::test]
async fn test_metadata_is_rebuilt_identically() {
    let (a, _) = shared_store(RecordingSlide::two_level().with_path("/x/a.tiff"), 256);
    let (b, _) = shared_store(RecordingSlide::two_level().with_path("/x/a.tiff"), 256);
    assert_eq!(a.metadata(), b.metadata());
}

// =============================================================================
// Chunk Reads
// =============================================================================

#[tokio::test]
async fn test_first_chunk_reads_origin() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    let chunk = store.get("0/0.0.0").await.unwrap();
    assert_eq!(chunk.len(), 256 * 256 * 4);
    assert_eq!(
        slide.requests(),
        vec![RegionRequest {
            origin: (0, 0),
            level: 0,
            size: (256, 256),
        }]
    );
}

#[tokio::test]
async fn test_chunk_origin_scales_by_downsample() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    let chunk = store.get("1/1.1.0").await.unwrap();
    assert!(chunk.iter().all(|&b| b == 1));
    assert_eq!(
        slide.requests(),
        vec![RegionRequest {
            origin: (512, 512),
            level: 1,
            size: (256, 256),
        }]
    );
}

#[tokio::test]
async fn test_row_is_first_coordinate() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    store.get("0/2.3.0").await.unwrap();
    assert_eq!(slide.requests()[0].origin, (768, 512));
}

#[tokio::test]
async fn test_fractional_downsample_truncates() {
    let slide = RecordingSlide::direct(&[(1000, 1000), (301, 301)], &[1.0, 3.3222591362126246]);
    let (store, slide) = shared_store(slide, 100);

    store.get("1/1.2.0").await.unwrap();
    // 2 * 3.3222... * 100 = 664.45, 1 * 3.3222... * 100 = 332.22
    assert_eq!(slide.requests()[0].origin, (664, 332));
}

#[tokio::test]
async fn test_malformed_keys_are_unavailable() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    for key in ["foo", "0/0.0", "0/a.0.0", "x/0.0.0", "0/0.0.0/1", "2/.zarray", ""] {
        assert_eq!(
            store.get(key).await,
            Err(LookupError::ChunkUnavailable {
                key: key.to_string()
            }),
            "{key}"
        );
    }
    assert!(slide.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_level_is_unavailable() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);

    let err = store.get("5/0.0.0").await.unwrap_err();
    assert!(matches!(err, LookupError::ChunkUnavailable { .. }));
    assert!(slide.requests().is_empty());
}

#[tokio::test]
async fn test_chunk_keys_are_not_listed() {
    let (store, _) = shared_store(RecordingSlide::two_level(), 256);
    store.get("0/0.0.0").await.unwrap();
    assert!(!store.contains("0/0.0.0"));
    assert_eq!(store.len(), 4);
}

// =============================================================================
// Close and Failure Reporting
// =============================================================================

#[tokio::test]
async fn test_read_after_close_reports_closed() {
    let (store, _) = shared_store(RecordingSlide::two_level(), 256);
    store.close();

    assert_eq!(
        store.get("0/0.0.0").await,
        Err(LookupError::ResourceClosed {
            key: "0/0.0.0".into()
        })
    );
    // Metadata stays available
    assert!(store.get(".zgroup").await.is_ok());
}

#[tokio::test]
async fn test_other_failures_after_close_are_unavailable() {
    let slide = RecordingSlide::two_level().failing_after_close(AfterClose::GenericFailure);
    let (store, _) = shared_store(slide, 256);
    store.close();

    assert_eq!(
        store.get("0/0.0.0").await,
        Err(LookupError::ChunkUnavailable {
            key: "0/0.0.0".into()
        })
    );
}

#[tokio::test]
async fn test_drop_closes_backend() {
    let (store, slide) = shared_store(RecordingSlide::two_level(), 256);
    drop(store);

    let err = wsi_zarr::SlideBackend::read_region(slide.as_ref(), (0, 0), 0, (1, 1))
        .await
        .unwrap_err();
    assert!(err.is_closed());
}

// =============================================================================
// Equality
// =============================================================================

#[tokio::test]
async fn test_equality_follows_identity() {
    let (a, _) = shared_store(RecordingSlide::two_level().with_filename("/s/a.svs"), 256);
    let (a_again, _) = shared_store(RecordingSlide::two_level().with_filename("/s/a.svs"), 512);
    let (a_path, _) = shared_store(RecordingSlide::two_level().with_path("/s/a.svs"), 256);
    let (b, _) = shared_store(RecordingSlide::two_level().with_filename("/s/b.svs"), 256);
    let (anon, _) = shared_store(RecordingSlide::two_level(), 256);

    assert_eq!(a, a_again);
    assert_ne!(a, b);
    assert_ne!(a, a_path);
    assert_ne!(a, anon);
}

// =============================================================================
// Real Files
// =============================================================================

#[tokio::test]
async fn test_open_direct_store_from_file() {
    let file = write_slide(&raw_pyramid(), ".tiff");
    let store = SlideStore::open(file.path(), StoreOptions::default().with_tile_size(128))
        .await
        .unwrap();

    let attrs = json_doc(&store, ".zattrs");
    assert_eq!(attrs["multiscales"][0]["name"], file_name(file.path()));
    assert_eq!(
        attrs["multiscales"][0]["datasets"],
        json!([{ "path": "0" }, { "path": "1" }, { "path": "2" }])
    );
    assert_eq!(json_doc(&store, "2/.zarray")["shape"], json!([100, 150, 4]));

    let chunk = store.get("1/1.2.0").await.unwrap();
    assert_eq!(chunk.len(), 128 * 128 * 4);

    store.close();
    assert!(matches!(
        store.get("0/0.0.0").await,
        Err(LookupError::ResourceClosed { .. })
    ));
}

#[tokio::test]
async fn test_chunks_align_at_fractional_downsample() {
    // 1024 / 341 gives a downsample of about 3.0029
    let data = TiffBuilder::new()
        .level(1024, 1024, 64)
        .level(341, 341, 64)
        .build();
    let file = write_slide(&data, ".tiff");
    let store = SlideStore::open(file.path(), StoreOptions::default().with_tile_size(64))
        .await
        .unwrap();

    let downsample = store.backend().levels().downsample(1).unwrap();
    assert!(downsample.fract() != 0.0);

    let px = |chunk: &[u8], x: usize, y: usize| {
        let i = (y * 64 + x) * 4;
        chunk[i..i + 4].to_vec()
    };
    let expected = |x: u32, y: u32| {
        let [r, g, b] = pattern(1, x, y);
        vec![r, g, b, 255]
    };

    let left = store.get("1/0.0.0").await.unwrap();
    let right = store.get("1/0.1.0").await.unwrap();
    assert_eq!(px(&left[..], 63, 0), expected(63, 0));
    assert_eq!(px(&right[..], 0, 0), expected(64, 0));

    let chunk = store.get("1/2.3.0").await.unwrap();
    assert_eq!(px(&chunk[..], 0, 0), expected(192, 128));
    assert_eq!(px(&chunk[..], 63, 63), expected(255, 191));

    // Level 1 is 341 wide: chunk column 5 starts at x=320 and is padded past 340
    let edge = store.get("1/0.5.0").await.unwrap();
    assert_eq!(px(&edge[..], 0, 0), expected(320, 0));
    assert_eq!(px(&edge[..], 20, 0), expected(340, 0));
    assert_eq!(px(&edge[..], 21, 0), vec![0, 0, 0, 0]);
}

#[tokio::test]
async fn test_open_resolutions_store_from_file() {
    let file = write_slide(&raw_pyramid(), ".tiff");
    let options = StoreOptions::default()
        .with_tile_size(128)
        .with_backend(BackendKind::Resolutions);
    let store = SlideStore::open(file.path(), options).await.unwrap();

    assert_eq!(json_doc(&store, "0/.zarray")["shape"], json!([400, 600, 3]));
    assert_eq!(store.get("0/3.4.0").await.unwrap().len(), 128 * 128 * 3);

    // No close operation on this backend: reads keep working
    store.close();
    assert!(store.get("0/0.0.0").await.is_ok());
}

#[tokio::test]
async fn test_chunk_past_level_edge_is_unavailable() {
    let file = write_slide(&raw_pyramid(), ".tiff");
    let store = SlideStore::open(file.path(), StoreOptions::default().with_tile_size(128))
        .await
        .unwrap();

    // Level 2 is 150x100: column 2 starts at x=256
    assert!(matches!(
        store.get("2/0.2.0").await,
        Err(LookupError::ChunkUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_open_missing_file_fails() {
    let result = SlideStore::open("/nonexistent/slide.svs", StoreOptions::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_open_rejects_zero_tile_size() {
    let file = write_slide(&raw_pyramid(), ".tiff");
    let result = SlideStore::open(file.path(), StoreOptions::default().with_tile_size(0)).await;
    assert!(result.is_err());
}
