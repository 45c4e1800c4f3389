use std::sync::{Arc, Mutex};

use serde_json::json;
use splat_roam::{
    DecodeError,
    loading::{AssetKind, AssetRequest, LoadSlot, LoadStage, LoadedAsset, load_asset},
    resources::sampling::SamplingConfig,
};

use crate::common::test_utils::{TRIANGLE, f32_bytes, glb, init_logger, triangle_json};

mod common;

#[test]
fn newer_tokens_invalidate_older_ones() {
    let slot = LoadSlot::new();
    let first = slot.begin();
    assert!(first.is_current());

    let second = slot.begin();
    assert!(!first.is_current());
    assert!(second.is_current());
    assert!(second.generation() > first.generation());

    assert_eq!(slot.accept(&first, "stale"), None);
    assert_eq!(slot.accept(&second, "fresh"), Some("fresh"));

    slot.cancel();
    assert!(!second.is_current());
}

#[test]
fn tokens_of_another_slot_are_rejected() {
    let slot = LoadSlot::new();
    let other = LoadSlot::new();
    let _ = slot.begin();
    let foreign = other.begin();
    assert!(foreign.is_current());
    assert_eq!(slot.accept(&foreign, 1), None);
}

#[test]
fn kind_is_inferred_from_the_extension() {
    assert_eq!(AssetKind::from_path("scene.glb"), Some(AssetKind::Mesh));
    assert_eq!(AssetKind::from_path("dir/scene.GLTF"), Some(AssetKind::Mesh));
    assert_eq!(AssetKind::from_path("scan.ply"), Some(AssetKind::PointCloud));
    assert_eq!(AssetKind::from_path("notes.txt"), None);
    assert_eq!(AssetKind::from_path("no_extension"), None);
    assert!(AssetRequest::new("texture.png").is_err());

    let request = AssetRequest::new("scan.ply").unwrap();
    assert_eq!(request.kind, AssetKind::PointCloud);
    assert_eq!(request.sampling, SamplingConfig::default());
}

#[tokio::test]
async fn mesh_load_reports_every_stage() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.glb");
    std::fs::write(
        &path,
        glb(&triangle_json(36, json!({})), Some(&f32_bytes(&TRIANGLE))),
    )
    .unwrap();

    let slot = LoadSlot::new();
    let token = slot.begin();
    let request = AssetRequest::new(path.to_str().unwrap()).unwrap();
    let mut stages = Vec::new();

    let asset = load_asset(&request, &token, |stage| stages.push(stage))
        .await
        .unwrap();

    assert_eq!(stages, [LoadStage::Fetching, LoadStage::Decoding, LoadStage::Done]);
    match slot.accept(&token, asset) {
        Some(Some(LoadedAsset::Meshes(meshes))) => assert_eq!(meshes[0].vertex_count, 3),
        other => panic!("unexpected load result {:?}", other),
    }
}

#[tokio::test]
async fn point_cloud_load_is_sampled() {
    init_logger();
    let file = tempfile::Builder::new().suffix(".ply").tempfile().unwrap();
    std::fs::write(
        file.path(),
        "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\n\
         property float z\nend_header\n0 0 0\n1 1 1\n2 2 2\n3 3 3\n",
    )
    .unwrap();

    let slot = LoadSlot::new();
    let token = slot.begin();
    let request = AssetRequest::new(file.path().to_str().unwrap())
        .unwrap()
        .with_sampling(SamplingConfig {
            sample_rate: 0.5,
            ..Default::default()
        });

    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = stages.clone();
    let asset = load_asset(&request, &token, move |stage| seen.lock().unwrap().push(stage))
        .await
        .unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        [
            LoadStage::Fetching,
            LoadStage::Decoding,
            LoadStage::Sampling,
            LoadStage::Done
        ]
    );
    let Some(LoadedAsset::PointCloud { cloud, points }) = asset else {
        panic!("expected a point cloud");
    };
    assert_eq!(cloud.vertex_count, 4);
    assert_eq!(points.stats.total_points, 4);
    assert_eq!(points.stats.sampled_points, 2);
    assert_eq!(points.colors.len(), 6);
}

#[tokio::test]
async fn superseded_load_returns_nothing() {
    init_logger();
    let file = tempfile::Builder::new().suffix(".ply").tempfile().unwrap();
    std::fs::write(
        file.path(),
        "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\n\
         property float z\nend_header\n0 0 0\n",
    )
    .unwrap();
    let request = AssetRequest::new(file.path().to_str().unwrap()).unwrap();

    let slot = LoadSlot::new();
    let stale = slot.begin();
    let mut stages = Vec::new();
    let result = load_asset(&request, &stale, |stage| {
        stages.push(stage);
        // a newer request arrives while the first one is still fetching
        if stage == LoadStage::Fetching {
            let _ = slot.begin();
        }
    })
    .await
    .unwrap();

    assert!(result.is_none());
    assert_eq!(stages, [LoadStage::Fetching]);
}

#[tokio::test]
async fn failures_keep_their_decode_error() {
    init_logger();
    let file = tempfile::Builder::new().suffix(".ply").tempfile().unwrap();
    std::fs::write(
        file.path(),
        "ply\nformat ascii 1.0\nelement vertex 1\nproperty float scalar\nend_header\n1\n",
    )
    .unwrap();
    let request = AssetRequest::new(file.path().to_str().unwrap()).unwrap();
    let token = LoadSlot::new().begin();

    let err = load_asset(&request, &token, |_| {}).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<DecodeError>(),
        Some(&DecodeError::MissingPositionData)
    );
}

#[tokio::test]
async fn concurrent_loads_only_the_latest_is_accepted() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("first.glb");
    let second_path = dir.path().join("second.glb");
    for path in [&first_path, &second_path] {
        std::fs::write(
            path,
            glb(&triangle_json(36, json!({})), Some(&f32_bytes(&TRIANGLE))),
        )
        .unwrap();
    }

    let slot = LoadSlot::new();
    let first = slot.begin();
    let second = slot.begin();
    let first_request = AssetRequest::new(first_path.to_str().unwrap()).unwrap();
    let second_request = AssetRequest::new(second_path.to_str().unwrap()).unwrap();

    let (a, b) = tokio::join!(
        load_asset(&first_request, &first, |_| {}),
        load_asset(&second_request, &second, |_| {})
    );
    assert!(a.unwrap().is_none());
    let accepted = slot.accept(&second, b.unwrap());
    assert!(matches!(accepted, Some(Some(LoadedAsset::Meshes(_)))));
}
