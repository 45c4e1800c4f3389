//! Asset load orchestration.
//!
//! Every slot that can show an asset owns a [`LoadSlot`]. Starting a load bumps the slot's
//! generation and hands out a [`LoadToken`]; older tokens stop being current, so their progress
//! reports and results are dropped instead of replacing a newer asset.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    data_structures::mesh::DecodedMesh,
    resources::{
        self,
        sampling::{PointSampler, SampledPoints, SamplingConfig, StrideSampler},
    },
};

#[derive(Clone, Debug, Default)]
pub struct LoadSlot {
    generation: Arc<AtomicU64>,
}

#[derive(Clone, Debug)]
pub struct LoadToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LoadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new load and invalidates every token handed out before.
    pub fn begin(&self) -> LoadToken {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        LoadToken {
            generation,
            current: self.generation.clone(),
        }
    }

    /// Invalidates the active load without starting a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// `Some(value)` only if `token` still belongs to the active load.
    pub fn accept<T>(&self, token: &LoadToken, value: T) -> Option<T> {
        let owned = Arc::ptr_eq(&self.generation, &token.current);
        if owned && token.is_current() {
            Some(value)
        } else {
            log::debug!("discarding the result of stale load #{}", token.generation);
            None
        }
    }
}

impl LoadToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// `.gltf` / `.glb`
    Mesh,
    /// `.ply`
    PointCloud,
}

impl AssetKind {
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gltf" | "glb" => Some(Self::Mesh),
            "ply" => Some(Self::PointCloud),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetRequest {
    pub path: String,
    pub kind: AssetKind,
    pub sampling: SamplingConfig,
}

impl AssetRequest {
    /// Infers the kind from the file extension.
    pub fn new(path: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        let kind = AssetKind::from_path(&path)
            .ok_or_else(|| anyhow::anyhow!("cannot tell the asset kind of {}", path))?;
        Ok(Self {
            path,
            kind,
            sampling: SamplingConfig::default(),
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }
}

#[derive(Clone, Debug)]
pub enum LoadedAsset {
    Meshes(Vec<DecodedMesh>),
    PointCloud {
        cloud: DecodedMesh,
        points: SampledPoints,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    Fetching,
    Decoding,
    Sampling,
    Done,
}

/// Runs one load. Returns `Ok(None)` once the token is no longer current.
pub async fn load_asset(
    request: &AssetRequest,
    token: &LoadToken,
    mut progress: impl FnMut(LoadStage),
) -> anyhow::Result<Option<LoadedAsset>> {
    let mut report = |stage: LoadStage| {
        if token.is_current() {
            progress(stage);
            true
        } else {
            log::debug!("{}: load #{} was superseded", request.path, token.generation);
            false
        }
    };

    if !report(LoadStage::Fetching) {
        return Ok(None);
    }
    let asset = match request.kind {
        AssetKind::Mesh => {
            let source = resources::load_asset_source(&request.path).await?;
            if !report(LoadStage::Decoding) {
                return Ok(None);
            }
            LoadedAsset::Meshes(resources::mesh::decode(&source)?)
        }
        AssetKind::PointCloud => {
            let bytes = resources::load_binary(&request.path).await?;
            if !report(LoadStage::Decoding) {
                return Ok(None);
            }
            let table = resources::ply::read_attribute_table(&bytes)?;
            let cloud = resources::point_cloud::reconstruct(&request.path, &table)?;
            if !report(LoadStage::Sampling) {
                return Ok(None);
            }
            let points = StrideSampler.sample(&cloud, &request.sampling);
            LoadedAsset::PointCloud { cloud, points }
        }
    };
    if !report(LoadStage::Done) {
        return Ok(None);
    }
    Ok(Some(asset))
}
