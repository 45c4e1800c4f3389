use std::path::Path;

use anyhow::Context;

use crate::{
    data_structures::mesh::DecodedMesh,
    resources::{
        gltf_loader::{BufferDescriptor, assemble, parse_document, split_container},
        mesh::AssetSource,
    },
};

/**
 * This module contains all logic for turning external files into decoded geometry.
 */
pub mod accessor;
pub mod gltf_loader;
pub mod mesh;
pub mod ply;
pub mod point_cloud;
pub mod sampling;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = tokio::fs::read(file_name)
        .await
        .with_context(|| format!("could not read {}", file_name))?;

    Ok(data)
}

/// Reads a `.gltf`/`.glb` file and everything it references.
pub async fn load_asset_source(file_name: &str) -> anyhow::Result<AssetSource> {
    let bytes = load_binary(file_name).await?;
    let container = split_container(&bytes)?;
    let document = parse_document(&container.json)
        .with_context(|| format!("could not parse {}", file_name))?;
    let buffers = load_buffers(file_name, &document.buffers, container.bin).await;
    Ok(assemble(file_name, &bytes, document, buffers))
}

async fn load_buffers(
    file_name: &str,
    descriptors: &[BufferDescriptor],
    mut bin: Option<Vec<u8>>,
) -> Vec<Vec<u8>> {
    let base = Path::new(file_name).parent().unwrap_or(Path::new(""));
    let fetches = descriptors.iter().map(|descriptor| {
        let embedded = match descriptor.uri {
            None => Some(bin.take().unwrap_or_default()),
            Some(_) => None,
        };
        let uri = descriptor.uri.clone();
        let path = uri
            .as_deref()
            .map(|uri| base.join(uri).to_string_lossy().into_owned());
        async move {
            if let Some(embedded) = embedded {
                return embedded;
            }
            match (uri, path) {
                (Some(uri), _) if uri.starts_with("data:") => {
                    log::warn!("{}: data URIs are not supported, buffer left empty", file_name);
                    Vec::new()
                }
                (_, Some(path)) => match load_binary(&path).await {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("{}: buffer {} is unavailable: {}", file_name, path, e);
                        Vec::new()
                    }
                },
                _ => Vec::new(),
            }
        }
    });
    futures::future::join_all(fetches).await
}

/// Decodes every mesh primitive of a glTF asset.
pub async fn load_model_gltf(file_name: &str) -> anyhow::Result<Vec<DecodedMesh>> {
    let source = load_asset_source(file_name).await?;
    let meshes = mesh::decode(&source).with_context(|| format!("could not decode {}", file_name))?;
    log::info!("{}: loaded {} mesh(es)", file_name, meshes.len());
    Ok(meshes)
}

/// Reads and reconstructs a PLY point cloud.
pub async fn load_point_cloud(file_name: &str) -> anyhow::Result<DecodedMesh> {
    let bytes = load_binary(file_name).await?;
    let table = ply::read_attribute_table(&bytes)
        .with_context(|| format!("could not parse {}", file_name))?;
    let cloud = point_cloud::reconstruct(file_name, &table)
        .with_context(|| format!("could not reconstruct {}", file_name))?;
    log::info!("{}: loaded {} points", file_name, cloud.vertex_count);
    Ok(cloud)
}
