//! glTF / GLB ingestion.
//!
//! Produces both extraction inputs the mesh decoder understands: attribute tables materialized
//! by the `gltf` crate's validated reader, and the raw accessor/bufferView/buffer graph
//! deserialized leniently from the JSON chunk.

use std::collections::HashMap;

use anyhow::Context;
use gltf::mesh::util::ReadColors;
use serde::Deserialize;

use crate::{
    data_structures::{
        accessor::{Accessor, BufferView},
        attribute::{AttributeData, AttributeTable},
    },
    resources::mesh::{AssetSource, COLOR_0, NORMAL, POSITION, PrimitiveTable, RawGraph, TEXCOORD_0},
};

const GLB_MAGIC: &[u8; 4] = b"glTF";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    #[serde(default)]
    pub meshes: Vec<RawMesh>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub buffers: Vec<BufferDescriptor>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMesh {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<RawPrimitive>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawPrimitive {
    /// Semantic name (`POSITION`, `COLOR_0`, ...) to accessor index.
    #[serde(default)]
    pub attributes: HashMap<String, usize>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDescriptor {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub byte_length: usize,
}

/// JSON chunk plus the optional embedded binary chunk.
#[derive(Debug)]
pub struct GltfContainer {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

/// Splits `.glb` bytes into their chunks; anything else is treated as plain `.gltf` JSON.
pub fn split_container(bytes: &[u8]) -> anyhow::Result<GltfContainer> {
    if bytes.starts_with(GLB_MAGIC) {
        let glb = gltf::Glb::from_slice(bytes).context("invalid GLB container")?;
        Ok(GltfContainer {
            json: glb.json.into_owned(),
            bin: glb.bin.map(|bin| bin.into_owned()),
        })
    } else {
        Ok(GltfContainer {
            json: bytes.to_vec(),
            bin: None,
        })
    }
}

pub fn parse_document(json: &[u8]) -> anyhow::Result<RawDocument> {
    serde_json::from_slice(json).context("glTF JSON does not describe a mesh graph")
}

/// Builds an [`AssetSource`] from the original file bytes and its already fetched buffers.
///
/// The pre-parsed strategy is only offered if the `gltf` crate accepts the document.
pub fn assemble(
    name: &str,
    bytes: &[u8],
    document: RawDocument,
    buffers: Vec<Vec<u8>>,
) -> AssetSource {
    let pre_parsed = match gltf::Gltf::from_slice(bytes) {
        Ok(gltf) => Some(primitive_tables(&gltf.document, &buffers)),
        Err(e) => {
            log::warn!(
                "{} was rejected by the glTF validator ({}), only raw accessors will be decoded",
                name,
                e
            );
            None
        }
    };
    AssetSource {
        name: name.to_string(),
        pre_parsed,
        raw: Some(RawGraph { document, buffers }),
    }
}

/// Synchronous variant for self-contained assets: buffers without a URI are backed by the GLB
/// binary chunk, every other buffer is left empty.
pub fn asset_source_from_slice(name: &str, bytes: &[u8]) -> anyhow::Result<AssetSource> {
    let container = split_container(bytes)?;
    let document = parse_document(&container.json)?;
    let mut bin = container.bin;
    let buffers = document
        .buffers
        .iter()
        .map(|descriptor| match &descriptor.uri {
            None => bin.take().unwrap_or_default(),
            Some(uri) => {
                log::warn!("{}: external buffer {} is not available", name, uri);
                Vec::new()
            }
        })
        .collect();
    Ok(assemble(name, bytes, document, buffers))
}

/// Materializes POSITION/NORMAL/COLOR_0/TEXCOORD_0 of every primitive through the `gltf` reader.
pub fn primitive_tables(document: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<PrimitiveTable> {
    let mut tables = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let mut attributes = AttributeTable::new();

            if fits(&primitive, &gltf::mesh::Semantic::Positions, buffers) {
                if let Some(positions) = reader.read_positions() {
                    let positions: Vec<f32> = positions.flatten().collect();
                    attributes.insert(POSITION.to_string(), AttributeData::new(positions, 3));
                }
            }
            if fits(&primitive, &gltf::mesh::Semantic::Normals, buffers) {
                if let Some(normals) = reader.read_normals() {
                    let normals: Vec<f32> = normals.flatten().collect();
                    attributes.insert(NORMAL.to_string(), AttributeData::new(normals, 3));
                }
            }
            if fits(&primitive, &gltf::mesh::Semantic::Colors(0), buffers) {
                if let Some(colors) = reader.read_colors(0) {
                    attributes.insert(COLOR_0.to_string(), color_data(colors));
                }
            }
            if fits(&primitive, &gltf::mesh::Semantic::TexCoords(0), buffers) {
                if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                    let tex_coords: Vec<f32> = tex_coords.flatten().collect();
                    attributes.insert(TEXCOORD_0.to_string(), AttributeData::new(tex_coords, 2));
                }
            }

            tables.push(PrimitiveTable {
                mesh: mesh.name().map(str::to_string),
                mesh_index: mesh.index(),
                primitive_index: primitive.index(),
                attributes,
            });
        }
    }
    tables
}

fn color_data(colors: ReadColors<'_>) -> AttributeData {
    match colors {
        ReadColors::RgbU8(iter) => AttributeData::new(iter.flatten().collect::<Vec<u8>>(), 3),
        ReadColors::RgbaU8(iter) => AttributeData::new(iter.flatten().collect::<Vec<u8>>(), 4),
        ReadColors::RgbF32(iter) => AttributeData::new(iter.flatten().collect::<Vec<f32>>(), 3),
        ReadColors::RgbaF32(iter) => AttributeData::new(iter.flatten().collect::<Vec<f32>>(), 4),
        other @ ReadColors::RgbU16(_) => {
            AttributeData::new(other.into_rgb_f32().flatten().collect::<Vec<f32>>(), 3)
        }
        other => AttributeData::new(other.into_rgba_f32().flatten().collect::<Vec<f32>>(), 4),
    }
}

/// The reader slices buffers without checking them against the declared lengths, so every
/// accessor is range-checked against the bytes actually fetched before it is read.
fn fits(
    primitive: &gltf::mesh::Primitive<'_>,
    semantic: &gltf::mesh::Semantic,
    buffers: &[Vec<u8>],
) -> bool {
    let Some(accessor) = primitive.get(semantic) else {
        return false;
    };
    let Some(view) = accessor.view() else {
        return false;
    };
    let Some(buffer) = buffers.get(view.buffer().index()) else {
        return false;
    };
    let element = accessor.size();
    let stride = view.stride().unwrap_or(element);
    let span = match accessor.count() {
        0 => Some(0),
        count => (count - 1)
            .checked_mul(stride)
            .and_then(|s| s.checked_add(element)),
    };
    let accessor_end = span.and_then(|span| accessor.offset().checked_add(span));
    let view_end = view.offset().checked_add(view.length());
    let fits = matches!(
        (accessor_end, view_end),
        (Some(a), Some(v)) if a <= view.length() && v <= buffer.len()
    );
    if !fits {
        log::warn!(
            "accessor {} for {:?} does not fit its buffer, skipping it",
            accessor.index(),
            semantic
        );
    }
    fits
}
