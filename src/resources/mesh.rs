use std::sync::Arc;

use crate::{
    data_structures::{
        accessor::{Accessor, ElementShape},
        attribute::AttributeTable,
        mesh::{DecodedMesh, VertexColors},
    },
    error::DecodeError,
    resources::{
        accessor::{TypedView, resolve},
        gltf_loader::{RawDocument, RawPrimitive},
    },
};

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const COLOR_0: &str = "COLOR_0";
pub const TEXCOORD_0: &str = "TEXCOORD_0";

/// Attributes of one primitive, already materialized into arrays.
#[derive(Clone, Debug, Default)]
pub struct PrimitiveTable {
    pub mesh: Option<String>,
    pub mesh_index: usize,
    pub primitive_index: usize,
    pub attributes: AttributeTable,
}

/// The JSON mesh graph together with the bytes of every buffer it references.
#[derive(Clone, Debug, Default)]
pub struct RawGraph {
    pub document: RawDocument,
    pub buffers: Vec<Vec<u8>>,
}

/// An accessor together with its resolved values.
#[derive(Debug)]
pub struct ResolvedAttribute<'a> {
    pub accessor: &'a Accessor,
    pub values: TypedView<'a>,
}

impl RawGraph {
    /// `None` if the primitive has no such attribute at all.
    pub fn attribute(
        &self,
        primitive: &RawPrimitive,
        semantic: &str,
    ) -> Option<Result<ResolvedAttribute<'_>, DecodeError>> {
        let idx = *primitive.attributes.get(semantic)?;
        Some(self.resolve_accessor(idx))
    }

    pub fn resolve_accessor(&self, idx: usize) -> Result<ResolvedAttribute<'_>, DecodeError> {
        let accessor = self
            .document
            .accessors
            .get(idx)
            .ok_or_else(|| DecodeError::malformed(idx, "no such accessor"))?;
        let view_idx = accessor
            .buffer_view
            .ok_or_else(|| DecodeError::malformed(idx, "accessor has no buffer view"))?;
        let view = self.document.buffer_views.get(view_idx).ok_or_else(|| {
            DecodeError::malformed(idx, format!("buffer view {} does not exist", view_idx))
        })?;
        let buffer = self.buffers.get(view.buffer).ok_or_else(|| {
            DecodeError::malformed(idx, format!("buffer {} does not exist", view.buffer))
        })?;
        let values = resolve(idx, buffer, accessor, view)?;
        Ok(ResolvedAttribute { accessor, values })
    }
}

/// Everything one asset offers to the decoder. Either strategy may be missing.
#[derive(Clone, Debug, Default)]
pub struct AssetSource {
    pub name: String,
    pub pre_parsed: Option<Vec<PrimitiveTable>>,
    pub raw: Option<RawGraph>,
}

/// The closed set of extraction strategies, in priority order.
#[derive(Clone, Copy, Debug)]
pub enum Extraction<'a> {
    PreParsed(&'a [PrimitiveTable]),
    RawBuffers(&'a RawGraph),
}

impl AssetSource {
    pub fn extractions(&self) -> impl Iterator<Item = Extraction<'_>> {
        let pre_parsed = self.pre_parsed.as_deref().map(Extraction::PreParsed);
        let raw = self.raw.as_ref().map(Extraction::RawBuffers);
        pre_parsed.into_iter().chain(raw)
    }
}

impl Extraction<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreParsed(_) => "pre-parsed",
            Self::RawBuffers(_) => "raw buffer",
        }
    }

    /// Decodes every primitive; primitives without usable positions contribute nothing.
    pub fn extract(&self, asset: &str) -> Vec<DecodedMesh> {
        match self {
            Self::PreParsed(tables) => tables
                .iter()
                .filter_map(|table| {
                    let id = mesh_id(
                        asset,
                        table.mesh.as_deref(),
                        table.mesh_index,
                        table.primitive_index,
                    );
                    decode_table(id, table)
                })
                .collect(),
            Self::RawBuffers(graph) => graph
                .document
                .meshes
                .iter()
                .enumerate()
                .flat_map(|(mesh_index, mesh)| {
                    mesh.primitives
                        .iter()
                        .enumerate()
                        .filter_map(move |(primitive_index, primitive)| {
                            let id =
                                mesh_id(asset, mesh.name.as_deref(), mesh_index, primitive_index);
                            decode_raw_primitive(graph, id, primitive)
                        })
                })
                .collect(),
        }
    }
}

/// Decodes all meshes of an asset. The first strategy yielding at least one mesh wins.
pub fn decode(source: &AssetSource) -> Result<Vec<DecodedMesh>, DecodeError> {
    for extraction in source.extractions() {
        let meshes = extraction.extract(&source.name);
        if !meshes.is_empty() {
            log::debug!(
                "{}: decoded {} mesh(es) with the {} strategy",
                source.name,
                meshes.len(),
                extraction.name()
            );
            return Ok(meshes);
        }
        log::warn!(
            "{}: the {} strategy yielded no meshes",
            source.name,
            extraction.name()
        );
    }
    Err(DecodeError::DecodeYieldedEmpty)
}

fn mesh_id(asset: &str, name: Option<&str>, mesh_index: usize, primitive_index: usize) -> String {
    match name {
        Some(name) => format!("{}/{}#{}", asset, name, primitive_index),
        None => format!("{}/mesh{}#{}", asset, mesh_index, primitive_index),
    }
}

fn decode_table(id: String, table: &PrimitiveTable) -> Option<DecodedMesh> {
    let float_attribute = |semantic: &str, item_size: usize| -> Option<Arc<[f32]>> {
        table
            .attributes
            .get(semantic)
            .filter(|attribute| attribute.item_size == item_size)
            .and_then(|attribute| attribute.array.as_f32())
            .cloned()
    };
    let positions = float_attribute(POSITION, 3)?;
    let mesh = DecodedMesh::from_positions(id, positions)?;
    if mesh.vertex_count == 0 {
        return None;
    }
    let colors = table.attributes.get(COLOR_0).map(|attribute| VertexColors {
        values: attribute.array.clone(),
        components: attribute.item_size,
    });
    Some(
        mesh.with_normals(float_attribute(NORMAL, 3))
            .with_colors(colors)
            .with_texcoords(float_attribute(TEXCOORD_0, 2)),
    )
}

fn decode_raw_primitive(
    graph: &RawGraph,
    id: String,
    primitive: &RawPrimitive,
) -> Option<DecodedMesh> {
    let positions = match graph.attribute(primitive, POSITION) {
        Some(Ok(resolved)) => match (resolved.accessor.shape, resolved.values) {
            (ElementShape::Vec3, TypedView::F32(values)) => {
                Arc::<[f32]>::from(values.into_owned())
            }
            (shape, _) => {
                log::warn!(
                    "{}: dropping primitive, POSITION is not a float VEC3 ({:?})",
                    id,
                    shape
                );
                return None;
            }
        },
        Some(Err(e)) => {
            log::warn!("{}: dropping primitive: {}", id, e);
            return None;
        }
        None => {
            log::debug!("{}: primitive has no POSITION attribute", id);
            return None;
        }
    };
    let mesh = DecodedMesh::from_positions(id, positions)?;
    if mesh.vertex_count == 0 {
        return None;
    }

    let normals: Option<Arc<[f32]>> = optional(graph, primitive, NORMAL, &mesh.id).and_then(|resolved| {
        match (resolved.accessor.shape, resolved.values) {
            (ElementShape::Vec3, TypedView::F32(values)) => Some(Arc::from(values.into_owned())),
            (shape, _) => {
                log::warn!(
                    "{}: omitting NORMAL, expected a float VEC3 but got {:?}",
                    mesh.id,
                    shape
                );
                None
            }
        }
    });
    let colors = optional(graph, primitive, COLOR_0, &mesh.id).and_then(|resolved| {
        match resolved.accessor.shape {
            ElementShape::Vec3 | ElementShape::Vec4 => Some(VertexColors {
                components: resolved.accessor.shape.components().unwrap_or(4),
                values: resolved.values.into_array(),
            }),
            shape => {
                log::warn!("{}: omitting COLOR_0 with shape {:?}", mesh.id, shape);
                None
            }
        }
    });
    let texcoords: Option<Arc<[f32]>> = optional(graph, primitive, TEXCOORD_0, &mesh.id).and_then(|resolved| {
        match (resolved.accessor.shape, resolved.values) {
            (ElementShape::Vec2, TypedView::F32(values)) => Some(Arc::from(values.into_owned())),
            (shape, _) => {
                log::warn!(
                    "{}: omitting TEXCOORD_0, expected a float VEC2 but got {:?}",
                    mesh.id,
                    shape
                );
                None
            }
        }
    });

    Some(mesh.with_normals(normals).with_colors(colors).with_texcoords(texcoords))
}

/// Resolves an optional attribute; failures only omit the attribute.
fn optional<'a>(
    graph: &'a RawGraph,
    primitive: &RawPrimitive,
    semantic: &str,
    id: &str,
) -> Option<ResolvedAttribute<'a>> {
    match graph.attribute(primitive, semantic)? {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            log::warn!("{}: omitting {}: {}", id, semantic, e);
            None
        }
    }
}
