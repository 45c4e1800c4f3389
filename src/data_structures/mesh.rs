//! Decoded geometry handed to scene assembly.

use std::sync::Arc;

use crate::data_structures::attribute::AttributeArray;

/// Per-vertex colors, three or four components wide.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexColors {
    pub values: AttributeArray,
    pub components: usize,
}

impl VertexColors {
    /// RGB of vertex `idx` in the 0..=255 range, whatever the storage.
    pub fn rgb_u8(&self, idx: usize) -> Option<[u8; 3]> {
        let base = idx * self.components;
        let channel = |offset: usize| -> Option<u8> {
            match &self.values {
                AttributeArray::U8(values) => values.get(base + offset).copied(),
                AttributeArray::F32(values) => values
                    .get(base + offset)
                    .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8),
            }
        };
        Some([channel(0)?, channel(1)?, channel(2)?])
    }
}

/// Geometry of one mesh primitive or one point-cloud file.
///
/// Invariants, enforced by the constructors:
/// - `positions.len() == vertex_count * 3`
/// - `normals`, if present, has `vertex_count * 3` values
/// - `colors`, if present, has `vertex_count * 3` or `vertex_count * 4` values
/// - `texcoords`, if present, has `vertex_count * 2` values
///
/// An attribute that breaks its invariant is dropped with a warning rather than failing the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedMesh {
    pub id: String,
    pub positions: Arc<[f32]>,
    pub normals: Option<Arc<[f32]>>,
    pub colors: Option<VertexColors>,
    pub texcoords: Option<Arc<[f32]>>,
    pub vertex_count: usize,
}

impl DecodedMesh {
    /// `None` if the positions aren't a whole number of xyz triples.
    pub fn from_positions(id: impl Into<String>, positions: Arc<[f32]>) -> Option<Self> {
        if positions.len() % 3 != 0 {
            return None;
        }
        Some(Self {
            id: id.into(),
            vertex_count: positions.len() / 3,
            positions,
            normals: None,
            colors: None,
            texcoords: None,
        })
    }

    pub fn with_normals(mut self, normals: Option<Arc<[f32]>>) -> Self {
        self.normals = normals.filter(|n| self.accepts("normals", n.len(), 3));
        self
    }

    pub fn with_colors(mut self, colors: Option<VertexColors>) -> Self {
        self.colors = colors.filter(|c| {
            if c.components != 3 && c.components != 4 {
                log::warn!(
                    "{}: dropping colors with {} components per vertex",
                    self.id,
                    c.components
                );
                return false;
            }
            self.accepts("colors", c.values.len(), c.components)
        });
        self
    }

    pub fn with_texcoords(mut self, texcoords: Option<Arc<[f32]>>) -> Self {
        self.texcoords = texcoords.filter(|t| self.accepts("texcoords", t.len(), 2));
        self
    }

    fn accepts(&self, attribute: &str, len: usize, width: usize) -> bool {
        let expected = self.vertex_count * width;
        if len != expected {
            log::warn!(
                "{}: dropping {} with {} values, expected {} for {} vertices",
                self.id,
                attribute,
                len,
                expected,
                self.vertex_count
            );
            return false;
        }
        true
    }

    pub fn position(&self, idx: usize) -> Option<[f32; 3]> {
        let p = self.positions.get(idx * 3..idx * 3 + 3)?;
        Some([p[0], p[1], p[2]])
    }

    pub fn normal(&self, idx: usize) -> Option<[f32; 3]> {
        let n = self.normals.as_ref()?.get(idx * 3..idx * 3 + 3)?;
        Some([n[0], n[1], n[2]])
    }
}
