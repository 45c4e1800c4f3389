//! Accessor and buffer view metadata.
//!
//! These mirror the glTF JSON objects closely enough to be deserialized straight out of an
//! asset's JSON chunk. Deserialization is lenient on purpose: an unknown component type or
//! element shape still parses and is rejected later by the resolver, which lets the decoder
//! drop one attribute instead of failing the whole document.

use serde::Deserialize;

/// `GL_UNSIGNED_BYTE`
pub const UNSIGNED_BYTE: u32 = 5121;
/// `GL_FLOAT`
pub const FLOAT: u32 = 5126;

/// The two component types observed in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    U8,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            UNSIGNED_BYTE => Some(Self::U8),
            FLOAT => Some(Self::F32),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::F32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum ElementShape {
    #[serde(rename = "SCALAR")]
    Scalar,
    #[serde(rename = "VEC2")]
    Vec2,
    #[serde(rename = "VEC3")]
    Vec3,
    #[serde(rename = "VEC4")]
    Vec4,
    #[serde(other)]
    Unsupported,
}

impl ElementShape {
    /// Number of scalar components per element, `None` for shapes the decoder can't consume.
    pub fn components(self) -> Option<usize> {
        match self {
            Self::Scalar => Some(1),
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            Self::Unsupported => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub shape: ElementShape,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
}
