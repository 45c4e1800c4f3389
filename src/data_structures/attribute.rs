//! Materialized attribute arrays.
//!
//! Arrays are reference counted so the decoder can hand the same allocation to a
//! [`DecodedMesh`](super::mesh::DecodedMesh) without copying, and so that a transform producing a
//! new array can be told apart from its input with `Arc::ptr_eq`.

use std::{collections::HashMap, sync::Arc};

/// A homogeneous numeric array with either 8-bit or f32 storage.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeArray {
    U8(Arc<[u8]>),
    F32(Arc<[f32]>),
}

impl AttributeArray {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(values) => values.len(),
            Self::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar at `idx` widened to f32.
    pub fn get_f32(&self, idx: usize) -> Option<f32> {
        match self {
            Self::U8(values) => values.get(idx).map(|v| *v as f32),
            Self::F32(values) => values.get(idx).copied(),
        }
    }

    pub fn as_f32(&self) -> Option<&Arc<[f32]>> {
        match self {
            Self::F32(values) => Some(values),
            Self::U8(_) => None,
        }
    }

    pub fn is_u8(&self) -> bool {
        matches!(self, Self::U8(_))
    }
}

impl From<Vec<u8>> for AttributeArray {
    fn from(values: Vec<u8>) -> Self {
        Self::U8(values.into())
    }
}

impl From<Vec<f32>> for AttributeArray {
    fn from(values: Vec<f32>) -> Self {
        Self::F32(values.into())
    }
}

/// An array plus the number of scalars that make up one vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeData {
    pub array: AttributeArray,
    pub item_size: usize,
}

impl AttributeData {
    pub fn new(array: impl Into<AttributeArray>, item_size: usize) -> Self {
        Self {
            array: array.into(),
            item_size,
        }
    }

    /// One scalar per vertex.
    pub fn scalar(array: impl Into<AttributeArray>) -> Self {
        Self::new(array, 1)
    }

    /// Number of vertices described, rounding down on a ragged tail.
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.array.len() / self.item_size
        }
    }
}

/// Attribute name to data. Names are case-sensitive.
pub type AttributeTable = HashMap<String, AttributeData>;
