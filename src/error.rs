//! Decode error taxonomy.
//!
//! Accessor-level failures are recovered close to where they happen: an optional attribute is
//! omitted and a primitive without positions is dropped. Whole-asset failures surface to the
//! load orchestration wrapped in an `anyhow::Error`, so callers can `downcast_ref::<DecodeError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The accessor's byte range does not fit its buffer or it cannot be interpreted.
    #[error("accessor {accessor} is malformed: {reason}")]
    MalformedAccessor { accessor: usize, reason: String },

    /// The accessor uses a component type other than u8 or f32.
    #[error("accessor {accessor} uses unsupported component type {component_type}")]
    UnsupportedComponentType { accessor: usize, component_type: u32 },

    #[error("point cloud has no position attribute")]
    MissingPositionData,

    #[error("mesh asset contains no primitive with resolvable positions")]
    DecodeYieldedEmpty,
}

impl DecodeError {
    pub(crate) fn malformed(accessor: usize, reason: impl Into<String>) -> Self {
        Self::MalformedAccessor {
            accessor,
            reason: reason.into(),
        }
    }

    /// True for every accessor-level failure, including the unsupported component type subtype.
    pub fn is_malformed_accessor(&self) -> bool {
        matches!(
            self,
            Self::MalformedAccessor { .. } | Self::UnsupportedComponentType { .. }
        )
    }
}
