//! Buffer accessor resolution.
//!
//! Turns an accessor/buffer view pair into a typed view over the raw buffer bytes. Tightly packed
//! f32 data on an aligned offset is reinterpreted in place; strided, misaligned or big-endian
//! hosts fall back to an owned copy.

use std::{borrow::Cow, sync::Arc};

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    data_structures::{
        accessor::{Accessor, BufferView, ComponentType},
        attribute::AttributeArray,
    },
    error::DecodeError,
};

/// Typed scalars of an accessor, `count * components` long.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedView<'a> {
    U8(Cow<'a, [u8]>),
    F32(Cow<'a, [f32]>),
}

impl<'a> TypedView<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(values) => values.len(),
            Self::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::U8(Cow::Borrowed(_)) | Self::F32(Cow::Borrowed(_)))
    }

    pub fn into_array(self) -> AttributeArray {
        match self {
            Self::U8(values) => AttributeArray::U8(Arc::from(values.into_owned())),
            Self::F32(values) => AttributeArray::F32(Arc::from(values.into_owned())),
        }
    }
}

/// Resolves `accessor` (with index `idx`, used for diagnostics) against its buffer view.
///
/// The absolute offset is `view.byte_offset + accessor.byte_offset`; the whole range touched by
/// `accessor.count` elements has to lie inside `buffer`.
pub fn resolve<'a>(
    idx: usize,
    buffer: &'a [u8],
    accessor: &Accessor,
    view: &BufferView,
) -> Result<TypedView<'a>, DecodeError> {
    let component_type = ComponentType::from_code(accessor.component_type).ok_or(
        DecodeError::UnsupportedComponentType {
            accessor: idx,
            component_type: accessor.component_type,
        },
    )?;
    let components = accessor.shape.components().ok_or_else(|| {
        DecodeError::malformed(idx, format!("unsupported element shape {:?}", accessor.shape))
    })?;

    let element_size = component_type.size() * components;
    let stride = match view.byte_stride {
        Some(stride) if stride > element_size => stride,
        Some(stride) if stride != 0 && stride < element_size => {
            return Err(DecodeError::malformed(
                idx,
                format!("byte stride {} is smaller than the element size {}", stride, element_size),
            ));
        }
        _ => element_size,
    };

    let start = view
        .byte_offset
        .checked_add(accessor.byte_offset)
        .ok_or_else(|| DecodeError::malformed(idx, "byte offset overflows"))?;
    let span = match accessor.count {
        0 => 0,
        count => (count - 1)
            .checked_mul(stride)
            .and_then(|s| s.checked_add(element_size))
            .ok_or_else(|| DecodeError::malformed(idx, "byte length overflows"))?,
    };
    let end = start
        .checked_add(span)
        .ok_or_else(|| DecodeError::malformed(idx, "byte range overflows"))?;
    if end > buffer.len() {
        return Err(DecodeError::malformed(
            idx,
            format!("byte range {}..{} exceeds buffer length {}", start, end, buffer.len()),
        ));
    }

    let bytes = &buffer[start..end];
    let typed = if stride == element_size {
        match component_type {
            ComponentType::U8 => TypedView::U8(Cow::Borrowed(bytes)),
            ComponentType::F32 => TypedView::F32(f32_slice(bytes)),
        }
    } else {
        // Interleaved: gather each element's bytes into a packed copy first.
        let packed: Vec<u8> = (0..accessor.count)
            .flat_map(|i| &bytes[i * stride..i * stride + element_size])
            .copied()
            .collect();
        match component_type {
            ComponentType::U8 => TypedView::U8(Cow::Owned(packed)),
            ComponentType::F32 => TypedView::F32(Cow::Owned(f32_slice(&packed).into_owned())),
        }
    };
    Ok(typed)
}

fn f32_slice(bytes: &[u8]) -> Cow<'_, [f32]> {
    if cfg!(target_endian = "little") {
        if let Ok(floats) = bytemuck::try_cast_slice::<u8, f32>(bytes) {
            return Cow::Borrowed(floats);
        }
    }
    let mut floats = vec![0.0; bytes.len() / 4];
    LittleEndian::read_f32_into(&bytes[..floats.len() * 4], &mut floats);
    Cow::Owned(floats)
}
