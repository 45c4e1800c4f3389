//! Point-cloud attribute reconstruction.
//!
//! Point-cloud files name their per-vertex properties inconsistently. This module turns a flat
//! attribute table into a [`DecodedMesh`], trying color sources in a fixed priority:
//!
//! 1. a combined color attribute (`color` / `COLOR_0`)
//! 2. separate channels (`red,green,blue` and case variants, `r,g,b`)
//! 3. diffuse channels (`diffuse_red,...` and `diffuseRed,...`)
//! 4. the DC term of spherical-harmonics color (`f_dc_0..2`), the signature of a Gaussian splat
//!
//! Splat exporters use the opposite handedness, so when rule 4 fires positions and normals are
//! rewritten with Y and Z negated into new arrays. The input table is never touched.

use std::sync::Arc;

use crate::{
    data_structures::{
        attribute::{AttributeArray, AttributeData, AttributeTable},
        mesh::{DecodedMesh, VertexColors},
    },
    error::DecodeError,
};

/// Normalization constant of the zeroth-order real spherical harmonic, `1 / (2 * sqrt(pi))`.
pub const SH_C0: f64 = 0.28209479177387814;

const POSITION_NAMES: [&str; 2] = ["position", "POSITION"];
const POSITION_CHANNELS: [&str; 3] = ["x", "y", "z"];
const NORMAL_NAMES: [&str; 2] = ["normal", "NORMAL"];
const NORMAL_CHANNELS: [&str; 3] = ["nx", "ny", "nz"];
const COLOR_NAMES: [&str; 2] = ["color", "COLOR_0"];
const COLOR_CHANNELS: [[&str; 3]; 5] = [
    ["red", "green", "blue"],
    ["Red", "Green", "Blue"],
    ["RED", "GREEN", "BLUE"],
    ["r", "g", "b"],
    ["R", "G", "B"],
];
const DIFFUSE_CHANNELS: [[&str; 3]; 2] = [
    ["diffuse_red", "diffuse_green", "diffuse_blue"],
    ["diffuseRed", "diffuseGreen", "diffuseBlue"],
];
const SH_DC_CHANNELS: [&str; 3] = ["f_dc_0", "f_dc_1", "f_dc_2"];

/// Which rule produced the colors of a point cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSource {
    Combined,
    Channels,
    DiffuseChannels,
    SphericalHarmonics,
}

/// Reconstructs positions, colors and normals of one point cloud.
pub fn reconstruct(id: &str, table: &AttributeTable) -> Result<DecodedMesh, DecodeError> {
    let positions = combined(table, &POSITION_NAMES, 3)
        .or_else(|| channels(table, &POSITION_CHANNELS).map(interleave_f32))
        .ok_or(DecodeError::MissingPositionData)?;
    let normals = combined(table, &NORMAL_NAMES, 3)
        .or_else(|| channels(table, &NORMAL_CHANNELS).map(interleave_f32));
    let colors = detect_colors(table);

    let splat = matches!(colors, Some((_, ColorSource::SphericalHarmonics)));
    let (positions, normals) = if splat {
        log::debug!("{}: gaussian splat detected, converting handedness", id);
        (flip_yz(&positions), normals.as_deref().map(flip_yz))
    } else {
        (positions, normals)
    };

    let mesh =
        DecodedMesh::from_positions(id, positions).ok_or(DecodeError::MissingPositionData)?;
    if mesh.vertex_count == 0 {
        log::warn!("{}: point cloud has no points", id);
    }
    Ok(mesh
        .with_normals(normals)
        .with_colors(colors.map(|(colors, _)| colors)))
}

/// Picks the first matching color rule.
pub fn detect_colors(table: &AttributeTable) -> Option<(VertexColors, ColorSource)> {
    if let Some(colors) = COLOR_NAMES.iter().find_map(|name| {
        table
            .get(*name)
            .filter(|attribute| attribute.item_size == 3 || attribute.item_size == 4)
    }) {
        let colors = VertexColors {
            values: colors.array.clone(),
            components: colors.item_size,
        };
        return Some((colors, ColorSource::Combined));
    }
    if let Some(rgb) = COLOR_CHANNELS.iter().find_map(|names| channels(table, names)) {
        return Some((interleave_colors(rgb), ColorSource::Channels));
    }
    if let Some(rgb) = DIFFUSE_CHANNELS.iter().find_map(|names| channels(table, names)) {
        return Some((interleave_colors(rgb), ColorSource::DiffuseChannels));
    }
    if let Some(dc) = channels(table, &SH_DC_CHANNELS) {
        let count = shortest(&dc);
        let values: Vec<u8> = (0..count)
            .flat_map(|i| dc.map(|channel| sh_dc_to_u8(channel.array.get_f32(i).unwrap_or(0.0))))
            .collect();
        let colors = VertexColors {
            values: values.into(),
            components: 3,
        };
        return Some((colors, ColorSource::SphericalHarmonics));
    }
    None
}

/// `clamp(0.5 + C0 * dc, 0, 1) * 255`, rounded half away from zero (127.5 becomes 128).
pub fn sh_dc_to_u8(dc: f32) -> u8 {
    ((0.5 + SH_C0 * dc as f64).clamp(0.0, 1.0) * 255.0).round() as u8
}

fn combined(table: &AttributeTable, names: &[&str], item_size: usize) -> Option<Arc<[f32]>> {
    names.iter().find_map(|name| {
        let attribute = table.get(*name)?;
        if attribute.item_size != item_size || attribute.array.len() % item_size != 0 {
            log::warn!(
                "ignoring {} with item size {} and {} values",
                name,
                attribute.item_size,
                attribute.array.len()
            );
            return None;
        }
        match &attribute.array {
            AttributeArray::F32(values) => Some(values.clone()),
            AttributeArray::U8(values) => Some(values.iter().map(|v| *v as f32).collect()),
        }
    })
}

fn channels<'a>(table: &'a AttributeTable, names: &[&str; 3]) -> Option<[&'a AttributeData; 3]> {
    Some([table.get(names[0])?, table.get(names[1])?, table.get(names[2])?])
}

fn shortest(channels: &[&AttributeData; 3]) -> usize {
    channels
        .iter()
        .map(|channel| channel.array.len())
        .min()
        .unwrap_or(0)
}

fn interleave_f32(channels: [&AttributeData; 3]) -> Arc<[f32]> {
    (0..shortest(&channels))
        .flat_map(|i| channels.map(|channel| channel.array.get_f32(i).unwrap_or(0.0)))
        .collect()
}

/// Interleaves separate color channels.
///
/// Storage width comes from the red channel: 8-bit storage is kept as is, otherwise the first
/// red sample decides (above 1 means 0..=255 values, else normalized floats).
fn interleave_colors(channels: [&AttributeData; 3]) -> VertexColors {
    let [red, ..] = channels;
    let eight_bit = red.array.is_u8() || red.array.get_f32(0).is_some_and(|v| v > 1.0);
    let count = shortest(&channels);
    let values = if eight_bit {
        let bytes: Vec<u8> = (0..count)
            .flat_map(|i| {
                channels.map(|channel| match &channel.array {
                    AttributeArray::U8(values) => values[i],
                    AttributeArray::F32(values) => values[i].round().clamp(0.0, 255.0) as u8,
                })
            })
            .collect();
        AttributeArray::from(bytes)
    } else {
        AttributeArray::F32(interleave_f32(channels))
    };
    VertexColors {
        values,
        components: 3,
    }
}

/// Copies `values` with the Y and Z component of every triple negated.
pub fn flip_yz(values: &[f32]) -> Arc<[f32]> {
    values
        .chunks_exact(3)
        .flat_map(|v| [v[0], -v[1], -v[2]])
        .collect()
}
