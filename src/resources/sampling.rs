//! Point-cloud sampling stage.
//!
//! Consumes a reconstructed point cloud and produces the point array that is actually drawn:
//! a subset of the points (level of detail and sample rate) with one RGB color each.

use serde::{Deserialize, Serialize};

use crate::data_structures::mesh::DecodedMesh;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Vertex colors of the file, the solid color if it has none.
    #[default]
    Original,
    /// Blue to red ramp over the height of the sampled points.
    Height,
    /// Normals mapped into RGB, the solid color if there are none.
    Normal,
    Solid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub color_mode: ColorMode,
    pub solid_color: [u8; 3],
    /// Every level halves the number of kept points.
    pub lod_level: u32,
    /// Fraction of points kept at level 0, clamped to `(0, 1]`.
    pub sample_rate: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Original,
            solid_color: [200, 200, 200],
            lod_level: 0,
            sample_rate: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplingStats {
    pub total_points: usize,
    pub sampled_points: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampledPoints {
    /// xyz per point
    pub positions: Vec<f32>,
    /// rgb per point
    pub colors: Vec<u8>,
    pub stats: SamplingStats,
}

pub trait PointSampler {
    fn sample(&self, mesh: &DecodedMesh, config: &SamplingConfig) -> SampledPoints;
}

/// Keeps every `k`-th point, `k = max(1, round(1 / sample_rate)) * 2^lod_level`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrideSampler;

impl StrideSampler {
    pub fn stride(config: &SamplingConfig) -> usize {
        let rate = if config.sample_rate.is_finite() && config.sample_rate > 0.0 {
            config.sample_rate.min(1.0)
        } else {
            1.0
        };
        let base = ((1.0 / rate).round() as usize).max(1);
        base.saturating_mul(1usize.checked_shl(config.lod_level).unwrap_or(usize::MAX))
    }
}

impl PointSampler for StrideSampler {
    fn sample(&self, mesh: &DecodedMesh, config: &SamplingConfig) -> SampledPoints {
        let stride = Self::stride(config);
        // a mesh whose positions are shorter than its vertex count keeps what is there
        let kept: Vec<(usize, [f32; 3])> = (0..mesh.vertex_count)
            .step_by(stride)
            .map_while(|idx| mesh.position(idx).map(|p| (idx, p)))
            .collect();
        let positions: Vec<f32> = kept.iter().flat_map(|(_, p)| *p).collect();

        let (min_y, max_y) = positions
            .chunks_exact(3)
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[1]), hi.max(p[1]))
            });

        let mut colors = Vec::with_capacity(kept.len() * 3);
        for &(idx, [_, y, _]) in &kept {
            let rgb = match config.color_mode {
                ColorMode::Original => mesh
                    .colors
                    .as_ref()
                    .and_then(|colors| colors.rgb_u8(idx))
                    .unwrap_or(config.solid_color),
                ColorMode::Height => height_ramp(y, min_y, max_y),
                ColorMode::Normal => mesh
                    .normal(idx)
                    .map(|n| n.map(|c| ((c * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8))
                    .unwrap_or(config.solid_color),
                ColorMode::Solid => config.solid_color,
            };
            colors.extend_from_slice(&rgb);
        }

        log::debug!(
            "{}: sampled {} of {} points (stride {})",
            mesh.id,
            kept.len(),
            mesh.vertex_count,
            stride
        );
        SampledPoints {
            positions,
            colors,
            stats: SamplingStats {
                total_points: mesh.vertex_count,
                sampled_points: kept.len(),
            },
        }
    }
}

fn height_ramp(y: f32, min: f32, max: f32) -> [u8; 3] {
    let t = if max > min { (y - min) / (max - min) } else { 0.5 };
    let t = t.clamp(0.0, 1.0);
    [(t * 255.0).round() as u8, 0, ((1.0 - t) * 255.0).round() as u8]
}
