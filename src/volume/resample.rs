//! Grid resampling strategies for 3D volumes.
//!
//! Both strategies pick source voxels (no value blending), so they work on
//! any element type by copying `element_size`-byte cells.

use rayon::prelude::*;

/// A resampling facility that produces exactly the requested shape.
pub trait Resample: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Resample a C-order `shape` grid to `target`.
    fn resample(&self, src: &[u8], element_size: usize, shape: [usize; 3], target: [usize; 3]) -> Vec<u8>;
}

/// Order-0 zoom: output sample `o` reads source index
/// `round(o * (n - 1) / (m - 1))`, so both grid ends are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestZoom;

impl NearestZoom {
    fn axis_map(n: usize, m: usize) -> Vec<usize> {
        if m <= 1 || n <= 1 {
            return vec![0; m.max(1)];
        }
        let scale = (n - 1) as f64 / (m - 1) as f64;
        (0..m)
            .map(|o| ((o as f64 * scale).round() as usize).min(n - 1))
            .collect()
    }
}

impl Resample for NearestZoom {
    fn name(&self) -> &str {
        "nearest-zoom"
    }

    fn resample(&self, src: &[u8], element_size: usize, shape: [usize; 3], target: [usize; 3]) -> Vec<u8> {
        let maps = [
            Self::axis_map(shape[0], target[0]),
            Self::axis_map(shape[1], target[1]),
            Self::axis_map(shape[2], target[2]),
        ];
        gather(src, element_size, shape, &maps)
    }
}

/// Naive strided subsampling: keep every `stride`-th voxel along each axis.
///
/// Returns the reduced buffer and its shape (`ceil(n / stride)` per axis).
pub fn stride_subsample(
    src: &[u8],
    element_size: usize,
    shape: [usize; 3],
    stride: [usize; 3],
) -> (Vec<u8>, [usize; 3]) {
    let maps: [Vec<usize>; 3] =
        std::array::from_fn(|a| (0..shape[a]).step_by(stride[a].max(1)).collect());
    let out_shape = [maps[0].len(), maps[1].len(), maps[2].len()];
    (gather(src, element_size, shape, &maps), out_shape)
}

/// Copy the voxels selected by per-axis index maps into a new C-order buffer.
fn gather(src: &[u8], element_size: usize, shape: [usize; 3], maps: &[Vec<usize>; 3]) -> Vec<u8> {
    let row = shape[2] * element_size;
    let plane = shape[1] * row;
    let out_plane = maps[1].len() * maps[2].len() * element_size;
    let mut out = vec![0u8; maps[0].len() * out_plane];
    if out.is_empty() {
        return out;
    }

    out.par_chunks_mut(out_plane)
        .zip(maps[0].par_iter())
        .for_each(|(dst_plane, &k)| {
            let mut offset = 0;
            for &j in &maps[1] {
                let src_row = k * plane + j * row;
                for &i in &maps[2] {
                    let s = src_row + i * element_size;
                    dst_plane[offset..offset + element_size].copy_from_slice(&src[s..s + element_size]);
                    offset += element_size;
                }
            }
        });
    out
}
