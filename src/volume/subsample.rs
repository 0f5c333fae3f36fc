//! Budget-driven volume subsampling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::DVec3;

use super::resample::{stride_subsample, Resample};
use super::VolumeDescriptor;
use crate::scene::value_range;
use crate::util::{DType, Error, Result};

/// Target grid for a volume under a size budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubsamplePlan {
    pub original: [usize; 3],
    pub target: [usize; 3],
    /// `original / target` per axis (1.0 when the axis is kept).
    pub shrink: [f64; 3],
}

impl SubsamplePlan {
    /// Plan for a C-order grid of `element_size`-byte voxels.
    ///
    /// `ratio = cbrt(megabytes / budget)`; each axis becomes
    /// `floor(n / ratio)`, never larger than `n` and never below 1.
    pub fn compute(shape: [usize; 3], element_size: usize, budget_mb: f64) -> Result<Self> {
        if !(budget_mb.is_finite() && budget_mb > 0.0) {
            return Err(Error::invalid(format!("size budget must be positive, got {budget_mb}")));
        }
        if shape.contains(&0) {
            return Err(Error::invalid(format!("empty volume {shape:?}")));
        }
        let megabytes = byte_len(shape, element_size)? as f64 / 1e6;
        let ratio = (megabytes / budget_mb).cbrt();

        let target = shape.map(|n| {
            if ratio <= 1.0 {
                n
            } else {
                ((n as f64 / ratio).floor() as usize).clamp(1, n)
            }
        });
        let shrink = std::array::from_fn(|a| shape[a] as f64 / target[a] as f64);
        Ok(Self { original: shape, target, shrink })
    }

    /// Whether any axis has to shrink.
    pub fn needs_resampling(&self) -> bool {
        self.shrink.iter().any(|&f| f > 1.0)
    }

    /// Fallback strides: `ceil(shrink)` per axis.
    pub fn strides(&self) -> [usize; 3] {
        self.shrink.map(|f| f.ceil().max(1.0) as usize)
    }
}

/// Bytes of a grid, or an error when the size does not fit in `usize`.
fn byte_len(shape: [usize; 3], element_size: usize) -> Result<usize> {
    shape
        .iter()
        .try_fold(element_size, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| Error::invalid(format!("volume {shape:?} is too large to address")))
}

/// Result of subsampling one volume.
#[derive(Clone, Debug)]
pub struct Subsampled {
    pub bytes: Arc<Vec<u8>>,
    pub shape: [usize; 3],
    pub spacing: DVec3,
    /// True when the strided fallback produced the grid.
    pub degraded: bool,
}

/// Reduces volumes to a transfer budget.
///
/// The quality path is an injected [`Resample`] implementation; without one,
/// volumes are reduced by naive striding and the loss of quality is logged.
pub struct Subsampler {
    budget_mb: f64,
    resampler: Option<Arc<dyn Resample>>,
    warned: AtomicBool,
}

impl Subsampler {
    /// Subsampler using the strided fallback.
    pub fn new(budget_mb: f64) -> Self {
        Self { budget_mb, resampler: None, warned: AtomicBool::new(false) }
    }

    /// Use `resampler` whenever a volume must shrink.
    pub fn with_resampler(mut self, resampler: Arc<dyn Resample>) -> Self {
        self.resampler = Some(resampler);
        self
    }

    #[inline]
    pub fn budget_mb(&self) -> f64 {
        self.budget_mb
    }

    /// Name of the configured resampler, if any.
    pub fn resampler_name(&self) -> Option<&str> {
        self.resampler.as_deref().map(|r| r.name())
    }

    /// Reduce a C-order grid to the budget.
    ///
    /// `spacing` follows the axis order of `shape`. The returned spacing is
    /// `n * spacing / m` per axis, so the physical extent (`count * spacing`)
    /// is the same before and after.
    pub fn subsample(
        &self,
        bytes: &Arc<Vec<u8>>,
        dtype: DType,
        shape: [usize; 3],
        spacing: DVec3,
    ) -> Result<Subsampled> {
        let element_size = dtype.num_bytes();
        let expected = byte_len(shape, element_size)?;
        if bytes.len() != expected {
            return Err(Error::ShapeMismatch { expected, actual: bytes.len() });
        }

        let plan = SubsamplePlan::compute(shape, element_size, self.budget_mb)?;
        if !plan.needs_resampling() {
            return Ok(Subsampled { bytes: Arc::clone(bytes), shape, spacing, degraded: false });
        }

        let _span = tracing::debug_span!("subsample", ?shape, target = ?plan.target).entered();
        let (out, out_shape, degraded) = match &self.resampler {
            Some(r) => (r.resample(bytes, element_size, shape, plan.target), plan.target, false),
            None => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!("no resampler configured, volumes are reduced by striding (degraded quality)");
                }
                let (out, s) = stride_subsample(bytes, element_size, shape, plan.strides());
                (out, s, true)
            }
        };

        let extent = DVec3::new(shape[0] as f64, shape[1] as f64, shape[2] as f64) * spacing;
        let counts = DVec3::new(out_shape[0] as f64, out_shape[1] as f64, out_shape[2] as f64);
        tracing::debug!(?out_shape, degraded, "volume subsampled");
        Ok(Subsampled { bytes: Arc::new(out), shape: out_shape, spacing: extent / counts, degraded })
    }

    /// Subsample and package a volume with its value range.
    pub fn describe(
        &self,
        bytes: &Arc<Vec<u8>>,
        dtype: DType,
        shape: [usize; 3],
        spacing: DVec3,
        origin: DVec3,
    ) -> Result<VolumeDescriptor> {
        let sub = self.subsample(bytes, dtype, shape, spacing)?;
        let data_range = value_range(&sub.bytes, dtype).unwrap_or((0.0, 0.0));
        Ok(VolumeDescriptor {
            bytes: sub.bytes,
            dims: sub.shape,
            spacing: sub.spacing,
            origin,
            data_range,
            dtype,
            original_dims: shape,
        })
    }
}

impl std::fmt::Debug for Subsampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subsampler")
            .field("budget_mb", &self.budget_mb)
            .field("resampler", &self.resampler_name())
            .finish()
    }
}
