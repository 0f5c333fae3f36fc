//! Volumetric data reduction and transfer records.
//!
//! - [`Subsampler`] - Shrinks 3D grids to a megabyte budget
//! - [`Resample`] / [`NearestZoom`] - Pluggable resampling
//! - [`VolumeDescriptor`] / [`VolumeRecord`] - Transfer forms
//! - [`SliceMap`] - Slice index conversion between grids

mod record;
mod resample;
mod subsample;

pub use record::{SliceMap, VolumeDescriptor, VolumeRecord};
pub use resample::{stride_subsample, NearestZoom, Resample};
pub use subsample::{SubsamplePlan, Subsampled, Subsampler};
