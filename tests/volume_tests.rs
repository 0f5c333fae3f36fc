//! Integration tests for volume subsampling and transfer records.

use std::sync::Arc;

use glam::DVec3;

use scene_sync::volume::{NearestZoom, SubsamplePlan, Subsampler, VolumeRecord};
use scene_sync::{DType, Result};

/// C-order (z, y, x) ramp of u16 voxels.
fn ramp(shape: [usize; 3]) -> Arc<Vec<u8>> {
    let values: Vec<u16> = (0..shape.iter().product::<usize>()).map(|v| (v % 4000) as u16).collect();
    Arc::new(bytemuck::cast_slice(&values).to_vec())
}

#[test]
fn test_quality_path_hits_target_shape() -> Result<()> {
    let shape = [60, 80, 100];
    let bytes = ramp(shape);
    // 960 kB into 0.2 MB.
    let plan = SubsamplePlan::compute(shape, 2, 0.2)?;
    assert!(plan.needs_resampling());

    let sampler = Subsampler::new(0.2).with_resampler(Arc::new(NearestZoom));
    let sub = sampler.subsample(&bytes, DType::Uint16, shape, DVec3::new(3.0, 2.0, 1.0))?;
    assert_eq!(sub.shape, plan.target);
    assert!(!sub.degraded);
    assert!(sub.bytes.len() as f64 / 1e6 <= 0.2 + 1e-9);

    let extent = DVec3::new(sub.shape[0] as f64, sub.shape[1] as f64, sub.shape[2] as f64) * sub.spacing;
    assert!(extent.abs_diff_eq(DVec3::new(180.0, 160.0, 100.0), 1e-9));
    Ok(())
}

#[test]
fn test_fallback_is_degraded_but_bounded() -> Result<()> {
    let shape = [60, 80, 100];
    let bytes = ramp(shape);
    let sub = Subsampler::new(0.2).subsample(&bytes, DType::Uint16, shape, DVec3::ONE)?;
    assert!(sub.degraded);
    assert!(sub.shape.iter().zip(shape).all(|(&m, n)| m < n));
    assert_eq!(sub.bytes.len(), sub.shape.iter().product::<usize>() * 2);
    Ok(())
}

#[test]
fn test_record_for_client() -> Result<()> {
    let shape = [60, 80, 100];
    let bytes = ramp(shape);
    let desc = Subsampler::new(0.2).with_resampler(Arc::new(NearestZoom)).describe(
        &bytes,
        DType::Uint16,
        shape,
        DVec3::new(3.0, 2.0, 1.0),
        DVec3::new(-30.0, -20.0, -10.0),
    )?;
    assert_eq!(desc.original_dims, shape);
    assert!(desc.data_range.0 >= 0.0 && desc.data_range.1 < 4000.0);

    let record = desc.to_record();
    assert_eq!(record.dims, [desc.dims[2], desc.dims[1], desc.dims[0]]);
    assert_eq!(record.origin, [-10.0, -20.0, -30.0]);
    assert_eq!(record.dtype, "uint16");
    assert_eq!(record.decode_buffer()?.len(), desc.dims.iter().product::<usize>() * 2);

    // Records survive JSON transport unchanged.
    let json = serde_json::to_string(&record)?;
    let back: VolumeRecord = serde_json::from_str(&json)?;
    assert_eq!(back, record);
    assert_eq!(back.dtype(), Some(DType::Uint16));

    let slices = desc.slice_map();
    assert_eq!(slices.default_slices(), [29, 39, 49]);
    let last = slices.to_reduced(2, 99);
    assert!(last <= desc.dims[2]);
    assert_eq!(slices.to_original(2, 0), 0);
    Ok(())
}
