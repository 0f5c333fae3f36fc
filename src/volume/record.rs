//! Volume wire records and slice index mapping.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::util::{DType, Error, Result};

/// A (possibly subsampled) volume ready for transfer.
///
/// `dims`, `spacing` and `origin` follow the array axis order (C order,
/// last axis fastest). [`to_record`](Self::to_record) flips them to the
/// x-fastest order the client expects.
#[derive(Clone, Debug)]
pub struct VolumeDescriptor {
    pub bytes: Arc<Vec<u8>>,
    pub dims: [usize; 3],
    pub spacing: DVec3,
    pub origin: DVec3,
    pub data_range: (f64, f64),
    pub dtype: DType,
    /// Grid size before subsampling.
    pub original_dims: [usize; 3],
}

impl VolumeDescriptor {
    /// Wire form with a base64 buffer.
    pub fn to_record(&self) -> VolumeRecord {
        let s = self.spacing;
        let o = self.origin;
        VolumeRecord {
            buffer: STANDARD.encode(self.bytes.as_slice()),
            dims: [self.dims[2], self.dims[1], self.dims[0]],
            spacing: [s.z, s.y, s.x],
            origin: [o.z, o.y, o.x],
            data_range: self.data_range,
            dtype: self.dtype.name().to_string(),
        }
    }

    /// Index mapping between original and transferred grids.
    pub fn slice_map(&self) -> SliceMap {
        SliceMap { original: self.original_dims, reduced: self.dims }
    }
}

/// Volume transfer record (x-fastest axis order).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub buffer: String,
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub data_range: (f64, f64),
    pub dtype: String,
}

impl VolumeRecord {
    /// Decode the base64 buffer.
    pub fn decode_buffer(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.buffer)
            .map_err(|e| Error::other(format!("invalid volume buffer: {e}")))
    }

    /// Parsed element type.
    pub fn dtype(&self) -> Option<DType> {
        DType::from_name(&self.dtype)
    }
}

/// Converts slice positions between an original grid and its subsampled copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceMap {
    pub original: [usize; 3],
    pub reduced: [usize; 3],
}

impl SliceMap {
    /// Original index -> transferred index.
    pub fn to_reduced(&self, axis: usize, index: usize) -> usize {
        Self::scale(index, self.reduced[axis], self.original[axis])
    }

    /// Transferred index -> original index.
    pub fn to_original(&self, axis: usize, index: usize) -> usize {
        Self::scale(index, self.original[axis], self.reduced[axis])
    }

    /// Valid original index range per axis.
    pub fn bounds(&self, axis: usize) -> (usize, usize) {
        (0, self.original[axis].saturating_sub(1))
    }

    /// Middle slice of every axis in original indices.
    pub fn default_slices(&self) -> [usize; 3] {
        self.original.map(|n| n.saturating_sub(1) / 2)
    }

    fn scale(index: usize, num: usize, den: usize) -> usize {
        if den == 0 {
            return 0;
        }
        (index as f64 * num as f64 / den as f64).round() as usize
    }
}
