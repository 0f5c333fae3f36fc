//! Named data arrays attached to datasets.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;

use crate::util::{DType, Element, Error, Result, Shape};

/// Buffers at least this large get their value range computed in parallel.
const PAR_RANGE_THRESHOLD: usize = 1 << 20;
/// Elements per parallel range chunk.
const RANGE_CHUNK_ELEMENTS: usize = 1 << 16;

/// Named, typed, tuple-structured buffer (points, cells, point/cell fields).
///
/// Bytes are little-endian and shared through an `Arc`, so handing them to the
/// array cache does not copy.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    name: String,
    dtype: DType,
    components: usize,
    bytes: Arc<Vec<u8>>,
}

impl DataArray {
    /// Build from a typed slice.
    ///
    /// A value count that is not a multiple of `components` leaves the array
    /// incomplete (see [`is_complete`](Self::is_complete)); the serializer
    /// leaves such arrays out.
    pub fn from_slice<T: Element>(name: impl Into<String>, values: &[T], components: usize) -> Self {
        Self {
            name: name.into(),
            dtype: T::DTYPE,
            components: components.max(1),
            bytes: Arc::new(bytemuck::cast_slice(values).to_vec()),
        }
    }

    /// Like [`from_slice`](Self::from_slice) but rejects a value count that
    /// is not a whole number of tuples.
    pub fn try_from_slice<T: Element>(
        name: impl Into<String>,
        values: &[T],
        components: usize,
    ) -> Result<Self> {
        Self::from_bytes(name, T::DTYPE, components, bytemuck::cast_slice(values).to_vec())
    }

    /// Build from raw little-endian bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        dtype: DType,
        components: usize,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let components = components.max(1);
        let tuple_bytes = dtype.num_bytes() * components;
        if bytes.len() % tuple_bytes != 0 {
            let expected = (bytes.len() / tuple_bytes + 1) * tuple_bytes;
            return Err(Error::ShapeMismatch { expected, actual: bytes.len() });
        }
        Ok(Self { name: name.into(), dtype, components, bytes: Arc::new(bytes) })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Values per tuple (3 for points, 1 for scalars).
    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    #[inline]
    pub fn bytes(&self) -> &Arc<Vec<u8>> {
        &self.bytes
    }

    /// Total number of values.
    #[inline]
    pub fn num_values(&self) -> usize {
        self.bytes.len() / self.dtype.num_bytes()
    }

    /// Whether the buffer holds a whole number of tuples.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.bytes.len() % (self.dtype.num_bytes() * self.components) == 0
    }

    /// Number of tuples.
    #[inline]
    pub fn num_tuples(&self) -> usize {
        self.num_values() / self.components
    }

    /// `[tuples, components]`.
    pub fn shape(&self) -> Shape {
        Shape::d2(self.num_tuples(), self.components)
    }

    /// Value at a flat index, widened to f64.
    pub fn value(&self, index: usize) -> Option<f64> {
        let size = self.dtype.num_bytes();
        let start = index.checked_mul(size)?;
        let chunk = self.bytes.get(start..start + size)?;
        Some(element_as_f64(self.dtype, chunk))
    }

    /// Minimum and maximum over all values (NaN ignored).
    pub fn value_range(&self) -> Option<(f64, f64)> {
        value_range(&self.bytes, self.dtype)
    }
}

/// Decode one little-endian element.
fn element_as_f64(dtype: DType, b: &[u8]) -> f64 {
    match dtype {
        DType::Int8 => b[0] as i8 as f64,
        DType::Uint8 => b[0] as f64,
        DType::Int16 => LittleEndian::read_i16(b) as f64,
        DType::Uint16 => LittleEndian::read_u16(b) as f64,
        DType::Int32 => LittleEndian::read_i32(b) as f64,
        DType::Uint32 => LittleEndian::read_u32(b) as f64,
        DType::Int64 => LittleEndian::read_i64(b) as f64,
        DType::Uint64 => LittleEndian::read_u64(b) as f64,
        DType::Float16 => half::f16::from_bits(LittleEndian::read_u16(b)).to_f64(),
        DType::Float32 => LittleEndian::read_f32(b) as f64,
        DType::Float64 => LittleEndian::read_f64(b),
    }
}

fn range_of(bytes: &[u8], dtype: DType) -> Option<(f64, f64)> {
    bytes
        .chunks_exact(dtype.num_bytes())
        .map(|c| element_as_f64(dtype, c))
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn merge(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((alo, ahi)), Some((blo, bhi))) => Some((alo.min(blo), ahi.max(bhi))),
        (x, None) | (None, x) => x,
    }
}

/// Minimum and maximum of a raw buffer (NaN ignored, `None` when empty).
pub fn value_range(bytes: &[u8], dtype: DType) -> Option<(f64, f64)> {
    if bytes.len() < PAR_RANGE_THRESHOLD {
        return range_of(bytes, dtype);
    }
    bytes
        .par_chunks(RANGE_CHUNK_ELEMENTS * dtype.num_bytes())
        .map(|chunk| range_of(chunk, dtype))
        .reduce(|| None, merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuples() {
        let pts = DataArray::from_slice("Points", &[0.0f32, 0.0, 0.0, 1.0, 2.0, 3.0], 3);
        assert_eq!(pts.dtype(), DType::Float32);
        assert_eq!(pts.num_tuples(), 2);
        assert_eq!(pts.shape(), Shape::d2(2, 3));
        assert_eq!(pts.value(4), Some(2.0));
        assert_eq!(pts.value(6), None);
    }

    #[test]
    fn test_ragged_slice() {
        let ragged = DataArray::from_slice("Points", &[0.0f32, 1.0, 2.0, 3.0], 3);
        assert!(!ragged.is_complete());
        assert!(DataArray::try_from_slice("Points", &[0.0f32, 1.0, 2.0, 3.0], 3).is_err());

        let whole = DataArray::try_from_slice("Points", &[0.0f32, 1.0, 2.0], 3).unwrap();
        assert!(whole.is_complete());
        assert_eq!(whole.num_tuples(), 1);
    }

    #[test]
    fn test_from_bytes_checks_length() {
        assert!(DataArray::from_bytes("a", DType::Float32, 3, vec![0; 12]).is_ok());
        assert!(DataArray::from_bytes("a", DType::Float32, 3, vec![0; 10]).is_err());
    }

    #[test]
    fn test_value_range_types() {
        let a = DataArray::from_slice("s", &[-3i16, 7, 2], 1);
        assert_eq!(a.value_range(), Some((-3.0, 7.0)));

        let b = DataArray::from_slice("f", &[f32::NAN, 0.5, -1.5], 1);
        assert_eq!(b.value_range(), Some((-1.5, 0.5)));

        let h = DataArray::from_slice("h", &[half::f16::from_f32(2.0), half::f16::from_f32(-4.0)], 1);
        assert_eq!(h.value_range(), Some((-4.0, 2.0)));

        let e = DataArray::from_slice::<f64>("e", &[], 1);
        assert_eq!(e.value_range(), None);
    }

    #[test]
    fn test_parallel_range_matches_serial() {
        let values: Vec<u16> = (0..(PAR_RANGE_THRESHOLD as u32)).map(|i| (i % 60_000) as u16 + 3).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&values);
        assert!(bytes.len() >= PAR_RANGE_THRESHOLD);
        assert_eq!(value_range(bytes, DType::Uint16), Some((3.0, 60_002.0)));
    }
}
