//! Array shapes.

use smallvec::SmallVec;
use std::fmt;

/// Shape of a multi-dimensional array, outermost axis first.
///
/// Flat attribute arrays use `[tuples, components]`, volumes use
/// `[depth, height, width]` (C order, last axis varies fastest).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create from a slice of sizes.
    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    /// 1D shape.
    pub fn d1(len: usize) -> Self {
        Self { dims: smallvec::smallvec![len] }
    }

    /// 2D shape.
    pub fn d2(rows: usize, cols: usize) -> Self {
        Self { dims: smallvec::smallvec![rows, cols] }
    }

    /// 3D shape.
    pub fn d3(d0: usize, d1: usize, d2: usize) -> Self {
        Self { dims: smallvec::smallvec![d0, d1, d2] }
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// All axis sizes.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Size of one axis.
    pub fn size(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Total number of elements. A rank-0 shape holds one element.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Sizes as a 3-tuple, if rank is exactly 3.
    pub fn as_3d(&self) -> Option<[usize; 3]> {
        match self.dims.as_slice() {
            &[a, b, c] => Some([a, b, c]),
            _ => None,
        }
    }

    /// Bytes needed to store this shape with the given element size.
    #[inline]
    pub fn byte_len(&self, element_size: usize) -> usize {
        self.num_elements() * element_size
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims.as_slice())
    }
}

impl From<[usize; 3]> for Shape {
    fn from(d: [usize; 3]) -> Self {
        Self::d3(d[0], d[1], d[2])
    }
}
