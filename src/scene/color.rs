//! Lookup tables and the color mappers derived from them.

use serde::{Deserialize, Serialize};

/// Scalar-to-color table: RGBA entries spread linearly over `range`.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTable {
    pub table: Vec<[u8; 4]>,
    pub range: [f64; 2],
}

impl LookupTable {
    /// Table from explicit RGBA entries.
    pub fn new(table: Vec<[u8; 4]>, range: [f64; 2]) -> Self {
        Self { table, range }
    }

    /// Linear black-to-white ramp with `n` entries.
    pub fn grayscale(n: usize, range: [f64; 2]) -> Self {
        let n = n.max(2);
        let table = (0..n)
            .map(|i| {
                let v = (i * 255 / (n - 1)) as u8;
                [v, v, v, 255]
            })
            .collect();
        Self { table, range }
    }

    /// Table from unit-range RGB colors (fully opaque).
    pub fn from_unit_rgb(colors: &[[f64; 3]], range: [f64; 2]) -> Self {
        let table = colors
            .iter()
            .map(|c| {
                let [r, g, b] = c.map(unit_to_u8);
                [r, g, b, 255]
            })
            .collect();
        Self { table, range }
    }

    /// `#rrggbb` strings, alpha dropped.
    pub fn palette(&self) -> Vec<String> {
        self.table.iter().map(|c| rgb_to_hex([c[0], c[1], c[2]])).collect()
    }

    /// Table flattened to RGBA bytes.
    pub fn rgba_bytes(&self) -> Vec<u8> {
        self.table.iter().flatten().copied().collect()
    }
}

/// A color mapper the client renders as a color bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorMapper {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub palette: Vec<String>,
}

impl ColorMapper {
    /// Mapper for a lookup table under the given title.
    pub fn from_table(name: impl Into<String>, lut: &LookupTable) -> Self {
        Self {
            name: name.into(),
            low: lut.range[0],
            high: lut.range[1],
            palette: lut.palette(),
        }
    }
}

fn unit_to_u8(v: f64) -> u8 {
    (255.0 * v.clamp(0.0, 1.0)) as u8
}

/// Format 8-bit channels as `#rrggbb`.
pub fn rgb_to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Format unit-range channels as `#rrggbb` (each scaled by 255 and truncated).
pub fn unit_rgb_to_hex(rgb: [f64; 3]) -> String {
    rgb_to_hex(rgb.map(unit_to_u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(rgb_to_hex([255, 0, 16]), "#ff0010");
        assert_eq!(unit_rgb_to_hex([1.0, 0.5, 0.0]), "#ff7f00");
        assert_eq!(unit_rgb_to_hex([2.0, -1.0, 0.0]), "#ff0000");
    }

    #[test]
    fn test_mapper_from_table() {
        let lut = LookupTable::grayscale(3, [-1.0, 4.0]);
        let m = ColorMapper::from_table("Pressure", &lut);
        assert_eq!(m.low, -1.0);
        assert_eq!(m.high, 4.0);
        assert_eq!(m.palette, vec!["#000000", "#7f7f7f", "#ffffff"]);
        assert_eq!(lut.rgba_bytes().len(), 12);
    }
}
