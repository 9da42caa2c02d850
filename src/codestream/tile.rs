//! Coefficient planes and their payload layout.
//!
//! Tile data is a sequence of segments, one per (resolution, component).
//! Each segment is a big-endian `u32` byte count followed by the
//! coefficients of that resolution's subbands, row-major, as zigzag LEB128
//! varints. Resolution 0 carries the LL band of the coarsest level;
//! resolution `r >= 1` carries HL, LH and HH of decomposition level
//! `D - r + 1`.

use crate::geometry::{ProgressionOrder, Size};
use crate::resolution::reduce;

/// A row-major 2D sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Plane<T> {
    pub fn new(size: Size) -> Self {
        Self {
            width: size.width as usize,
            height: size.height as usize,
            data: vec![T::default(); size.area()],
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn samples_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copies the first `height` samples of column `x` into `out`.
    pub fn read_column(&self, x: usize, height: usize, out: &mut Vec<T>) {
        out.clear();
        out.extend((0..height).map(|y| self.data[y * self.width + x]));
    }

    pub fn write_column(&mut self, x: usize, column: &[T]) {
        for (y, &v) in column.iter().enumerate() {
            self.data[y * self.width + x] = v;
        }
    }

    /// Top-left `size` corner of the plane.
    pub fn crop(&self, size: Size) -> Plane<T> {
        let mut out = Plane::new(size);
        let width = size.width as usize;
        for y in 0..size.height as usize {
            out.row_mut(y).copy_from_slice(&self.row(y)[..width]);
        }
        out
    }

    pub fn map<U: Copy + Default>(&self, f: impl Fn(T) -> U) -> Plane<U> {
        Plane {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Half-open rectangle `[x0, x1) x [y0, y1)` inside a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0: x0 as usize,
            y0: y0 as usize,
            x1: x1 as usize,
            y1: y1 as usize,
        }
    }

    pub fn area(&self) -> usize {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }
}

/// Subband rectangles carried by `resolution` of a `size` plane decomposed
/// `num_decompositions` times.
pub fn resolution_bands(size: Size, num_decompositions: u32, resolution: u32) -> Vec<Region> {
    if resolution == 0 {
        let ll = reduce(size, num_decompositions);
        return vec![Region::new(0, 0, ll.width, ll.height)];
    }
    let level = num_decompositions - resolution + 1;
    let low = reduce(size, level);
    let high = reduce(size, level - 1);
    vec![
        Region::new(low.width, 0, high.width, low.height),
        Region::new(0, low.height, low.width, high.height),
        Region::new(low.width, low.height, high.width, high.height),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId {
    pub resolution: u32,
    pub component: usize,
}

/// Emission order of segments. With one layer and one precinct per
/// resolution, LRCP/RLCP/RPCL reduce to resolution-major and PCRL/CPRL to
/// component-major order.
pub fn segment_order(
    order: ProgressionOrder,
    components: usize,
    num_decompositions: u32,
) -> Vec<SegmentId> {
    let resolutions = 0..=num_decompositions;
    if order.is_resolution_major() {
        resolutions
            .flat_map(|resolution| {
                (0..components).map(move |component| SegmentId {
                    resolution,
                    component,
                })
            })
            .collect()
    } else {
        (0..components)
            .flat_map(|component| {
                resolutions.clone().map(move |resolution| SegmentId {
                    resolution,
                    component,
                })
            })
            .collect()
    }
}

pub fn write_varint(out: &mut Vec<u8>, value: i32) {
    let mut v = ((value << 1) ^ (value >> 31)) as u32;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Returns `None` at end of input or on an overlong encoding.
pub fn read_varint(bytes: &[u8], position: &mut usize) -> Option<i32> {
    let mut v: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*position)?;
        *position += 1;
        if shift > 28 {
            return None;
        }
        v |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Some((v >> 1) as i32 ^ -((v & 1) as i32))
}

/// Serializes the coefficients of `regions` (without the length prefix).
pub fn encode_segment(plane: &Plane<i32>, regions: &[Region]) -> Vec<u8> {
    let mut body = Vec::with_capacity(regions.iter().map(Region::area).sum());
    for region in regions {
        for y in region.y0..region.y1 {
            for &v in &plane.row(y)[region.x0..region.x1] {
                write_varint(&mut body, v);
            }
        }
    }
    body
}

/// Fills `regions` from `body`. Returns false when the body runs out early;
/// the samples not covered keep their previous value.
pub fn decode_segment(body: &[u8], plane: &mut Plane<i32>, regions: &[Region]) -> bool {
    let mut position = 0;
    for region in regions {
        for y in region.y0..region.y1 {
            for v in &mut plane.row_mut(y)[region.x0..region.x1] {
                match read_varint(body, &mut position) {
                    Some(value) => *v = value,
                    None => return false,
                }
            }
        }
    }
    true
}

/// Groups length-prefixed segments into tile-part payloads. A new tile-part
/// starts when the resolution changes (`at_resolutions`) or the component
/// changes (`at_components`).
pub fn split_tile_parts(
    segments: &[(SegmentId, Vec<u8>)],
    at_resolutions: bool,
    at_components: bool,
) -> Vec<Vec<u8>> {
    let mut parts: Vec<Vec<u8>> = Vec::new();
    let mut previous: Option<SegmentId> = None;
    for (id, body) in segments {
        let split = previous.is_some_and(|p| {
            (at_resolutions && p.resolution != id.resolution)
                || (at_components && p.component != id.component)
        });
        if previous.is_none() || split {
            parts.push(Vec::new());
        }
        if let Some(part) = parts.last_mut() {
            part.extend_from_slice(&(body.len() as u32).to_be_bytes());
            part.extend_from_slice(body);
        }
        previous = Some(*id);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varints_cover_i32_range() {
        let values = [0, 1, -1, 63, -64, 64, 300, -300, i32::MAX, i32::MIN];
        let mut bytes = Vec::new();
        for &v in &values {
            write_varint(&mut bytes, v);
        }
        assert_eq!(&bytes[..3], &[0, 2, 1]);
        let mut position = 0;
        for &v in &values {
            assert_eq!(read_varint(&bytes, &mut position), Some(v));
        }
        assert_eq!(read_varint(&bytes, &mut position), None);
    }

    #[test]
    fn bands_tile_the_plane() {
        let size = Size::new(13, 7);
        let total: usize = (0..=3)
            .flat_map(|r| resolution_bands(size, 3, r))
            .map(|region| region.area())
            .sum();
        assert_eq!(total, size.area());
        assert_eq!(resolution_bands(size, 3, 0), vec![Region::new(0, 0, 2, 1)]);
        assert_eq!(
            resolution_bands(size, 3, 3)[2],
            Region::new(7, 4, 13, 7),
            "finest HH"
        );
    }

    #[test]
    fn progression_decides_segment_nesting() {
        let rpcl = segment_order(ProgressionOrder::Rpcl, 2, 1);
        assert_eq!(
            rpcl.iter().map(|s| (s.resolution, s.component)).collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 0), (1, 1)]
        );
        let cprl = segment_order(ProgressionOrder::Cprl, 2, 1);
        assert_eq!(
            cprl.iter().map(|s| (s.resolution, s.component)).collect::<Vec<_>>(),
            vec![(0, 0), (1, 0), (0, 1), (1, 1)]
        );
    }

    #[test]
    fn truncated_segment_leaves_rest_untouched() {
        let mut plane = Plane::new(Size::new(2, 2));
        plane.fill(9);
        let mut body = Vec::new();
        write_varint(&mut body, -3);
        write_varint(&mut body, 4);
        let region = [Region::new(0, 0, 2, 2)];
        assert!(!decode_segment(&body, &mut plane, &region));
        assert_eq!(plane.row(0), &[-3, 4]);
        assert_eq!(plane.row(1), &[9, 9]);
    }

    #[test]
    fn tile_parts_follow_division_flags() {
        let segments: Vec<(SegmentId, Vec<u8>)> = segment_order(ProgressionOrder::Rpcl, 3, 2)
            .into_iter()
            .map(|id| (id, vec![0]))
            .collect();
        assert_eq!(split_tile_parts(&segments, false, false).len(), 1);
        assert_eq!(split_tile_parts(&segments, true, false).len(), 3);
        assert_eq!(split_tile_parts(&segments, false, true).len(), 9);
        assert_eq!(split_tile_parts(&segments, true, true).len(), 9);
        // 4-byte length prefix plus one body byte per segment
        assert_eq!(split_tile_parts(&segments, false, false)[0].len(), 9 * 5);
    }
}
