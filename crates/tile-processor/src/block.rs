//! Dense in-memory TCZYX block of `u16` pixels.

use std::ops::Range;

use crate::error::{Result, TileProcessorError};
use crate::types::Tczyx;

/// A dense block of pixels in row-major TCZYX order (X varies fastest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBlock {
    shape: Tczyx,
    data: Vec<u16>,
}

impl TileBlock {
    /// Wrap existing data. Fails unless `data.len()` matches the shape's volume.
    pub fn new(shape: Tczyx, data: Vec<u16>) -> Result<Self> {
        if data.len() as u64 != shape.volume() {
            return Err(TileProcessorError::shape_mismatch(
                format!("{} elements for shape {}", shape.volume(), shape),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { shape, data })
    }

    /// A block filled with zeros.
    pub fn zeros(shape: Tczyx) -> Self {
        Self {
            shape,
            data: vec![0; shape.volume() as usize],
        }
    }

    /// Build a block by evaluating `f` at every `(t, c, z, y, x)` position.
    pub fn from_fn(shape: Tczyx, f: impl Fn(Tczyx) -> u16) -> Self {
        let mut data = Vec::with_capacity(shape.volume() as usize);
        for t in 0..shape.t {
            for c in 0..shape.c {
                for z in 0..shape.z {
                    for y in 0..shape.y {
                        for x in 0..shape.x {
                            data.push(f(Tczyx::new(t, c, z, y, x)));
                        }
                    }
                }
            }
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> Tczyx {
        self.shape
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    /// Flat offset of a position. The position must be inside the block.
    pub fn offset(&self, pos: Tczyx) -> usize {
        let s = self.shape;
        ((((pos.t * s.c + pos.c) * s.z + pos.z) * s.y + pos.y) * s.x + pos.x) as usize
    }

    /// Value at a position, or `None` outside the block.
    pub fn get(&self, pos: Tczyx) -> Option<u16> {
        let s = self.shape;
        if pos.t < s.t && pos.c < s.c && pos.z < s.z && pos.y < s.y && pos.x < s.x {
            Some(self.data[self.offset(pos)])
        } else {
            None
        }
    }

    /// Copy out the sub-block selected by one range per axis (TCZYX order).
    pub fn slice(&self, ranges: &[Range<u64>; 5]) -> Result<TileBlock> {
        let dims = self.shape.to_array();
        for (r, &dim) in ranges.iter().zip(dims.iter()) {
            if r.start > r.end || r.end > dim {
                return Err(TileProcessorError::shape_mismatch(
                    format!("slice within {}", self.shape),
                    format!("{:?}", ranges),
                ));
            }
        }

        let [rt, rc, rz, ry, rx] = ranges;
        let out_shape = Tczyx::new(
            rt.end - rt.start,
            rc.end - rc.start,
            rz.end - rz.start,
            ry.end - ry.start,
            rx.end - rx.start,
        );
        let mut data = Vec::with_capacity(out_shape.volume() as usize);
        let row_len = out_shape.x as usize;
        for t in rt.clone() {
            for c in rc.clone() {
                for z in rz.clone() {
                    for y in ry.clone() {
                        let start = self.offset(Tczyx::new(t, c, z, y, rx.start));
                        data.extend_from_slice(&self.data[start..start + row_len]);
                    }
                }
            }
        }
        Ok(TileBlock {
            shape: out_shape,
            data,
        })
    }

    /// Copy `src` into this block with its origin at `at`.
    pub fn paste(&mut self, src: &TileBlock, at: Tczyx) -> Result<()> {
        let s = src.shape;
        let fits = at.t + s.t <= self.shape.t
            && at.c + s.c <= self.shape.c
            && at.z + s.z <= self.shape.z
            && at.y + s.y <= self.shape.y
            && at.x + s.x <= self.shape.x;
        if !fits {
            return Err(TileProcessorError::shape_mismatch(
                format!("block of {} at {} within {}", s, at, self.shape),
                "block overruns destination",
            ));
        }

        let row_len = s.x as usize;
        for t in 0..s.t {
            for c in 0..s.c {
                for z in 0..s.z {
                    for y in 0..s.y {
                        let from = src.offset(Tczyx::new(t, c, z, y, 0));
                        let to = self.offset(Tczyx::new(
                            at.t + t,
                            at.c + c,
                            at.z + z,
                            at.y + y,
                            at.x,
                        ));
                        self.data[to..to + row_len]
                            .copy_from_slice(&src.data[from..from + row_len]);
                    }
                }
            }
        }
        Ok(())
    }
}
