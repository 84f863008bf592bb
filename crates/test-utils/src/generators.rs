//! Test data generators for creating synthetic TCZYX volumes.
//!
//! Every voxel value is a function of its absolute coordinate, so any block
//! read back from a store can be checked without keeping the source around.

use std::sync::atomic::{AtomicUsize, Ordering};

use tile_processor::{
    Result, SceneRect, SourceInfo, SourceReader, Tczyx, TileBlock, TileProcessorError,
};

/// Value of the voxel at absolute coordinate `(t, c, z, y, x)`.
///
/// Never zero, so written data is distinguishable from a zero fill value.
///
/// # Example
///
/// ```
/// use test_utils::voxel_value;
///
/// assert_ne!(voxel_value(0, 0, 0, 0, 0), 0);
/// assert_ne!(voxel_value(0, 0, 0, 0, 1), voxel_value(0, 0, 0, 1, 0));
/// ```
pub fn voxel_value(t: u64, c: u64, z: u64, y: i64, x: i64) -> u16 {
    let mixed = t.wrapping_mul(7_919)
        ^ c.wrapping_mul(104_729)
        ^ z.wrapping_mul(15_485_863)
        ^ (y as u64).wrapping_mul(613)
        ^ (x as u64).wrapping_mul(3);
    (mixed % 65_535 + 1) as u16
}

/// Creates a block filled with the test pattern.
///
/// `offset` is the absolute coordinate of the block's first voxel.
pub fn pattern_block(offset: Tczyx, shape: Tczyx) -> TileBlock {
    TileBlock::from_fn(shape, |p| {
        voxel_value(
            offset.t + p.t,
            offset.c + p.c,
            offset.z + p.z,
            (offset.y + p.y) as i64,
            (offset.x + p.x) as i64,
        )
    })
}

/// Creates a whole test volume of `extent` starting at the origin.
pub fn create_test_volume(extent: Tczyx) -> TileBlock {
    pattern_block(Tczyx::default(), extent)
}

/// First voxel where `block` differs from the pattern at `offset`.
///
/// Returns `(local coordinate, expected, actual)`.
pub fn first_pattern_mismatch(block: &TileBlock, offset: Tczyx) -> Option<(Tczyx, u16, u16)> {
    let expected = pattern_block(offset, block.shape());
    let shape = block.shape();
    for t in 0..shape.t {
        for c in 0..shape.c {
            for z in 0..shape.z {
                for y in 0..shape.y {
                    for x in 0..shape.x {
                        let p = Tczyx::new(t, c, z, y, x);
                        let (want, got) = (expected.get(p)?, block.get(p)?);
                        if want != got {
                            return Some((p, want, got));
                        }
                    }
                }
            }
        }
    }
    None
}

/// A [`SourceReader`] serving the test pattern from memory.
///
/// The image rectangle may be offset from the origin and scenes may be
/// registered with their own rectangles; pixel values always follow the
/// absolute coordinate, so offsets are visible in the data.
#[derive(Debug)]
pub struct InMemorySource {
    times: u64,
    channels: u64,
    depths: u64,
    full_rect: SceneRect,
    scenes: Vec<(u32, SceneRect)>,
    planes_read: AtomicUsize,
}

impl InMemorySource {
    /// A source whose full image starts at the origin.
    pub fn new(extent: Tczyx) -> Self {
        Self::with_rect(extent, SceneRect::new(0, 0, extent.x, extent.y))
    }

    /// A source with an explicit full-image rectangle. The Y/X sizes of
    /// `extent` are ignored in favour of the rectangle.
    pub fn with_rect(extent: Tczyx, full_rect: SceneRect) -> Self {
        Self {
            times: extent.t,
            channels: extent.c,
            depths: extent.z,
            full_rect,
            scenes: Vec::new(),
            planes_read: AtomicUsize::new(0),
        }
    }

    /// Register a scene rectangle.
    pub fn with_scene(mut self, scene: u32, rect: SceneRect) -> Self {
        self.scenes.push((scene, rect));
        self
    }

    /// Number of `read_plane` calls served so far.
    pub fn planes_read(&self) -> usize {
        self.planes_read.load(Ordering::SeqCst)
    }
}

impl SourceReader for InMemorySource {
    fn info(&self) -> Result<SourceInfo> {
        Ok(SourceInfo {
            times: self.times,
            channels: self.channels,
            depths: self.depths,
            full_rect: self.full_rect,
        })
    }

    fn scene_rectangle(&self, scene: u32) -> Result<Option<SceneRect>> {
        Ok(self
            .scenes
            .iter()
            .find(|(id, _)| *id == scene)
            .map(|(_, rect)| *rect))
    }

    fn read_plane(&self, t: u64, z: u64, _scene: u32, roi: SceneRect) -> Result<Vec<u16>> {
        if t >= self.times || z >= self.depths {
            return Err(TileProcessorError::source_read(format!(
                "plane (t={}, z={}) outside {}x{}",
                t, z, self.times, self.depths
            )));
        }
        self.planes_read.fetch_add(1, Ordering::SeqCst);

        let mut plane = Vec::with_capacity((self.channels * roi.width * roi.height) as usize);
        for c in 0..self.channels {
            for y in roi.y..roi.y + roi.height as i64 {
                for x in roi.x..roi.x + roi.width as i64 {
                    plane.push(voxel_value(t, c, z, y, x));
                }
            }
        }
        Ok(plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_value_nonzero() {
        for t in 0..3 {
            for y in -4..8 {
                for x in 0..8 {
                    assert_ne!(voxel_value(t, 1, 2, y, x), 0);
                }
            }
        }
    }

    #[test]
    fn test_create_test_volume() {
        let volume = create_test_volume(Tczyx::new(2, 2, 1, 4, 4));
        assert_eq!(volume.data().len(), 64);
        assert_eq!(volume.get(Tczyx::new(1, 1, 0, 3, 2)), Some(voxel_value(1, 1, 0, 3, 2)));
    }

    #[test]
    fn test_in_memory_source_plane() {
        let source = InMemorySource::with_rect(Tczyx::new(1, 2, 1, 0, 0), SceneRect::new(10, -5, 4, 4));
        let plane = source.read_plane(0, 0, 0, SceneRect::new(11, -4, 2, 1)).unwrap();
        assert_eq!(
            plane,
            vec![
                voxel_value(0, 0, 0, -4, 11),
                voxel_value(0, 0, 0, -4, 12),
                voxel_value(0, 1, 0, -4, 11),
                voxel_value(0, 1, 0, -4, 12),
            ]
        );
        assert_eq!(source.planes_read(), 1);
        assert!(source.read_plane(1, 0, 0, SceneRect::new(10, -5, 1, 1)).is_err());
    }

    #[test]
    fn test_scene_lookup() {
        let source = InMemorySource::new(Tczyx::new(1, 1, 1, 8, 8)).with_scene(3, SceneRect::new(2, 2, 4, 4));
        assert_eq!(source.scene_rectangle(3).unwrap(), Some(SceneRect::new(2, 2, 4, 4)));
        assert_eq!(source.scene_rectangle(0).unwrap(), None);
    }
}
