//! Loading overlapped tiles from a source reader.

use tracing::trace;

use crate::block::TileBlock;
use crate::error::{Result, TileProcessorError};
use crate::plan::{ReadWindow, VolumeBounds};
use crate::source::{SceneRect, SourceReader};
use crate::types::{Tczyx, TILED_AXES};

/// Check that every axis of `window` lies inside the volume.
pub fn check_window(window: &ReadWindow, bounds: &VolumeBounds) -> Result<()> {
    let valid = bounds.valid_ranges();
    for (axis, (w, v)) in window.to_array().iter().zip(valid.iter()).enumerate() {
        if !w.is_within(v) {
            return Err(TileProcessorError::out_of_bounds(
                format!("{}={}", TILED_AXES[axis], w),
                format!("{}={}", TILED_AXES[axis], v),
            ));
        }
    }
    Ok(())
}

/// Read the raw TCZYX block for `window`.
///
/// The window is validated against `bounds` before any pixels are read; a
/// window outside the source is an error, never clipped.
pub fn load_tile(
    reader: &dyn SourceReader,
    bounds: &VolumeBounds,
    window: &ReadWindow,
    scene: u32,
) -> Result<TileBlock> {
    check_window(window, bounds)?;

    let channels = bounds.extent.c;
    let shape = window.block_shape(channels);
    let roi = SceneRect::new(window.x.start(), window.y.start(), shape.x, shape.y);
    let plane_len = (shape.y * shape.x) as usize;
    let mut block = TileBlock::zeros(shape);

    for (ti, t) in (window.t.start()..window.t.stop()).enumerate() {
        for (zi, z) in (window.z.start()..window.z.stop()).enumerate() {
            let plane = reader.read_plane(t as u64, z as u64, scene, roi)?;
            if plane.len() != plane_len * channels as usize {
                return Err(TileProcessorError::shape_mismatch(
                    format!("{} pixels for plane t={t} z={z}", plane_len * channels as usize),
                    plane.len(),
                ));
            }
            for c in 0..channels {
                let at = block.offset(Tczyx::new(ti as u64, c, zi as u64, 0, 0));
                let from = c as usize * plane_len;
                block.data_mut()[at..at + plane_len]
                    .copy_from_slice(&plane[from..from + plane_len]);
            }
            trace!(t, z, "Read plane");
        }
    }
    Ok(block)
}
