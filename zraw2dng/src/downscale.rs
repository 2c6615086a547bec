// SPDX-License-Identifier: LGPL-2.1

//! Resolution reduction for Bayer mosaics
//!
//! Each 4x4 block of photosites collapses into one 2x2 CFA unit,
//! every output sample is the mean of the four same-colored inputs
//! in the block, so the color pattern stays aligned.

use log::debug;
use rayon::prelude::*;

use crate::{ConvertError, Result, job::RawScale};

/// Halve width and height of a CFA mosaic
pub fn downscale_cfa_half(cfa: &[u16], width: usize, height: usize) -> Result<Vec<u16>> {
  if width == 0 || height == 0 {
    return Err(ConvertError::Dimensions {
      width,
      height,
      reason: "image is empty",
    });
  }
  if width % 4 != 0 || height % 4 != 0 {
    return Err(ConvertError::Dimensions {
      width,
      height,
      reason: "width and height must be multiples of 4",
    });
  }
  if cfa.len() != width * height {
    return Err(ConvertError::Dimensions {
      width,
      height,
      reason: "buffer length does not match dimensions",
    });
  }

  let out_width = width / 2;
  let mut out = vec![0_u16; out_width * (height / 2)];

  // One chunk is a pair of output rows, produced from four input rows
  out.par_chunks_exact_mut(out_width * 2).enumerate().for_each(|(block_row, rows)| {
    let y = block_row * 4;
    let (top, bottom) = rows.split_at_mut(out_width);
    for (dy, out_row) in [top, bottom].into_iter().enumerate() {
      let row_a = &cfa[(y + dy) * width..(y + dy + 1) * width];
      let row_b = &cfa[(y + dy + 2) * width..(y + dy + 3) * width];
      for x in (0..width).step_by(4) {
        for dx in 0..2 {
          let sum = row_a[x + dx] as u32 + row_a[x + dx + 2] as u32 + row_b[x + dx] as u32 + row_b[x + dx + 2] as u32;
          out_row[x / 2 + dx] = (sum / 4) as u16;
        }
      }
    }
  });

  Ok(out)
}

/// Apply the reduction for a scale mode, returns the mosaic and its new dimensions
pub fn downscale_cfa(cfa: Vec<u16>, width: usize, height: usize, scale: RawScale) -> Result<(Vec<u16>, usize, usize)> {
  let (mut cfa, mut width, mut height) = (cfa, width, height);
  for _ in 0..scale.halvings() {
    cfa = downscale_cfa_half(&cfa, width, height)?;
    width /= 2;
    height /= 2;
  }
  if scale != RawScale::Full {
    debug!("Downscaled CFA to {}x{}", width, height);
  }
  Ok((cfa, width, height))
}
