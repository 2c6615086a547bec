// SPDX-License-Identifier: LGPL-2.1

//! Single frame conversion pipeline: decode, downscale, assemble, write

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
  Result, cameras,
  console::DiagnosticSink,
  decoder::{ZrawDecoder, decode_frame},
  dng::{DngSink, assemble},
  downscale::downscale_cfa,
  envparams,
  job::ConversionJob,
};

/// Settings shared by all jobs of a worker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertParams {
  /// Name of the background thread
  pub thread_name: String,
  /// ImageDescription tag
  pub image_description: String,
  /// Software tag
  pub software: String,
  /// Lossless JPEG predictor, 1 to 7
  pub predictor: u8,
}

impl Default for ConvertParams {
  fn default() -> Self {
    Self {
      thread_name: String::from("zraw2dng-worker"),
      image_description: String::from("ZRAW -> DNG converter generated image."),
      software: format!("zraw2dng {}", env!("CARGO_PKG_VERSION")),
      predictor: envparams::zraw2dng_ljpeg_predictor().unwrap_or(1),
    }
  }
}

/// Convert one compressed frame into a DNG file
///
/// Failures are reported as lines on `console` in addition to the
/// returned error.
pub fn convert_frame(
  decoder: &dyn ZrawDecoder,
  writer: &dyn DngSink,
  console: &dyn DiagnosticSink,
  job: &ConversionJob,
  params: &ConvertParams,
) -> Result<()> {
  let frame = decode_frame(decoder, console, job.frame())?;
  let info = frame.info;

  let (pixels, _, _) = downscale_cfa(frame.cfa, info.width as usize, info.height as usize, job.scale()).inspect_err(|err| {
    console.print(&format!("Downscaling failed: {}", err));
  })?;

  let camera = cameras::lookup(job.camera());
  let image = assemble(&info, camera, job.scale(), job.compression(), &pixels, params).inspect_err(|err| {
    console.print(&format!("Building DNG failed: {}", err));
  })?;

  debug!("Writing DNG to {}", job.output().display());
  writer.write_dng(&image, job.output()).map_err(|err| {
    error!("Failed to write {}: {}", job.output().display(), err);
    console.print(&format!("Writing DNG file failed: {}", err));
    err
  })?;
  Ok(())
}
