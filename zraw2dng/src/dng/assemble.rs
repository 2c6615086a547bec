// SPDX-License-Identifier: LGPL-2.1

use log::debug;

use crate::{
  ConvertError, Result,
  cameras::CameraDefinition,
  convert::ConvertParams,
  decoder::FrameInfo,
  job::{RawCompression, RawScale},
  ljpeg92::{LjpegCompressor, Predictor},
  packed::pack_samples,
  tiff::{CompressionMethod, Orientation, Rational, ResolutionUnit},
};

use super::{CFA_PATTERN_RGGB, DNG_VERSION_V1_1, DNG_VERSION_V1_2, DngImage, DngMetadata, PixelPayload, as_shot_neutral, white_level};

/// Build the DNG tag set and pixel payload for a decoded frame
///
/// `pixels` must already be reduced to `scale`.
pub fn assemble(
  info: &FrameInfo,
  camera: &CameraDefinition,
  scale: RawScale,
  compression: RawCompression,
  pixels: &[u16],
  params: &ConvertParams,
) -> Result<DngImage> {
  let width = info.width / scale.divisor() as u32;
  let height = info.height / scale.divisor() as u32;
  if pixels.len() != width as usize * height as usize {
    return Err(ConvertError::Dimensions {
      width: width as usize,
      height: height as usize,
      reason: "pixel buffer does not match scaled dimensions",
    });
  }

  let white = white_level(info.bits_per_sample);
  if let Some(sample) = pixels.iter().find(|v| u32::from(**v) > white) {
    return Err(ConvertError::InvalidParameter(format!(
      "Sample value {} exceeds {} bit range",
      sample, info.bits_per_sample
    )));
  }

  let (method, payload) = match compression {
    RawCompression::None => (CompressionMethod::None, PixelPayload::Packed(pack_samples(pixels, width as usize, info.bits_per_sample))),
    RawCompression::LosslessJpeg => (CompressionMethod::ModernJPEG, PixelPayload::LosslessJpeg(encode_ljpeg(pixels, width, height, info, params)?)),
  };

  let neutral = as_shot_neutral(&info.awb_gains);
  if neutral.is_none() {
    debug!("Unusable AWB gains {:?}, AsShotNeutral omitted", info.awb_gains);
  }

  let metadata = DngMetadata {
    width,
    height,
    rows_per_strip: height,
    bits_per_sample: info.bits_per_sample,
    samples_per_pixel: 1,
    compression: method,
    cfa_repeat_dim: [2, 2],
    cfa_pattern: CFA_PATTERN_RGGB,
    as_shot_neutral: neutral,
    analog_balance: [1.0, 1.0, 1.0],
    black_level_repeat_dim: [2, 2],
    black_levels: info.black_levels,
    white_level: white,
    color_matrix1: camera.calibration1.matrix,
    calibration_illuminant1: camera.calibration1.illuminant.into(),
    color_matrix2: camera.calibration2.matrix,
    calibration_illuminant2: camera.calibration2.illuminant.into(),
    orientation: Orientation::TopLeft,
    x_resolution: Rational::new(300, 1),
    y_resolution: Rational::new(300, 1),
    resolution_unit: ResolutionUnit::None,
    dng_version: DNG_VERSION_V1_2,
    dng_backward_version: DNG_VERSION_V1_1,
    image_description: params.image_description.clone(),
    software: params.software.clone(),
    make: camera.make.clone(),
    model: camera.model.clone(),
    unique_camera_model: camera.unique_model.clone(),
  };

  Ok(DngImage { metadata, payload })
}

fn encode_ljpeg(pixels: &[u16], width: u32, height: u32, info: &FrameInfo, params: &ConvertParams) -> Result<Vec<u8>> {
  if info.bits_per_sample < 2 {
    return Err(ConvertError::InvalidParameter(format!(
      "Lossless JPEG needs at least 2 bits per sample, got {}",
      info.bits_per_sample
    )));
  }
  let predictor = Predictor::try_from(params.predictor).map_err(|_| ConvertError::InvalidParameter(format!("Invalid LJPEG predictor: {}", params.predictor)))?;
  // Two components keep the predictor on same-colored sites
  let (ljpeg_width, components) = if width % 2 == 0 { (width / 2, 2) } else { (width, 1) };
  let encoder = LjpegCompressor::new(
    pixels,
    ljpeg_width as usize,
    height as usize,
    components,
    info.bits_per_sample as u8,
    predictor,
  )?;
  let jpeg = encoder.encode()?;
  debug!("LJPEG stream: {} bytes for {}x{} samples", jpeg.len(), width, height);
  Ok(jpeg)
}
