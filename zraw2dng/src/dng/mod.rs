// SPDX-License-Identifier: LGPL-2.1

//! DNG container model and the writer capability

use std::path::Path;

use crate::{
  decoder::AwbGains,
  tiff::{CompressionMethod, Orientation, Rational, ResolutionUnit, TiffError},
};

pub mod assemble;
pub mod writer;

pub use assemble::assemble;
pub use writer::{DngFileSink, write_dng};

pub const DNG_VERSION_V1_1: [u8; 4] = [1, 1, 0, 0];
pub const DNG_VERSION_V1_2: [u8; 4] = [1, 2, 0, 0];

/// R G / G B
pub const CFA_PATTERN_RGGB: [u8; 4] = [0, 1, 1, 2];

/// Errors of the DNG writer
pub type DngError = TiffError;

/// Complete tag set of a single-IFD CFA DNG
#[derive(Clone, Debug, PartialEq)]
pub struct DngMetadata {
  pub width: u32,
  pub height: u32,
  pub rows_per_strip: u32,
  pub bits_per_sample: u16,
  pub samples_per_pixel: u16,
  pub compression: CompressionMethod,
  pub cfa_repeat_dim: [u16; 2],
  pub cfa_pattern: [u8; 4],
  /// `None` when the white balance gains are unusable
  pub as_shot_neutral: Option<[f64; 3]>,
  pub analog_balance: [f64; 3],
  pub black_level_repeat_dim: [u16; 2],
  pub black_levels: [u16; 4],
  pub white_level: u32,
  pub color_matrix1: [f64; 9],
  pub calibration_illuminant1: u16,
  pub color_matrix2: [f64; 9],
  pub calibration_illuminant2: u16,
  pub orientation: Orientation,
  pub x_resolution: Rational,
  pub y_resolution: Rational,
  pub resolution_unit: ResolutionUnit,
  pub dng_version: [u8; 4],
  pub dng_backward_version: [u8; 4],
  pub image_description: String,
  pub software: String,
  pub make: String,
  pub model: String,
  pub unique_camera_model: String,
}

/// Pixel data of the single strip
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelPayload {
  /// Uncompressed samples at native bit depth
  Packed(Vec<u8>),
  /// Complete lossless JPEG stream
  LosslessJpeg(Vec<u8>),
}

impl PixelPayload {
  pub fn bytes(&self) -> &[u8] {
    match self {
      Self::Packed(data) | Self::LosslessJpeg(data) => data,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DngImage {
  pub metadata: DngMetadata,
  pub payload: PixelPayload,
}

/// Writer capability, stores an assembled image at `path`
pub trait DngSink: Send + Sync {
  fn write_dng(&self, image: &DngImage, path: &Path) -> std::result::Result<(), DngError>;
}

/// AsShotNeutral from camera white balance gains: (g/r, 1, g/b)
pub fn as_shot_neutral(gains: &AwbGains) -> Option<[f64; 3]> {
  let neutral = [gains.g / gains.r, 1.0, gains.g / gains.b];
  if neutral.iter().all(|v| v.is_finite() && *v > 0.0) {
    Some(neutral)
  } else {
    None
  }
}

/// Largest sample value for a bit depth
pub fn white_level(bits_per_sample: u16) -> u32 {
  ((1_u64 << bits_per_sample) - 1) as u32
}
