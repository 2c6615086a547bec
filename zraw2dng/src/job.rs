// SPDX-License-Identifier: LGPL-2.1

use std::{fmt, path::PathBuf};

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{ConvertError, Result};

/// Camera variants that record ZRAW
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CameraModel {
  #[default]
  Unknown,
  E2,
  E2C,
  E2G,
  #[serde(rename = "E2-M4")]
  E2M4,
  #[serde(rename = "E2-S6")]
  E2S6,
  #[serde(rename = "E2-F6")]
  E2F6,
  #[serde(rename = "E2-F8")]
  E2F8,
  #[serde(rename = "E2-S6G")]
  E2S6G,
}

impl CameraModel {
  pub const ALL: [CameraModel; 9] = [
    Self::Unknown,
    Self::E2,
    Self::E2C,
    Self::E2G,
    Self::E2M4,
    Self::E2S6,
    Self::E2F6,
    Self::E2F8,
    Self::E2S6G,
  ];
}

/// Selector codes as used by UI layers, unknown codes fall back to `Unknown`
impl From<u8> for CameraModel {
  fn from(code: u8) -> Self {
    Self::ALL.get(code as usize).copied().unwrap_or(Self::Unknown)
  }
}

impl fmt::Display for CameraModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Unknown => "Unknown",
      Self::E2 => "E2",
      Self::E2C => "E2C",
      Self::E2G => "E2G",
      Self::E2M4 => "E2-M4",
      Self::E2S6 => "E2-S6",
      Self::E2F6 => "E2-F6",
      Self::E2F8 => "E2-F8",
      Self::E2S6G => "E2-S6G",
    };
    f.write_str(name)
  }
}

/// Output resolution relative to the sensor readout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum RawScale {
  #[default]
  Full = 0,
  Half = 1,
  Quarter = 2,
}

impl RawScale {
  pub fn from_code(code: u8) -> Result<Self> {
    Self::try_from(code).map_err(|_| ConvertError::InvalidParameter(format!("Unknown RAW scale mode: {}", code)))
  }

  /// How often the mosaic is halved
  pub fn halvings(self) -> u32 {
    self as u32
  }

  pub fn divisor(self) -> usize {
    1 << self.halvings()
  }
}

/// Pixel payload encoding of the written DNG
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum RawCompression {
  #[default]
  None = 0,
  LosslessJpeg = 1,
}

impl RawCompression {
  pub fn from_code(code: u8) -> Result<Self> {
    Self::try_from(code).map_err(|_| ConvertError::InvalidParameter(format!("Unknown RAW compression mode: {}", code)))
  }
}

/// A single frame conversion request
///
/// Immutable once built. The worker takes ownership on acceptance
/// and hands it back when the slot is occupied.
#[derive(Clone)]
pub struct ConversionJob {
  camera: CameraModel,
  compression: RawCompression,
  scale: RawScale,
  output: PathBuf,
  frame: Vec<u8>,
}

impl ConversionJob {
  pub fn new(camera: CameraModel, compression: RawCompression, scale: RawScale, output: impl Into<PathBuf>, frame: Vec<u8>) -> Self {
    Self {
      camera,
      compression,
      scale,
      output: output.into(),
      frame,
    }
  }

  pub fn camera(&self) -> CameraModel {
    self.camera
  }

  pub fn compression(&self) -> RawCompression {
    self.compression
  }

  pub fn scale(&self) -> RawScale {
    self.scale
  }

  pub fn output(&self) -> &PathBuf {
    &self.output
  }

  /// Compressed ZRAW frame
  pub fn frame(&self) -> &[u8] {
    &self.frame
  }
}

impl fmt::Debug for ConversionJob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConversionJob")
      .field("camera", &self.camera)
      .field("compression", &self.compression)
      .field("scale", &self.scale)
      .field("output", &self.output)
      .field("frame_len", &self.frame.len())
      .finish()
  }
}
