// SPDX-License-Identifier: LGPL-2.1

//! Camera table with display names and color calibration
//!
//! The table is embedded from `data/cameras.toml` and checked for
//! completeness against [`CameraModel::ALL`] on first use.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::job::CameraModel;

pub static CAMERAS_TOML: &str = include_str!("../data/cameras.toml");

const FAIL: &str = "Invalid camera database";

lazy_static! {
  static ref CAMERA_DB: CameraDatabase = CameraDatabase::parse(CAMERAS_TOML).unwrap_or_else(|err| panic!("{}: {}", FAIL, err));
}

#[derive(Debug, Error)]
pub enum CameraDbError {
  #[error("Error parsing cameras.toml: {}", _0)]
  Parse(#[from] toml::de::Error),

  #[error("Camera {} is defined twice", _0)]
  Duplicate(CameraModel),

  #[error("Camera {} references unknown calibration '{}'", camera, calibration)]
  UnknownCalibration { camera: CameraModel, calibration: String },

  #[error("Camera {} is missing", _0)]
  Missing(CameraModel),
}

/// Calibration illuminants as defined by EXIF LightSource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Illuminant {
  #[serde(rename = "A")]
  StandardLightA = 17,
  D65 = 21,
}

impl From<Illuminant> for u16 {
  fn from(value: Illuminant) -> Self {
    value as u16
  }
}

/// Color matrix (XYZ to camera, row major) with its illuminant
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
  pub illuminant: Illuminant,
  pub matrix: [f64; 9],
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraDefinition {
  pub variant: CameraModel,
  pub make: String,
  pub model: String,
  pub unique_model: String,
  pub calibration1: Calibration,
  pub calibration2: Calibration,
}

#[derive(Deserialize)]
struct CalibrationSet {
  illuminant1: Illuminant,
  color_matrix1: [f64; 9],
  illuminant2: Illuminant,
  color_matrix2: [f64; 9],
}

#[derive(Deserialize)]
struct CameraEntry {
  variant: CameraModel,
  make: String,
  model: String,
  unique_model: String,
  calibration: String,
}

#[derive(Deserialize)]
struct CameraFile {
  calibrations: HashMap<String, CalibrationSet>,
  cameras: Vec<CameraEntry>,
}

#[derive(Debug)]
pub struct CameraDatabase {
  cameras: HashMap<CameraModel, CameraDefinition>,
}

impl CameraDatabase {
  /// Parse and verify a camera table, every variant must be present exactly once
  pub fn parse(toml: &str) -> std::result::Result<Self, CameraDbError> {
    let file: CameraFile = toml::from_str(toml)?;
    let mut cameras = HashMap::new();
    for entry in file.cameras {
      let set = file.calibrations.get(&entry.calibration).ok_or_else(|| CameraDbError::UnknownCalibration {
        camera: entry.variant,
        calibration: entry.calibration.clone(),
      })?;
      let definition = CameraDefinition {
        variant: entry.variant,
        make: entry.make,
        model: entry.model,
        unique_model: entry.unique_model,
        calibration1: Calibration {
          illuminant: set.illuminant1,
          matrix: set.color_matrix1,
        },
        calibration2: Calibration {
          illuminant: set.illuminant2,
          matrix: set.color_matrix2,
        },
      };
      if cameras.insert(entry.variant, definition).is_some() {
        return Err(CameraDbError::Duplicate(entry.variant));
      }
    }
    if let Some(missing) = CameraModel::ALL.iter().find(|model| !cameras.contains_key(*model)) {
      return Err(CameraDbError::Missing(*missing));
    }
    debug!("Camera database loaded with {} entries", cameras.len());
    Ok(Self { cameras })
  }

  pub fn get(&self, model: CameraModel) -> Option<&CameraDefinition> {
    self.cameras.get(&model)
  }

}

/// Camera definition for a variant
pub fn lookup(model: CameraModel) -> &'static CameraDefinition {
  // Completeness is verified when the table is loaded
  match CAMERA_DB.get(model) {
    Some(definition) => definition,
    None => panic!("{}: no entry for {}", FAIL, model),
  }
}

pub(crate) fn force_initialization() {
  lazy_static::initialize(&CAMERA_DB);
}
