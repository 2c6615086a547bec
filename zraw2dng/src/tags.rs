// SPDX-License-Identifier: LGPL-2.1

/// Anything that can be stored as a 16 bit TIFF tag id
pub trait TiffTag: Into<u16> + Copy {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum TiffCommonTag {
  NewSubFileType = 0x00FE,
  ImageWidth = 0x0100,
  ImageLength = 0x0101,
  BitsPerSample = 0x0102,
  Compression = 0x0103,
  PhotometricInt = 0x0106,
  ImageDescription = 0x010E,
  Make = 0x010F,
  Model = 0x0110,
  StripOffsets = 0x0111,
  Orientation = 0x0112,
  SamplesPerPixel = 0x0115,
  RowsPerStrip = 0x0116,
  StripByteCounts = 0x0117,
  XResolution = 0x011A,
  YResolution = 0x011B,
  PlanarConfiguration = 0x011C,
  ResolutionUnit = 0x0128,
  Software = 0x0131,
  CFARepeatPatternDim = 0x828D,
  CFAPattern = 0x828E,
}

impl From<TiffCommonTag> for u16 {
  fn from(tag: TiffCommonTag) -> Self {
    tag as u16
  }
}

impl TiffTag for TiffCommonTag {}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum DngTag {
  DNGVersion = 0xC612,
  DNGBackwardVersion = 0xC613,
  UniqueCameraModel = 0xC614,
  CFAPlaneColor = 0xC616,
  CFALayout = 0xC617,
  BlackLevelRepeatDim = 0xC619,
  BlackLevel = 0xC61A,
  WhiteLevel = 0xC61D,
  ColorMatrix1 = 0xC621,
  ColorMatrix2 = 0xC622,
  AnalogBalance = 0xC627,
  AsShotNeutral = 0xC628,
  CalibrationIlluminant1 = 0xC65A,
  CalibrationIlluminant2 = 0xC65B,
}

impl From<DngTag> for u16 {
  fn from(tag: DngTag) -> Self {
    tag as u16
  }
}

impl TiffTag for DngTag {}
