// SPDX-License-Identifier: LGPL-2.1

use std::{
  fs::File,
  io::{BufWriter, Seek, Write},
  path::Path,
};

use log::{debug, warn};

use crate::{
  tags::{DngTag, TiffCommonTag},
  tiff::{DirectoryWriter, PhotometricInterpretation, PlanarConfiguration, Rational, SRational, TiffWriter},
};

use super::{DngError, DngImage, DngSink};

/// Denominator for color matrices
const MATRIX_DENOMINATOR: i32 = 10_000;
/// Denominator for white balance values
const BALANCE_DENOMINATOR: u32 = 1_000_000;

/// Serialize a DNG into `out` and return the stream
///
/// The image is stored as a single strip in IFD0.
pub fn write_dng<W>(out: W, image: &DngImage) -> std::result::Result<W, DngError>
where
  W: Write + Seek,
{
  let md = &image.metadata;
  let mut tiff = TiffWriter::new(out)?;

  let data = image.payload.bytes();
  let strip_offset = tiff.write_data(data)?;
  let strip_bytes = u32::try_from(data.len()).map_err(|_| DngError::Overflow(format!("Strip of {} bytes is too large", data.len())))?;

  let mut ifd = DirectoryWriter::new();
  ifd.add_tag(TiffCommonTag::NewSubFileType, 0_u32);
  ifd.add_tag(TiffCommonTag::ImageWidth, md.width);
  ifd.add_tag(TiffCommonTag::ImageLength, md.height);
  ifd.add_tag(TiffCommonTag::BitsPerSample, md.bits_per_sample);
  ifd.add_tag(TiffCommonTag::Compression, md.compression);
  ifd.add_tag(TiffCommonTag::PhotometricInt, PhotometricInterpretation::CFA);
  ifd.add_tag(TiffCommonTag::ImageDescription, &md.image_description);
  ifd.add_tag(TiffCommonTag::Make, &md.make);
  ifd.add_tag(TiffCommonTag::Model, &md.model);
  ifd.add_tag(TiffCommonTag::StripOffsets, strip_offset);
  ifd.add_tag(TiffCommonTag::Orientation, md.orientation);
  ifd.add_tag(TiffCommonTag::SamplesPerPixel, md.samples_per_pixel);
  ifd.add_tag(TiffCommonTag::RowsPerStrip, md.rows_per_strip);
  ifd.add_tag(TiffCommonTag::StripByteCounts, strip_bytes);
  ifd.add_tag(TiffCommonTag::XResolution, md.x_resolution);
  ifd.add_tag(TiffCommonTag::YResolution, md.y_resolution);
  ifd.add_tag(TiffCommonTag::PlanarConfiguration, PlanarConfiguration::Chunky);
  ifd.add_tag(TiffCommonTag::ResolutionUnit, md.resolution_unit);
  ifd.add_tag(TiffCommonTag::Software, &md.software);
  ifd.add_tag(TiffCommonTag::CFARepeatPatternDim, md.cfa_repeat_dim);
  ifd.add_tag(TiffCommonTag::CFAPattern, md.cfa_pattern);

  ifd.add_tag(DngTag::DNGVersion, md.dng_version);
  ifd.add_tag(DngTag::DNGBackwardVersion, md.dng_backward_version);
  ifd.add_tag(DngTag::UniqueCameraModel, &md.unique_camera_model);
  ifd.add_tag(DngTag::CFAPlaneColor, [0_u8, 1, 2]);
  ifd.add_tag(DngTag::CFALayout, 1_u16);
  ifd.add_tag(DngTag::BlackLevelRepeatDim, md.black_level_repeat_dim);
  ifd.add_tag(DngTag::BlackLevel, md.black_levels);
  ifd.add_tag(DngTag::WhiteLevel, md.white_level);
  ifd.add_tag(DngTag::ColorMatrix1, &matrix(&md.color_matrix1)[..]);
  ifd.add_tag(DngTag::CalibrationIlluminant1, md.calibration_illuminant1);
  ifd.add_tag(DngTag::ColorMatrix2, &matrix(&md.color_matrix2)[..]);
  ifd.add_tag(DngTag::CalibrationIlluminant2, md.calibration_illuminant2);
  ifd.add_tag(DngTag::AnalogBalance, &balance(&md.analog_balance)[..]);
  if let Some(neutral) = &md.as_shot_neutral {
    ifd.add_tag(DngTag::AsShotNeutral, &balance(neutral)[..]);
  }

  debug!("Writing DNG IFD0 with {} entries", ifd.entry_count());
  tiff.build(ifd)
}

fn matrix(values: &[f64; 9]) -> Vec<SRational> {
  values.iter().map(|v| SRational::new_f64(*v, MATRIX_DENOMINATOR)).collect()
}

fn balance(values: &[f64; 3]) -> Vec<Rational> {
  values.iter().map(|v| Rational::new_f64(*v, BALANCE_DENOMINATOR)).collect()
}

/// Writes DNG files to disk
///
/// A partially written file is removed when writing fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct DngFileSink;

impl DngSink for DngFileSink {
  fn write_dng(&self, image: &DngImage, path: &Path) -> std::result::Result<(), DngError> {
    write_new_file(path, |file| {
      let stream = write_dng(BufWriter::new(file), image)?;
      let file = stream.into_inner().map_err(|err| err.into_error())?;
      file.sync_all()?;
      Ok(())
    })
  }
}

/// Create `path` and fill it with `fill`
///
/// The file is removed if `fill` fails. A failing create leaves
/// anything already at `path` alone.
fn write_new_file<F>(path: &Path, fill: F) -> std::result::Result<(), DngError>
where
  F: FnOnce(File) -> std::result::Result<(), DngError>,
{
  let file = File::create(path)?;
  let result = fill(file);
  if result.is_err() {
    if let Err(err) = std::fs::remove_file(path) {
      warn!("Failed to remove incomplete DNG {}: {}", path.display(), err);
    }
  }
  result
}
