// SPDX-License-Identifier: LGPL-2.1

mod common;

use std::{collections::BTreeMap, sync::Arc};

use common::{CollectingConsole, StubDecoder, init_test_logger};
use zraw2dng::{
  CameraModel, ConversionJob, ConversionWorker, ConvertParams, DngError, DngFileSink, DngSink, RawCompression, RawScale, cameras,
  decoder::{AwbGains, FrameInfo},
  dng::assemble,
};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// IFD0 entries: tag -> (type, count, value/offset field)
fn read_ifd0(buf: &[u8]) -> BTreeMap<u16, (u16, u32, [u8; 4])> {
  let u16_at = |pos: usize| u16::from_le_bytes([buf[pos], buf[pos + 1]]);
  let u32_at = |pos: usize| u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
  assert_eq!(&buf[..4], b"II\x2a\x00");
  let ifd = u32_at(4) as usize;
  assert_eq!(ifd % 4, 0);
  let count = u16_at(ifd) as usize;
  let mut entries = BTreeMap::new();
  let mut last_tag = 0;
  for i in 0..count {
    let pos = ifd + 2 + i * 12;
    let tag = u16_at(pos);
    assert!(tag > last_tag, "tags must be sorted");
    last_tag = tag;
    entries.insert(tag, (u16_at(pos + 2), u32_at(pos + 4), [buf[pos + 8], buf[pos + 9], buf[pos + 10], buf[pos + 11]]));
  }
  assert_eq!(u32_at(ifd + 2 + count * 12), 0, "single IFD");
  entries
}

fn field_u32(field: [u8; 4]) -> u32 {
  u32::from_le_bytes(field)
}

fn field_u16(field: [u8; 4]) -> u16 {
  u16::from_le_bytes([field[0], field[1]])
}

#[test]
fn write_uncompressed_dng_file() -> TestResult {
  init_test_logger();
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("frame.dng");

  let info = FrameInfo {
    width: 8,
    height: 4,
    bits_per_sample: 16,
    awb_gains: AwbGains { r: 2.0, g: 1.0, b: 0.5 },
    black_levels: [256, 257, 258, 259],
  };
  let pixels: Vec<u16> = (0..32).collect();
  let image = assemble(
    &info,
    cameras::lookup(CameraModel::E2F6),
    RawScale::Full,
    RawCompression::None,
    &pixels,
    &ConvertParams::default(),
  )?;
  DngFileSink.write_dng(&image, &path)?;

  let buf = std::fs::read(&path)?;
  let ifd = read_ifd0(&buf);

  assert_eq!(field_u32(ifd[&0x0100].2), 8); // ImageWidth
  assert_eq!(field_u32(ifd[&0x0101].2), 4); // ImageLength
  assert_eq!(field_u16(ifd[&0x0102].2), 16); // BitsPerSample
  assert_eq!(field_u16(ifd[&0x0103].2), 1); // Compression
  assert_eq!(field_u16(ifd[&0x0106].2), 32803); // CFA
  assert_eq!(field_u16(ifd[&0x0112].2), 1); // Orientation
  assert_eq!(field_u16(ifd[&0x0128].2), 1); // ResolutionUnit
  assert_eq!(ifd[&0x828E].2, [0, 1, 1, 2]); // CFAPattern
  assert_eq!(ifd[&0xC612].2, [1, 2, 0, 0]); // DNGVersion
  assert_eq!(field_u32(ifd[&0xC61D].2), 65535); // WhiteLevel
  assert_eq!(field_u16(ifd[&0xC65A].2), 17);
  assert_eq!(field_u16(ifd[&0xC65B].2), 21);

  // Strip holds 16 bit little-endian samples
  let offset = field_u32(ifd[&0x0111].2) as usize;
  let len = field_u32(ifd[&0x0117].2) as usize;
  assert_eq!(len, 64);
  let expected: Vec<u8> = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
  assert_eq!(&buf[offset..offset + len], expected.as_slice());

  // UniqueCameraModel is stored out of line
  let (kind, count, field) = ifd[&0xC614];
  assert_eq!(kind, 2);
  let start = field_u32(field) as usize;
  assert_eq!(&buf[start..start + count as usize], b"Z CAM E2-F6\0");

  // ColorMatrix1[0] = 0.9784
  let (kind, count, field) = ifd[&0xC621];
  assert_eq!((kind, count), (10, 9));
  let start = field_u32(field) as usize;
  let n = i32::from_le_bytes([buf[start], buf[start + 1], buf[start + 2], buf[start + 3]]);
  let d = i32::from_le_bytes([buf[start + 4], buf[start + 5], buf[start + 6], buf[start + 7]]);
  assert_eq!((n, d), (9784, 10000));

  // AsShotNeutral[2] = g/b = 2.0
  let (kind, count, field) = ifd[&0xC628];
  assert_eq!((kind, count), (5, 3));
  let start = field_u32(field) as usize + 16;
  let n = u32::from_le_bytes([buf[start], buf[start + 1], buf[start + 2], buf[start + 3]]);
  let d = u32::from_le_bytes([buf[start + 4], buf[start + 5], buf[start + 6], buf[start + 7]]);
  assert_eq!(n as f64 / d as f64, 2.0);
  Ok(())
}

#[test]
fn missing_directory_is_an_io_error() -> TestResult {
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("missing").join("frame.dng");
  let info = FrameInfo {
    width: 4,
    height: 4,
    bits_per_sample: 12,
    ..Default::default()
  };
  let image = assemble(
    &info,
    cameras::lookup(CameraModel::E2),
    RawScale::Full,
    RawCompression::None,
    &[0; 16],
    &ConvertParams::default(),
  )?;
  assert!(matches!(DngFileSink.write_dng(&image, &path), Err(DngError::Io(_))));
  assert!(!path.exists());
  Ok(())
}

#[test]
fn unwritable_target_is_left_alone() -> TestResult {
  init_test_logger();
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("keep.dng");
  std::fs::write(&path, b"existing")?;
  let mut perms = std::fs::metadata(&path)?.permissions();
  perms.set_readonly(true);
  std::fs::set_permissions(&path, perms)?;
  if std::fs::OpenOptions::new().write(true).open(&path).is_ok() {
    // Privileged users bypass file permissions
    return Ok(());
  }

  let info = FrameInfo {
    width: 4,
    height: 4,
    bits_per_sample: 12,
    ..Default::default()
  };
  let image = assemble(
    &info,
    cameras::lookup(CameraModel::E2),
    RawScale::Full,
    RawCompression::None,
    &[0; 16],
    &ConvertParams::default(),
  )?;
  assert!(matches!(DngFileSink.write_dng(&image, &path), Err(DngError::Io(_))));
  assert_eq!(std::fs::read(&path)?, b"existing");
  Ok(())
}

#[test]
fn directory_target_is_left_alone() -> TestResult {
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("frame.dng");
  std::fs::create_dir(&path)?;
  std::fs::write(path.join("inner"), b"data")?;
  let info = FrameInfo {
    width: 4,
    height: 4,
    bits_per_sample: 12,
    ..Default::default()
  };
  let image = assemble(
    &info,
    cameras::lookup(CameraModel::E2),
    RawScale::Full,
    RawCompression::None,
    &[0; 16],
    &ConvertParams::default(),
  )?;
  assert!(matches!(DngFileSink.write_dng(&image, &path), Err(DngError::Io(_))));
  assert!(path.join("inner").exists());
  Ok(())
}

#[test]
fn worker_writes_lossless_jpeg_dng() -> TestResult {
  init_test_logger();
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("ljpeg.dng");
  let worker = ConversionWorker::new(Arc::new(StubDecoder::uniform(16, 8, 12, 300)), Arc::new(DngFileSink), ConvertParams::default())?;
  let console = Arc::new(CollectingConsole::default());

  let job = ConversionJob::new(CameraModel::E2S6, RawCompression::LosslessJpeg, RawScale::Half, path.clone(), vec![1, 2, 3]);
  let outcome = worker.try_submit(console, job)?.wait();
  assert!(outcome.is_ok(), "{}", outcome);

  let buf = std::fs::read(&path)?;
  let ifd = read_ifd0(&buf);
  assert_eq!(field_u32(ifd[&0x0100].2), 8);
  assert_eq!(field_u32(ifd[&0x0101].2), 4);
  assert_eq!(field_u16(ifd[&0x0103].2), 7);
  let offset = field_u32(ifd[&0x0111].2) as usize;
  let len = field_u32(ifd[&0x0117].2) as usize;
  assert_eq!(&buf[offset..offset + 2], &[0xFF, 0xD8]);
  assert_eq!(&buf[offset + len - 2..offset + len], &[0xFF, 0xD9]);
  Ok(())
}
