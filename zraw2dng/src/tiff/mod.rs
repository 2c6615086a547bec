// SPDX-License-Identifier: LGPL-2.1

//! Little-endian TIFF building blocks used by the DNG writer

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use thiserror::Error;

pub mod writer;

pub use writer::{DirectoryWriter, TiffWriter};

pub(crate) const TIFF_MAGIC: u16 = 42;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SRATIONAL: u16 = 10;

/// Error variants for the TIFF writer
#[derive(Debug, Error)]
pub enum TiffError {
  /// Offsets or counts exceed the 32 bit TIFF address space
  #[error("Overflow error: {}", _0)]
  Overflow(String),

  #[error("General error: {}", _0)]
  General(String),

  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TiffError>;

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMethod {
  None = 1,
  // "Extended JPEG" or "new JPEG" style
  ModernJPEG = 7,
}

impl From<CompressionMethod> for Value {
  fn from(value: CompressionMethod) -> Self {
    Value::Short(vec![value as u16])
  }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhotometricInterpretation {
  // Defined by DNG
  CFA = 32803,
}

impl From<PhotometricInterpretation> for Value {
  fn from(value: PhotometricInterpretation) -> Self {
    Value::Short(vec![value as u16])
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanarConfiguration {
  Chunky = 1,
}

impl From<PlanarConfiguration> for Value {
  fn from(value: PlanarConfiguration) -> Self {
    Value::Short(vec![value as u16])
  }
}

/// Type to represent resolution units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionUnit {
  None = 1,
}

impl From<ResolutionUnit> for Value {
  fn from(value: ResolutionUnit) -> Self {
    Value::Short(vec![value as u16])
  }
}

/// Orientation of the stored image, as defined by TIFF/EP
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
  TopLeft = 1,
  TopRight = 2,
  BottomRight = 3,
  BottomLeft = 4,
  LeftTop = 5,
  RightTop = 6,
  RightBottom = 7,
  LeftBottom = 8,
}

impl From<Orientation> for Value {
  fn from(value: Orientation) -> Self {
    Value::Short(vec![value as u16])
  }
}

/// Type to represent tiff values of type `RATIONAL`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rational {
  pub n: u32,
  pub d: u32,
}

impl Rational {
  pub fn new(n: u32, d: u32) -> Self {
    Self { n, d }
  }

  /// Approximate a float by a fixed denominator. Negative input saturates to zero.
  pub fn new_f64(v: f64, d: u32) -> Self {
    Self {
      n: (v * d as f64).round() as u32,
      d,
    }
  }
}

impl From<Rational> for f64 {
  fn from(v: Rational) -> Self {
    v.n as f64 / v.d as f64
  }
}

/// Type to represent tiff values of type `SRATIONAL`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SRational {
  pub n: i32,
  pub d: i32,
}

impl SRational {
  pub fn new(n: i32, d: i32) -> Self {
    Self { n, d }
  }

  pub fn new_f64(v: f64, d: i32) -> Self {
    Self {
      n: (v * d as f64).round() as i32,
      d,
    }
  }
}

impl From<SRational> for f64 {
  fn from(v: SRational) -> Self {
    v.n as f64 / v.d as f64
  }
}

/// Typed payload of a single IFD entry
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// 8-bit unsigned integer
  Byte(Vec<u8>),
  /// 7-bit ASCII text, the trailing NUL is added on write
  Ascii(String),
  /// 16-bit unsigned integer
  Short(Vec<u16>),
  /// 32-bit unsigned integer
  Long(Vec<u32>),
  /// Fraction stored as two 32-bit unsigned integers
  Rational(Vec<Rational>),
  /// 8-bit byte that may contain anything, depending on the field
  Undefined(Vec<u8>),
  /// Fraction stored as two 32-bit signed integers
  SRational(Vec<SRational>),
}

impl Value {
  pub fn value_type(&self) -> u16 {
    match self {
      Self::Byte(_) => TYPE_BYTE,
      Self::Ascii(_) => TYPE_ASCII,
      Self::Short(_) => TYPE_SHORT,
      Self::Long(_) => TYPE_LONG,
      Self::Rational(_) => TYPE_RATIONAL,
      Self::Undefined(_) => TYPE_UNDEFINED,
      Self::SRational(_) => TYPE_SRATIONAL,
    }
  }

  pub fn count(&self) -> usize {
    match self {
      Self::Byte(v) => v.len(),
      Self::Ascii(v) => v.len() + 1,
      Self::Short(v) => v.len(),
      Self::Long(v) => v.len(),
      Self::Rational(v) => v.len(),
      Self::Undefined(v) => v.len(),
      Self::SRational(v) => v.len(),
    }
  }

  pub fn byte_size(&self) -> usize {
    match self {
      Self::Byte(v) | Self::Undefined(v) => v.len(),
      Self::Ascii(v) => v.len() + 1,
      Self::Short(v) => v.len() * std::mem::size_of::<u16>(),
      Self::Long(v) => v.len() * std::mem::size_of::<u32>(),
      Self::Rational(v) => v.len() * 8,
      Self::SRational(v) => v.len() * 8,
    }
  }

  /// Serialize the value in little-endian byte order
  pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
    match self {
      Self::Byte(v) | Self::Undefined(v) => w.write_all(v)?,
      Self::Ascii(v) => {
        w.write_all(v.as_bytes())?;
        w.write_u8(0)?;
      }
      Self::Short(v) => {
        for x in v {
          w.write_u16::<LittleEndian>(*x)?;
        }
      }
      Self::Long(v) => {
        for x in v {
          w.write_u32::<LittleEndian>(*x)?;
        }
      }
      Self::Rational(v) => {
        for x in v {
          w.write_u32::<LittleEndian>(x.n)?;
          w.write_u32::<LittleEndian>(x.d)?;
        }
      }
      Self::SRational(v) => {
        for x in v {
          w.write_i32::<LittleEndian>(x.n)?;
          w.write_i32::<LittleEndian>(x.d)?;
        }
      }
    }
    Ok(())
  }

  /// Value bytes for the 4 byte offset field of an IFD entry
  pub fn as_embedded(&self) -> Result<[u8; 4]> {
    if self.count() == 0 {
      return Err(TiffError::General("Entry has count == 0".into()));
    }
    if self.byte_size() > 4 {
      return Err(TiffError::Overflow(format!("Value of {} bytes can't be embedded", self.byte_size())));
    }
    let mut buf = Vec::with_capacity(4);
    self.write(&mut buf)?;
    buf.resize(4, 0);
    Ok([buf[0], buf[1], buf[2], buf[3]])
  }
}

impl From<u16> for Value {
  fn from(value: u16) -> Self {
    Value::Short(vec![value])
  }
}

impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::Long(vec![value])
  }
}

impl<const N: usize> From<[u8; N]> for Value {
  fn from(value: [u8; N]) -> Self {
    Value::Byte(value.to_vec())
  }
}

impl<const N: usize> From<[u16; N]> for Value {
  fn from(value: [u16; N]) -> Self {
    Value::Short(value.to_vec())
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Ascii(value.to_string())
  }
}

impl From<&String> for Value {
  fn from(value: &String) -> Self {
    Value::Ascii(value.clone())
  }
}

impl From<Rational> for Value {
  fn from(value: Rational) -> Self {
    Value::Rational(vec![value])
  }
}

impl From<&[Rational]> for Value {
  fn from(value: &[Rational]) -> Self {
    Value::Rational(value.to_vec())
  }
}

impl From<&[SRational]> for Value {
  fn from(value: &[SRational]) -> Self {
    Value::SRational(value.to_vec())
  }
}
