// SPDX-License-Identifier: LGPL-2.1

use std::{
  collections::BTreeMap,
  io::{Seek, SeekFrom, Write},
};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::tags::TiffTag;

use super::{Result, TIFF_MAGIC, TiffError, Value};

/// Writer for a single-image little-endian TIFF stream
///
/// Data blocks are appended as they arrive, the root IFD
/// is written last and the header is patched on `build()`.
pub struct TiffWriter<W>
where
  W: Write + Seek,
{
  ifd_location: u64,
  pub writer: W,
}

impl<W> TiffWriter<W>
where
  W: Write + Seek,
{
  pub fn new(writer: W) -> Result<Self> {
    let mut tmp = Self { writer, ifd_location: 0 };
    tmp.write_header()?;
    Ok(tmp)
  }

  fn write_header(&mut self) -> Result<()> {
    self.writer.write_all(b"II")?;
    self.writer.write_u16::<LittleEndian>(TIFF_MAGIC)?;
    self.ifd_location = self.writer.stream_position()?;
    self.writer.write_u32::<LittleEndian>(0_u32)?; // patched by build()
    Ok(())
  }

  pub(crate) fn pad_word_boundary(&mut self) -> Result<()> {
    let rem = self.position()? % 4;
    if rem != 0 {
      let padding = [0, 0, 0];
      self.writer.write_all(&padding[..(4 - rem) as usize])?;
    }
    Ok(())
  }

  pub fn position(&mut self) -> Result<u32> {
    let pos = self.writer.stream_position()?;
    u32::try_from(pos).map_err(|_| TiffError::Overflow(format!("Stream position {} exceeds TIFF address space", pos)))
  }

  /// Write a data block on a word boundary and return its offset
  pub fn write_data(&mut self, data: &[u8]) -> Result<u32> {
    self.pad_word_boundary()?;
    let offset = self.position()?;
    self.writer.write_all(data)?;
    Ok(offset)
  }

  /// Write the root IFD, link it from the header and hand back the stream
  pub fn build(mut self, root_ifd: DirectoryWriter) -> Result<W> {
    let ifd0_offset = root_ifd.build(&mut self)?;
    self.writer.seek(SeekFrom::Start(self.ifd_location))?;
    self.writer.write_u32::<LittleEndian>(ifd0_offset)?;
    self.writer.seek(SeekFrom::End(0))?;
    self.writer.flush()?;
    Ok(self.writer)
  }
}

/// Collects entries of one IFD until it is built into a `TiffWriter`
#[derive(Debug, Default)]
pub struct DirectoryWriter {
  // BTreeMap keeps the tags in ascending order, as TIFF requires
  entries: BTreeMap<u16, Value>,
}

impl DirectoryWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entry_count(&self) -> u16 {
    self.entries.len() as u16
  }

  pub fn add_tag<T: TiffTag, V: Into<Value>>(&mut self, tag: T, value: V) {
    self.entries.insert(tag.into(), value.into());
  }

  pub fn build<W>(self, tiff: &mut TiffWriter<W>) -> Result<u32>
  where
    W: Write + Seek,
  {
    if self.entries.is_empty() {
      return Err(TiffError::General("IFD is empty, not allowed by TIFF specification".to_string()));
    }

    // Values that don't fit into the entry are stored before the IFD itself
    let mut fields = Vec::with_capacity(self.entries.len());
    for (tag, value) in &self.entries {
      let field = if value.byte_size() > 4 {
        tiff.pad_word_boundary()?;
        let offset = tiff.position()?;
        value.write(&mut tiff.writer)?;
        offset.to_le_bytes()
      } else {
        value.as_embedded()?
      };
      fields.push((*tag, value, field));
    }

    tiff.pad_word_boundary()?;
    let offset = tiff.position()?;

    tiff.writer.write_u16::<LittleEndian>(self.entry_count())?;
    for (tag, value, field) in fields {
      let count = u32::try_from(value.count()).map_err(|_| TiffError::Overflow(format!("Too many values for tag {:#x}", tag)))?;
      tiff.writer.write_u16::<LittleEndian>(tag)?;
      tiff.writer.write_u16::<LittleEndian>(value.value_type())?;
      tiff.writer.write_u32::<LittleEndian>(count)?;
      tiff.writer.write_all(&field)?;
    }
    // Single IFD chain
    tiff.writer.write_u32::<LittleEndian>(0)?;

    Ok(offset)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use crate::tags::{DngTag, TiffCommonTag};

  use super::*;

  #[test]
  fn build_minimal_tiff() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut tiff = TiffWriter::new(Cursor::new(Vec::new()))?;
    let mut ifd = DirectoryWriter::new();
    ifd.add_tag(TiffCommonTag::ImageDescription, "Test");
    ifd.add_tag(TiffCommonTag::ImageWidth, 4_u32);
    let buf = tiff.build(ifd)?.into_inner();

    let expected_output = [
      73, 73, 42, 0, 16, 0, 0, 0, // header, IFD0 at 16
      84, 101, 115, 116, 0, 0, 0, 0, // "Test\0" + padding
      2, 0, // entry count
      0, 1, 4, 0, 1, 0, 0, 0, 4, 0, 0, 0, // ImageWidth LONG 1 = 4
      14, 1, 2, 0, 5, 0, 0, 0, 8, 0, 0, 0, // ImageDescription ASCII 5 @ 8
      0, 0, 0, 0, // next IFD
    ];
    assert_eq!(expected_output, buf.as_slice());
    Ok(())
  }

  #[test]
  fn entries_are_sorted_by_tag() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut tiff = TiffWriter::new(Cursor::new(Vec::new()))?;
    let mut ifd = DirectoryWriter::new();
    ifd.add_tag(DngTag::DNGVersion, [1_u8, 2, 0, 0]);
    ifd.add_tag(TiffCommonTag::NewSubFileType, 0_u32);
    ifd.add_tag(TiffCommonTag::ImageLength, 8_u32);
    assert_eq!(ifd.entry_count(), 3);
    let buf = tiff.build(ifd)?.into_inner();

    let ifd0 = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    let tags: Vec<u16> = (0..3)
      .map(|i| {
        let pos = ifd0 + 2 + i * 12;
        u16::from_le_bytes([buf[pos], buf[pos + 1]])
      })
      .collect();
    assert_eq!(tags, vec![0x00FE, 0x0101, 0xC612]);
    Ok(())
  }

  #[test]
  fn empty_ifd_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let tiff = TiffWriter::new(Cursor::new(Vec::new()))?;
    assert!(matches!(tiff.build(DirectoryWriter::new()), Err(TiffError::General(_))));
    Ok(())
  }

  #[test]
  fn data_blocks_are_word_aligned() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut tiff = TiffWriter::new(Cursor::new(Vec::new()))?;
    assert_eq!(tiff.write_data(&[1, 2, 3])?, 8);
    assert_eq!(tiff.write_data(&[4])?, 12);
    Ok(())
  }
}
