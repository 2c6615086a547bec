// SPDX-License-Identifier: LGPL-2.1

//! Lossless JPEG encoder (ITU T.81 process 14, Huffman coded)
//!
//! Up to four interleaved components are supported. For CFA data the
//! usual trick is used: a row of `w` photosites is encoded as `w/2`
//! pixels of two components, so the predictor only ever looks at
//! photosites of the same color.

use std::{cmp::min, io::Write};

use byteorder::{BigEndian, WriteBytesExt};
use num_enum::TryFromPrimitive;
use rayon::prelude::*;
use thiserror::Error;

/// Count of SSSS classes for lossless JPEG (0-16)
const CLASSES: usize = 17;

/// Error variants for compressor
#[derive(Debug, Error)]
pub enum CompressorError {
  /// Overflow of input, size constraints...
  #[error("Overflow error: {}", _0)]
  Overflow(String),

  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, CompressorError>;

/// Selection value of the lossless predictor (Table H.1)
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum Predictor {
  P1 = 1,
  P2 = 2,
  P3 = 3,
  P4 = 4,
  P5 = 5,
  P6 = 6,
  P7 = 7,
}

impl Predictor {
  /// Figure H.1
  /// | c | b |
  /// | a | x |
  #[inline(always)]
  fn predict(self, ra: i32, rb: i32, rc: i32) -> i32 {
    // Integer shifts, same as the Adobe DNG SDK
    match self {
      Self::P1 => ra,
      Self::P2 => rb,
      Self::P3 => rc,
      Self::P4 => ra + rb - rc,
      Self::P5 => ra + ((rb - rc) >> 1),
      Self::P6 => rb + ((ra - rc) >> 1),
      Self::P7 => (ra + rb) >> 1,
    }
  }
}

/// Number of bits needed for the magnitude of a difference
#[inline(always)]
fn ssss(diff: i16) -> usize {
  (32 - (diff as i32).unsigned_abs().leading_zeros()) as usize
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct HuffCode {
  len: u8,
  code: u16,
}

/// Huffman table as written to the DHT segment plus the encoding lookup
#[derive(Clone, Debug, Default)]
struct HuffTable {
  /// Number of codes for each length 1..=16
  bits: [u8; 16],
  /// Symbols in order of increasing code length
  huffval: Vec<u8>,
  /// Code for each SSSS class
  codes: [HuffCode; CLASSES],
}

impl HuffTable {
  /// Build an optimal table for the given histogram (Annex K.2)
  fn optimal(histogram: &[u64; CLASSES]) -> Self {
    // One extra symbol with frequency 1 reserves the all-ones code word
    let mut freq = [0_u64; CLASSES + 1];
    freq[..CLASSES].copy_from_slice(histogram);
    freq[CLASSES] = 1;
    let mut codesize = [0_usize; CLASSES + 1];
    let mut others: [Option<usize>; CLASSES + 1] = [None; CLASSES + 1];

    // Figure K.1, ties resolve to the larger symbol
    loop {
      let mut v1: Option<usize> = None;
      for i in 0..=CLASSES {
        if freq[i] > 0 && v1.is_none_or(|v| freq[i] <= freq[v]) {
          v1 = Some(i);
        }
      }
      let mut v2: Option<usize> = None;
      for i in 0..=CLASSES {
        if freq[i] > 0 && Some(i) != v1 && v2.is_none_or(|v| freq[i] <= freq[v]) {
          v2 = Some(i);
        }
      }
      let (Some(mut v1), Some(mut v2)) = (v1, v2) else {
        break;
      };

      freq[v1] += freq[v2];
      freq[v2] = 0;

      codesize[v1] += 1;
      while let Some(next) = others[v1] {
        v1 = next;
        codesize[v1] += 1;
      }
      others[v1] = Some(v2);
      codesize[v2] += 1;
      while let Some(next) = others[v2] {
        v2 = next;
        codesize[v2] += 1;
      }
    }

    // Figure K.2
    let mut bits = [0_u32; 33];
    for size in codesize.iter().filter(|size| **size > 0) {
      bits[*size] += 1;
    }

    // Figure K.3, limit code lengths to 16 bits
    let mut i = 32;
    while i > 16 {
      if bits[i] > 0 {
        let mut j = i - 2;
        while bits[j] == 0 {
          j -= 1;
        }
        bits[i] -= 2;
        bits[i - 1] += 1;
        bits[j + 1] += 2;
        bits[j] -= 1;
      } else {
        i -= 1;
      }
    }
    // Drop the reserved code point
    while bits[i] == 0 {
      i -= 1;
    }
    bits[i] -= 1;

    // Figure K.4
    let mut huffval = Vec::with_capacity(CLASSES);
    for size in 1..=32 {
      for (symbol, _) in codesize.iter().enumerate().take(CLASSES).filter(|(_, cs)| **cs == size) {
        huffval.push(symbol as u8);
      }
    }

    let mut table = Self {
      huffval,
      ..Default::default()
    };
    for (dst, src) in table.bits.iter_mut().zip(&bits[1..=16]) {
      *dst = *src as u8;
    }

    // Canonical code assignment, Annex C
    let mut code = 0_u16;
    let mut k = 0;
    for len in 1..=16_u8 {
      for _ in 0..table.bits[len as usize - 1] {
        table.codes[table.huffval[k] as usize] = HuffCode { len, code };
        code += 1;
        k += 1;
      }
      code <<= 1;
    }
    table
  }
}

/// Bit writer for entropy coded segments with 0xFF byte stuffing
struct BitWriter<'a, W: Write + ?Sized> {
  inner: &'a mut W,
  next: u8,
  used: usize,
}

impl<'a, W: Write + ?Sized> BitWriter<'a, W> {
  fn new(inner: &'a mut W) -> Self {
    Self { inner, next: 0, used: 0 }
  }

  fn write(&mut self, mut bits: usize, value: u32) -> std::io::Result<()> {
    while bits > 0 {
      let free = 8 - self.used;
      let take = min(bits, free);
      let peek = ((value >> (bits - take)) & ((1 << take) - 1)) as u8;
      self.next |= peek << (free - take);
      bits -= take;
      self.used += take;
      if self.used == 8 {
        self.emit()?;
      }
    }
    Ok(())
  }

  fn emit(&mut self) -> std::io::Result<()> {
    self.inner.write_u8(self.next)?;
    if self.next == 0xFF {
      self.inner.write_u8(0x00)?;
    }
    self.next = 0;
    self.used = 0;
    Ok(())
  }

  /// Pad the last byte with 1-bits (F.1.2.3)
  fn finish(mut self) -> std::io::Result<()> {
    if self.used > 0 {
      let free = 8 - self.used;
      self.write(free, (1 << free) - 1)?;
    }
    Ok(())
  }
}

/// Encoder for Lossless JPEG
///
/// `encode()` consumes the instance and returns the complete
/// JPEG stream from SOI to EOI.
pub struct LjpegCompressor<'a> {
  image: &'a [u16],
  /// Pixels per line, each pixel has `components` samples
  width: usize,
  height: usize,
  components: usize,
  bitdepth: u8,
  predictor: Predictor,
}

impl<'a> LjpegCompressor<'a> {
  pub fn new(image: &'a [u16], width: usize, height: usize, components: usize, bitdepth: u8, predictor: Predictor) -> Result<Self> {
    if !(1..=4).contains(&components) {
      return Err(CompressorError::Overflow(format!("Unsupported component count: {}", components)));
    }
    if !(2..=16).contains(&bitdepth) {
      return Err(CompressorError::Overflow(format!(
        "Overflow for bit depth {}, only 2 >= bp <= 16 is supported",
        bitdepth
      )));
    }
    if width == 0 || height == 0 || width > 65_535 || height > 65_535 {
      return Err(CompressorError::Overflow(format!("Unsupported dimensions {}x{}", width, height)));
    }
    if image.len() != width * height * components {
      return Err(CompressorError::Overflow(format!(
        "Image buffer has {} samples, expected {}",
        image.len(),
        width * height * components
      )));
    }
    let max_value = (1_u32 << bitdepth) - 1;
    if let Some(sample) = image.iter().find(|s| u32::from(**s) > max_value) {
      return Err(CompressorError::Overflow(format!(
        "Sample overflow, sample is {:#x} but max value is {:#x}",
        sample, max_value
      )));
    }
    Ok(Self {
      image,
      width,
      height,
      components,
      bitdepth,
      predictor,
    })
  }

  pub fn encode(self) -> Result<Vec<u8>> {
    let diffs = self.differences();

    let mut histograms = vec![[0_u64; CLASSES]; self.components];
    for (i, diff) in diffs.iter().enumerate() {
      histograms[i % self.components][ssss(*diff)] += 1;
    }
    let tables: Vec<HuffTable> = histograms.iter().map(HuffTable::optimal).collect();

    let mut encoded = Vec::with_capacity(self.image.len());
    self.write_header(&mut encoded, &tables)?;
    self.write_body(&mut encoded, &tables, &diffs)?;
    encoded.write_u16::<BigEndian>(0xFFD9)?; // EOI
    Ok(encoded)
  }

  /// Difference values for all samples, rows are independent
  fn differences(&self) -> Vec<i16> {
    let nc = self.components;
    let line = self.width * nc;
    let initial = 1_i32 << (self.bitdepth - 1);
    let mut diffs = vec![0_i16; line * self.height];

    diffs.par_chunks_exact_mut(line).enumerate().for_each(|(row, out)| {
      let curr = &self.image[row * line..(row + 1) * line];
      if row == 0 {
        // First line uses Ra only
        for idx in 0..line {
          let px = if idx < nc { initial } else { curr[idx - nc] as i32 };
          out[idx] = (curr[idx] as i32 - px) as i16;
        }
      } else {
        // First column uses Rb
        let prev = &self.image[(row - 1) * line..row * line];
        for idx in 0..line {
          let px = if idx < nc {
            prev[idx] as i32
          } else {
            self.predictor.predict(curr[idx - nc] as i32, prev[idx] as i32, prev[idx - nc] as i32)
          };
          // Difference is modulo 2^16 (H.1.2.1)
          out[idx] = (curr[idx] as i32 - px) as i16;
        }
      }
    });
    diffs
  }

  fn write_header<W: Write + ?Sized>(&self, out: &mut W, tables: &[HuffTable]) -> Result<()> {
    let nc = self.components as u8;
    out.write_u16::<BigEndian>(0xFFD8)?; // SOI

    out.write_u16::<BigEndian>(0xFFC3)?; // SOF3
    out.write_u16::<BigEndian>(8 + 3 * nc as u16)?;
    out.write_u8(self.bitdepth)?;
    out.write_u16::<BigEndian>(self.height as u16)?;
    out.write_u16::<BigEndian>(self.width as u16)?;
    out.write_u8(nc)?;
    for c in 0..nc {
      out.write_u8(c)?;
      out.write_u8(0x11)?; // sampling factors
      out.write_u8(0)?; // Tq, unused
    }

    for (id, table) in tables.iter().enumerate() {
      out.write_u16::<BigEndian>(0xFFC4)?; // DHT
      out.write_u16::<BigEndian>(2 + 1 + 16 + table.huffval.len() as u16)?;
      out.write_u8(id as u8)?; // Tc = 0, Th = component
      out.write_all(&table.bits)?;
      out.write_all(&table.huffval)?;
    }

    out.write_u16::<BigEndian>(0xFFDA)?; // SOS
    out.write_u16::<BigEndian>(6 + 2 * nc as u16)?;
    out.write_u8(nc)?;
    for c in 0..nc {
      out.write_u8(c)?;
      out.write_u8(c << 4)?;
    }
    out.write_u8(self.predictor as u8)?; // Ss
    out.write_u8(0)?; // Se
    out.write_u8(0)?; // Ah/Al, no point transform
    Ok(())
  }

  fn write_body<W: Write + ?Sized>(&self, out: &mut W, tables: &[HuffTable], diffs: &[i16]) -> Result<()> {
    let mut bits = BitWriter::new(out);
    for (i, diff) in diffs.iter().enumerate() {
      let class = ssss(*diff);
      let code = tables[i % self.components].codes[class];
      debug_assert!(code.len > 0);
      bits.write(code.len as usize, code.code as u32)?;
      // SSSS 16 has the single value 32768 and no extra bits
      if (1..=15).contains(&class) {
        let value = if *diff < 0 { *diff as i32 - 1 } else { *diff as i32 };
        bits.write(class, (value as u32) & ((1 << class) - 1))?;
      }
    }
    bits.finish()?;
    Ok(())
  }
}
