// SPDX-License-Identifier: LGPL-2.1

//! Uncompressed sample packing for DNG strips

/// Pack samples of `bps` bits into the byte layout of an
/// uncompressed DNG strip.
///
/// 8 bit samples are stored as bytes and 16 bit samples as
/// little-endian words. Other depths are packed MSB first with
/// each row starting on a byte boundary.
pub fn pack_samples(data: &[u16], width: usize, bps: u16) -> Vec<u8> {
  match bps {
    8 => data.iter().map(|v| *v as u8).collect(),
    16 => data.iter().flat_map(|v| v.to_le_bytes()).collect(),
    _ => {
      let bps = bps as usize;
      let mask = (1_u32 << bps) - 1;
      let row_bytes = (width * bps).div_ceil(8);
      let mut out = Vec::with_capacity(row_bytes * data.len() / width.max(1));
      for row in data.chunks(width.max(1)) {
        let mut acc: u32 = 0;
        let mut nbits = 0;
        for sample in row {
          acc = (acc << bps) | (*sample as u32 & mask);
          nbits += bps;
          while nbits >= 8 {
            nbits -= 8;
            out.push((acc >> nbits) as u8);
          }
          acc &= (1 << nbits) - 1;
        }
        if nbits > 0 {
          out.push((acc << (8 - nbits)) as u8);
        }
      }
      out
    }
  }
}
