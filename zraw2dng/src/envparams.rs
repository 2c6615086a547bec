// SPDX-License-Identifier: LGPL-2.1

use log::warn;

/// Predictor for lossless JPEG strips (1..=7)
pub(crate) fn zraw2dng_ljpeg_predictor() -> Option<u8> {
  match std::env::var("ZRAW2DNG_LJPEG_PREDICTOR").map(|val| val.parse::<u8>()) {
    Ok(Ok(value)) if (1..=7).contains(&value) => Some(value),
    Ok(_) => {
      warn!("Invalid value for ZRAW2DNG_LJPEG_PREDICTOR");
      None
    }
    Err(_) => None,
  }
}
