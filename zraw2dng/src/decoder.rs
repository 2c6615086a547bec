// SPDX-License-Identifier: LGPL-2.1

//! Adapter around the opaque ZRAW decoder capability
//!
//! The decoder is driven through create, read, frame info, decompress,
//! CFA extraction and free. Every status is translated into a verdict
//! plus diagnostic lines, and the decoder instance is released on
//! every exit path.

use std::fmt;

use log::{debug, warn};

use crate::{ConvertError, Result, console::DiagnosticSink};

const LINE_PREFIX: &str = "ZRAW decoder: ";

/// Status reported by the decoder after each stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
  InvalidInstance,
  Standby,
  NoSpaceToWriteCfa,
  FrameIsRead,
  FrameReadingFailed,
  FrameIsDecompressed,
  FrameDecompressionFailed,
  InstanceIsRemoved,
  Exception,
  UnexpectedFailure,
  /// Raw status code outside the known set
  Unmapped(i32),
}

impl DecoderState {
  /// Map a raw status code of the decoder library
  pub fn from_code(code: i32) -> Self {
    match code {
      0 => Self::InvalidInstance,
      1 => Self::Standby,
      2 => Self::NoSpaceToWriteCfa,
      3 => Self::FrameIsRead,
      4 => Self::FrameReadingFailed,
      5 => Self::FrameIsDecompressed,
      6 => Self::FrameDecompressionFailed,
      7 => Self::InstanceIsRemoved,
      8 => Self::Exception,
      9 => Self::UnexpectedFailure,
      code => Self::Unmapped(code),
    }
  }
}

impl fmt::Display for DecoderState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::InvalidInstance => f.write_str("INVALID_INSTANCE"),
      Self::Standby => f.write_str("STANDBY"),
      Self::NoSpaceToWriteCfa => f.write_str("NO_SPACE_TO_WRITE_CFA"),
      Self::FrameIsRead => f.write_str("FRAME_IS_READ"),
      Self::FrameReadingFailed => f.write_str("FRAME_READING_FAILED"),
      Self::FrameIsDecompressed => f.write_str("FRAME_IS_DECOMPRESSED"),
      Self::FrameDecompressionFailed => f.write_str("FRAME_DECOMPRESSION_FAILED"),
      Self::InstanceIsRemoved => f.write_str("INSTANCE_IS_REMOVED"),
      Self::Exception => f.write_str("EXCEPTION"),
      Self::UnexpectedFailure => f.write_str("UNEXPECTED_FAILURE"),
      Self::Unmapped(code) => write!(f, "UNMAPPED({})", code),
    }
  }
}

/// Decoder lifecycle stages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderStage {
  Create,
  Read,
  FrameInfo,
  Decompress,
  ExtractCfa,
  Free,
}

impl DecoderStage {
  /// Line printed when the stage aborts the job
  pub fn failure_line(self) -> &'static str {
    match self {
      Self::Create => "Error! Could not create ZRAW decoding context!",
      Self::Read => "Frame reading failed!",
      // Vendor-neutral wording of the frame info failure
      Self::FrameInfo => "Getting frame info failed!",
      Self::Decompress => "Frame decompression failed!",
      Self::ExtractCfa => "Receiving CFA failed!",
      Self::Free => "Failed to remove ZRAW decoding context!",
    }
  }
}

impl fmt::Display for DecoderStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Create => "create",
      Self::Read => "frame read",
      Self::FrameInfo => "frame info",
      Self::Decompress => "decompression",
      Self::ExtractCfa => "CFA extraction",
      Self::Free => "teardown",
    })
  }
}

/// Auto white balance gains as measured by the camera
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AwbGains {
  pub r: f64,
  pub g: f64,
  pub b: f64,
}

/// Frame properties reported by the decoder
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInfo {
  /// Width in photodiodes
  pub width: u32,
  /// Height in photodiodes
  pub height: u32,
  pub bits_per_sample: u16,
  pub awb_gains: AwbGains,
  /// Black level for each CFA quadrant
  pub black_levels: [u16; 4],
}

impl FrameInfo {
  pub fn validate(&self) -> Result<()> {
    if self.width == 0 || self.height == 0 {
      return Err(ConvertError::InvalidFrameInfo(format!("Frame has no pixels: {}x{}", self.width, self.height)));
    }
    if !(1..=16).contains(&self.bits_per_sample) {
      return Err(ConvertError::InvalidFrameInfo(format!("Unsupported bit depth: {}", self.bits_per_sample)));
    }
    Ok(())
  }

  /// Photodiode count of the full frame
  pub fn sample_count(&self) -> Result<usize> {
    (self.width as usize)
      .checked_mul(self.height as usize)
      .ok_or_else(|| ConvertError::InvalidFrameInfo(format!("Frame too large: {}x{}", self.width, self.height)))
  }
}

/// Factory side of the decoder capability
pub trait ZrawDecoder: Send + Sync {
  /// Create a decoding context, `None` if the decoder is unavailable
  fn create(&self) -> Option<Box<dyn DecoderInstance>>;

  /// Message describing the last `Exception` status
  fn exception_message(&self) -> String;
}

/// A single decoding context
pub trait DecoderInstance: Send {
  fn read_frame(&mut self, frame: &[u8]) -> DecoderState;
  fn frame_info(&mut self) -> (DecoderState, FrameInfo);
  fn decompress(&mut self) -> DecoderState;
  /// Copy the decompressed mosaic, one `u16` per photodiode
  fn copy_cfa(&mut self, cfa: &mut [u16]) -> DecoderState;
  fn free(self: Box<Self>) -> DecoderState;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateVerdict {
  pub proceed: bool,
  pub lines: Vec<String>,
}

/// Translate a decoder status into a verdict and diagnostic lines
///
/// `exception_message` is only called for `Exception`.
pub fn evaluate_state(state: DecoderState, exception_message: impl FnOnce() -> String) -> StateVerdict {
  let line = |text: &str| format!("{}{}", LINE_PREFIX, text);
  let (proceed, lines) = match state {
    DecoderState::InvalidInstance => (false, vec![line("Could not create ZRAW decoding context!")]),
    DecoderState::Standby
    | DecoderState::FrameIsRead
    | DecoderState::FrameIsDecompressed
    | DecoderState::InstanceIsRemoved => (true, vec![line(&state.to_string())]),
    DecoderState::NoSpaceToWriteCfa
    | DecoderState::FrameReadingFailed
    | DecoderState::FrameDecompressionFailed
    | DecoderState::UnexpectedFailure => (false, vec![line(&state.to_string())]),
    // No trailing missing-case warning here, EXCEPTION is a mapped status
    DecoderState::Exception => (false, vec![line(&format!("EXCEPTION -> {}", exception_message()))]),
    DecoderState::Unmapped(code) => {
      warn!("Missing mapping for decoder state {}", code);
      (
        false,
        vec![
          line("UNEXPECTED_FAILURE"),
          line(&format!("WARNING! Missing mapping for decoder state {}!", code)),
        ],
      )
    }
  };
  StateVerdict { proceed, lines }
}

/// Decoded frame properties together with the full resolution mosaic
#[derive(Clone, Debug)]
pub struct DecodedFrame {
  pub info: FrameInfo,
  pub cfa: Vec<u16>,
}

/// Owns a decoder instance and frees it when dropped
struct DecoderSession {
  instance: Option<Box<dyn DecoderInstance>>,
}

impl DecoderSession {
  fn new(instance: Box<dyn DecoderInstance>) -> Self {
    Self { instance: Some(instance) }
  }

  fn instance(&mut self) -> Option<&mut Box<dyn DecoderInstance>> {
    self.instance.as_mut()
  }

  /// Free the instance and return the reported status
  fn close(mut self) -> DecoderState {
    self.instance.take().map_or(DecoderState::InvalidInstance, |instance| instance.free())
  }
}

impl Drop for DecoderSession {
  fn drop(&mut self) {
    if let Some(instance) = self.instance.take() {
      let state = instance.free();
      debug!("Released ZRAW decoding context after failure: {}", state);
    }
  }
}

fn check_stage(decoder: &dyn ZrawDecoder, console: &dyn DiagnosticSink, stage: DecoderStage, state: DecoderState) -> Result<()> {
  let verdict = evaluate_state(state, || decoder.exception_message());
  for line in &verdict.lines {
    console.print(line);
  }
  if verdict.proceed {
    Ok(())
  } else {
    console.print(stage.failure_line());
    Err(ConvertError::Decoder { stage, state })
  }
}

/// Run all decoder stages on a compressed frame
pub fn decode_frame(decoder: &dyn ZrawDecoder, console: &dyn DiagnosticSink, frame: &[u8]) -> Result<DecodedFrame> {
  let Some(instance) = decoder.create() else {
    console.print(DecoderStage::Create.failure_line());
    return Err(ConvertError::DecoderUnavailable);
  };
  let mut session = DecoderSession::new(instance);

  let state = session.instance().map_or(DecoderState::InvalidInstance, |i| i.read_frame(frame));
  check_stage(decoder, console, DecoderStage::Read, state)?;

  let (state, info) = session
    .instance()
    .map_or((DecoderState::InvalidInstance, FrameInfo::default()), |i| i.frame_info());
  check_stage(decoder, console, DecoderStage::FrameInfo, state)?;
  if let Err(err) = info.validate() {
    console.print(DecoderStage::FrameInfo.failure_line());
    return Err(err);
  }
  debug!(
    "Frame info: {}x{}, {} bps, black levels {:?}",
    info.width, info.height, info.bits_per_sample, info.black_levels
  );

  let state = session.instance().map_or(DecoderState::InvalidInstance, |i| i.decompress());
  check_stage(decoder, console, DecoderStage::Decompress, state)?;

  let mut cfa = vec![0_u16; info.sample_count()?];
  let state = session.instance().map_or(DecoderState::InvalidInstance, |i| i.copy_cfa(&mut cfa));
  check_stage(decoder, console, DecoderStage::ExtractCfa, state)?;

  let state = session.close();
  check_stage(decoder, console, DecoderStage::Free, state)?;

  Ok(DecodedFrame { info, cfa })
}
