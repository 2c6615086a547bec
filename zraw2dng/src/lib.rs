// SPDX-License-Identifier: LGPL-2.1

//! Asynchronous ZRAW frame to DNG conversion
//!
//! A [`ConversionWorker`] accepts one [`ConversionJob`] at a time and runs
//! it on a background thread: the frame is decoded through a
//! [`ZrawDecoder`], optionally reduced to half or quarter resolution,
//! assembled into a CFA DNG and handed to a [`DngSink`].

#![deny(unstable_features)]

use thiserror::Error;

pub mod cameras;
pub mod console;
pub mod convert;
pub mod decoder;
pub mod dng;
pub mod downscale;
pub(crate) mod envparams;
pub mod job;
pub mod ljpeg92;
pub mod packed;
pub mod tags;
pub mod tiff;
pub mod worker;

pub use console::{DiagnosticSink, LogSink};
pub use convert::{ConvertParams, convert_frame};
pub use decoder::{AwbGains, DecoderInstance, DecoderStage, DecoderState, FrameInfo, ZrawDecoder};
pub use dng::{DngError, DngFileSink, DngImage, DngSink};
pub use job::{CameraModel, ConversionJob, RawCompression, RawScale};
pub use worker::{ConversionWorker, JobOutcome, JobTicket, Rejected, WorkerState};

#[derive(Debug, Error)]
pub enum ConvertError {
  #[error("Could not create ZRAW decoding context")]
  DecoderUnavailable,

  #[error("ZRAW decoder failed at {}: {}", stage, state)]
  Decoder { stage: DecoderStage, state: DecoderState },

  #[error("Invalid frame info: {}", _0)]
  InvalidFrameInfo(String),

  #[error("Invalid dimensions {}x{}: {}", width, height, reason)]
  Dimensions { width: usize, height: usize, reason: &'static str },

  #[error("Invalid parameter: {}", _0)]
  InvalidParameter(String),

  #[error("LJPEG compression failed: {}", _0)]
  Compressor(#[from] ljpeg92::CompressorError),

  #[error(transparent)]
  Write(#[from] DngError),

  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),

  #[error("Conversion panicked: {}", _0)]
  Panicked(String),

  #[error("Conversion worker is gone")]
  WorkerGone,
}

pub type Result<T> = std::result::Result<T, ConvertError>;

// Used to force lazy_static initializations.
#[doc(hidden)]
pub fn force_initialization() {
  cameras::force_initialization();
}
