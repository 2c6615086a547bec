// SPDX-License-Identifier: LGPL-2.1

#![allow(dead_code)]

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::{Duration, Instant},
};

use zraw2dng::{
  AwbGains, ConversionWorker, DecoderInstance, DecoderStage, DecoderState, DiagnosticSink, DngError, DngImage, DngSink, FrameInfo, ZrawDecoder,
};

pub fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// One-shot latch to hold the worker inside a job
#[derive(Default)]
pub struct Gate {
  open: Mutex<bool>,
  cond: Condvar,
}

impl Gate {
  pub fn open(&self) {
    *self.open.lock().expect("poisoned") = true;
    self.cond.notify_all();
  }

  pub fn wait(&self) {
    let mut open = self.open.lock().expect("poisoned");
    while !*open {
      open = self.cond.wait(open).expect("poisoned");
    }
  }
}

#[derive(Clone)]
struct StubConfig {
  width: u32,
  height: u32,
  bits_per_sample: u16,
  value: u16,
  fail_at: Option<DecoderStage>,
  unavailable: bool,
  panic_on_decompress: bool,
  gate: Option<Arc<Gate>>,
}

/// Decoder producing a uniform mosaic
pub struct StubDecoder {
  config: StubConfig,
  created: Arc<AtomicUsize>,
  freed: Arc<AtomicUsize>,
}

impl StubDecoder {
  pub fn uniform(width: u32, height: u32, bits_per_sample: u16, value: u16) -> Self {
    Self {
      config: StubConfig {
        width,
        height,
        bits_per_sample,
        value,
        fail_at: None,
        unavailable: false,
        panic_on_decompress: false,
        gate: None,
      },
      created: Arc::default(),
      freed: Arc::default(),
    }
  }

  pub fn failing_at(mut self, stage: DecoderStage) -> Self {
    self.config.fail_at = Some(stage);
    self
  }

  pub fn unavailable(mut self) -> Self {
    self.config.unavailable = true;
    self
  }

  pub fn panicking(mut self) -> Self {
    self.config.panic_on_decompress = true;
    self
  }

  pub fn gated(mut self, gate: Arc<Gate>) -> Self {
    self.config.gate = Some(gate);
    self
  }

  pub fn created(&self) -> Arc<AtomicUsize> {
    self.created.clone()
  }

  pub fn freed(&self) -> Arc<AtomicUsize> {
    self.freed.clone()
  }
}

impl ZrawDecoder for StubDecoder {
  fn create(&self) -> Option<Box<dyn DecoderInstance>> {
    if self.config.unavailable {
      return None;
    }
    self.created.fetch_add(1, Ordering::SeqCst);
    Some(Box::new(StubInstance {
      config: self.config.clone(),
      freed: self.freed.clone(),
    }))
  }

  fn exception_message(&self) -> String {
    String::from("stub exception")
  }
}

struct StubInstance {
  config: StubConfig,
  freed: Arc<AtomicUsize>,
}

impl StubInstance {
  fn fails(&self, stage: DecoderStage) -> bool {
    self.config.fail_at == Some(stage)
  }
}

impl DecoderInstance for StubInstance {
  fn read_frame(&mut self, _frame: &[u8]) -> DecoderState {
    if self.fails(DecoderStage::Read) {
      DecoderState::FrameReadingFailed
    } else {
      DecoderState::FrameIsRead
    }
  }

  fn frame_info(&mut self) -> (DecoderState, FrameInfo) {
    let info = FrameInfo {
      width: self.config.width,
      height: self.config.height,
      bits_per_sample: self.config.bits_per_sample,
      awb_gains: AwbGains { r: 2.0, g: 1.0, b: 0.5 },
      black_levels: [128; 4],
    };
    if self.fails(DecoderStage::FrameInfo) {
      (DecoderState::UnexpectedFailure, info)
    } else {
      (DecoderState::Standby, info)
    }
  }

  fn decompress(&mut self) -> DecoderState {
    if let Some(gate) = &self.config.gate {
      gate.wait();
    }
    if self.config.panic_on_decompress {
      panic!("stub decoder crashed");
    }
    if self.fails(DecoderStage::Decompress) {
      DecoderState::FrameDecompressionFailed
    } else {
      DecoderState::FrameIsDecompressed
    }
  }

  fn copy_cfa(&mut self, cfa: &mut [u16]) -> DecoderState {
    if self.fails(DecoderStage::ExtractCfa) || cfa.len() != (self.config.width * self.config.height) as usize {
      return DecoderState::NoSpaceToWriteCfa;
    }
    cfa.fill(self.config.value);
    DecoderState::Standby
  }

  fn free(self: Box<Self>) -> DecoderState {
    self.freed.fetch_add(1, Ordering::SeqCst);
    if self.fails(DecoderStage::Free) {
      DecoderState::UnexpectedFailure
    } else {
      DecoderState::InstanceIsRemoved
    }
  }
}

/// Writer that keeps assembled images in memory
#[derive(Default)]
pub struct CaptureSink {
  images: Mutex<Vec<(PathBuf, DngImage)>>,
}

impl CaptureSink {
  pub fn images(&self) -> Vec<(PathBuf, DngImage)> {
    self.images.lock().expect("poisoned").clone()
  }
}

impl DngSink for CaptureSink {
  fn write_dng(&self, image: &DngImage, path: &Path) -> Result<(), DngError> {
    self.images.lock().expect("poisoned").push((path.to_path_buf(), image.clone()));
    Ok(())
  }
}

/// Writer that always fails
pub struct FailingSink;

impl DngSink for FailingSink {
  fn write_dng(&self, _image: &DngImage, _path: &Path) -> Result<(), DngError> {
    Err(DngError::General(String::from("disk full")))
  }
}

#[derive(Default)]
pub struct CollectingConsole {
  lines: Mutex<Vec<String>>,
}

impl CollectingConsole {
  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().expect("poisoned").clone()
  }
}

impl DiagnosticSink for CollectingConsole {
  fn print(&self, line: &str) {
    self.lines.lock().expect("poisoned").push(line.to_string());
  }
}

/// Poll until the worker reports idle
pub fn wait_idle(worker: &ConversionWorker) {
  let deadline = Instant::now() + Duration::from_secs(10);
  while worker.is_busy() {
    assert!(Instant::now() < deadline, "worker did not become idle");
    std::thread::sleep(Duration::from_millis(5));
  }
}
