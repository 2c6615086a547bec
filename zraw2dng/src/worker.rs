// SPDX-License-Identifier: LGPL-2.1

//! Background conversion worker with a single job slot
//!
//! The worker owns one thread. A job is accepted only while the
//! worker is idle, there is no queue. The thread sleeps on a
//! condition variable until a job arrives or shutdown is requested.

use std::{
  fmt::Display,
  panic::{self, AssertUnwindSafe},
  path::PathBuf,
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, mpsc},
  thread::{self, JoinHandle},
  time::{Duration, Instant},
};

use log::{debug, error, info};
use thiserror::Error;

use crate::{
  ConvertError, Result, cameras,
  console::DiagnosticSink,
  convert::{ConvertParams, convert_frame},
  decoder::ZrawDecoder,
  dng::DngSink,
  job::ConversionJob,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
  Idle,
  Busy,
}

/// Result of one accepted job
#[derive(Debug)]
pub struct JobOutcome {
  pub output: PathBuf,
  /// Processing time in seconds
  pub duration: f32,
  pub result: Result<()>,
}

impl JobOutcome {
  fn gone(output: PathBuf) -> Self {
    Self {
      output,
      duration: 0.0,
      result: Err(ConvertError::WorkerGone),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }
}

impl Display for JobOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.result {
      Ok(()) => write!(f, "Converted frame => '{}' (in {:.2}s)", self.output.display(), self.duration),
      Err(err) => write!(f, "Failed: '{}', {}", self.output.display(), err),
    }
  }
}

/// Submission refused because a job is in flight, carries the job back
#[derive(Debug, Error)]
#[error("Conversion worker is busy, job for '{}' rejected", .0.output().display())]
pub struct Rejected(pub ConversionJob);

impl Rejected {
  pub fn into_job(self) -> ConversionJob {
    self.0
  }
}

/// Handle to the outcome of an accepted job
///
/// Every method that yields the outcome consumes the ticket, the
/// non-blocking ones hand it back while the job is still running.
#[derive(Debug)]
pub struct JobTicket {
  receiver: mpsc::Receiver<JobOutcome>,
  output: PathBuf,
}

impl JobTicket {
  /// Block until the job has finished
  pub fn wait(self) -> JobOutcome {
    match self.receiver.recv() {
      Ok(outcome) => outcome,
      Err(_) => JobOutcome::gone(self.output),
    }
  }

  /// Wait at most `timeout`, gives the ticket back if the job is still running
  pub fn wait_timeout(self, timeout: Duration) -> std::result::Result<JobOutcome, Self> {
    match self.receiver.recv_timeout(timeout) {
      Ok(outcome) => Ok(outcome),
      Err(mpsc::RecvTimeoutError::Timeout) => Err(self),
      Err(mpsc::RecvTimeoutError::Disconnected) => Ok(JobOutcome::gone(self.output)),
    }
  }

  /// Non-blocking poll, gives the ticket back if the job is still running
  pub fn try_outcome(self) -> std::result::Result<JobOutcome, Self> {
    match self.receiver.try_recv() {
      Ok(outcome) => Ok(outcome),
      Err(mpsc::TryRecvError::Empty) => Err(self),
      Err(mpsc::TryRecvError::Disconnected) => Ok(JobOutcome::gone(self.output)),
    }
  }
}

struct PendingJob {
  job: ConversionJob,
  console: Arc<dyn DiagnosticSink>,
  reply: Option<mpsc::Sender<JobOutcome>>,
}

struct Slot {
  state: WorkerState,
  pending: Option<PendingJob>,
  stop: bool,
}

struct Shared {
  slot: Mutex<Slot>,
  wake: Condvar,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, Slot> {
    // A panic while holding the lock leaves the slot consistent
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Converts one ZRAW frame at a time on a dedicated thread
pub struct ConversionWorker {
  shared: Arc<Shared>,
  thread: Option<JoinHandle<()>>,
  name: String,
}

impl ConversionWorker {
  pub fn new(decoder: Arc<dyn ZrawDecoder>, writer: Arc<dyn DngSink>, params: ConvertParams) -> Result<Self> {
    cameras::force_initialization();

    let shared = Arc::new(Shared {
      slot: Mutex::new(Slot {
        state: WorkerState::Idle,
        pending: None,
        stop: false,
      }),
      wake: Condvar::new(),
    });
    let name = params.thread_name.clone();
    let thread = thread::Builder::new().name(name.clone()).spawn({
      let shared = Arc::clone(&shared);
      move || worker_loop(&shared, decoder.as_ref(), writer.as_ref(), &params)
    })?;
    info!("Started conversion worker '{}'", name);

    Ok(Self {
      shared,
      thread: Some(thread),
      name,
    })
  }

  /// Hand a job to the worker if it is idle
  ///
  /// Returns `false` and drops the job when a job is already in flight.
  pub fn submit(&self, console: Arc<dyn DiagnosticSink>, job: ConversionJob) -> bool {
    self.enqueue(console, job, None).is_ok()
  }

  /// Like `submit()`, but returns a ticket for the outcome or the rejected job
  pub fn try_submit(&self, console: Arc<dyn DiagnosticSink>, job: ConversionJob) -> std::result::Result<JobTicket, Rejected> {
    let (sender, receiver) = mpsc::channel();
    let output = job.output().clone();
    self.enqueue(console, job, Some(sender))?;
    Ok(JobTicket { receiver, output })
  }

  pub fn state(&self) -> WorkerState {
    self.shared.lock().state
  }

  pub fn is_busy(&self) -> bool {
    self.state() == WorkerState::Busy
  }

  fn enqueue(&self, console: Arc<dyn DiagnosticSink>, job: ConversionJob, reply: Option<mpsc::Sender<JobOutcome>>) -> std::result::Result<(), Rejected> {
    let mut slot = self.shared.lock();
    if slot.state == WorkerState::Busy || slot.stop {
      debug!("Rejected job for {}, worker busy", job.output().display());
      return Err(Rejected(job));
    }
    slot.pending = Some(PendingJob { job, console, reply });
    slot.state = WorkerState::Busy;
    drop(slot);
    self.shared.wake.notify_one();
    Ok(())
  }

  /// Stop the thread after the job in flight (if any) has finished
  pub fn shutdown(&mut self) {
    if let Some(thread) = self.thread.take() {
      self.shared.lock().stop = true;
      self.shared.wake.notify_one();
      if thread.join().is_err() {
        error!("Conversion worker '{}' terminated abnormally", self.name);
      }
      info!("Stopped conversion worker '{}'", self.name);
    }
  }
}

impl Drop for ConversionWorker {
  fn drop(&mut self) {
    self.shutdown();
  }
}

fn worker_loop(shared: &Shared, decoder: &dyn ZrawDecoder, writer: &dyn DngSink, params: &ConvertParams) {
  debug!("Conversion worker thread started");
  loop {
    let pending = {
      let mut slot = shared.lock();
      loop {
        // An accepted job is always processed, even if stop was requested meanwhile
        if let Some(pending) = slot.pending.take() {
          break Some(pending);
        }
        if slot.stop {
          break None;
        }
        slot = shared.wake.wait(slot).unwrap_or_else(PoisonError::into_inner);
      }
    };
    let Some(PendingJob { job, console, reply }) = pending else {
      break;
    };

    let started = Instant::now();
    // The console belongs to the caller and may panic as well
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
      console.print("Received DNG frame task!");
      convert_frame(decoder, writer, console.as_ref(), &job, params)
    }))
    .unwrap_or_else(|payload| {
      let msg = panic_message(payload.as_ref());
      error!("Conversion of {} panicked: {}", job.output().display(), msg);
      let report = panic::catch_unwind(AssertUnwindSafe(|| console.print(&format!("Conversion panicked: {}", msg))));
      if report.is_err() {
        debug!("Console panicked while reporting a panic");
      }
      Err(ConvertError::Panicked(msg))
    });
    let outcome = JobOutcome {
      output: job.output().clone(),
      duration: started.elapsed().as_secs_f32(),
      result,
    };
    info!("{}", outcome);

    // Idle before the outcome is visible, a ticket holder may submit right away
    shared.lock().state = WorkerState::Idle;
    if let Some(reply) = reply {
      if reply.send(outcome).is_err() {
        debug!("Job ticket was dropped before completion");
      }
    }
  }
  debug!("Conversion worker thread exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(msg) = payload.downcast_ref::<&str>() {
    msg.to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    String::from("unknown panic")
  }
}
