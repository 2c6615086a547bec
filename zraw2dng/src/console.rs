// SPDX-License-Identifier: LGPL-2.1

/// Receiver for human readable progress and error lines of a job
pub trait DiagnosticSink: Send + Sync {
  fn print(&self, line: &str);
}

/// Forwards all lines to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
  fn print(&self, line: &str) {
    log::info!("{}", line);
  }
}

impl<F> DiagnosticSink for F
where
  F: Fn(&str) + Send + Sync,
{
  fn print(&self, line: &str) {
    self(line)
  }
}
