//! Error types for the pipeline.
//!
//! Leaf-level errors ([`EncoderCrash`]) are typed so a caller can inspect the
//! exit status and captured output; everything above the worker layer is
//! propagated as [`anyhow::Error`] with `.context(...)` attached at each I/O
//! boundary (see `pipeline.rs`).

use std::fmt::{self, Debug, Display};
use std::process::ExitStatus;

use thiserror::Error;

/// Either UTF-8 text or raw bytes, used for captured child-process output
/// that may not be valid UTF-8.
#[derive(Clone)]
pub enum StringOrBytes {
  String(String),
  Bytes(Vec<u8>),
}

impl Debug for StringOrBytes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::String(s) => {
        if f.alternate() {
          f.write_str(&textwrap::indent(s, "        "))
        } else {
          f.write_str(s)
        }
      }
      Self::Bytes(b) => write!(f, "raw bytes: {b:?}"),
    }
  }
}

impl From<Vec<u8>> for StringOrBytes {
  fn from(bytes: Vec<u8>) -> Self {
    if simdutf8::basic::from_utf8(&bytes).is_ok() {
      // SAFETY: checked valid UTF-8 above.
      Self::String(unsafe { String::from_utf8_unchecked(bytes) })
    } else {
      Self::Bytes(bytes)
    }
  }
}

impl From<String> for StringOrBytes {
  fn from(s: String) -> Self {
    Self::String(s)
  }
}

/// A child encoder (or probe) process exited with a non-zero status.
#[derive(Error, Debug)]
pub struct EncoderCrash {
  pub exit_status: ExitStatus,
  pub stdout: StringOrBytes,
  pub stderr: StringOrBytes,
  pub source_pipe_stderr: StringOrBytes,
}

impl Display for EncoderCrash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "encoder crashed: {}\nstdout:\n{:#?}\nstderr:\n{:#?}\nsource pipe stderr:\n{:#?}",
      self.exit_status, self.stdout, self.stderr, self.source_pipe_stderr
    )
  }
}

/// Fatal, job-level errors that the pipeline driver can distinguish from a
/// generic I/O failure.
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("no such input file(s): {0:?}")]
  NonexistentInputs(Vec<std::path::PathBuf>),

  #[error("required executable not found on PATH: {0}")]
  MissingExecutable(String),

  #[error("scene detection produced no cuts for {input:?}")]
  EmptySplit { input: std::path::PathBuf },

  #[error("target quality search requires at least 4 steps, got {0}")]
  TooFewSteps(u32),

  #[error("chunk {index} failed to encode after all passes")]
  ChunkFailed {
    index: usize,
    #[source]
    source: EncoderCrash,
  },

  #[error("concatenation failed for {output:?}")]
  ConcatFailed { output: std::path::PathBuf },

  #[error("cancelled by operator")]
  Cancelled,
}
