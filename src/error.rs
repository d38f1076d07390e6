use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Errors surfaced by the serving core.
///
/// Admission denials and creative no-matches are *not* errors; they are
/// per-candidate drop reasons (see `assemble::DropReason`). Variants here
/// cover data faults, configuration faults and infrastructure faults.
#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum AdError {
  // --- Data Errors ---
  #[error("template decode failed: {0}")]
  TemplateDecode(String),

  // --- Configuration Errors ---
  #[error("no strategy registered for channel: {0}")]
  UnknownChannel(String),

  // --- Infrastructure Errors ---
  // Returned by `CounterStore` implementations; the guard's fetch path
  // converts either into a degraded snapshot rather than propagating.
  #[error("counter store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

impl From<base64::DecodeError> for AdError {
  fn from(e: base64::DecodeError) -> Self {
    AdError::TemplateDecode(e.to_string())
  }
}

impl From<FromUtf8Error> for AdError {
  fn from(e: FromUtf8Error) -> Self {
    AdError::TemplateDecode(e.to_string())
  }
}
