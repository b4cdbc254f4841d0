use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The five fatal error kinds from the archive's error model, plus
/// `CapacityExceeded`, which is fatal everywhere except the one place
/// (Huffman code-length overflow at width 4) where the orchestrator
/// recovers from it locally by falling back to width 8.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  ConfigInvalid,
  CapacityExceeded,
  OutputInflation,
  DeviceFailure,
  HeaderInvalid,
  /// Caller-observable dimension mismatch (input length doesn't match
  /// the shape encoded in a header, or vice versa).
  Dimension,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QszError {
  pub kind: ErrorKind,
  pub message: String,
}

impl QszError {
  pub fn new<S: AsRef<str>>(kind: ErrorKind, message: S) -> Self {
    QszError {
      kind,
      message: message.as_ref().to_string(),
    }
  }

  pub fn config_invalid<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::ConfigInvalid, message)
  }

  pub fn capacity_exceeded<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::CapacityExceeded, message)
  }

  pub fn output_inflation<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::OutputInflation, message)
  }

  pub fn device_failure<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::DeviceFailure, message)
  }

  pub fn header_invalid<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::HeaderInvalid, message)
  }

  pub fn dimension<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::Dimension, message)
  }

  /// True for the one error this core ever recovers from by itself: a
  /// width-4 Huffman code outgrowing its code words.
  pub(crate) fn is_code_length_overflow(&self) -> bool {
    self.kind == ErrorKind::CapacityExceeded && self.message.contains("code length")
  }
}

impl Display for QszError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "!! {:?} error: {}", self.kind, &self.message)
  }
}

impl Error for QszError {}

pub type QszResult<T> = Result<T, QszError>;
