//! Error types surfaced while identifying groups and serving combined payloads.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while building a combined group's identifier.
#[derive(Debug, Error)]
pub enum PlanError {
  /// Identifiers only exist for combined groups.
  #[error("group {index} is not a combined group")]
  NotCombined {
    /// Index of the offending group.
    index: usize,
  },
  /// A combined member reached the identifier builder without a resolved path.
  #[error("member `{handle}` of group {index} has no resolved path")]
  Unresolved {
    /// Index of the offending group.
    index: usize,
    /// Handle of the member.
    handle: String,
  },
  /// A member file could not be stat'ed right before URL construction.
  #[error("failed to read modification time of {}", .path.display())]
  Freshness {
    /// File that could not be read.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
}

/// Failures raised by the delivery endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
  /// A required query parameter is absent.
  #[error("missing query parameter `{0}`")]
  MissingParameter(&'static str),
  /// A query parameter could not be parsed.
  #[error("invalid value for query parameter `{name}`: {value}")]
  InvalidParameter {
    /// Parameter name.
    name: &'static str,
    /// Raw value received.
    value: String,
  },
  /// The encoded path list is not valid base64 or UTF-8.
  #[error("malformed path list")]
  MalformedPathList,
  /// The path list decoded to nothing.
  #[error("empty path list")]
  EmptyPathList,
  /// A listed path is not root-relative or contains traversal segments.
  #[error("path `{0}` is not a root-relative stylesheet path")]
  InvalidPath(String),
  /// A listed path resolves outside the trusted root.
  #[error("path `{0}` escapes the trusted root")]
  OutsideRoot(String),
  /// A listed file is missing.
  #[error("file `{0}` not found")]
  NotFound(String),
  /// The trusted root itself could not be resolved.
  #[error("trusted root {} is unavailable", .path.display())]
  Root {
    /// Configured root.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Reading a listed file failed.
  #[error("failed to read {}", .path.display())]
  Io {
    /// File that failed.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
}

impl DeliveryError {
  /// HTTP status code a front controller should answer with.
  pub fn status(&self) -> u16 {
    match self {
      Self::MissingParameter(_)
      | Self::InvalidParameter { .. }
      | Self::MalformedPathList
      | Self::EmptyPathList => 400,
      Self::InvalidPath(_) | Self::OutsideRoot(_) => 403,
      Self::NotFound(_) => 404,
      Self::Root { .. } | Self::Io { .. } => 500,
    }
  }
}
