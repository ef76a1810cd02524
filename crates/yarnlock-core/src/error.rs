//! Error types for yarnlock-core

use thiserror::Error;

/// Result type alias using the yarnlock-core [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, analyzing or rewriting a lockfile
#[derive(Debug, Error)]
pub enum Error {
  /// Neither the classic banner nor a `__metadata` block was found
  #[error("unrecognized lockfile format: expected `# yarn lockfile v1` or a `__metadata:` block")]
  Format,

  /// Structural parse failure, `line` is 1-based
  #[error("failed to parse yarn.lock at line {line}: {message}")]
  Parse { line: usize, message: String },

  /// A descriptor without a resolvable name and range
  #[error("invalid descriptor '{0}'")]
  InvalidDescriptor(String),

  /// A range that is not a valid semantic-version range
  #[error("invalid range '{range}' for {name}: {message}")]
  InvalidRange {
    name: String,
    range: String,
    message: String,
  },

  /// A resolved version that is not a valid semantic version
  #[error("invalid version '{version}' for {name}: {message}")]
  InvalidVersion {
    name: String,
    version: String,
    message: String,
  },

  /// A package resolved to the use-local sentinel has no local package
  #[error("no local package found for {0}")]
  MissingLocalPackage(String),

  /// A local package whose manifest carries no version
  #[error("no version found for local package {0}")]
  MissingLocalVersion(String),

  /// A change refers to a `(name, range)` pair that isn't in the lockfile
  #[error("no entry data for {name}@{range}")]
  UnknownDescriptor { name: String, range: String },

  /// A change was computed against a different version than the one locked
  #[error("expected existing version data for {name}@{range} to be {expected}, was {actual}")]
  VersionMismatch {
    name: String,
    range: String,
    expected: String,
    actual: String,
  },

  /// No entry exists that already resolves the package to the new version
  #[error("no matching entry found for {name} at version {version}")]
  NoMatchingEntry { name: String, version: String },

  /// IO error from loading or saving a lockfile
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
    Self::Parse {
      line,
      message: message.into(),
    }
  }
}
