//! # yarnlock
//!
//! A format-preserving engine for `yarn.lock` files, covering both the classic
//! (yarn v1) and the modern (yarn berry) grammar.
//!
//! A [`Lockfile`] renders back exactly the text it was parsed from. Changes
//! made by [`Lockfile::replace_versions`] and [`Lockfile::replace_ranges`]
//! only re-render the lines they touch, so the diff stays reviewable.
//!
//! ```no_run
//! use yarnlock_core::{AnalyzeOptions, Lockfile};
//!
//! # async fn dedupe() -> yarnlock_core::error::Result<()> {
//! let mut lockfile = Lockfile::load("yarn.lock").await?;
//! let result = lockfile.analyze(&AnalyzeOptions::new())?;
//! lockfile.apply(&result)?;
//! lockfile.save("yarn.lock").await?;
//! # Ok(())
//! # }
//! ```
#![deny(clippy::all)]
pub mod analyze;
pub mod diff;
pub mod error;
pub mod format;
pub mod graph;
pub mod ident;
pub mod lockfile;
pub mod metadata;
pub mod package;
pub mod parse;
mod replace;
mod serialize;

pub use analyze::{
  AnalyzeOptions, AnalyzeResult, InvalidRange, LocalPackage, PackageJson, RangeChange,
  USE_LOCAL_VERSION, VersionChange,
};
pub use diff::{DiffResult, PackageRange};
pub use error::{Error, Result};
pub use format::LockfileKind;
pub use graph::DependencyGraph;
pub use lockfile::{Lockfile, LockfileQuery};
