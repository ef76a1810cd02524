//! Duplicate detection.
//!
//! For every package, ranges are matched against the versions already present
//! in the lockfile, so that a range is moved onto the greatest version it
//! accepts, and ranges that can't accept that version are pointed at a range
//! that does.

use std::collections::{HashMap, HashSet};
use std::fmt;

use node_semver::{Range, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::ident::Descriptor;
use crate::lockfile::Lockfile;
use crate::package::Entry;

/// Version yarn records for packages resolved from the workspace
pub const USE_LOCAL_VERSION: &str = "0.0.0-use.local";

/// The subset of a `package.json` the analyzer reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageJson {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub version: Option<String>,
}

/// A workspace package, resolved locally rather than from a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPackage {
  pub package_json: PackageJson,
}

impl LocalPackage {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      package_json: PackageJson {
        name: None,
        version: Some(version.into()),
      },
    }
  }
}

impl From<PackageJson> for LocalPackage {
  fn from(package_json: PackageJson) -> Self {
    Self { package_json }
  }
}

type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Inputs to [`Lockfile::analyze`]
#[derive(Default)]
pub struct AnalyzeOptions {
  /// Workspace packages by name
  pub local_packages: HashMap<String, LocalPackage>,
  /// Only packages for which this returns `true` are analyzed
  pub filter: Option<NameFilter>,
}

impl AnalyzeOptions {
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_local_package(mut self, name: impl Into<String>, package: LocalPackage) -> Self {
    self.local_packages.insert(name.into(), package);
    self
  }

  #[must_use]
  pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
    self.filter = Some(Box::new(filter));
    self
  }

  fn includes(&self, name: &str) -> bool {
    self.filter.as_ref().is_none_or(|filter| filter(name))
  }
}

impl fmt::Debug for AnalyzeOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AnalyzeOptions")
      .field("local_packages", &self.local_packages)
      .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
      .finish()
  }
}

/// A range that should resolve to a version already present in the lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionChange {
  pub name: String,
  pub range: String,
  pub old_version: String,
  pub new_version: String,
}

/// A range that can't accept the newest version, and the range that should
/// replace it so that the package deduplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeChange {
  pub name: String,
  pub old_range: String,
  pub new_range: String,
  pub old_version: String,
  pub new_version: String,
}

/// A range that isn't a valid semver range, or that no locked version satisfies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRange {
  pub name: String,
  pub range: String,
}

/// Proposed changes, free of references into the lockfile so it can be
/// printed, stored, and applied later with [`Lockfile::apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
  pub invalid_ranges: Vec<InvalidRange>,
  pub new_ranges: Vec<RangeChange>,
  pub new_versions: Vec<VersionChange>,
}

impl AnalyzeResult {
  pub fn is_empty(&self) -> bool {
    self.invalid_ranges.is_empty() && self.new_ranges.is_empty() && self.new_versions.is_empty()
  }
}

/// A version present in the lockfile, and the version to compare it as
#[derive(Debug)]
struct LockedVersion<'a> {
  /// As written in the lockfile, possibly [`USE_LOCAL_VERSION`]
  locked: &'a str,
  effective: Version,
}

impl LockedVersion<'_> {
  fn is_local(&self) -> bool {
    self.locked == USE_LOCAL_VERSION
  }
}

#[derive(Debug)]
struct Candidate<'a> {
  range_text: &'a str,
  range: Range,
  version: &'a str,
}

impl Lockfile {
  /// Find ranges that can share a version already present in the lockfile
  pub fn analyze(&self, options: &AnalyzeOptions) -> Result<AnalyzeResult> {
    let mut result = AnalyzeResult::default();

    for (name, refs) in self.packages() {
      if !options.includes(&name) {
        continue;
      }
      analyze_package(&name, &refs, options, &mut result)?;
    }

    debug!(
      new_versions = result.new_versions.len(),
      new_ranges = result.new_ranges.len(),
      invalid_ranges = result.invalid_ranges.len(),
      "analyzed lockfile"
    );
    Ok(result)
  }
}

fn analyze_package(
  name: &str,
  refs: &[(&Descriptor, &Entry)],
  options: &AnalyzeOptions,
  result: &mut AnalyzeResult,
) -> Result<()> {
  let mut candidates = Vec::new();
  for (descriptor, entry) in refs {
    // Workspace descriptors pin to a path, there is nothing to deduplicate
    if descriptor.is_workspace() {
      continue;
    }
    match Range::parse(descriptor.range()) {
      Ok(range) => candidates.push(Candidate {
        range_text: descriptor.range(),
        range,
        version: entry.version(),
      }),
      Err(_) => result.invalid_ranges.push(InvalidRange {
        name: name.to_string(),
        range: descriptor.range().to_string(),
      }),
    }
  }
  if candidates.len() < 2 {
    return Ok(());
  }

  let versions = locked_versions(name, &candidates, options)?;
  if versions.len() < 2 {
    return Ok(());
  }

  // Each range moves to the greatest version it accepts
  let mut accepted_ranges = Vec::new();
  let mut accepted_versions: HashSet<&str> = HashSet::new();
  for candidate in &candidates {
    let Some(accepted) = versions.iter().find(|v| candidate.range.satisfies(&v.effective)) else {
      trace!(name, range = candidate.range_text, "no locked version satisfies range");
      result.invalid_ranges.push(InvalidRange {
        name: name.to_string(),
        range: candidate.range_text.to_string(),
      });
      continue;
    };

    if accepted.locked != candidate.version {
      trace!(
        name,
        range = candidate.range_text,
        from = candidate.version,
        to = accepted.locked,
        "proposing new version"
      );
      result.new_versions.push(VersionChange {
        name: name.to_string(),
        range: candidate.range_text.to_string(),
        old_version: candidate.version.to_string(),
        new_version: accepted.locked.to_string(),
      });
    }
    accepted_versions.insert(accepted.locked);
    accepted_ranges.push(candidate);
  }

  // Every range agrees on one version, the package is deduplicated
  if accepted_versions.len() < 2 {
    return Ok(());
  }

  let Some(max) = versions.iter().find(|v| accepted_versions.contains(v.locked)) else {
    return Ok(());
  };

  // The strictest range that accepts the max version, i.e. the one with the
  // highest minimum version. Ties go to the first range in file order.
  let mut target: Option<(&Candidate<'_>, Version)> = None;
  for candidate in accepted_ranges.iter().filter(|c| c.range.satisfies(&max.effective)) {
    let Some(min) = candidate.range.min_version() else {
      continue;
    };
    if target.as_ref().is_none_or(|(_, best)| min > *best) {
      target = Some((*candidate, min));
    }
  }
  let Some((target, _)) = target else {
    warn!(name, version = max.locked, "no range with a minimum version accepts the max version");
    return Ok(());
  };

  for candidate in accepted_ranges
    .iter()
    .filter(|c| !c.range.satisfies(&max.effective))
  {
    trace!(
      name,
      from = candidate.range_text,
      to = target.range_text,
      "proposing new range"
    );
    result.new_ranges.push(RangeChange {
      name: name.to_string(),
      old_range: candidate.range_text.to_string(),
      new_range: target.range_text.to_string(),
      old_version: candidate.version.to_string(),
      new_version: max.locked.to_string(),
    });
  }

  Ok(())
}

/// The distinct versions the candidates resolve to, greatest first. The
/// use-local sentinel compares as the local package's manifest version and
/// wins ties against the same registry version.
fn locked_versions<'a>(
  name: &str,
  candidates: &[Candidate<'a>],
  options: &AnalyzeOptions,
) -> Result<Vec<LockedVersion<'a>>> {
  let mut seen = HashSet::new();
  let mut versions = Vec::new();

  for candidate in candidates {
    if !seen.insert(candidate.version) {
      continue;
    }
    let effective = if candidate.version == USE_LOCAL_VERSION {
      let local = options
        .local_packages
        .get(name)
        .ok_or_else(|| Error::MissingLocalPackage(name.to_string()))?;
      local
        .package_json
        .version
        .as_deref()
        .ok_or_else(|| Error::MissingLocalVersion(name.to_string()))?
    } else {
      candidate.version
    };
    let effective = Version::parse(effective).map_err(|e| Error::InvalidVersion {
      name: name.to_string(),
      version: effective.to_string(),
      message: e.to_string(),
    })?;
    versions.push(LockedVersion {
      locked: candidate.version,
      effective,
    });
  }

  versions.sort_by(|a, b| {
    b.effective
      .cmp(&a.effective)
      .then_with(|| b.is_local().cmp(&a.is_local()))
  });
  Ok(versions)
}
