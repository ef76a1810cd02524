use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lockfile::Lockfile;
use crate::package::Entry;

/// A `(name, range)` pair, the range without its `npm:` protocol
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageRange {
  pub name: String,
  pub range: String,
}

impl PackageRange {
  pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      range: range.into(),
    }
  }
}

/// Differences between two lockfiles, each list sorted by name and range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
  /// Present in this lockfile only
  pub added: Vec<PackageRange>,
  /// Present in both, resolved differently
  pub changed: Vec<PackageRange>,
  /// Present in the other lockfile only
  pub removed: Vec<PackageRange>,
}

impl DiffResult {
  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
  }
}

impl Lockfile {
  /// Compare this lockfile against `other`, which is treated as the baseline.
  ///
  /// Lockfiles of different grammars compare by content: `integrity` and
  /// `checksum` are the same thing, and `resolved` only counts when both
  /// sides record it.
  pub fn diff(&self, other: &Self) -> DiffResult {
    let ours = self.by_range();
    let theirs = other.by_range();
    let mut result = DiffResult::default();

    for (key, entry) in &ours {
      match theirs.get(key) {
        None => result.added.push(key.clone()),
        Some(previous) if !same_resolution(entry, previous) => result.changed.push(key.clone()),
        Some(_) => {}
      }
    }
    result.removed = theirs
      .into_keys()
      .filter(|key| !ours.contains_key(key))
      .collect();

    debug!(
      added = result.added.len(),
      changed = result.changed.len(),
      removed = result.removed.len(),
      "diffed lockfiles"
    );
    result
  }

  fn by_range(&self) -> BTreeMap<PackageRange, &Entry> {
    self
      .entries()
      .iter()
      .flat_map(|entry| {
        entry
          .descriptors()
          .iter()
          .map(move |d| (PackageRange::new(d.ident().to_string(), d.range()), entry))
      })
      .collect()
  }
}

fn same_resolution(a: &Entry, b: &Entry) -> bool {
  if a.version() != b.version() || a.checksum() != b.checksum() {
    return false;
  }
  match (a.resolved(), b.resolved()) {
    (Some(a), Some(b)) => a == b,
    _ => true,
  }
}
