//! Applying [`AnalyzeResult`] changes to a lockfile.
//!
//! Classic lockfiles hold one entry per resolution, so a range moved to
//! another version joins the key of the entry that already resolves to it.
//! Modern lockfiles keep one block per key instead: the moved descriptor's
//! block takes over the fields of the entry it now resolves like, and a
//! descriptor that shares its key with others is split out first.

use node_semver::Range;
use tracing::{debug, trace};

use crate::analyze::{AnalyzeResult, RangeChange, VersionChange};
use crate::error::{Error, Result};
use crate::format::LockfileKind;
use crate::lockfile::Lockfile;

impl Lockfile {
  /// Point each `(name, range)` at a version already present in the lockfile.
  ///
  /// A change whose range already resolves to `new_version` is skipped.
  pub fn replace_versions(&mut self, changes: &[VersionChange]) -> Result<()> {
    let kind = self.kind();
    let mut moved = false;

    for change in changes {
      let (index, position) = self
        .find(&change.name, &change.range)
        .ok_or_else(|| Error::UnknownDescriptor {
          name: change.name.clone(),
          range: change.range.clone(),
        })?;

      let current = self.entries()[index].version();
      if current == change.new_version {
        trace!(name = %change.name, range = %change.range, "range already at new version");
        continue;
      }
      if current != change.old_version {
        return Err(Error::VersionMismatch {
          name: change.name.clone(),
          range: change.range.clone(),
          expected: change.old_version.clone(),
          actual: current.to_string(),
        });
      }

      let target = self
        .entries()
        .iter()
        .enumerate()
        .position(|(i, entry)| {
          i != index && entry.has_name(&change.name) && entry.version() == change.new_version
        })
        .ok_or_else(|| Error::NoMatchingEntry {
          name: change.name.clone(),
          version: change.new_version.clone(),
        })?;

      match kind {
        LockfileKind::Classic => {
          let entries = self.entries_mut();
          let descriptor = entries[index].remove_descriptor(kind, position);
          entries[target].insert_descriptor(kind, descriptor);
          if entries[index].descriptors().is_empty() {
            entries.remove(index);
          }
          moved = true;
        }
        LockfileKind::Modern => {
          let resolved = self.entries()[target].clone();
          let entries = self.entries_mut();
          if entries[index].descriptors().len() == 1 {
            entries[index].resolve_as(&resolved);
          } else {
            let split = entries[index].split_off(kind, position, &resolved);
            entries.insert(index + 1, split);
          }
        }
      }
      debug!(
        name = %change.name,
        range = %change.range,
        from = %change.old_version,
        to = %change.new_version,
        "replaced version"
      );
    }

    if moved {
      self.sort_entries();
    }
    Ok(())
  }

  /// Drop each old range and point every dependency on it at the new range.
  ///
  /// The new range must be a semver range already in the lockfile at
  /// `new_version`.
  pub fn replace_ranges(&mut self, changes: &[RangeChange]) -> Result<()> {
    let kind = self.kind();
    let mut changed = false;

    for change in changes {
      if let Err(e) = Range::parse(&change.new_range) {
        return Err(Error::InvalidRange {
          name: change.name.clone(),
          range: change.new_range.clone(),
          message: e.to_string(),
        });
      }

      let (index, position) = self
        .find(&change.name, &change.old_range)
        .ok_or_else(|| Error::UnknownDescriptor {
          name: change.name.clone(),
          range: change.old_range.clone(),
        })?;

      let current = self.entries()[index].version();
      if current != change.old_version {
        return Err(Error::VersionMismatch {
          name: change.name.clone(),
          range: change.old_range.clone(),
          expected: change.old_version.clone(),
          actual: current.to_string(),
        });
      }

      let (target, _) = self
        .find(&change.name, &change.new_range)
        .ok_or_else(|| Error::UnknownDescriptor {
          name: change.name.clone(),
          range: change.new_range.clone(),
        })?;
      if self.entries()[target].version() != change.new_version {
        return Err(Error::NoMatchingEntry {
          name: change.name.clone(),
          version: change.new_version.clone(),
        });
      }

      let entries = self.entries_mut();
      entries[index].remove_descriptor(kind, position);
      if entries[index].descriptors().is_empty() {
        entries.remove(index);
      }

      let rewritten: usize = entries
        .iter_mut()
        .map(|entry| {
          entry.rewrite_dependency_ranges(kind, &change.name, &change.old_range, &change.new_range)
        })
        .sum();
      changed = true;

      debug!(
        name = %change.name,
        from = %change.old_range,
        to = %change.new_range,
        rewritten,
        "replaced range"
      );
    }

    if changed {
      self.sort_entries();
    }
    Ok(())
  }

  /// Apply a full analysis, versions first and then ranges
  pub fn apply(&mut self, result: &AnalyzeResult) -> Result<()> {
    self.replace_versions(&result.new_versions)?;
    self.replace_ranges(&result.new_ranges)
  }

  /// yarn v1 writes entries ordered by their smallest descriptor. Modern
  /// lockfiles are never reordered.
  fn sort_entries(&mut self) {
    if self.kind() == LockfileKind::Classic {
      self.entries_mut().sort_by_cached_key(|entry| entry.sort_key());
    }
  }
}
