use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::format::LockfileKind;
use crate::ident::Descriptor;
use crate::metadata::Metadata;
use crate::package::Entry;
use crate::parse::parse_lockfile;

/// One `(range, version)` record for a package, as returned by [`Lockfile::get`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileQuery {
  /// The range without its `npm:` / `workspace:` protocol
  pub range: String,
  /// The version the range resolves to
  pub version: String,
  /// The key of the entry holding the range, see [`Entry::data_key`]
  pub data_key: String,
}

/// A parsed yarn lockfile.
///
/// The lockfile keeps the text it was parsed from, so [`ToString::to_string`]
/// reproduces the input exactly until it is changed through
/// [`Lockfile::replace_versions`] or [`Lockfile::replace_ranges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockfile {
  kind: LockfileKind,
  /// Comment banner and, in modern lockfiles, the `__metadata` block
  header: String,
  metadata: Option<Metadata>,
  entries: Vec<Entry>,
  /// Text after the final entry
  footer: String,
}

impl Lockfile {
  pub(crate) fn from_parts(
    kind: LockfileKind,
    header: String,
    metadata: Option<Metadata>,
    entries: Vec<Entry>,
    footer: String,
  ) -> Self {
    Self {
      kind,
      header,
      metadata,
      entries,
      footer,
    }
  }

  /// Parse lockfile text of either grammar
  pub fn parse(contents: &str) -> Result<Self> {
    parse_lockfile(contents)
  }

  /// Read and parse the lockfile at `path`
  pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    debug!(path = %path.display(), bytes = contents.len(), "loaded lockfile");
    Self::parse(&contents)
  }

  /// Serialize and write the lockfile to `path`, replacing any existing file
  pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let contents = self.to_string();
    tokio::fs::write(path, contents.as_bytes()).await?;
    debug!(path = %path.display(), bytes = contents.len(), "saved lockfile");
    Ok(())
  }

  pub fn kind(&self) -> LockfileKind {
    self.kind
  }

  pub fn metadata(&self) -> Option<&Metadata> {
    self.metadata.as_ref()
  }

  pub fn entries(&self) -> &[Entry] {
    &self.entries
  }

  pub(crate) fn entries_mut(&mut self) -> &mut Vec<Entry> {
    &mut self.entries
  }

  pub(crate) fn header(&self) -> &str {
    &self.header
  }

  pub(crate) fn footer(&self) -> &str {
    &self.footer
  }

  /// Every range recorded for `name`, in file order
  pub fn get(&self, name: &str) -> Vec<LockfileQuery> {
    self
      .entries
      .iter()
      .flat_map(|entry| {
        entry
          .descriptors()
          .iter()
          .filter(move |descriptor| descriptor.ident().matches(name))
          .map(move |descriptor| LockfileQuery {
            range: descriptor.range().to_string(),
            version: entry.version().to_string(),
            data_key: entry.data_key(),
          })
      })
      .collect()
  }

  /// Package names in order of first appearance
  pub fn keys(&self) -> Vec<String> {
    self.packages().into_iter().map(|(name, _)| name).collect()
  }

  /// Descriptors grouped by package name, names in order of first appearance
  /// and descriptors in file order
  pub(crate) fn packages(&self) -> Vec<(String, Vec<(&Descriptor, &Entry)>)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut packages: Vec<(String, Vec<(&Descriptor, &Entry)>)> = Vec::new();

    for entry in &self.entries {
      for descriptor in entry.descriptors() {
        let name = descriptor.ident().to_string();
        let position = *positions.entry(name.clone()).or_insert_with(|| {
          packages.push((name, Vec::new()));
          packages.len() - 1
        });
        packages[position].1.push((descriptor, entry));
      }
    }

    packages
  }

  /// Locate the entry holding `name@range`: `(entry index, descriptor index)`
  pub(crate) fn find(&self, name: &str, range: &str) -> Option<(usize, usize)> {
    self
      .entries
      .iter()
      .enumerate()
      .find_map(|(index, entry)| entry.position(name, range).map(|position| (index, position)))
  }
}

impl std::str::FromStr for Lockfile {
  type Err = crate::error::Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::parse(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use pretty_assertions::assert_eq;

  const LEGACY_HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n";

  const MODERN_HEADER: &str = "# This file is generated by running \"yarn install\" inside your project.\n# Manual changes might be lost - proceed with caution!\n\n__metadata:\n  version: 6\n  cacheKey: 8\n";

  fn query(range: &str, version: &str, data_key: &str) -> LockfileQuery {
    LockfileQuery {
      range: range.to_string(),
      version: version.to_string(),
      data_key: data_key.to_string(),
    }
  }

  fn mock_a() -> String {
    format!(
      "{LEGACY_HEADER}\na@^1:\n  version \"1.0.1\"\n  resolved \"https://my-registry/a-1.0.01.tgz#abc123\"\n  integrity sha512-xyz\n  dependencies:\n    b \"^2\"\n\nb@2.0.x:\n  version \"2.0.1\"\n\nb@^2:\n  version \"2.0.0\"\n"
    )
  }

  fn mock_a_new() -> String {
    format!(
      "{MODERN_HEADER}\na@^1:\n  version: 1.0.1\n  dependencies:\n    b: ^2\n  integrity: sha512-xyz\n  resolved: \"https://my-registry/a-1.0.01.tgz#abc123\"\n\n\"b@2.0.x, b@^2.0.1\":\n  version: 2.0.1\n\nb@^2:\n  version: 2.0.0\n"
    )
  }

  #[test]
  fn test_get_classic() {
    let lockfile = Lockfile::parse(&mock_a()).unwrap();
    assert_eq!(lockfile.get("a"), vec![query("^1", "1.0.1", "a@^1")]);
    assert_eq!(
      lockfile.get("b"),
      vec![
        query("2.0.x", "2.0.1", "b@2.0.x"),
        query("^2", "2.0.0", "b@^2"),
      ]
    );
    assert!(lockfile.get("c").is_empty());
    assert_eq!(lockfile.to_string(), mock_a());
  }

  #[test]
  fn test_get_modern() {
    let lockfile = Lockfile::parse(&mock_a_new()).unwrap();
    assert_eq!(lockfile.get("a"), vec![query("^1", "1.0.1", "a@^1")]);
    assert_eq!(
      lockfile.get("b"),
      vec![
        query("2.0.x", "2.0.1", "b@2.0.x, b@^2.0.1"),
        query("^2.0.1", "2.0.1", "b@2.0.x, b@^2.0.1"),
        query("^2", "2.0.0", "b@^2"),
      ]
    );
    assert_eq!(lockfile.to_string(), mock_a_new());
  }

  #[test]
  fn test_get_strips_npm_protocol() {
    let contents =
      format!("{MODERN_HEADER}\n\"@s/a@npm:^1, @s/a@npm:^1.2.0\":\n  version: 1.2.0\n");
    let lockfile = Lockfile::parse(&contents).unwrap();
    assert_eq!(
      lockfile.get("@s/a"),
      vec![
        query("^1", "1.2.0", "@s/a@npm:^1, @s/a@npm:^1.2.0"),
        query("^1.2.0", "1.2.0", "@s/a@npm:^1, @s/a@npm:^1.2.0"),
      ]
    );
    assert_eq!(lockfile.keys(), vec!["@s/a".to_string()]);
  }

  #[test]
  fn test_keys_in_file_order() {
    let lockfile = Lockfile::parse(&mock_a()).unwrap();
    assert_eq!(lockfile.keys(), vec!["a".to_string(), "b".to_string()]);
  }

  #[tokio::test]
  async fn test_load_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yarn.lock");
    tokio::fs::write(&path, mock_a_new()).await.unwrap();

    let lockfile = Lockfile::load(&path).await.unwrap();
    assert_eq!(lockfile.kind(), LockfileKind::Modern);

    let copy = dir.path().join("copy.lock");
    lockfile.save(&copy).await.unwrap();
    assert_eq!(tokio::fs::read_to_string(&copy).await.unwrap(), mock_a_new());
  }

  #[tokio::test]
  async fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Lockfile::load(dir.path().join("missing.lock"))
      .await
      .unwrap_err();
    assert!(
      matches!(&err, Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound),
      "{err}"
    );
  }
}
