use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, warn};
use yarnlock_core::metadata::Metadata;
use yarnlock_core::{
  AnalyzeOptions, LocalPackage, Lockfile, LockfileKind, LockfileQuery, PackageJson,
};

#[derive(Serialize)]
struct Dump<'a> {
  kind: LockfileKind,
  metadata: Option<&'a Metadata>,
  packages: BTreeMap<String, Vec<LockfileQuery>>,
}

async fn load(path: &Path) -> Result<Lockfile> {
  Lockfile::load(path)
    .await
    .with_context(|| format!("failed to load {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

pub async fn dump(path: &Path) -> Result<()> {
  let lockfile = load(path).await?;
  let packages = lockfile
    .keys()
    .into_iter()
    .map(|name| {
      let queries = lockfile.get(&name);
      (name, queries)
    })
    .collect();

  print_json(&Dump {
    kind: lockfile.kind(),
    metadata: lockfile.metadata(),
    packages,
  })
}

/// Read a workspace manifest, keyed by its package name
async fn read_local_package(path: &Path) -> Result<(String, LocalPackage)> {
  let contents = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read {}", path.display()))?;
  let package_json: PackageJson = serde_json::from_str(&contents)
    .with_context(|| format!("failed to parse {}", path.display()))?;
  let name = package_json
    .name
    .clone()
    .ok_or_else(|| anyhow!("{} has no name", path.display()))?;
  Ok((name, LocalPackage::from(package_json)))
}

pub async fn dedupe(
  path: &Path,
  locals: &[PathBuf],
  filter: Vec<String>,
  write: bool,
) -> Result<()> {
  let mut lockfile = load(path).await?;

  let mut options = AnalyzeOptions::new();
  for local in locals {
    let (name, package) = read_local_package(local).await?;
    options = options.with_local_package(name, package);
  }
  if !filter.is_empty() {
    let names: HashSet<String> = filter.into_iter().collect();
    options = options.with_filter(move |name| names.contains(name));
  }

  let result = lockfile
    .analyze(&options)
    .with_context(|| format!("failed to analyze {}", path.display()))?;
  for invalid in &result.invalid_ranges {
    warn!(name = %invalid.name, range = %invalid.range, "range can't be deduplicated");
  }
  print_json(&result)?;

  if !write {
    return Ok(());
  }
  if result.new_versions.is_empty() && result.new_ranges.is_empty() {
    info!("nothing to deduplicate");
    return Ok(());
  }

  lockfile
    .apply(&result)
    .with_context(|| format!("failed to apply changes to {}", path.display()))?;
  lockfile
    .save(path)
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  info!(
    path = %path.display(),
    versions = result.new_versions.len(),
    ranges = result.new_ranges.len(),
    "wrote deduplicated lockfile"
  );
  Ok(())
}

pub async fn diff(path: &Path, baseline: &Path) -> Result<()> {
  let (lockfile, baseline) = tokio::try_join!(load(path), load(baseline))?;
  print_json(&lockfile.diff(&baseline))
}

pub async fn graph(path: &Path) -> Result<()> {
  let lockfile = load(path).await?;
  print_json(&lockfile.create_simplified_dependency_graph())
}
