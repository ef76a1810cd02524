use crate::format::LockfileKind;
use crate::ident::{Descriptor, split_protocol};
use crate::serialize::{line_ending, render_key, render_pair};

/// Fields whose nested lines are `name range` pairs
pub(crate) const DEPENDENCY_FIELDS: [&str; 3] =
  ["dependencies", "peerDependencies", "optionalDependencies"];

/// The value half of a [`Field`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
  /// `version "1.0.0"` / `version: 1.0.0`
  Scalar { value: String, quoted: bool },
  /// A dependency map, one item per nested line
  Map(Vec<MapItem>),
  /// Any other nested mapping (`peerDependenciesMeta`, `bin`, ...), kept verbatim
  Block(String),
}

/// One top-level field of an entry, together with the text it was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
  key: String,
  line: String,
  value: FieldValue,
}

impl Field {
  pub(crate) fn new(key: String, line: &str, value: FieldValue) -> Self {
    Self {
      key,
      line: line.to_string(),
      value,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn value(&self) -> &FieldValue {
    &self.value
  }

  pub fn as_scalar(&self) -> Option<&str> {
    match &self.value {
      FieldValue::Scalar { value, .. } => Some(value),
      _ => None,
    }
  }

  fn items(&self) -> &[MapItem] {
    match &self.value {
      FieldValue::Map(items) => items,
      _ => &[],
    }
  }

  fn render(&self, out: &mut String) {
    out.push_str(&self.line);
    match &self.value {
      FieldValue::Scalar { .. } => {}
      FieldValue::Map(items) => items.iter().for_each(|item| out.push_str(&item.line)),
      FieldValue::Block(raw) => out.push_str(raw),
    }
  }
}

/// A `name range` line inside a dependency map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapItem {
  name: String,
  name_raw: String,
  indent: String,
  value: String,
  quoted: bool,
  line: String,
}

impl MapItem {
  pub(crate) fn new(
    name_raw: &str,
    name: String,
    indent: &str,
    value: String,
    quoted: bool,
    line: &str,
  ) -> Self {
    Self {
      name,
      name_raw: name_raw.to_string(),
      indent: indent.to_string(),
      value,
      quoted,
      line: line.to_string(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The range as written, protocol included (`npm:^1.0.0`, `workspace:^`)
  pub fn range(&self) -> &str {
    &self.value
  }

  fn set_range(&mut self, kind: LockfileKind, range: &str) {
    self.line = render_pair(
      kind,
      &self.indent,
      &self.name_raw,
      range,
      self.quoted,
      line_ending(&self.line),
    );
    self.value = range.to_string();
  }
}

/// A lockfile block: one or more descriptors sharing a single resolution.
///
/// Besides the parsed descriptors and fields, the entry keeps the exact text
/// of every line, so an untouched entry renders back byte for byte and a
/// changed one only re-renders the lines that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  descriptors: Vec<Descriptor>,
  key: String,
  fields: Vec<Field>,
  /// Blank lines (and comments) between this block and the next one
  gap: String,
}

impl Entry {
  pub(crate) fn new(descriptors: Vec<Descriptor>, key: &str, fields: Vec<Field>) -> Self {
    Self {
      descriptors,
      key: key.to_string(),
      fields,
      gap: String::new(),
    }
  }

  pub fn descriptors(&self) -> &[Descriptor] {
    &self.descriptors
  }

  pub fn fields(&self) -> &[Field] {
    &self.fields
  }

  /// The descriptors as written in the key, joined by `, ` and without quotes
  pub fn data_key(&self) -> String {
    self
      .descriptors
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join(", ")
  }

  pub fn field(&self, key: &str) -> Option<&Field> {
    self.fields.iter().find(|field| field.key == key)
  }

  pub fn scalar(&self, key: &str) -> Option<&str> {
    self.field(key).and_then(Field::as_scalar)
  }

  /// The resolved version. Every parsed entry carries one.
  pub fn version(&self) -> &str {
    self.scalar("version").unwrap_or_default()
  }

  /// `integrity` in classic lockfiles, `checksum` in modern ones
  pub fn checksum(&self) -> Option<&str> {
    self.scalar("integrity").or_else(|| self.scalar("checksum"))
  }

  /// Tarball URL, classic lockfiles and some modern ones
  pub fn resolved(&self) -> Option<&str> {
    self.scalar("resolved")
  }

  /// Locator of the resolved package, modern lockfiles only
  pub fn resolution(&self) -> Option<&str> {
    self.scalar("resolution")
  }

  pub fn dependencies(&self) -> &[MapItem] {
    self.map_items("dependencies")
  }

  pub fn peer_dependencies(&self) -> &[MapItem] {
    self.map_items("peerDependencies")
  }

  fn map_items(&self, key: &str) -> &[MapItem] {
    self.field(key).map(Field::items).unwrap_or_default()
  }

  pub(crate) fn position(&self, name: &str, range: &str) -> Option<usize> {
    self
      .descriptors
      .iter()
      .position(|d| d.ident().matches(name) && d.range() == range)
  }

  pub(crate) fn has_name(&self, name: &str) -> bool {
    self.descriptors.iter().any(|d| d.ident().matches(name))
  }

  /// Smallest descriptor text, the order yarn v1 writes entries in
  pub(crate) fn sort_key(&self) -> String {
    self
      .descriptors
      .iter()
      .map(ToString::to_string)
      .min()
      .unwrap_or_default()
  }

  pub(crate) fn gap(&self) -> &str {
    &self.gap
  }

  pub(crate) fn set_gap(&mut self, gap: String) {
    self.gap = gap;
  }

  pub(crate) fn take_gap(&mut self) -> String {
    std::mem::take(&mut self.gap)
  }

  /// Take over every field of `resolved` (version, resolution, checksum,
  /// dependencies), keeping this entry's key line
  pub(crate) fn resolve_as(&mut self, resolved: &Self) {
    self.fields.clone_from(&resolved.fields);
  }

  /// Move the descriptor at `index` into an entry of its own that resolves
  /// like `resolved`. The new entry inherits the gap that followed this one.
  pub(crate) fn split_off(&mut self, kind: LockfileKind, index: usize, resolved: &Self) -> Self {
    let descriptor = self.remove_descriptor(kind, index);
    let descriptors = vec![descriptor];
    let key = render_key(kind, &descriptors, line_ending(&self.key));
    Self {
      descriptors,
      key,
      fields: resolved.fields.clone(),
      gap: self.take_gap(),
    }
  }

  pub(crate) fn remove_descriptor(&mut self, kind: LockfileKind, index: usize) -> Descriptor {
    let removed = self.descriptors.remove(index);
    self.rekey(kind);
    removed
  }

  pub(crate) fn insert_descriptor(&mut self, kind: LockfileKind, descriptor: Descriptor) {
    self.descriptors.push(descriptor);
    if kind == LockfileKind::Classic {
      self.descriptors.sort_by_cached_key(ToString::to_string);
    }
    self.rekey(kind);
  }

  fn rekey(&mut self, kind: LockfileKind) {
    self.key = render_key(kind, &self.descriptors, line_ending(&self.key));
  }

  /// Point every dependency-map reference to `name@old_range` at `new_range`,
  /// keeping the protocol prefix of each reference. Returns how many changed.
  pub(crate) fn rewrite_dependency_ranges(
    &mut self,
    kind: LockfileKind,
    name: &str,
    old_range: &str,
    new_range: &str,
  ) -> usize {
    let mut rewritten = 0;
    for field in &mut self.fields {
      if !DEPENDENCY_FIELDS.contains(&field.key.as_str()) {
        continue;
      }
      let FieldValue::Map(items) = &mut field.value else {
        continue;
      };
      for item in items.iter_mut().filter(|item| item.name == name) {
        let (protocol, range) = split_protocol(&item.value);
        if range != old_range {
          continue;
        }
        let replacement = match protocol {
          Some(protocol) => format!("{protocol}:{new_range}"),
          None => new_range.to_string(),
        };
        item.set_range(kind, &replacement);
        rewritten += 1;
      }
    }
    rewritten
  }

  pub(crate) fn render(&self, out: &mut String) {
    out.push_str(&self.key);
    self.fields.iter().for_each(|field| field.render(out));
  }
}
