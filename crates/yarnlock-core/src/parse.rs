use std::collections::HashSet;

use nom::IResult;
use nom::{
  Parser,
  branch::alt,
  bytes::complete::{is_not, take_till1},
  character::complete::{anychar, char, space0, space1},
  combinator::{all_consuming, opt, recognize, rest, verify},
  multi::{many0, separated_list1},
  sequence::{pair, preceded},
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{LockfileKind, METADATA_KEY, detect};
use crate::ident::{Descriptor, Ident};
use crate::lockfile::Lockfile;
use crate::metadata::{Metadata, parse_metadata};
use crate::package::{DEPENDENCY_FIELDS, Entry, Field, FieldValue, MapItem};

/// Entrypoint for parsing a yarn lockfile of either grammar
pub fn parse_lockfile(file_contents: &str) -> Result<Lockfile> {
  let kind = detect(file_contents)?;
  let lines: Vec<&str> = file_contents.split_inclusive('\n').collect();

  let (header, metadata, mut index) = parse_header(&lines, kind)?;

  let mut entries: Vec<Entry> = Vec::new();
  let mut seen: HashSet<(String, String)> = HashSet::new();

  while index < lines.len() {
    let line_no = index + 1;
    let key_line = lines[index];
    if is_indented(key_line) {
      return Err(Error::parse(line_no, "indented line outside of an entry"));
    }

    let descriptors = parse_entry_key(content(key_line))
      .map_err(|message| Error::parse(line_no, message))?;
    for descriptor in &descriptors {
      let pair = (descriptor.ident().to_string(), descriptor.range().to_string());
      if !seen.insert(pair) {
        return Err(Error::parse(
          line_no,
          format!("duplicate descriptor '{descriptor}'"),
        ));
      }
    }
    index += 1;

    let body_start = index;
    while index < lines.len() && is_indented(lines[index]) {
      index += 1;
    }
    if body_start == index {
      return Err(Error::parse(line_no, "entry has no fields"));
    }
    let fields = parse_fields(&lines[body_start..index], body_start + 1, kind)?;

    let mut entry = Entry::new(descriptors, key_line, fields);
    if entry.scalar("version").is_none() {
      return Err(Error::parse(
        line_no,
        format!("entry '{}' has no version", entry.data_key()),
      ));
    }

    let gap_start = index;
    while index < lines.len() && is_gap(lines[index]) {
      index += 1;
    }
    entry.set_gap(lines[gap_start..index].concat());
    entries.push(entry);
  }

  // Whatever trails the final block belongs to the file, not to the entry
  let footer = entries.last_mut().map(Entry::take_gap).unwrap_or_default();

  debug!(
    kind = ?kind,
    entries = entries.len(),
    descriptors = seen.len(),
    "parsed lockfile"
  );

  Ok(Lockfile::from_parts(kind, header, metadata, entries, footer))
}

/// Collects the comment banner and, for modern lockfiles, the `__metadata` block.
/// Returns the verbatim header text and the index of the first entry line.
fn parse_header(
  lines: &[&str],
  kind: LockfileKind,
) -> Result<(String, Option<Metadata>, usize)> {
  let mut header = String::new();
  let mut metadata = None;
  let mut index = 0;

  while index < lines.len() {
    let line = lines[index];
    if is_gap(line) {
      header.push_str(line);
      index += 1;
      continue;
    }
    if kind == LockfileKind::Modern && content(line).trim_end() == METADATA_KEY {
      let start = index;
      index += 1;
      while index < lines.len() && is_indented(lines[index]) {
        index += 1;
      }
      let block = lines[start..index].concat();
      let (_, parsed) = parse_metadata(&block)
        .map_err(|e| Error::parse(start + 1, format!("invalid __metadata block: {e}")))?;
      metadata = parsed;
      header.push_str(&block);
      continue;
    }
    break;
  }

  Ok((header, metadata, index))
}

/// Parse the top-level fields of one entry body
fn parse_fields(lines: &[&str], first_line_no: usize, kind: LockfileKind) -> Result<Vec<Field>> {
  let base = indent_of(lines[0]);
  let mut fields = Vec::new();
  let mut index = 0;

  while index < lines.len() {
    let line_no = first_line_no + index;
    let line = lines[index];
    let indent = indent_of(line);
    if indent.len() != base.len() {
      return Err(Error::parse(line_no, "unexpected indentation"));
    }

    let (key_raw, value_raw) = parse_pair_line(content(line).trim_start(), kind)
      .ok_or_else(|| malformed(line_no, "field", line))?;
    let key = unquote(key_raw);

    let children_start = index + 1;
    index += 1;
    while index < lines.len() && indent_of(lines[index]).len() > base.len() {
      index += 1;
    }
    let children = &lines[children_start..index];

    let value = match value_raw {
      Some(raw) => {
        if !children.is_empty() {
          return Err(Error::parse(
            line_no,
            format!("field '{key}' has both a value and nested lines"),
          ));
        }
        let (value, quoted) = parse_scalar(raw)
          .ok_or_else(|| Error::parse(line_no, format!("malformed value for '{key}'")))?;
        FieldValue::Scalar { value, quoted }
      }
      None if DEPENDENCY_FIELDS.contains(&key.as_str()) => {
        FieldValue::Map(parse_map_items(children, line_no + 1, kind)?)
      }
      None => FieldValue::Block(children.concat()),
    };

    fields.push(Field::new(key, line, value));
  }

  Ok(fields)
}

/// Parse the nested `name range` lines of a dependency map
fn parse_map_items(
  lines: &[&str],
  first_line_no: usize,
  kind: LockfileKind,
) -> Result<Vec<MapItem>> {
  let Some(first) = lines.first() else {
    return Ok(Vec::new());
  };
  let base = indent_of(first);

  lines
    .iter()
    .enumerate()
    .map(|(offset, line)| {
      let line_no = first_line_no + offset;
      let indent = indent_of(line);
      if indent.len() != base.len() {
        return Err(Error::parse(line_no, "unexpected indentation in dependency map"));
      }
      let invalid = || malformed(line_no, "dependency", line);
      let (name_raw, value_raw) =
        parse_pair_line(content(line).trim_start(), kind).ok_or_else(invalid)?;
      let (value, quoted) = value_raw.and_then(parse_scalar).ok_or_else(invalid)?;
      Ok(MapItem::new(name_raw, unquote(name_raw), indent, value, quoted, line))
    })
    .collect()
}

/// A double-quoted token, escapes included, e.g. `"@s/a@1 || 2"`
fn quoted_token(input: &str) -> IResult<&str, &str> {
  recognize((
    char('"'),
    many0(alt((is_not("\\\""), recognize(pair(char('\\'), anychar))))),
    char('"'),
  ))
  .parse(input)
}

/// Classic: `version "1.0.0"` or `dependencies:`
fn classic_pair(input: &str) -> IResult<&str, (&str, Option<&str>)> {
  let (remaining, key) = alt((quoted_token, is_not(" \t"))).parse(input)?;
  let (remaining, value) = opt(field_value).parse(remaining)?;
  Ok((remaining, (key, value)))
}

/// Modern: `version: 1.0.0`, `"@types/react": ^17.0.0` or `dependencies:`
fn modern_pair(input: &str) -> IResult<&str, (&str, Option<&str>)> {
  let (remaining, (key, _)) =
    (alt((quoted_token, take_till1(|c: char| c == ':'))), char(':')).parse(input)?;
  let (remaining, value) = opt(field_value).parse(remaining)?;
  Ok((remaining, (key, value)))
}

/// Whatever follows the separating whitespace, as long as it isn't blank
fn field_value(input: &str) -> IResult<&str, &str> {
  preceded(space1, verify(rest, |v: &str| !v.trim().is_empty())).parse(input)
}

/// Split a field line into its raw key and raw value. Nested keys come back
/// without a value and, for classic lockfiles, without their trailing `:`.
fn parse_pair_line(line: &str, kind: LockfileKind) -> Option<(&str, Option<&str>)> {
  match kind {
    LockfileKind::Classic => {
      let (_, (key, value)) = all_consuming(classic_pair).parse(line).ok()?;
      match value {
        Some(value) => Some((key, Some(value))),
        None => key.strip_suffix(':').map(|key| (key, None)),
      }
    }
    LockfileKind::Modern => {
      let (rest, (key, value)) = modern_pair(line).ok()?;
      (rest.trim().is_empty() && !key.trim().is_empty()).then_some((key.trim_end(), value))
    }
  }
}

/// A scalar is either a complete quoted token or bare text
fn parse_scalar(raw: &str) -> Option<(String, bool)> {
  let raw = raw.trim();
  if raw.starts_with('"') {
    let (_, token) = all_consuming(quoted_token).parse(raw).ok()?;
    Some((unquote(token), true))
  } else {
    Some((raw.to_string(), false))
  }
}

/// Decode a quoted token with JSON escaping, bare text is returned as is
pub(crate) fn unquote(token: &str) -> String {
  if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
    serde_json::from_str(token).unwrap_or_else(|_| token[1..token.len() - 1].to_string())
  } else {
    token.to_string()
  }
}

/// Parse a key line into its descriptors.
///
/// Handles the classic form, where every descriptor is quoted on its own
/// (`"@s/a@*", "@s/a@^1":`), and the modern form, where the whole list is a
/// single quoted scalar (`"b@npm:2.0.x, b@npm:^2":`).
fn parse_entry_key(line: &str) -> std::result::Result<Vec<Descriptor>, String> {
  let key = line
    .trim_end()
    .strip_suffix(':')
    .ok_or_else(|| format!("expected ':' at the end of '{line}'"))?;

  let (_, tokens) = all_consuming(separated_list1(
    (space0, char(','), space0),
    alt((quoted_token, take_till1(|c: char| c == ','))),
  ))
  .parse(key)
  .map_err(|_| format!("malformed entry key '{key}'"))?;

  let mut descriptors = Vec::new();
  for token in tokens {
    for part in unquote(token.trim()).split(',') {
      let part = part.trim();
      let descriptor =
        parse_descriptor(part).ok_or_else(|| format!("invalid descriptor '{part}'"))?;
      descriptors.push(descriptor);
    }
  }
  Ok(descriptors)
}

/// Parse a package name, which can be scoped (@babel/code-frame) or simple (debug)
fn parse_package_name(input: &str) -> IResult<&str, &str> {
  alt((
    // Scoped package: @scope/name
    recognize((
      char('@'),
      take_till1(|c: char| c == '/' || c == '@'),
      char('/'),
      take_till1(|c: char| c == '/' || c == '@'),
    )),
    // Simple package name
    take_till1(|c: char| c == '/' || c == '@'),
  ))
  .parse(input)
}

/// Parse a descriptor such as `debug@npm:1.0.0`, `@babel/core@^7` or
/// `a@workspace:packages/a`. The range is everything after the `@` that
/// follows the (possibly scoped) name.
pub(crate) fn parse_descriptor(input: &str) -> Option<Descriptor> {
  let (_, (name, _, range)) = all_consuming((
    parse_package_name,
    char('@'),
    verify(rest, |r: &str| !r.is_empty()),
  ))
  .parse(input)
  .ok()?;

  Some(Descriptor::new(Ident::from_full_name(name), range.to_string()))
}

fn malformed(line_no: usize, what: &str, line: &str) -> Error {
  Error::parse(line_no, format!("malformed {what} '{}'", content(line).trim()))
}

/// The line without its line ending
fn content(line: &str) -> &str {
  line.trim_end_matches(['\r', '\n'])
}

fn is_blank(line: &str) -> bool {
  content(line).trim().is_empty()
}

fn is_indented(line: &str) -> bool {
  !is_blank(line) && line.starts_with([' ', '\t'])
}

/// Blank lines and top-level comments separate entries
fn is_gap(line: &str) -> bool {
  is_blank(line) || line.starts_with('#')
}

fn indent_of(line: &str) -> &str {
  let trimmed = line.trim_start_matches([' ', '\t']);
  &line[..line.len() - trimmed.len()]
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  const LEGACY_HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n";

  const MODERN_HEADER: &str = "# This file is generated by running \"yarn install\" inside your project.\n# Manual changes might be lost - proceed with caution!\n\n__metadata:\n  version: 6\n  cacheKey: 8\n";

  #[test]
  fn test_parse_descriptor_simple() {
    let descriptor = parse_descriptor("debug@npm:1.0.0").unwrap();
    assert_eq!(descriptor.ident().name(), "debug");
    assert_eq!(descriptor.ident().scope(), None);
    assert_eq!(descriptor.range(), "1.0.0");
    assert_eq!(descriptor.protocol(), Some("npm"));
  }

  #[test]
  fn test_parse_descriptor_scoped_package() {
    let descriptor = parse_descriptor("@babel/code-frame@npm:7.12.11").unwrap();
    assert_eq!(descriptor.ident().name(), "code-frame");
    assert_eq!(descriptor.ident().scope(), Some("@babel"));
    assert_eq!(descriptor.range(), "7.12.11");
  }

  #[test]
  fn test_parse_entry_key_classic_quoted() {
    let descriptors = parse_entry_key("\"@s/a@*\", \"@s/a@1 || 2\", \"@s/a@^1\":").unwrap();
    let ranges: Vec<_> = descriptors.iter().map(Descriptor::range).collect();
    assert_eq!(ranges, vec!["*", "1 || 2", "^1"]);
  }

  #[test]
  fn test_parse_entry_key_classic_bare() {
    let descriptors = parse_entry_key("b@2.0.x, b@^2:").unwrap();
    let ranges: Vec<_> = descriptors.iter().map(Descriptor::range).collect();
    assert_eq!(ranges, vec!["2.0.x", "^2"]);
  }

  #[test]
  fn test_parse_entry_key_modern() {
    let descriptors = parse_entry_key(
      "\"@backstage/app-defaults@workspace:^, @backstage/app-defaults@workspace:packages/app-defaults\":",
    )
    .unwrap();
    assert_eq!(descriptors.len(), 2);
    assert!(descriptors.iter().all(Descriptor::is_workspace));
    assert_eq!(descriptors[1].range(), "packages/app-defaults");
  }

  #[test]
  fn test_parse_entry_key_requires_colon() {
    assert!(parse_entry_key("a@^1").is_err());
    assert!(parse_entry_key("a:").is_err());
  }

  #[test]
  fn test_parse_classic_entry() {
    let contents = format!(
      "{LEGACY_HEADER}\na@^1:\n  version \"1.0.1\"\n  resolved \"https://my-registry/a-1.0.01.tgz#abc123\"\n  integrity sha512-xyz\n  dependencies:\n    b \"^2\"\n    \"@s/c\" \"~1.2.0\"\n"
    );
    let lockfile = parse_lockfile(&contents).unwrap();
    assert_eq!(lockfile.kind(), LockfileKind::Classic);
    assert_eq!(lockfile.metadata(), None);

    let entry = &lockfile.entries()[0];
    assert_eq!(entry.version(), "1.0.1");
    assert_eq!(entry.resolved(), Some("https://my-registry/a-1.0.01.tgz#abc123"));
    assert_eq!(entry.checksum(), Some("sha512-xyz"));
    let deps: Vec<_> = entry.dependencies().iter().map(|d| (d.name(), d.range())).collect();
    assert_eq!(deps, vec![("b", "^2"), ("@s/c", "~1.2.0")]);
    assert_eq!(lockfile.to_string(), contents);
  }

  #[test]
  fn test_parse_modern_entry() {
    let contents = format!(
      "{MODERN_HEADER}\n\"debug@npm:1.0.0\":\n  version: 1.0.0\n  resolution: \"debug@npm:1.0.0\"\n  dependencies:\n    ms: 0.6.2\n  peerDependencies:\n    \"@types/react\": ^16.13.1 || ^17.0.0\n  peerDependenciesMeta:\n    \"@types/react\":\n      optional: true\n  checksum: edfec8784737afbeea43cc78c3f56c33b88d3e751cc7220ae7a1c5370ff099e7352703275bdb56ea9967f92961231ce0625f8234d82259047303849671153f03\n  languageName: node\n  linkType: hard\n"
    );
    let lockfile = parse_lockfile(&contents).unwrap();
    assert_eq!(lockfile.kind(), LockfileKind::Modern);
    let metadata = lockfile.metadata().unwrap();
    assert_eq!(metadata.version, "6");
    assert_eq!(metadata.cache_key.as_deref(), Some("8"));

    let entry = &lockfile.entries()[0];
    assert_eq!(entry.data_key(), "debug@npm:1.0.0");
    assert_eq!(entry.version(), "1.0.0");
    assert_eq!(entry.resolution(), Some("debug@npm:1.0.0"));
    assert_eq!(entry.scalar("linkType"), Some("hard"));
    assert_eq!(entry.dependencies()[0].range(), "0.6.2");
    assert_eq!(entry.peer_dependencies()[0].name(), "@types/react");
    assert!(matches!(
      entry.field("peerDependenciesMeta").unwrap().value(),
      FieldValue::Block(raw) if raw == "    \"@types/react\":\n      optional: true\n"
    ));
    assert_eq!(lockfile.to_string(), contents);
  }

  #[test]
  fn test_parse_crlf_roundtrip() {
    let contents = "# yarn lockfile v1\r\n\r\n\r\na@^1:\r\n  version \"1.0.1\"\r\n\r\nb@^2:\r\n  version \"2.0.0\"\r\n";
    let lockfile = parse_lockfile(contents).unwrap();
    assert_eq!(lockfile.entries().len(), 2);
    assert_eq!(lockfile.entries()[1].version(), "2.0.0");
    assert_eq!(lockfile.to_string(), contents);
  }

  #[test]
  fn test_parse_metadata_key_with_trailing_spaces() {
    let contents = "__metadata:  \n  version: 6\n  cacheKey: 8\n\n\"a@npm:^1\":\n  version: 1.0.1\n";
    let lockfile = parse_lockfile(contents).unwrap();
    assert_eq!(lockfile.kind(), LockfileKind::Modern);
    assert_eq!(lockfile.metadata().map(|m| m.version.as_str()), Some("6"));
    assert_eq!(lockfile.entries().len(), 1);
    assert_eq!(lockfile.to_string(), contents);
  }

  #[test]
  fn test_parse_rejects_duplicate_descriptor() {
    let contents = format!(
      "{LEGACY_HEADER}\nb@^2:\n  version \"2.0.0\"\n\nb@2.0.x, b@^2:\n  version \"2.0.1\"\n"
    );
    let err = parse_lockfile(&contents).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 8, .. }), "{err}");
  }

  #[test]
  fn test_parse_rejects_npm_and_bare_duplicate() {
    let contents = format!("{MODERN_HEADER}\n\"b@npm:^2, b@^2\":\n  version: 2.0.0\n");
    assert!(matches!(parse_lockfile(&contents), Err(Error::Parse { .. })));
  }

  #[test]
  fn test_parse_rejects_malformed_descriptor() {
    let contents = format!("{LEGACY_HEADER}\nnot-a-descriptor:\n  version \"2.0.0\"\n");
    let err = parse_lockfile(&contents).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 5, .. }), "{err}");
  }

  #[test]
  fn test_parse_rejects_entry_without_version() {
    let contents = format!("{LEGACY_HEADER}\na@^1:\n  integrity sha512-xyz\n");
    assert!(matches!(parse_lockfile(&contents), Err(Error::Parse { .. })));
  }

  #[test]
  fn test_parse_rejects_dangling_indent() {
    let contents = format!("{MODERN_HEADER}\n  version: 1.0.0\n");
    assert!(matches!(parse_lockfile(&contents), Err(Error::Parse { .. })));
  }

  #[test]
  fn test_parse_rejects_unknown_format() {
    assert!(matches!(
      parse_lockfile("a@^1:\n  version \"1.0.1\"\n"),
      Err(Error::Format)
    ));
  }
}
