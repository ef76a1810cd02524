use nom::{
  IResult, Parser,
  bytes::complete::{is_not, tag, take_while1},
  character::complete::{char, line_ending, space0, space1},
  combinator::opt,
  multi::many1,
  sequence::{pair, preceded, separated_pair, terminated},
};
use serde::Serialize;

/// The `__metadata` block at the start of a yarn berry lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
  /// Lockfile format version, e.g. `6`
  pub version: String,
  /// Cache key, absent in some early berry lockfiles
  pub cache_key: Option<String>,
}

impl Metadata {
  pub fn new(version: String, cache_key: Option<String>) -> Self {
    Self { version, cache_key }
  }
}

/// A line of metadata is a key-value pair, with a space-based indent
/// e.g. `  version: 8`
pub(crate) fn parse_metadata_line(input: &str) -> IResult<&str, (&str, &str)> {
  terminated(
    preceded(
      space1,
      separated_pair(
        take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        pair(char(':'), space1),
        is_not("\r\n"),
      ),
    ),
    opt(line_ending),
  )
  .parse(input)
}

/// Parses the __metadata block of a yarn lockfile
/// e.g.
/// __metadata:
///   version: 8
///   cacheKey: 9
///
/// Returns `None` for the metadata when the block has no `version` line.
pub(crate) fn parse_metadata(input: &str) -> IResult<&str, Option<Metadata>> {
  let (rest, _) = terminated(tag("__metadata:"), (space0, line_ending)).parse(input)?;
  let (rest, lines) = many1(parse_metadata_line).parse(rest)?;

  let value = |key: &str| {
    lines
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| v.trim().trim_matches('"').to_string())
  };

  let metadata = value("version").map(|version| Metadata::new(version, value("cacheKey")));
  Ok((rest, metadata))
}
