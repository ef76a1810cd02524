use serde::Serialize;

use crate::error::{Error, Result};

/// The banner yarn v1 writes at the top of every lockfile
pub const CLASSIC_BANNER: &str = "# yarn lockfile v1";

/// The block that opens every yarn berry lockfile
pub const METADATA_KEY: &str = "__metadata:";

/// How many leading lines may precede the classic banner
const BANNER_SEARCH_LINES: usize = 8;

/// The two lockfile grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockfileKind {
  /// yarn v1, `name@range:` blocks with `key value` fields
  Classic,
  /// yarn berry, a YAML subset with `key: value` fields and a `__metadata` block
  Modern,
}

/// Classify lockfile text by its opening lines
pub fn detect(contents: &str) -> Result<LockfileKind> {
  if contents
    .lines()
    .take(BANNER_SEARCH_LINES)
    .any(|line| line.trim_end() == CLASSIC_BANNER)
  {
    return Ok(LockfileKind::Classic);
  }
  if contents.lines().any(|line| line.trim_end() == METADATA_KEY) {
    return Ok(LockfileKind::Modern);
  }
  Err(Error::Format)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detect_classic() {
    let contents = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n\na@^1:\n  version \"1.0.1\"\n";
    assert_eq!(detect(contents).unwrap(), LockfileKind::Classic);
  }

  #[test]
  fn test_detect_modern() {
    let contents = "# This file is generated by running \"yarn install\" inside your project.\n\n__metadata:\n  version: 6\n  cacheKey: 8\n";
    assert_eq!(detect(contents).unwrap(), LockfileKind::Modern);
  }

  #[test]
  fn test_detect_crlf_banner() {
    assert_eq!(
      detect("# yarn lockfile v1\r\n\r\n").unwrap(),
      LockfileKind::Classic
    );
  }

  #[test]
  fn test_detect_unknown() {
    assert!(matches!(detect("a@^1:\n  version 1.0.0\n"), Err(Error::Format)));
    assert!(matches!(detect(""), Err(Error::Format)));
  }
}
