//! Rendering of lockfile text.
//!
//! Untouched lines are never regenerated; they are emitted from the text they
//! were parsed from. The functions here only produce the lines that a
//! mutation invalidated, following the conventions of each grammar.

use std::fmt;

use crate::format::LockfileKind;
use crate::ident::Descriptor;
use crate::lockfile::Lockfile;

/// Wrap `value` in double quotes with JSON escaping
pub(crate) fn quote(value: &str) -> String {
  serde_json::Value::from(value).to_string()
}

/// yarn v1's `maybeWrap`: anything that doesn't read as a plain word is quoted
pub(crate) fn classic_needs_quotes(value: &str) -> bool {
  value.starts_with("true")
    || value.starts_with("false")
    || value
      .chars()
      .any(|c| matches!(c, ':' | '\\' | '"' | ',' | '[' | ']') || c.is_whitespace())
    || !value.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Characters that open a YAML construct when they lead a plain scalar
const YAML_INDICATORS: &[char] = &[
  '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// berry's syml quoting: plain scalars unless YAML would read them differently
pub(crate) fn modern_needs_quotes(value: &str) -> bool {
  value.is_empty()
    || value.starts_with(YAML_INDICATORS)
    || value.contains([':', ',', '#', '"', '\n'])
    || value.trim() != value
}

fn needs_quotes(kind: LockfileKind, value: &str) -> bool {
  match kind {
    LockfileKind::Classic => classic_needs_quotes(value),
    LockfileKind::Modern => modern_needs_quotes(value),
  }
}

/// The line ending of a raw line, empty for a final line without one
pub(crate) fn line_ending(line: &str) -> &'static str {
  if line.ends_with("\r\n") {
    "\r\n"
  } else if line.ends_with('\n') {
    "\n"
  } else {
    ""
  }
}

/// Render the key line of an entry.
///
/// Classic keys quote each descriptor on its own (`"@s/a@*", "@s/a@^1":`),
/// modern keys quote the joined list as one scalar (`"b@npm:1, b@npm:^1":`).
pub(crate) fn render_key(kind: LockfileKind, descriptors: &[Descriptor], eol: &str) -> String {
  let key = match kind {
    LockfileKind::Classic => descriptors
      .iter()
      .map(|descriptor| {
        let text = descriptor.to_string();
        if classic_needs_quotes(&text) {
          quote(&text)
        } else {
          text
        }
      })
      .collect::<Vec<_>>()
      .join(", "),
    LockfileKind::Modern => {
      let joined = descriptors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
      if modern_needs_quotes(&joined) {
        quote(&joined)
      } else {
        joined
      }
    }
  };
  format!("{key}:{eol}")
}

/// Render an indented `key value` (classic) or `key: value` (modern) line.
/// A value that was quoted stays quoted; a bare one is quoted only if it must be.
pub(crate) fn render_pair(
  kind: LockfileKind,
  indent: &str,
  key: &str,
  value: &str,
  quoted: bool,
  eol: &str,
) -> String {
  let value = if quoted || needs_quotes(kind, value) {
    quote(value)
  } else {
    value.to_string()
  };
  match kind {
    LockfileKind::Classic => format!("{indent}{key} {value}{eol}"),
    LockfileKind::Modern => format!("{indent}{key}: {value}{eol}"),
  }
}

impl fmt::Display for Lockfile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = String::with_capacity(self.header().len() + self.entries().len() * 128);
    out.push_str(self.header());

    let last = self.entries().len().saturating_sub(1);
    for (index, entry) in self.entries().iter().enumerate() {
      entry.render(&mut out);
      if index == last {
        continue;
      }
      if !out.ends_with('\n') {
        out.push('\n');
      }
      // An entry that used to be last, or was moved, has no gap of its own
      if entry.gap().is_empty() {
        out.push('\n');
      } else {
        out.push_str(entry.gap());
      }
    }

    out.push_str(self.footer());
    f.write_str(&out)
  }
}
