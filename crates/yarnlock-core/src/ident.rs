// Shapes follow yarn's own descriptor types
// https://github.com/yarnpkg/berry/blob/master/packages/yarnpkg-core/sources/types.ts#L19
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct IdentName(String);

impl IdentName {
  pub fn new(name: String) -> Self {
    Self(name)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct IdentScope(String);

impl IdentScope {
  pub fn new(scope: String) -> Self {
    Self(scope)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Scope + name of the package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident {
  /// The scope of the package, e.g. for `@scope/package`, this is `@scope`
  scope: Option<IdentScope>,
  /// The name of the package, e.g. for `@scope/package`, this is `package`
  name: IdentName,
}

impl Ident {
  pub fn new(scope: Option<String>, name: String) -> Self {
    Self {
      scope: scope.map(IdentScope::new),
      name: IdentName::new(name),
    }
  }

  /// Split a full package name such as `@babel/code-frame` into scope and name.
  /// Unscoped names, and scoped names without a `/`, keep the whole text as the name.
  pub fn from_full_name(full_name: &str) -> Self {
    match full_name.strip_prefix('@').and_then(|s| s.split_once('/')) {
      Some((scope, name)) => Self::new(Some(format!("@{scope}")), name.to_string()),
      None => Self::new(None, full_name.to_string()),
    }
  }

  pub fn scope(&self) -> Option<&str> {
    self.scope.as_ref().map(IdentScope::as_str)
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  /// Whether this ident spells `full_name`, without allocating
  pub fn matches(&self, full_name: &str) -> bool {
    match self.scope() {
      None => full_name == self.name(),
      Some(scope) => full_name
        .strip_prefix(scope)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| name == self.name()),
    }
  }
}

impl fmt::Display for Ident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.scope() {
      Some(scope) => write!(f, "{scope}/{}", self.name()),
      None => f.write_str(self.name()),
    }
  }
}

/// The range of the Descriptor, e.g. `^1.2.3`, `~1.2.3`, `1.2.x`, etc.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct IdentRange(String);

impl IdentRange {
  pub fn new(range: String) -> Self {
    Self(range)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Protocols that are split off the range. Anything else (`patch:`, `file:`,
/// `git+ssh:`) is left in the range text.
const SPLIT_PROTOCOLS: [&str; 2] = ["npm", "workspace"];

/// Descriptors are just like idents, except that they also contain a range.
///
/// The range is kept without its `npm:` / `workspace:` protocol so that
/// classic and modern lockfiles agree on it; the protocol is kept on the side
/// so that `Display` reproduces the descriptor as it was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
  ident: Ident,
  protocol: Option<String>,
  range: IdentRange,
}

impl Descriptor {
  pub fn new(ident: Ident, range: String) -> Self {
    let (protocol, range) = split_protocol(&range);
    Self {
      ident,
      protocol: protocol.map(str::to_string),
      range: IdentRange::new(range.to_string()),
    }
  }

  pub fn ident(&self) -> &Ident {
    &self.ident
  }

  /// `npm` or `workspace` when the descriptor carried that prefix
  pub fn protocol(&self) -> Option<&str> {
    self.protocol.as_deref()
  }

  /// The range with any `npm:` / `workspace:` prefix removed
  pub fn range(&self) -> &str {
    self.range.as_str()
  }

  pub fn is_workspace(&self) -> bool {
    self.protocol() == Some("workspace")
  }
}

/// Split `npm:^1.0.0` into `(Some("npm"), "^1.0.0")`.
pub(crate) fn split_protocol(range: &str) -> (Option<&str>, &str) {
  for protocol in SPLIT_PROTOCOLS {
    if let Some(rest) = range
      .strip_prefix(protocol)
      .and_then(|rest| rest.strip_prefix(':'))
    {
      return (Some(protocol), rest);
    }
  }
  (None, range)
}

impl fmt::Display for Descriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@", self.ident)?;
    if let Some(protocol) = self.protocol() {
      write!(f, "{protocol}:")?;
    }
    f.write_str(self.range())
  }
}

impl FromStr for Descriptor {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    crate::parse::parse_descriptor(s).ok_or_else(|| Error::InvalidDescriptor(s.to_string()))
  }
}
