use std::collections::{BTreeMap, BTreeSet};

use crate::lockfile::Lockfile;

/// Package name to the names it depends on, across every locked version
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

impl Lockfile {
  /// Collapse the lockfile into a name-level graph.
  ///
  /// Versions and ranges are dropped, so a package's edges are the union of
  /// the `dependencies` and `peerDependencies` of all its entries. Every
  /// package in the lockfile is a node, with or without edges.
  pub fn create_simplified_dependency_graph(&self) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for entry in self.entries() {
      let edges: Vec<&str> = entry
        .dependencies()
        .iter()
        .chain(entry.peer_dependencies())
        .map(|item| item.name())
        .collect();

      for descriptor in entry.descriptors() {
        let node = graph.entry(descriptor.ident().to_string()).or_default();
        node.extend(edges.iter().map(|name| (*name).to_string()));
      }
    }

    graph
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  const LEGACY_HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n";

  const MODERN_HEADER: &str = "# This file is generated by running \"yarn install\" inside your project.\n# Manual changes might be lost - proceed with caution!\n\n__metadata:\n  version: 6\n  cacheKey: 8\n";

  fn node(name: &str, deps: &[&str]) -> (String, BTreeSet<String>) {
    (
      name.to_string(),
      deps.iter().map(|dep| (*dep).to_string()).collect(),
    )
  }

  fn graph<const N: usize>(nodes: [(String, BTreeSet<String>); N]) -> DependencyGraph {
    nodes.into_iter().collect()
  }

  #[test]
  fn test_graph_workspaces() {
    let lockfile = Lockfile::parse(&format!(
      "{MODERN_HEADER}\n\"@backstage/app-defaults@workspace:^, @backstage/app-defaults@workspace:packages/app-defaults\":\n  version: 0.0.0-use.local\n  resolution: \"@backstage/app-defaults@workspace:packages/app-defaults\"\n  dependencies:\n    \"@backstage/cli\": \"workspace:^\"\n    \"@backstage/theme\": \"workspace:^\"\n    \"@material-ui/core\": ^4.12.2\n    \"@types/react\": ^16.13.1 || ^17.0.0\n  peerDependencies:\n    react: ^16.13.1 || ^17.0.0\n    react-router-dom: 6.0.0-beta.0 || ^6.3.0\n  languageName: unknown\n  linkType: soft\n\n\"@backstage/backend-app-api@workspace:^, @backstage/backend-app-api@workspace:packages/backend-app-api\":\n  version: 0.0.0-use.local\n  resolution: \"@backstage/backend-app-api@workspace:packages/backend-app-api\"\n  dependencies:\n    \"@backstage/cli\": \"workspace:^\"\n    express: ^4.17.1\n    winston: ^3.2.1\n  languageName: unknown\n  linkType: soft\n"
    ))
    .unwrap();

    assert_eq!(
      lockfile.create_simplified_dependency_graph(),
      graph([
        node(
          "@backstage/app-defaults",
          &[
            "@backstage/cli",
            "@backstage/theme",
            "@material-ui/core",
            "@types/react",
            "react",
            "react-router-dom",
          ],
        ),
        node(
          "@backstage/backend-app-api",
          &["@backstage/cli", "express", "winston"],
        ),
      ])
    );
  }

  #[test]
  fn test_graph_without_dependencies() {
    let lockfile = Lockfile::parse(&format!(
      "{MODERN_HEADER}\n\"a@npm:^1\":\n  version: \"1.0.1\"\n\n\"b@npm:3\":\n  version: \"3.0.1\"\n\n\"b@npm:2.0.x\":\n  version: \"2.0.1\"\n  checksum: sha512-abc2\n"
    ))
    .unwrap();

    assert_eq!(
      lockfile.create_simplified_dependency_graph(),
      graph([node("a", &[]), node("b", &[])])
    );
  }

  #[test]
  fn test_graph_modern() {
    let lockfile = Lockfile::parse(&format!(
      "{MODERN_HEADER}\n\"a@npm:^1\":\n  version: \"1.0.1\"\n  dependencies:\n    b: \"^2\"\n\n\"b@npm:3\":\n  version: \"3.0.1\"\n  checksum: sha512-abc1\n\n\"b@npm:2.0.x\":\n  version: \"2.0.1\"\n  checksum: sha512-abc2\n  dependencies:\n    c: \"^1\"\n\n\"b@npm:^2\":\n  version: \"2.0.0\"\n  checksum: sha512-abc3\n  peerDependencies:\n    d: \"^1\"\n\n\"c@npm:^1\":\n  version: \"1.0.1\"\n\n\"d@npm:^1\":\n  version: \"1.0.2\"\n"
    ))
    .unwrap();

    assert_eq!(
      lockfile.create_simplified_dependency_graph(),
      graph([
        node("a", &["b"]),
        node("b", &["c", "d"]),
        node("c", &[]),
        node("d", &[]),
      ])
    );
  }

  #[test]
  fn test_graph_legacy() {
    let lockfile = Lockfile::parse(&format!(
      "{LEGACY_HEADER}\na@^1:\n  version \"1.0.1\"\n  dependencies:\n    b \"^2\"\n\nb@3:\n  version \"3.0.1\"\n  integrity sha512-abc1\n\nb@2.0.x:\n  version \"2.0.1\"\n  integrity sha512-abc2\n  dependencies:\n    c \"^1\"\n\nb@^2:\n  version \"2.0.0\"\n  integrity sha512-abc3\n  dependencies:\n    d \"^1\"\n\nc@^1:\n  version \"1.0.1\"\n  integrity x\n\nd@^1:\n  version \"1.0.1\"\n  integrity x\n"
    ))
    .unwrap();

    assert_eq!(
      lockfile.create_simplified_dependency_graph(),
      graph([
        node("a", &["b"]),
        node("b", &["c", "d"]),
        node("c", &[]),
        node("d", &[]),
      ])
    );
  }
}
