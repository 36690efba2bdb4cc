use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Kind of the synthesized target that stands for a whole descriptor file
pub const ROOT_TARGET_KIND: &str = "<root>";

/// One declared unit in a descriptor file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    pub kind: String,
    /// `<buildpath>:<name>`, or the bare buildpath for the root target
    pub id: String,
    pub dependencies: Vec<String>,
    pub sources: Vec<String>,
}

impl BuildTarget {
    pub fn new(
        kind: impl Into<String>,
        id: impl Into<String>,
        dependencies: Vec<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            dependencies,
            sources,
        }
    }

    /// Aggregate target depending on every target declared in `buildpath`
    pub fn root(buildpath: &str, dependencies: Vec<String>) -> Self {
        Self::new(ROOT_TARGET_KIND, buildpath, dependencies, Vec::new())
    }

    pub fn name(&self) -> &str {
        split_target(&self.id).1
    }

    pub fn buildpath(&self) -> &str {
        split_target(&self.id).0
    }

    pub fn is_root(&self) -> bool {
        self.kind == ROOT_TARGET_KIND
    }

    /// A top-level target is one that does not live under a `src/` folder
    pub fn is_toplevel(&self) -> bool {
        !self.id.contains("/src/")
    }
}

/// Splits a dependency reference into `(buildpath, name)`.
///
/// The name is empty when the reference has no `:`. A leading `//` marks the
/// repository root and is dropped.
pub fn split_target(reference: &str) -> (&str, &str) {
    let reference = reference.strip_prefix("//").unwrap_or(reference);
    reference.split_once(':').unwrap_or((reference, ""))
}

/// Parse result of one descriptor file. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub buildpath: String,
    pub targets: BTreeMap<String, Arc<BuildTarget>>,
    /// Diagnostics produced while parsing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Descriptor {
    pub fn root(&self) -> Option<&BuildTarget> {
        self.targets.get(&self.buildpath).map(Arc::as_ref)
    }

    /// Sorted ids of every target, root included
    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Declared targets in declaration order, root excluded
    pub fn declared(&self) -> impl Iterator<Item = &BuildTarget> {
        self.root()
            .into_iter()
            .flat_map(|root| root.dependencies.iter())
            .filter_map(|id| self.targets.get(id).map(Arc::as_ref))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<BuildTarget>> {
        self.targets.get(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("finagle/finagle-mux:lib"), ("finagle/finagle-mux", "lib"));
        assert_eq!(split_target(":sibling"), ("", "sibling"));
        assert_eq!(split_target("science/src/java"), ("science/src/java", ""));
        assert_eq!(split_target("//3rdparty:guava"), ("3rdparty", "guava"));
    }

    #[test]
    fn test_target_accessors() {
        let target = BuildTarget::new("java_library", "finagle/src/main:core", vec![], vec![]);
        assert_eq!(target.name(), "core");
        assert_eq!(target.buildpath(), "finagle/src/main");
        assert!(!target.is_root());
        assert!(!target.is_toplevel());

        let root = BuildTarget::root("finagle", vec!["finagle:core".to_string()]);
        assert!(root.is_root());
        assert!(root.is_toplevel());
        assert_eq!(root.buildpath(), "finagle");
    }

    #[test]
    fn test_serializes_to_json() {
        let target = BuildTarget::new("java_library", "a:b", vec!["c:d".to_string()], vec![]);
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "java_library");
        assert_eq!(json["dependencies"][0], "c:d");
    }
}
