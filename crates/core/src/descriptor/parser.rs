use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::target::{BuildTarget, Descriptor};
use crate::config::Config;
use crate::error::{DescriptorError, ScriptError};
use crate::sandbox::{Interpreter, ParseContext, Sandbox, TargetCall, Value};
use crate::syntax::parse_module;

/// Executes descriptor files and turns the targets they declare into a
/// [`Descriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorParser {
    sandbox: Sandbox,
    descriptor_name: String,
}

impl DescriptorParser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &Config::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            sandbox: Sandbox::with_config(root, config),
            descriptor_name: config.descriptor_name.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn descriptor_name(&self) -> &str {
        &self.descriptor_name
    }

    /// Absolute path of the descriptor file owned by `buildpath`
    pub fn descriptor_path(&self, buildpath: &str) -> PathBuf {
        if buildpath.is_empty() {
            self.root().join(&self.descriptor_name)
        } else {
            self.root().join(buildpath).join(&self.descriptor_name)
        }
    }

    pub fn parse(&self, buildpath: &str) -> Result<Descriptor, DescriptorError> {
        let path = self.descriptor_path(buildpath);
        debug!(buildpath, path = %path.display(), "parsing descriptor");

        let source = fs::read_to_string(&path).map_err(|e| DescriptorError::Read {
            buildpath: buildpath.to_string(),
            path: path.clone(),
            source: Arc::new(e),
        })?;

        self.parse_source(buildpath, &path, &source)
    }

    /// Parses descriptor text that has already been read from `buildfile`
    pub fn parse_source(
        &self,
        buildpath: &str,
        buildfile: &Path,
        source: &str,
    ) -> Result<Descriptor, DescriptorError> {
        let module = parse_module(source).map_err(|e| parse_error(buildpath, e))?;

        let mut context = ParseContext::new(buildpath, buildfile);
        Interpreter::run(&self.sandbox, &mut context, &module)
            .map_err(|e| parse_error(buildpath, e))?;

        let mut builder = DescriptorBuilder::new(buildpath);
        for call in &context.calls {
            builder.record(call);
        }
        let descriptor = builder.finish(context.warnings);
        debug!(
            buildpath,
            targets = descriptor.len(),
            warnings = descriptor.warnings.len(),
            "parsed descriptor"
        );
        Ok(descriptor)
    }
}

fn parse_error(buildpath: &str, source: ScriptError) -> DescriptorError {
    DescriptorError::Parse {
        buildpath: buildpath.to_string(),
        source,
    }
}

/// Accumulates recorded target calls into targets keyed by id
struct DescriptorBuilder<'a> {
    buildpath: &'a str,
    targets: BTreeMap<String, Arc<BuildTarget>>,
    /// First-declaration order of ids
    order: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> DescriptorBuilder<'a> {
    fn new(buildpath: &'a str) -> Self {
        Self {
            buildpath,
            targets: BTreeMap::new(),
            order: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, line: usize, message: String) {
        warn!(buildpath = self.buildpath, line, "{message}");
        self.warnings.push(format!("line {line}: {message}"));
    }

    fn record(&mut self, call: &TargetCall) {
        // The first identity key present wins, even when it is falsy
        let name = match call.kwarg("name").or_else(|| call.kwarg("basename")) {
            Some(value) if value.truthy() => value.to_str(),
            _ => format!("NO-NAME-{}", self.targets.len()),
        };
        let id = format!("{}:{}", self.buildpath, name);

        let dependencies: Vec<String> = self
            .strings(call, "dependencies")
            .into_iter()
            .map(|dep| {
                if dep.starts_with(':') {
                    format!("{}{}", self.buildpath, dep)
                } else {
                    dep
                }
            })
            .collect();
        if dependencies.iter().any(String::is_empty) {
            self.warn(call.line, format!("empty dependency in '{id}'"));
        }

        let sources = self
            .strings(call, "sources")
            .iter()
            .map(|source| join_path(self.buildpath, source))
            .collect();

        if self.targets.contains_key(&id) {
            self.warn(
                call.line,
                format!("duplicate target id '{id}' overwrites an earlier declaration"),
            );
        } else {
            self.order.push(id.clone());
        }
        let target = BuildTarget::new(call.kind.as_str(), id.as_str(), dependencies, sources);
        self.targets.insert(id, Arc::new(target));
    }

    /// String elements of a list-valued keyword; anything else is dropped
    fn strings(&mut self, call: &TargetCall, key: &str) -> Vec<String> {
        let Some(value) = call.kwarg(key) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for element in value.elements() {
            match element {
                Value::Str(s) => out.push(s),
                Value::None => {}
                other => self.warn(
                    call.line,
                    format!(
                        "non-string entry {} in {}() '{}' dropped",
                        other.repr(),
                        call.kind,
                        key
                    ),
                ),
            }
        }
        out
    }

    fn finish(mut self, mut warnings: Vec<String>) -> Descriptor {
        let root = BuildTarget::root(self.buildpath, self.order);
        self.targets.insert(self.buildpath.to_string(), Arc::new(root));
        warnings.append(&mut self.warnings);
        Descriptor {
            buildpath: self.buildpath.to_string(),
            targets: self.targets,
            warnings,
        }
    }
}

/// Joins a directory-relative path onto a buildpath; absolute paths and an
/// empty buildpath leave `path` unchanged
fn join_path(buildpath: &str, path: &str) -> String {
    if buildpath.is_empty() || path.starts_with('/') {
        path.to_string()
    } else if buildpath.ends_with('/') {
        format!("{buildpath}{path}")
    } else {
        format!("{buildpath}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(buildpath: &str, source: &str) -> Result<Descriptor, DescriptorError> {
        let parser = DescriptorParser::new("/repo");
        let buildfile = parser.descriptor_path(buildpath);
        parser.parse_source(buildpath, &buildfile, source)
    }

    fn deps(descriptor: &Descriptor, id: &str) -> Vec<String> {
        descriptor.get(id).unwrap().dependencies.clone()
    }

    #[test]
    fn test_relative_dependencies_are_resolved() {
        let descriptor = parse(
            "a/b",
            "java_library(name='lib', dependencies=[':sibling', 'c/d:other', '3rdparty'])\n",
        )
        .unwrap();
        assert_eq!(
            deps(&descriptor, "a/b:lib"),
            vec!["a/b:sibling", "c/d:other", "3rdparty"]
        );
    }

    #[test]
    fn test_anonymous_targets_get_unique_names() {
        let descriptor = parse("x", "java_library()\njunit_tests(sources=['T.java'])\n").unwrap();
        assert!(descriptor.get("x:NO-NAME-0").is_some());
        let second = descriptor.get("x:NO-NAME-1").unwrap();
        assert_eq!(second.kind, "junit_tests");
        assert_eq!(second.sources, vec!["x/T.java"]);
    }

    #[test]
    fn test_falsy_name_is_replaced() {
        let descriptor = parse("x", "target(name='', basename='ignored')\n").unwrap();
        assert!(descriptor.get("x:NO-NAME-0").is_some());
    }

    #[test]
    fn test_basename_used_when_name_missing() {
        let descriptor = parse("x", "jvm_app(basename='server-app')\n").unwrap();
        assert!(descriptor.get("x:server-app").is_some());
    }

    #[test]
    fn test_root_target_aggregates_in_declaration_order() {
        let descriptor = parse(
            "svc",
            "scala_library(name='zeta')\njava_tests(name='alpha')\ntarget(name='mid')\n",
        )
        .unwrap();
        let root = descriptor.root().unwrap();
        assert_eq!(root.kind, "<root>");
        assert_eq!(root.id, "svc");
        assert_eq!(root.dependencies, vec!["svc:zeta", "svc:alpha", "svc:mid"]);

        let declared: Vec<&str> = descriptor.declared().map(|t| t.id.as_str()).collect();
        assert_eq!(declared, vec!["svc:zeta", "svc:alpha", "svc:mid"]);
    }

    #[test]
    fn test_only_unsupported_symbols_yield_empty_root() {
        let descriptor = parse(
            "tools",
            "setup_py(name='x', version=pants_library + '1')\nwiki_artifact(wiki=Wiki('x'))\n",
        )
        .unwrap();
        assert_eq!(descriptor.len(), 1);
        assert!(descriptor.root().unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_glob_sources_are_joined() {
        let descriptor = parse(
            "lib",
            "java_library(name='l', sources=globs('*.java', exclude=['Gen.java']))\n",
        )
        .unwrap();
        assert_eq!(
            descriptor.get("lib:l").unwrap().sources,
            vec!["lib/|g|*.java", "lib/Gen.java-"]
        );
    }

    #[test]
    fn test_duplicate_ids_overwrite_with_warning() {
        let descriptor = parse(
            "dup",
            "java_library(name='x', sources=['A.java'])\nscala_library(name='x')\n",
        )
        .unwrap();
        let target = descriptor.get("dup:x").unwrap();
        assert_eq!(target.kind, "scala_library");
        assert_eq!(descriptor.root().unwrap().dependencies, vec!["dup:x"]);
        assert!(descriptor.warnings.iter().any(|w| w.contains("duplicate")));
    }

    #[test]
    fn test_non_string_dependencies_are_dropped() {
        let descriptor = parse(
            "m",
            "java_library(name='x', dependencies=[':ok', jar_rules, 3])\n",
        )
        .unwrap();
        assert_eq!(deps(&descriptor, "m:x"), vec!["m:ok"]);
        assert_eq!(descriptor.warnings.len(), 2);
    }

    #[test]
    fn test_syntax_error_carries_buildpath() {
        let err = parse("broken", "java_library(name='x'\n").unwrap_err();
        assert_eq!(err.buildpath(), "broken");
        assert!(matches!(err, DescriptorError::Parse { source: ScriptError::Syntax { .. }, .. }));
    }

    #[test]
    fn test_parse_reads_from_disk() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("finagle/finagle-core");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("BUILD"), "java_library(name='core')\n").unwrap();

        let parser = DescriptorParser::new(temp.path());
        let descriptor = parser.parse("finagle/finagle-core").unwrap();
        assert!(descriptor.get("finagle/finagle-core:core").is_some());

        let missing = parser.parse("finagle").unwrap_err();
        assert!(matches!(missing, DescriptorError::Read { .. }));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("a/b", "c.java"), "a/b/c.java");
        assert_eq!(join_path("", "c.java"), "c.java");
        assert_eq!(join_path("a/", "c.java"), "a/c.java");
        assert_eq!(join_path("a", "/abs/c.java"), "/abs/c.java");
    }
}
