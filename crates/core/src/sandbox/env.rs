//! Restricted symbol table injected into every descriptor parse

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::stub::Stub;
use super::value::{Builtin, GlobKind, Value};
use crate::config::Config;

/// Target kinds that record a BuildTarget when invoked
pub const TARGET_KINDS: &[&str] = &[
    "android_binary",
    "android_dependency",
    "android_library",
    "android_resources",
    "annotation_processor",
    "benchmark",
    "confluence",
    "contrib_plugin",
    "cpp_binary",
    "cpp_library",
    "create_datasets",
    "create_thrift_libraries",
    "credentials",
    "go_binary",
    "go_library",
    "go_remote_libraries",
    "go_remote_library",
    "go_thrift_library",
    "hadoop_binary",
    "heron_binary",
    "idl_jar_thrift_library",
    "jar_library",
    "java_agent",
    "java_antlr_library",
    "java_library",
    "java_protobuf_library",
    "java_ragel_library",
    "java_tests",
    "java_thrift_library",
    "java_thriftstore_dml_library",
    "java_wire_library",
    "jaxb_library",
    "junit_tests",
    "jvm_app",
    "jvm_binary",
    "jvm_prep_command",
    "managed_jar_dependencies",
    "netrc_credentials",
    "node_module",
    "node_packer_module",
    "node_preinstalled_module",
    "node_remote_module",
    "node_test",
    "page",
    "pants_plugin",
    "pants_plugin_requirement_library",
    "prep_command",
    "python_antlr_library",
    "python_binary",
    "python_library",
    "python_requirement_library",
    "python_tests",
    "python_thrift_library",
    "resources",
    "ruby_thrift_library",
    "scala_js_binary",
    "scala_js_library",
    "scala_library",
    "scalac_plugin",
    "spindle_thrift_library",
    "storm_binary",
    "target",
    "testbox_tests",
    "thrift_jar",
    "unpacked_jars",
];

/// Globals that are recognized but not modeled; each is bound to a stub
pub const STUB_GLOBALS: &[&str] = &[
    "artifact",
    "artifactory",
    "buildfile_path",
    "bundle",
    "ConfluencePublish",
    "contrib_setup_py",
    "developer",
    "DirectoryReMapper",
    "Duplicate",
    "exclude",
    "from_target",
    "get_buildroot",
    "github",
    "globs",
    "intransitive",
    "jar",
    "jar_rules",
    "license",
    "make_lib",
    "managed_jar_libraries",
    "netrc",
    "ossrh",
    "pants_library",
    "pants_requirement",
    "pants_setup_py",
    "pants_version",
    "provided",
    "public",
    "python_artifact",
    "python_requirement",
    "python_requirements",
    "repository",
    "rglobs",
    "scala_artifact",
    "scala_jar",
    "scm",
    "scoped",
    "setup_py",
    "shading_exclude",
    "shading_exclude_package",
    "shading_keep",
    "shading_keep_package",
    "shading_relocate",
    "shading_relocate_package",
    "shading_zap",
    "shading_zap_package",
    "Skip",
    "testing",
    "Wiki",
    "wiki_artifact",
    "zglobs",
];

/// Interpreter-level builtins, lower priority than anything above
const INTERPRETER_BUILTINS: &[(&str, Builtin)] = &[
    ("len", Builtin::Len),
    ("str", Builtin::Str),
    ("int", Builtin::Int),
    ("bool", Builtin::Bool),
    ("list", Builtin::List),
    ("tuple", Builtin::Tuple),
    ("dict", Builtin::Dict),
    ("sorted", Builtin::Sorted),
    ("range", Builtin::Range),
    ("set", Builtin::Set),
    ("print", Builtin::Print),
];

/// Symbol table shared by all parses of one repository.
///
/// Built once; each parse takes its own copy through [`Sandbox::scope`], so
/// nothing assigned by one descriptor is visible to another.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    interpreter_version: i64,
    symbols: HashMap<String, Value>,
}

impl Sandbox {
    /// Sandbox with the built-in symbol lists and default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &Config::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        let target_kinds = TARGET_KINDS
            .iter()
            .copied()
            .chain(config.extra_target_kinds.iter().map(String::as_str));
        let stub_globals = STUB_GLOBALS
            .iter()
            .copied()
            .chain(config.extra_globals.iter().map(String::as_str));
        Self::from_lists(root, target_kinds, stub_globals, config.interpreter_version)
    }

    pub fn from_lists<'a>(
        root: impl Into<PathBuf>,
        target_kinds: impl IntoIterator<Item = &'a str>,
        stub_globals: impl IntoIterator<Item = &'a str>,
        interpreter_version: i64,
    ) -> Self {
        let mut symbols = HashMap::new();

        for kind in target_kinds {
            symbols.insert(kind.to_string(), Value::Builtin(Builtin::Target(Arc::from(kind))));
        }
        for name in stub_globals {
            symbols.insert(name.to_string(), Value::Unknown(Stub::new(name)));
        }

        // Natively modeled helpers shadow their stub entries
        let natives = [
            ("globs", Builtin::Glob(GlobKind::Plain)),
            ("rglobs", Builtin::Glob(GlobKind::Recursive)),
            ("zglobs", Builtin::Glob(GlobKind::Zsh)),
            ("pants_version", Builtin::PantsVersion),
            ("buildfile_path", Builtin::BuildfilePath),
            ("get_buildroot", Builtin::BuildRoot),
        ];
        for (name, builtin) in natives {
            symbols.insert(name.to_string(), Value::Builtin(builtin));
        }

        for (name, builtin) in INTERPRETER_BUILTINS {
            symbols
                .entry(name.to_string())
                .or_insert_with(|| Value::Builtin(builtin.clone()));
        }

        Self {
            root: root.into(),
            interpreter_version,
            symbols,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interpreter_version(&self) -> i64 {
        self.interpreter_version
    }

    /// Fresh, independently mutable copy of the symbol table
    pub fn scope(&self) -> HashMap<String, Value> {
        self.symbols.clone()
    }

    pub fn is_target_kind(&self, name: &str) -> bool {
        matches!(self.symbols.get(name), Some(Value::Builtin(Builtin::Target(_))))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kinds_and_stubs_are_bound() {
        let sandbox = Sandbox::new("/repo");
        assert!(sandbox.is_target_kind("java_library"));
        assert!(sandbox.is_target_kind("target"));
        assert!(!sandbox.is_target_kind("artifact"));

        match sandbox.lookup("artifact") {
            Some(Value::Unknown(stub)) => assert_eq!(stub.trace(), "artifact"),
            other => panic!("expected stub, got {other:?}"),
        }
    }

    #[test]
    fn test_native_helpers_shadow_stubs() {
        let sandbox = Sandbox::new("/repo");
        assert!(matches!(
            sandbox.lookup("rglobs"),
            Some(Value::Builtin(Builtin::Glob(GlobKind::Recursive)))
        ));
        assert!(matches!(
            sandbox.lookup("get_buildroot"),
            Some(Value::Builtin(Builtin::BuildRoot))
        ));
        assert!(matches!(sandbox.lookup("len"), Some(Value::Builtin(Builtin::Len))));
    }

    #[test]
    fn test_config_extends_symbol_lists() {
        let config = Config {
            extra_target_kinds: vec!["thrift_service".to_string()],
            extra_globals: vec!["custom_macro".to_string()],
            interpreter_version: 7,
            ..Default::default()
        };
        let sandbox = Sandbox::with_config("/repo", &config);
        assert!(sandbox.is_target_kind("thrift_service"));
        assert!(matches!(sandbox.lookup("custom_macro"), Some(Value::Unknown(_))));
        assert_eq!(sandbox.interpreter_version(), 7);
    }

    #[test]
    fn test_scope_copies_are_independent() {
        let sandbox = Sandbox::new("/repo");
        let mut first = sandbox.scope();
        first.insert("LOCAL".to_string(), Value::Int(1));
        assert!(!sandbox.scope().contains_key("LOCAL"));
    }
}
