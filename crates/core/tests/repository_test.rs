//! End-to-end queries against a synthetic repository

use buildgraph_core::{Config, Error, Repository};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_build(root: &Path, buildpath: &str, source: &str) {
    let dir = root.join(buildpath);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("BUILD"), source).unwrap();
}

/// finagle/finagle-mux -> finagle/finagle-core -> util/util-core -> science/tools
fn monorepo() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("pants.ini"), "[GLOBAL]\n").unwrap();
    fs::create_dir_all(root.join(".git/objects")).unwrap();

    write_build(
        root,
        "finagle/finagle-mux",
        r#"
import os
from pants.base.build_environment import get_buildroot

MUX_DEPS = [
    'finagle/finagle-core:core',
    '3rdparty/jvm/io/netty',
]

java_library(
    name='mux',
    dependencies=MUX_DEPS + [':mux-thrift'],
    sources=rglobs('*.java', exclude=[globs('Legacy*.java')]),
    provides=artifact(org='com.twitter', name='finagle-mux', repo=public),
)

java_thrift_library(
    name='mux-thrift',
    sources=['mux.thrift'],
)

junit_tests(
    dependencies=[':mux', scoped(':hidden', scope='forced')],
)
"#,
    );
    write_build(
        root,
        "finagle/finagle-core",
        r#"
def core_library(name, extra=[]):
    java_library(
        name=name,
        dependencies=['util/util-core:util'] + extra,
    )

core_library('core')
"#,
    );
    write_build(
        root,
        "util/util-core",
        "scala_library(name='util', dependencies=['science/tools:tools'])\n",
    );
    write_build(root, "science/tools", "python_library(name='tools')\n");
    write_build(root, "3rdparty/jvm/io/netty", "jar_library(name='netty', jars=[jar('io.netty', 'netty', '4.1')])\n");
    write_build(root, "broken", "java_library(name='x'\n");
    temp
}

#[test]
fn test_get_targets_includes_root() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();
    let targets = repo.get_targets("finagle/finagle-mux").unwrap();
    assert_eq!(
        targets,
        vec![
            "finagle/finagle-mux",
            "finagle/finagle-mux:NO-NAME-2",
            "finagle/finagle-mux:mux",
            "finagle/finagle-mux:mux-thrift",
        ]
    );

    let descriptor = repo.parse("finagle/finagle-mux").unwrap();
    let mux = descriptor.get("finagle/finagle-mux:mux").unwrap();
    assert_eq!(
        mux.dependencies,
        vec![
            "finagle/finagle-core:core",
            "3rdparty/jvm/io/netty",
            "finagle/finagle-mux:mux-thrift",
        ]
    );
    assert_eq!(
        mux.sources,
        vec!["finagle/finagle-mux/|r|*.java", "finagle/finagle-mux/|g|Legacy*.java-"]
    );

    // The stubbed dependency is dropped, the relative one resolved
    let tests = descriptor.get("finagle/finagle-mux:NO-NAME-2").unwrap();
    assert_eq!(tests.dependencies, vec!["finagle/finagle-mux:mux"]);
    assert!(!descriptor.warnings.is_empty());
}

#[test]
fn test_parsing_is_idempotent_until_flush() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();
    let first = repo.parse("util/util-core").unwrap();
    let second = repo.parse("util/util-core").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    repo.flush();
    assert!(repo.cache().is_empty());
    let third = repo.parse("util/util-core").unwrap();
    assert_eq!(*first, *third);
}

#[test]
fn test_dependencies_by_depth() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();

    let shallow = repo.dependencies(["finagle/finagle-mux"], 0).unwrap();
    assert_eq!(
        shallow,
        BTreeSet::from([
            "3rdparty/jvm/io/netty".to_string(),
            "finagle/finagle-core".to_string(),
            "finagle/finagle-mux".to_string(),
        ])
    );

    let deep = repo.dependencies(["finagle/finagle-mux"], 2).unwrap();
    assert!(deep.contains("util/util-core"));
    assert!(deep.contains("science/tools"));
}

#[test]
fn test_project_dependencies_filter_reserved_and_nested() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();
    let projects = repo.project_dependencies(["finagle/finagle-mux"], 3).unwrap();
    assert_eq!(
        projects,
        BTreeSet::from([
            "3rdparty".to_string(),
            "finagle".to_string(),
            "util".to_string(),
        ])
    );
}

#[test]
fn test_projects_listing() {
    let temp = monorepo();
    let repo = Repository::open(temp.path()).unwrap();
    let projects: Vec<String> = repo.projects().unwrap().into_iter().collect();
    assert_eq!(projects, vec!["3rdparty", "broken", "finagle", "util"]);
}

#[test]
fn test_parse_all_reports_summary() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();
    let buildpaths = repo.find_buildpaths("", 6).unwrap();
    assert_eq!(buildpaths.len(), 6);

    let summary = repo.parse_all(&buildpaths).unwrap();
    assert_eq!(summary.total(), 6);
    assert_eq!(summary.ok.len(), 5);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "broken");
    assert!(!summary.is_success());
}

#[test]
fn test_runaway_descriptors_fail_alone() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("pants.ini"), "").unwrap();
    let nested = format!("x = {}1{}\n", "(".repeat(200_000), ")".repeat(200_000));
    write_build(root, "nested", &nested);
    write_build(root, "doubling", "l = [0]\nfor i in range(64):\n    l = l + l\n");
    write_build(root, "good", "java_library(name='good')\n");

    let mut repo = Repository::open(root).unwrap();
    let summary = repo.parse_all(["nested", "doubling", "good"]).unwrap();
    assert_eq!(summary.ok, vec!["good"]);
    let failed: Vec<&str> = summary.failed.iter().map(|(bp, _)| bp.as_str()).collect();
    assert_eq!(failed, vec!["nested", "doubling"]);
}

#[test]
fn test_find_targets_skips_failures() {
    let temp = monorepo();
    let mut repo = Repository::open(temp.path()).unwrap();
    let targets = repo.find_targets("", 6).unwrap();
    assert!(targets.contains(&"science/tools:tools".to_string()));
    assert!(!targets.iter().any(|t| t.starts_with("broken")));
}

#[test]
fn test_custom_descriptor_name_from_config_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("pants.ini"), "").unwrap();
    let config = Config {
        descriptor_name: "BUILD.pants".to_string(),
        ..Config::default()
    };
    config.save_to_file(&root.join(".buildgraph.json")).unwrap();
    fs::create_dir_all(root.join("svc")).unwrap();
    fs::write(root.join("svc/BUILD.pants"), "target(name='svc')\n").unwrap();

    let mut repo = Repository::discover(root.join("svc")).unwrap();
    assert_eq!(repo.config().descriptor_name, "BUILD.pants");
    assert_eq!(repo.find_buildpaths("", 3).unwrap(), vec!["svc"]);
    assert_eq!(repo.get_targets("svc").unwrap(), vec!["svc", "svc:svc"]);
}

#[test]
fn test_discover_without_marker_fails() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        root_markers: vec!["definitely-not-here.ini".to_string()],
        ..Config::default()
    };
    config.save_to_file(&temp.path().join(".buildgraph.json")).unwrap();
    let err = Repository::discover(temp.path()).unwrap_err();
    assert!(matches!(err, Error::NoRepositoryRootFound { .. }));
}
