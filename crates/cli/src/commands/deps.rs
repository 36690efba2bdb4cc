use anyhow::{Context, Result};
use buildgraph_core::Repository;
use tracing::warn;

use crate::display::print_lines;

/// Prints the buildpaths reachable from a target id or buildpath
pub fn deps_command(repo: &mut Repository, target: &str, depth: usize, json: bool) -> Result<()> {
    let reference = repo.to_buildpath(target);
    let buildpath = repo.get_buildpath(&reference).to_string();

    let graph = repo
        .resolve([buildpath.as_str()], depth)
        .with_context(|| format!("Failed to resolve dependencies of '{target}'"))?;

    for (failed, err) in &graph.failures {
        if *failed == buildpath {
            return Err(err.clone()).with_context(|| format!("Failed to parse '{buildpath}'"));
        }
        warn!("{failed}: {err}");
    }
    for unresolved in &graph.unresolved {
        warn!("{}", unresolved.to_error());
    }

    print_lines(graph.dependency_buildpaths(), json)
}

pub fn project_deps_command(
    repo: &mut Repository,
    buildpaths: &[String],
    depth: usize,
    json: bool,
) -> Result<()> {
    let buildpaths: Vec<String> = buildpaths
        .iter()
        .map(|input| repo.to_buildpath(input))
        .collect();

    let projects = repo
        .project_dependencies(&buildpaths, depth)
        .context("Failed to resolve project dependencies")?;
    print_lines(projects, json)
}
