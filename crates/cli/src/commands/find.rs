use anyhow::{Context, Result};
use buildgraph_core::Repository;

use crate::display::print_lines;

pub fn find_command(repo: &Repository, relpath: &str, depth: usize, json: bool) -> Result<()> {
    let buildpaths = repo
        .find_buildpaths(relpath, depth)
        .with_context(|| format!("Failed to search '{relpath}' for descriptors"))?;
    print_lines(buildpaths, json)
}

pub fn projects_command(repo: &Repository, json: bool) -> Result<()> {
    let projects = repo.projects().context("Failed to list projects")?;
    print_lines(projects, json)
}
