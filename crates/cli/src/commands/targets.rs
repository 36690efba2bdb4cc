use anyhow::{Context, Result};
use buildgraph_core::Repository;

use crate::display::{print_json, print_lines};

/// Prints the sorted target ids of each buildpath; with `--json`, the
/// parsed descriptors themselves
pub fn targets_command(repo: &mut Repository, buildpaths: &[String], json: bool) -> Result<()> {
    let mut descriptors = Vec::with_capacity(buildpaths.len());
    for input in buildpaths {
        let buildpath = repo.to_buildpath(input);
        let descriptor = repo
            .parse(&buildpath)
            .with_context(|| format!("Failed to parse descriptor for '{input}'"))?;
        descriptors.push(descriptor);
    }

    if json {
        let descriptors: Vec<_> = descriptors.iter().map(|d| d.as_ref()).collect();
        return print_json(&descriptors);
    }

    let mut ids: Vec<&str> = descriptors.iter().flat_map(|d| d.target_ids()).collect();
    ids.sort_unstable();
    ids.dedup();
    print_lines(ids, false)
}
