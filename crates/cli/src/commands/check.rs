use anyhow::{Context, Result, bail};
use buildgraph_core::Repository;
use tracing::debug;

use crate::display::print_json;

pub fn check_command(
    repo: &mut Repository,
    relpath: &str,
    depth: usize,
    show_warnings: bool,
    json: bool,
) -> Result<()> {
    let buildpaths = repo
        .find_buildpaths(relpath, depth)
        .with_context(|| format!("Failed to search '{relpath}' for descriptors"))?;
    debug!("Checking {} descriptors", buildpaths.len());

    let summary = repo.parse_all(&buildpaths)?;

    if json {
        print_json(&summary)?;
    } else {
        if show_warnings {
            for buildpath in &summary.ok {
                let descriptor = repo.parse(buildpath)?;
                for warning in &descriptor.warnings {
                    eprintln!("warning: {buildpath}: {warning}");
                }
            }
        }
        for (buildpath, err) in &summary.failed {
            println!("FAILED {buildpath}: {err}");
        }
        println!(
            "{} ok, {} failed ({} descriptors)",
            summary.ok.len(),
            summary.failed.len(),
            summary.total()
        );
    }

    if !summary.is_success() {
        bail!(
            "{} of {} descriptors failed to parse",
            summary.failed.len(),
            summary.total()
        );
    }
    Ok(())
}
