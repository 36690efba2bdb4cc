use std::path::PathBuf;

use anyhow::{Context, Result};
use buildgraph_core::{CancellationToken, Repository};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::commands::{
    check_command, deps_command, find_command, project_deps_command, projects_command,
    targets_command,
};

/// Inspect Pants BUILD descriptors and their dependency graph
#[derive(Parser, Debug)]
#[command(name = "buildgraph")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Repository root (discovered from the current directory by default)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse every descriptor under a directory and report failures
    #[command(visible_alias = "c")]
    Check {
        /// Repo-relative directory to search (defaults to the root)
        #[arg(default_value = "")]
        relpath: String,

        /// Maximum directory depth to search
        #[arg(short, long)]
        depth: Option<usize>,

        /// Also print diagnostics of descriptors that parsed
        #[arg(short, long)]
        warnings: bool,
    },
    /// List the target ids declared by buildpaths
    #[command(visible_alias = "t")]
    Targets {
        #[arg(required = true)]
        buildpaths: Vec<String>,
    },
    /// List the buildpaths a target or buildpath depends on
    Deps {
        /// Target id (e.g. finagle/finagle-mux:lib) or buildpath
        target: String,

        /// Number of expansion waves
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// List the top-level projects of the repository
    Projects,
    /// List the projects that buildpaths depend on
    ProjectDeps {
        #[arg(required = true)]
        buildpaths: Vec<String>,

        /// Number of expansion waves
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// List buildpaths holding a descriptor
    #[command(visible_alias = "f")]
    Find {
        /// Repo-relative directory to search (defaults to the root)
        #[arg(default_value = "")]
        relpath: String,

        /// Maximum directory depth to search
        #[arg(short, long)]
        depth: Option<usize>,
    },
}

impl Cli {
    /// Opens the repository and runs the selected command
    pub fn execute(self, cancellation: CancellationToken) -> Result<()> {
        let repo = self.global.open_repository()?.with_cancellation(cancellation);
        debug!(root = %repo.root().display(), command = ?self.command, "executing");
        self.command.execute(repo, self.global.json)
    }
}

impl GlobalArgs {
    pub fn open_repository(&self) -> Result<Repository> {
        match &self.root {
            Some(root) => Repository::open(root)
                .with_context(|| format!("Failed to open repository at {}", root.display())),
            None => {
                let cwd = std::env::current_dir().context("Failed to read current directory")?;
                Repository::discover(&cwd).with_context(|| {
                    format!("No repository found from {} (use --root)", cwd.display())
                })
            }
        }
    }
}

impl Commands {
    pub fn execute(self, mut repo: Repository, json: bool) -> Result<()> {
        match self {
            Commands::Check {
                relpath,
                depth,
                warnings,
            } => {
                let depth = depth.unwrap_or(repo.config().find_depth);
                check_command(&mut repo, &relpath, depth, warnings, json)
            }
            Commands::Targets { buildpaths } => targets_command(&mut repo, &buildpaths, json),
            Commands::Deps { target, depth } => {
                let depth = depth.unwrap_or(repo.config().dependency_depth);
                deps_command(&mut repo, &target, depth, json)
            }
            Commands::Projects => projects_command(&repo, json),
            Commands::ProjectDeps { buildpaths, depth } => {
                let depth = depth.unwrap_or(repo.config().dependency_depth);
                project_deps_command(&mut repo, &buildpaths, depth, json)
            }
            Commands::Find { relpath, depth } => {
                let depth = depth.unwrap_or(repo.config().find_depth);
                find_command(&repo, &relpath, depth, json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["buildgraph", "deps", "a/b:lib", "--json", "-d", "4"]);
        assert!(cli.global.json);
        assert!(cli.global.root.is_none());
        match cli.command {
            Commands::Deps { target, depth } => {
                assert_eq!(target, "a/b:lib");
                assert_eq!(depth, Some(4));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_relpath_defaults_to_root() {
        let cli = Cli::parse_from(["buildgraph", "--root", "/repo", "find"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/repo")));
        assert!(matches!(
            cli.command,
            Commands::Find { relpath, depth: None } if relpath.is_empty()
        ));
    }

    #[test]
    fn test_targets_requires_a_buildpath() {
        assert!(Cli::try_parse_from(["buildgraph", "targets"]).is_err());
        assert!(Cli::try_parse_from(["buildgraph", "project-deps"]).is_err());
    }
}
