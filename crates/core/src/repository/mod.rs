//! Repository facade: descriptor discovery, project classification and
//! dependency queries over one repository root

pub mod paths;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::DescriptorCache;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::descriptor::{Descriptor, DescriptorParser, split_target};
use crate::error::{DescriptorError, Error, Result};
use crate::resolver::{DependencyGraph, DependencyResolver};

/// Outcome of parsing a batch of buildpaths
#[derive(Debug, Default, Serialize)]
pub struct ParseSummary {
    pub ok: Vec<String>,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(String, DescriptorError)>,
}

impl ParseSummary {
    pub fn total(&self) -> usize {
        self.ok.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_failures<S>(
    failed: &[(String, DescriptorError)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(failed.len()))?;
    for (buildpath, err) in failed {
        map.serialize_entry(buildpath, &err.to_string())?;
    }
    map.end()
}

/// A code repository made of top-level projects, each holding buildpaths.
///
/// | term      | example                        |
/// |-----------|--------------------------------|
/// | target    | `finagle/finagle-mux:lib`      |
/// | buildpath | `finagle/finagle-mux`          |
/// | project   | `finagle`                      |
/// | relpath   | `finagle/finagle-mux/src`      |
/// | abspath   | `/home/you/source/finagle/...` |
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    config: Config,
    cache: DescriptorCache,
    cancellation: CancellationToken,
}

impl Repository {
    /// Opens the repository rooted at `root`, loading its config file if any
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load_for_root(&root)?;
        Self::with_config(root, config)
    }

    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root = paths::normalize(&std::path::absolute(root.into())?);
        if !root.is_dir() {
            return Err(Error::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("repository root {} is not a directory", root.display()),
            )));
        }
        config.validate()?;

        let parser = DescriptorParser::with_config(&root, &config);
        Ok(Self {
            cache: DescriptorCache::new(parser),
            root,
            config,
            cancellation: CancellationToken::new(),
        })
    }

    /// Walks upward from `start` to the first directory holding a root
    /// marker and opens the repository there
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = paths::normalize(&std::path::absolute(start.as_ref())?);
        let config = match Config::find_config_file(&start) {
            Some(path) => {
                debug!("Using config {:?}", path);
                Config::load_from_file(&path)?
            }
            None => Config::default(),
        };
        let root = Self::find_root(&start, &config.root_markers)?;
        info!(root = %root.display(), "discovered repository root");
        Self::with_config(root, config)
    }

    pub fn find_root(start: &Path, markers: &[String]) -> Result<PathBuf> {
        start
            .ancestors()
            .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NoRepositoryRootFound {
                start: start.to_path_buf(),
                markers: markers.to_vec(),
            })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    pub fn flush(&mut self) {
        self.cache.flush();
    }

    // Path translation

    /// Absolute path for a repo-relative path; existence is not checked
    pub fn abspath(&self, relpath: &str) -> PathBuf {
        paths::normalize(&self.root.join(relpath))
    }

    /// Repo-relative form of `path`, `.` for the root itself.
    ///
    /// `path` is normally absolute. A relative `path` is taken as relative
    /// to the root (not the working directory) and comes back normalized.
    /// Paths outside the root yield leading `..` components.
    pub fn relpath(&self, path: impl AsRef<Path>) -> String {
        paths::relative_to(&self.root.join(path.as_ref()), &self.root)
            .to_string_lossy()
            .into_owned()
    }

    /// Buildpath named by user input: an absolute path, a `//`-rooted path
    /// or a plain relative path
    pub fn to_buildpath(&self, input: &str) -> String {
        if input.starts_with('/') && !input.starts_with("//") {
            paths::clean_buildpath(&self.relpath(input))
        } else {
            paths::clean_buildpath(input)
        }
    }

    // Classification

    /// True for a direct child directory of the root that is neither hidden
    /// nor reserved
    pub fn is_project(&self, path_or_project: &str) -> bool {
        let relpath = if path_or_project.starts_with('/') {
            self.relpath(path_or_project)
        } else {
            path_or_project.to_string()
        };

        !(relpath.is_empty()
            || relpath.contains('/')
            || relpath.starts_with('.')
            || self.config.reserved_projects.contains(&relpath))
            && self.root.join(&relpath).is_dir()
    }

    /// Top-level projects of the repository
    pub fn projects(&self) -> Result<BTreeSet<String>> {
        let mut projects = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if self.is_project(name) {
                    projects.insert(name.to_string());
                }
            }
        }
        Ok(projects)
    }

    pub fn get_project<'t>(&self, target_or_buildpath: &'t str) -> &'t str {
        let buildpath = self.get_buildpath(target_or_buildpath);
        buildpath.split('/').next().unwrap_or(buildpath)
    }

    pub fn get_buildpath<'t>(&self, target: &'t str) -> &'t str {
        split_target(target).0
    }

    // Discovery

    /// Buildpaths under `relpath` whose descriptor lies at most `depth`
    /// levels down, hidden directories skipped. Sorted by path.
    pub fn find_buildpaths(&self, relpath: &str, depth: usize) -> Result<Vec<String>> {
        let start = self.abspath(relpath);
        let descriptor_name = self.config.descriptor_name.as_str();
        let mut found = Vec::new();

        let walker = WalkDir::new(&start)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            self.cancellation.check()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() && entry.file_name().to_str() == Some(descriptor_name) {
                if let Some(dir) = entry.path().parent() {
                    found.push(paths::clean_buildpath(&self.relpath(dir)));
                }
            }
        }

        found.sort();
        debug!(relpath, depth, found = found.len(), "found buildpaths");
        Ok(found)
    }

    /// Target ids declared under `relpath`; descriptors that fail to parse
    /// are logged and skipped
    pub fn find_targets(&mut self, relpath: &str, depth: usize) -> Result<Vec<String>> {
        let mut targets = Vec::new();
        for buildpath in self.find_buildpaths(relpath, depth)? {
            self.cancellation.check()?;
            match self.get_targets(&buildpath) {
                Ok(ids) => targets.extend(ids),
                Err(err) => warn!(buildpath = %buildpath, error = %err, "skipping descriptor"),
            }
        }
        Ok(targets)
    }

    // Parsing

    pub fn parse(&mut self, buildpath: &str) -> std::result::Result<Arc<Descriptor>, DescriptorError> {
        self.cache.parse(buildpath)
    }

    /// Sorted target ids of one buildpath, root target included
    pub fn get_targets(&mut self, buildpath: &str) -> std::result::Result<Vec<String>, DescriptorError> {
        let descriptor = self.cache.parse(buildpath)?;
        Ok(descriptor.target_ids().map(str::to_string).collect())
    }

    /// Parses every buildpath, collecting failures instead of stopping at
    /// the first one
    pub fn parse_all<I, S>(&mut self, buildpaths: I) -> Result<ParseSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = ParseSummary::default();
        for buildpath in buildpaths {
            self.cancellation.check()?;
            let buildpath = buildpath.as_ref();
            match self.cache.parse(buildpath) {
                Ok(_) => summary.ok.push(buildpath.to_string()),
                Err(err) => {
                    warn!(buildpath, error = %err, "descriptor failed");
                    summary.failed.push((buildpath.to_string(), err));
                }
            }
        }
        info!(
            ok = summary.ok.len(),
            failed = summary.failed.len(),
            "parsed descriptors"
        );
        Ok(summary)
    }

    // Dependency queries

    pub fn resolve<I, S>(&mut self, buildpaths: I, depth: usize) -> Result<DependencyGraph>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        DependencyResolver::new(&mut self.cache)
            .with_cancellation(self.cancellation.clone())
            .resolve(buildpaths, depth)
    }

    /// Buildpaths of every dependency reachable from `buildpaths` within
    /// `depth` waves
    pub fn dependencies<I, S>(&mut self, buildpaths: I, depth: usize) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.resolve(buildpaths, depth)?.dependency_buildpaths())
    }

    /// Projects that `buildpaths` depend on within `depth` waves
    pub fn project_dependencies<I, S>(
        &mut self,
        buildpaths: I,
        depth: usize,
    ) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let projects = self
            .dependencies(buildpaths, depth)?
            .iter()
            .map(|buildpath| self.get_project(buildpath).to_string())
            .filter(|project| self.is_project(project))
            .collect();
        Ok(projects)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_build(root: &Path, buildpath: &str, source: &str) {
        let dir = root.join(buildpath);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("BUILD"), source).unwrap();
    }

    fn sample_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("pants.ini"), "").unwrap();
        for dir in ["finagle/finagle-mux", ".git", "science", "util"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("README"), "").unwrap();
        temp
    }

    #[test]
    fn test_is_project() {
        let temp = sample_repo();
        let repo = Repository::open(temp.path()).unwrap();

        assert!(repo.is_project("finagle"));
        assert!(!repo.is_project(".git"));
        assert!(!repo.is_project("science"));
        assert!(!repo.is_project("finagle/finagle-mux"));
        assert!(!repo.is_project("README"));
        assert!(!repo.is_project("missing"));
        assert!(!repo.is_project(""));

        let absolute = repo.root().join("util");
        assert!(repo.is_project(absolute.to_str().unwrap()));
    }

    #[test]
    fn test_projects() {
        let temp = sample_repo();
        let repo = Repository::open(temp.path()).unwrap();
        let projects: Vec<String> = repo.projects().unwrap().into_iter().collect();
        assert_eq!(projects, vec!["finagle", "util"]);
    }

    #[test]
    fn test_reserved_projects_come_from_config() {
        let temp = sample_repo();
        let config = Config {
            reserved_projects: vec!["util".to_string()],
            ..Config::default()
        };
        let repo = Repository::with_config(temp.path(), config).unwrap();
        assert!(repo.is_project("science"));
        assert!(!repo.is_project("util"));
    }

    #[test]
    fn test_path_translation() {
        let temp = sample_repo();
        let repo = Repository::open(temp.path()).unwrap();
        let abs = repo.abspath("finagle/../finagle/finagle-mux");
        assert_eq!(abs, repo.root().join("finagle/finagle-mux"));
        assert_eq!(repo.relpath(&abs), "finagle/finagle-mux");
        assert_eq!(repo.relpath(repo.root()), ".");
        assert_eq!(repo.relpath("finagle/./finagle-mux/../finagle-core"), "finagle/finagle-core");
        let outside = repo.root().parent().unwrap().join("elsewhere");
        assert_eq!(repo.relpath(&outside), "../elsewhere");
        assert_eq!(repo.to_buildpath(abs.to_str().unwrap()), "finagle/finagle-mux");
        assert_eq!(repo.to_buildpath("//finagle/"), "finagle");
    }

    #[test]
    fn test_project_and_buildpath_of_target() {
        let temp = sample_repo();
        let repo = Repository::open(temp.path()).unwrap();
        assert_eq!(repo.get_buildpath("finagle/finagle-mux:lib"), "finagle/finagle-mux");
        assert_eq!(repo.get_project("finagle/finagle-mux:lib"), "finagle");
        assert_eq!(repo.get_project("util"), "util");
    }

    #[test]
    fn test_find_buildpaths_respects_depth_and_hidden() {
        let temp = sample_repo();
        let root = temp.path();
        write_build(root, "", "");
        write_build(root, "finagle", "");
        write_build(root, "finagle/finagle-mux", "");
        write_build(root, "finagle/finagle-mux/src/main", "");
        write_build(root, ".git/hooks", "");

        let repo = Repository::open(root).unwrap();
        assert_eq!(
            repo.find_buildpaths("", 3).unwrap(),
            vec!["", "finagle", "finagle/finagle-mux"]
        );
        assert_eq!(repo.find_buildpaths("finagle", 1).unwrap(), vec!["finagle"]);
        assert_eq!(
            repo.find_buildpaths("finagle/finagle-mux", 5).unwrap(),
            vec!["finagle/finagle-mux", "finagle/finagle-mux/src/main"]
        );
        assert!(repo.find_buildpaths("nowhere", 3).is_err());
    }

    #[test]
    fn test_discover_walks_upward() {
        let temp = sample_repo();
        let nested = temp.path().join("finagle/finagle-mux");
        let repo = Repository::discover(&nested).unwrap();
        assert_eq!(repo.root(), paths::normalize(temp.path()));

        let bare = TempDir::new().unwrap();
        let config = Config {
            root_markers: vec!["no-such-marker.ini".to_string()],
            ..Config::default()
        };
        let err = Repository::find_root(bare.path(), &config.root_markers).unwrap_err();
        assert!(matches!(err, Error::NoRepositoryRootFound { .. }));
    }

    #[test]
    fn test_cancelled_find_returns_error() {
        let temp = sample_repo();
        let token = CancellationToken::new();
        let repo = Repository::open(temp.path()).unwrap().with_cancellation(token.clone());
        token.cancel();
        assert!(matches!(repo.find_buildpaths("", 3), Err(Error::Cancelled)));
    }
}
