//! Breadth-first, depth-bounded expansion of descriptor dependencies

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::DescriptorCache;
use crate::cancel::CancellationToken;
use crate::descriptor::{BuildTarget, split_target};
use crate::error::{DescriptorError, Error, Result};

/// A dependency reference with no directory portion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub reference: String,
    /// Id of the target that declared the reference
    pub declared_in: String,
}

impl UnresolvedReference {
    pub fn to_error(&self) -> Error {
        Error::UnresolvedDependencyReference {
            reference: self.reference.clone(),
            declared_in: self.declared_in.clone(),
        }
    }
}

/// Result of one resolution pass
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Union of the targets of every visited descriptor
    pub targets: BTreeMap<String, Arc<BuildTarget>>,
    /// Buildpaths visited at each expansion wave, starting set first
    pub levels: Vec<BTreeSet<String>>,
    /// Buildpaths whose descriptor could not be read or executed
    pub failures: Vec<(String, DescriptorError)>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl DependencyGraph {
    /// Directory portion of every dependency reference in the graph
    pub fn dependency_buildpaths(&self) -> BTreeSet<String> {
        self.targets
            .values()
            .flat_map(|target| target.dependencies.iter())
            .map(|dep| split_target(dep).0)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Every buildpath visited, in wave order
    pub fn visited(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Walks dependency references outward from a set of buildpaths.
///
/// Expansion is by directory: each wave parses every buildpath in the
/// cursor, then moves on to the directories their dependencies name that
/// have not been visited yet.
pub struct DependencyResolver<'c> {
    cache: &'c mut DescriptorCache,
    cancellation: Option<CancellationToken>,
}

impl<'c> DependencyResolver<'c> {
    pub fn new(cache: &'c mut DescriptorCache) -> Self {
        Self {
            cache,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    /// Targets of `starts` plus `depth` waves of dependency expansion.
    ///
    /// A descriptor that fails to parse is recorded in
    /// [`DependencyGraph::failures`] and does not stop the pass. Only
    /// cancellation aborts it.
    pub fn resolve<I, S>(&mut self, starts: I, depth: usize) -> Result<DependencyGraph>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut graph = DependencyGraph::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut cursor: BTreeSet<String> = starts
            .into_iter()
            .map(|start| start.as_ref().to_string())
            .collect();
        let mut remaining = depth;

        while !cursor.is_empty() {
            debug!(wave = graph.levels.len(), buildpaths = cursor.len(), "resolving wave");
            let mut discovered = BTreeSet::new();

            for buildpath in &cursor {
                self.check_cancelled()?;
                visited.insert(buildpath.clone());

                let descriptor = match self.cache.parse(buildpath) {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        warn!(buildpath = %buildpath, error = %err, "skipping descriptor");
                        graph.failures.push((buildpath.clone(), err));
                        continue;
                    }
                };

                for (id, target) in &descriptor.targets {
                    for dep in &target.dependencies {
                        let (path, _) = split_target(dep);
                        if path.is_empty() {
                            record_unresolved(&mut graph, dep, id);
                        } else {
                            discovered.insert(path.to_string());
                        }
                    }
                    graph.targets.insert(id.clone(), Arc::clone(target));
                }
            }

            graph.levels.push(std::mem::take(&mut cursor));
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            cursor = discovered
                .into_iter()
                .filter(|path| !visited.contains(path))
                .collect();
        }

        debug!(
            targets = graph.targets.len(),
            waves = graph.levels.len(),
            failures = graph.failures.len(),
            "resolution finished"
        );
        Ok(graph)
    }
}

fn record_unresolved(graph: &mut DependencyGraph, reference: &str, declared_in: &str) {
    let already = graph
        .unresolved
        .iter()
        .any(|u| u.reference == reference && u.declared_in == declared_in);
    if already {
        return;
    }
    warn!(reference, declared_in, "dropping dependency reference without a directory");
    graph.unresolved.push(UnresolvedReference {
        reference: reference.to_string(),
        declared_in: declared_in.to_string(),
    });
}
