use crate::descriptor::{Descriptor, DescriptorParser};
use crate::error::DescriptorError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Memoized parse results keyed by buildpath.
///
/// Successes and failures are both kept until [`DescriptorCache::flush`] or
/// [`DescriptorCache::invalidate`]; a failing buildpath is not retried.
#[derive(Debug)]
pub struct DescriptorCache {
    parser: DescriptorParser,
    entries: HashMap<String, Result<Arc<Descriptor>, DescriptorError>>,
}

impl DescriptorCache {
    pub fn new(parser: DescriptorParser) -> Self {
        Self {
            parser,
            entries: HashMap::new(),
        }
    }

    pub fn parser(&self) -> &DescriptorParser {
        &self.parser
    }

    /// Cached descriptor for `buildpath`, parsing it on first request
    pub fn parse(&mut self, buildpath: &str) -> Result<Arc<Descriptor>, DescriptorError> {
        if let Some(entry) = self.entries.get(buildpath) {
            debug!(buildpath, "descriptor cache hit");
            return entry.clone();
        }

        let entry = self.parser.parse(buildpath).map(Arc::new);
        self.entries.insert(buildpath.to_string(), entry.clone());
        entry
    }

    /// Cached entry without parsing
    pub fn get(&self, buildpath: &str) -> Option<&Result<Arc<Descriptor>, DescriptorError>> {
        self.entries.get(buildpath)
    }

    pub fn contains(&self, buildpath: &str) -> bool {
        self.entries.contains_key(buildpath)
    }

    pub fn invalidate(&mut self, buildpath: &str) -> bool {
        self.entries.remove(buildpath).is_some()
    }

    pub fn flush(&mut self) {
        debug!(entries = self.entries.len(), "flushing descriptor cache");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
