//! Per-buildpath memoization of parsed descriptors

pub mod descriptor_cache;

pub use descriptor_cache::DescriptorCache;
