//! Duplicate / same-event clustering: cache, comparator seam and resolver.

pub mod cache;
pub mod comparator;
pub mod resolver;

pub use cache::{cache_key, ClusterCache, TtlCache};
pub use comparator::{
    build_comparator, parse_comparison, Comparison, DisabledComparator, DynComparator,
    EventComparator, FixedComparator,
};
pub use resolver::{ClusterMatch, ClusterResolver};
