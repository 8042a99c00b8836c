//! Phase 2: The Brain
//!
//! Responsible for:
//! - Ranking the K best skeleton paths of merged edges (memoized,
//!   colored or stacked DFS)
//! - Expanding skeletons into the K best concrete quote paths

mod dfs_colored;
mod dfs_memo;
mod dfs_stacked;
mod expansion;
mod memo;
mod path;
mod searcher;
mod top_k;

pub use dfs_colored::ColoredSearcher;
pub use dfs_memo::MemoSearcher;
pub use dfs_stacked::{reachability, StackedSearcher};
pub use expansion::expand;
pub use memo::{memo_key, MemoTable, PathStats, TreeItem, TreeNode};
pub use path::{MemberRef, Quote, RankedPath, Skeleton, SortOrder, TargetPaths};
pub use searcher::{
    LimitOrderFilter, SearchOptions, Searcher, SearcherKind, SkeletonPass, ThresholdMode,
};
pub use top_k::BoundedTopK;

use crate::error::{Error, Result};

/// Build a searcher of the given kind.
pub fn new_searcher(kind: SearcherKind, options: SearchOptions) -> Result<Box<dyn Searcher>> {
    options.validate()?;
    if kind != SearcherKind::Memoized && options.threshold.needs_stats() {
        return Err(Error::configuration(format!(
            "{} searcher has no path statistics for threshold {:?}",
            kind, options.threshold
        )));
    }

    Ok(match kind {
        SearcherKind::Memoized => Box::new(MemoSearcher::new(options)),
        SearcherKind::Colored => Box::new(ColoredSearcher::new(options)),
        SearcherKind::Stacked => Box::new(StackedSearcher::new(options)),
    })
}
