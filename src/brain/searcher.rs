//! The `Searcher` capability and its fan-out operations.
//!
//! Every variant only has to rank skeleton paths for one resolved
//! (source, target) pair. Expansion, id resolution and the one-to-one /
//! one-to-many fan-outs are shared here.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use super::memo::PathStats;
use super::{expansion, BoundedTopK, RankedPath, Skeleton, SortOrder, TargetPaths};
use crate::cartographer::{MultiGraph, VertexId, VertexIndex};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearcherKind {
    #[serde(rename = "memo")]
    Memoized,
    #[serde(rename = "colored")]
    Colored,
    #[serde(rename = "stacked")]
    Stacked,
}

impl Default for SearcherKind {
    fn default() -> Self {
        SearcherKind::Memoized
    }
}

impl fmt::Display for SearcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearcherKind::Memoized => write!(f, "memo"),
            SearcherKind::Colored => write!(f, "colored"),
            SearcherKind::Stacked => write!(f, "stacked"),
        }
    }
}

impl FromStr for SearcherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memo" => Ok(SearcherKind::Memoized),
            "colored" => Ok(SearcherKind::Colored),
            "stacked" => Ok(SearcherKind::Stacked),
            other => Err(Error::configuration(format!("unknown searcher '{}'", other))),
        }
    }
}

/// Cutoff a finished path's weight must stay strictly below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMode {
    /// No cutoff; keep the K best paths whatever their weight.
    NotUsed,
    /// Only arbitrage (negative total weight).
    Zero,
    /// Mean weight over all source-to-target paths of the pass.
    Mean,
    /// Mean minus one standard deviation.
    MeanStdDev,
    Custom(f64),
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Zero
    }
}

impl ThresholdMode {
    pub fn needs_stats(&self) -> bool {
        matches!(self, ThresholdMode::Mean | ThresholdMode::MeanStdDev)
    }

    /// Resolve to a concrete cutoff. Statistics modes without any path give
    /// -inf so nothing qualifies.
    pub fn cutoff(&self, stats: Option<&PathStats>) -> f64 {
        match (self, stats) {
            (ThresholdMode::NotUsed, _) => f64::INFINITY,
            (ThresholdMode::Zero, _) => 0.0,
            (ThresholdMode::Custom(t), _) => *t,
            (ThresholdMode::Mean, Some(s)) if s.is_reachable() => s.mean(),
            (ThresholdMode::MeanStdDev, Some(s)) if s.is_reachable() => s.mean() - s.std_dev(),
            _ => f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOrderFilter {
    #[default]
    AllPaths,
    /// Keep only paths with at least one limit-order quote.
    LimitOrdersOnly,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Maximum hop count; `None` or out of range means `vertex_count - 1`.
    pub depth_limit: Option<usize>,
    pub threshold: ThresholdMode,
    pub limit_order_filter: LimitOrderFilter,
    pub sort_order: SortOrder,
    /// Run fan-out searches on the rayon pool.
    pub parallel: bool,
}

impl SearchOptions {
    pub fn validate(&self) -> Result<()> {
        if let ThresholdMode::Custom(t) = self.threshold {
            if !t.is_finite() {
                return Err(Error::configuration(format!("custom threshold {} is not finite", t)));
            }
        }
        Ok(())
    }

    /// Effective hop limit for a graph of `vertex_count` vertices.
    pub fn depth_for(&self, vertex_count: usize) -> u16 {
        let max = vertex_count.saturating_sub(1);
        let depth = match self.depth_limit {
            Some(d) if d >= 1 && d <= max => d,
            _ => max,
        };
        depth.clamp(1, u16::MAX as usize) as u16
    }

    pub fn limit_orders_only(&self) -> bool {
        self.limit_order_filter == LimitOrderFilter::LimitOrdersOnly
    }
}

/// Skeletons ranked by one (source, target) pass.
#[derive(Debug)]
pub struct SkeletonPass {
    pub queue: BoundedTopK<Skeleton>,
    pub threshold: f64,
    /// Skeletons were collected target-first.
    pub reversed: bool,
}

pub trait Searcher: Send + Sync {
    fn kind(&self) -> SearcherKind;

    fn options(&self) -> &SearchOptions;

    /// Rank up to `k` skeleton paths between two resolved vertices.
    fn rank_skeletons(&self, graph: &MultiGraph, source: VertexIndex, target: VertexIndex, k: usize) -> SkeletonPass;

    fn top_k(&self, graph: &MultiGraph, source: VertexId, target: VertexId, k: usize) -> Result<Vec<RankedPath>> {
        check_k(k)?;
        Ok(run_pair(self, graph, source, target, k))
    }

    /// One independent ranking per (sources[i], targets[i]).
    fn top_k_one_to_one(
        &self,
        graph: &MultiGraph,
        sources: &[VertexId],
        targets: &[VertexId],
        k: usize,
    ) -> Result<Vec<Vec<RankedPath>>> {
        check_k(k)?;
        if sources.len() != targets.len() {
            return Err(Error::configuration(format!(
                "{} sources but {} targets",
                sources.len(),
                targets.len()
            )));
        }

        let pairs: Vec<(VertexId, VertexId)> = sources.iter().copied().zip(targets.iter().copied()).collect();
        Ok(fan_out(self.options().parallel, &pairs, |&(source, target)| {
            run_pair(self, graph, source, target, k)
        }))
    }

    /// Per source, one independent ranking per target.
    fn top_k_one_to_many(
        &self,
        graph: &MultiGraph,
        sources: &[VertexId],
        targets: &[VertexId],
        k: usize,
    ) -> Result<Vec<Vec<TargetPaths>>> {
        check_k(k)?;
        Ok(fan_out(self.options().parallel, sources, |&source| {
            targets
                .iter()
                .map(|&target| TargetPaths {
                    target,
                    paths: run_pair(self, graph, source, target, k),
                })
                .collect()
        }))
    }

    /// Best cycles through each source.
    fn arbitrage(&self, graph: &MultiGraph, sources: &[VertexId], k: usize) -> Result<Vec<Vec<RankedPath>>> {
        self.top_k_one_to_one(graph, sources, sources, k)
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::configuration("k must be at least 1"));
    }
    Ok(())
}

fn fan_out<T, R, F>(parallel: bool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

fn run_pair<S>(searcher: &S, graph: &MultiGraph, source: VertexId, target: VertexId, k: usize) -> Vec<RankedPath>
where
    S: Searcher + ?Sized,
{
    let (Some(src), Some(dst)) = (graph.vertex_index(source), graph.vertex_index(target)) else {
        debug!("Unknown vertex in {} -> {}, empty result", source, target);
        return Vec::new();
    };

    let started = Instant::now();
    let pass = searcher.rank_skeletons(graph, src, dst, k);
    let skeletons = pass.queue.len();
    let paths = expansion::expand(graph, pass, k, searcher.options());

    debug!(
        "{} search {} -> {}: {} skeletons, {} paths in {:?}",
        searcher.kind(),
        source,
        target,
        skeletons,
        paths.len(),
        started.elapsed()
    );
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searcher_kind_parsing() {
        assert_eq!("memo".parse::<SearcherKind>().unwrap(), SearcherKind::Memoized);
        assert_eq!(" Stacked ".parse::<SearcherKind>().unwrap(), SearcherKind::Stacked);
        assert!(matches!("dijkstra".parse::<SearcherKind>(), Err(Error::Configuration(_))));
        assert_eq!(SearcherKind::Colored.to_string(), "colored");
    }

    #[test]
    fn test_depth_defaults() {
        let mut options = SearchOptions::default();
        assert_eq!(options.depth_for(10), 9);

        options.depth_limit = Some(3);
        assert_eq!(options.depth_for(10), 3);

        options.depth_limit = Some(0);
        assert_eq!(options.depth_for(10), 9);

        options.depth_limit = Some(50);
        assert_eq!(options.depth_for(10), 9);
        assert_eq!(options.depth_for(1), 1);
        assert_eq!(options.depth_for(1 << 20), 50);

        options.depth_limit = None;
        assert_eq!(options.depth_for(1 << 20), u16::MAX);
    }

    #[test]
    fn test_threshold_cutoffs() {
        let mut stats = PathStats::terminal(1.0);
        stats.absorb(&PathStats::terminal(3.0));

        assert_eq!(ThresholdMode::NotUsed.cutoff(None), f64::INFINITY);
        assert_eq!(ThresholdMode::Zero.cutoff(Some(&stats)), 0.0);
        assert_eq!(ThresholdMode::Custom(-0.5).cutoff(None), -0.5);
        assert_eq!(ThresholdMode::Mean.cutoff(Some(&stats)), 2.0);
        assert_eq!(ThresholdMode::MeanStdDev.cutoff(Some(&stats)), 1.0);
        assert_eq!(ThresholdMode::Mean.cutoff(Some(&PathStats::UNREACHABLE)), f64::NEG_INFINITY);
    }

    #[test]
    fn test_non_finite_custom_threshold_rejected() {
        let options = SearchOptions {
            threshold: ThresholdMode::Custom(f64::NAN),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = SearchOptions {
            threshold: ThresholdMode::Custom(f64::INFINITY),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
