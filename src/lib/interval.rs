//! Chunked interval index for range queries.
//!
//! Instead of one tree node per interval, consecutive start-sorted features
//! are grouped into chunks of `max(10, n/100)`; each chunk is summarized by
//! its covering span `[min start, max end]`. A query touches only chunks
//! whose span intersects the range and scans each matching chunk linearly,
//! breaking early once starts pass the query end.

use crate::pairs::Alignment;

/// Anything with a genomic span.
pub trait Interval {
    /// Span start (0-based, inclusive)
    fn start(&self) -> i64;
    /// Span end
    fn end(&self) -> i64;
}

/// An [`Interval`] that also knows its chromosome, for use in a
/// [`FeatureCache`].
pub trait Feature: Interval {
    /// Chromosome name
    fn chrom(&self) -> &str;
}

impl Interval for crate::bam::record::AlignmentRecord {
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> i64 {
        self.end
    }
}

impl Feature for crate::bam::record::AlignmentRecord {
    fn chrom(&self) -> &str {
        &self.chr
    }
}

impl Interval for Alignment {
    fn start(&self) -> i64 {
        Alignment::start(self)
    }
    fn end(&self) -> i64 {
        Alignment::end(self)
    }
}

/// One chunk: the covering span of a run of consecutive sorted features.
#[derive(Debug, Clone)]
struct IntervalNode {
    start: i64,
    end: i64,
    /// Index range of the chunk's features in the sorted feature list
    range: std::ops::Range<usize>,
}

/// A chunked interval index over one feature list.
///
/// Built once; read-only afterward.
#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    features: Vec<T>,
    nodes: Vec<IntervalNode>,
}

impl<T: Interval> IntervalTree<T> {
    /// Build the index. `features` need not be pre-sorted.
    #[must_use]
    pub fn new(mut features: Vec<T>) -> Self {
        features.sort_by_key(|f| f.start());

        let n = features.len();
        let chunk_size = 10usize.max(n / 100);
        let mut nodes = Vec::with_capacity(n.div_ceil(chunk_size.max(1)));

        let mut i = 0;
        while i < n {
            let chunk_end = n.min(i + chunk_size);
            let start = features[i].start();
            let mut end = start;
            for feature in &features[i..chunk_end] {
                end = end.max(feature.end());
            }
            nodes.push(IntervalNode { start, end, range: i..chunk_end });
            i = chunk_end;
        }

        Self { features, nodes }
    }

    /// All features overlapping `[start, end]`, in start order.
    #[must_use]
    pub fn query(&self, start: i64, end: i64) -> Vec<&T> {
        let mut result = Vec::new();
        for node in &self.nodes {
            if node.start > end {
                break; // node min-starts are non-decreasing
            }
            if node.end < start {
                continue;
            }
            for feature in &self.features[node.range.clone()] {
                if feature.start() > end {
                    break; // chunks are internally start-sorted
                }
                if feature.end() >= start {
                    result.push(feature);
                }
            }
        }
        result
    }

    /// The full start-sorted feature list.
    #[must_use]
    pub fn features(&self) -> &[T] {
        &self.features
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Chromosome-keyed collection of interval trees.
///
/// Supports efficient sub-range queries over any chromosome-bucketed feature
/// list, e.g. an in-memory decoded alignment list or a parsed annotation
/// file.
#[derive(Debug, Clone)]
pub struct FeatureCache<T> {
    trees: ahash::AHashMap<String, IntervalTree<T>>,
    count: usize,
}

impl<T: Feature> FeatureCache<T> {
    /// Bucket `features` by chromosome and index each bucket.
    #[must_use]
    pub fn new(features: Vec<T>) -> Self {
        let count = features.len();
        let mut buckets: ahash::AHashMap<String, Vec<T>> = ahash::AHashMap::new();
        for feature in features {
            buckets.entry(feature.chrom().to_string()).or_default().push(feature);
        }
        let trees =
            buckets.into_iter().map(|(chrom, list)| (chrom, IntervalTree::new(list))).collect();
        Self { trees, count }
    }

    /// Features overlapping `[start, end]` on `chrom`, in start order.
    ///
    /// An unknown chromosome yields an empty result, never an error.
    #[must_use]
    pub fn query_features(&self, chrom: &str, start: i64, end: i64) -> Vec<&T> {
        match self.trees.get(chrom) {
            Some(tree) => tree.query(start, end),
            None => Vec::new(),
        }
    }

    /// Total feature count across chromosomes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Indexed chromosome names, unordered.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }
}
