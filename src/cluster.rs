//! Proximity Grouping Module
//!
//! Groups the feature rows of one replicon into clusters of elements lying
//! close to each other.
//!
//! # Grouping Method
//! 1. Sort rows by genomic position
//! 2. Start a new cluster whenever two consecutive `pos_beg` are more than
//!    `dist_threshold` apart
//! 3. On a circular replicon, the last and first clusters belong together
//!    when they are within `dist_threshold` of each other through the origin
//!    (see [`origin_join`])
//!
//! The element they form has a two-part span, `[start1, len]` and `[1, end2]`.

use std::fmt;
use std::str::FromStr;

use crate::error::IntegronError;
use crate::hits::FeatureRow;

// ============================================================================
// Topology
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Linear,
    Circular,
}

impl FromStr for Topology {
    type Err = IntegronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lin" | "linear" => Ok(Topology::Linear),
            "circ" | "circular" => Ok(Topology::Circular),
            other => Err(IntegronError::Config(format!(
                "Unknown topology '{}', expected 'lin' or 'circ'",
                other
            ))),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Linear => write!(f, "lin"),
            Topology::Circular => write!(f, "circ"),
        }
    }
}

// ============================================================================
// Span
// ============================================================================

/// Genomic extent of a cluster or integron (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Contiguous { start: usize, end: usize },
    /// Straddles the origin: `[start1, end1]` then `[start2, end2]`,
    /// with `end1` the replicon length and `start2 = 1`.
    WrappedAtOrigin {
        start1: usize,
        end1: usize,
        start2: usize,
        end2: usize,
    },
}

impl Span {
    /// The span as one or two intervals, in traversal order.
    pub fn parts(&self) -> Vec<(usize, usize)> {
        match *self {
            Span::Contiguous { start, end } => vec![(start, end)],
            Span::WrappedAtOrigin { start1, end1, start2, end2 } => {
                vec![(start1, end1), (start2, end2)]
            }
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, Span::WrappedAtOrigin { .. })
    }

    /// Whether `[beg, end]` intersects any part of the span.
    pub fn overlaps(&self, beg: usize, end: usize) -> bool {
        self.parts().iter().any(|&(s, e)| beg <= e && s <= end)
    }

    /// Index of the part holding `pos` (0 for contiguous spans).
    pub fn part_of(&self, pos: usize) -> usize {
        match *self {
            Span::Contiguous { .. } => 0,
            Span::WrappedAtOrigin { start1, .. } => usize::from(pos < start1),
        }
    }

    /// Replicon length, known only for wrapped spans.
    pub fn replicon_len(&self) -> Option<usize> {
        match *self {
            Span::Contiguous { .. } => None,
            Span::WrappedAtOrigin { end1, .. } => Some(end1),
        }
    }

    /// The span grown to cover `[beg, end]`. On a wrapped span, an interval
    /// lying between the two parts widens the nearer one.
    pub fn extended(self, beg: usize, end: usize) -> Span {
        match self {
            Span::Contiguous { start, end: stop } => Span::Contiguous {
                start: start.min(beg),
                end: stop.max(end),
            },
            Span::WrappedAtOrigin { start1, end1, start2, end2 } => {
                if beg >= start1 || end <= end2 {
                    self
                } else if beg.saturating_sub(end2) <= start1.saturating_sub(end) {
                    Span::WrappedAtOrigin { start1, end1, start2, end2: end2.max(end) }
                } else {
                    Span::WrappedAtOrigin { start1: start1.min(beg), end1, start2, end2 }
                }
            }
        }
    }

    /// Contiguous span over `rows`; `None` when empty.
    pub fn covering(rows: &[FeatureRow]) -> Option<Self> {
        let start = rows.iter().map(|r| r.pos_beg).min()?;
        let end = rows.iter().map(|r| r.pos_end).max()?;
        Some(Span::Contiguous { start, end })
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Span::Contiguous { start, end } => write!(f, "{}..{}", start, end),
            Span::WrappedAtOrigin { start1, end1, start2, end2 } => {
                write!(f, "join({}..{},{}..{})", start1, end1, start2, end2)
            }
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Validated grouping parameters for one replicon.
#[derive(Debug, Clone, Copy)]
pub struct GroupingParams {
    dist_threshold: usize,
    topology: Topology,
    replicon_len: usize,
}

impl GroupingParams {
    /// Rejects a non-positive distance threshold.
    pub fn new(dist_threshold: i64, topology: Topology, replicon_len: usize) -> Result<Self, IntegronError> {
        if dist_threshold <= 0 {
            return Err(IntegronError::Config(format!(
                "distance threshold must be a positive number of bp, got {}",
                dist_threshold
            )));
        }
        Ok(Self {
            dist_threshold: dist_threshold as usize,
            topology,
            replicon_len,
        })
    }

    pub fn dist_threshold(&self) -> usize {
        self.dist_threshold
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn replicon_len(&self) -> usize {
        self.replicon_len
    }
}

// ============================================================================
// Clustering
// ============================================================================

/// Rows lying close together on a replicon.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Rows in genomic order.
    pub rows: Vec<FeatureRow>,
    pub span: Span,
}

/// Groups `rows` into clusters in genomic order; the result does not depend
/// on input order.
pub fn group(mut rows: Vec<FeatureRow>, params: &GroupingParams) -> Vec<Cluster> {
    rows.sort_by(|a, b| a.genomic_cmp(b));

    let mut groups: Vec<Vec<FeatureRow>> = Vec::new();
    let mut prev_beg: Option<usize> = None;
    for row in rows {
        let split = match prev_beg {
            Some(beg) => row.pos_beg - beg > params.dist_threshold,
            None => true,
        };
        prev_beg = Some(row.pos_beg);
        if split {
            groups.push(Vec::new());
        }
        if let Some(current) = groups.last_mut() {
            current.push(row);
        }
    }

    groups
        .into_iter()
        .filter_map(|rows| Span::covering(&rows).map(|span| Cluster { rows, span }))
        .collect()
}

/// Span of the element formed by the last and first clusters through the
/// origin, `None` when the replicon is linear or they are too far apart.
pub fn origin_join(clusters: &[Cluster], params: &GroupingParams) -> Option<Span> {
    if params.topology != Topology::Circular || clusters.len() < 2 {
        return None;
    }
    let head = clusters.first()?;
    let tail = clusters.last()?;
    let start_head = head.rows.iter().map(|r| r.pos_beg).min()?;
    let end_head = head.rows.iter().map(|r| r.pos_end).max()?;
    let start_tail = tail.rows.iter().map(|r| r.pos_beg).min()?;
    let end_tail = tail.rows.iter().map(|r| r.pos_end).max()?;

    if params.replicon_len.saturating_sub(end_tail) + start_head > params.dist_threshold {
        return None;
    }
    let end1 = params.replicon_len.max(end_tail);
    log::debug!("Clusters joined through the origin: {}..{} + 1..{}", start_tail, end1, end_head);
    Some(Span::WrappedAtOrigin {
        start1: start_tail,
        end1,
        start2: 1,
        end2: end_head,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::{ElementKind, Strand};

    fn attc(id: &str, beg: usize, end: usize) -> FeatureRow {
        FeatureRow::attc(id, beg, end, Strand::Reverse)
    }

    fn cluster_ids(clusters: &[Cluster]) -> Vec<Vec<String>> {
        clusters
            .iter()
            .map(|c| c.rows.iter().map(|r| r.id.clone()).collect())
            .collect()
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        assert!(matches!(
            GroupingParams::new(0, Topology::Linear, 1000),
            Err(IntegronError::Config(_))
        ));
        assert!(GroupingParams::new(-5, Topology::Circular, 1000).is_err());
        assert!(GroupingParams::new(1, Topology::Linear, 1000).is_ok());
    }

    #[test]
    fn test_empty_input() {
        let params = GroupingParams::new(4000, Topology::Circular, 20301).unwrap();
        assert!(group(vec![], &params).is_empty());
    }

    #[test]
    fn test_single_cluster() {
        let params = GroupingParams::new(4000, Topology::Linear, 20301).unwrap();
        let rows = vec![
            attc("attc_001", 17825, 17884),
            attc("attc_002", 19080, 19149),
            attc("attc_003", 19618, 19726),
        ];
        let clusters = group(rows, &params);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].span, Span::Contiguous { start: 17825, end: 19726 });
    }

    #[test]
    fn test_split_on_gap() {
        let params = GroupingParams::new(1000, Topology::Linear, 50000).unwrap();
        let rows = vec![
            attc("a", 100, 160),
            attc("b", 1100, 1160),
            attc("c", 2101, 2160),
            attc("d", 3000, 3060),
        ];
        let clusters = group(rows, &params);
        // 1100 - 100 = 1000 stays together, 2101 - 1100 = 1001 splits
        assert_eq!(cluster_ids(&clusters), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_order_independence() {
        let params = GroupingParams::new(500, Topology::Circular, 10000).unwrap();
        let rows = vec![
            attc("a", 9800, 9860),
            attc("b", 100, 160),
            FeatureRow::new("p", ElementKind::Protein, 300, 900, Strand::Forward),
            attc("c", 5000, 5060),
            attc("d", 5400, 5460),
        ];
        let expected = cluster_ids(&group(rows.clone(), &params));

        let mut permuted = rows.clone();
        permuted.reverse();
        assert_eq!(cluster_ids(&group(permuted, &params)), expected);

        let mut rotated = rows;
        rotated.rotate_left(2);
        assert_eq!(cluster_ids(&group(rotated, &params)), expected);
    }

    #[test]
    fn test_wraparound_on_circular_replicon() {
        let params = GroupingParams::new(4000, Topology::Circular, 20301).unwrap();
        let rows = vec![
            FeatureRow::new("ACBA.007.P01_13_1", ElementKind::Protein, 55, 1014, Strand::Forward)
                .with_annotation("intI"),
            attc("attc_001", 17825, 17884),
            attc("attc_002", 19080, 19149),
            attc("attc_003", 19618, 19726),
        ];
        let clusters = group(rows, &params);
        assert_eq!(
            cluster_ids(&clusters),
            vec![vec!["ACBA.007.P01_13_1"], vec!["attc_001", "attc_002", "attc_003"]]
        );
        assert_eq!(
            origin_join(&clusters, &params),
            Some(Span::WrappedAtOrigin { start1: 17825, end1: 20301, start2: 1, end2: 1014 })
        );
    }

    #[test]
    fn test_no_wraparound_on_linear_replicon() {
        let params = GroupingParams::new(4000, Topology::Linear, 20301).unwrap();
        let rows = vec![
            FeatureRow::new("p_1", ElementKind::Protein, 55, 1014, Strand::Forward),
            attc("attc_001", 17825, 17884),
        ];
        let clusters = group(rows, &params);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| !c.span.is_wrapped()));
        assert_eq!(origin_join(&clusters, &params), None);
    }

    #[test]
    fn test_no_wraparound_when_far_from_origin() {
        let params = GroupingParams::new(1000, Topology::Circular, 20301).unwrap();
        let rows = vec![attc("attc_001", 900, 960), attc("attc_002", 19000, 19060)];
        let clusters = group(rows, &params);
        // 20301 - 19060 + 900 = 2141 bp through the origin
        assert_eq!(origin_join(&clusters, &params), None);
        assert_eq!(origin_join(&clusters[..1], &params), None);
    }

    #[test]
    fn test_span_overlaps_and_parts() {
        let span = Span::WrappedAtOrigin { start1: 9000, end1: 10000, start2: 1, end2: 500 };
        assert!(span.overlaps(9990, 10000));
        assert!(span.overlaps(400, 700));
        assert!(!span.overlaps(600, 8999));
        assert_eq!(span.parts(), vec![(9000, 10000), (1, 500)]);
        assert_eq!(span.part_of(9500), 0);
        assert_eq!(span.part_of(20), 1);
        assert_eq!(span.to_string(), "join(9000..10000,1..500)");
    }

    #[test]
    fn test_span_extended() {
        let span = Span::Contiguous { start: 1000, end: 2000 };
        assert_eq!(span.extended(900, 950), Span::Contiguous { start: 900, end: 2000 });
        assert_eq!(span.extended(1500, 1600), span);

        let wrapped = Span::WrappedAtOrigin { start1: 9000, end1: 10000, start2: 1, end2: 500 };
        assert_eq!(wrapped.extended(9500, 9600), wrapped);
        assert_eq!(
            wrapped.extended(520, 560),
            Span::WrappedAtOrigin { start1: 9000, end1: 10000, start2: 1, end2: 560 }
        );
        assert_eq!(
            wrapped.extended(8800, 8850),
            Span::WrappedAtOrigin { start1: 8800, end1: 10000, start2: 1, end2: 500 }
        );
    }

    #[test]
    fn test_topology_from_str() {
        assert_eq!("circ".parse::<Topology>().unwrap(), Topology::Circular);
        assert_eq!("Linear".parse::<Topology>().unwrap(), Topology::Linear);
        assert!("ring".parse::<Topology>().is_err());
    }
}
