//! Feature Row Module
//!
//! The uniform record every detected element is normalized into, whatever
//! search tool produced it: integrase and cassette proteins from `hmmsearch`,
//! attC sites from `cmsearch`, attI sites and promoters.
//!
//! # Dedup Rule
//! When two passes report the same element, the row with the lowest evalue
//! wins; among equal evalues the first in [`FeatureRow::genomic_cmp`] order
//! does, so the winner never depends on input order. The same rule is used
//! by the classifier and by functional annotation.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::fmt;

/// Annotation carried by integrase proteins.
pub const INTEGRASE_ANNOTATION: &str = "intI";
/// Annotation carried by attC sites.
pub const ATTC_ANNOTATION: &str = "attC";

// ============================================================================
// Element Kind
// ============================================================================

/// Category of a detected element (`type_elt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Protein,
    AttC,
    AttI,
    Promoter,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Protein => "protein",
            ElementKind::AttC => "attC",
            ElementKind::AttI => "attI",
            ElementKind::Promoter => "promoter",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Strand
// ============================================================================

/// Strand of an element. `Unstranded` is used for aggregate spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    Unstranded,
}

impl Strand {
    pub fn as_i8(&self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
            Strand::Unstranded => 0,
        }
    }

    /// Parses `1`/`-1`/`0` as well as `+`/`-`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1" | "+1" | "+" => Some(Strand::Forward),
            "-1" | "-" => Some(Strand::Reverse),
            "0" | "." => Some(Strand::Unstranded),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

// ============================================================================
// Feature Row
// ============================================================================

/// One detected genomic element.
///
/// Coordinates are 1-based and inclusive with `pos_beg <= pos_end` whatever the
/// strand. `evalue` and `distance_2attc` are `NaN` when not applicable.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub id: String,
    pub pos_beg: usize,
    pub pos_end: usize,
    pub strand: Strand,
    pub evalue: f64,
    pub kind: ElementKind,
    pub model: String,
    pub annotation: String,
    pub distance_2attc: f64,
}

impl FeatureRow {
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        pos_beg: usize,
        pos_end: usize,
        strand: Strand,
    ) -> Self {
        let (pos_beg, pos_end) = if pos_beg <= pos_end {
            (pos_beg, pos_end)
        } else {
            (pos_end, pos_beg)
        };
        Self {
            id: id.into(),
            pos_beg,
            pos_end,
            strand,
            evalue: f64::NAN,
            kind,
            model: String::new(),
            annotation: String::new(),
            distance_2attc: f64::NAN,
        }
    }

    pub fn with_evalue(mut self, evalue: f64) -> Self {
        self.evalue = evalue;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    /// An attC site as read from the covariance-model search.
    pub fn attc(id: impl Into<String>, pos_beg: usize, pos_end: usize, strand: Strand) -> Self {
        Self::new(id, ElementKind::AttC, pos_beg, pos_end, strand).with_annotation(ATTC_ANNOTATION)
    }

    pub fn is_integrase(&self) -> bool {
        self.kind == ElementKind::Protein && self.annotation == INTEGRASE_ANNOTATION
    }

    /// Length in bp of the element.
    pub fn size(&self) -> usize {
        self.pos_end - self.pos_beg + 1
    }

    pub fn overlaps(&self, beg: usize, end: usize) -> bool {
        self.pos_beg <= end && beg <= self.pos_end
    }

    /// Total order on genomic position, used wherever rows are sorted.
    pub fn genomic_cmp(&self, other: &Self) -> Ordering {
        self.pos_beg
            .cmp(&other.pos_beg)
            .then(self.pos_end.cmp(&other.pos_end))
            .then(self.kind.cmp(&other.kind))
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.model.cmp(&other.model))
            .then_with(|| self.annotation.cmp(&other.annotation))
            .then(self.strand.as_i8().cmp(&other.strand.as_i8()))
    }
}

// ============================================================================
// Dedup
// ============================================================================

/// Orders evalues ascending with `NaN` last.
pub fn evalue_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Keeps the lowest-evalue row per element id.
///
/// The result is in evalue order; callers needing genomic order re-sort it.
pub fn dedup_lowest_evalue(mut rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
    rows.sort_by(|a, b| evalue_cmp(a.evalue, b.evalue).then_with(|| a.genomic_cmp(b)));
    let mut seen: FxHashSet<String> = FxHashSet::default();
    rows.retain(|row| seen.insert(row.id.clone()));
    rows
}

// ============================================================================
// Tests
// ============================================================================
