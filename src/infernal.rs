//! Infernal Parser Module
//!
//! Reads the tabular output of `cmsearch --tblout` run with the attC
//! covariance model and turns the retained hits into attC feature rows.
//!
//! # tblout Format (18 columns, whitespace separated)
//! ```text
//! Col  Description
//! 1    Target (replicon) name
//! 3    Query (model) name
//! 8    Sequence from
//! 9    Sequence to (from > to on the minus strand)
//! 10   Strand: '+' or '-'
//! 16   E-value
//! ```
//! Lines starting with `#` are comments.
//!
//! The attC model is nearly palindromic, so one site is often hit on both
//! strands at the same coordinates. Only the lowest-evalue hit of such a pair
//! is kept unless [`AttcFilter::keep_palindromes`] is set.

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::IntegronError;
use crate::hits::{evalue_cmp, FeatureRow, Strand};

// ============================================================================
// Filter
// ============================================================================

/// Thresholds applied to attC hits.
#[derive(Debug, Clone, Copy)]
pub struct AttcFilter {
    /// Maximum E-value kept.
    pub evalue: f64,
    /// Minimum attC length in bp.
    pub min_size: usize,
    /// Maximum attC length in bp.
    pub max_size: usize,
    /// Keep hits sharing their coordinates with a better one.
    pub keep_palindromes: bool,
}

impl Default for AttcFilter {
    fn default() -> Self {
        Self {
            evalue: 1.0,
            min_size: 40,
            max_size: 200,
            keep_palindromes: false,
        }
    }
}

// ============================================================================
// cmsearch Record
// ============================================================================

/// A single `cmsearch` hit.
#[derive(Debug, Clone)]
pub struct CmsearchHit {
    pub target_name: String,
    pub model_name: String,
    pub seq_from: usize,
    pub seq_to: usize,
    pub strand: Strand,
    pub evalue: f64,
}

impl CmsearchHit {
    /// Parses one non-comment tblout line.
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 17 {
            anyhow::bail!(IntegronError::Parse(format!(
                "cmsearch line has {} fields, expected at least 17",
                fields.len()
            )));
        }

        let strand = Strand::parse(fields[9])
            .with_context(|| format!("Invalid strand '{}'", fields[9]))?;

        Ok(Self {
            target_name: fields[0].to_string(),
            model_name: fields[2].to_string(),
            seq_from: fields[7].parse().context("Invalid seq from")?,
            seq_to: fields[8].parse().context("Invalid seq to")?,
            strand,
            evalue: fields[15].parse().context("Invalid E-value")?,
        })
    }

    pub fn pos_beg(&self) -> usize {
        self.seq_from.min(self.seq_to)
    }

    pub fn pos_end(&self) -> usize {
        self.seq_from.max(self.seq_to)
    }

    pub fn size(&self) -> usize {
        self.pos_end() - self.pos_beg() + 1
    }

    pub fn passes(&self, filter: &AttcFilter) -> bool {
        let size = self.size();
        self.evalue <= filter.evalue && size >= filter.min_size && size <= filter.max_size
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads attC sites of `replicon_id` from a tblout file.
pub fn read_infernal<P: AsRef<Path>>(
    path: P,
    replicon_id: &str,
    filter: &AttcFilter,
) -> Result<Vec<FeatureRow>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open cmsearch table: {}", path.display()))?;
    parse_infernal(file, replicon_id, filter)
        .with_context(|| format!("Failed to parse cmsearch table: {}", path.display()))
}

/// Parses tblout content; attC rows come back sorted by position and
/// numbered `attc_001`, `attc_002`, ...
pub fn parse_infernal<R: Read>(
    reader: R,
    replicon_id: &str,
    filter: &AttcFilter,
) -> Result<Vec<FeatureRow>> {
    let reader = BufReader::new(reader);
    let mut hits = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let hit = CmsearchHit::parse_line(trimmed).with_context(|| format!("line {}", n + 1))?;
        if hit.target_name == replicon_id && hit.passes(filter) {
            hits.push(hit);
        }
    }

    if !filter.keep_palindromes {
        hits = drop_palindromes(hits);
    }

    hits.sort_by(|a, b| {
        a.pos_beg()
            .cmp(&b.pos_beg())
            .then(a.pos_end().cmp(&b.pos_end()))
            .then(a.strand.as_i8().cmp(&b.strand.as_i8()))
    });

    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| {
            FeatureRow::attc(format!("attc_{:03}", i + 1), hit.pos_beg(), hit.pos_end(), hit.strand)
                .with_evalue(hit.evalue)
                .with_model(hit.model_name)
        })
        .collect())
}

/// Keeps the lowest-evalue hit per `[pos_beg, pos_end]`.
fn drop_palindromes(mut hits: Vec<CmsearchHit>) -> Vec<CmsearchHit> {
    hits.sort_by(|a, b| {
        evalue_cmp(a.evalue, b.evalue)
            .then(a.pos_beg().cmp(&b.pos_beg()))
            .then(a.pos_end().cmp(&b.pos_end()))
            .then(a.strand.as_i8().cmp(&b.strand.as_i8()))
    });
    let before = hits.len();
    let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
    hits.retain(|hit| seen.insert((hit.pos_beg(), hit.pos_end())));
    if hits.len() < before {
        log::debug!("{} palindromic attC hit(s) dropped", before - hits.len());
    }
    hits
}

// ============================================================================
// Tests
// ============================================================================
