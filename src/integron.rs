//! Integron Module
//!
//! The assembled integron: one ordered table per element category and a span.
//! The integron type is never stored; it is derived from which tables are
//! empty.

use std::fmt;

use crate::cluster::Span;
use crate::hits::{dedup_lowest_evalue, ElementKind, FeatureRow};

// ============================================================================
// Integron Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegronType {
    /// Integrase and attC sites.
    Complete,
    /// attC sites without integrase.
    Calin,
    /// Integrase without attC site.
    In0,
}

impl IntegronType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegronType::Complete => "complete",
            IntegronType::Calin => "CALIN",
            IntegronType::In0 => "In0",
        }
    }
}

impl fmt::Display for IntegronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Integron
// ============================================================================

/// An integron of one replicon.
///
/// Every table is sorted by genomic position and holds each element id once.
/// There is always at least one integrase or one attC site, so
/// [`Integron::integron_type`] is total.
#[derive(Debug, Clone)]
pub struct Integron {
    id: String,
    id_replicon: String,
    span: Span,
    integrase: Vec<FeatureRow>,
    attc: Vec<FeatureRow>,
    promoter: Vec<FeatureRow>,
    atti: Vec<FeatureRow>,
    proteins: Vec<FeatureRow>,
}

impl Integron {
    /// Builds an integron from the rows of a cluster.
    ///
    /// Rows are routed to their table by kind and annotation, duplicates are
    /// resolved by lowest evalue and attC distances are computed. Returns
    /// `None` when the rows hold neither integrase nor attC site.
    pub fn from_rows(
        id: impl Into<String>,
        id_replicon: impl Into<String>,
        span: Span,
        rows: Vec<FeatureRow>,
    ) -> Option<Self> {
        let integron = Self::assemble(id, id_replicon, span, rows);
        integron.holds_integron().then_some(integron)
    }

    /// Like [`Integron::from_rows`] without the integrase/attC check, for one
    /// side of an element crossing the origin.
    pub(crate) fn assemble(
        id: impl Into<String>,
        id_replicon: impl Into<String>,
        span: Span,
        rows: Vec<FeatureRow>,
    ) -> Self {
        let mut integron = Self {
            id: id.into(),
            id_replicon: id_replicon.into(),
            span,
            integrase: Vec::new(),
            attc: Vec::new(),
            promoter: Vec::new(),
            atti: Vec::new(),
            proteins: Vec::new(),
        };
        for row in rows {
            integron.table_for(&row).push(row);
        }
        integron.normalize();
        integron
    }

    /// Whether there is an integrase or an attC site.
    pub fn holds_integron(&self) -> bool {
        self.has_integrase() || self.has_attc()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_replicon(&self) -> &str {
        &self.id_replicon
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn integrase(&self) -> &[FeatureRow] {
        &self.integrase
    }

    pub fn attc(&self) -> &[FeatureRow] {
        &self.attc
    }

    pub fn promoter(&self) -> &[FeatureRow] {
        &self.promoter
    }

    pub fn atti(&self) -> &[FeatureRow] {
        &self.atti
    }

    pub fn proteins(&self) -> &[FeatureRow] {
        &self.proteins
    }

    pub fn has_integrase(&self) -> bool {
        !self.integrase.is_empty()
    }

    pub fn has_attc(&self) -> bool {
        !self.attc.is_empty()
    }

    pub fn integron_type(&self) -> IntegronType {
        match (self.has_integrase(), self.has_attc()) {
            (true, true) => IntegronType::Complete,
            (true, false) => IntegronType::In0,
            (false, _) => IntegronType::Calin,
        }
    }

    /// All rows of all tables, beginning of the replicon first.
    pub fn elements(&self) -> Vec<&FeatureRow> {
        let mut rows: Vec<&FeatureRow> = self
            .integrase
            .iter()
            .chain(&self.attc)
            .chain(&self.promoter)
            .chain(&self.atti)
            .chain(&self.proteins)
            .collect();
        rows.sort_by(|a, b| a.genomic_cmp(b));
        rows
    }

    /// Joins `other` into this integron, e.g. the two clusters of one element
    /// found on both sides of the origin. The caller provides the new span.
    pub fn merge(mut self, other: Integron, span: Span) -> Self {
        self.span = span;
        self.integrase.extend(other.integrase);
        self.attc.extend(other.attc);
        self.promoter.extend(other.promoter);
        self.atti.extend(other.atti);
        self.proteins.extend(other.proteins);
        self.normalize();
        self
    }

    /// Adds the ORFs overlapping the span to the protein table.
    ///
    /// In0 integrons get no proteins, nor do ORFs already known as integrase.
    /// Returns the number of proteins added.
    pub fn add_proteins(&mut self, orfs: &[FeatureRow]) -> usize {
        if self.integron_type() == IntegronType::In0 {
            return 0;
        }
        let before = self.proteins.len();
        for orf in orfs {
            let known = self.integrase.iter().chain(&self.proteins).any(|r| r.id == orf.id);
            if !known && self.span.overlaps(orf.pos_beg, orf.pos_end) {
                let mut row = orf.clone();
                row.kind = ElementKind::Protein;
                self.proteins.push(row);
            }
        }
        self.proteins.sort_by(|a, b| a.genomic_cmp(b));
        self.proteins.len() - before
    }

    /// Adds attI sites and promoters, widening the span to cover them.
    pub fn add_sites(&mut self, sites: Vec<FeatureRow>) -> usize {
        let mut added = 0;
        for row in sites {
            if !matches!(row.kind, ElementKind::AttI | ElementKind::Promoter) {
                continue;
            }
            self.span = self.span.extended(row.pos_beg, row.pos_end);
            self.table_for(&row).push(row);
            added += 1;
        }
        self.normalize();
        added
    }

    /// Updates a protein from a functional annotation hit.
    /// Returns `false` when the protein is not in the table.
    pub fn annotate_protein(&mut self, protein_id: &str, evalue: f64, annotation: &str, model: &str) -> bool {
        match self.proteins.iter_mut().find(|r| r.id == protein_id) {
            Some(row) => {
                row.evalue = evalue;
                row.annotation = annotation.to_string();
                row.model = model.to_string();
                true
            }
            None => false,
        }
    }

    fn table_for(&mut self, row: &FeatureRow) -> &mut Vec<FeatureRow> {
        match row.kind {
            ElementKind::Protein if row.is_integrase() => &mut self.integrase,
            ElementKind::Protein => &mut self.proteins,
            ElementKind::AttC => &mut self.attc,
            ElementKind::AttI => &mut self.atti,
            ElementKind::Promoter => &mut self.promoter,
        }
    }

    fn normalize(&mut self) {
        for table in [
            &mut self.integrase,
            &mut self.attc,
            &mut self.promoter,
            &mut self.atti,
            &mut self.proteins,
        ] {
            let mut rows = dedup_lowest_evalue(std::mem::take(table));
            rows.sort_by(|a, b| a.genomic_cmp(b));
            *table = rows;
        }
        self.compute_attc_distances();
    }

    /// Distance of each attC site to the previous one, in traversal order.
    fn compute_attc_distances(&mut self) {
        let span = self.span;
        let len = span.replicon_len().unwrap_or(0);

        let mut order: Vec<usize> = (0..self.attc.len()).collect();
        order.sort_by_key(|&i| span.part_of(self.attc[i].pos_beg));

        let mut prev: Option<usize> = None;
        for i in order {
            let distance = match prev {
                None => f64::NAN,
                Some(p) => {
                    let prev_end = self.attc[p].pos_end as f64;
                    let beg = self.attc[i].pos_beg as f64;
                    if span.part_of(self.attc[p].pos_beg) < span.part_of(self.attc[i].pos_beg) {
                        beg + len as f64 - prev_end
                    } else {
                        beg - prev_end
                    }
                }
            };
            self.attc[i].distance_2attc = distance;
            prev = Some(i);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
