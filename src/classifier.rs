//! Integron Classifier Module
//!
//! Turns the feature rows found on a replicon into typed integrons.
//!
//! # Classification Method
//! 1. Group rows by proximity (see [`crate::cluster`])
//! 2. Route each cluster's rows into the integron tables; on a circular
//!    replicon the last and first clusters are merged into one integron when
//!    they meet through the origin
//! 3. Derive the type from the tables:
//!    - **complete**: integrase and attC site(s)
//!    - **CALIN**: attC site(s) without integrase
//!    - **In0**: integrase without attC site
//! 4. Number integrons `integron_01`, `integron_02`, ... in genomic order
//!
//! Clusters holding neither integrase nor attC site (e.g. a lone promoter)
//! are dropped.

use std::fmt;

use crate::cluster::{group, origin_join, Cluster, GroupingParams, Span};
use crate::hits::FeatureRow;
use crate::integron::{Integron, IntegronType};

// ============================================================================
// Integron Classifier
// ============================================================================

/// Classifier for the rows of one replicon.
pub struct IntegronClassifier {
    replicon_id: String,
    params: GroupingParams,
}

impl IntegronClassifier {
    /// # Arguments
    /// * `replicon_id` - Identifier of the scanned replicon
    /// * `params` - Validated distance threshold, topology and length
    pub fn new(replicon_id: impl Into<String>, params: GroupingParams) -> Self {
        Self {
            replicon_id: replicon_id.into(),
            params,
        }
    }

    pub fn replicon_id(&self) -> &str {
        &self.replicon_id
    }

    /// Groups and classifies all rows of the replicon.
    pub fn classify_batch(&self, rows: Vec<FeatureRow>) -> Vec<Integron> {
        let mut clusters = group(rows, &self.params);
        log::debug!("{}: {} cluster(s) of elements", self.replicon_id, clusters.len());

        let mut integrons: Vec<Integron> = Vec::with_capacity(clusters.len());
        if let Some(span) = origin_join(&clusters, &self.params) {
            let tail = clusters.remove(clusters.len() - 1);
            let head = clusters.remove(0);
            if let Some(integron) = self.classify_across_origin(next_id(&integrons), tail, head, span) {
                integrons.push(integron);
            }
        }
        for cluster in clusters {
            if let Some(integron) = self.classify_single(next_id(&integrons), cluster) {
                integrons.push(integron);
            }
        }
        integrons
    }

    /// Builds the integron of the last (`tail`) and first (`head`) clusters of
    /// a circular replicon, joined through the origin.
    pub fn classify_across_origin(&self, id: String, tail: Cluster, head: Cluster, span: Span) -> Option<Integron> {
        let before = Integron::assemble(id.as_str(), self.replicon_id.as_str(), tail.span, tail.rows);
        let after = Integron::assemble(id.as_str(), self.replicon_id.as_str(), head.span, head.rows);
        let integron = before.merge(after, span);
        self.keep(integron)
    }

    /// Builds the integron of one cluster, `None` when it is not one.
    pub fn classify_single(&self, id: String, cluster: Cluster) -> Option<Integron> {
        let integron = Integron::assemble(id, self.replicon_id.as_str(), cluster.span, cluster.rows);
        self.keep(integron)
    }

    fn keep(&self, integron: Integron) -> Option<Integron> {
        let span = integron.span();
        if !integron.holds_integron() {
            log::debug!("{}: cluster at {} has neither integrase nor attC, skipped", self.replicon_id, span);
            return None;
        }
        log::debug!(
            "{} {} at {}: {} attC, {} integrase",
            integron.id(),
            integron.integron_type(),
            span,
            integron.attc().len(),
            integron.integrase().len()
        );
        Some(integron)
    }
}

fn next_id(integrons: &[Integron]) -> String {
    format!("integron_{:02}", integrons.len() + 1)
}

/// Adds the ORFs of the replicon overlapping each integron to its protein table.
pub fn attach_proteins(integrons: &mut [Integron], orfs: &[FeatureRow]) {
    for integron in integrons.iter_mut() {
        let added = integron.add_proteins(orfs);
        if added > 0 {
            log::debug!("{}: {} protein(s) attached", integron.id(), added);
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Counts of integrons and attC sites per type for one replicon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub replicon_id: String,
    pub complete: (usize, usize),
    pub calin: (usize, usize),
    pub in0: (usize, usize),
}

impl Summary {
    pub fn new(replicon_id: &str, integrons: &[Integron]) -> Self {
        let mut summary = Summary {
            replicon_id: replicon_id.to_string(),
            ..Default::default()
        };
        for integron in integrons {
            let slot = match integron.integron_type() {
                IntegronType::Complete => &mut summary.complete,
                IntegronType::Calin => &mut summary.calin,
                IntegronType::In0 => &mut summary.in0,
            };
            slot.0 += 1;
            slot.1 += integron.attc().len();
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "In replicon {}, there are:", self.replicon_id)?;
        writeln!(
            f,
            "- {} complete integron(s) found with a total {} attC site(s)",
            self.complete.0, self.complete.1
        )?;
        writeln!(
            f,
            "- {} CALIN element(s) found with a total of {} attC site(s)",
            self.calin.0, self.calin.1
        )?;
        write!(
            f,
            "- {} In0 element(s) found with a total of {} attC site",
            self.in0.0, self.in0.1
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
