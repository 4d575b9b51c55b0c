//! Annotation Projector Module
//!
//! Projects integrons onto the feature list of their replicon, ready for
//! GenBank output.
//!
//! # Projection
//! For each integron, in order:
//! 1. An `integron` umbrella feature over the span (a `join` when the span
//!    crosses the origin) with `integron_id` and `integron_type`
//! 2. One feature per element in genomic order:
//!    - proteins as `integrase` (annotation `intI`) or `CDS`, with
//!      `protein_id`, `gene`, `model` and the `translation` from the protein bank
//!    - attC, attI and promoter sites as a feature of their own kind, with
//!      `<kind> = id` and `model`
//!
//! Reverse-strand elements get a complement location.

use gb_io::seq::{After, Before, Feature, Location};

use crate::cluster::Span;
use crate::error::IntegronError;
use crate::hits::{ElementKind, FeatureRow, Strand, INTEGRASE_ANNOTATION};
use crate::integron::Integron;
use crate::replicon::Replicon;
use crate::seqio::ProteinBank;

/// Appends the features of `integrons` to `replicon`, then truncates its name.
///
/// A protein with no sequence, or several, in `bank` fails the whole
/// projection; the feature list is left untouched in that case.
pub fn add_features(
    replicon: &mut Replicon,
    integrons: &[Integron],
    bank: &ProteinBank,
) -> Result<(), IntegronError> {
    let mut features = Vec::new();
    for integron in integrons {
        features.push(Feature {
            kind: "integron".into(),
            location: span_location(&integron.span()),
            qualifiers: vec![
                ("integron_id".into(), Some(integron.id().to_string())),
                ("integron_type".into(), Some(integron.integron_type().to_string())),
            ],
        });
        for row in integron.elements() {
            features.push(element_feature(row, bank)?);
        }
    }

    log::debug!("{}: {} feature(s) projected", replicon.id, features.len());
    replicon.features.extend(features);
    replicon.truncate_name();
    Ok(())
}

fn element_feature(row: &FeatureRow, bank: &ProteinBank) -> Result<Feature, IntegronError> {
    let feature = match row.kind {
        ElementKind::Protein => {
            let record = bank.get(&row.id)?;
            let kind = if row.annotation == INTEGRASE_ANNOTATION {
                "integrase"
            } else {
                "CDS"
            };
            let mut qualifiers = vec![("protein_id".into(), Some(row.id.clone()))];
            if !row.annotation.is_empty() {
                qualifiers.push(("gene".into(), Some(row.annotation.clone())));
            }
            if !row.model.is_empty() {
                qualifiers.push(("model".into(), Some(row.model.clone())));
            }
            qualifiers.push(("translation".into(), Some(record.seq.clone())));
            Feature {
                kind: kind.into(),
                location: row_location(row),
                qualifiers,
            }
        }
        ElementKind::AttC | ElementKind::AttI | ElementKind::Promoter => {
            let kind = row.kind.as_str();
            let mut qualifiers = vec![(kind.into(), Some(row.id.clone()))];
            if !row.model.is_empty() {
                qualifiers.push(("model".into(), Some(row.model.clone())));
            }
            Feature {
                kind: kind.into(),
                location: row_location(row),
                qualifiers,
            }
        }
    };
    Ok(feature)
}

// ============================================================================
// Locations
// ============================================================================

/// GenBank range of the 1-based inclusive interval `[beg, end]`.
fn range(beg: usize, end: usize) -> Location {
    Location::Range((beg as i64 - 1, Before(false)), (end as i64, After(false)))
}

fn span_location(span: &Span) -> Location {
    match *span {
        Span::Contiguous { start, end } => range(start, end),
        Span::WrappedAtOrigin { start1, end1, start2, end2 } => {
            Location::Join(vec![range(start1, end1), range(start2, end2)])
        }
    }
}

fn row_location(row: &FeatureRow) -> Location {
    let location = range(row.pos_beg, row.pos_end);
    match row.strand {
        Strand::Reverse => Location::Complement(Box::new(location)),
        Strand::Forward | Strand::Unstranded => location,
    }
}

// ============================================================================
// Tests
// ============================================================================
