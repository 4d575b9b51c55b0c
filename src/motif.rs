//! Motif Search Module
//!
//! Looks for attI sites and integrase promoters next to the integrase of
//! complete integrons, by exact matching of known sequences on both strands.
//!
//! # Search Window
//! Each integrase extended by [`MOTIF_WINDOW`] bp on both sides. On a circular
//! replicon the window runs through the origin; a match straddling the origin
//! is not reported.
//!
//! # Motif File (FASTA)
//! ```text
//! >attI1 attI
//! TGATGTTATGGAGCAGCAACGATGTTACGCAGCAGGGCAGTCGCCCTAAAACAAAGTT
//! >P_intI1 promoter
//! TTGCTGCTTGGATGCCCGAGGCATAGACTGTACA
//! ```
//! Records sharing a name are variants of one motif.

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::path::Path;

use crate::cluster::Topology;
use crate::error::IntegronError;
use crate::hits::{ElementKind, FeatureRow, Strand};
use crate::integron::{Integron, IntegronType};
use crate::replicon::Replicon;
use crate::seqio::read_fasta;

/// Distance in bp searched on each side of an integrase.
pub const MOTIF_WINDOW: usize = 500;

// ============================================================================
// Motif
// ============================================================================

/// A named attI site or promoter, with its known sequence variants.
#[derive(Debug, Clone)]
pub struct Motif {
    pub name: String,
    pub kind: ElementKind,
    /// Upper-case DNA, forward strand.
    pub variants: Vec<Vec<u8>>,
}

impl Motif {
    pub fn new(name: impl Into<String>, kind: ElementKind, variants: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind,
            variants: variants.iter().map(|v| v.as_bytes().to_ascii_uppercase()).collect(),
        }
    }
}

/// Motifs searched when no motif file is given: the class 1 and class 2
/// attI sites and the class 1 integrase promoter.
pub fn default_motifs() -> Vec<Motif> {
    vec![
        Motif::new(
            "attI1",
            ElementKind::AttI,
            &["TGATGTTATGGAGCAGCAACGATGTTACGCAGCAGGGCAGTCGCCCTAAAACAAAGTT"],
        ),
        Motif::new(
            "attI2",
            ElementKind::AttI,
            &["TTAATTAACGGTAAGCATCAGCGGGTGACAAAACGAGCATGCTTACTAATAAAATGTT"],
        ),
        Motif::new("P_intI1", ElementKind::Promoter, &["TTGCTGCTTGGATGCCCGAGGCATAGACTGTACA"]),
    ]
}

/// Parses the motif kind of a motif file header.
pub fn parse_kind(s: &str) -> std::result::Result<ElementKind, IntegronError> {
    match s {
        "attI" => Ok(ElementKind::AttI),
        "promoter" => Ok(ElementKind::Promoter),
        other => Err(IntegronError::Config(format!(
            "Unknown motif kind '{}', expected 'attI' or 'promoter'",
            other
        ))),
    }
}

/// Reads motifs from a FASTA file, `>name kind` headers.
pub fn read_motifs<P: AsRef<Path>>(path: P) -> Result<Vec<Motif>> {
    let path = path.as_ref();
    let records = read_fasta(path)?;
    let mut motifs: Vec<Motif> = Vec::new();
    for record in records {
        let kind = record.description.split_whitespace().next().unwrap_or("");
        let kind = parse_kind(kind)
            .with_context(|| format!("Motif {} in {}", record.name, path.display()))?;
        let variant = record.seq.as_bytes().to_ascii_uppercase();
        match motifs.iter_mut().find(|m| m.name == record.name) {
            Some(motif) if motif.kind == kind => motif.variants.push(variant),
            Some(_) => anyhow::bail!(IntegronError::Config(format!(
                "Motif {} is given two kinds in {}",
                record.name,
                path.display()
            ))),
            None => motifs.push(Motif {
                name: record.name,
                kind,
                variants: vec![variant],
            }),
        }
    }
    Ok(motifs)
}

// ============================================================================
// Search
// ============================================================================

fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|c| match c.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            _ => b'N',
        })
        .collect()
}

/// Window of `replicon` around `[beg, end]` (1-based) with the 0-based
/// replicon position of its first base.
fn window(replicon: &Replicon, beg: usize, end: usize) -> (Vec<u8>, usize) {
    let len = replicon.len();
    let from = beg as i64 - 1 - MOTIF_WINDOW as i64;
    let to = (end + MOTIF_WINDOW) as i64;
    match replicon.topology {
        Topology::Linear => {
            let from = from.max(0) as usize;
            let to = (to as usize).min(len).max(from);
            (replicon.seq[from.min(to)..to].to_ascii_uppercase(), from)
        }
        Topology::Circular => {
            let span = ((to - from) as usize).min(len);
            let first = from.rem_euclid(len as i64) as usize;
            let seq = (0..span)
                .map(|k| replicon.seq[(first + k) % len].to_ascii_uppercase())
                .collect();
            (seq, first)
        }
    }
}

/// Start offsets of `pattern` in `template`.
fn find_exact(template: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || template.len() < pattern.len() {
        return Vec::new();
    }
    template
        .windows(pattern.len())
        .enumerate()
        .filter(|(_, w)| *w == pattern)
        .map(|(start, _)| start)
        .collect()
}

/// attI sites and promoters around the integrases of `integron`, in genomic
/// order. Ids are `<motif>_<n>`, numbered per motif.
pub fn find_sites(replicon: &Replicon, integron: &Integron, motifs: &[Motif]) -> Vec<FeatureRow> {
    let len = replicon.len();
    if len == 0 {
        return Vec::new();
    }

    let mut found: FxHashSet<(usize, usize, usize, i8)> = FxHashSet::default();
    for integrase in integron.integrase() {
        let (seq, first) = window(replicon, integrase.pos_beg, integrase.pos_end);
        for (m, motif) in motifs.iter().enumerate() {
            for variant in &motif.variants {
                let strands = [(variant.clone(), Strand::Forward), (reverse_complement(variant), Strand::Reverse)];
                for (pattern, strand) in &strands {
                    for offset in find_exact(&seq, pattern) {
                        let beg = (first + offset) % len;
                        let end = (first + offset + pattern.len() - 1) % len;
                        if end < beg {
                            continue;
                        }
                        found.insert((beg + 1, end + 1, m, strand.as_i8()));
                    }
                }
            }
        }
    }

    let mut hits: Vec<(usize, usize, usize, i8)> = found.into_iter().collect();
    hits.sort_unstable();

    let mut counts = vec![0usize; motifs.len()];
    hits.into_iter()
        .map(|(beg, end, m, strand)| {
            let motif = &motifs[m];
            counts[m] += 1;
            let strand = if strand < 0 { Strand::Reverse } else { Strand::Forward };
            FeatureRow::new(format!("{}_{}", motif.name, counts[m]), motif.kind, beg, end, strand)
                .with_model(motif.name.as_str())
                .with_annotation(motif.kind.as_str())
        })
        .collect()
}

/// Adds the attI sites and promoters of every complete integron.
/// Returns the number of sites added.
pub fn scan_integrons(integrons: &mut [Integron], replicon: &Replicon, motifs: &[Motif]) -> usize {
    let mut total = 0;
    for integron in integrons.iter_mut() {
        if integron.integron_type() != IntegronType::Complete {
            continue;
        }
        let sites = find_sites(replicon, integron, motifs);
        let added = integron.add_sites(sites);
        if added > 0 {
            log::debug!("{}: {} attI site(s) or promoter(s) found", integron.id(), added);
        }
        total += added;
    }
    total
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Span;
    use std::io::Write;

    const PROMOTER: &str = "TTGCTGCTTGGATGCCCGAGGCATAGACTGTACA";

    fn integrase(beg: usize, end: usize) -> FeatureRow {
        FeatureRow::new("pl_1", ElementKind::Protein, beg, end, Strand::Forward).with_annotation("intI")
    }

    fn complete(beg: usize, end: usize, attc: usize) -> Integron {
        let rows = vec![integrase(beg, end), FeatureRow::attc("attc_001", attc, attc + 60, Strand::Reverse)];
        let span = Span::covering(&rows).unwrap();
        Integron::from_rows("integron_01", "pl", span, rows).unwrap()
    }

    fn replicon(len: usize, topology: Topology, inserts: &[(usize, Vec<u8>)]) -> Replicon {
        let mut seq = vec![b'a'; len];
        for (at, motif) in inserts {
            seq[*at..*at + motif.len()].copy_from_slice(motif);
        }
        Replicon::new("pl", seq, topology)
    }

    #[test]
    fn test_both_strands_near_integrase() {
        let attc = default_motifs()[0].variants[0].clone();
        let replicon = replicon(
            5000,
            Topology::Linear,
            &[
                (1100, PROMOTER.as_bytes().to_vec()),
                (1300, reverse_complement(&attc)),
                // too far from the integrase
                (3000, PROMOTER.as_bytes().to_vec()),
            ],
        );
        let sites = find_sites(&replicon, &complete(100, 1000, 4000), &default_motifs());
        let got: Vec<(&str, ElementKind, usize, usize, Strand)> = sites
            .iter()
            .map(|r| (r.id.as_str(), r.kind, r.pos_beg, r.pos_end, r.strand))
            .collect();
        assert_eq!(
            got,
            vec![
                ("P_intI1_1", ElementKind::Promoter, 1101, 1134, Strand::Forward),
                ("attI1_1", ElementKind::AttI, 1301, 1358, Strand::Reverse),
            ]
        );
        assert_eq!(sites[0].model, "P_intI1");
        assert_eq!(sites[1].annotation, "attI");
        assert!(sites[0].evalue.is_nan());
    }

    #[test]
    fn test_window_through_origin() {
        let len = 3000;
        let circular = replicon(len, Topology::Circular, &[(2800, PROMOTER.as_bytes().to_vec())]);
        let sites = find_sites(&circular, &complete(100, 400, 1000), &default_motifs());
        assert_eq!(sites.len(), 1);
        assert_eq!((sites[0].pos_beg, sites[0].pos_end), (2801, 2834));

        let linear = replicon(len, Topology::Linear, &[(2800, PROMOTER.as_bytes().to_vec())]);
        assert!(find_sites(&linear, &complete(100, 400, 1000), &default_motifs()).is_empty());
    }

    #[test]
    fn test_only_complete_integrons_are_scanned() {
        let replicon = replicon(5000, Topology::Linear, &[(1100, PROMOTER.as_bytes().to_vec())]);
        let rows = vec![integrase(100, 1000)];
        let in0 = Integron::from_rows("integron_02", "pl", Span::covering(&rows).unwrap(), rows).unwrap();
        let mut integrons = vec![complete(100, 1000, 1600), in0];
        assert_eq!(scan_integrons(&mut integrons, &replicon, &default_motifs()), 1);
        assert_eq!(integrons[0].promoter()[0].id, "P_intI1_1");
        assert!(integrons[1].promoter().is_empty());
        // rescanning finds the same site again, not a new one
        scan_integrons(&mut integrons, &replicon, &default_motifs());
        assert_eq!(integrons[0].promoter().len(), 1);
    }

    #[test]
    fn test_read_motifs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">Pc_int1 promoter\nTTGACA\n>Pc_int1 promoter\nttgaca\n>attI3 attI\nACGTACGT").unwrap();
        let motifs = read_motifs(file.path()).unwrap();
        assert_eq!(motifs.len(), 2);
        assert_eq!(motifs[0].name, "Pc_int1");
        assert_eq!(motifs[0].variants, vec![b"TTGACA".to_vec(), b"TTGACA".to_vec()]);
        assert_eq!(motifs[1].kind, ElementKind::AttI);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, ">Pc_int1 enhancer\nTTGACA").unwrap();
        let err = read_motifs(bad.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<IntegronError>(), Some(IntegronError::Config(_))));
    }
}
