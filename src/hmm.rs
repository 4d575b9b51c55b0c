//! HMMER Module
//!
//! Runs `hmmsearch` and reads its per-domain table (`--domtblout`) into
//! profile hits. Integrase detection combines two profile passes (the intI
//! C-terminal profile and the tyrosine-recombinase profile) into a single
//! integrase table.
//!
//! # domtblout Format (22 columns + description, whitespace separated)
//! ```text
//! Col  Description
//! 1    Target (protein) name
//! 4    Query (profile) name
//! 5    Query accession
//! 6    Query length (qlen)
//! 13   i-Evalue of the domain
//! 16   hmm from
//! 17   hmm to
//! 23+  Target description (prodigal header: "# beg # end # strand # ...")
//! ```

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::IntegronError;
use crate::hits::{evalue_cmp, ElementKind, FeatureRow, Strand, INTEGRASE_ANNOTATION};
use crate::seqio::parse_prodigal_coords;

/// Model name of proteins hit by both integrase profiles.
pub const INTERSECTION_MODEL: &str = "intersection_tyr_intI";

// ============================================================================
// Filter
// ============================================================================

/// Thresholds applied to each domain.
#[derive(Debug, Clone, Copy)]
pub struct HmmFilter {
    pub evalue: f64,
    /// Minimal fraction of the profile covered by the domain.
    pub coverage: f64,
}

impl Default for HmmFilter {
    fn default() -> Self {
        Self {
            evalue: 10.0,
            coverage: 0.5,
        }
    }
}

impl HmmFilter {
    /// Cutoffs applied to the integrase profile tables.
    pub fn integrase() -> Self {
        Self {
            evalue: 1.0,
            coverage: 0.5,
        }
    }
}

// ============================================================================
// Profile Hit
// ============================================================================

/// One domain of a protein matched by a profile.
#[derive(Debug, Clone)]
pub struct ProfileHit {
    pub protein_id: String,
    pub profile_name: String,
    pub profile_accession: String,
    pub profile_len: usize,
    pub evalue: f64,
    pub hmm_from: usize,
    pub hmm_to: usize,
    /// Coordinates from the prodigal header, when present.
    pub coords: Option<(usize, usize, Strand)>,
}

impl ProfileHit {
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 22 {
            anyhow::bail!(IntegronError::Parse(format!(
                "domtblout line has {} fields, expected at least 22",
                fields.len()
            )));
        }
        let description = fields[22..].join(" ");

        Ok(Self {
            protein_id: fields[0].to_string(),
            profile_name: fields[3].to_string(),
            profile_accession: fields[4].to_string(),
            profile_len: fields[5].parse().context("Invalid qlen")?,
            evalue: fields[12].parse().context("Invalid i-Evalue")?,
            hmm_from: fields[15].parse().context("Invalid hmm from")?,
            hmm_to: fields[16].parse().context("Invalid hmm to")?,
            coords: parse_prodigal_coords(&description),
        })
    }

    /// Fraction of the profile covered by the domain.
    pub fn coverage(&self) -> f64 {
        if self.profile_len == 0 {
            return 0.0;
        }
        (self.hmm_to.saturating_sub(self.hmm_from) + 1) as f64 / self.profile_len as f64
    }

    pub fn passes(&self, filter: &HmmFilter) -> bool {
        self.evalue <= filter.evalue && self.coverage() >= filter.coverage
    }

    /// Protein row for this hit. Fails when the header carried no coordinates.
    pub fn to_row(&self, annotation: &str, model: &str) -> Result<FeatureRow> {
        let (beg, end, strand) = self.coords.with_context(|| {
            format!("No prodigal coordinates in the description of protein {}", self.protein_id)
        })?;
        Ok(FeatureRow::new(self.protein_id.clone(), ElementKind::Protein, beg, end, strand)
            .with_evalue(self.evalue)
            .with_annotation(annotation)
            .with_model(model))
    }
}

/// Keeps the best (lowest evalue) domain per protein, in evalue order.
pub fn best_hit_per_protein(mut hits: Vec<ProfileHit>) -> Vec<ProfileHit> {
    hits.sort_by(|a, b| evalue_cmp(a.evalue, b.evalue));
    let mut seen: FxHashSet<String> = FxHashSet::default();
    hits.retain(|hit| seen.insert(hit.protein_id.clone()));
    hits
}

// ============================================================================
// Reader
// ============================================================================

/// Reads a domtblout file, keeping domains that pass `filter`.
pub fn read_hmm<P: AsRef<Path>>(path: P, filter: &HmmFilter) -> Result<Vec<ProfileHit>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open hmmsearch table: {}", path.display()))?;
    parse_hmm(file, filter)
        .with_context(|| format!("Failed to parse hmmsearch table: {}", path.display()))
}

pub fn parse_hmm<R: Read>(reader: R, filter: &HmmFilter) -> Result<Vec<ProfileHit>> {
    let reader = BufReader::new(reader);
    let mut hits = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let hit = ProfileHit::parse_line(trimmed).with_context(|| format!("line {}", n + 1))?;
        if hit.passes(filter) {
            hits.push(hit);
        }
    }
    Ok(best_hit_per_protein(hits))
}

// ============================================================================
// Integrase Merge
// ============================================================================

/// Builds the integrase rows from the intI-profile and phage_int-profile hits.
///
/// Proteins found by both profiles get the model `intersection_tyr_intI`.
/// Proteins found only by the phage_int profile are kept when `union` is set.
/// Rows come back in genomic order.
pub fn merge_integrase_hits(
    inti_hits: Vec<ProfileHit>,
    phage_hits: Vec<ProfileHit>,
    union: bool,
) -> Result<Vec<FeatureRow>> {
    let inti_hits = best_hit_per_protein(inti_hits);
    let phage_hits = best_hit_per_protein(phage_hits);
    let inti_ids: FxHashSet<&str> = inti_hits.iter().map(|h| h.protein_id.as_str()).collect();
    let phage_ids: FxHashSet<&str> = phage_hits.iter().map(|h| h.protein_id.as_str()).collect();

    let mut rows = Vec::with_capacity(inti_hits.len());
    for hit in &inti_hits {
        let model = if phage_ids.contains(hit.protein_id.as_str()) {
            INTERSECTION_MODEL
        } else {
            hit.profile_name.as_str()
        };
        rows.push(hit.to_row(INTEGRASE_ANNOTATION, model)?);
    }
    if union {
        for hit in phage_hits.iter().filter(|h| !inti_ids.contains(h.protein_id.as_str())) {
            rows.push(hit.to_row(INTEGRASE_ANNOTATION, &hit.profile_name)?);
        }
    }

    rows.sort_by(|a, b| a.genomic_cmp(b));
    Ok(rows)
}

// ============================================================================
// hmmsearch Invocation
// ============================================================================

/// Arguments of one `hmmsearch` run.
#[derive(Debug, Clone)]
pub struct HmmsearchJob<'a> {
    pub hmmsearch: &'a Path,
    pub profile: &'a Path,
    pub bank: &'a Path,
    pub out: &'a Path,
    pub table: &'a Path,
    /// Database size for evalue computation (`-Z`).
    pub db_size: usize,
    pub cpu: usize,
}

/// Runs `hmmsearch`; spawn failure and non-zero exit are errors naming the tool.
pub fn run_hmmsearch(job: &HmmsearchJob) -> std::result::Result<(), IntegronError> {
    let tool = job.hmmsearch.display().to_string();
    log::debug!(
        "{} -Z {} --cpu {} --domtblout {} -o {} {} {}",
        tool,
        job.db_size,
        job.cpu,
        job.table.display(),
        job.out.display(),
        job.profile.display(),
        job.bank.display()
    );

    let status = Command::new(job.hmmsearch)
        .arg("-Z").arg(job.db_size.to_string())
        .arg("--cpu").arg(job.cpu.to_string())
        .arg("--domtblout").arg(job.table)
        .arg("-o").arg(job.out)
        .arg(job.profile)
        .arg(job.bank)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| IntegronError::ToolSpawn { tool: tool.clone(), source })?;

    if !status.success() {
        return Err(IntegronError::ToolFailed {
            tool,
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(protein: &str, profile: &str, qlen: usize, evalue: &str, from: usize, to: usize, desc: &str) -> String {
        format!(
            "{protein} - 320 {profile} PF00589.1 {qlen} 1e-30 100.0 0.1 1 1 1e-30 {evalue} 98.0 0.1 {from} {to} 10 300 8 305 0.95 {desc}"
        )
    }

    #[test]
    fn test_parse_line_and_coverage() {
        let l = line("ACBA.007.P01_13_1", "intI_Cterm", 100, "1.9e-25", 1, 80, "# 55 # 1014 # 1 # ID=1_1;partial=00");
        let hit = ProfileHit::parse_line(&l).unwrap();
        assert_eq!(hit.profile_name, "intI_Cterm");
        assert_eq!(hit.profile_accession, "PF00589.1");
        assert_eq!(hit.evalue, 1.9e-25);
        assert!((hit.coverage() - 0.8).abs() < 1e-12);
        assert_eq!(hit.coords, Some((55, 1014, Strand::Forward)));
    }

    #[test]
    fn test_invalid_line() {
        assert!(ProfileHit::parse_line("p - 320 prof").is_err());
    }

    #[test]
    fn test_parse_filters_and_keeps_best_domain() {
        let content = [
            "# target name accession tlen query name ...".to_string(),
            line("p1", "Res", 100, "1e-5", 1, 90, "-"),
            line("p1", "Res", 100, "1e-12", 1, 90, "-"),
            line("p2", "Res", 100, "1e-12", 1, 30, "-"),
            line("p3", "Res", 100, "50", 1, 90, "-"),
        ]
        .join("\n");
        let hits = parse_hmm(Cursor::new(content), &HmmFilter::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].protein_id, "p1");
        assert_eq!(hits[0].evalue, 1e-12);
    }

    #[test]
    fn test_merge_integrase_hits() {
        let inti = vec![
            ProfileHit::parse_line(&line("r_1", "intI_Cterm", 100, "1e-20", 1, 90, "# 55 # 1014 # 1 # x")).unwrap(),
            ProfileHit::parse_line(&line("r_7", "intI_Cterm", 100, "1e-8", 1, 90, "# 9000 # 9900 # -1 # x")).unwrap(),
        ];
        let phage = vec![
            ProfileHit::parse_line(&line("r_1", "Phage_integrase", 170, "1e-25", 1, 160, "# 55 # 1014 # 1 # x")).unwrap(),
            ProfileHit::parse_line(&line("r_4", "Phage_integrase", 170, "1e-9", 1, 160, "# 4000 # 5000 # 1 # x")).unwrap(),
        ];

        let rows = merge_integrase_hits(inti.clone(), phage.clone(), false).unwrap();
        let got: Vec<(&str, &str)> = rows.iter().map(|r| (r.id.as_str(), r.model.as_str())).collect();
        assert_eq!(got, vec![("r_1", INTERSECTION_MODEL), ("r_7", "intI_Cterm")]);
        assert!(rows.iter().all(|r| r.is_integrase()));

        let rows = merge_integrase_hits(inti, phage, true).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r_1", "r_4", "r_7"]);
        assert_eq!(rows[1].model, "Phage_integrase");
    }

    #[test]
    fn test_merge_requires_coordinates() {
        let inti = vec![ProfileHit::parse_line(&line("r_1", "intI_Cterm", 100, "1e-20", 1, 90, "-")).unwrap()];
        assert!(merge_integrase_hits(inti, vec![], false).is_err());
    }

    #[test]
    fn test_run_hmmsearch_missing_executable() {
        let p = Path::new("/nonexistent");
        let job = HmmsearchJob {
            hmmsearch: Path::new("integron-finder-no-such-tool"),
            profile: p,
            bank: p,
            out: p,
            table: p,
            db_size: 1,
            cpu: 1,
        };
        let err = run_hmmsearch(&job).unwrap_err();
        assert!(matches!(err, IntegronError::ToolSpawn { .. }));
        assert!(err.to_string().starts_with("integron-finder-no-such-tool failed : "));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_hmmsearch_non_zero_exit() {
        let p = Path::new("/nonexistent");
        let job = HmmsearchJob {
            hmmsearch: Path::new("false"),
            profile: p,
            bank: p,
            out: p,
            table: p,
            db_size: 1,
            cpu: 1,
        };
        match run_hmmsearch(&job) {
            Err(IntegronError::ToolFailed { tool, code }) => {
                assert_eq!(tool, "false");
                assert_eq!(code, 1);
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }
}
