//! Functional Annotation Module
//!
//! Annotates the cassette proteins of integrons with profile databases
//! (e.g. resistance gene profiles) through `hmmsearch`.
//!
//! # Algorithm
//! For each integron that is not In0 and carries proteins:
//! 1. Write the integron's proteins to a scratch FASTA
//! 2. Search every profile file against it (profile passes run on the rayon pool)
//! 3. Merge the hits of all profiles: lowest evalue per protein wins, ties go
//!    to the earlier profile
//! 4. Update each hit protein's evalue, annotation (profile name) and model
//!    (profile accession)
//!
//! Proteins without hit keep their current annotation. Running twice gives the
//! same result.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::IntegronError;
use crate::hmm::{best_hit_per_protein, read_hmm, run_hmmsearch, HmmFilter, HmmsearchJob, ProfileHit};
use crate::integron::{Integron, IntegronType};
use crate::seqio::{write_fasta, ProteinBank};

/// Settings of the functional annotation step.
#[derive(Debug, Clone)]
pub struct FuncAnnotConfig {
    pub hmmsearch: PathBuf,
    /// Profile files, searched in this order.
    pub profiles: Vec<PathBuf>,
    pub filter: HmmFilter,
    /// Threads given to each `hmmsearch` run.
    pub cpu: usize,
    /// Directory receiving scratch FASTA and tool outputs.
    pub tmp_dir: PathBuf,
}

/// Annotates the proteins of every eligible integron of `replicon_id`.
///
/// Fails on the first integron whose proteins are missing from `bank`, or
/// whose search fails; the error downcasts to [`IntegronError`].
pub fn func_annot(
    integrons: &mut [Integron],
    replicon_id: &str,
    bank: &ProteinBank,
    config: &FuncAnnotConfig,
) -> Result<()> {
    if config.profiles.is_empty() {
        return Ok(());
    }

    for integron in integrons.iter_mut() {
        if integron.integron_type() == IntegronType::In0 || integron.proteins().is_empty() {
            continue;
        }
        let hits = search_integron(integron, replicon_id, bank, config)?;
        let updated = apply_hits(integron, &hits);
        log::info!(
            "{} {}: {} of {} protein(s) annotated",
            replicon_id,
            integron.id(),
            updated,
            integron.proteins().len()
        );
    }
    Ok(())
}

fn search_integron(
    integron: &Integron,
    replicon_id: &str,
    bank: &ProteinBank,
    config: &FuncAnnotConfig,
) -> Result<Vec<ProfileHit>> {
    let ids: Vec<&str> = integron.proteins().iter().map(|r| r.id.as_str()).collect();
    if bank.subset(&ids).is_empty() {
        return Err(IntegronError::EmptyProteinSubset {
            replicon: replicon_id.to_string(),
            integron: integron.id().to_string(),
        }
        .into());
    }

    let per_profile = config
        .profiles
        .par_iter()
        .enumerate()
        .map(|(idx, profile)| search_profile(idx, profile, integron, replicon_id, &ids, bank, config))
        .collect::<Result<Vec<_>>>()?;

    Ok(merge_hits(per_profile))
}

/// One profile pass, with its own scratch files. Names carry the profile
/// index so that profiles sharing a file stem do not collide.
fn search_profile(
    idx: usize,
    profile: &Path,
    integron: &Integron,
    replicon_id: &str,
    ids: &[&str],
    bank: &ProteinBank,
    config: &FuncAnnotConfig,
) -> Result<Vec<ProfileHit>> {
    let stem = profile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    let prefix = format!("{}_{}_{}_{}", replicon_id, integron.id(), idx, stem);
    let subset_path = config.tmp_dir.join(format!("{}_subseqprot.tmp", prefix));
    let out = config.tmp_dir.join(format!("{}_fa.res", prefix));
    let table = config.tmp_dir.join(format!("{}_fa_table.res", prefix));

    write_fasta(bank.subset(ids), &subset_path)?;

    let job = HmmsearchJob {
        hmmsearch: &config.hmmsearch,
        profile,
        bank: &subset_path,
        out: &out,
        table: &table,
        db_size: bank.len(),
        cpu: config.cpu,
    };
    run_hmmsearch(&job)?;

    read_hmm(&table, &config.filter)
        .with_context(|| format!("Functional annotation of {} with {}", integron.id(), profile.display()))
}

/// Merges per-profile hits, given in profile order, into one best hit per protein.
pub fn merge_hits(per_profile: Vec<Vec<ProfileHit>>) -> Vec<ProfileHit> {
    best_hit_per_protein(per_profile.into_iter().flatten().collect())
}

/// Copies each hit onto the matching protein row. Returns the rows updated.
pub fn apply_hits(integron: &mut Integron, hits: &[ProfileHit]) -> usize {
    hits.iter()
        .filter(|hit| {
            integron.annotate_protein(&hit.protein_id, hit.evalue, &hit.profile_name, &hit.profile_accession)
        })
        .count()
}

// ============================================================================
// Tests
// ============================================================================
