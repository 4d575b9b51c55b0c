//! Output Module
//!
//! Writes detection results: the `.integrons` table, the per-replicon
//! GenBank file and the `.summary` table.
//!
//! # .integrons Columns (tab separated)
//! ```text
//! ID_integron ID_replicon element pos_beg pos_end strand evalue type_elt
//! annotation model type distance_2attC
//! ```
//! Missing values (no evalue, no distance, empty model) are written `NA`.

use anyhow::{Context, Result};
use gb_io::writer::SeqWriter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::classifier::Summary;
use crate::hits::FeatureRow;
use crate::integron::Integron;
use crate::replicon::Replicon;

pub const INTEGRONS_HEADER: &str = "ID_integron\tID_replicon\telement\tpos_beg\tpos_end\tstrand\tevalue\ttype_elt\tannotation\tmodel\ttype\tdistance_2attC";

pub const SUMMARY_HEADER: &str = "ID_replicon\tCALIN\tcomplete\tIn0";

/// Writes the element table of `integrons`; `# No Integron found` when empty.
pub fn write_integrons<W: Write>(writer: &mut W, integrons: &[Integron]) -> Result<()> {
    if integrons.is_empty() {
        writeln!(writer, "# No Integron found")?;
        return Ok(());
    }
    writeln!(writer, "{}", INTEGRONS_HEADER)?;
    for integron in integrons {
        let integron_type = integron.integron_type();
        for row in integron.elements() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                integron.id(),
                integron.id_replicon(),
                row.id,
                row.pos_beg,
                row.pos_end,
                row.strand,
                format_evalue(row.evalue),
                row.kind,
                or_na(&row.annotation),
                or_na(&row.model),
                integron_type,
                format_distance(row),
            )?;
        }
    }
    Ok(())
}

pub fn write_integrons_file<P: AsRef<Path>>(path: P, integrons: &[Integron]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create integron table: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_integrons(&mut writer, integrons)?;
    writer.flush()?;
    Ok(())
}

/// Writes one line of integron counts per replicon.
pub fn write_summary<W: Write>(writer: &mut W, summaries: &[Summary]) -> Result<()> {
    writeln!(writer, "{}", SUMMARY_HEADER)?;
    for s in summaries {
        writeln!(writer, "{}\t{}\t{}\t{}", s.replicon_id, s.calin.0, s.complete.0, s.in0.0)?;
    }
    Ok(())
}

pub fn write_summary_file<P: AsRef<Path>>(path: P, summaries: &[Summary]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create summary: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_summary(&mut writer, summaries)?;
    writer.flush()?;
    Ok(())
}

/// Writes the replicon with its projected features as GenBank.
pub fn write_genbank<P: AsRef<Path>>(path: P, replicon: &Replicon) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create GenBank file: {}", path.display()))?;
    let mut writer = SeqWriter::new(file);
    writer
        .write(&replicon.to_gb_seq())
        .with_context(|| format!("Failed to write GenBank file: {}", path.display()))?;
    Ok(())
}

fn format_evalue(evalue: f64) -> String {
    if evalue.is_nan() {
        "NA".to_string()
    } else {
        format!("{:e}", evalue)
    }
}

fn format_distance(row: &FeatureRow) -> String {
    if row.distance_2attc.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", row.distance_2attc)
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "NA"
    } else {
        value
    }
}

// ============================================================================
// Tests
// ============================================================================
