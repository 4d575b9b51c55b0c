//! Sequence I/O Module
//!
//! Reads replicon and protein FASTA files, plain or gzip-compressed, and
//! indexes translated proteins by identifier.
//!
//! # Protein Headers
//! Proteins predicted by prodigal carry their coordinates in the header:
//! ```text
//! >ACBA.007.P01_13_1 # 55 # 1014 # 1 # ID=1_1;partial=00;start_type=ATG
//! ```
//! The identifier is `<replicon>_<n>`, which ties each ORF to its replicon.
//!
//! # Examples
//! ```no_run
//! use integron_finder::seqio::{FastaFile, ProteinBank};
//!
//! let mut reader = FastaFile::open("replicons.fst.gz").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} bp", record.name, record.seq.len());
//! }
//!
//! let bank = ProteinBank::open("replicons.prt").unwrap();
//! let integrase = bank.get("ACBA.007.P01_13_1").unwrap();
//! println!("{}", integrase.seq);
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::IntegronError;
use crate::hits::{ElementKind, FeatureRow, Strand};

// ============================================================================
// FASTA Format
// ============================================================================

/// A FASTA record.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    /// Sequence identifier (text after '>' up to first whitespace).
    pub name: String,
    /// Remainder of the header line, trimmed.
    pub description: String,
    /// Sequence with line breaks removed.
    pub seq: String,
}

/// Sequential FASTA reader over any `Read` source.
pub struct FastaReader<R: Read> {
    reader: BufReader<R>,
    line_buf: String,
    current_header: Option<String>,
}

impl<R: Read> FastaReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = Self {
            reader: BufReader::with_capacity(1024 * 1024, inner),
            line_buf: String::with_capacity(256),
            current_header: None,
        };

        // Skip anything before the first header
        loop {
            reader.line_buf.clear();
            if reader.reader.read_line(&mut reader.line_buf)? == 0 {
                break;
            }
            if let Some(header) = reader.line_buf.strip_prefix('>') {
                reader.current_header = Some(header.trim_end().to_string());
                break;
            }
        }

        Ok(reader)
    }

    /// Reads the next record, `Ok(None)` at end of input.
    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.current_header.take() {
            Some(h) => h,
            None => return Ok(None),
        };

        let (name, description) = match header.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_string(), rest.trim().to_string()),
            None => (header.clone(), String::new()),
        };

        let mut seq = String::with_capacity(1024);
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }
            if let Some(next) = self.line_buf.strip_prefix('>') {
                self.current_header = Some(next.trim_end().to_string());
                break;
            }
            seq.push_str(self.line_buf.trim());
        }

        Ok(Some(FastaRecord { name, description, seq }))
    }
}

impl<R: Read> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// FASTA file with compression chosen from the extension (`.gz` is gzip).
pub enum FastaFile {
    Plain(FastaReader<File>),
    Gzipped(FastaReader<MultiGzDecoder<File>>),
}

impl FastaFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open FASTA: {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if ext == "gz" {
            Ok(FastaFile::Gzipped(FastaReader::new(MultiGzDecoder::new(file))?))
        } else {
            Ok(FastaFile::Plain(FastaReader::new(file)?))
        }
    }

    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        match self {
            FastaFile::Plain(r) => r.read_next(),
            FastaFile::Gzipped(r) => r.read_next(),
        }
    }
}

/// Reads every record of a FASTA file.
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    let path = path.as_ref();
    let mut reader = FastaFile::open(path)?;
    let mut records = Vec::new();
    while let Some(record) = reader
        .read_next()
        .with_context(|| format!("Failed to read FASTA: {}", path.display()))?
    {
        records.push(record);
    }
    Ok(records)
}

/// Writes records as FASTA, 60 residues per line.
pub fn write_fasta<'a, I, P>(records: I, path: P) -> Result<()>
where
    I: IntoIterator<Item = &'a FastaRecord>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create FASTA: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        if record.description.is_empty() {
            writeln!(writer, ">{}", record.name)?;
        } else {
            writeln!(writer, ">{} {}", record.name, record.description)?;
        }
        for chunk in record.seq.as_bytes().chunks(60) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Protein Bank
// ============================================================================

/// Translated proteins of one or more replicons, addressable by identifier.
///
/// Lookups are strict: an identifier matching no sequence, or several, is an
/// error rather than a silent pick.
#[derive(Debug, Default)]
pub struct ProteinBank {
    records: Vec<FastaRecord>,
    index: FxHashMap<String, Vec<usize>>,
}

impl ProteinBank {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_records(read_fasta(path)?))
    }

    pub fn from_records(records: Vec<FastaRecord>) -> Self {
        let mut index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, record) in records.iter().enumerate() {
            index.entry(record.name.clone()).or_default().push(i);
        }
        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FastaRecord] {
        &self.records
    }

    /// Returns the single sequence registered under `id`.
    pub fn get(&self, id: &str) -> Result<&FastaRecord, IntegronError> {
        match self.index.get(id).map(|v| v.as_slice()) {
            None | Some([]) => Err(IntegronError::MissingSequence(id.to_string())),
            Some([i]) => Ok(&self.records[*i]),
            Some(many) => Err(IntegronError::AmbiguousSequence {
                id: id.to_string(),
                count: many.len(),
            }),
        }
    }

    /// Records whose identifier is in `ids`, in bank order.
    pub fn subset<'a>(&'a self, ids: &[&str]) -> Vec<&'a FastaRecord> {
        self.records
            .iter()
            .filter(|r| ids.contains(&r.name.as_str()))
            .collect()
    }

    /// ORFs of `replicon_id` as protein rows, in genomic order.
    ///
    /// Records without a prodigal coordinate header are skipped with a debug
    /// message; they cannot be placed on the replicon.
    pub fn orfs(&self, replicon_id: &str) -> Vec<FeatureRow> {
        let mut rows: Vec<FeatureRow> = self
            .records
            .iter()
            .filter(|r| protein_replicon(&r.name) == replicon_id)
            .filter_map(|r| match parse_prodigal_coords(&r.description) {
                Some((beg, end, strand)) => {
                    Some(FeatureRow::new(r.name.clone(), ElementKind::Protein, beg, end, strand))
                }
                None => {
                    log::debug!("No coordinates in header of protein {}", r.name);
                    None
                }
            })
            .collect();
        rows.sort_by(|a, b| a.genomic_cmp(b));
        rows
    }
}

/// Replicon identifier of a prodigal protein identifier (`<replicon>_<n>`).
pub fn protein_replicon(protein_id: &str) -> &str {
    match protein_id.rsplit_once('_') {
        Some((replicon, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => replicon,
        _ => protein_id,
    }
}

/// Parses `# beg # end # strand # ...` from a prodigal header description.
pub fn parse_prodigal_coords(description: &str) -> Option<(usize, usize, Strand)> {
    let mut fields = description.split('#').map(str::trim);
    if !fields.next()?.is_empty() {
        return None;
    }
    let beg: usize = fields.next()?.parse().ok()?;
    let end: usize = fields.next()?.parse().ok()?;
    let strand = Strand::parse(fields.next()?)?;
    Some((beg.min(end), beg.max(end), strand))
}

// ============================================================================
// Tests
// ============================================================================
