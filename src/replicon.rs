//! Replicon Module
//!
//! A scanned DNA molecule: its sequence, topology and the feature list the
//! annotation projector appends to. Converts to a `gb_io` record for GenBank
//! output.

use gb_io::seq::{Feature, Seq};

use crate::cluster::Topology;
use crate::seqio::FastaRecord;

/// Longest name a GenBank LOCUS line holds.
pub const MAX_NAME_LEN: usize = 16;

/// A replicon and its projected features.
#[derive(Debug, Clone)]
pub struct Replicon {
    /// Identifier as read from the FASTA header; never truncated.
    pub id: String,
    /// Name written to the GenBank record.
    pub name: String,
    pub seq: Vec<u8>,
    pub topology: Topology,
    pub features: Vec<Feature>,
}

impl Replicon {
    pub fn new(id: impl Into<String>, seq: Vec<u8>, topology: Topology) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            seq,
            topology,
            features: Vec::new(),
        }
    }

    pub fn from_record(record: FastaRecord, topology: Topology) -> Self {
        Self::new(record.name, record.seq.into_bytes(), topology)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Keeps the last [`MAX_NAME_LEN`] characters of the name.
    pub fn truncate_name(&mut self) {
        self.name = truncated_name(&self.name).to_string();
    }

    /// GenBank record of the replicon with its features.
    pub fn to_gb_seq(&self) -> Seq {
        let mut seq = Seq::empty();
        seq.name = Some(self.name.clone());
        seq.seq = self.seq.clone();
        seq.molecule_type = Some("DNA".to_string());
        seq.topology = match self.topology {
            Topology::Circular => gb_io::seq::Topology::Circular,
            Topology::Linear => gb_io::seq::Topology::Linear,
        };
        seq.features = self.features.clone();
        seq
    }
}

/// Suffix of `name` made of its last [`MAX_NAME_LEN`] characters.
pub fn truncated_name(name: &str) -> &str {
    let count = name.chars().count();
    if count <= MAX_NAME_LEN {
        return name;
    }
    match name.char_indices().nth(count - MAX_NAME_LEN) {
        Some((i, _)) => &name[i..],
        None => name,
    }
}
