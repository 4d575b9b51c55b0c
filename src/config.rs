//! Configuration Module
//!
//! Run settings gathered from the command line, checked once before any
//! replicon is read, and the per-replicon topology table.
//!
//! # Topology File
//! One replicon per line, identifier then topology:
//! ```text
//! # id          topology
//! ACBA.007.P01_13  circ
//! contig_2         lin
//! ```
//! Replicons not listed use the default topology.

use anyhow::Context;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::cluster::Topology;
use crate::error::{IntegronError, Result};
use crate::func_annot::FuncAnnotConfig;
use crate::hmm::HmmFilter;
use crate::infernal::AttcFilter;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// Replicon FASTA (plain or gzip).
    pub replicon: PathBuf,
    /// `cmsearch --tblout` table of attC hits.
    pub attc_table: PathBuf,
    /// `hmmsearch --domtblout` table of the intI profile.
    pub inti_table: PathBuf,
    /// `hmmsearch --domtblout` table of the phage_int profile.
    pub phage_int_table: Option<PathBuf>,
    /// Prodigal protein FASTA.
    pub proteins: PathBuf,

    pub dist_threshold: i64,
    pub default_topology: Topology,
    pub topology_file: Option<PathBuf>,
    pub attc_filter: AttcFilter,
    pub union_integrases: bool,
    /// Search attI sites and promoters of complete integrons.
    pub promoter_atti: bool,
    /// Motifs replacing the built-in ones (see [`crate::motif`]).
    pub motif_file: Option<PathBuf>,

    pub func_annot: bool,
    pub func_annot_profiles: Vec<PathBuf>,
    pub func_annot_filter: HmmFilter,
    pub hmmsearch: Option<PathBuf>,

    pub cpu: usize,
    pub outdir: PathBuf,
    pub keep_tmp: bool,
}

impl Config {
    /// Checks paths and cutoffs; every failure is an [`IntegronError::Config`].
    pub fn validate(&self) -> Result<()> {
        validate_path("replicon", &self.replicon)?;
        validate_path("attC table", &self.attc_table)?;
        validate_path("intI table", &self.inti_table)?;
        if let Some(path) = &self.phage_int_table {
            validate_path("phage_int table", path)?;
        }
        validate_path("protein file", &self.proteins)?;
        if let Some(path) = &self.topology_file {
            validate_path("topology file", path)?;
        }

        if self.dist_threshold <= 0 {
            return Err(config_error(format!(
                "distance threshold must be a positive number of bp, got {}",
                self.dist_threshold
            )));
        }
        if self.attc_filter.evalue.is_nan() || self.attc_filter.evalue < 0.0 {
            return Err(config_error(format!("attC evalue must be >= 0, got {}", self.attc_filter.evalue)));
        }
        if self.attc_filter.min_size > self.attc_filter.max_size {
            return Err(config_error(format!(
                "min attC size ({}) is larger than max attC size ({})",
                self.attc_filter.min_size, self.attc_filter.max_size
            )));
        }
        if self.union_integrases && self.phage_int_table.is_none() {
            return Err(config_error("--union-integrases needs --phage-int-table".to_string()));
        }
        if let Some(path) = &self.motif_file {
            if !self.promoter_atti {
                return Err(config_error("--motifs needs --promoter-attI".to_string()));
            }
            validate_path("motif file", path)?;
        }

        if self.func_annot {
            if self.func_annot_profiles.is_empty() {
                return Err(config_error("--func-annot needs at least one profile file".to_string()));
            }
            for profile in &self.func_annot_profiles {
                validate_path("profile", profile)?;
            }
            if self.func_annot_filter.evalue.is_nan() || self.func_annot_filter.evalue < 0.0 {
                return Err(config_error(format!(
                    "functional annotation evalue must be >= 0, got {}",
                    self.func_annot_filter.evalue
                )));
            }
            if !(0.0..=1.0).contains(&self.func_annot_filter.coverage) {
                return Err(config_error(format!(
                    "functional annotation coverage must be between 0 and 1, got {}",
                    self.func_annot_filter.coverage
                )));
            }
        }

        if self.cpu == 0 {
            return Err(config_error("cpu must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Directory holding scratch files of one replicon.
    pub fn tmp_dir(&self, replicon_id: &str) -> PathBuf {
        self.outdir.join(format!("tmp_{}", replicon_id))
    }

    /// Functional annotation settings, `None` when disabled.
    pub fn func_annot_config(&self, tmp_dir: &Path) -> Option<FuncAnnotConfig> {
        if !self.func_annot {
            return None;
        }
        Some(FuncAnnotConfig {
            hmmsearch: self.hmmsearch.clone().unwrap_or_else(|| PathBuf::from("hmmsearch")),
            profiles: self.func_annot_profiles.clone(),
            filter: self.func_annot_filter,
            cpu: self.cpu,
            tmp_dir: tmp_dir.to_path_buf(),
        })
    }
}

fn config_error(message: String) -> IntegronError {
    IntegronError::Config(message)
}

fn validate_path(what: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(config_error(format!("{} {} does not exist", what, path.display())));
    }
    if !path.is_file() {
        return Err(config_error(format!("{} {} is not a file", what, path.display())));
    }
    Ok(())
}

// ============================================================================
// Topology Map
// ============================================================================

/// Topology of each replicon, with a default for unlisted ones.
#[derive(Debug, Clone, Default)]
pub struct TopologyMap {
    default: Topology,
    overrides: FxHashMap<String, Topology>,
}

impl TopologyMap {
    pub fn new(default: Topology) -> Self {
        Self {
            default,
            overrides: FxHashMap::default(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P, default: Topology) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open topology file: {}", path.display()))?;
        Self::parse(file, default)
            .with_context(|| format!("Failed to parse topology file: {}", path.display()))
    }

    pub fn parse<R: Read>(reader: R, default: Topology) -> anyhow::Result<Self> {
        let mut map = Self::new(default);
        for (n, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let (id, topology) = match (fields.next(), fields.next()) {
                (Some(id), Some(topology)) => (id, topology),
                _ => anyhow::bail!(IntegronError::Config(format!(
                    "line {}: expected '<replicon id> <circ|lin>'",
                    n + 1
                ))),
            };
            let topology: Topology = topology.parse().with_context(|| format!("line {}", n + 1))?;
            map.overrides.insert(id.to_string(), topology);
        }
        Ok(map)
    }

    pub fn get(&self, replicon_id: &str) -> Topology {
        self.overrides.get(replicon_id).copied().unwrap_or(self.default)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn touch() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x").unwrap();
        file
    }

    fn config(file: &NamedTempFile) -> Config {
        let path = file.path().to_path_buf();
        Config {
            replicon: path.clone(),
            attc_table: path.clone(),
            inti_table: path.clone(),
            phage_int_table: None,
            proteins: path,
            dist_threshold: 4000,
            default_topology: Topology::Linear,
            topology_file: None,
            attc_filter: AttcFilter::default(),
            union_integrases: false,
            promoter_atti: false,
            motif_file: None,
            func_annot: false,
            func_annot_profiles: Vec::new(),
            func_annot_filter: HmmFilter::default(),
            hmmsearch: None,
            cpu: 1,
            outdir: PathBuf::from("out"),
            keep_tmp: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = touch();
        assert!(config(&file).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold_and_cutoffs() {
        let file = touch();

        let mut cfg = config(&file);
        cfg.dist_threshold = 0;
        assert!(matches!(cfg.validate(), Err(IntegronError::Config(_))));

        let mut cfg = config(&file);
        cfg.attc_filter.min_size = 300;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&file);
        cfg.attc_filter.evalue = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&file);
        cfg.func_annot = true;
        assert!(cfg.validate().is_err());
        cfg.func_annot_profiles = vec![file.path().to_path_buf()];
        assert!(cfg.validate().is_ok());
        cfg.func_annot_filter.coverage = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&file);
        cfg.union_integrases = true;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&file);
        cfg.motif_file = Some(file.path().to_path_buf());
        assert!(cfg.validate().is_err());
        cfg.promoter_atti = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_input() {
        let file = touch();
        let mut cfg = config(&file);
        cfg.proteins = PathBuf::from("/nonexistent/replicon.prt");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("protein file /nonexistent/replicon.prt does not exist"));
    }

    #[test]
    fn test_func_annot_config() {
        let file = touch();
        let mut cfg = config(&file);
        assert!(cfg.func_annot_config(Path::new("tmp")).is_none());
        cfg.func_annot = true;
        cfg.cpu = 4;
        let fa = cfg.func_annot_config(Path::new("out/tmp_pl")).unwrap();
        assert_eq!(fa.cpu, 4);
        assert_eq!(fa.hmmsearch, PathBuf::from("hmmsearch"));
        assert_eq!(fa.tmp_dir, PathBuf::from("out/tmp_pl"));
        assert_eq!(cfg.tmp_dir("pl"), PathBuf::from("out/tmp_pl"));
    }

    #[test]
    fn test_topology_map() {
        let text = "# id topology\nACBA.007.P01_13 circ\n\ncontig_2  lin\n";
        let map = TopologyMap::parse(Cursor::new(text), Topology::Linear).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("ACBA.007.P01_13"), Topology::Circular);
        assert_eq!(map.get("contig_2"), Topology::Linear);
        assert_eq!(map.get("unlisted"), Topology::Linear);

        let map = TopologyMap::parse(Cursor::new(""), Topology::Circular).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.get("any"), Topology::Circular);
    }

    #[test]
    fn test_topology_map_errors() {
        assert!(TopologyMap::parse(Cursor::new("contig_1\n"), Topology::Linear).is_err());
        let err = TopologyMap::parse(Cursor::new("contig_1 ring\n"), Topology::Linear).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
