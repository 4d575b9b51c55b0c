use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn, Level};
use simple_logger::init_with_level;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use integron_finder::annotation::add_features;
use integron_finder::classifier::{attach_proteins, IntegronClassifier, Summary};
use integron_finder::cluster::{GroupingParams, Topology};
use integron_finder::config::{Config, TopologyMap};
use integron_finder::func_annot::func_annot;
use integron_finder::hits::FeatureRow;
use integron_finder::hmm::{merge_integrase_hits, read_hmm, HmmFilter};
use integron_finder::infernal::{read_infernal, AttcFilter};
use integron_finder::integron::Integron;
use integron_finder::motif::{default_motifs, read_motifs, scan_integrons, Motif};
use integron_finder::output::{write_genbank, write_integrons_file, write_summary_file};
use integron_finder::replicon::Replicon;
use integron_finder::seqio::{protein_replicon, FastaFile, FastaRecord, ProteinBank};

fn parse_coverage(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=1.0).contains(&val) {
        Err(format!("Coverage must be between 0 and 1, got {}", val))
    } else {
        Ok(val)
    }
}

#[derive(Parser)]
#[command(name = "integron_finder")]
#[command(version)]
#[command(about = "Integron detection from attC, integrase and gene-prediction hit tables")]
#[command(long_about = r#"
integron_finder - assembles integrons from search tool hits

Reads the hits of a replicon FASTA:
  1. attC sites         cmsearch --tblout with the attC covariance model
  2. Integrases         hmmsearch --domtblout with the intI (and phage_int) profile
  3. ORFs               prodigal protein FASTA (coordinates in headers)
and groups them by proximity into integrons:
  complete   integrase and attC site(s)
  CALIN      attC site(s) without integrase
  In0        integrase without attC site

OUTPUT FILES:
  {replicon}.integrons   One line per integron element
    Columns: ID_integron, ID_replicon, element, pos_beg, pos_end, strand,
             evalue, type_elt, annotation, model, type, distance_2attC
  {replicon}.summary     Integron counts per replicon and type
  {id}.gbk               Replicon with integron features (GenBank)

EXAMPLES:
  integron_finder -r plasmids.fst -a attc_table.res -i intI_table.res -p plasmids.prt -o results/

  # circular replicons, attI sites and promoters, functional annotation of cassettes
  integron_finder -r plasmids.fst -a attc_table.res -i intI_table.res -p plasmids.prt \
      --circ --promoter-attI --func-annot --path-func-annot Resfams.hmm -o results/
"#)]
struct Args {
    #[arg(short = 'r', long, value_name = "FILE", help_heading = "Input")]
    replicon: PathBuf,

    #[arg(short = 'a', long = "attc-table", value_name = "FILE", help_heading = "Input")]
    attc_table: PathBuf,

    #[arg(short = 'i', long = "intI-table", value_name = "FILE", help_heading = "Input")]
    inti_table: PathBuf,

    #[arg(long = "phage-int-table", value_name = "FILE", help_heading = "Input")]
    phage_int_table: Option<PathBuf>,

    #[arg(short = 'p', long, value_name = "FILE", help_heading = "Input")]
    proteins: PathBuf,

    #[arg(short = 'd', long = "distance-threshold", value_name = "BP", default_value = "4000",
          allow_negative_numbers = true, help_heading = "Detection")]
    distance_threshold: i64,

    #[arg(long, conflicts_with = "linear", help_heading = "Detection")]
    circ: bool,

    #[arg(long, help_heading = "Detection")]
    linear: bool,

    #[arg(long = "topology-file", value_name = "FILE", help_heading = "Detection")]
    topology_file: Option<PathBuf>,

    #[arg(long = "evalue-attc", value_name = "FLOAT", default_value = "1.0", help_heading = "Detection")]
    evalue_attc: f64,

    #[arg(long = "min-attc-size", value_name = "BP", default_value = "40", help_heading = "Detection")]
    min_attc_size: usize,

    #[arg(long = "max-attc-size", value_name = "BP", default_value = "200", help_heading = "Detection")]
    max_attc_size: usize,

    #[arg(long = "keep-palindromes", help_heading = "Detection")]
    keep_palindromes: bool,

    #[arg(long = "union-integrases", help_heading = "Detection")]
    union_integrases: bool,

    #[arg(long = "promoter-attI", help_heading = "Detection")]
    promoter_atti: bool,

    #[arg(long, value_name = "FILE", help_heading = "Detection")]
    motifs: Option<PathBuf>,

    #[arg(long = "func-annot", help_heading = "Functional annotation")]
    func_annot: bool,

    #[arg(long = "path-func-annot", value_name = "FILE(S)", value_delimiter = ',',
          num_args = 1.., help_heading = "Functional annotation")]
    path_func_annot: Vec<PathBuf>,

    #[arg(long = "evalue-func-annot", value_name = "FLOAT", default_value = "10",
          help_heading = "Functional annotation")]
    evalue_func_annot: f64,

    #[arg(long = "coverage-func-annot", value_name = "FLOAT", default_value = "0.5",
          value_parser = parse_coverage, help_heading = "Functional annotation")]
    coverage_func_annot: f64,

    #[arg(long, value_name = "PATH", default_value = "hmmsearch", help_heading = "Functional annotation")]
    hmmsearch: String,

    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
    outdir: PathBuf,

    #[arg(short = 'k', long = "keep-tmp", help_heading = "Output")]
    keep_tmp: bool,

    #[arg(short = 'v', long, help_heading = "Output")]
    verbose: bool,

    #[arg(short = 't', long, value_name = "NUM", default_value = "0", help_heading = "Runtime")]
    cpu: usize,
}

impl Args {
    fn into_config(self) -> Config {
        let default_topology = if self.circ && !self.linear {
            Topology::Circular
        } else {
            Topology::Linear
        };
        Config {
            replicon: self.replicon,
            attc_table: self.attc_table,
            inti_table: self.inti_table,
            phage_int_table: self.phage_int_table,
            proteins: self.proteins,
            dist_threshold: self.distance_threshold,
            default_topology,
            topology_file: self.topology_file,
            attc_filter: AttcFilter {
                evalue: self.evalue_attc,
                min_size: self.min_attc_size,
                max_size: self.max_attc_size,
                keep_palindromes: self.keep_palindromes,
            },
            union_integrases: self.union_integrases,
            promoter_atti: self.promoter_atti,
            motif_file: self.motifs,
            func_annot: self.func_annot,
            func_annot_profiles: self.path_func_annot,
            func_annot_filter: HmmFilter {
                evalue: self.evalue_func_annot,
                coverage: self.coverage_func_annot,
            },
            hmmsearch: Some(PathBuf::from(self.hmmsearch)),
            cpu: if self.cpu == 0 { num_cpus::get() } else { self.cpu },
            outdir: self.outdir,
            keep_tmp: self.keep_tmp,
        }
    }
}

fn find_executable(name: &Path) -> Result<PathBuf> {
    if name.components().count() > 1 || name.is_absolute() {
        if name.is_file() {
            return Ok(name.to_path_buf());
        }
        anyhow::bail!("{} not found", name.display());
    }

    if let Ok(paths) = env::var("PATH") {
        for dir in env::split_paths(&paths) {
            let full_path = dir.join(name);
            if full_path.exists() && full_path.is_file() {
                return Ok(full_path);
            }
        }
    }

    anyhow::bail!("{} not found in PATH. Please install it or add it to your PATH.", name.display())
}

/// Inputs shared by every replicon of the run.
struct RunContext<'a> {
    config: &'a Config,
    topologies: &'a TopologyMap,
    bank: &'a ProteinBank,
    integrases: &'a [FeatureRow],
    /// Empty unless attI sites and promoters are searched.
    motifs: &'a [Motif],
}

fn main() -> Result<()> {
    let args = Args::parse();
    let start_time = Instant::now();
    init_with_level(if args.verbose { Level::Debug } else { Level::Info })
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    let mut config = args.into_config();
    if config.func_annot {
        let hmmsearch = config.hmmsearch.clone().unwrap_or_else(|| PathBuf::from("hmmsearch"));
        let found = find_executable(&hmmsearch)?;
        debug!("Found hmmsearch: {}", found.display());
        config.hmmsearch = Some(found);
    }
    config.validate()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.cpu)
        .build_global()
        .ok();

    fs::create_dir_all(&config.outdir)
        .with_context(|| format!("Failed to create output directory: {}", config.outdir.display()))?;

    let topologies = match &config.topology_file {
        Some(path) => TopologyMap::read(path, config.default_topology)?,
        None => TopologyMap::new(config.default_topology),
    };

    let bank = ProteinBank::open(&config.proteins)?;
    info!("{} protein(s) loaded from {}", bank.len(), config.proteins.display());

    let integrases = read_integrases(&config)?;
    info!("{} integrase(s) found", integrases.len());

    let motifs = load_motifs(&config)?;

    let ctx = RunContext {
        config: &config,
        topologies: &topologies,
        bank: &bank,
        integrases: &integrases,
        motifs: &motifs,
    };

    let mut all_integrons = Vec::new();
    let mut summaries = Vec::new();
    let mut failed = 0usize;

    let mut reader = FastaFile::open(&config.replicon)?;
    while let Some(record) = reader
        .read_next()
        .with_context(|| format!("Failed to read replicon: {}", config.replicon.display()))?
    {
        let replicon_id = record.name.clone();
        info!("Processing replicon {}", replicon_id);
        match process_replicon(record, &ctx) {
            Ok(integrons) => {
                let summary = Summary::new(&replicon_id, &integrons);
                info!("{}", summary);
                summaries.push(summary);
                all_integrons.extend(integrons);
            }
            Err(e) => {
                error!("Replicon {} skipped: {:#}", replicon_id, e);
                failed += 1;
            }
        }
    }

    let stem = config
        .replicon
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".fst").trim_end_matches(".fasta").to_string())
        .unwrap_or_else(|| "replicons".to_string());
    let integrons_path = config.outdir.join(format!("{}.integrons", stem));
    write_integrons_file(&integrons_path, &all_integrons)?;
    write_summary_file(config.outdir.join(format!("{}.summary", stem)), &summaries)?;
    info!("Results written to: {}", integrons_path.display());
    info!("Elapsed time: {:.1?}", start_time.elapsed());

    if failed > 0 {
        anyhow::bail!("{} replicon(s) failed, see errors above", failed);
    }
    Ok(())
}

/// Integrase rows of all replicons, from the intI and phage_int tables.
fn read_integrases(config: &Config) -> Result<Vec<FeatureRow>> {
    let filter = HmmFilter::integrase();
    let inti_hits = read_hmm(&config.inti_table, &filter)?;
    let phage_hits = match &config.phage_int_table {
        Some(path) => read_hmm(path, &filter)?,
        None => Vec::new(),
    };
    merge_integrase_hits(inti_hits, phage_hits, config.union_integrases)
        .context("Failed to build integrase table")
}

fn load_motifs(config: &Config) -> Result<Vec<Motif>> {
    if !config.promoter_atti {
        return Ok(Vec::new());
    }
    let motifs = match &config.motif_file {
        Some(path) => read_motifs(path)?,
        None => default_motifs(),
    };
    info!("{} attI/promoter motif(s) searched", motifs.len());
    Ok(motifs)
}

/// Detects, annotates and writes the integrons of one replicon.
fn process_replicon(record: FastaRecord, ctx: &RunContext) -> Result<Vec<Integron>> {
    let config = ctx.config;
    let topology = ctx.topologies.get(&record.name);
    let mut replicon = Replicon::from_record(record, topology);
    debug!("{}: {} bp, {}", replicon.id, replicon.len(), topology);

    let params = GroupingParams::new(config.dist_threshold, topology, replicon.len())?;

    let mut rows = read_infernal(&config.attc_table, &replicon.id, &config.attc_filter)?;
    debug!("{}: {} attC site(s)", replicon.id, rows.len());
    rows.extend(
        ctx.integrases
            .iter()
            .filter(|r| protein_replicon(&r.id) == replicon.id)
            .cloned(),
    );

    let classifier = IntegronClassifier::new(replicon.id.as_str(), params);
    let mut integrons = classifier.classify_batch(rows);
    if !ctx.motifs.is_empty() {
        let sites = scan_integrons(&mut integrons, &replicon, ctx.motifs);
        debug!("{}: {} attI site(s) or promoter(s)", replicon.id, sites);
    }
    attach_proteins(&mut integrons, &ctx.bank.orfs(&replicon.id));

    let tmp_dir = config.tmp_dir(&replicon.id);
    if let Some(fa_config) = config.func_annot_config(&tmp_dir) {
        fs::create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create directory: {}", tmp_dir.display()))?;
        let annotated = func_annot(&mut integrons, &replicon.id, ctx.bank, &fa_config);
        if !config.keep_tmp {
            if let Err(e) = fs::remove_dir_all(&tmp_dir) {
                warn!("Failed to remove {}: {}", tmp_dir.display(), e);
            }
        }
        annotated?;
    }

    add_features(&mut replicon, &integrons, ctx.bank)?;
    let gbk = config.outdir.join(format!("{}.gbk", replicon.id.replace('|', "_")));
    write_genbank(&gbk, &replicon)?;

    Ok(integrons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use integron_finder::integron::IntegronType;
    use std::io::Write;

    const REPLICON_ID: &str = "ACBA.007.P01_13";

    const ATTC_TABLE: &str = "\
#target name         accession query name           accession mdl mdl from   mdl to seq from   seq to strand trunc pass   gc  bias  score   E-value inc description of target
ACBA.007.P01_13      -         attc_4               -          cm        1       47    17884    17825      -    no    1 0.41   0.0   33.6     1e-09 !   -
ACBA.007.P01_13      -         attc_4               -          cm        1       47    19149    19080      -    no    1 0.47   0.0   20.7    0.0001 !   -
ACBA.007.P01_13      -         attc_4               -          cm        1       47    19726    19618      -    no    1 0.45   0.0   29.1   1.1e-07 !   -
";

    const INTI_TABLE: &str = "\
#                                                                            --- full sequence --- -------------- this domain -------------   hmm coord   ali coord   env coord
ACBA.007.P01_13_1 - 320 intI_Cterm - 84 1e-30 100.0 0.1 1 1 1e-30 1.9e-25 98.0 0.1 1 84 10 300 8 305 0.95 # 55 # 1014 # 1 # ID=1_1;partial=00
";

    const PROTEINS: &str = "\
>ACBA.007.P01_13_1 # 55 # 1014 # 1 # ID=1_1;partial=00
MKTAAPRLSRLLQQAVQ*
>ACBA.007.P01_13_20 # 17900 # 18500 # -1 # ID=1_20;partial=00
MSDNTQ*
";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    // class 1 integrase promoter (+) and attI1 (-) just after the integrase
    const P_INTI1: &str = "TTGCTGCTTGGATGCCCGAGGCATAGACTGTACA";
    const ATTI1_REVCOMP: &str = "AACTTTGTTTTAGGGCGACTGCCCTGCTGCGTAACATCGTTGCTGCTCCATAACATCA";

    fn config(dir: &Path, topology: Topology) -> Config {
        let mut seq = "A".repeat(20301);
        seq.replace_range(1100..1100 + P_INTI1.len(), P_INTI1);
        seq.replace_range(1300..1300 + ATTI1_REVCOMP.len(), ATTI1_REVCOMP);
        Config {
            replicon: write(dir, "replicon.fst", &format!(">{}\n{}\n", REPLICON_ID, seq)),
            attc_table: write(dir, "attc_table.res", ATTC_TABLE),
            inti_table: write(dir, "intI_table.res", INTI_TABLE),
            phage_int_table: None,
            proteins: write(dir, "replicon.prt", PROTEINS),
            dist_threshold: 4000,
            default_topology: topology,
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
            outdir: dir.to_path_buf(),
            keep_tmp: false,
        }
    }

    fn run(config: &Config) -> Vec<Integron> {
        config.validate().unwrap();
        let topologies = TopologyMap::new(config.default_topology);
        let bank = ProteinBank::open(&config.proteins).unwrap();
        let integrases = read_integrases(config).unwrap();
        let motifs = load_motifs(config).unwrap();
        let ctx = RunContext {
            config,
            topologies: &topologies,
            bank: &bank,
            integrases: &integrases,
            motifs: &motifs,
        };
        let record = integron_finder::seqio::read_fasta(&config.replicon).unwrap().remove(0);
        process_replicon(record, &ctx).unwrap()
    }

    #[test]
    fn test_circular_replicon_gives_complete_integron() {
        let dir = tempfile::tempdir().unwrap();
        let integrons = run(&config(dir.path(), Topology::Circular));
        assert_eq!(integrons.len(), 1);
        let integron = &integrons[0];
        assert_eq!(integron.integron_type(), IntegronType::Complete);
        assert_eq!(integron.integrase()[0].model, "intI_Cterm");
        assert_eq!(integron.attc().len(), 3);
        assert_eq!(integron.proteins().len(), 1);
        assert!(integron.span().is_wrapped());

        let gbk = fs::read_to_string(dir.path().join("ACBA.007.P01_13.gbk")).unwrap();
        assert!(gbk.contains("integron_01"));
        assert!(gbk.contains("MKTAAPRLSRLLQQAVQ"));
    }

    #[test]
    fn test_linear_replicon_gives_in0_and_calin() {
        let dir = tempfile::tempdir().unwrap();
        let integrons = run(&config(dir.path(), Topology::Linear));
        let types: Vec<IntegronType> = integrons.iter().map(|i| i.integron_type()).collect();
        assert_eq!(types, vec![IntegronType::In0, IntegronType::Calin]);
        assert!(integrons[0].proteins().is_empty());
        assert_eq!(integrons[1].proteins()[0].id, "ACBA.007.P01_13_20");
    }

    #[test]
    fn test_atti_and_promoter_in_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), Topology::Circular);
        config.promoter_atti = true;
        let integrons = run(&config);
        assert_eq!(integrons.len(), 1);
        assert_eq!(integrons[0].promoter().len(), 1);
        assert_eq!(integrons[0].atti().len(), 1);
        assert_eq!(
            integrons[0].span(),
            integron_finder::cluster::Span::WrappedAtOrigin { start1: 17825, end1: 20301, start2: 1, end2: 1358 }
        );

        let mut table = Vec::new();
        integron_finder::output::write_integrons(&mut table, &integrons).unwrap();
        let table = String::from_utf8(table).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[2],
            "integron_01\tACBA.007.P01_13\tP_intI1_1\t1101\t1134\t1\tNA\tpromoter\tpromoter\tP_intI1\tcomplete\tNA"
        );
        assert_eq!(
            lines[3],
            "integron_01\tACBA.007.P01_13\tattI1_1\t1301\t1358\t-1\tNA\tattI\tattI\tattI1\tcomplete\tNA"
        );

        let gbk = fs::read_to_string(dir.path().join("ACBA.007.P01_13.gbk")).unwrap();
        assert!(gbk.contains("P_intI1_1"));
        assert!(gbk.contains("attI1_1"));
        assert!(gbk.contains("1..1358"));
    }

    #[test]
    fn test_no_sites_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let integrons = run(&config(dir.path(), Topology::Circular));
        assert!(integrons[0].promoter().is_empty());
        assert!(integrons[0].atti().is_empty());
    }

    #[test]
    fn test_find_executable() {
        assert!(find_executable(Path::new("integron-finder-no-such-tool")).is_err());
        assert!(find_executable(Path::new("/nonexistent/hmmsearch")).is_err());
    }
}
