use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use clap::{builder::PossibleValue, Args, Parser, ValueEnum};
use format_num::NumberFormat;
use libsuffixerator::{
    codehash::hash_first_codes,
    encseq::{Alphabet, EncSeq, EncodedSequence},
    error::{IoContext, SfxError},
    firstcodes::{first_codes, CodeOccurrence, FirstCodesOptions},
    index::check_suffix_table,
    metadata::IndexMetadata,
    options::{
        parse_memlimit, IndexKind, IndexOptions, MaxDepth, PackedIndexParams,
        PrefixLength, SideTables, SortStrategy,
    },
    progress::SfxProgress,
    suffixerator::run_suffixerator,
    types::Readmode,
    util::read_sequence_file,
};
use log::info;
use std::{
    ffi::OsStr,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};
use tabled::Table;

// --------------------------------------------------
#[derive(Parser, Debug)]
#[command(arg_required_else_help = true, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Number of threads
    #[arg(short, long, value_name = "THREADS")]
    pub threads: Option<usize>,

    /// Log level
    #[arg(short, long)]
    pub log: Option<LogLevel>,

    /// Log file
    #[arg(long)]
    pub log_file: Option<String>,
}

#[derive(Parser, Debug)]
pub enum Command {
    /// Build an enhanced suffix array
    Esa(EsaArgs),

    /// Build a packed BWT index
    Packed(PackedArgs),

    /// Check the order of a suffix table
    Check(CheckArgs),

    /// Count the k-mers starting each sequence
    Firstcodes(FirstCodesArgs),

    /// Summarize an index
    Summarize(SummarizeArgs),
}

// --------------------------------------------------
/// Options shared by both index kinds
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Input file
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Index name, outputs are "<INDEXNAME>.<ext>"
    #[arg(short, long, value_name = "INDEXNAME")]
    pub output: Option<String>,

    /// Readmode (fwd, rev, cpl, rcl)
    #[arg(short, long, value_name = "READMODE", default_value = "fwd")]
    pub dir: Readmode,

    /// Prefix length, automatic if omitted
    #[arg(long("pl"), value_name = "PREFIX_LEN")]
    pub prefix_length: Option<usize>,

    /// Memory limit, e.g. 512MB or 2GB
    #[arg(short, long, value_name = "MEM", conflicts_with = "parts")]
    pub memlimit: Option<String>,

    /// Number of parts
    #[arg(short, long, value_name = "NUM_PARTS")]
    pub parts: Option<usize>,

    /// Bucket widths for insertion, merge and counting sort
    #[arg(long, value_name = "BOUNDS", value_delimiter = ',')]
    pub algbds: Option<Vec<usize>>,

    /// Write the bucket table
    #[arg(long)]
    pub bck: bool,

    /// Input is protein
    #[arg(long)]
    pub protein: bool,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, Parser)]
#[command(about, alias = "es")]
pub struct EsaArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Write the suffix table
    #[arg(long)]
    pub suf: bool,

    /// Write the LCP table
    #[arg(long)]
    pub lcp: bool,

    /// Write the BWT table
    #[arg(long)]
    pub bwt: bool,

    /// Sort only this deep; the prefix length if no value is given
    #[arg(long, value_name = "DEPTH", num_args(0..=1))]
    pub maxdepth: Option<Option<usize>>,

    /// Write the suffix table in bucket order and sort it from disk
    #[arg(long)]
    pub stream: bool,

    /// Verify the order of every part
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Parser)]
#[command(about, alias = "pa")]
pub struct PackedArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Symbols per block
    #[arg(long, value_name = "BSIZE", default_value = "8")]
    pub bsize: usize,

    /// Blocks per rank sample
    #[arg(long, value_name = "BLBUCK", default_value = "8")]
    pub blbuck: usize,

    /// Sample every n-th text position for locating
    #[arg(long, value_name = "LOCFREQ", default_value = "32")]
    pub locfreq: usize,
}

#[derive(Debug, Parser)]
#[command(about, alias = "ch")]
pub struct CheckArgs {
    /// Index name
    #[arg(value_name = "INDEXNAME")]
    pub index: String,

    /// Sequence file the index was built from
    #[arg(short, long, value_name = "INPUT")]
    pub sequence: String,

    /// Input is protein
    #[arg(long)]
    pub protein: bool,

    /// List errors
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(about, alias = "fc")]
pub struct FirstCodesArgs {
    /// Input file
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// k-mer size
    #[arg(short, long, value_name = "K", default_value = "31")]
    pub kmer: usize,

    /// Bucket positions with a hash table of the first codes
    #[arg(long)]
    pub hash: bool,

    /// Depth of the binary search cache
    #[arg(long, value_name = "DEPTH", default_value = "10")]
    pub cache_depth: usize,

    /// Codes collected before a batched lookup
    #[arg(long, value_name = "SIZE", default_value = "3000000")]
    pub buffer_size: usize,

    /// Symbols that must follow a position for its code to count
    #[arg(long, value_name = "LEN", default_value = "45")]
    pub min_suffix_len: usize,

    /// Input is protein
    #[arg(long)]
    pub protein: bool,
}

#[derive(Debug, Parser)]
#[command(about, alias = "su")]
pub struct SummarizeArgs {
    /// Index name
    #[arg(value_name = "INDEXNAME")]
    pub index: String,
}

// --------------------------------------------------
#[derive(Debug, Clone)]
pub enum LogLevel {
    Info,
    Debug,
}

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[LogLevel::Info, LogLevel::Debug]
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue> {
        Some(match self {
            LogLevel::Info => PossibleValue::new("info"),
            LogLevel::Debug => PossibleValue::new("debug"),
        })
    }
}

// --------------------------------------------------
/// Set up logging and the thread pool
pub fn setup(args: &Cli) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(match args.log {
            Some(LogLevel::Debug) => log::LevelFilter::Debug,
            Some(LogLevel::Info) => log::LevelFilter::Info,
            _ => log::LevelFilter::Off,
        })
        .target(match args.log_file {
            // Optional log file, default to STDOUT
            Some(ref filename) => env_logger::Target::Pipe(Box::new(BufWriter::new(
                File::create(filename).with_path(filename)?,
            ))),
            _ => env_logger::Target::Stdout,
        })
        .init();

    let num_threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;
    info!("Using {num_threads} thread{}", if num_threads == 1 { "" } else { "s" });
    Ok(())
}

// --------------------------------------------------
fn read_input(filename: &str, protein: bool) -> Result<EncSeq> {
    let now = Instant::now();
    let encseq = read_sequence_file(filename, protein.then_some(Alphabet::Protein))?;
    let num_fmt = NumberFormat::new();
    info!(
        "Read {} sequence{} of total length {} in {:?}",
        num_fmt.format(",.0", encseq.num_of_sequences() as f64),
        if encseq.num_of_sequences() == 1 { "" } else { "s" },
        num_fmt.format(",.0", encseq.total_length() as f64),
        now.elapsed()
    );
    Ok(encseq)
}

// --------------------------------------------------
// Name the index after the input unless told otherwise
fn index_name(args: &BuildArgs) -> PathBuf {
    args.output.as_ref().map_or_else(
        || {
            PathBuf::from(
                Path::new(&args.input)
                    .file_stem()
                    .unwrap_or(OsStr::new("out")),
            )
        },
        PathBuf::from,
    )
}

// --------------------------------------------------
// Only called once the options passed validation
fn create_index_dir(index_name: &Path) -> Result<()> {
    if let Some(dir) = index_name.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_path(dir.display())?;
    }
    Ok(())
}

// --------------------------------------------------
fn index_options(args: &BuildArgs, kind: IndexKind) -> Result<IndexOptions> {
    let mut options = IndexOptions::new(index_name(args));
    options.kind = kind;
    options.readmode = args.dir;
    options.prefix_length = args
        .prefix_length
        .map_or(PrefixLength::Automatic, PrefixLength::Fixed);
    options.maximum_space = args
        .memlimit
        .as_deref()
        .map(parse_memlimit)
        .transpose()?
        .unwrap_or(0);
    options.num_parts = args.parts;
    options.tables.bcktab = args.bck;
    options.show_progress = args.progress;
    if let Some(bounds) = &args.algbds {
        options.strategy = SortStrategy::default().with_bounds(bounds)?;
    }
    Ok(options)
}

// --------------------------------------------------
fn report(meta: &IndexMetadata, index_name: &Path, timer: Instant) {
    let num_fmt = NumberFormat::new();
    println!(
        "Indexed {} suffix{} into \"{}\" in {:?}",
        num_fmt.format(",.0", meta.num_suffixes as f64),
        if meta.num_suffixes == 1 { "" } else { "es" },
        index_name.display(),
        timer.elapsed()
    );
}

// --------------------------------------------------
pub fn esa(args: &EsaArgs) -> Result<()> {
    let timer = Instant::now();
    let mut options = index_options(&args.build, IndexKind::Esa)?;
    options.tables = SideTables {
        suftab: args.suf,
        lcptab: args.lcp,
        bwttab: args.bwt,
        bcktab: args.build.bck,
    };
    options.strategy.max_depth = args
        .maxdepth
        .map(|depth| depth.map_or(MaxDepth::Automatic, MaxDepth::Fixed));
    options.strategy.stream_suftab = args.stream;
    options.strategy.check_sorted = args.check;
    // Fail on bad options before reading the input
    options.validate()?;
    create_index_dir(&options.index_name)?;

    let encseq = read_input(&args.build.input, args.build.protein)?;
    let meta = run_suffixerator(&options, &encseq)?;
    report(&meta, &options.index_name, timer);
    Ok(())
}

// --------------------------------------------------
pub fn packed(args: &PackedArgs) -> Result<()> {
    let timer = Instant::now();
    let mut options = index_options(&args.build, IndexKind::Packed)?;
    options.packed = PackedIndexParams {
        block_size: args.bsize,
        bucket_blocks: args.blbuck,
        locate_interval: args.locfreq,
    };
    options.validate()?;
    create_index_dir(&options.index_name)?;

    let encseq = read_input(&args.build.input, args.build.protein)?;
    let meta = run_suffixerator(&options, &encseq)?;
    report(&meta, &options.index_name, timer);
    Ok(())
}

// --------------------------------------------------
pub fn check(args: &CheckArgs) -> Result<()> {
    let now = Instant::now();
    let encseq = read_input(&args.sequence, args.protein)?;
    let errors = check_suffix_table(Path::new(&args.index), &encseq)?;
    let num_errors = errors.len();
    let num_suffixes = encseq.total_length() + 1;
    let num_fmt = NumberFormat::new();
    println!(
        "Checked {} suffix{}, found {} error{} in suffix table.",
        num_fmt.format(",.0", num_suffixes as f64),
        if num_suffixes == 1 { "" } else { "es" },
        num_fmt.format(",.0", num_errors as f64),
        if num_errors == 1 { "" } else { "s" },
    );

    if args.verbose {
        for err in &errors {
            println!("{err}");
        }
    }
    println!("Finished checking in {:?}.", now.elapsed());

    if num_errors > 0 {
        bail!(SfxError::InternalConsistency(format!(
            "suffix table \"{}\" is not sorted",
            args.index
        )));
    }
    Ok(())
}

// --------------------------------------------------
pub fn firstcodes(args: &FirstCodesArgs) -> Result<()> {
    let encseq = read_input(&args.input, args.protein)?;
    let options = FirstCodesOptions {
        kmer_size: args.kmer,
        cache_depth: args.cache_depth,
        buffer_size: args.buffer_size,
        min_suffix_len: args.min_suffix_len,
    };
    let mut progress = SfxProgress::new(false);
    progress.start("collecting first codes");
    let num_fmt = NumberFormat::new();

    if args.hash {
        let hashed = hash_first_codes(&encseq, &options, &mut progress)?;
        progress.stop();
        println!(
            "Found {} different code{} in {} sequences",
            num_fmt.format(",.0", hashed.different_codes as f64),
            if hashed.different_codes == 1 { "" } else { "s" },
            num_fmt.format(",.0", encseq.num_of_sequences() as f64),
        );
        println!(
            "Bucketed {} positions",
            num_fmt.format(",.0", hashed.suftab.len() as f64)
        );
        return Ok(());
    }

    let codes = first_codes(&encseq, &options, &mut progress)?;
    progress.stop();
    let stats = &codes.stats;
    println!(
        "Found {} different code{} in {} sequences",
        num_fmt.format(",.0", stats.different_codes as f64),
        if stats.different_codes == 1 { "" } else { "s" },
        num_fmt.format(",.0", stats.num_of_sequences as f64),
    );

    let mut rows = vec![vec![
        "Representation".to_string(),
        match &codes.occurrence {
            CodeOccurrence::Bits(_) => "bits".to_string(),
            CodeOccurrence::Array(_) => "array".to_string(),
        },
    ]];
    for (name, value) in [
        ("Skipped sequences", stats.skipped_sequences),
        ("First code hits", stats.first_code_hits),
        ("Buffered codes", stats.buffer_total),
        ("Buffer flushes", stats.flush_count),
        ("Cache search depth", stats.depth_total),
    ] {
        rows.push(vec![
            name.to_string(),
            num_fmt.format(",.0", value as f64),
        ]);
    }
    println!("{}", Table::from_iter(rows));
    Ok(())
}

// --------------------------------------------------
pub fn summarize(args: &SummarizeArgs) -> Result<()> {
    let index_name = Path::new(&args.index);
    let meta = IndexMetadata::read(index_name)?;
    let path = IndexMetadata::path(index_name);
    let num_fmt = NumberFormat::new();
    let count = |value: usize| num_fmt.format(",.0", value as f64);
    let optional = |value: Option<usize>| value.map_or("-".to_string(), count);

    let mut rows = vec![vec!["Index".to_string(), args.index.to_string()]];
    let file_meta = fs::metadata(&path).with_path(path.display())?;
    let modified: DateTime<Local> =
        DateTime::from(file_meta.modified().with_path(path.display())?);
    rows.push(vec![
        "Modified".to_string(),
        modified.format("%Y-%m-%d %H:%M").to_string(),
    ]);
    rows.push(vec!["File Version".to_string(), meta.version.to_string()]);
    rows.push(vec![
        "Kind".to_string(),
        match meta.kind {
            IndexKind::Esa => "enhanced suffix array".to_string(),
            IndexKind::Packed => "packed index".to_string(),
        },
    ]);
    rows.push(vec!["Readmode".to_string(), meta.readmode.to_string()]);
    rows.push(vec!["Total length".to_string(), count(meta.total_length)]);
    rows.push(vec!["Num sequences".to_string(), count(meta.num_of_sequences)]);
    rows.push(vec!["Alphabet size".to_string(), count(meta.num_of_chars)]);
    rows.push(vec!["Num suffixes".to_string(), count(meta.num_suffixes)]);
    rows.push(vec![
        "Suffix width".to_string(),
        format!("{} bytes", meta.suffix_width),
    ]);
    rows.push(vec!["Prefix length".to_string(), count(meta.prefix_length)]);
    rows.push(vec!["Max depth".to_string(), optional(meta.max_depth)]);
    rows.push(vec!["Longest".to_string(), optional(meta.longest)]);
    if let Some(lcp) = meta.lcp {
        rows.push(vec![
            "Max branch depth".to_string(),
            count(lcp.max_branch_depth),
        ]);
        rows.push(vec![
            "Large LCP values".to_string(),
            count(lcp.num_large_values),
        ]);
    }
    let tables: Vec<_> = [
        (meta.tables.suftab, "suf"),
        (meta.tables.lcptab, "lcp"),
        (meta.tables.bwttab, "bwt"),
        (meta.tables.bcktab, "bck"),
    ]
    .into_iter()
    .filter_map(|(present, name)| present.then_some(name))
    .collect();
    rows.push(vec!["Tables".to_string(), tables.join(", ")]);
    rows.push(vec![
        "Sequences".to_string(),
        meta.sequence_names.join(", "),
    ]);

    let table = Table::from_iter(rows);
    println!("{table}");
    Ok(())
}

// --------------------------------------------------
#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use libsuffixerator::types::Readmode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_esa() {
        let cli = Cli::try_parse_from([
            "suffixerator",
            "esa",
            "in.fa",
            "--suf",
            "--dir",
            "rcl",
            "--algbds",
            "5,50,500",
            "--maxdepth",
        ])
        .expect("valid arguments");
        let Some(Command::Esa(args)) = cli.command else {
            panic!("not esa");
        };
        assert_eq!(args.build.dir, Readmode::ReverseComplement);
        assert_eq!(args.build.algbds, Some(vec![5, 50, 500]));
        assert_eq!(args.maxdepth, Some(None));
        assert!(args.suf);
        assert!(!args.lcp);
    }

    #[test]
    fn test_parse_conflicts() {
        // Parts and memory limit exclude each other
        let res = Cli::try_parse_from([
            "suffixerator",
            "esa",
            "in.fa",
            "--parts",
            "3",
            "--memlimit",
            "1GB",
        ]);
        assert!(res.is_err());

        let res = Cli::try_parse_from(["suffixerator", "esa", "in.fa", "--dir", "up"]);
        assert!(res.is_err());
    }
}
