use clap::{Parser, Subcommand};
use jingwei::args::{parse_size, GraphArgs, InputArgs, SubsampleArgs, TraversalArgs};
use jingwei::error::{AsmError, Result};
use jingwei::graph::BloomDbg;
use jingwei::kernel::{
    process_pair, process_single, AssemblyContext, KernelStats, Outcome, ScreeningFilter,
};
use jingwei::output::{OutputOptions, OutputRecord, TranscriptWriter};
use jingwei::populate::{populate_sources, PopulateMode, PopulateOptions, PopulateReport};
use jingwei::snapshot;
use jingwei::stats::FragmentLengths;
use jingwei::subsample::RedundancyFilter;
use jingwei::summary::RunSummary;
use jingwei::utils::find_seq_files;
use log::{info, warn};
use seqpack::{read_parallel, FastxReader, OptionPair, Reader, Sequence};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

const MAX_TRANSCRIPT_KMERS: usize = 1 << 20;

#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about = "Assemble transcripts from RNA-seq reads without a reference",
    long_about = "Assemble transcripts from RNA-seq reads without a reference.
Builds a Bloom-filter de Bruijn graph from the reads, reconstructs fragments
from read pairs, extends them into transcripts and deduplicates the output
online."
)]
struct AssembleArgs {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    graph: GraphArgs,

    #[clap(flatten)]
    traversal: TraversalArgs,

    /// Output directory
    #[clap(short, long, default_value = "jingwei_out")]
    out_dir: PathBuf,

    /// Output name stem and record prefix
    #[clap(long, default_value = "jw")]
    name: String,

    /// Number of threads (0 = all cores)
    #[clap(short = 'p', long, default_value_t = 0)]
    threads: usize,

    /// Gate input reads through the redundancy filter
    #[clap(long)]
    subsample: bool,

    #[clap(flatten)]
    subsample_args: SubsampleArgs,

    /// Emit the mates of unconnectable pairs as separate records
    #[clap(long)]
    keep_unconnected: bool,

    /// Clear the screening filter between input sources (strata)
    /// instead of deduplicating globally
    #[clap(long)]
    screen_reset: bool,

    /// Fragment-length sample size for the quartile broadcast
    #[clap(long, default_value_t = 1000)]
    sample_size: usize,

    /// Lowercase poly-A signals and report them in headers
    #[clap(long)]
    polya: bool,

    /// Write U instead of T
    #[clap(long)]
    uracil: bool,

    /// Save the populated graph to this snapshot file
    #[clap(long)]
    save_graph: Option<PathBuf>,

    /// Restore a previously saved graph instead of populating
    #[clap(long)]
    restore_graph: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
#[clap(version, about = "Print a graph snapshot header and filter health")]
struct InspectArgs {
    /// Snapshot file written by assemble --save-graph
    snapshot: PathBuf,

    /// Load the payload and report live occupancy
    #[clap(long)]
    full: bool,
}

#[derive(Parser, Debug, Clone)]
#[clap(version, about = "Run the redundancy filter over inputs and keep novel records")]
struct SubsampleCmdArgs {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    subsample: SubsampleArgs,

    /// k-mer length for signatures
    #[clap(short, long, default_value_t = 25)]
    k_mer: usize,

    /// Counting-filter memory
    #[clap(long, value_parser = parse_size, default_value = "256M")]
    filter_mem: usize,

    /// Output file for admitted records
    #[clap(short, long, default_value = "subsampled.fa")]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Assemble(AssembleArgs),
    Inspect(InspectArgs),
    Subsample(SubsampleCmdArgs),
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Jingwei: reference-free transcriptome assembly")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Assemble(args) => run_assemble(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Subsample(args) => run_subsample(args),
    };
    if let Err(e) = result {
        eprintln!("jingwei: {}", e);
        std::process::exit(1);
    }
}

/// Paired sources first, then singles; the two sets drive different
/// population and assembly paths.
fn gather_sources(input: &InputArgs) -> Result<(Vec<OptionPair<PathBuf>>, Vec<PathBuf>)> {
    if input.left.len() != input.right.len() {
        return Err(AsmError::Config(format!(
            "{} left files vs {} right files",
            input.left.len(),
            input.right.len()
        )));
    }
    let paired: Vec<OptionPair<PathBuf>> = input
        .left
        .iter()
        .zip(&input.right)
        .map(|(a, b)| OptionPair::Pair(a.clone(), b.clone()))
        .collect();
    let mut singles = input.single.clone();
    if let Some(dir) = &input.in_dir {
        singles.extend(find_seq_files(dir));
    }
    if paired.is_empty() && singles.is_empty() {
        return Err(AsmError::Config("no input files".into()));
    }
    Ok((paired, singles))
}

fn run_assemble(args: AssembleArgs) -> Result<()> {
    let started = Instant::now();
    let threads = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };
    // the read scaffold spends two threads on parsing and collecting
    let workers = threads.saturating_sub(2).max(1);
    std::fs::create_dir_all(&args.out_dir)?;

    let (paired, singles) = gather_sources(&args.input)?;
    let config = args.graph.graph_config();
    config.validate()?;
    let cancel = AtomicBool::new(false);

    let gate = if args.subsample {
        Some(RedundancyFilter::new(
            (args.graph.filter_mem as u64 / 4).max(1024),
            config.num_hashes,
            args.subsample_args.scheme(),
            config.k,
            config.stranded,
            args.subsample_args.max_multiplicity,
            args.subsample_args.max_seen_chain,
        )?)
    } else {
        None
    };

    // stage 1: build or restore the graph
    let (graph, populate_report) = match &args.restore_graph {
        Some(path) => {
            info!("restoring graph from {}", path.display());
            (snapshot::load_graph(path)?, PopulateReport::default())
        }
        None => {
            // fragment pairs are fed online from accepted fragments, so
            // both paired filters are always carried
            let graph = BloomDbg::new(config, args.graph.sizing(true, true))?;
            let mut report = PopulateReport::default();
            if !paired.is_empty() {
                let opts = PopulateOptions {
                    mode: PopulateMode::Add,
                    read_pairs: true,
                    frag_pairs: false,
                    threads,
                    min_quality: args.input.min_quality,
                };
                merge_reports(
                    &mut report,
                    populate_sources(&graph, &paired, &opts, gate.as_ref(), &cancel)?,
                );
            }
            if !singles.is_empty() {
                let sources: Vec<OptionPair<PathBuf>> = singles
                    .iter()
                    .map(|p| OptionPair::Single(p.clone()))
                    .collect();
                let opts = PopulateOptions {
                    mode: PopulateMode::Add,
                    read_pairs: true,
                    frag_pairs: true,
                    threads,
                    min_quality: args.input.min_quality,
                };
                merge_reports(
                    &mut report,
                    populate_sources(&graph, &sources, &opts, gate.as_ref(), &cancel)?,
                );
            }
            (graph, report)
        }
    };

    let dbg_fpr = graph.dbg_filter().estimated_fpr();
    if dbg_fpr > args.graph.max_fpr {
        warn!(
            "dbg filter estimated fpr {:.4} exceeds the {:.4} bound; results may contain spurious paths",
            dbg_fpr, args.graph.max_fpr
        );
    }

    if let Some(path) = &args.save_graph {
        snapshot::save_graph(&graph, path)?;
        info!("graph snapshot written to {}", path.display());
    }

    // stage 2: reconstruct fragments and emit transcripts
    let params = args.traversal.as_params();
    let mut screen = ScreeningFilter::new(
        (args.graph.filter_mem as u64 * 8).max(1024),
        config.num_hashes,
    )?;
    let stats = KernelStats::default();
    let lengths = FragmentLengths::new(args.sample_size);

    let writer = TranscriptWriter::create(
        args.out_dir.join(format!("{}.transcripts.fa", args.name)),
        OutputOptions {
            prefix: format!("{}.", args.name),
            mask_polya: args.polya,
            uracil: args.uracil,
        },
    )?;
    let out_sender = writer.sender();

    let all_sources: Vec<OptionPair<PathBuf>> = paired
        .into_iter()
        .chain(singles.into_iter().map(OptionPair::Single))
        .collect();
    for (file_index, source) in all_sources.iter().enumerate() {
        let ctx = AssemblyContext {
            graph: &graph,
            screen: &screen,
            params: &params,
            stats: &stats,
            lengths: &lengths,
            keep_unconnected: args.keep_unconnected,
            max_transcript_kmers: MAX_TRANSCRIPT_KMERS,
        };
        let mut reader =
            match FastxReader::from_paths(source.clone(), file_index, args.input.min_quality) {
                Ok(reader) => reader,
                Err(e) => {
                    warn!("skipping source during assembly: {}", e);
                    continue;
                }
            };
        let sender = out_sender.clone();
        read_parallel(
            &mut reader,
            workers,
            &cancel,
            |seqs: Vec<Sequence>| {
                for seq in seqs {
                    let outcomes = match &seq.body {
                        OptionPair::Pair(left, right) => process_pair(&ctx, left, right),
                        OptionPair::Single(body) => process_single(&ctx, body),
                    };
                    for outcome in outcomes {
                        if let Outcome::Emitted(t) = outcome {
                            let record = OutputRecord {
                                bases: t.bases,
                                median_coverage: t.median_coverage,
                                fragment_info: t.fragment_info,
                            };
                            if sender.send(record).is_err() {
                                return None;
                            }
                        }
                    }
                }
                Some(())
            },
            |outputs| outputs.iter().for_each(drop),
        )?;
        if args.screen_reset {
            screen.reset()?;
        }
    }
    drop(out_sender);
    let transcripts_written = writer.finish()?;

    // stage 3: side files and the run summary
    let quartiles = lengths.finalize();
    if let Some(q) = &quartiles {
        q.write_side_file(args.out_dir.join(format!("{}.fragstats.txt", args.name)))?;
    }
    let summary = RunSummary {
        elapsed_secs: started.elapsed().as_secs_f64(),
        sequences: populate_report.sequences,
        bases: populate_report.bases,
        kmers_inserted: populate_report.kmers,
        kmer_pairs_inserted: populate_report.kmer_pairs,
        sources_skipped: populate_report.skipped.len(),
        subsample_rejected: populate_report.subsample_rejected,
        dbg_occupancy: graph.dbg_filter().occupancy(),
        dbg_estimated_fpr: dbg_fpr,
        cbf_occupancy: graph.cbf_filter().occupancy(),
        transcripts_written,
        kernel: stats.snapshot(),
        fragment_lengths: quartiles,
    };
    summary.write_json(args.out_dir.join(format!("{}.summary.json", args.name)))?;

    info!(
        "assembled {} transcripts from {} sequences in {:.1}s",
        transcripts_written,
        summary.sequences,
        summary.elapsed_secs
    );
    Ok(())
}

fn merge_reports(into: &mut PopulateReport, from: PopulateReport) {
    into.sequences += from.sequences;
    into.bases += from.bases;
    into.kmers += from.kmers;
    into.kmer_pairs += from.kmer_pairs;
    into.subsample_rejected += from.subsample_rejected;
    into.skipped.extend(from.skipped);
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let header = snapshot::read_header(&args.snapshot)?;
    println!("snapshot : {}", args.snapshot.display());
    println!("version  : {}", header.version);
    println!("k        : {}", header.k);
    println!("stranded : {}", header.stranded);
    println!("dbg bits : {} (m={})", header.n_dbg_bits, header.m_dbg);
    println!("cbf bytes: {} (m={})", header.n_cbf_bytes, header.m_cbf);
    println!(
        "paired   : pkbf={} rpkbf={} bits={} m={}",
        header.has_pkbf, header.has_rpkbf, header.n_pkbf_bits, header.m_pkbf
    );
    println!("d_read   : {}", header.d_read);
    println!("d_frag   : {}", header.d_frag);
    if args.full {
        let graph = snapshot::load_graph(&args.snapshot)?;
        println!(
            "dbg occupancy {:.6}, estimated fpr {:.2e}",
            graph.dbg_filter().occupancy(),
            graph.dbg_filter().estimated_fpr()
        );
        println!("cbf occupancy {:.6}", graph.cbf_filter().occupancy());
    }
    Ok(())
}

fn run_subsample(args: SubsampleCmdArgs) -> Result<()> {
    let (paired, singles) = gather_sources(&args.input)?;
    if !paired.is_empty() {
        return Err(AsmError::Config(
            "subsample operates on single-ended inputs".into(),
        ));
    }
    let filter = RedundancyFilter::new(
        args.filter_mem as u64,
        3,
        args.subsample.scheme(),
        args.k_mer,
        false,
        args.subsample.max_multiplicity,
        args.subsample.max_seen_chain,
    )?;

    use std::io::Write;
    let kept = AtomicU64::new(0);
    let seen = AtomicU64::new(0);
    let mut out = std::io::BufWriter::new(std::fs::File::create(&args.output)?);
    for (file_index, path) in singles.iter().enumerate() {
        let mut reader = FastxReader::from_paths(
            OptionPair::Single(path.clone()),
            file_index,
            args.input.min_quality,
        )?;
        while let Some(batch) = reader.next()? {
            for seq in batch {
                seen.fetch_add(1, Ordering::Relaxed);
                if let OptionPair::Single(body) = &seq.body {
                    if filter.admit(body) {
                        kept.fetch_add(1, Ordering::Relaxed);
                        writeln!(out, ">{}", seq.header.id)?;
                        out.write_all(body)?;
                        writeln!(out)?;
                    }
                }
            }
        }
    }
    out.flush()?;
    info!(
        "kept {} of {} sequences; filter occupancy {:.4}",
        kept.load(Ordering::Relaxed),
        seen.load(Ordering::Relaxed),
        filter.occupancy()
    );
    Ok(())
}
