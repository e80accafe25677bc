use clap::*;
use std::path::PathBuf;
use wintree::libs::external::CommandTemplate;
use wintree::libs::pipeline::{run, PipelineConfig};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("run")
        .about("Merge per-region matrices and build all trees")
        .after_help(
            r###"
Runs the whole pipeline:

1. (--producer) create the matrices of regions that have none
2. check that every region of the index has both matrices
3. merge into all_chrom, per-chromosome and optionally per-window groups
4. write distance matrices and build one rooted tree per group
5. (--pairwise or --script) compare every pair of trees into pairwise.tsv

Notes:
* Arguments are positional: <matdir> <index> <seqnum> <outgroup> <outdir> <threads>
* <seqnum> and <threads> must be positive
* --producer is run once per missing region, <threads> at a time, with
  {chrom} {start} {end} {region} {index} and {outdir} (= <matdir>)
* See `wintree build --help` for the files written into <outdir>
* A consistency error during the merge aborts the run; trees of groups built
  before a later failure are kept
* The exit code is non-zero when any group failed

Examples:
1. Matrices already computed:
   wintree run matrices/ regions.tsv 25 Outgroup result/ 8

2. Compute missing matrices first, build window trees and compare them:
   wintree run matrices/ regions.tsv 25 Outgroup result/ 8 \
       --producer "bash region_mat.sh {chrom} {start} {end} {index} {outdir}" \
       --per-window --pairwise

"###,
        )
        .arg(
            Arg::new("matdir")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Directory of per-region matrices"),
        )
        .arg(
            Arg::new("index")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Region index, `chrom start end index`"),
        )
        .arg(
            Arg::new("seqnum")
                .required(true)
                .num_args(1)
                .index(3)
                .value_parser(value_parser!(usize))
                .help("Number of sequences"),
        )
        .arg(
            Arg::new("outgroup")
                .required(true)
                .num_args(1)
                .index(4)
                .help("Name of the outgroup sequence"),
        )
        .arg(
            Arg::new("outdir")
                .required(true)
                .num_args(1)
                .index(5)
                .help("Output directory"),
        )
        .arg(
            Arg::new("threads")
                .required(true)
                .num_args(1)
                .index(6)
                .value_parser(value_parser!(usize))
                .help("Number of threads"),
        )
        .arg(super::utils::arg_nj())
        .arg(
            Arg::new("producer")
                .long("producer")
                .num_args(1)
                .help("Command line creating the matrices of one region"),
        )
        .arg(
            Arg::new("no_chrom")
                .long("no-chrom")
                .action(ArgAction::SetTrue)
                .help("Do not build per-chromosome trees"),
        )
        .arg(
            Arg::new("per_window")
                .long("per-window")
                .action(ArgAction::SetTrue)
                .help("Build one tree per region"),
        )
        .arg(
            Arg::new("pairwise")
                .long("pairwise")
                .action(ArgAction::SetTrue)
                .help("Compare all trees with Robinson-Foulds distances"),
        )
        .arg(super::utils::arg_script())
        .arg(super::utils::arg_timeout())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let pairwise = if args.get_flag("pairwise") || args.contains_id("script") {
        Some(super::utils::pairwise_metric(args)?)
    } else {
        None
    };

    let config = PipelineConfig {
        matrix_dir: PathBuf::from(args.get_one::<String>("matdir").unwrap()),
        region_index: PathBuf::from(args.get_one::<String>("index").unwrap()),
        seq_num: *args.get_one::<usize>("seqnum").unwrap(),
        outgroup: args.get_one::<String>("outgroup").unwrap().to_string(),
        outdir: PathBuf::from(args.get_one::<String>("outdir").unwrap()),
        threads: *args.get_one::<usize>("threads").unwrap(),
        nj: CommandTemplate::parse(args.get_one::<String>("nj").unwrap())?,
        per_chrom: !args.get_flag("no_chrom"),
        per_window: args.get_flag("per_window"),
        producer: super::utils::template(args, "producer")?,
        pairwise,
    };

    //----------------------------
    // Ops
    //----------------------------
    let report = run(&config)?;

    log::info!(
        "{} regions merged, {} produced, {} trees built",
        report.merge.regions_read,
        report.produced,
        report.build.built.len()
    );
    if let Some(summary) = &report.pairwise {
        log::info!("Pairwise jobs: {}", summary);
    }

    if !report.build.is_success() {
        for (group, reason) in &report.build.failed {
            eprintln!("{}: {}", group, reason);
        }
        anyhow::bail!("{} groups failed", report.build.failed.len());
    }

    Ok(())
}
